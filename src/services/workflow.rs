use anyhow::{Context, Result};
use log::info;
use std::path::Path;
use std::sync::Arc;

use crate::core::config::Config;
use crate::core::dataset::{load_records, DialogueRecord};
use crate::core::io::Storage;
use crate::services::dispatcher::Dispatcher;
use crate::services::engine::{DispatchEngine, RunReport};
use crate::services::normalizer::{estimate_characters, NormalizedVariant, Normalizer};
use crate::services::synth::EngineHandle;
use crate::services::tables;
use crate::services::voices::VoiceResolver;
use crate::utils::progress::spawn_progress_bar;

pub struct WorkflowManager {
    config: Config,
    storage: Arc<dyn Storage>,
    engine: Arc<EngineHandle>,
}

impl WorkflowManager {
    pub fn new(config: Config, storage: Arc<dyn Storage>, engine: Arc<EngineHandle>) -> Self {
        Self {
            config,
            storage,
            engine,
        }
    }

    pub async fn run(&self) -> Result<()> {
        let records = load_records(&self.config.dataset, &self.config.language)?;
        self.run_records(records).await
    }

    pub async fn run_records(&self, records: Vec<DialogueRecord>) -> Result<()> {
        self.config.ensure_directories()?;

        let variants = self.normalize(records);

        if self.config.mode.builds_tables() {
            self.generate_lookup_tables(&variants).await?;
        }
        if self.config.mode.synthesizes() {
            self.synthesize(variants).await?;
        }
        Ok(())
    }

    fn normalize(&self, records: Vec<DialogueRecord>) -> Vec<NormalizedVariant> {
        let normalizer = Normalizer::new(&self.config.stand_ins);
        let count = records.len();
        let variants = normalizer.normalize_all(records);
        info!("Normalized {} records into {} variants", count, variants.len());
        variants
    }

    pub async fn generate_lookup_tables(&self, variants: &[NormalizedVariant]) -> Result<()> {
        let compiled = tables::compile(variants);
        tables::lua::write_tables(
            self.storage.as_ref(),
            Path::new(&self.config.output_folder),
            &self.config.lookup,
            &compiled,
        )
        .await?;
        println!("Finished writing {} lookup tables.", compiled.len());
        Ok(())
    }

    pub async fn synthesize(&self, variants: Vec<NormalizedVariant>) -> Result<RunReport> {
        println!(
            "Approximate text characters: {}",
            estimate_characters(&variants)
        );

        let resolver = VoiceResolver::new(
            self.config.voices_folder(),
            self.config.default_voice_path(),
            self.storage.clone(),
        );
        let dispatcher = Dispatcher::new(
            self.storage.clone(),
            resolver,
            self.engine.clone(),
            self.config.sounds_folder(),
            self.config.synthesis_language(),
            self.config.force_regenerate,
        );
        let engine = DispatchEngine::new(
            Arc::new(dispatcher),
            self.config.max_workers,
            self.config.progress_chunks,
        );

        let (progress, reporter) = spawn_progress_bar(variants.len())?;
        let report = engine.run(variants, progress).await;
        reporter.await.context("Progress reporter panicked")?;

        println!(
            "Audio finished generating: {} synthesized, {} already present, {} progress skipped, {} invalid, {} failed.",
            report.synthesized,
            report.cached,
            report.skipped_progress,
            report.invalid,
            report.failures.len()
        );
        if !report.failures.is_empty() {
            println!("Failed inputs: {:?}", report.failed_inputs());
        }

        let report_path = Path::new(&self.config.output_folder).join("failed_inputs.json");
        let content = serde_json::to_string_pretty(&report.failures)?;
        self.storage.write(&report_path, content.as_bytes()).await?;

        Ok(report)
    }
}
