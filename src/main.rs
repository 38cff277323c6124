use anyhow::Result;
use dialogue_voiceover::core::config::{Config, CONFIG_FILE};
use dialogue_voiceover::core::io::{NativeStorage, Storage};
use dialogue_voiceover::services::synth::EngineHandle;
use dialogue_voiceover::services::workflow::WorkflowManager;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config_path = std::env::args().nth(1);
    let loaded = match &config_path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    let config = match loaded {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {:#}", e);
            eprintln!(
                "Please ensure '{}' exists and is valid YAML.",
                config_path.as_deref().unwrap_or(CONFIG_FILE)
            );
            return Err(e);
        }
    };
    println!("Selected language: {}", config.language);

    let storage: Arc<dyn Storage> = Arc::new(NativeStorage::new());
    // Built on first use, so table-only runs never start the synthesizer.
    let engine = Arc::new(EngineHandle::new(config.synthesis.clone(), storage.clone()));

    let manager = WorkflowManager::new(config, storage, engine);
    manager.run().await?;

    Ok(())
}
