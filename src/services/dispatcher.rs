use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::core::io::Storage;
use crate::services::normalizer::NormalizedVariant;
use crate::services::synth::{EngineHandle, SynthesisRequest};
use crate::services::voices::VoiceResolver;

/// Sound file location relative to the `sounds` folder. Other tooling reads
/// these names, so the format is fixed.
pub fn output_location(variant: &NormalizedVariant) -> (&'static str, String) {
    let record = &variant.record;
    let mut base = match record.quest_key() {
        Some(quest) => format!("{}-{}", quest, record.source),
        None => variant.content_hash.clone(),
    };
    if let Some(prefix) = variant.player_gender.prefix() {
        base = format!("{}-{}", prefix, base);
    }
    let subfolder = if record.quest_key().is_some() { "quests" } else { "gossip" };
    (subfolder, format!("{}.ogg", base))
}

pub struct SynthesisJob {
    pub variant: NormalizedVariant,
    pub reference_voice: PathBuf,
    pub output: PathBuf,
    pub force_regenerate: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub job: String,
    pub reference_voice: Option<PathBuf>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Synthesized { output: PathBuf },
    /// The output already existed.
    Cached { output: PathBuf },
    SkippedProgress { job: String },
    Invalid { job: String, text: String },
    Failed(Failure),
}

impl JobOutcome {
    pub fn message(&self) -> String {
        match self {
            JobOutcome::Synthesized { output } => format!("saved {}", output.display()),
            JobOutcome::Cached { output } => format!("duplicate generation, skipping {}", output.display()),
            JobOutcome::SkippedProgress { job } => format!("skipping progress text: {}", job),
            JobOutcome::Invalid { text, .. } => format!("skipping due to invalid chars: {}", text),
            JobOutcome::Failed(failure) => format!("failed {}: {}", failure.job, failure.reason),
        }
    }
}

/// Decides, per variant, whether audio must be rendered and renders it.
pub struct Dispatcher {
    storage: Arc<dyn Storage>,
    resolver: VoiceResolver,
    engine: Arc<EngineHandle>,
    sounds_folder: PathBuf,
    language: String,
    force_regenerate: bool,
}

impl Dispatcher {
    pub fn new(
        storage: Arc<dyn Storage>,
        resolver: VoiceResolver,
        engine: Arc<EngineHandle>,
        sounds_folder: PathBuf,
        language: String,
        force_regenerate: bool,
    ) -> Self {
        Self {
            storage,
            resolver,
            engine,
            sounds_folder,
            language,
            force_regenerate,
        }
    }

    pub fn output_path(&self, variant: &NormalizedVariant) -> PathBuf {
        let (subfolder, file_name) = output_location(variant);
        self.sounds_folder.join(subfolder).join(file_name)
    }

    /// Short description used in progress messages and failure reports.
    pub fn job_label(variant: &NormalizedVariant) -> String {
        let (subfolder, file_name) = output_location(variant);
        format!("{}/{}", subfolder, file_name)
    }

    /// Two variants may map to the same output file (identical template,
    /// race and gender). Workers can then both see it missing and both
    /// render it; the result is the same audio and the last write wins.
    pub async fn dispatch(&self, variant: NormalizedVariant) -> JobOutcome {
        let job = Self::job_label(&variant);

        if !variant.valid {
            warn!("Skipping {} due to invalid chars: {}", job, variant.cleaned_text);
            return JobOutcome::Invalid {
                job,
                text: variant.cleaned_text,
            };
        }

        if variant.record.is_progress() {
            debug!("Skipping progress text: {}", job);
            return JobOutcome::SkippedProgress { job };
        }

        let output = self.output_path(&variant);
        if !self.force_regenerate {
            match self.storage.exists(&output).await {
                Ok(true) => {
                    debug!("Duplicate generation, skipping {}", output.display());
                    return JobOutcome::Cached { output };
                }
                Ok(false) => {}
                Err(e) => {
                    return JobOutcome::Failed(Failure {
                        job,
                        reference_voice: None,
                        reason: format!("{:#}", e),
                    })
                }
            }
        }

        let reference_voice = self.resolver.resolve(variant.race, variant.gender).await;
        let synthesis_job = SynthesisJob {
            variant,
            reference_voice,
            output,
            force_regenerate: self.force_regenerate,
        };
        self.run(job, synthesis_job).await
    }

    async fn run(&self, job: String, synthesis_job: SynthesisJob) -> JobOutcome {
        let request = SynthesisRequest {
            text: synthesis_job.variant.cleaned_text,
            reference_voice: synthesis_job.reference_voice,
            language: self.language.clone(),
            output: synthesis_job.output,
        };
        debug!(
            "Synthesizing {} with {} (force: {})",
            job,
            request.reference_voice.display(),
            synthesis_job.force_regenerate
        );

        let result = match self.engine.get().await {
            Ok(synthesizer) => synthesizer.synthesize(&request).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                info!("Audio file saved successfully: {}", request.output.display());
                JobOutcome::Synthesized {
                    output: request.output,
                }
            }
            Err(e) => {
                error!("Synthesis failed for {}: {:#}", job, e);
                JobOutcome::Failed(Failure {
                    job,
                    reference_voice: Some(request.reference_voice),
                    reason: format!("{:#}", e),
                })
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::dataset::record;
    use crate::core::io::NativeStorage;
    use crate::services::normalizer::{Normalizer, StandIns};
    use crate::services::synth::Synthesizer;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;

    /// Records every request and writes a stub file, or fails on demand.
    pub(crate) struct RecordingSynth {
        pub requests: Mutex<Vec<SynthesisRequest>>,
        pub fail_on: Option<String>,
    }

    impl RecordingSynth {
        pub(crate) fn new() -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                fail_on: None,
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Synthesizer for RecordingSynth {
        async fn synthesize(&self, request: &SynthesisRequest) -> Result<()> {
            self.requests.lock().unwrap().push(request.clone());
            if let Some(marker) = &self.fail_on {
                if request.text.contains(marker.as_str()) {
                    return Err(anyhow!("engine crashed"));
                }
            }
            tokio::fs::write(&request.output, b"ogg").await?;
            Ok(())
        }
    }

    pub(crate) fn dispatcher(root: &Path, synth: Arc<RecordingSynth>) -> Dispatcher {
        let storage: Arc<dyn Storage> = Arc::new(NativeStorage::new());
        let sounds = root.join("sounds");
        std::fs::create_dir_all(sounds.join("quests")).unwrap();
        std::fs::create_dir_all(sounds.join("gossip")).unwrap();
        let resolver = VoiceResolver::new(root.join("voices"), root.join("default.mp3"), storage.clone());
        Dispatcher::new(
            storage,
            resolver,
            Arc::new(EngineHandle::from_synthesizer(synth)),
            sounds,
            "fr".to_string(),
            false,
        )
    }

    fn normalize(text: &str, quest: &str, source: &str) -> Vec<NormalizedVariant> {
        Normalizer::new(&StandIns::default()).normalize(Arc::new(record(text, quest, source)))
    }

    #[test]
    fn test_output_location_quest() {
        let v = &normalize("Aidez-nous.", "783", "accept")[0];
        assert_eq!(output_location(v), ("quests", "783-accept.ogg".to_string()));
    }

    #[test]
    fn test_output_location_gossip_and_gendered() {
        let plain = &normalize("Bonjour.", "", "gossip")[0];
        assert_eq!(
            output_location(plain),
            ("gossip", format!("{}.ogg", plain.content_hash))
        );

        let gendered = normalize("Bonjour $Gmonsieur:madame;.", "", "gossip");
        let hash = &gendered[0].content_hash;
        assert_eq!(output_location(&gendered[0]).1, format!("m-{}.ogg", hash));
        assert_eq!(output_location(&gendered[1]).1, format!("f-{}.ogg", hash));

        let quest = normalize("Merci $Gmonsieur:madame;.", "12", "complete");
        assert_eq!(output_location(&quest[1]), ("quests", "f-12-complete.ogg".to_string()));
    }

    #[tokio::test]
    async fn test_policies_in_order() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let synth = Arc::new(RecordingSynth::new());
        let d = dispatcher(dir.path(), synth.clone());

        let invalid = normalize("Payez $5.", "", "gossip").remove(0);
        assert!(matches!(d.dispatch(invalid).await, JobOutcome::Invalid { .. }));

        let progress = normalize("Alors ?", "9", "progress").remove(0);
        assert!(matches!(d.dispatch(progress).await, JobOutcome::SkippedProgress { .. }));
        assert_eq!(synth.calls(), 0);

        let accept = normalize("Aidez-nous.", "783", "accept").remove(0);
        let outcome = d.dispatch(accept.clone()).await;
        let expected = dir.path().join("sounds/quests/783-accept.ogg");
        assert_eq!(outcome, JobOutcome::Synthesized { output: expected.clone() });
        assert!(expected.exists());

        let requests = synth.requests.lock().unwrap().clone();
        assert_eq!(requests[0].text, "Aidez-nous.");
        assert_eq!(requests[0].language, "fr");
        assert_eq!(requests[0].reference_voice, dir.path().join("default.mp3"));

        assert_eq!(d.dispatch(accept).await, JobOutcome::Cached { output: expected });
        assert_eq!(synth.calls(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_reference_voice_by_race_gender() -> Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::create_dir_all(dir.path().join("voices"))?;
        std::fs::write(dir.path().join("voices/human-male.ogg"), b"ogg")?;
        let synth = Arc::new(RecordingSynth::new());
        let d = dispatcher(dir.path(), synth.clone());

        d.dispatch(normalize("Bonjour.", "", "gossip").remove(0)).await;
        let requests = synth.requests.lock().unwrap();
        assert_eq!(requests[0].reference_voice, dir.path().join("voices/human-male.ogg"));
        Ok(())
    }

    #[tokio::test]
    async fn test_force_regenerate_ignores_existing() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let synth = Arc::new(RecordingSynth::new());
        let mut d = dispatcher(dir.path(), synth.clone());
        d.force_regenerate = true;

        let v = normalize("Aidez-nous.", "783", "accept").remove(0);
        d.dispatch(v.clone()).await;
        d.dispatch(v).await;
        assert_eq!(synth.calls(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_failure_is_reported_not_raised() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let synth = Arc::new(RecordingSynth {
            requests: Mutex::new(Vec::new()),
            fail_on: Some("Boum".to_string()),
        });
        let d = dispatcher(dir.path(), synth);

        let outcome = d.dispatch(normalize("Boum.", "5", "complete").remove(0)).await;
        match outcome {
            JobOutcome::Failed(failure) => {
                assert_eq!(failure.job, "quests/5-complete.ogg");
                assert_eq!(failure.reference_voice, Some(dir.path().join("default.mp3")));
                assert!(failure.reason.contains("engine crashed"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(!dir.path().join("sounds/quests/5-complete.ogg").exists());
        Ok(())
    }
}
