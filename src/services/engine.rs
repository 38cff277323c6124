use futures_util::StreamExt;
use log::{error, info};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

use crate::services::dispatcher::{Dispatcher, Failure, JobOutcome};
use crate::services::normalizer::NormalizedVariant;

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub completed: usize,
    pub total: usize,
    pub message: String,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct RunReport {
    pub total: usize,
    pub synthesized: usize,
    pub cached: usize,
    pub skipped_progress: usize,
    pub invalid: usize,
    pub failures: Vec<Failure>,
}

impl RunReport {
    fn record(&mut self, outcome: &JobOutcome) {
        match outcome {
            JobOutcome::Synthesized { .. } => self.synthesized += 1,
            JobOutcome::Cached { .. } => self.cached += 1,
            JobOutcome::SkippedProgress { .. } => self.skipped_progress += 1,
            JobOutcome::Invalid { .. } => self.invalid += 1,
            JobOutcome::Failed(failure) => self.failures.push(failure.clone()),
        }
    }

    pub fn completed(&self) -> usize {
        self.synthesized + self.cached + self.skipped_progress + self.invalid + self.failures.len()
    }

    /// Reference voices of failed jobs, in completion order.
    pub fn failed_inputs(&self) -> Vec<String> {
        self.failures
            .iter()
            .map(|f| match &f.reference_voice {
                Some(p) => p.display().to_string(),
                None => f.job.clone(),
            })
            .collect()
    }
}

/// Bounded pool driving the dispatcher over the whole variant set.
///
/// Jobs run as tasks on the multi-threaded runtime, at most `workers` at a
/// time. The list is cut into `chunks` contiguous slices only to pace the
/// progress log. No job failure stops the run; a hung synthesis call holds
/// its slot for as long as it hangs.
pub struct DispatchEngine {
    dispatcher: Arc<Dispatcher>,
    workers: usize,
    chunks: usize,
}

impl DispatchEngine {
    pub fn new(dispatcher: Arc<Dispatcher>, workers: usize, chunks: usize) -> Self {
        Self {
            dispatcher,
            workers: workers.max(1),
            chunks: chunks.max(1),
        }
    }

    pub async fn run(
        &self,
        variants: Vec<NormalizedVariant>,
        progress: UnboundedSender<ProgressEvent>,
    ) -> RunReport {
        let total = variants.len();
        let mut report = RunReport {
            total,
            ..Default::default()
        };
        info!("total rows: {}", total);

        let chunk_size = total.div_ceil(self.chunks).max(1);
        let mut pending = variants.into_iter().peekable();
        let mut chunk_index = 0;

        while pending.peek().is_some() {
            let chunk: Vec<NormalizedVariant> = pending.by_ref().take(chunk_size).collect();
            chunk_index += 1;

            let mut results = futures_util::stream::iter(chunk)
                .map(|variant| {
                    let dispatcher = self.dispatcher.clone();
                    let job = Dispatcher::job_label(&variant);
                    let handle = tokio::spawn(async move { dispatcher.dispatch(variant).await });
                    async move {
                        match handle.await {
                            Ok(outcome) => outcome,
                            Err(e) => JobOutcome::Failed(Failure {
                                job,
                                reference_voice: None,
                                reason: format!("worker aborted: {}", e),
                            }),
                        }
                    }
                })
                .buffer_unordered(self.workers);

            while let Some(outcome) = results.next().await {
                report.record(&outcome);
                // The receiver may be gone; progress is advisory.
                let _ = progress.send(ProgressEvent {
                    completed: report.completed(),
                    total,
                    message: outcome.message(),
                });
            }

            info!(
                "Chunk {}/{} done ({}/{} rows)",
                chunk_index,
                total.div_ceil(chunk_size),
                report.completed(),
                total
            );
        }

        for failure in &report.failures {
            error!("Failed input {}: {}", failure.job, failure.reason);
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dataset::record;
    use crate::services::dispatcher::tests::{dispatcher, RecordingSynth};
    use crate::services::normalizer::{Normalizer, StandIns};
    use anyhow::Result;
    use std::collections::BTreeSet;
    use std::path::Path;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    fn dataset() -> Vec<NormalizedVariant> {
        let mut records = vec![
            record("Aidez-nous, $n.", "1", "accept"),
            record("Alors, ce travail ?", "1", "progress"),
            record("Merci $Gmonsieur:madame;.", "1", "complete"),
            record("Une belle journée.", "", "gossip"),
            record("Une belle journée.", "", "gossip"),
            record("Payez $5.", "", "gossip"),
        ];
        for i in 0..10 {
            records.push(record(&format!("Ligne {}.", i), "", "gossip"));
        }
        Normalizer::new(&StandIns::default()).normalize_all(records)
    }

    fn listing(dir: &Path) -> BTreeSet<String> {
        let mut files = BTreeSet::new();
        for sub in ["quests", "gossip"] {
            for entry in std::fs::read_dir(dir.join("sounds").join(sub)).unwrap() {
                files.insert(format!("{}/{}", sub, entry.unwrap().file_name().to_string_lossy()));
            }
        }
        files
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_and_rerun_is_idempotent() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let synth = Arc::new(RecordingSynth::new());
        let engine = DispatchEngine::new(Arc::new(dispatcher(dir.path(), synth.clone())), 2, 5);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let report = engine.run(dataset(), tx).await;

        let mut events = Vec::new();
        while let Some(e) = rx.recv().await {
            events.push(e);
        }

        assert_eq!(report.total, 17);
        assert_eq!(report.completed(), 17);
        assert_eq!(report.skipped_progress, 1);
        assert_eq!(report.invalid, 1);
        assert!(report.failures.is_empty());
        // Two identical gossip lines share one file; the second may be a
        // cache hit or a benign duplicate render.
        assert_eq!(report.synthesized + report.cached, 15);
        assert_eq!(events.len(), 17);
        assert_eq!(events.last().map(|e| e.completed), Some(17));

        let first_calls = synth.calls();
        let files = listing(dir.path());
        assert_eq!(files.len(), 14);
        assert!(files.contains("quests/1-accept.ogg"));
        assert!(files.contains("quests/m-1-complete.ogg"));
        assert!(files.contains("quests/f-1-complete.ogg"));
        assert!(!files.contains("quests/1-progress.ogg"));

        let (tx, _rx) = mpsc::unbounded_channel();
        let rerun = engine.run(dataset(), tx).await;
        assert_eq!(synth.calls(), first_calls);
        assert_eq!(rerun.synthesized, 0);
        assert_eq!(rerun.cached, 15);
        assert_eq!(listing(dir.path()), files);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failures_do_not_abort() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let synth = Arc::new(RecordingSynth {
            requests: Mutex::new(Vec::new()),
            fail_on: Some("Ligne 3".to_string()),
        });
        let engine = DispatchEngine::new(Arc::new(dispatcher(dir.path(), synth)), 3, 4);

        let (tx, _rx) = mpsc::unbounded_channel();
        let report = engine.run(dataset(), tx).await;

        assert_eq!(report.completed(), 17);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(
            report.failed_inputs(),
            vec![dir.path().join("default.mp3").display().to_string()]
        );
        assert!(report.failures[0].reason.contains("engine crashed"));
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_and_tiny_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let synth = Arc::new(RecordingSynth::new());
        let engine = DispatchEngine::new(Arc::new(dispatcher(dir.path(), synth)), 0, 5);

        let (tx, _rx) = mpsc::unbounded_channel();
        let report = engine.run(Vec::new(), tx).await;
        assert_eq!(report.completed(), 0);

        let variants = Normalizer::new(&StandIns::default()).normalize_all(vec![record("Salut.", "", "gossip")]);
        let (tx, _rx) = mpsc::unbounded_channel();
        let report = engine.run(variants, tx).await;
        assert_eq!(report.synthesized, 1);
    }
}
