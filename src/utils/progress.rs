use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;

use crate::services::engine::ProgressEvent;

/// Spawns a task that renders progress events as a terminal bar. The task
/// ends when every sender is dropped.
pub fn spawn_progress_bar(total: usize) -> Result<(UnboundedSender<ProgressEvent>, JoinHandle<()>)> {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
            .progress_chars("#>-"),
    );

    let (tx, mut rx) = mpsc::unbounded_channel::<ProgressEvent>();
    let handle = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            pb.set_position(event.completed as u64);
            pb.set_message(event.message);
        }
        pb.finish_with_message("Audio finished generating.");
    });

    Ok((tx, handle))
}
