use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::process::Command;

use super::{SynthesisRequest, Synthesizer};

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct CommandSynthConfig {
    pub program: String,
    /// Argument template. `{text}`, `{voice}`, `{language}` and `{output}`
    /// are substituted per request.
    #[serde(default)]
    pub args: Vec<String>,
}

/// Runs a local synthesis program once per request.
pub struct CommandSynthesizer {
    config: CommandSynthConfig,
}

impl CommandSynthesizer {
    pub fn new(config: CommandSynthConfig) -> Self {
        Self { config }
    }

    fn render_args(&self, request: &SynthesisRequest) -> Vec<String> {
        let voice = request.reference_voice.to_string_lossy();
        let output = request.output.to_string_lossy();
        self.config
            .args
            .iter()
            .map(|arg| {
                arg.replace("{voice}", &voice)
                    .replace("{language}", &request.language)
                    .replace("{output}", &output)
                    // last, so text containing a placeholder is left as is
                    .replace("{text}", &request.text)
            })
            .collect()
    }
}

async fn discard_output(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            warn!("Removed partial output {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove partial output {}", path.display())),
    }
}

#[async_trait]
impl Synthesizer for CommandSynthesizer {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<()> {
        let args = self.render_args(request);
        debug!("Running {} for {}", self.config.program, request.output.display());

        let output = Command::new(&self.config.program)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.config.program))?;

        if !output.status.success() {
            // A partial file would be taken as rendered on the next run.
            discard_output(&request.output).await?;
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "{} exited with {}: {}",
                self.config.program,
                output.status,
                stderr.trim()
            ));
        }

        if !tokio::fs::try_exists(&request.output).await? {
            return Err(anyhow!(
                "{} produced no file at {}",
                self.config.program,
                request.output.display()
            ));
        }
        Ok(())
    }
}
