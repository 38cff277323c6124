use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{multipart, Client};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::{sleep, Duration};

use super::{SynthesisRequest, Synthesizer};
use crate::core::io::Storage;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HttpSynthConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_retry_count")]
    pub retry_count: usize,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_seconds: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8020".to_string()
}
fn default_retry_count() -> usize {
    2
}
fn default_retry_delay() -> u64 {
    2
}

impl Default for HttpSynthConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            retry_count: default_retry_count(),
            retry_delay_seconds: default_retry_delay(),
        }
    }
}

/// `attempt` is the zero-based index of the attempt about to start.
fn retry_notice(attempt: usize, attempts: usize) -> String {
    format!(
        "Synthesis attempt {}/{} failed, retrying (attempt {}/{})...",
        attempt,
        attempts,
        attempt + 1,
        attempts
    )
}

/// Voice-cloning synthesis server reached over HTTP.
///
/// `POST {base_url}/synthesize` with multipart fields `text`, `language` and
/// the `reference` sample; the response body is the rendered audio.
pub struct HttpSynthesizer {
    config: HttpSynthConfig,
    client: Client,
    storage: Arc<dyn Storage>,
}

impl HttpSynthesizer {
    pub fn new(config: HttpSynthConfig, storage: Arc<dyn Storage>) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            config,
            client,
            storage,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/synthesize", self.config.base_url.trim_end_matches('/'))
    }

    async fn try_synthesize(&self, request: &SynthesisRequest, voice: &[u8]) -> Result<Vec<u8>> {
        let file_name = request
            .reference_voice
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "reference.ogg".to_string());

        let part = multipart::Part::bytes(voice.to_vec())
            .file_name(file_name)
            .mime_str("application/octet-stream")
            .context("Invalid mime type")?;
        let form = multipart::Form::new()
            .text("text", request.text.clone())
            .text("language", request.language.clone())
            .part("reference", part);

        let response = self
            .client
            .post(self.endpoint())
            .multipart(form)
            .send()
            .await
            .context("Failed to send synthesis request")?
            .error_for_status()
            .context("Synthesis server returned an error")?;

        let bytes = response
            .bytes()
            .await
            .context("Failed to read synthesized audio")?;
        if bytes.is_empty() {
            return Err(anyhow!("Synthesis server returned empty audio"));
        }
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl Synthesizer for HttpSynthesizer {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<()> {
        let voice = self.storage.read(&request.reference_voice).await?;
        debug!(
            "Uploading reference {} ({} bytes) for {}",
            request.reference_voice.display(),
            voice.len(),
            request.output.display()
        );

        let attempts = self.config.retry_count + 1;
        let mut last_error = anyhow!("Unknown error");

        for attempt in 0..attempts {
            if attempt > 0 {
                warn!("{}", retry_notice(attempt, attempts));
                sleep(Duration::from_secs(self.config.retry_delay_seconds)).await;
            }

            match self.try_synthesize(request, &voice).await {
                Ok(audio) => {
                    self.storage.write(&request.output, &audio).await?;
                    return Ok(());
                }
                Err(e) => {
                    warn!("Synthesis error: {:#}", e);
                    last_error = e;
                }
            }
        }

        Err(last_error.context(format!(
            "Synthesis still failing after {} attempts",
            attempts
        )))
    }
}
