use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::core::io::Storage;

pub mod command;
pub mod http;

use command::CommandSynthConfig;
use http::HttpSynthConfig;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SynthesisConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    pub http: Option<HttpSynthConfig>,
    pub command: Option<CommandSynthConfig>,
}

fn default_provider() -> String {
    "http".to_string()
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            http: None,
            command: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    pub text: String,
    pub reference_voice: PathBuf,
    pub language: String,
    pub output: PathBuf,
}

/// The text-to-speech service. Implementations write the rendered audio to
/// `request.output` and report failure through the `Result`.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<()>;
}

pub async fn create_synthesizer(
    config: &SynthesisConfig,
    storage: Arc<dyn Storage>,
) -> Result<Arc<dyn Synthesizer>> {
    info!("Initializing synthesizer for provider: {}", config.provider);
    match config.provider.as_str() {
        "http" => {
            let http_config = config.http.clone().unwrap_or_default();
            Ok(Arc::new(http::HttpSynthesizer::new(http_config, storage)?))
        }
        "command" => {
            let command_config = config
                .command
                .clone()
                .ok_or_else(|| anyhow!("Command synthesizer config missing"))?;
            Ok(Arc::new(command::CommandSynthesizer::new(command_config)))
        }
        _ => Err(anyhow!("Unknown synthesis provider: {}", config.provider)),
    }
}

type SynthesizerFactory = Box<dyn Fn() -> BoxFuture<'static, Result<Arc<dyn Synthesizer>>> + Send + Sync>;

/// Shared, lazily constructed synthesizer. Concurrent first use builds it
/// once; the cell guards construction only, calls are not serialized here.
pub struct EngineHandle {
    cell: OnceCell<Arc<dyn Synthesizer>>,
    factory: SynthesizerFactory,
}

impl EngineHandle {
    pub fn new(config: SynthesisConfig, storage: Arc<dyn Storage>) -> Self {
        Self::with_factory(move || {
            let config = config.clone();
            let storage = storage.clone();
            Box::pin(async move { create_synthesizer(&config, storage).await })
        })
    }

    pub fn with_factory<F>(factory: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, Result<Arc<dyn Synthesizer>>> + Send + Sync + 'static,
    {
        Self {
            cell: OnceCell::new(),
            factory: Box::new(factory),
        }
    }

    pub fn from_synthesizer(synthesizer: Arc<dyn Synthesizer>) -> Self {
        Self {
            cell: OnceCell::new_with(Some(synthesizer)),
            factory: Box::new(|| -> BoxFuture<'static, Result<Arc<dyn Synthesizer>>> {
                Box::pin(async { Err(anyhow!("synthesizer already constructed")) })
            }),
        }
    }

    pub async fn get(&self) -> Result<Arc<dyn Synthesizer>> {
        self.cell
            .get_or_try_init(|| (self.factory)())
            .await
            .map(Arc::clone)
    }
}
