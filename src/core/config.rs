use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::services::normalizer::StandIns;
use crate::services::synth::SynthesisConfig;

pub const CONFIG_FILE: &str = "config.yml";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_dataset")]
    pub dataset: String,

    #[serde(default = "default_input")]
    pub input_folder: String,

    #[serde(default = "default_output")]
    pub output_folder: String,

    /// Reference voice used when no `{race}-{gender}.ogg` sample exists.
    #[serde(default)]
    pub default_voice: Option<String>,

    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default)]
    pub mode: RunMode,

    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    #[serde(default = "default_progress_chunks")]
    pub progress_chunks: usize,

    #[serde(default)]
    pub force_regenerate: bool,

    #[serde(default)]
    pub stand_ins: StandIns,

    #[serde(default)]
    pub lookup: LookupConfig,

    #[serde(default)]
    pub synthesis: SynthesisConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Generator,
    GenLookupTables,
    #[default]
    All,
}

impl RunMode {
    pub fn synthesizes(self) -> bool {
        matches!(self, RunMode::Generator | RunMode::All)
    }

    pub fn builds_tables(self) -> bool {
        matches!(self, RunMode::GenLookupTables | RunMode::All)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LookupConfig {
    #[serde(default = "default_module_name")]
    pub module_name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_sub_namespace")]
    pub sub_namespace: String,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            module_name: default_module_name(),
            namespace: default_namespace(),
            sub_namespace: default_sub_namespace(),
        }
    }
}

impl LookupConfig {
    pub fn guard_clause(&self) -> String {
        format!(
            "if not {ns} or not {ns}.{sub} then return end",
            ns = self.namespace,
            sub = self.sub_namespace
        )
    }
}

fn default_dataset() -> String {
    "dialogue.csv".to_string()
}
fn default_input() -> String {
    "assets".to_string()
}
fn default_output() -> String {
    "generated".to_string()
}
fn default_language() -> String {
    "frFR".to_string()
}
fn default_max_workers() -> usize {
    2
}
fn default_progress_chunks() -> usize {
    5
}
fn default_module_name() -> String {
    "AI_VoiceOverData_Vanilla".to_string()
}
fn default_namespace() -> String {
    "VoiceOver".to_string()
}
fn default_sub_namespace() -> String {
    "DataModules".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dataset: default_dataset(),
            input_folder: default_input(),
            output_folder: default_output(),
            default_voice: None,
            language: default_language(),
            mode: RunMode::default(),
            max_workers: default_max_workers(),
            progress_chunks: default_progress_chunks(),
            force_regenerate: false,
            stand_ins: StandIns::default(),
            lookup: LookupConfig::default(),
            synthesis: SynthesisConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(CONFIG_FILE)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("{} not found. Please create one.", path.display());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    pub fn sounds_folder(&self) -> PathBuf {
        Path::new(&self.output_folder).join("sounds")
    }

    pub fn voices_folder(&self) -> PathBuf {
        Path::new(&self.input_folder).join("voices")
    }

    pub fn default_voice_path(&self) -> PathBuf {
        match &self.default_voice {
            Some(p) => PathBuf::from(p),
            None => Path::new(&self.input_folder)
                .join("sounds")
                .join("default")
                .join("medivh.mp3"),
        }
    }

    /// Two-letter code handed to the synthesizer, e.g. `frFR` -> `fr`.
    pub fn synthesis_language(&self) -> String {
        self.language.chars().take(2).collect::<String>().to_lowercase()
    }

    pub fn ensure_directories(&self) -> Result<()> {
        let sounds = self.sounds_folder();
        for dir in [sounds.join("quests"), sounds.join("gossip")] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}
