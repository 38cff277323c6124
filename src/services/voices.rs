use log::warn;
use std::path::PathBuf;
use std::sync::Arc;

use crate::core::io::Storage;

/// Maps a speaker's race and gender to the reference sample the
/// synthesizer clones the voice from.
pub struct VoiceResolver {
    voices_folder: PathBuf,
    default_voice: PathBuf,
    storage: Arc<dyn Storage>,
}

impl VoiceResolver {
    pub fn new(voices_folder: PathBuf, default_voice: PathBuf, storage: Arc<dyn Storage>) -> Self {
        Self {
            voices_folder,
            default_voice,
            storage,
        }
    }

    pub fn sample_path(&self, race: &str, gender: &str) -> PathBuf {
        self.voices_folder.join(format!("{}-{}.ogg", race, gender))
    }

    /// Missing samples fall back to the default voice. Labels are not
    /// validated beyond that.
    pub async fn resolve(&self, race: &str, gender: &str) -> PathBuf {
        let sample = self.sample_path(race, gender);
        match self.storage.exists(&sample).await {
            Ok(true) => sample,
            Ok(false) => {
                warn!(
                    "No reference voice at {}, falling back to {}",
                    sample.display(),
                    self.default_voice.display()
                );
                self.default_voice.clone()
            }
            Err(e) => {
                warn!(
                    "Could not check reference voice {}: {:#}, falling back to {}",
                    sample.display(),
                    e,
                    self.default_voice.display()
                );
                self.default_voice.clone()
            }
        }
    }
}
