use anyhow::{anyhow, Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

use crate::core::labels;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum SpeakerKind {
    Creature,
    Gameobject,
    Item,
}

impl SpeakerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SpeakerKind::Creature => "creature",
            SpeakerKind::Gameobject => "gameobject",
            SpeakerKind::Item => "item",
        }
    }
}

/// One row of source dialogue, as exported from the world database.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DialogueRecord {
    #[serde(rename = "DisplayRaceID")]
    pub display_race_id: i64,
    #[serde(rename = "DisplaySexID")]
    pub display_sex_id: i64,
    pub text: String,
    pub original_text: String,
    pub source: String,
    #[serde(default)]
    pub quest: String,
    #[serde(default)]
    pub quest_title: String,
    pub name: String,
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: SpeakerKind,
    pub language: i64,
}

impl DialogueRecord {
    /// The quest key as it appears in file names, `None` for gossip.
    pub fn quest_key(&self) -> Option<&str> {
        let quest = self.quest.trim();
        if quest.is_empty() {
            None
        } else {
            Some(quest)
        }
    }

    pub fn quest_id(&self) -> Option<i64> {
        self.quest_key().and_then(|q| q.parse().ok())
    }

    pub fn race(&self) -> &'static str {
        labels::race_label(self.display_race_id)
    }

    pub fn gender(&self) -> &'static str {
        labels::gender_label(self.display_sex_id)
    }

    pub fn is_progress(&self) -> bool {
        self.source == "progress"
    }
}

pub fn read_records<R: Read>(reader: R) -> Result<Vec<DialogueRecord>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut records = Vec::new();
    for (i, row) in csv_reader.deserialize().enumerate() {
        let record: DialogueRecord =
            row.with_context(|| format!("Failed to parse dataset row {}", i + 1))?;
        records.push(record);
    }
    Ok(records)
}

/// Loads the dataset and keeps only rows in the requested client locale.
pub fn load_records(path: impl AsRef<Path>, language_code: &str) -> Result<Vec<DialogueRecord>> {
    let path = path.as_ref();
    let language = labels::language_number(language_code)
        .ok_or_else(|| anyhow!("Unknown language code: {}", language_code))?;

    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open dataset {}", path.display()))?;
    let mut records = read_records(file)?;
    let total = records.len();
    records.retain(|r| r.language == language);

    info!(
        "Loaded {} of {} dialogue records for {} from {}",
        records.len(),
        total,
        language_code,
        path.display()
    );
    Ok(records)
}

#[cfg(test)]
pub(crate) fn record(text: &str, quest: &str, source: &str) -> DialogueRecord {
    DialogueRecord {
        display_race_id: 1,
        display_sex_id: 0,
        text: text.to_string(),
        original_text: text.to_string(),
        source: source.to_string(),
        quest: quest.to_string(),
        quest_title: if quest.is_empty() { String::new() } else { format!("Quest {}", quest) },
        name: "Marshal Dughan".to_string(),
        id: 240,
        kind: SpeakerKind::Creature,
        language: 2,
    }
}
