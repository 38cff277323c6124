use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::core::dataset::DialogueRecord;

/// Fixed words spoken in place of the player's name, class and race.
/// Uppercase macros (`$N`, `$C`, `$R`) get the capitalized form.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StandIns {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_class")]
    pub class: String,
    #[serde(default = "default_race")]
    pub race: String,
}

fn default_name() -> String {
    "aventurier".to_string()
}
fn default_class() -> String {
    "aventurier".to_string()
}
fn default_race() -> String {
    "voyageur".to_string()
}

impl Default for StandIns {
    fn default() -> Self {
        Self {
            name: default_name(),
            class: default_class(),
            race: default_race(),
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PlayerGender {
    None,
    Male,
    Female,
}

impl PlayerGender {
    /// File-name prefix for gendered renderings.
    pub fn prefix(self) -> Option<&'static str> {
        match self {
            PlayerGender::None => None,
            PlayerGender::Male => Some("m"),
            PlayerGender::Female => Some("f"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NormalizedVariant {
    pub record: Arc<DialogueRecord>,
    pub cleaned_text: String,
    pub player_gender: PlayerGender,
    pub race: &'static str,
    pub gender: &'static str,
    /// md5 of template text + race + gender. Shared by both gendered
    /// renderings of one record.
    pub content_hash: String,
    /// False when macros or markup survived cleaning.
    pub valid: bool,
}

pub fn content_hash(original_text: &str, race: &str, gender: &str) -> String {
    let digest = md5::compute(format!("{}{}{}", original_text, race, gender));
    format!("{:x}", digest)
}

pub struct Normalizer {
    replacements: Vec<(&'static str, String)>,
    gender_pattern: Regex,
    markup_pattern: Regex,
}

impl Normalizer {
    pub fn new(stand_ins: &StandIns) -> Self {
        let replacements = vec![
            ("$b", "\n".to_string()),
            ("$B", "\n".to_string()),
            ("$n", stand_ins.name.clone()),
            ("$N", capitalize(&stand_ins.name)),
            ("$c", stand_ins.class.clone()),
            ("$C", capitalize(&stand_ins.class)),
            ("$r", stand_ins.race.clone()),
            ("$R", capitalize(&stand_ins.race)),
        ];

        Self {
            replacements,
            gender_pattern: Regex::new(r"\$[Gg]\s*([^:;]+?)\s*:\s*([^:;]+?)\s*;")
                .expect("static regex"),
            markup_pattern: Regex::new(r"<[^<>]*>\s*").expect("static regex"),
        }
    }

    /// Expands one record into one variant, or two (male, female) when the
    /// text carries a `$G male:female;` macro.
    pub fn normalize(&self, record: Arc<DialogueRecord>) -> Vec<NormalizedVariant> {
        let race = record.race();
        let gender = record.gender();
        let hash = content_hash(&record.original_text, race, gender);

        let mut text = record.text.clone();
        for (macro_, word) in &self.replacements {
            text = text.replace(macro_, word);
        }

        let renderings = if self.gender_pattern.is_match(&text) {
            let male = self
                .gender_pattern
                .replace_all(&text, |caps: &Captures| caps[1].to_string())
                .into_owned();
            let female = self
                .gender_pattern
                .replace_all(&text, |caps: &Captures| caps[2].to_string())
                .into_owned();
            vec![(male, PlayerGender::Male), (female, PlayerGender::Female)]
        } else {
            vec![(text, PlayerGender::None)]
        };

        renderings
            .into_iter()
            .map(|(text, player_gender)| {
                let cleaned_text = self.markup_pattern.replace_all(&text, "").into_owned();
                let valid = !cleaned_text.contains(['$', '<', '>']);
                NormalizedVariant {
                    record: record.clone(),
                    cleaned_text,
                    player_gender,
                    race,
                    gender,
                    content_hash: hash.clone(),
                    valid,
                }
            })
            .collect()
    }

    pub fn normalize_all(&self, records: Vec<DialogueRecord>) -> Vec<NormalizedVariant> {
        records
            .into_iter()
            .flat_map(|r| self.normalize(Arc::new(r)))
            .collect()
    }
}

/// Characters that synthesis would have to render: unique voiced texts per
/// reference voice, progress lines excluded.
pub fn estimate_characters(variants: &[NormalizedVariant]) -> usize {
    let mut seen = HashSet::new();
    variants
        .iter()
        .filter(|v| !v.record.is_progress())
        .filter(|v| seen.insert((v.cleaned_text.as_str(), v.race, v.gender)))
        .map(|v| v.cleaned_text.chars().count())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dataset::record;

    fn normalizer() -> Normalizer {
        Normalizer::new(&StandIns::default())
    }

    #[test]
    fn test_plain_text_single_variant() {
        let variants = normalizer().normalize(Arc::new(record("Salut, $n.$bBonne route, $C.", "", "gossip")));
        assert_eq!(variants.len(), 1);
        let v = &variants[0];
        assert_eq!(v.player_gender, PlayerGender::None);
        assert_eq!(v.cleaned_text, "Salut, aventurier.\nBonne route, Aventurier.");
        assert!(v.valid);
    }

    #[test]
    fn test_gender_macro_two_variants() {
        let rec = Arc::new(record("Merci, $Gmon frère:ma sœur;. Le $r vous salue.", "", "gossip"));
        let variants = normalizer().normalize(rec);
        assert_eq!(variants.len(), 2);

        let (male, female) = (&variants[0], &variants[1]);
        assert_eq!(male.player_gender, PlayerGender::Male);
        assert_eq!(female.player_gender, PlayerGender::Female);
        assert_eq!(male.cleaned_text, "Merci, mon frère. Le voyageur vous salue.");
        assert_eq!(female.cleaned_text, "Merci, ma sœur. Le voyageur vous salue.");
        assert_eq!(male.content_hash, female.content_hash);
    }

    #[test]
    fn test_lowercase_gender_macro_and_spacing() {
        let variants = normalizer().normalize(Arc::new(record("Bien, $g lad : lass ; !", "", "gossip")));
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].cleaned_text, "Bien, lad !");
        assert_eq!(variants[1].cleaned_text, "Bien, lass !");
    }

    #[test]
    fn test_every_gender_match_substituted() {
        let variants = normalizer().normalize(Arc::new(record("$Gsir:madame; et $Gsir:madame;", "", "gossip")));
        assert_eq!(variants[0].cleaned_text, "sir et sir");
        assert_eq!(variants[1].cleaned_text, "madame et madame");
    }

    #[test]
    fn test_markup_stripped() {
        let variants = normalizer().normalize(Arc::new(record("<Il vous regarde.> Partez.", "", "gossip")));
        assert_eq!(variants[0].cleaned_text, "Partez.");
        assert!(variants[0].valid);
    }

    #[test]
    fn test_unresolved_macro_invalid() {
        let variants = normalizer().normalize(Arc::new(record("Vous avez $5 pièces.", "", "gossip")));
        assert_eq!(variants.len(), 1);
        assert!(!variants[0].valid);

        let variants = normalizer().normalize(Arc::new(record("a > b", "", "gossip")));
        assert!(!variants[0].valid);
    }

    #[test]
    fn test_hash_depends_on_template_race_gender_only() {
        let a = record("Bonjour.", "", "gossip");
        let mut b = record("Bonjour.", "42", "accept");
        b.id = 999;
        let mut c = a.clone();
        c.display_sex_id = 1;

        let n = normalizer();
        let ha = &n.normalize(Arc::new(a))[0].content_hash;
        let hb = &n.normalize(Arc::new(b))[0].content_hash;
        let hc = &n.normalize(Arc::new(c))[0].content_hash;
        assert_eq!(ha, hb);
        assert_ne!(ha, hc);
        assert_eq!(ha, &content_hash("Bonjour.", "human", "male"));
        assert_eq!(ha.len(), 32);
    }

    #[test]
    fn test_custom_stand_ins() {
        let stand_ins = StandIns {
            name: "adventurer".to_string(),
            class: "hero".to_string(),
            race: "traveler".to_string(),
        };
        let variants = Normalizer::new(&stand_ins).normalize(Arc::new(record("$N the $c, $R", "", "gossip")));
        assert_eq!(variants[0].cleaned_text, "Adventurer the hero, Traveler");
    }

    #[test]
    fn test_estimate_characters() {
        let n = normalizer();
        let variants = n.normalize_all(vec![
            record("abcd", "", "gossip"),
            record("abcd", "", "gossip"),
            record("xyz", "1", "progress"),
            record("$Gab:cde;", "2", "accept"),
        ]);
        assert_eq!(variants.len(), 5);
        assert_eq!(estimate_characters(&variants), 4 + 2 + 3);
    }
}
