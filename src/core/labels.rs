//! Static lookups from the game's numeric IDs to the labels used in file
//! names and content hashes.

pub const UNKNOWN: &str = "unknown";

pub fn race_label(race_id: i64) -> &'static str {
    match race_id {
        1 => "human",
        2 => "orc",
        3 => "dwarf",
        4 => "nightelf",
        5 => "scourge",
        6 => "tauren",
        7 => "gnome",
        8 => "troll",
        9 => "goblin",
        10 => "bloodelf",
        11 => "draenei",
        _ => UNKNOWN,
    }
}

pub fn gender_label(sex_id: i64) -> &'static str {
    match sex_id {
        0 => "male",
        1 => "female",
        _ => UNKNOWN,
    }
}

/// Maps a client locale code to the numeric `language` column of the dataset.
pub fn language_number(code: &str) -> Option<i64> {
    let n = match code {
        "enUS" | "enGB" => 0,
        "koKR" => 1,
        "frFR" => 2,
        "deDE" => 3,
        "zhCN" => 4,
        "zhTW" => 5,
        "esES" => 6,
        "esMX" => 7,
        "ruRU" => 8,
        _ => return None,
    };
    Some(n)
}
