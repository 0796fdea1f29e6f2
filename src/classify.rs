//! Device classification by name heuristics
//!
//! Device names are matched case-insensitively against per-type keyword lists.
//! New hardware keeps showing up with new names, so the lists are data: the
//! defaults below can be extended from the settings file.

use crate::device::DeviceType;
use crate::settings::Settings;
use std::collections::BTreeSet;

const TOUCHPADS: &[&str] = &[
    "touchpad",
    "glidepoint",
    "fingersensingpad",
    "bcm5974",
    "trackpad",
    "smartpad",
];
const TRACKPOINTS: &[&str] = &[
    "trackpoint",
    "accu point",
    "trackstick",
    "touchstyk",
    "pointing stick",
    "dualpoint stick",
];
const TOUCHSCREENS: &[&str] = &["touchscreen", "maxtouch"];
const FINGER_TOUCHES: &[&str] = &["finger touch"];
const PENS: &[&str] = &["pen stylus", "pen eraser"];

/// Keyword lists per switchable type, kept in match priority order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordTable {
    entries: Vec<(DeviceType, Vec<String>)>,
}

impl Default for KeywordTable {
    fn default() -> Self {
        let owned = |words: &[&str]| words.iter().map(|w| w.to_string()).collect();
        Self {
            entries: vec![
                (DeviceType::Touchpad, owned(TOUCHPADS)),
                (DeviceType::Trackpoint, owned(TRACKPOINTS)),
                (DeviceType::Touchscreen, owned(TOUCHSCREENS)),
                (DeviceType::Fingertouch, owned(FINGER_TOUCHES)),
                (DeviceType::Pen, owned(PENS)),
            ],
        }
    }
}

impl KeywordTable {
    /// Append keywords to one type's list. Blank entries are ignored.
    pub fn with_keywords<I, S>(mut self, device_type: DeviceType, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if let Some((_, list)) = self.entries.iter_mut().find(|(t, _)| *t == device_type) {
            for keyword in keywords {
                let keyword = keyword.as_ref().trim().to_lowercase();
                if !keyword.is_empty() && !list.contains(&keyword) {
                    list.push(keyword);
                }
            }
        }
        self
    }

    pub fn keywords(&self, device_type: DeviceType) -> &[String] {
        self.entries
            .iter()
            .find(|(t, _)| *t == device_type)
            .map(|(_, list)| list.as_slice())
            .unwrap_or(&[])
    }

    fn lookup(&self, lowered: &str) -> Option<DeviceType> {
        self.entries
            .iter()
            .find(|(_, list)| list.iter().any(|k| lowered.contains(k.as_str())))
            .map(|(t, _)| *t)
    }
}

/// Maps device names to [`DeviceType`]s
#[derive(Debug, Clone)]
pub struct Classifier {
    table: KeywordTable,
    /// Lowercased names the user wants ignored
    excluded: BTreeSet<String>,
}

impl Classifier {
    pub fn new<I, S>(table: KeywordTable, excluded: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let excluded = excluded
            .into_iter()
            .map(|name| name.as_ref().trim().to_lowercase())
            .filter(|name| !name.is_empty())
            .collect();
        Self { table, excluded }
    }

    /// Build the table from defaults plus the user's keyword additions,
    /// possible touchpad and exclusion list
    pub fn from_settings(settings: &Settings) -> Self {
        let mut table = KeywordTable::default();
        for device_type in DeviceType::MANAGED {
            table = table.with_keywords(device_type, settings.keywords.get(device_type));
        }
        if let Some(possible) = settings.possible_touchpad() {
            table = table.with_keywords(DeviceType::Touchpad, [possible]);
        }
        Self::new(table, &settings.excluded_mouses)
    }

    pub fn table(&self) -> &KeywordTable {
        &self.table
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.excluded.contains(&name.trim().to_lowercase())
    }

    /// Exclusions win, then the keyword table in priority order, then `Mouse`
    pub fn classify(&self, name: &str) -> DeviceType {
        if self.is_excluded(name) {
            return DeviceType::Other;
        }
        let lowered = name.to_lowercase();
        self.table.lookup(&lowered).unwrap_or(DeviceType::Mouse)
    }
}
