//! Report categories and the remote folder layout derived from them.
//!
//! Folder names are part of the storage contract with existing reports and
//! must stay byte-for-byte identical.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::clock::{is_night_window, week_label};

/// Categories saved from a single screenshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SingleShotKind {
    Punishments,
    MpHelp,
}

/// Categories tracked as two-stage events (start and end screenshots)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TwoStageKind {
    Mp,
    Raids,
    Supplies,
}

/// Any category that owns a folder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderKind {
    Single(SingleShotKind),
    TwoStage(TwoStageKind),
}

impl SingleShotKind {
    pub fn day_folder(self) -> &'static str {
        match self {
            SingleShotKind::Punishments => "Наказания в игре",
            SingleShotKind::MpHelp => "Помощь в МП",
        }
    }

    pub fn night_folder(self) -> Option<&'static str> {
        match self {
            SingleShotKind::Punishments => Some("Ночные наказания в игре"),
            SingleShotKind::MpHelp => None,
        }
    }

    /// Prefix of generated file names
    pub fn file_prefix(self) -> &'static str {
        match self {
            SingleShotKind::Punishments => "punishment",
            SingleShotKind::MpHelp => "mp_help",
        }
    }
}

impl TwoStageKind {
    pub const ALL: [TwoStageKind; 3] = [TwoStageKind::Mp, TwoStageKind::Raids, TwoStageKind::Supplies];

    /// Stable key used for pending entries and callback data
    pub fn key(self) -> &'static str {
        match self {
            TwoStageKind::Mp => "mp",
            TwoStageKind::Raids => "raids",
            TwoStageKind::Supplies => "supplies",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.key() == key)
    }

    pub fn day_folder(self) -> &'static str {
        match self {
            TwoStageKind::Mp => "МП",
            TwoStageKind::Raids => "Налёты, захваты",
            TwoStageKind::Supplies => "Поставки, ограбления (Краз, Air)",
        }
    }

    pub fn night_folder(self) -> Option<&'static str> {
        match self {
            TwoStageKind::Mp => None,
            TwoStageKind::Raids => Some("Ночные налеты, захваты"),
            TwoStageKind::Supplies => Some("Ночные поставки, ограбления (Краз, Air)"),
        }
    }
}

impl fmt::Display for TwoStageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FolderKind {
    /// Folder name for the given time of day; categories without a night
    /// variant always use the day folder.
    pub fn folder_name(self, night: bool) -> &'static str {
        let (day, night_variant) = match self {
            FolderKind::Single(kind) => (kind.day_folder(), kind.night_folder()),
            FolderKind::TwoStage(kind) => (kind.day_folder(), kind.night_folder()),
        };
        match (night, night_variant) {
            (true, Some(name)) => name,
            _ => day,
        }
    }

    /// Every folder of a week, day and night variants included
    pub fn all_folder_names() -> Vec<&'static str> {
        let mut names = vec![
            SingleShotKind::Punishments.day_folder(),
            TwoStageKind::Mp.day_folder(),
            SingleShotKind::MpHelp.day_folder(),
            TwoStageKind::Raids.day_folder(),
            TwoStageKind::Supplies.day_folder(),
        ];
        names.extend(
            [
                SingleShotKind::Punishments.night_folder(),
                TwoStageKind::Raids.night_folder(),
                TwoStageKind::Supplies.night_folder(),
            ]
            .into_iter()
            .flatten(),
        );
        names
    }
}

impl From<TwoStageKind> for FolderKind {
    fn from(kind: TwoStageKind) -> Self {
        FolderKind::TwoStage(kind)
    }
}

impl From<SingleShotKind> for FolderKind {
    fn from(kind: SingleShotKind) -> Self {
        FolderKind::Single(kind)
    }
}

/// A fully resolved remote folder `{base}/{week label}/{category folder}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FolderKey {
    pub base_path: String,
    pub week_label: String,
    pub folder_name: String,
}

impl FolderKey {
    pub fn new(base_path: &str, week_label: &str, folder_name: &str) -> Self {
        Self {
            base_path: base_path.trim_end_matches('/').to_string(),
            week_label: week_label.to_string(),
            folder_name: folder_name.to_string(),
        }
    }

    /// Resolve the folder for a category at instant `at`
    ///
    /// The week label uses the local date of `at`, the night variant the
    /// fixed UTC+3 night window.
    pub fn resolve(base_path: &str, kind: impl Into<FolderKind>, at: DateTime<Utc>) -> Self {
        let label = week_label(at.with_timezone(&Local).date_naive());
        let folder = kind.into().folder_name(is_night_window(at));
        Self::new(base_path, &label, folder)
    }

    /// `{base}/{week label}`
    pub fn week_path(&self) -> String {
        format!("{}/{}", self.base_path, self.week_label)
    }

    /// Full folder path
    pub fn path(&self) -> String {
        format!("{}/{}/{}", self.base_path, self.week_label, self.folder_name)
    }

    /// Path of a file inside this folder
    pub fn file_path(&self, file_name: &str) -> String {
        format!("{}/{}", self.path(), file_name)
    }
}

impl fmt::Display for FolderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_folder_name_variants() {
        let raids = FolderKind::from(TwoStageKind::Raids);
        assert_eq!(raids.folder_name(false), "Налёты, захваты");
        assert_eq!(raids.folder_name(true), "Ночные налеты, захваты");

        let mp = FolderKind::from(TwoStageKind::Mp);
        assert_eq!(mp.folder_name(true), "МП");

        let help = FolderKind::from(SingleShotKind::MpHelp);
        assert_eq!(help.folder_name(true), "Помощь в МП");

        let punish = FolderKind::from(SingleShotKind::Punishments);
        assert_eq!(punish.folder_name(true), "Ночные наказания в игре");
    }

    #[test]
    fn test_two_stage_keys_round_trip() {
        for kind in TwoStageKind::ALL {
            assert_eq!(TwoStageKind::from_key(kind.key()), Some(kind));
        }
        assert_eq!(TwoStageKind::from_key("punishments"), None);
    }

    #[test]
    fn test_all_folder_names() {
        let names = FolderKind::all_folder_names();
        assert_eq!(names.len(), 8);
        assert!(names.contains(&"Ночные поставки, ограбления (Краз, Air)"));
    }

    #[test]
    fn test_folder_key_path() {
        let key = FolderKey::new("/RMRPreport/", "10.03.25 – 16.03.25", "МП");
        assert_eq!(key.path(), "/RMRPreport/10.03.25 – 16.03.25/МП");
        assert_eq!(key.week_path(), "/RMRPreport/10.03.25 – 16.03.25");
        assert_eq!(key.file_path("3-1.jpg"), "/RMRPreport/10.03.25 – 16.03.25/МП/3-1.jpg");
    }

    #[test]
    fn test_resolve_switches_to_night_folder() {
        // 22:00 UTC is 01:00 at UTC+3
        let night = Utc.with_ymd_and_hms(2025, 3, 12, 22, 0, 0).unwrap();
        let key = FolderKey::resolve("/base", TwoStageKind::Supplies, night);
        assert_eq!(key.folder_name, "Ночные поставки, ограбления (Краз, Air)");

        let day = Utc.with_ymd_and_hms(2025, 3, 12, 12, 0, 0).unwrap();
        let key = FolderKey::resolve("/base", TwoStageKind::Supplies, day);
        assert_eq!(key.folder_name, "Поставки, ограбления (Краз, Air)");
        assert!(key.path().starts_with("/base/"));
    }
}
