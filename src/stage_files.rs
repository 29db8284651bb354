//! # Stage Files Module
//!
//! Parsing of `{number}-{stage}.{ext}` file names and analysis of a folder
//! listing: which event numbers exist, which are complete, which still wait
//! for their end screenshot.
//!
//! ## Naming contract
//!
//! - `number` is a positive decimal integer without leading zeros
//! - `stage` is `1` (start) or `2` (end)
//! - `ext` is one of `jpg`, `jpeg`, `png`, `gif`, compared case-insensitively
//!
//! Names that do not follow the contract are ignored, they never influence
//! numbering.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sequence number of a two-stage event within one folder
pub type EventNumber = u32;

/// Extensions accepted for stage files
pub const STAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "gif"];
pub const DEFAULT_EXTENSION: &str = "jpg";

const STAGE_FILE_PATTERN: &str = r"(?i)^([1-9][0-9]*)-([12])\.(jpg|jpeg|png|gif)$";

lazy_static! {
    static ref STAGE_FILE_REGEX: Regex =
        Regex::new(STAGE_FILE_PATTERN).expect("Stage file pattern should be valid");
}

/// Phase of a two-stage event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Start,
    End,
}

impl Stage {
    /// Digit used in file names
    pub fn digit(self) -> u8 {
        match self {
            Stage::Start => 1,
            Stage::End => 2,
        }
    }

    fn from_digit(digit: &str) -> Option<Self> {
        match digit {
            "1" => Some(Stage::Start),
            "2" => Some(Stage::End),
            _ => None,
        }
    }
}

/// A parsed stage file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFile {
    pub number: EventNumber,
    pub stage: Stage,
    /// Extension as it appeared in the name
    pub extension: String,
}

impl StageFile {
    /// Parse a file name, returning `None` if it does not follow the contract
    pub fn parse(name: &str) -> Option<Self> {
        let captures = STAGE_FILE_REGEX.captures(name)?;
        let number = captures.get(1)?.as_str().parse::<EventNumber>().ok()?;
        let stage = Stage::from_digit(captures.get(2)?.as_str())?;
        let extension = captures.get(3)?.as_str().to_string();
        Some(Self {
            number,
            stage,
            extension,
        })
    }

    /// Build the file name for an event stage
    ///
    /// Unknown extensions are replaced with `jpg` so the result always parses.
    pub fn file_name(number: EventNumber, stage: Stage, extension: &str) -> String {
        format!("{}-{}.{}", number, stage.digit(), normalize_extension(extension))
    }
}

/// Lowercase an extension and map it into the accepted set
pub fn normalize_extension(extension: &str) -> &'static str {
    let lowered = extension.trim_start_matches('.').to_ascii_lowercase();
    STAGE_EXTENSIONS
        .into_iter()
        .find(|candidate| *candidate == lowered)
        .unwrap_or(DEFAULT_EXTENSION)
}

/// Which stages exist for one event number
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StagePresence {
    pub start: bool,
    pub end: bool,
}

/// Counters reported for a folder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EventSummary {
    /// Distinct numbers with at least one stage file
    pub total: usize,
    /// Numbers with both stages
    pub completed: usize,
    /// Numbers with a start but no end
    pub incomplete: usize,
    /// Numbers with an end but no start
    pub end_only: usize,
}

/// Stage files found in one remote folder, indexed by event number
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderListing {
    events: BTreeMap<EventNumber, StagePresence>,
}

impl FolderListing {
    /// Index the stage files among `names`; other names are skipped
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut events: BTreeMap<EventNumber, StagePresence> = BTreeMap::new();
        for name in names {
            if let Some(file) = StageFile::parse(name.as_ref()) {
                let presence = events.entry(file.number).or_default();
                match file.stage {
                    Stage::Start => presence.start = true,
                    Stage::End => presence.end = true,
                }
            }
        }
        Self { events }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Distinct event numbers in ascending order
    pub fn numbers(&self) -> Vec<EventNumber> {
        self.events.keys().copied().collect()
    }

    pub fn max_number(&self) -> Option<EventNumber> {
        self.events.keys().next_back().copied()
    }

    pub fn presence(&self, number: EventNumber) -> StagePresence {
        self.events.get(&number).copied().unwrap_or_default()
    }

    pub fn has_start(&self, number: EventNumber) -> bool {
        self.presence(number).start
    }

    pub fn has_end(&self, number: EventNumber) -> bool {
        self.presence(number).end
    }

    /// Numbers with a start file and no end file, ascending
    pub fn unfinished(&self) -> Vec<EventNumber> {
        self.events
            .iter()
            .filter(|(_, presence)| presence.start && !presence.end)
            .map(|(number, _)| *number)
            .collect()
    }

    /// Lowest unfinished number
    pub fn first_unfinished(&self) -> Option<EventNumber> {
        self.unfinished().into_iter().next()
    }

    /// `max + 1`, or `1` for a folder without stage files
    ///
    /// `None` once the folder already holds `EventNumber::MAX`.
    pub fn next_number(&self) -> Option<EventNumber> {
        match self.max_number() {
            Some(max) => max.checked_add(1),
            None => Some(1),
        }
    }

    /// Smallest number `>= candidate` with neither stage file present,
    /// `None` when every number up to `EventNumber::MAX` is taken
    pub fn first_free_from(&self, candidate: EventNumber) -> Option<EventNumber> {
        let mut number = candidate.max(1);
        while self.events.contains_key(&number) {
            number = number.checked_add(1)?;
        }
        Some(number)
    }

    pub fn summary(&self) -> EventSummary {
        let mut summary = EventSummary {
            total: self.events.len(),
            ..EventSummary::default()
        };
        for presence in self.events.values() {
            match (presence.start, presence.end) {
                (true, true) => summary.completed += 1,
                (true, false) => summary.incomplete += 1,
                (false, true) => summary.end_only += 1,
                (false, false) => {}
            }
        }
        summary
    }
}
