//! Broadcast programs and per-channel day listings.

use crate::{Channel, ChannelId, Date, ModelError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

const MINUTES_PER_DAY: u16 = 24 * 60;

/// Typed optional field of a program.
///
/// `Title` is listed here as well so search requests can select it the
/// same way as the optional fields; [`Program::field`] resolves it to
/// the mandatory title.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ProgramField {
    Title,
    Description,
    ShortDescription,
    Actors,
    Director,
    Genre,
    Episode,
    AgeRating,
    Url,
}

/// A single broadcast event.
///
/// Identified by the composite key (channel id, date, start offset).
/// Immutable once constructed by a data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    channel_id: ChannelId,
    date: Date,
    /// Start time in minutes since midnight.
    start_minutes: u16,
    /// Length in minutes, when the source knows it.
    length_minutes: Option<u16>,
    title: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    fields: BTreeMap<ProgramField, String>,
}

impl Program {
    pub fn new(
        channel_id: impl Into<ChannelId>,
        date: Date,
        start_minutes: u16,
        title: impl Into<String>,
    ) -> Result<Self> {
        if start_minutes >= MINUTES_PER_DAY {
            return Err(ModelError::StartOutOfRange { start_minutes });
        }
        Ok(Self {
            channel_id: channel_id.into(),
            date,
            start_minutes,
            length_minutes: None,
            title: title.into(),
            fields: BTreeMap::new(),
        })
    }

    pub fn with_length(mut self, minutes: u16) -> Self {
        self.length_minutes = Some(minutes);
        self
    }

    pub fn with_field(mut self, field: ProgramField, value: impl Into<String>) -> Self {
        if field == ProgramField::Title {
            self.title = value.into();
        } else {
            self.fields.insert(field, value.into());
        }
        self
    }

    pub fn channel_id(&self) -> &ChannelId {
        &self.channel_id
    }

    pub fn date(&self) -> Date {
        self.date
    }

    pub fn start_minutes(&self) -> u16 {
        self.start_minutes
    }

    pub fn length_minutes(&self) -> Option<u16> {
        self.length_minutes
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the requested field, the title included.
    pub fn field(&self, field: ProgramField) -> Option<&str> {
        match field {
            ProgramField::Title => Some(&self.title),
            other => self.fields.get(&other).map(String::as_str),
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:02}:{:02} {}",
            self.date,
            self.start_minutes / 60,
            self.start_minutes % 60,
            self.title
        )
    }
}

/// One channel's ordered listings for one calendar date.
///
/// Programs are sorted by start time; two programs starting at the
/// same minute are rejected at construction. An empty channel-day is
/// valid and means "known to have no programs", which is distinct from
/// "not yet fetched" (the latter is the absence of the record).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDayProgram {
    channel: Channel,
    date: Date,
    programs: Vec<Program>,
}

impl ChannelDayProgram {
    /// Builds a channel-day from unordered programs.
    ///
    /// Sorts by start time and rejects duplicate start offsets, which
    /// would break the monotonically-increasing invariant callers rely
    /// on when rendering and searching.
    pub fn try_new(channel: Channel, date: Date, mut programs: Vec<Program>) -> Result<Self> {
        programs.sort_by_key(Program::start_minutes);
        for pair in programs.windows(2) {
            if pair[0].start_minutes() == pair[1].start_minutes() {
                return Err(ModelError::OverlappingPrograms {
                    channel: channel.id().clone(),
                    date,
                    start_minutes: pair[1].start_minutes(),
                });
            }
        }
        Ok(Self {
            channel,
            date,
            programs,
        })
    }

    /// A channel-day known to contain no programs.
    pub fn empty(channel: Channel, date: Date) -> Self {
        Self {
            channel,
            date,
            programs: Vec::new(),
        }
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn channel_id(&self) -> &ChannelId {
        self.channel.id()
    }

    pub fn date(&self) -> Date {
        self.date
    }

    pub fn programs(&self) -> &[Program] {
        &self.programs
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Program> {
        self.programs.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> Channel {
        Channel::new("arte", "example.sdf", "Arte")
    }

    fn date() -> Date {
        Date::from_ymd(2024, 5, 1).unwrap()
    }

    #[test]
    fn test_program_rejects_start_past_midnight() {
        assert!(matches!(
            Program::new("arte", date(), 24 * 60, "Too late"),
            Err(ModelError::StartOutOfRange { .. })
        ));
    }

    #[test]
    fn test_field_lookup_includes_title() {
        let p = Program::new("arte", date(), 600, "News")
            .unwrap()
            .with_field(ProgramField::Genre, "information");
        assert_eq!(p.field(ProgramField::Title), Some("News"));
        assert_eq!(p.field(ProgramField::Genre), Some("information"));
        assert_eq!(p.field(ProgramField::Actors), None);
    }

    #[test]
    fn test_channel_day_sorts_by_start() {
        let programs = vec![
            Program::new("arte", date(), 1200, "Evening").unwrap(),
            Program::new("arte", date(), 480, "Morning").unwrap(),
        ];
        let cdp = ChannelDayProgram::try_new(channel(), date(), programs).unwrap();
        let starts: Vec<u16> = cdp.iter().map(Program::start_minutes).collect();
        assert_eq!(starts, vec![480, 1200]);
    }

    #[test]
    fn test_channel_day_rejects_duplicate_start() {
        let programs = vec![
            Program::new("arte", date(), 480, "A").unwrap(),
            Program::new("arte", date(), 480, "B").unwrap(),
        ];
        assert!(matches!(
            ChannelDayProgram::try_new(channel(), date(), programs),
            Err(ModelError::OverlappingPrograms { .. })
        ));
    }

    #[test]
    fn test_empty_channel_day_is_known_empty() {
        let cdp = ChannelDayProgram::empty(channel(), date());
        assert!(cdp.is_empty());
        assert_eq!(cdp.len(), 0);
    }
}
