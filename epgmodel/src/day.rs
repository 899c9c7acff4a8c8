//! Multi-channel aggregation of one calendar day.

use crate::{ChannelDayProgram, ChannelId, Date, ModelError, Program, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// All known listings for one calendar date, at most one
/// [`ChannelDayProgram`] per channel.
///
/// Created on first access to a date and filled in incrementally as
/// missing channels are loaded from disk or downloaded. Only the day
/// cache mutates it, through [`DayProgram::add`], which rejects a
/// second channel-day for the same channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayProgram {
    date: Date,
    entries: BTreeMap<ChannelId, ChannelDayProgram>,
}

impl DayProgram {
    pub fn new(date: Date) -> Self {
        Self {
            date,
            entries: BTreeMap::new(),
        }
    }

    pub fn date(&self) -> Date {
        self.date
    }

    /// Attaches a channel-day. Fails if the channel is already present.
    pub fn add(&mut self, channel_day: ChannelDayProgram) -> Result<()> {
        let id = channel_day.channel_id().clone();
        if self.entries.contains_key(&id) {
            return Err(ModelError::DuplicateChannel {
                channel: id,
                date: self.date,
            });
        }
        self.entries.insert(id, channel_day);
        Ok(())
    }

    /// Replaces the channel-day for a channel, returning the previous one.
    ///
    /// Used when a cached date is rebuilt from fresher on-disk data.
    pub fn replace(&mut self, channel_day: ChannelDayProgram) -> Option<ChannelDayProgram> {
        self.entries
            .insert(channel_day.channel_id().clone(), channel_day)
    }

    pub fn get(&self, channel: &ChannelId) -> Option<&ChannelDayProgram> {
        self.entries.get(channel)
    }

    pub fn contains(&self, channel: &ChannelId) -> bool {
        self.entries.contains_key(channel)
    }

    /// Number of channels with a known channel-day.
    pub fn channel_count(&self) -> usize {
        self.entries.len()
    }

    /// True when no channel has any known data for this date.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Channel-days in stable (channel id) order.
    pub fn iter(&self) -> impl Iterator<Item = &ChannelDayProgram> {
        self.entries.values()
    }

    /// Every program of the day across all channels.
    pub fn programs(&self) -> impl Iterator<Item = &Program> {
        self.entries.values().flat_map(ChannelDayProgram::iter)
    }
}
