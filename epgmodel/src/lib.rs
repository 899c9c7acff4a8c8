//! # EPGModel
//!
//! Value types shared by every EPGrid crate: calendar dates as compact
//! day counts, channels, broadcast programs and their per-day
//! aggregations.
//!
//! All types here are plain data: immutable once constructed (the only
//! mutation point is [`DayProgram::add`], which enforces the
//! one-channel-day-per-channel invariant) and `serde`-serializable so
//! the file store can persist them as JSON records.

mod channel;
mod date;
mod day;
mod program;

pub use channel::{Channel, ChannelId};
pub use date::Date;
pub use day::DayProgram;
pub use program::{ChannelDayProgram, Program, ProgramField};

/// Errors raised by model construction and mutation
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("day program for {date} already contains channel {channel}")]
    DuplicateChannel { channel: ChannelId, date: Date },

    #[error("programs for channel {channel} on {date} overlap at {start_minutes} minutes")]
    OverlappingPrograms {
        channel: ChannelId,
        date: Date,
        start_minutes: u16,
    },

    #[error("program start {start_minutes} is past the end of the day")]
    StartOutOfRange { start_minutes: u16 },
}

/// Result type specialised for model operations
pub type Result<T> = std::result::Result<T, ModelError>;
