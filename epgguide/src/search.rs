//! Pattern search over the cached listings.
//!
//! Searching walks the guide's day programs (days outer, channels
//! inner), so it sees exactly what the rest of the application sees:
//! cached days, store-backed days, and (when online) days fetched on
//! the spot. A long stretch of channel-days with no data at all makes
//! it give up early rather than hammer the sources for a range nobody
//! downloaded.

use crate::Guide;
use epgmodel::{Channel, Date, Program, ProgramField};
use regex::{Regex, RegexBuilder};
use tracing::{debug, info};

/// Consecutive channel-days with no data before a scan gives up.
///
/// The counter is global across the whole scan and resets whenever a
/// channel-day is present, empty listings included.
pub const MAX_CONSECUTIVE_MISSES: usize = 10;

/// Errors raised while preparing a search.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The pattern failed to compile. Raised before any data is
    /// scanned.
    #[error("invalid search pattern: {0}")]
    BadPattern(#[from] regex::Error),
}

/// A compiled-on-demand search query.
///
/// `pattern` is a regular expression when `regex` is set and a literal
/// substring otherwise. `fields` selects which program fields are
/// examined; empty means title only.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub pattern: String,
    pub regex: bool,
    pub case_sensitive: bool,
    pub fields: Vec<ProgramField>,
}

impl SearchRequest {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            regex: false,
            case_sensitive: false,
            fields: vec![ProgramField::Title],
        }
    }

    pub fn with_regex(mut self, regex: bool) -> Self {
        self.regex = regex;
        self
    }

    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn with_fields(mut self, fields: Vec<ProgramField>) -> Self {
        self.fields = fields;
        self
    }

    /// Compiles the pattern, escaping it first unless it is meant as a
    /// regular expression.
    fn compile(&self) -> Result<Regex, SearchError> {
        let pattern = if self.regex {
            self.pattern.clone()
        } else {
            regex::escape(&self.pattern)
        };
        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(!self.case_sensitive)
            .build()?;
        Ok(regex)
    }

    fn fields(&self) -> &[ProgramField] {
        if self.fields.is_empty() {
            &[ProgramField::Title]
        } else {
            &self.fields
        }
    }
}

impl Guide {
    /// Searches the inclusive range `[start, start + day_count]` for
    /// the subset `channels` of the subscribed channels.
    ///
    /// A negative `day_count` searches backwards: the range becomes
    /// `[start + day_count, start]`. The pattern is validated before
    /// any data is touched. Matches are returned in (date, channel,
    /// start time) order.
    pub async fn search(
        &self,
        request: &SearchRequest,
        channels: &[Channel],
        start: Date,
        day_count: i32,
    ) -> Result<Vec<Program>, SearchError> {
        let regex = request.compile()?;
        let fields = request.fields();

        let (start, day_count) = if day_count < 0 {
            (start.add_days(day_count), -day_count)
        } else {
            (start, day_count)
        };

        let mut matches = Vec::new();
        let mut misses = 0usize;

        'scan: for offset in 0..=day_count {
            // Give up before assembling (or fetching) another day
            if misses >= MAX_CONSECUTIVE_MISSES {
                debug!(misses, "No data in sight, abandoning search");
                break;
            }
            let date = start.add_days(offset);
            let day = self.get_day_program(date).await;
            for channel in channels {
                if misses >= MAX_CONSECUTIVE_MISSES {
                    debug!(misses, date = %date, "No data in sight, abandoning search");
                    break 'scan;
                }
                let listings = day.as_ref().and_then(|day| day.get(channel.id()));
                match listings {
                    Some(listings) => {
                        misses = 0;
                        for program in listings.iter() {
                            let hit = fields
                                .iter()
                                .filter_map(|field| program.field(*field))
                                .any(|value| regex.is_match(value));
                            if hit {
                                matches.push(program.clone());
                            }
                        }
                    }
                    None => misses += 1,
                }
            }
        }

        info!(
            pattern = %request.pattern,
            hits = matches.len(),
            "Search finished"
        );
        Ok(matches)
    }
}
