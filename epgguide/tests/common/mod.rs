//! Scriptable fake data source shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use epgmodel::{Channel, ChannelDayProgram, Date, Program};
use epgsource::{DataSource, Settings, SourceError, SourceRegistry};
use epgstore::FileStore;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const SOURCE_NAME: &str = "scripted.test";

type FetchHook = Box<dyn Fn(&Channel, Date) + Send + Sync>;

/// Per-unit scripted outcome; un-scripted units yield a single filler
/// program so callers get "data present" without any setup.
#[derive(Debug, Clone)]
enum Outcome {
    Programs(Vec<(u16, String)>),
    Empty,
    Fail(String),
}

/// A data source whose (channel, date) results are scripted up front.
///
/// Records every fetch so tests can assert what was (not) contacted,
/// and can run a caller-provided hook on each fetch, which is how the
/// cancellation tests trigger a stop from inside a running batch.
pub struct ScriptedSource {
    outcomes: Mutex<HashMap<(String, i32), Outcome>>,
    fetches: Mutex<Vec<(String, i32)>>,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    on_fetch: Mutex<Option<FetchHook>>,
}

impl fmt::Debug for ScriptedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedSource")
            .field("fetches", &self.fetch_count())
            .finish()
    }
}

impl ScriptedSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(HashMap::new()),
            fetches: Mutex::new(Vec::new()),
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            on_fetch: Mutex::new(None),
        })
    }

    pub fn script_programs(&self, channel_id: &str, date: Date, programs: &[(u16, &str)]) {
        let listed = programs
            .iter()
            .map(|(start, title)| (*start, title.to_string()))
            .collect();
        self.outcomes
            .lock()
            .unwrap()
            .insert((channel_id.to_string(), date.days()), Outcome::Programs(listed));
    }

    pub fn script_empty(&self, channel_id: &str, date: Date) {
        self.outcomes
            .lock()
            .unwrap()
            .insert((channel_id.to_string(), date.days()), Outcome::Empty);
    }

    pub fn script_failure(&self, channel_id: &str, date: Date, reason: &str) {
        self.outcomes
            .lock()
            .unwrap()
            .insert((channel_id.to_string(), date.days()), Outcome::Fail(reason.to_string()));
    }

    pub fn set_on_fetch(&self, hook: impl Fn(&Channel, Date) + Send + Sync + 'static) {
        *self.on_fetch.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.lock().unwrap().len()
    }

    pub fn fetches(&self) -> Vec<(String, i32)> {
        self.fetches.lock().unwrap().clone()
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataSource for ScriptedSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn connect(&self) -> epgsource::Result<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> epgsource::Result<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn fetch_day(&self, channel: &Channel, date: Date) -> epgsource::Result<ChannelDayProgram> {
        self.fetches
            .lock()
            .unwrap()
            .push((channel.id().as_str().to_string(), date.days()));
        if let Some(hook) = self.on_fetch.lock().unwrap().as_ref() {
            hook(channel, date);
        }

        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .get(&(channel.id().as_str().to_string(), date.days()))
            .cloned();
        match outcome {
            Some(Outcome::Fail(reason)) => Err(SourceError::FetchFailed {
                source_name: SOURCE_NAME.to_string(),
                channel: channel.id().as_str().to_string(),
                date,
                reason,
            }),
            Some(Outcome::Empty) => Ok(ChannelDayProgram::empty(channel.clone(), date)),
            Some(Outcome::Programs(listed)) => {
                let programs = listed
                    .into_iter()
                    .map(|(start, title)| Program::new(channel.id().clone(), date, start, title))
                    .collect::<Result<Vec<_>, _>>()
                    .expect("scripted starts are valid");
                Ok(ChannelDayProgram::try_new(channel.clone(), date, programs)
                    .expect("scripted starts are distinct"))
            }
            None => {
                let filler = Program::new(channel.id().clone(), date, 600, "Filler").unwrap();
                Ok(ChannelDayProgram::try_new(channel.clone(), date, vec![filler]).unwrap())
            }
        }
    }

    fn apply_settings(&self, _settings: &Settings) {}
}

pub fn make_channel(id: &str) -> Channel {
    Channel::new(id, SOURCE_NAME, id.to_uppercase())
}

/// A guide on a fresh temporary store with one scripted source.
pub fn make_guide() -> (epgguide::Guide, Arc<ScriptedSource>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::new(dir.path()).unwrap());
    let registry = Arc::new(SourceRegistry::new());
    let source = ScriptedSource::new();
    registry.register(source.clone()).unwrap();
    (epgguide::Guide::new(store, registry), source, dir)
}
