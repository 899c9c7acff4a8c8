use epgmodel::{Channel, ChannelDayProgram, Date, Program};
use epgstore::{FileStore, StoreError};
use tempfile::TempDir;

fn create_test_store() -> (TempDir, FileStore) {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(temp_dir.path()).unwrap();
    (temp_dir, store)
}

fn channel(id: &str) -> Channel {
    Channel::new(id, "example.sdf", id)
}

fn listings(id: &str, date: Date, titles: &[&str]) -> ChannelDayProgram {
    let programs = titles
        .iter()
        .enumerate()
        .map(|(i, title)| {
            Program::new(id, date, 480 + (i as u16) * 60, *title)
                .unwrap()
                .with_length(60)
        })
        .collect();
    ChannelDayProgram::try_new(channel(id), date, programs).unwrap()
}

#[test]
fn test_store_then_load_round_trip() {
    let (_temp_dir, store) = create_test_store();
    let date = Date::from_ymd(2024, 5, 1).unwrap();
    let ch = channel("arte");
    let cdp = listings("arte", date, &["Morning show", "News"]);

    assert!(!store.exists(&ch, date));
    store.store(&ch, date, &cdp).unwrap();
    assert!(store.exists(&ch, date));

    let loaded = store.load(&ch, date).unwrap().unwrap();
    assert_eq!(loaded, cdp);
}

#[test]
fn test_store_is_idempotent() {
    let (_temp_dir, store) = create_test_store();
    let date = Date::from_ymd(2024, 5, 1).unwrap();
    let ch = channel("arte");
    let cdp = listings("arte", date, &["News"]);

    store.store(&ch, date, &cdp).unwrap();
    store.store(&ch, date, &cdp).unwrap();

    assert!(store.exists(&ch, date));
    assert_eq!(store.load(&ch, date).unwrap().unwrap(), cdp);
    assert_eq!(store.list_all().unwrap().len(), 1);
}

#[test]
fn test_overwrite_replaces_content() {
    let (_temp_dir, store) = create_test_store();
    let date = Date::from_ymd(2024, 5, 1).unwrap();
    let ch = channel("arte");

    store
        .store(&ch, date, &listings("arte", date, &["Old"]))
        .unwrap();
    let fresh = listings("arte", date, &["New", "Newer"]);
    store.store(&ch, date, &fresh).unwrap();

    assert_eq!(store.load(&ch, date).unwrap().unwrap(), fresh);
}

#[test]
fn test_load_missing_is_none_not_error() {
    let (_temp_dir, store) = create_test_store();
    let date = Date::from_ymd(2024, 5, 1).unwrap();
    assert!(store.load(&channel("arte"), date).unwrap().is_none());
}

#[test]
fn test_corrupt_record_is_reported() {
    let (_temp_dir, store) = create_test_store();
    let date = Date::from_ymd(2024, 5, 1).unwrap();
    let ch = channel("arte");

    std::fs::write(store.record_path(&ch, date), b"definitely not json").unwrap();

    match store.load(&ch, date) {
        Err(StoreError::CorruptRecord { .. }) => {}
        other => panic!("expected CorruptRecord, got {:?}", other),
    }
    // A corrupt record still answers "present" to the stat-based oracle
    assert!(store.exists(&ch, date));
}

#[test]
fn test_list_all_parses_filenames() {
    let (_temp_dir, store) = create_test_store();
    let d1 = Date::from_ymd(2024, 5, 1).unwrap();
    let d2 = d1.add_days(1);

    store.store(&channel("arte"), d1, &listings("arte", d1, &["A"])).unwrap();
    store.store(&channel("arte"), d2, &listings("arte", d2, &["B"])).unwrap();
    store.store(&channel("zdf"), d1, &listings("zdf", d1, &["C"])).unwrap();

    let mut keys = store.list_all().unwrap();
    keys.sort_by(|a, b| (&a.channel_id, a.date).cmp(&(&b.channel_id, b.date)));

    assert_eq!(keys.len(), 3);
    assert_eq!(keys[0].channel_id, "arte");
    assert_eq!(keys[0].source, "example.sdf");
    assert_eq!(keys[0].date, d1);
    assert_eq!(keys[2].channel_id, "zdf");
}

#[test]
fn test_retention_boundary() {
    let (_temp_dir, store) = create_test_store();
    let today = Date::today();
    let lifespan = 7;

    let too_old = today.add_days(-lifespan - 1);
    let boundary = today.add_days(-lifespan);
    let fresh = today.add_days(-1);

    for date in [too_old, boundary, fresh] {
        store
            .store(&channel("arte"), date, &listings("arte", date, &["X"]))
            .unwrap();
    }

    let removed = store.delete_older_than(lifespan).unwrap();
    assert_eq!(removed, 1);

    // Strictly older is gone, the exact boundary survives
    assert!(!store.exists(&channel("arte"), too_old));
    assert!(store.exists(&channel("arte"), boundary));
    assert!(store.exists(&channel("arte"), fresh));
}

#[test]
fn test_negative_lifespan_is_a_no_op() {
    let (_temp_dir, store) = create_test_store();
    let ancient = Date::today().add_days(-10_000);
    store
        .store(&channel("arte"), ancient, &listings("arte", ancient, &["X"]))
        .unwrap();

    assert_eq!(store.delete_older_than(-1).unwrap(), 0);
    assert!(store.exists(&channel("arte"), ancient));
}

#[test]
fn test_data_available_for_matches_dates() {
    let (_temp_dir, store) = create_test_store();
    let date = Date::from_ymd(2024, 5, 1).unwrap();

    assert!(!store.data_available_for(date));
    store
        .store(&channel("arte"), date, &listings("arte", date, &["X"]))
        .unwrap();
    assert!(store.data_available_for(date));
    assert!(!store.data_available_for(date.add_days(1)));
}

#[test]
fn test_empty_channel_day_is_stored_and_distinct_from_absent() {
    let (_temp_dir, store) = create_test_store();
    let date = Date::from_ymd(2024, 5, 1).unwrap();
    let ch = channel("arte");

    store
        .store(&ch, date, &ChannelDayProgram::empty(ch.clone(), date))
        .unwrap();

    // Known-empty: the record exists and loads as an empty listing
    assert!(store.exists(&ch, date));
    let loaded = store.load(&ch, date).unwrap().unwrap();
    assert!(loaded.is_empty());
}
