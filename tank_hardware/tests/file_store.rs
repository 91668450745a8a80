use tank_hardware::FileStore;
use tank_traits::RecordStore;

#[test]
fn missing_record_loads_as_none() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path());
    assert_eq!(store.load("ph.setpoint").unwrap(), None);
}

#[test]
fn save_then_load_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = FileStore::new(dir.path().join("records"));
    store.save("ph.setpoint", "7.2").unwrap();
    store.save("ph.setpoint", "7.4").unwrap();

    let reopened = FileStore::new(dir.path().join("records"));
    assert_eq!(reopened.load("ph.setpoint").unwrap().as_deref(), Some("7.4"));
    assert!(dir.path().join("records/ph.setpoint.json").exists());
    assert!(!dir.path().join("records/ph.setpoint.new").exists());
}
