use super::*;

fn temp_session_path() -> PathBuf {
    std::env::temp_dir()
        .join(format!("pms-storage-{}", uuid::Uuid::new_v4()))
        .join("session.json")
}

#[test]
fn memory_storage_set_get_remove() {
    let storage = MemoryStorage::new();
    assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);

    storage.set(TOKEN_KEY, "tok").unwrap();
    assert_eq!(storage.get(TOKEN_KEY).unwrap().as_deref(), Some("tok"));
    assert_eq!(storage.len(), 1);

    storage.remove(TOKEN_KEY).unwrap();
    storage.remove(TOKEN_KEY).unwrap();
    assert!(storage.is_empty());
}

#[test]
fn file_storage_missing_file_reads_as_empty() {
    let storage = FileStorage::new(temp_session_path());
    assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);
    assert!(!storage.path().exists());
}

#[test]
fn file_storage_persists_across_instances() {
    let path = temp_session_path();
    FileStorage::new(&path).set(TOKEN_KEY, "tok-1").unwrap();
    FileStorage::new(&path).set(USER_KEY, r#"{"id":1}"#).unwrap();

    let reopened = FileStorage::new(&path);
    assert_eq!(reopened.get(TOKEN_KEY).unwrap().as_deref(), Some("tok-1"));
    assert_eq!(reopened.get(USER_KEY).unwrap().as_deref(), Some(r#"{"id":1}"#));

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[test]
fn file_storage_remove_leaves_other_keys() {
    let path = temp_session_path();
    let storage = FileStorage::new(&path);
    storage.set(TOKEN_KEY, "tok").unwrap();
    storage.set(USER_KEY, "{}").unwrap();

    storage.remove(TOKEN_KEY).unwrap();
    assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);
    assert_eq!(storage.get(USER_KEY).unwrap().as_deref(), Some("{}"));
    assert!(!tmp_path(&path).exists());

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[test]
fn file_storage_remove_on_missing_file_does_not_create_it() {
    let path = temp_session_path();
    let storage = FileStorage::new(&path);
    storage.remove(USER_KEY).unwrap();
    assert!(!path.exists());
}

#[test]
fn file_storage_reports_corrupt_json() {
    let path = temp_session_path();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "not json").unwrap();

    let err = FileStorage::new(&path).get(TOKEN_KEY).unwrap_err();
    assert!(matches!(err, StorageError::Json(_)));

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[test]
fn file_storage_clear_discards_corrupt_file() {
    let path = temp_session_path();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{truncated").unwrap();
    let storage = FileStorage::new(&path);

    storage.clear().unwrap();
    storage.clear().unwrap();

    assert!(!path.exists());
    assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);
    storage.set(TOKEN_KEY, "tok").unwrap();
    assert_eq!(storage.get(TOKEN_KEY).unwrap().as_deref(), Some("tok"));

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[test]
fn memory_storage_clear_empties_everything() {
    let storage = MemoryStorage::new();
    storage.set(TOKEN_KEY, "tok").unwrap();
    storage.set(USER_KEY, "{}").unwrap();
    storage.clear().unwrap();
    assert!(storage.is_empty());
}

#[test]
fn tmp_path_appends_suffix() {
    assert_eq!(tmp_path(Path::new("/a/session.json")), PathBuf::from("/a/session.json.tmp"));
}
