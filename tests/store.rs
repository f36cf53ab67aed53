use camino::Utf8PathBuf;

use modeldb_harvester::config::ResolvedConfig;
use modeldb_harvester::domain::ModelId;
use modeldb_harvester::store::Store;

#[test]
fn layout_paths() {
    let store = Store::new(&ResolvedConfig::default());
    let path = store.archive_path(ModelId::new(3263));
    assert!(path.starts_with(store.archive_dir()));
    assert!(path.ends_with("3263.zip"));
}

#[test]
fn archives_land_in_created_directory() {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let store = Store::new_with_paths(root.join("zips"), root.join("meta.json"));

    store.ensure_archive_dir().unwrap();
    store.ensure_archive_dir().unwrap();
    let path = store.write_archive(ModelId::new(101), b"PK\x03\x04").unwrap();

    assert_eq!(path, root.join("zips").join("101.zip"));
    assert_eq!(std::fs::read(path.as_std_path()).unwrap(), b"PK\x03\x04");
}

#[test]
fn rewriting_an_archive_replaces_it() {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let store = Store::new_with_paths(root.join("zips"), root.join("meta.json"));
    store.ensure_archive_dir().unwrap();

    store.write_archive(ModelId::new(5), b"partial").unwrap();
    let path = store.write_archive(ModelId::new(5), b"PK\x05\x06").unwrap();
    assert_eq!(std::fs::read(path.as_std_path()).unwrap(), b"PK\x05\x06");
}
