use tempfile::tempdir;
use teleinfo::config::Config;

#[test]
fn init_then_load_round_trips_the_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let path = path.to_str().unwrap();

    tokio_test::block_on(Config::create_default(path)).unwrap();
    let loaded = tokio_test::block_on(Config::load(path)).unwrap();
    assert_eq!(loaded, Config::default());
}

#[test]
fn partial_file_keeps_other_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "[serial]\ndevice = \"/dev/ttyAMA0\"\n\n[logging]\ndump_dir = \"/var/tmp\"\n",
    )
    .unwrap();

    let config = tokio_test::block_on(Config::load(path.to_str().unwrap())).unwrap();
    assert_eq!(config.serial.device, "/dev/ttyAMA0");
    assert_eq!(config.poll.interval_secs, 10);
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.logging.dump_dir.as_deref(), Some("/var/tmp"));
}

#[test]
fn invalid_values_fail_to_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[poll]\ninterval_secs = 0\n").unwrap();

    let err = tokio_test::block_on(Config::load(path.to_str().unwrap())).unwrap_err();
    assert!(err.to_string().contains("interval_secs"));
}

#[test]
fn missing_file_names_the_path() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    let path = path.to_str().unwrap();

    let err = tokio_test::block_on(Config::load(path)).unwrap_err();
    assert!(err.to_string().contains(path));
}
