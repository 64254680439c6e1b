use super::*;
use std::fs;

#[test]
fn builtin_defaults_match_the_default_config_text() {
    let parsed: AppConfig = merge_with_defaults(None)
        .expect("merge")
        .try_into()
        .expect("deserialize");
    assert_eq!(parsed, AppConfig::default());
}

#[test]
fn loading_a_missing_file_writes_the_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = ConfigStore::at(dir.path().join("nested/config.toml"));

    let config = store.load().expect("load");

    assert_eq!(config, AppConfig::default());
    let written = fs::read_to_string(store.path()).expect("written");
    assert!(written.contains("[conversation]"));
    assert!(written.contains("history_window = 5"));
}

#[test]
fn user_overrides_survive_the_merge() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        "[backend]\nurl = \"http://example:9000\"\n\n[local]\nenabled = true\n",
    )
    .expect("seed");

    let config = ConfigStore::at(&path).load().expect("load");

    assert_eq!(config.backend.url, "http://example:9000");
    assert_eq!(config.backend.timeout_secs, 60);
    assert!(config.local.enabled);
    assert!(!config.local.parallel);
    let rewritten = fs::read_to_string(&path).expect("read");
    assert!(rewritten.contains("http://example:9000"));
    assert!(rewritten.contains("listing_depth"));
}

#[test]
fn set_value_persists_a_single_key() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = ConfigStore::at(dir.path().join("config.toml"));
    store.load().expect("initial load");

    store
        .set_value("backend", "default_model", "llama3")
        .expect("set");
    store
        .set_value("backend", "url", "http://other:8000")
        .expect("set");

    let config = store.load().expect("reload");
    assert_eq!(config.backend.model().as_deref(), Some("llama3"));
    assert_eq!(config.backend.url, "http://other:8000");
    assert_eq!(config.conversation.listing_depth, 3);
}

#[test]
fn blank_default_model_means_none() {
    assert_eq!(AppConfig::default().backend.model(), None);
}

#[test]
fn default_mode_can_be_configured() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");
    fs::write(&path, "[conversation]\ndefault_mode = \"agent\"\n").expect("seed");

    let config = ConfigStore::at(&path).load().expect("load");

    assert_eq!(config.conversation.default_mode, Mode::Agent);
}

#[test]
fn invalid_toml_is_a_parse_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");
    fs::write(&path, "[backend\nurl = ").expect("seed");

    assert!(matches!(
        ConfigStore::at(&path).load(),
        Err(ConfigError::Parse(_))
    ));
}

#[test]
fn plain_paths_are_not_expanded() {
    assert_eq!(
        expand_home("/tmp/arkchat.toml").expect("path"),
        PathBuf::from("/tmp/arkchat.toml")
    );
}
