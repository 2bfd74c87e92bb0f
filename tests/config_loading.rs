// tests/config_loading.rs

use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;
use dockship::config::{load_and_validate, load_from_path, load_with_mode, write_sample_config};
use dockship::errors::DockshipError;
use dockship::types::Mode;

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn watcher_config_gets_defaults() {
    let file = config_file(
        r#"
[watcher]
watch_directory = "/srv/in"
container_name = "web"
container_ports = ["8080:80"]
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();
    assert_eq!(cfg.mode, Mode::Watcher);
    assert_eq!(cfg.container_cli, "docker");
    assert_eq!(cfg.watcher.archive_extension, ".tar");
    assert_eq!(cfg.watcher.restart_policy, "unless-stopped");
    assert_eq!(cfg.watcher.image_ref(), "web");
    assert_eq!(cfg.watcher.debounce.get(), Duration::from_secs(2));
    assert_eq!(cfg.timeouts.load.get(), Duration::from_secs(600));
    assert_eq!(cfg.timeouts.stop.get(), Duration::from_secs(30));
}

#[test]
fn missing_container_name_returns_config_error() {
    let file = config_file(
        r#"
[watcher]
watch_directory = "/srv/in"
"#,
    );

    match load_and_validate(file.path()) {
        Err(DockshipError::ConfigError(msg)) => {
            assert!(msg.contains("[watcher].container_name"));
        }
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn mode_override_switches_the_validated_section() {
    let file = config_file(
        r#"
mode = "watcher"

[watcher]
watch_directory = "/srv/in"
container_name = "web"
"#,
    );

    assert!(load_with_mode(file.path(), None).is_ok());
    let err = load_with_mode(file.path(), Some(Mode::Uploader)).unwrap_err();
    assert!(matches!(err, DockshipError::ConfigError(msg) if msg.contains("[uploader]")));
}

#[test]
fn uploader_paths_expand_home_and_durations_parse() {
    let file = config_file(
        r#"
mode = "uploader"
container_cli = "podman"

[uploader]
build_path = "./"
image_name = "myapp"
remote_host = "deploy.example.com"
remote_user = "deploy"
remote_key_path = "~/.ssh/id_ed25519"
remote_upload_path = "/opt/uploads"

[timeouts]
build = "20m"
connect = "5s"
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();
    assert_eq!(cfg.container_cli, "podman");
    assert_eq!(cfg.uploader.image_tag, "latest");
    assert_eq!(cfg.uploader.remote_port, 22);
    assert!(!cfg.uploader.remote_key_path.starts_with("~"));
    assert!(cfg.uploader.remote_key_path.ends_with(".ssh/id_ed25519"));
    assert_eq!(cfg.timeouts.build.get(), Duration::from_secs(20 * 60));
    assert_eq!(cfg.timeouts.connect.get(), Duration::from_secs(5));
}

#[test]
fn padded_archive_extension_still_matches_archives() {
    let file = config_file(
        r#"
[watcher]
watch_directory = "/srv/in"
container_name = "web"
archive_extension = " .tar"
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();
    assert_eq!(cfg.watcher.archive_extension, ".tar");
    assert!("web_latest.tar".ends_with(&cfg.watcher.archive_extension));
}

#[test]
fn bad_duration_is_a_toml_error() {
    let file = config_file(
        r#"
[watcher]
watch_directory = "/srv/in"
container_name = "web"
debounce = "soon"
"#,
    );

    assert!(matches!(
        load_from_path(file.path()),
        Err(DockshipError::TomlError(_))
    ));
}

#[test]
fn unreadable_file_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_and_validate(dir.path().join("missing.toml")).unwrap_err();
    assert!(matches!(err, DockshipError::ConfigError(msg) if msg.contains("missing.toml")));
}

#[test]
fn sample_config_is_written_once_and_loads_in_both_modes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dockship.toml");

    write_sample_config(&path, false).unwrap();
    assert!(write_sample_config(&path, false).is_err());
    write_sample_config(&path, true).unwrap();

    assert!(load_with_mode(&path, Some(Mode::Uploader)).is_ok());
    assert!(load_with_mode(&path, Some(Mode::Watcher)).is_ok());
}
