use super::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_config(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("mcsync.toml");
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_defaults() {
    let config = SyncConfig::default();

    assert_eq!(config.launch_command, None);
    assert_eq!(config.trigger_word, "God");
    assert_eq!(config.inactive_shutdown_seconds, 600);
    assert_eq!(config.chunk_limit, DEFAULT_CHUNK_LIMIT);
    assert_eq!(config.idle_shutdown(), Some(Duration::from_secs(600)));
    assert!(config.validate().is_ok());
}

#[test]
fn test_partial_toml_keeps_defaults() {
    let config = SyncConfig::from_toml_str(
        r#"
launch_command = "java -Xmx4G -jar server.jar nogui"
trigger_word = "Oracle"
inactive_shutdown_seconds = 0

[env]
EULA = "true"
"#,
    )
    .unwrap();

    assert_eq!(config.trigger_word, "Oracle");
    assert_eq!(config.idle_shutdown(), None);
    assert_eq!(config.list_interval_seconds, 60);
    assert_eq!(config.classifier().trigger_word(), "Oracle");

    let command = config.server_command().unwrap();
    assert_eq!(command.program, "java");
    assert_eq!(command.args, vec!["-Xmx4G", "-jar", "server.jar", "nogui"]);
    assert_eq!(command.env.get("EULA").map(String::as_str), Some("true"));
}

#[test]
fn test_invalid_toml_is_an_error() {
    assert!(SyncConfig::from_toml_str("chunk_limit = \"many\"").is_err());
}

#[test]
fn test_validate_rejects_bad_values() {
    let config = SyncConfig {
        chunk_limit: 0,
        ..SyncConfig::default()
    };
    assert!(config.validate().is_err());

    let config = SyncConfig {
        trigger_word: "  ".to_string(),
        ..SyncConfig::default()
    };
    assert!(config.validate().is_err());

    let config = SyncConfig {
        list_interval_seconds: 0,
        ..SyncConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_server_command_requires_launch_command() {
    let err = SyncConfig::default().server_command().unwrap_err();
    assert!(err.to_string().contains("No launch command"));
}

#[test]
fn test_merge_env_from() {
    let mut config = SyncConfig::default();
    config.merge_env_from(|key| match key {
        "MCSYNC_LAUNCH_COMMAND" => Some("./start.sh".to_string()),
        "MCSYNC_TRIGGER_WORD" => Some("Zeus".to_string()),
        "MCSYNC_INACTIVE_SHUTDOWN_SECONDS" => Some("not-a-number".to_string()),
        _ => None,
    });

    assert_eq!(config.launch_command.as_deref(), Some("./start.sh"));
    assert_eq!(config.trigger_word, "Zeus");
    assert_eq!(config.inactive_shutdown_seconds, 600);
}

#[tokio::test]
async fn test_load_config_from_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
launch_command = "sh run.sh"
working_dir = "/srv/minecraft"
chunk_limit = 500
"#,
    );

    let config = load_config(Some(&path)).await.unwrap();
    assert_eq!(config.chunk_limit, 500);

    let command = config.server_command().unwrap();
    assert_eq!(command.working_dir.as_deref(), Some(Path::new("/srv/minecraft")));
}

#[tokio::test]
async fn test_load_config_missing_file() {
    let dir = TempDir::new().unwrap();
    let err = load_config(Some(&dir.path().join("absent.toml")))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

#[tokio::test]
async fn test_load_config_leaves_validation_to_caller() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "chunk_limit = 0\n");

    let mut config = load_config(Some(&path)).await.unwrap();
    assert_eq!(config.chunk_limit, 0);
    assert!(config.validate().is_err());

    config.chunk_limit = 100;
    assert!(config.validate().is_ok());
}
