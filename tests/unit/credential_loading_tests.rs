//! Unit tests for SSH password loading.
//!
//! These tests mutate process-global env vars and run serially.

use vpar_control::config::{GlobalConfig, PASSWORD_ENV};
use vpar_control::AppError;

fn config() -> GlobalConfig {
    GlobalConfig::from_toml_str(
        r#"
db_path = "vpar.db"

[remote]
username = "vpar-control-test-user"

[ignite]
address = "10.0.0.5"
root_password_hash = "hash"
"#,
    )
    .expect("config parses")
}

#[tokio::test]
#[serial_test::serial]
async fn env_var_supplies_password() {
    let mut config = config();
    std::env::set_var(PASSWORD_ENV, "s3cret");

    config.load_credentials().await.expect("credentials");
    assert_eq!(config.remote.password, "s3cret");
    assert_eq!(config.remote.credentials().password, "s3cret");

    std::env::remove_var(PASSWORD_ENV);
}

#[tokio::test]
#[serial_test::serial]
async fn missing_password_names_env_var() {
    let mut config = config();
    std::env::remove_var(PASSWORD_ENV);

    let err = config.load_credentials().await.unwrap_err();
    assert!(matches!(err, AppError::Config(ref msg) if msg.contains(PASSWORD_ENV)));
}

#[test]
fn credentials_debug_redacts_password() {
    let mut config = config();
    config.remote.password = "hunter2".into();
    let rendered = format!("{:?}", config.remote.credentials());
    assert!(rendered.contains("vpar-control-test-user"));
    assert!(!rendered.contains("hunter2"));
}
