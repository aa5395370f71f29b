//! Integration tests for configuration loading and validation
//!
//! Note: Tests that modify environment variables hold `ENV_MUTEX` to avoid
//! interference between tests.

use dbanon::anonymization::GeneratorKind;
use dbanon::config::{load_config, PipelineMode, Tenancy};
use secrecy::ExposeSecret;
use std::io::Write;
use std::sync::Mutex;
use tempfile::NamedTempFile;

// Mutex to serialize tests that modify environment variables
static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Helper function to clean up environment variables
fn cleanup_env_vars() {
    std::env::remove_var("DBANON_DATABASE_NAME");
    std::env::remove_var("DBANON_DATABASE_PASSWORD");
    std::env::remove_var("DBANON_PIPELINE_MODE");
    std::env::remove_var("DBANON_PIPELINE_BATCH_SIZE");
    std::env::remove_var("DBANON_ANONYMIZATION_PROTECTED_IDS");
    std::env::remove_var("TEST_DBANON_PASSWORD");
}

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_load_complete_config() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();
    std::env::set_var("TEST_DBANON_PASSWORD", "s3cret");

    let file = write_config(
        r#"
[application]
log_level = "debug"

[database]
host = "db.internal"
port = 5433
user = "anon"
password = "${TEST_DBANON_PASSWORD}"
name = "shop"

[pipeline]
mode = "in-place-with-restore"
output_dir = "/var/dumps"
batch_size = 250
max_parallel_scopes = 2
keep_source_dump = true

[schema]
table_prefix = "shop_"
tenancy = "single"

[anonymization]
protected_ids = [1, 7]

[[anonymization.identity_fields]]
column = "user_email"
generator = "safe_email"
unique = true

[[anonymization.attribute_keys]]
key = "billing_phone"
generator = "sentence"
"#,
    );

    let config = load_config(file.path()).unwrap();
    cleanup_env_vars();

    assert_eq!(config.application.log_level, "debug");
    assert_eq!(config.database.host, "db.internal");
    assert_eq!(config.database.port, 5433);
    assert_eq!(config.database.password.expose_secret().as_str(), "s3cret");
    assert_eq!(config.pipeline.mode, PipelineMode::InPlaceWithRestore);
    assert_eq!(config.pipeline.batch_size, 250);
    assert!(config.pipeline.keep_source_dump);
    assert_eq!(config.schema.tenancy, Tenancy::Single);
    assert_eq!(config.base_prefix().unwrap().table("users"), "shop_users");
    assert_eq!(config.anonymization.protected_ids, vec![1, 7]);
    assert_eq!(config.anonymization.identity_fields.len(), 1);
    assert_eq!(
        config.anonymization.attribute_keys[0].generator,
        GeneratorKind::Sentence
    );
}

#[test]
fn test_password_never_in_debug_output() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let file = write_config("[database]\nname = \"shop\"\npassword = \"hunter2\"\n");
    let config = load_config(file.path()).unwrap();

    assert!(!format!("{config:?}").contains("hunter2"));
}

#[test]
fn test_env_overrides_win_over_file() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();
    std::env::set_var("DBANON_DATABASE_NAME", "staging");
    std::env::set_var("DBANON_PIPELINE_MODE", "in-place-with-restore");
    std::env::set_var("DBANON_ANONYMIZATION_PROTECTED_IDS", "1, 2,3");

    let file = write_config("[database]\nname = \"shop\"\n");
    let result = load_config(file.path());
    cleanup_env_vars();

    let config = result.unwrap();
    assert_eq!(config.database.name, "staging");
    assert_eq!(config.pipeline.mode, PipelineMode::InPlaceWithRestore);
    assert_eq!(config.anonymization.protected_ids, vec![1, 2, 3]);
}

#[test]
fn test_invalid_env_override_is_configuration_error() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();
    std::env::set_var("DBANON_PIPELINE_BATCH_SIZE", "lots");

    let file = write_config("[database]\nname = \"shop\"\n");
    let result = load_config(file.path());
    cleanup_env_vars();

    let err = result.unwrap_err();
    assert_eq!(err.exit_code(), 2);
    assert!(err.to_string().contains("DBANON_PIPELINE_BATCH_SIZE"));
}

#[test]
fn test_missing_placeholder_variable() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let file = write_config(
        "# password = \"${ONLY_IN_A_COMMENT}\"\n[database]\nname = \"shop\"\npassword = \"${TEST_DBANON_PASSWORD}\"\n",
    );
    let err = load_config(file.path()).unwrap_err();

    let message = err.to_string();
    assert!(message.contains("TEST_DBANON_PASSWORD"));
    assert!(!message.contains("ONLY_IN_A_COMMENT"));
}

#[test]
fn test_validation_rejects_unsafe_names() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    for contents in [
        "[database]\nname = \"shop; DROP DATABASE x\"\n",
        "[database]\nname = \"\"\n",
        "[database]\nname = \"shop\"\n[schema]\ntable_prefix = \"wp-\"\n",
        "[database]\nname = \"shop\"\n[pipeline]\nmax_parallel_scopes = 0\n",
    ] {
        let file = write_config(contents);
        let err = load_config(file.path()).unwrap_err();
        assert_eq!(err.exit_code(), 2, "{contents}");
    }
}

#[test]
fn test_hyphenated_database_name_is_accepted() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let file = write_config("[database]\nname = \"my-app\"\n");
    let config = load_config(file.path()).unwrap();

    let name = config.database_name().unwrap();
    assert_eq!(name.as_str(), "my-app");
    assert_eq!(name.anonymized_dump_file_name(), "my-app_anonymized.sql");
}
