//! Shared fixtures for the integration tests

#![allow(dead_code)]

use dbanon::adapters::database::Capabilities;
use dbanon::adapters::memory::{row, MemoryCluster, MemoryRow};
use dbanon::anonymization::FakeGenerator;
use dbanon::config::{DbAnonConfig, PipelineMode};
use dbanon::core::PipelineOrchestrator;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;

/// Original values that must never reach an anonymized dump
pub const SECRETS: [&str; 5] = [
    "bob.secret@corp.test",
    "carol.secret@corp.test",
    "Zebediah",
    "Quillfeather",
    "Ottoline",
];

pub fn user(id: &str, login: &str, email: &str, display: &str) -> MemoryRow {
    row([
        ("ID", id),
        ("user_login", login),
        ("user_nicename", login),
        ("user_email", email),
        ("display_name", display),
    ])
}

pub fn meta(id: &str, owner: &str, key: &str, value: &str) -> MemoryRow {
    row([
        ("umeta_id", id),
        ("user_id", owner),
        ("meta_key", key),
        ("meta_value", value),
    ])
}

/// Single-site `app` database: admin (ID 1) plus two real users
pub fn seeded_cluster() -> MemoryCluster {
    let cluster = MemoryCluster::new();
    cluster.add_table(
        "app",
        "wp_users",
        vec![
            user("1", "admin", "admin@corp.test", "Site Admin"),
            user("2", "bob", "bob.secret@corp.test", "Bob Zebediah"),
            user("3", "carol", "carol.secret@corp.test", "Carol Ottoline"),
        ],
    );
    cluster.add_table(
        "app",
        "wp_usermeta",
        vec![
            meta("1", "1", "first_name", "Adminfirst"),
            meta("2", "2", "first_name", "Zebediah"),
            meta("3", "2", "last_name", "Quillfeather"),
            meta("4", "3", "first_name", "Ottoline"),
        ],
    );
    cluster.add_table(
        "app",
        "wp_posts",
        vec![row([("ID", "10"), ("post_title", "Hello world")])],
    );
    cluster
}

pub fn config(output_dir: &Path, mode: PipelineMode) -> DbAnonConfig {
    let mut config = DbAnonConfig::default();
    config.database.name = "app".to_string();
    config.pipeline.mode = mode;
    config.pipeline.output_dir = output_dir.to_path_buf();
    config.pipeline.batch_size = 2;
    config
}

pub fn orchestrator(
    cluster: &MemoryCluster,
    config: DbAnonConfig,
    shutdown: watch::Receiver<bool>,
) -> PipelineOrchestrator {
    PipelineOrchestrator::new(
        config,
        Capabilities::in_memory(cluster),
        Arc::new(FakeGenerator::new()),
        shutdown,
    )
}

/// Names of the files currently in `dir`
pub fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
