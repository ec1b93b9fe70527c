//! Common test utilities for integration tests.
//!
//! Provides stub login subprocesses and fast-polling configurations so the
//! orchestrator scenarios run in milliseconds.

use linkwatch::config::Config;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Build a stub login process running `script` under `sh -c`, wired the
/// way `supervise` expects (stdout/stderr piped).
pub fn stub_login(script: &str) -> Command {
    let mut command = Command::new("sh");
    command
        .args(["-c", script])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    command
}

/// A config that polls credentials in milliseconds instead of seconds.
pub fn fast_config() -> Config {
    Config::new().with_poll_delay(Duration::from_millis(10))
}

/// Create the credential directory under `state_dir` and drop one file in
/// it, as the gateway does after a durable login.
pub fn seed_credentials(state_dir: &std::path::Path) {
    let creds = state_dir.join("credentials").join("whatsapp").join("default");
    std::fs::create_dir_all(&creds).unwrap();
    std::fs::write(creds.join("creds.json"), "{}").unwrap();
}
