//! Credential confirmation.
//!
//! A zero exit code from the login process is not proof that the link took:
//! the gateway only persists channel credentials slightly after it reports
//! success. This module polls the credential directory until it shows up
//! non-empty, with bounded attempts and a fixed delay.
//!
//! Absence is an ordinary negative outcome, not a fault; the only signal
//! out of here is a bool.

use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

/// One observation of the credential directory.
fn credentials_present(path: &Path) -> bool {
    match std::fs::read_dir(path) {
        Ok(mut entries) => entries.next().is_some(),
        Err(e) if e.kind() == ErrorKind::NotFound => false,
        Err(e) => {
            // Permission problems and the like: log, treat as not
            // confirmed, keep polling.
            tracing::warn!(path = %path.display(), error = %e, "credential check failed");
            false
        }
    }
}

/// Poll `path` until it exists and contains at least one entry.
///
/// Re-reads the directory on every attempt, sleeping `delay` between
/// attempts. After exhausting the budget, logs a diagnostic listing of the
/// parent directory and returns `false`.
pub async fn confirm_credentials(path: &Path, max_attempts: u32, delay: Duration) -> bool {
    for attempt in 1..=max_attempts {
        if credentials_present(path) {
            tracing::info!(
                path = %path.display(),
                attempt,
                "credentials confirmed"
            );
            return true;
        }
        tracing::debug!(path = %path.display(), attempt, max_attempts, "credentials not present yet");
        if attempt < max_attempts {
            tokio::time::sleep(delay).await;
        }
    }

    log_parent_listing(path);
    false
}

/// Operator-facing diagnostic after the budget is spent: what does the
/// parent directory actually contain?
fn log_parent_listing(path: &Path) {
    let Some(parent) = path.parent() else {
        tracing::warn!(path = %path.display(), "credentials never appeared");
        return;
    };
    match std::fs::read_dir(parent) {
        Ok(entries) => {
            let names: Vec<String> = entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .collect();
            tracing::warn!(
                path = %path.display(),
                parent = %parent.display(),
                contents = ?names,
                "credentials never appeared"
            );
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                parent = %parent.display(),
                error = %e,
                "credentials never appeared; parent unreadable"
            );
        }
    }
}
