//! Login flow orchestrator.
//!
//! Owns the gateway login subprocess: spawns it, routes both of its output
//! streams through the [`LoginScanner`], dispatches the resulting events as
//! webhooks, and on exit reconciles the process exit code with the
//! credential directory to pick the terminal [`Outcome`].
//!
//! The subprocess exit code alone is never trusted as proof of success:
//! a zero exit only counts once the credential verifier has seen durable
//! state on disk.

use std::process::Stdio;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::scanner::{LinkEvent, LoginScanner};
use crate::signing::derive_secret;
use crate::webhook::{send_webhook, webhook_client, WebhookStatus};

/// Gateway CLI, resolved via PATH.
const LOGIN_PROGRAM: &str = "gateway";

/// Fixed argument vector for the login invocation. Verbose output is
/// required: the scanner patterns match the verbose progress lines.
const LOGIN_ARGS: [&str; 5] = ["channels", "login", "--channel", "whatsapp", "--verbose"];

/// Credential polling budget when the process claimed a successful link.
const CLAIMED_POLL_ATTEMPTS: u32 = 10;

/// Credential polling budget when the process exited cleanly without a
/// success signal.
const UNCLAIMED_POLL_ATTEMPTS: u32 = 5;

/// Terminal outcome of a login run, computed exactly once at subprocess
/// exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Process claimed success (or exited cleanly) and credentials are on
    /// disk.
    SuccessConfirmed,
    /// Process claimed success but credentials never appeared. Must not be
    /// silently treated as success.
    SuccessUnverified,
    /// Process exited cleanly without a success signal and without
    /// credentials.
    FinishedNoSuccessSignal,
    /// Process exited non-zero; carries the subprocess exit code.
    Failed(i32),
}

impl Outcome {
    /// Exit code this process reports for the outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::SuccessConfirmed => 0,
            Outcome::SuccessUnverified => 1,
            Outcome::FinishedNoSuccessSignal => 1,
            Outcome::Failed(code) => *code,
        }
    }
}

/// Fatal orchestration errors. Expected negatives (missing credentials,
/// webhook failures) are not errors.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("failed to spawn login process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("login process {0} stream was not captured")]
    StreamMissing(&'static str),

    #[error("failed to wait for login process: {0}")]
    Wait(#[source] std::io::Error),
}

/// Which output stream a line came from; decides where it is mirrored.
#[derive(Debug, Clone, Copy)]
enum StreamKind {
    Stdout,
    Stderr,
}

/// Shared webhook dispatch context for both stream tasks.
struct EventSink {
    client: reqwest::Client,
    base_url: String,
    instance_id: String,
    secret: String,
}

impl EventSink {
    fn new(config: &Config) -> Self {
        Self {
            client: webhook_client(),
            base_url: config.webhook_url.clone(),
            instance_id: config.instance_id.clone(),
            secret: derive_secret(&config.instance_id, &config.encryption_key),
        }
    }

    /// Fire-and-forget delivery: spawn the send and move on. Failures are
    /// logged inside the sender and never reach the scanner.
    fn dispatch(&self, event: LinkEvent) {
        let client = self.client.clone();
        let base_url = self.base_url.clone();
        let instance_id = self.instance_id.clone();
        let secret = self.secret.clone();
        tokio::spawn(async move {
            match event {
                LinkEvent::Configuring { phone } => {
                    send_webhook(
                        &client,
                        &base_url,
                        &instance_id,
                        &secret,
                        WebhookStatus::Configuring,
                        None,
                        phone.as_deref(),
                    )
                    .await;
                }
                LinkEvent::QrReady { payload } => {
                    send_webhook(
                        &client,
                        &base_url,
                        &instance_id,
                        &secret,
                        WebhookStatus::QrReady,
                        Some(&payload),
                        None,
                    )
                    .await;
                }
            }
        });
    }
}

/// Build the fixed gateway login command.
///
/// stdin stays connected to the parent so an interactive prompt upstream
/// still works; stdout and stderr are captured for classification.
pub fn login_command(config: &Config) -> Command {
    let mut command = Command::new(LOGIN_PROGRAM);
    command
        .args(LOGIN_ARGS)
        .current_dir(&config.gateway_home)
        .stdin(Stdio::inherit())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    command
}

/// Run the gateway login flow end to end and return the terminal outcome.
pub async fn run_login_flow(config: &Config) -> Result<Outcome, FlowError> {
    supervise(login_command(config), config).await
}

/// Supervise an already-built login command.
///
/// Split out from [`run_login_flow`] so tests can substitute a stub
/// process; the command must have stdout and stderr piped.
pub async fn supervise(mut command: Command, config: &Config) -> Result<Outcome, FlowError> {
    let mut child = command.spawn().map_err(FlowError::Spawn)?;

    let stdout = child.stdout.take().ok_or(FlowError::StreamMissing("stdout"))?;
    let stderr = child.stderr.take().ok_or(FlowError::StreamMissing("stderr"))?;

    let scanner = Arc::new(Mutex::new(LoginScanner::new()));
    let sink = Arc::new(EventSink::new(config));

    // One task per stream. Lines are split per channel before they reach
    // the scanner, so OS-level byte interleaving cannot corrupt a line; the
    // mutex serializes scanner access across the two tasks.
    let out_task = spawn_line_task(stdout, StreamKind::Stdout, &scanner, &sink);
    let err_task = spawn_line_task(stderr, StreamKind::Stderr, &scanner, &sink);

    let _ = out_task.await;
    let _ = err_task.await;

    let status = child.wait().await.map_err(FlowError::Wait)?;
    let connected = scanner.lock().await.connected();
    // Death by signal has no code; treat it as a generic failure.
    let code = status.code().unwrap_or(1);

    tracing::info!(code, connected, "login process exited");

    if code != 0 {
        return Ok(Outcome::Failed(code));
    }

    let credentials_dir = config.credentials_dir();
    let attempts = if connected {
        CLAIMED_POLL_ATTEMPTS
    } else {
        UNCLAIMED_POLL_ATTEMPTS
    };

    if crate::verify::confirm_credentials(&credentials_dir, attempts, config.poll_delay).await {
        return Ok(Outcome::SuccessConfirmed);
    }

    if connected {
        tracing::warn!(
            path = %credentials_dir.display(),
            "login claimed success but credentials never became durable"
        );
        Ok(Outcome::SuccessUnverified)
    } else {
        Ok(Outcome::FinishedNoSuccessSignal)
    }
}

/// Read one captured stream line by line: mirror each line unmodified for
/// human visibility, then classify it.
fn spawn_line_task<R>(
    reader: R,
    kind: StreamKind,
    scanner: &Arc<Mutex<LoginScanner>>,
    sink: &Arc<EventSink>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let scanner = Arc::clone(scanner);
    let sink = Arc::clone(sink);
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    match kind {
                        StreamKind::Stdout => println!("{line}"),
                        StreamKind::Stderr => eprintln!("{line}"),
                    }
                    let event = scanner.lock().await.observe(&line);
                    if let Some(event) = event {
                        sink.dispatch(event);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(stream = ?kind, error = %e, "stopped reading login output");
                    break;
                }
            }
        }
    })
}
