//! Runtime configuration.
//!
//! Everything linkwatch needs arrives through the environment; there is no
//! config file. All variables are optional; an absent webhook URL disables
//! delivery rather than failing, and empty identity inputs degrade to a
//! deterministic (if useless) signing secret.

use std::path::PathBuf;
use std::time::Duration;

/// Default state directory holding gateway channel credentials.
const DEFAULT_STATE_DIR: &str = "/data";

/// Default gateway install root, used as the login process working
/// directory.
const DEFAULT_GATEWAY_HOME: &str = "/opt/gateway";

/// Fixed delay between credential polling attempts.
const DEFAULT_POLL_DELAY: Duration = Duration::from_secs(2);

/// Runtime configuration for a login run.
///
/// # Example
///
/// ```ignore
/// use linkwatch::config::Config;
///
/// let config = Config::from_env();
/// println!("webhook target: {:?}", config.webhook_url);
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Instance identifier, first input to secret derivation.
    pub instance_id: String,
    /// Instance encryption key, second input to secret derivation.
    pub encryption_key: String,
    /// Webhook base URL; empty disables delivery.
    pub webhook_url: String,
    /// State directory holding `credentials/whatsapp/default`.
    pub state_dir: PathBuf,
    /// Gateway install root; working directory of the login process.
    pub gateway_home: PathBuf,
    /// Delay between credential polling attempts. Not environment-driven;
    /// tests shorten it.
    pub poll_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            instance_id: String::new(),
            encryption_key: String::new(),
            webhook_url: String::new(),
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            gateway_home: PathBuf::from(DEFAULT_GATEWAY_HOME),
            poll_delay: DEFAULT_POLL_DELAY,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read configuration from the process environment.
    ///
    /// Consumes `INSTANCE_ID`, `ENCRYPTION_KEY`, `WEBHOOK_URL`, `STATE_DIR`
    /// and `GATEWAY_HOME`. Unset variables fall back to the defaults above.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(v) = std::env::var("INSTANCE_ID") {
            config.instance_id = v;
        }
        if let Ok(v) = std::env::var("ENCRYPTION_KEY") {
            config.encryption_key = v;
        }
        if let Ok(v) = std::env::var("WEBHOOK_URL") {
            config.webhook_url = v;
        }
        if let Ok(v) = std::env::var("STATE_DIR") {
            if !v.is_empty() {
                config.state_dir = PathBuf::from(v);
            }
        }
        if let Ok(v) = std::env::var("GATEWAY_HOME") {
            if !v.is_empty() {
                config.gateway_home = PathBuf::from(v);
            }
        }

        if config.instance_id.is_empty() || config.encryption_key.is_empty() {
            tracing::warn!("INSTANCE_ID or ENCRYPTION_KEY is empty; webhook signatures will use a degenerate secret");
        }
        if config.webhook_url.is_empty() {
            tracing::info!("WEBHOOK_URL not set; webhook delivery disabled");
        }

        config
    }

    /// Set the instance identifier.
    pub fn with_instance_id(mut self, id: impl Into<String>) -> Self {
        self.instance_id = id.into();
        self
    }

    /// Set the encryption key.
    pub fn with_encryption_key(mut self, key: impl Into<String>) -> Self {
        self.encryption_key = key.into();
        self
    }

    /// Set the webhook base URL.
    pub fn with_webhook_url(mut self, url: impl Into<String>) -> Self {
        self.webhook_url = url.into();
        self
    }

    /// Set the state directory.
    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = dir.into();
        self
    }

    /// Set the gateway install root.
    pub fn with_gateway_home(mut self, dir: impl Into<PathBuf>) -> Self {
        self.gateway_home = dir.into();
        self
    }

    /// Set the credential polling delay.
    pub fn with_poll_delay(mut self, delay: Duration) -> Self {
        self.poll_delay = delay;
        self
    }

    /// Directory the gateway persists WhatsApp credentials into.
    pub fn credentials_dir(&self) -> PathBuf {
        self.state_dir.join("credentials").join("whatsapp").join("default")
    }
}
