use linkwatch::cli::{parse_args, CliCommand};
use linkwatch::config::Config;
use linkwatch::flow::run_login_flow;

use color_eyre::Result;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize tracing to stderr so mirrored gateway output on stdout stays
/// clean. `RUST_LOG` overrides the default `info` level.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    match parse_args(std::env::args()) {
        CliCommand::Version => {
            println!("linkwatch {}", VERSION);
            Ok(())
        }
        CliCommand::RunLogin => {
            init_tracing();

            let config = Config::from_env();
            let outcome = run_login_flow(&config).await?;

            tracing::info!(?outcome, exit_code = outcome.exit_code(), "login run finished");
            std::process::exit(outcome.exit_code());
        }
    }
}
