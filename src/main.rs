//! Prometheus CLI entry point.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use prometheus_swarm::cli::{self, Cli, Commands};
use prometheus_swarm::infrastructure::logging::{LogConfig, LoggerImpl};

/// Human-readable logs on stderr, so stdout stays clean for command output.
fn init_stderr_logging(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match cli::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            init_stderr_logging("warn");
            cli::handle_error(err, cli.json);
        }
    };

    // With a log directory configured, logs go to the rolling JSON file only.
    let _logger = if config.logging.log_dir.is_some() {
        let log_config = LogConfig {
            enable_stdout: false,
            ..LogConfig::from(&config.logging)
        };
        match LoggerImpl::init(&log_config) {
            Ok(logger) => Some(logger),
            Err(err) => {
                init_stderr_logging(&config.logging.level);
                tracing::warn!(error = %err, "file logging unavailable, using stderr");
                None
            }
        }
    } else {
        init_stderr_logging(&config.logging.level);
        None
    };

    let result = match cli.command {
        Commands::Demo => cli::commands::demo::execute(&config, cli.json).await,
        Commands::Audit(args) => cli::commands::audit::execute(args, &config, cli.json).await,
        Commands::Hierarchy => cli::commands::hierarchy::execute(&config, cli.json).await,
    };

    if let Err(err) = result {
        cli::handle_error(err, cli.json);
    }
}
