mod cli;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use s3fs_daemon::{process, ConfigFile};

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    let config = ConfigFile::load_or_default(cli.config.as_deref())?
        .merge(cli.overrides())
        .resolve()
        .context("invalid configuration")?;

    // fork before any thread exists
    if config.daemonize {
        process::daemonize()?;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (writer, _guard) = tracing_appender::non_blocking(std::io::stdout());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(!config.daemonize)
        .init();

    if let Err(err) = process::run(config) {
        tracing::error!(error = %err, "s3fs stopped with an error");
        return Err(err.into());
    }
    Ok(())
}
