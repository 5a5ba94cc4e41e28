use anyhow::Result;
use clap::Parser;
use recruiter_mailer::cli::{Cli, CliHandler};
use recruiter_mailer::secrets::EnvOrPromptSecretProvider;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    if cli.debug {
        tracing::debug!("Debug mode enabled - verbose logging active");
    }

    let handler = CliHandler::new(EnvOrPromptSecretProvider::new(cli.secret_env.clone()));
    handler.run(&cli).await?;

    Ok(())
}
