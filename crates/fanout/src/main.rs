//! fanout
//!
//! Runs one command, upload, copy or script across many hosts over SSH and
//! exits 0 when every host succeeded, 1 on partial success and 2 when every
//! host failed.

use std::io::IsTerminal;
use std::sync::Arc;

use clap::Parser;
use color_eyre::Result;
use fanout_core::{CredentialSource, Engine, EnvSource, PromptSource};
use fanout_fleet::AwsCliResolver;

mod cli;
mod config;
mod factory;
mod logging;
mod output;

use cli::Cli;
use config::FileConfig;
use factory::SshSessionFactory;

/// Password variable consulted when `--password-env` is not given
const DEFAULT_PASSWORD_ENV: &str = "FANOUT_PASSWORD";

fn credential_source(password_env: Option<&str>) -> Arc<dyn CredentialSource> {
    match password_env {
        Some(var) => Arc::new(EnvSource::new(var)),
        None if std::env::var_os(DEFAULT_PASSWORD_ENV).is_some() => {
            Arc::new(EnvSource::new(DEFAULT_PASSWORD_ENV))
        }
        None => Arc::new(PromptSource),
    }
}

async fn run(cli: Cli, title: &'static str) -> Result<i32> {
    let (target, operation) = cli.command.into_parts();

    let file = FileConfig::discover(target.config.as_deref())?;
    let log_file = target.log_file.clone().or_else(|| file.log_file.clone());
    let dry_run = target.dry_run || file.dry_run.unwrap_or(false);
    logging::init(target.verbose || dry_run, log_file.as_deref())?;

    let config = config::merge(&target, file)?;
    config::validate_operation(&operation)?;

    tracing::debug!(?config, "resolved configuration");

    let engine = Engine::new(
        config,
        Arc::new(SshSessionFactory),
        credential_source(target.password_env.as_deref()),
    )
    .with_resolver(Arc::new(AwsCliResolver::new()));

    let summary = engine.run(operation).await?;

    if target.json {
        println!("{}", output::render_json(&summary)?);
    } else {
        let color = std::io::stdout().is_terminal();
        print!("{}", output::render_text(&summary, title, color));
    }
    output::log_failures(&summary, title);

    Ok(output::exit_code(&summary))
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let title = cli.command.label();

    match run(cli, title).await {
        Ok(code) => std::process::exit(code),
        Err(report) => {
            let (code, label) = output::fatal_exit(&report);
            tracing::error!(error = %report, "{title} aborted");
            if code == output::EXIT_UNEXPECTED {
                eprintln!("{label}: {report:?}");
            } else {
                eprintln!("{label}: {report}");
            }
            std::process::exit(code)
        }
    }
}
