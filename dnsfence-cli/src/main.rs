//! Dnsfence CLI entry point -- parse, configure, dispatch

mod cli;
mod commands;
mod error;
mod output;
mod state;

use clap::Parser;

use dnsfence_core::config::DnsfenceConfig;

use crate::cli::{Cli, Commands};
use crate::error::CliError;
use crate::output::OutputWriter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_config(&cli).await?;
    init_tracing(&cli, &config);

    tracing::debug!(config = %cli.config.display(), "dnsfence starting");

    let writer = OutputWriter::new(cli.output);
    match cli.command {
        Commands::Provision(args) => commands::instance::provision(args, &config, &writer).await,
        Commands::Deprovision(args) => {
            commands::instance::deprovision(args, &config, &writer).await
        }
        Commands::Restart(args) => commands::instance::restart(args, &config, &writer).await,
        Commands::Status(args) => commands::instance::status(args, &config, &writer).await,
        Commands::List => commands::instance::list(&config, &writer).await,
        Commands::Sync(args) => commands::sync::run(args, &config, &writer).await,
        Commands::Routing(args) => commands::routing::run(args, &config, &writer).await,
        Commands::Tenant(args) => commands::tenant::run(args, &config, &writer).await,
        Commands::Config(args) => commands::config::run(args, &cli.config, &config, &writer),
    }
}

/// 설정 파일을 로드합니다.
///
/// 파일이 없으면 기본값으로 동작합니다 (환경변수 오버라이드는 그대로
/// 적용). 그 외의 로드 실패는 설정 에러입니다.
async fn load_config(cli: &Cli) -> Result<DnsfenceConfig, CliError> {
    use dnsfence_core::error::{ConfigError, DnsfenceError};

    match DnsfenceConfig::load(&cli.config).await {
        Ok(config) => Ok(config),
        Err(DnsfenceError::Config(ConfigError::FileNotFound { .. })) => {
            let mut config = DnsfenceConfig::default();
            config.apply_env_overrides();
            config
                .validate()
                .map_err(|e| CliError::Config(e.to_string()))?;
            Ok(config)
        }
        Err(e) => Err(CliError::Config(e.to_string())),
    }
}

fn init_tracing(cli: &Cli, config: &DnsfenceConfig) {
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.general.log_level.clone());

    if config.general.log_format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(level.as_str())
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(level.as_str())
            .with_writer(std::io::stderr)
            .init();
    }
}
