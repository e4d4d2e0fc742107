use clap::Parser;
use courseboard::cli::{Cli, Commands};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "courseboard=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve { host, port }) => {
            courseboard::cli::serve::run(&cli.config, host, port).await?;
        }
        Some(Commands::Migrate) => {
            courseboard::cli::migrate::run(&cli.config).await?;
        }
        Some(Commands::User { command }) => {
            courseboard::cli::user::run(&cli.config, command).await?;
        }
        Some(Commands::Category { command }) => {
            courseboard::cli::category::run(&cli.config, command).await?;
        }
        Some(Commands::Tags { command }) => {
            courseboard::cli::tags::run(&cli.config, command).await?;
        }
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
        }
    }

    Ok(())
}
