use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::*;
use crowbox_cli::config::{database_url_from_env, ServerConfig};
use crowbox_cli::{build_manager, run_server};
use crowbox_sandbox::EngineConfig;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "crowbox")]
#[command(about = "Crowbox - sandbox execution engine for team Python projects")]
#[command(version)]
struct Cli {
    /// Override the project base directory
    #[arg(long, global = true)]
    base_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the compile API
    Serve {
        #[arg(long, help = "API server port (overrides CROWBOX_API_PORT)")]
        port: Option<u16>,
        #[arg(long, help = "Do not run the daily cleanup sweep")]
        no_scheduler: bool,
    },
    /// Stop every sandbox container and prune images now
    Sweep,
    /// Register a team so it can receive a sandbox
    AddTeam { team_id: i64, team_name: String },
    /// Allocate the fixed host port of a team
    RegisterPort { team_id: i64 },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    if let Err(e) = handle_command(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

async fn handle_command(cli: Cli) -> anyhow::Result<()> {
    let mut engine = EngineConfig::from_env();
    if let Some(base_root) = cli.base_root {
        engine = engine.with_base_root(base_root);
    }

    match cli.command {
        Commands::Serve { port, no_scheduler } => {
            let mut server = ServerConfig::from_env().context("Invalid server configuration")?;
            if let Some(port) = port {
                server.port = port;
            }
            println!(
                "{} Serving sandboxes from {} on http://{}",
                "==>".green().bold(),
                engine.base_root.display(),
                server.addr()
            );
            run_server(server, engine, !no_scheduler).await
        }
        Commands::Sweep => {
            let (manager, _) = build_manager(engine, &database_url_from_env()).await?;
            let report = manager.sweep().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Commands::AddTeam { team_id, team_name } => {
            let (_, store) = build_manager(engine, &database_url_from_env()).await?;
            let team = store
                .create_team(team_id, &team_name)
                .await
                .with_context(|| format!("Failed to create team {}", team_id))?;
            println!("{} Team {} ({}) created", "✓".green(), team.team_id, team.team_name);
            Ok(())
        }
        Commands::RegisterPort { team_id } => {
            let (manager, _) = build_manager(engine, &database_url_from_env()).await?;
            let port = manager
                .register_port(team_id)
                .await
                .with_context(|| format!("Failed to register port for team {}", team_id))?;
            println!("{} Team {} uses host port {}", "✓".green(), team_id, port);
            Ok(())
        }
    }
}
