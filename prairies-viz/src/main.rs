//! Point d'entrée CLI pour prairies-viz

use anyhow::Result;
use clap::Parser;
use prairies::AggregationLevel;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

use prairies_viz::cli::{self, Commands, DataArgs};

// Charger .env au démarrage
fn load_env() {
    // Chercher .env dans le répertoire courant ou parent
    if dotenvy::dotenv().is_err() {
        // Essayer depuis le répertoire du binaire
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

/// Visualiser les statistiques de prairies (altitude, pente, surface)
#[derive(Parser)]
#[command(name = "prairies-viz")]
#[command(author, version)]
#[command(about = "Cartes, tableaux et drill-down sur le parcellaire des prairies")]
struct Cli {
    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Provenance du jeu de données
    #[command(flatten)]
    data: DataArgs,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Charger .env avant tout
    load_env();

    let args = Cli::parse();
    init_logging(args.verbose, args.quiet);

    let client = reqwest::Client::new();
    let (dataset, schema) = cli::setup(&client, &args.data).await?;

    match args.command {
        Commands::Regions { boundaries, output } => {
            info!("Vue choroplèthe des régions");
            cli::cmd_map(
                &client,
                &dataset,
                schema,
                AggregationLevel::Region,
                boundaries,
                output,
            )
            .await?;
        }
        Commands::Departments { boundaries, output } => {
            info!("Vue choroplèthe des départements");
            cli::cmd_map(
                &client,
                &dataset,
                schema,
                AggregationLevel::Department,
                boundaries,
                output,
            )
            .await?;
        }
        Commands::Communes { region, department } => {
            info!(?region, ?department, "Agrégats par commune");
            cli::cmd_communes(&dataset, schema, region, department)?;
        }
        Commands::Scatter { output } => {
            info!("Nuage de points altitude/pente");
            cli::cmd_scatter(&dataset, schema, output)?;
        }
        Commands::Drill => {
            info!("Drill-down interactif");
            cli::cmd_drill(&dataset, schema)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}
