use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pinsage::{load_interactions, HierarchicalSage, SageConfig, SageError};
use pinsage_core::{init_logging, load_dotenv, ConfigLoader, LogConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pinsage")]
#[command(about = "Hierarchical board recommender over a product catalog", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(
        long,
        global = true,
        env = "PINSAGE_DATASET_PATH",
        help = "CSV/JSON-lines file, or a directory containing CSV files"
    )]
    dataset: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Build the graph, cluster boards and cross-validate")]
    Run {
        #[arg(long, help = "CSV of user_id,pin_id,rating; simulated when omitted")]
        interactions: Option<PathBuf>,

        #[arg(long, help = "Include the board embedding map in the report")]
        embeddings: bool,
    },

    #[command(about = "Recommend boards similar to a query board")]
    Recommend {
        #[arg(help = "Board id, e.g. board_0_category_1")]
        board: String,

        #[arg(short = 'k', long, help = "Number of boards to return")]
        top_k: Option<usize>,

        #[arg(long, help = "Skip direct sub-boards of the query")]
        exclude_children: bool,
    },
}

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {:#}", err);
        std::process::exit(exit_code(&err));
    }
}

/// 2 for unreadable or empty input data, 1 for everything else
fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<SageError>() {
        Some(sage_err) if sage_err.is_data_error() => 2,
        _ => 1,
    }
}

fn run() -> Result<()> {
    load_dotenv();
    init_logging(&LogConfig::from_env()).context("Failed to initialize logging")?;

    let cli = Cli::parse();
    let config = SageConfig::load().context("Failed to load configuration")?;

    let dataset = cli
        .dataset
        .or_else(|| config.dataset_path.clone())
        .context("A dataset path is required: pass --dataset or set PINSAGE_DATASET_PATH")?;

    let mut sage = HierarchicalSage::new(config);

    match cli.command {
        Commands::Run {
            interactions,
            embeddings,
        } => {
            let interactions = interactions
                .map(|path| {
                    load_interactions(&path).with_context(|| {
                        format!("Failed to read interactions from {}", path.display())
                    })
                })
                .transpose()?;

            let report = sage
                .run_pipeline(&dataset, interactions, embeddings)
                .with_context(|| format!("Pipeline failed for {}", dataset.display()))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Recommend {
            board,
            top_k,
            exclude_children,
        } => {
            let data = sage
                .load_dataset(&dataset)
                .with_context(|| format!("Failed to load dataset {}", dataset.display()))?;
            sage.build_graph(&data)?;
            sage.generate_embeddings()?;

            let top_k = top_k.unwrap_or(sage.config().top_k);
            let results = sage.recommend_similar_boards(&board, top_k, exclude_children)?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
    }

    Ok(())
}
