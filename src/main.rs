//! # Component Atlas CLI (`atlas`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `atlas init` | Create the SQLite database and run schema migrations |
//! | `atlas scan <all\|repo>` | Detect components and store them |
//! | `atlas embed pending` | Generate vectors for components that have none |
//! | `atlas embed rebuild` | Regenerate every vector |
//! | `atlas similar <id>` | Nearest neighbors of a component |
//! | `atlas score <id>` | Rank candidate canonical repositories |
//! | `atlas provenance` | Rebuild the provenance index |
//! | `atlas plan <component> <from> <to>` | Consolidation plan and recommendation |
//! | `atlas stats` | Database overview |
//! | `atlas completions <shell>` | Shell completion script |
//!
//! Logs go to stderr (`RUST_LOG` overrides the default `info` level);
//! results go to stdout.

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use component_atlas::progress::ProgressMode;
use component_atlas::{
    config, embed_cmd, migrate, plan_cmd, provenance_cmd, scan_cmd, score_cmd, similar_cmd, stats,
};

/// Component Atlas: find duplicated components across repositories and
/// recommend where each should live.
#[derive(Parser)]
#[command(name = "atlas", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/atlas.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Scan repositories for components and store the results.
    ///
    /// Target: `all` or a configured repository name (`owner/name`).
    Scan {
        target: String,

        /// Show component counts without writing to the database.
        #[arg(long)]
        dry_run: bool,

        /// Progress on stderr. Defaults to `human` on a terminal, else `off`.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Manage component vectors.
    Embed {
        #[command(subcommand)]
        action: EmbedAction,
    },

    /// Find components similar to a stored component.
    Similar {
        component_id: String,

        #[arg(long)]
        top_k: Option<usize>,

        #[arg(long)]
        min_similarity: Option<f64>,

        /// Print a JSON result envelope.
        #[arg(long)]
        json: bool,
    },

    /// Rank candidate repositories as the canonical home of a component.
    Score {
        component_id: String,

        /// Comma-separated candidate repositories. Defaults to the
        /// repositories holding the component's family.
        #[arg(long, value_delimiter = ',')]
        candidates: Option<Vec<String>>,

        #[arg(long)]
        json: bool,
    },

    /// Rebuild the provenance index from all stored components.
    Provenance {
        #[arg(long)]
        json: bool,
    },

    /// Plan moving a component from one repository into another.
    Plan {
        /// Component id, or a component name in the source repository.
        component: String,
        from: String,
        to: String,

        #[arg(long)]
        json: bool,
    },

    /// Show database statistics.
    Stats,

    /// Print a shell completion script.
    Completions { shell: clap_complete::Shell },
}

#[derive(Subcommand)]
enum EmbedAction {
    /// Generate vectors for components that have none.
    Pending {
        #[arg(long)]
        limit: Option<usize>,

        #[arg(long)]
        batch_size: Option<usize>,

        #[arg(long)]
        dry_run: bool,
    },

    /// Regenerate every vector in place.
    Rebuild {
        #[arg(long)]
        batch_size: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "atlas", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Scan {
            target,
            dry_run,
            progress,
        } => {
            let progress = progress.unwrap_or_else(ProgressMode::default_for_tty);
            scan_cmd::run_scan(&cfg, &target, dry_run, progress).await?;
        }
        Commands::Embed { action } => match action {
            EmbedAction::Pending {
                limit,
                batch_size,
                dry_run,
            } => {
                embed_cmd::run_embed_pending(&cfg, limit, batch_size, dry_run).await?;
            }
            EmbedAction::Rebuild { batch_size } => {
                embed_cmd::run_embed_rebuild(&cfg, batch_size).await?;
            }
        },
        Commands::Similar {
            component_id,
            top_k,
            min_similarity,
            json,
        } => {
            similar_cmd::run_similar(&cfg, &component_id, top_k, min_similarity, json).await?;
        }
        Commands::Score {
            component_id,
            candidates,
            json,
        } => {
            score_cmd::run_score(&cfg, &component_id, candidates, json).await?;
        }
        Commands::Provenance { json } => {
            provenance_cmd::run_provenance(&cfg, json).await?;
        }
        Commands::Plan {
            component,
            from,
            to,
            json,
        } => {
            plan_cmd::run_plan(&cfg, &component, &from, &to, json).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}
