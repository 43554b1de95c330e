use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use whisky_catalog::{
    config::Config,
    connect,
    search::SortOrder,
    telemetry::init_tracing,
};

#[derive(Parser)]
#[command(name = "whisky-cli")]
#[command(about = "Whisky catalogue maintenance CLI", long_about = None)]
struct Cli {
    /// Override the database path from configuration
    #[arg(short, long, env = "WHISKY_DATABASE")]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema and the search index
    InitDb,

    /// Push every review to the search index
    Reindex,

    /// Run a simple search
    Search {
        /// Query text; `@tag` filters, `-word` excludes
        #[arg(value_name = "QUERY")]
        query: String,

        #[arg(short, long, default_value = "1")]
        page: u32,

        /// relevance, old or new
        #[arg(short, long, default_value = "relevance")]
        sort: SortOrder,

        #[arg(short, long)]
        tag: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(path) = cli.database {
        config.database.path = path;
    }
    init_tracing(&config.observability);

    let (db, search) = connect(&config).context("Failed to open the catalogue")?;

    match cli.command {
        Commands::InitDb => {
            search
                .ensure_index()
                .await
                .context("Failed to create the search index")?;
            println!(
                "Database ready at {} ({} distilleries)",
                config.database.path.display(),
                db.distilleries()?.len()
            );
        }

        Commands::Reindex => {
            if !search.is_enabled() {
                bail!("search.elasticsearch_url is not configured");
            }
            let count = search.reindex().await.context("Reindex failed")?;
            println!("Indexed {} reviews", count);
        }

        Commands::Search {
            query,
            page,
            sort,
            tag,
        } => {
            let pagination = search.pagination(Some(page), None);
            let results = search
                .simple_search(&query, pagination, sort, tag.as_deref())
                .await?;

            println!("{} matching reviews (page {})", results.total, results.page);
            for review in &results.items {
                println!(
                    "#{:<5} {:>3}  {} {}  by {}  [{}]",
                    review.id,
                    review.score,
                    review.distillery,
                    review.whisky,
                    review.author,
                    review.tags.join(", ")
                );
            }
        }
    }

    Ok(())
}
