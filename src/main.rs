use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use textql::backend::PolarsBackend;
use textql::config::Config;
use textql::engine::{Engine, TrainingInput};
use textql::llm::OpenAiClient;
use textql::store::CorpusStore;
use tracing::info;

#[derive(Parser)]
#[command(name = "textql")]
#[command(about = "Ask natural-language questions over tabular data with generated SQL")]
struct Args {
    /// Directory of CSV files served as tables (default: ./data)
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,

    /// OpenAI API key (or set OPENAI_API_KEY env var)
    #[arg(long)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register every CSV in the data directory and train its schema
    /// plus a sample query per table
    Ingest,

    /// Add training artifacts to the corpus
    Train {
        /// A CREATE TABLE statement
        #[arg(long)]
        ddl: Option<String>,

        /// A SQL query (an example on its own, or the answer to --question)
        #[arg(long)]
        sql: Option<String>,

        /// Natural-language question answered by --sql
        #[arg(long)]
        question: Option<String>,
    },

    /// Ask a natural-language question
    Ask { question: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = Config::from_env();
    if let Some(api_key) = args.api_key {
        config.api_key = api_key;
    }

    let client = Arc::new(OpenAiClient::new(&config)?);
    let backend = Arc::new(PolarsBackend::new());
    let store = Arc::new(CorpusStore::open(
        config.store_dir.join("corpus.db"),
        client.clone(),
    )?);
    let engine = Engine::new(store, client, backend.clone(), &config);

    match args.command {
        Command::Ingest => {
            let tables = load_data_dir(&backend, &args.data_dir)?;
            if tables.is_empty() {
                bail!("no CSV files found in {}", args.data_dir.display());
            }
            for table in tables {
                engine.train_table(&table).await?;
                engine
                    .train(TrainingInput {
                        sql: Some(format!("SELECT * FROM {} LIMIT 5", table)),
                        ..Default::default()
                    })
                    .await?;
                println!("Trained table: {}", table);
            }
        }

        Command::Train { ddl, sql, question } => {
            let input = match (question, sql) {
                (Some(question), Some(sql)) => TrainingInput {
                    ddl,
                    pair: Some((question, sql)),
                    ..Default::default()
                },
                (Some(_), None) => bail!("--question requires --sql"),
                (None, sql) => TrainingInput {
                    ddl,
                    sql,
                    ..Default::default()
                },
            };
            let ids = engine.train(input).await?;
            println!("Stored {} artifact(s)", ids.len());
        }

        Command::Ask { question } => {
            load_data_dir(&backend, &args.data_dir)?;
            let answer = engine.ask(&question).await;

            match (answer.sql, answer.rows) {
                (Some(sql), Some(rows)) => {
                    println!("\nSQL: {}", sql);
                    println!("\n{}", rows);
                }
                (Some(sql), None) => {
                    println!("\nSQL: {}", sql);
                    println!(
                        "Query failed to execute: {}",
                        answer.diagnostic.unwrap_or_default()
                    );
                }
                (None, _) => {
                    println!(
                        "No SQL query could be generated: {}",
                        answer.diagnostic.unwrap_or_default()
                    );
                }
            }
        }
    }

    Ok(())
}

/// Register each `*.csv` file in the directory as a table named after the
/// file stem. Missing directory is fine for corpus-only commands.
fn load_data_dir(backend: &PolarsBackend, data_dir: &PathBuf) -> Result<Vec<String>> {
    let mut tables = Vec::new();
    if !data_dir.is_dir() {
        return Ok(tables);
    }

    let mut entries: Vec<PathBuf> = std::fs::read_dir(data_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().map_or(false, |ext| ext == "csv"))
        .collect();
    entries.sort();

    for path in entries {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        backend.register_csv(stem, &path)?;
        tables.push(stem.to_string());
    }

    info!("Registered {} table(s) from {}", tables.len(), data_dir.display());
    Ok(tables)
}
