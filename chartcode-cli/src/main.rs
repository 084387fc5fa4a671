use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};

use chartcode::{ChartcodeConfig, CodingPipeline, LlmProviderFactory, SqliteStore};

#[derive(Parser)]
#[command(name = "chartcode")]
#[command(version)]
#[command(about = "Clinical narrative to CDT billing codes")]
struct Cli {
    /// Path to a TOML config file; defaults plus environment variables
    /// (OPENAI_API_KEY, ANTHROPIC_API_KEY, OPENROUTER_API_KEY) otherwise.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Submit(SubmitArgs),
    Answer(AnswerArgs),
    Show(ShowArgs),
}

#[derive(Parser)]
struct SubmitArgs {
    /// Narrative text; reads stdin when omitted.
    text: Option<String>,
}

#[derive(Parser)]
struct AnswerArgs {
    record_id: String,

    /// Answered questions as question=answer pairs.
    #[arg(required = true)]
    answers: Vec<String>,
}

#[derive(Parser)]
struct ShowArgs {
    record_id: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = ChartcodeConfig::load(cli.config.as_deref())?;
    let provider = LlmProviderFactory::create_provider(config.provider.clone())?;
    let store = Arc::new(SqliteStore::new(&config.db_path)?);
    let pipeline = CodingPipeline::new(Arc::from(provider), store, &config.pipeline);

    match cli.command {
        Commands::Submit(args) => {
            let text = match args.text {
                Some(text) => text,
                None => {
                    let mut buffer = String::new();
                    std::io::Read::read_to_string(&mut std::io::stdin(), &mut buffer)
                        .context("failed to read narrative from stdin")?;
                    buffer
                }
            };
            let outcome = pipeline.submit(&text).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Answer(args) => {
            let mut answers = BTreeMap::new();
            for pair in &args.answers {
                let (question, answer) = pair
                    .split_once('=')
                    .ok_or_else(|| anyhow!("expected question=answer, got {:?}", pair))?;
                answers.insert(question.trim().to_string(), answer.trim().to_string());
            }
            let outcome = pipeline.answer(&args.record_id, answers).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Show(args) => {
            let stored = pipeline
                .fetch(&args.record_id)?
                .ok_or_else(|| anyhow!("record {} not found", args.record_id))?;
            println!("{}", serde_json::to_string_pretty(&stored)?);
        }
    }
    Ok(())
}
