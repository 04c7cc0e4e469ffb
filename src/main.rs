use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use umedia::config::AppConfig;
use umedia::gemini_client::GeminiClient;
use umedia::jobs::JobManager;
use umedia::media::HttpMediaFetcher;
use umedia::portfolio::{seed_collection, FileStorage, PortfolioStore};
use umedia::{logging, GenerationRecord, WorkflowStatus};

#[derive(Parser)]
#[command(name = "umedia", version, about = "Generate AI videos and keep them in a local portfolio")]
struct Cli {
    /// Directory holding the portfolio and downloaded media
    #[arg(long, global = true, env = "UMEDIA_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a video from a prompt and add it to the portfolio
    Generate {
        /// What the video should show
        #[arg(long)]
        prompt: String,
        /// How the prompt came about, what it is meant to teach
        #[arg(long)]
        notes: Option<String>,
        /// Seconds between status checks
        #[arg(long)]
        poll_interval: Option<u64>,
    },
    /// Show the portfolio, newest first
    List {
        #[arg(long)]
        json: bool,
    },
    /// Replace the stored portfolio with the demo content
    Reset,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    logging::init_logging()?;

    let cli = Cli::parse();
    let mut config = AppConfig::from_env();
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    let store = Arc::new(PortfolioStore::open(Arc::new(FileStorage::new(&config.data_dir))).await);

    match cli.command {
        Command::Generate {
            prompt,
            notes,
            poll_interval,
        } => {
            if let Some(secs) = poll_interval.filter(|s| *s > 0) {
                config.workflow.poll_interval = std::time::Duration::from_secs(secs);
            }
            generate(&config, store, &prompt, notes.as_deref()).await
        }
        Command::List { json } => {
            let portfolio = store.snapshot().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&portfolio)?);
            } else {
                print_portfolio(&portfolio);
            }
            Ok(())
        }
        Command::Reset => {
            let portfolio = store.replace_all(seed_collection()).await?;
            println!("Portfolio reset to {} demo videos", portfolio.len());
            Ok(())
        }
    }
}

async fn generate(
    config: &AppConfig,
    store: Arc<PortfolioStore>,
    prompt: &str,
    notes: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let jobs = JobManager::new(
        Arc::new(GeminiClient::new(&config.veo)),
        Arc::new(HttpMediaFetcher::new(config.media_dir(), config.veo.base_url.clone())),
        config.credential.clone(),
        config.workflow.clone(),
        store.clone(),
    );

    let job_id = jobs.spawn_generation(prompt, notes).await?;
    let mut status = jobs
        .subscribe(&job_id)
        .await
        .ok_or("generation job disappeared")?;

    loop {
        let current = status.borrow_and_update().clone();
        println!("[{}] {}", current.label(), current.message());
        if current.is_terminal() {
            break;
        }

        tokio::select! {
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                jobs.cancel(&job_id).await;
            }
        }
    }

    match jobs.wait(&job_id).await {
        Some(WorkflowStatus::Committed { record_id }) => {
            if let Some(record) = store.get(&record_id).await {
                print_portfolio(std::slice::from_ref(&record));
            }
            Ok(())
        }
        Some(WorkflowStatus::Failed { message }) => Err(message.into()),
        Some(WorkflowStatus::Cancelled) => Err("generation cancelled".into()),
        other => Err(format!("generation ended unexpectedly: {:?}", other).into()),
    }
}

fn print_portfolio(records: &[GenerationRecord]) {
    if records.is_empty() {
        println!("The portfolio is empty");
        return;
    }
    for record in records {
        let created = DateTime::<Utc>::from_timestamp_millis(record.created_at)
            .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "unknown time".to_string());
        println!("uMedia #{}  {}  {}", record.short_id(), created, record.prompt);
        println!("    {}", record.source_locator);
        if !record.notes.is_empty() {
            println!("    {}", record.notes);
        }
    }
}
