use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use studio_client::render::{render_video, render_videos};
use studio_client::{FileStore, GenerationSession, ProgressConfig, RelayClient};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Generate and browse videos through the relay service", long_about = None)]
struct Cli {
    /// Base URL of the relay service
    #[arg(long, env = "STUDIO_RELAY_URL", default_value = "http://localhost:8080", global = true)]
    relay_url: String,

    /// Directory holding the persisted session state
    #[arg(long, env = "STUDIO_STATE_DIR", default_value = ".studio", global = true)]
    state_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a video from a text prompt
    Generate {
        text: String,
        /// Generate without an audio track
        #[arg(long)]
        no_audio: bool,
    },
    /// List previously generated videos
    List,
    /// Show one video
    Show { id: String },
    /// Print the persisted session state
    Status,
    /// Clear the error banner
    Dismiss,
    /// Forget all persisted session state
    Reset,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let store = FileStore::open(&cli.state_dir)
        .await
        .with_context(|| format!("opening state directory {}", cli.state_dir.display()))?;
    let api = RelayClient::new(relay_route(&cli.relay_url));
    let session =
        GenerationSession::restore(Arc::new(api), Arc::new(store), ProgressConfig::default())
            .await
            .context("restoring session state")?;

    match cli.command {
        Commands::Generate { text, no_audio } => generate(&session, &text, !no_audio).await,
        Commands::List => {
            let videos = session.list_videos().await?;
            print!("{}", render_videos(&videos));
            Ok(())
        }
        Commands::Show { id } => {
            let video = session.get_video(&id).await?;
            print!("{}", render_video(&video));
            Ok(())
        }
        Commands::Status => {
            let state = session.state().await;
            println!("{}", serde_json::to_string_pretty(&state)?);
            Ok(())
        }
        Commands::Dismiss => {
            session.dismiss_error().await?;
            Ok(())
        }
        Commands::Reset => {
            session.reset().await?;
            println!("Session state cleared");
            Ok(())
        }
    }
}

async fn generate(session: &GenerationSession, text: &str, enable_audio: bool) -> anyhow::Result<()> {
    let mut progress = session.subscribe_progress();
    let printer = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let value = *progress.borrow_and_update();
            if value < 100 {
                eprintln!("Generating... ~{value}% (estimated)");
            }
        }
    });

    let result = session.submit(text, enable_audio).await;
    printer.abort();

    let url = result?;
    println!("{url}");
    Ok(())
}

fn relay_route(base: &str) -> String {
    format!("{}/relay", base.trim_end_matches('/'))
}
