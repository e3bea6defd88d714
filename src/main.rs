//! Command-line entry point.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Build the credential pool from `GROQ_API_KEYS` and wrap it in a
//!    [`Dispatcher`](textfix_bot::pool::Dispatcher).
//! 4. Build the [`FriendlyProcessor`] and run the requested subcommand.
//!
//! A missing key list is not fatal: every LLM command then answers with the
//! "service unavailable" notice.

use std::io::{BufRead, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use textfix_bot::{
    config::{AppConfig, AppPaths},
    export::{export, ExportFormat},
    llm::{FriendlyProcessor, GroqClient, ProcessingMode, TextProcessor},
    session::SessionStore,
};

/// The CLI acts as a single local user.
const LOCAL_USER: u64 = 0;
/// Dialogue key for the document passed to `ask`.
const DOCUMENT_MESSAGE: u64 = 1;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "textfix-bot", version, about = "Correct, summarise and transcribe text through a rotating pool of LLM API keys")]
struct Cli {
    /// Settings file (defaults to the platform config dir).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also save the result as a .txt file (in DIR, or the temp dir).
    #[arg(long, global = true, value_name = "DIR", num_args = 0..=1)]
    export: Option<Option<PathBuf>>,

    /// Format of the exported file.
    #[arg(long, global = true, default_value = "txt", value_name = "txt|pdf")]
    format: ExportFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Correct or summarise text from FILE (stdin when omitted).
    Correct {
        #[arg(long, short, default_value = "basic")]
        mode: ProcessingMode,
        file: Option<PathBuf>,
    },
    /// Transcribe a voice/audio file.
    Transcribe { file: PathBuf },
    /// Extract text from an image.
    Ocr { file: PathBuf },
    /// Ask questions about a text document, one per stdin line.
    Ask {
        #[arg(long)]
        document: PathBuf,
    },
    /// Show the configured API keys (masked).
    Keys,
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // 2. Configuration
    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("cannot load {}", path.display()))?,
        None => AppConfig::load().unwrap_or_else(|e| {
            log::warn!("Failed to load config ({e}); using defaults");
            AppConfig::default()
        }),
    };

    // 3. Key pool + dispatcher, 4. processor
    let processor = FriendlyProcessor::new(TextProcessor::new(
        config.build_dispatcher(),
        Arc::new(GroqClient::from_config(&config.provider)),
        config.text.clone(),
    ));
    let sessions = SessionStore::new();

    let output = match cli.command {
        Command::Correct { mode, file } => {
            let text = read_text(file.as_deref())?;
            let modes = sessions.start(LOCAL_USER, &text, &config.text);
            if !modes.contains(&mode) {
                log::info!(
                    "mode {mode} not offered for this text; available: {}",
                    modes.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(", ")
                );
            }
            match processor.correct_session(&sessions, LOCAL_USER, mode).await {
                Some(result) => result,
                None => processor.correct(mode, &text).await,
            }
        }
        Command::Transcribe { file } => {
            let audio = read_bytes(&file)?;
            let name = file
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("audio.ogg");
            processor.transcribe_voice(&audio, name, audio_mime(&file)).await
        }
        Command::Ocr { file } => {
            let image = read_bytes(&file)?;
            processor.extract_image_text(&image).await
        }
        Command::Ask { document } => {
            let text = read_text(Some(document.as_path()))?;
            sessions.add_document(LOCAL_USER, DOCUMENT_MESSAGE, &text);
            run_dialogue(&processor, &sessions).await?
        }
        Command::Keys => {
            let pool = processor.inner().dispatcher().pool();
            println!("{} key(s) from {}", pool.len(), config.keys_env);
            for masked in pool.masked() {
                println!("  {masked}");
            }
            return Ok(());
        }
    };

    println!("{output}");

    if let Some(dir) = cli.export {
        let dir = dir.unwrap_or_else(|| AppPaths::new().export_dir);
        let path = export(&dir, LOCAL_USER, &output, cli.format)?;
        println!("saved to {}", path.display());
    }

    Ok(())
}

/// Answer stdin questions one by one.  Successful answers join the Q&A
/// history; failures are shown but not remembered.  Returns the whole
/// transcript.
async fn run_dialogue(processor: &FriendlyProcessor, sessions: &SessionStore) -> Result<String> {
    let mut transcript = String::new();
    for line in std::io::stdin().lock().lines() {
        let question = line?;
        if question.trim().is_empty() {
            continue;
        }
        let Some(answer) = processor
            .answer_in_dialogue(sessions, LOCAL_USER, DOCUMENT_MESSAGE, &question)
            .await
        else {
            break;
        };
        println!("{answer}\n");
        transcript.push_str(&format!("Q: {question}\nA: {answer}\n\n"));
    }
    Ok(transcript)
}

fn read_text(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display())),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("cannot read stdin")?;
            Ok(buf)
        }
    }
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))
}

fn audio_mime(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("m4a") => "audio/mp4",
        Some("mp4") => "video/mp4",
        Some("webm") => "audio/webm",
        _ => "audio/ogg",
    }
}
