mod speech;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client::location::{Coordinates, FixedLocation, Placemark};
use client::logging;
use client::media::{FileAcquirer, MediaAcquirer, Speaker};
use client::state::AppState;
use client::{ClientError, Config, ErrorKind, MessageRole, Session};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use crate::speech::CommandSpeaker;

#[derive(Parser)]
#[command(name = "unveil", about = "Unveil -- describe a photo or video and ask about it")]
struct Cli {
    #[command(subcommand)]
    command: Capture,

    /// Path to config.toml (defaults to config.toml next to this exe)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Latitude of the capture
    #[arg(long, global = true, requires = "lon", allow_hyphen_values = true)]
    lat: Option<f64>,

    /// Longitude of the capture
    #[arg(long, global = true, requires = "lat", allow_hyphen_values = true)]
    lon: Option<f64>,

    /// Human-readable address for the coordinates
    #[arg(long, global = true, requires = "lat")]
    address: Option<String>,

    /// Question to ask after the analysis (repeatable). Without any, questions
    /// are read from stdin.
    #[arg(short, long = "ask", global = true)]
    questions: Vec<String>,

    /// Read the description aloud
    #[arg(long, global = true)]
    speak: bool,
}

#[derive(Subcommand)]
enum Capture {
    /// Analyze a photo
    Photo { path: PathBuf },
    /// Analyze a video clip (sent as video/mp4)
    Video { path: PathBuf },
}

impl Cli {
    fn coordinates(&self) -> Option<Coordinates> {
        Some(Coordinates {
            latitude: self.lat?,
            longitude: self.lon?,
        })
    }

    fn location(&self) -> FixedLocation {
        FixedLocation {
            coordinates: self.coordinates(),
            placemark: self.address.clone().map(|name| Placemark {
                name: Some(name),
                ..Placemark::default()
            }),
        }
    }
}

/// Print the loading indicator on each idle -> loading transition.
fn watch_loading(session: &Session) {
    let was_loading = AtomicBool::new(false);
    session.store().subscribe(move |state: &AppState| {
        let before = was_loading.swap(state.is_loading, Ordering::SeqCst);
        if state.is_loading && !before {
            println!("Processing...");
        }
    });
}

async fn run_capture(cli: &Cli, session: &Session) -> Result<()> {
    let coordinates = cli.coordinates();
    let result = match &cli.command {
        Capture::Photo { path } => {
            let photo = FileAcquirer::load_photo(path, coordinates)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            session.analyze_photo(photo).await
        }
        Capture::Video { path } => {
            let acquirer = FileAcquirer {
                video: Some(path.clone()),
                location: coordinates,
                ..FileAcquirer::default()
            };
            let Some(video) = acquirer.capture_video() else {
                bail!("{} is not a video file", path.display());
            };
            session.analyze_video(video).await
        }
    };

    let description = session.store().read(|s| s.building_context.clone());
    println!("\nAnalysis:\n{description}\n");
    if let Err(e) = result {
        info!("Analysis failed: {e}");
    }
    Ok(())
}

/// Errors for which the session appended a failure notice to the log.
fn left_notice(error: &ClientError) -> bool {
    matches!(
        error.kind(),
        ErrorKind::Transport | ErrorKind::EmptyResponse | ErrorKind::UnexpectedFormat
    )
}

async fn ask(session: &Session, question: &str) {
    session.set_question(question);
    match session.ask(question).await {
        Ok(answer) => println!("{answer}\n"),
        Err(ClientError::Busy) => println!("Still working on the last request.\n"),
        Err(e) if left_notice(&e) => {
            let notice = session.store().read(|s| {
                s.messages
                    .last()
                    .filter(|m| m.role() == MessageRole::Assistant)
                    .map(|m| m.content().to_string())
            });
            if let Some(notice) = notice {
                println!("{notice}\n");
            }
        }
        Err(e) => info!("Question dropped: {e}"),
    }
}

async fn interactive(session: &Session, speaker: Option<&dyn Speaker>) -> Result<()> {
    println!("Ask a question about the building (/speak, /stop, /quit):");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/speak" => match speaker {
                Some(s) => session.speak_description(s),
                None => println!("Speech is off (run with --speak)."),
            },
            "/stop" => {
                if let Some(s) = speaker {
                    s.stop();
                }
            }
            question => ask(session, question).await,
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load_or_default(cli.config.as_deref()).context("Failed to load config")?;
    logging::init_tracing(&config.logging, "unveil.log");
    info!("Analysis service: {}", config.endpoint.base_url);

    let session = Session::from_config(&config, Arc::new(cli.location()));
    watch_loading(&session);

    run_capture(&cli, &session).await?;

    let speaker = cli.speak.then(CommandSpeaker::platform_default);
    if let Some(ref s) = speaker {
        session.speak_description(s);
    }

    if cli.questions.is_empty() {
        interactive(&session, speaker.as_ref().map(|s| s as &dyn Speaker)).await?;
    } else {
        for question in &cli.questions {
            println!("> {question}");
            ask(&session, question).await;
        }
    }

    if let Some(s) = speaker {
        s.stop();
    }
    Ok(())
}
