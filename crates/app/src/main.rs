use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use roadmap_core::model::{RoadmapCatalog, RoadmapId};
use roadmap_core::session::{AuthToken, Credentials, SessionContext};
use services::{Clock, OverviewService, ProgressSyncError, RoadmapSession};
use storage::{ApiConfig, Storage};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidRoadmap { raw: String },
    InvalidTogglePath { raw: String },
    MissingCatalog,
    MissingApiUrl,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidRoadmap { raw } => write!(f, "invalid --roadmap value: {raw}"),
            ArgsError::InvalidTogglePath { raw } => {
                write!(f, "invalid --toggle value: {raw} (want level/tech/topic/item)")
            }
            ArgsError::MissingCatalog => write!(f, "roadmap command requires --catalog <path>"),
            ArgsError::MissingApiUrl => write!(f, "ROADMAP_API_URL is not set"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- dashboard");
    eprintln!("  cargo run -p app -- roadmap --roadmap <slug> --catalog <path> \\");
    eprintln!("      [--toggle <level/tech/topic/item>]...");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  ROADMAP_API_URL    base URL of the progress API (required)");
    eprintln!("  ROADMAP_API_TOKEN  bearer token; omit to browse anonymously");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Dashboard,
    Roadmap,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "dashboard" => Some(Self::Dashboard),
            "roadmap" => Some(Self::Roadmap),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct TogglePath {
    level: String,
    tech: String,
    topic: String,
    item: String,
}

impl TogglePath {
    fn parse(raw: &str) -> Result<Self, ArgsError> {
        let parts: Vec<&str> = raw.split('/').collect();
        match parts.as_slice() {
            [level, tech, topic, item]
                if !level.is_empty() && !tech.is_empty() && !topic.is_empty() && !item.is_empty() =>
            {
                Ok(Self {
                    level: (*level).to_owned(),
                    tech: (*tech).to_owned(),
                    topic: (*topic).to_owned(),
                    item: (*item).to_owned(),
                })
            }
            _ => Err(ArgsError::InvalidTogglePath {
                raw: raw.to_owned(),
            }),
        }
    }
}

struct RoadmapArgs {
    roadmap: RoadmapId,
    catalog_path: PathBuf,
    toggles: Vec<TogglePath>,
}

impl RoadmapArgs {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut roadmap = None;
        let mut catalog_path = None;
        let mut toggles = Vec::new();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--roadmap" => {
                    let value = require_value(args, "--roadmap")?;
                    let parsed = value
                        .parse::<RoadmapId>()
                        .map_err(|_| ArgsError::InvalidRoadmap { raw: value })?;
                    roadmap = Some(parsed);
                }
                "--catalog" => {
                    let value = require_value(args, "--catalog")?;
                    catalog_path = Some(PathBuf::from(value));
                }
                "--toggle" => {
                    let value = require_value(args, "--toggle")?;
                    toggles.push(TogglePath::parse(&value)?);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            roadmap: roadmap.ok_or(ArgsError::MissingValue { flag: "--roadmap" })?,
            catalog_path: catalog_path.ok_or(ArgsError::MissingCatalog)?,
            toggles,
        })
    }
}

fn build_session() -> Arc<SessionContext> {
    match std::env::var("ROADMAP_API_TOKEN") {
        Ok(token) if !token.trim().is_empty() => {
            let username =
                std::env::var("ROADMAP_USERNAME").unwrap_or_else(|_| "local".to_owned());
            Arc::new(SessionContext::signed_in(Credentials::new(
                "local",
                username,
                AuthToken::new(token.trim()),
            )))
        }
        _ => Arc::new(SessionContext::new()),
    }
}

async fn run_dashboard(storage: &Storage, session: Arc<SessionContext>) -> Result<(), Box<dyn std::error::Error>> {
    let overview = OverviewService::new(Arc::clone(&storage.progress), session);
    let summary = match overview.dashboard().await {
        Ok(summary) => summary,
        Err(ProgressSyncError::AuthRequired) => {
            eprintln!("log in to see your progress (set ROADMAP_API_TOKEN)");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    if summary.roadmaps.is_empty() {
        println!("No roadmaps started yet.");
        return Ok(());
    }

    for entry in &summary.roadmaps {
        let title = entry.title.clone().unwrap_or_else(|| entry.roadmap.to_string());
        match entry.last_updated {
            Some(at) => println!("{title:<30} {:>3}%   updated {}", entry.percentage, at.to_rfc3339()),
            None => println!("{title:<30} {:>3}%", entry.percentage),
        }
    }
    let agg = summary.aggregate;
    println!(
        "\n{} roadmaps, {} completed, {} in progress, {}% average",
        agg.total_roadmaps, agg.completed_roadmaps, agg.in_progress_roadmaps, agg.average_completion
    );
    if let Some(top) = summary.top {
        println!(
            "Top roadmap: {} ({}%)",
            top.title.unwrap_or_else(|| top.roadmap.to_string()),
            top.percentage
        );
    }
    Ok(())
}

async fn run_roadmap(
    storage: &Storage,
    session: Arc<SessionContext>,
    args: RoadmapArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(&args.catalog_path)?;
    let catalog: RoadmapCatalog = serde_json::from_str(&raw)?;

    let view = RoadmapSession::new(
        Clock::default(),
        args.roadmap.clone(),
        catalog,
        Arc::clone(&storage.progress),
        session,
    );
    view.refresh().await?;

    for toggle in &args.toggles {
        match view.toggle_item(&toggle.level, &toggle.tech, &toggle.topic, &toggle.item) {
            Ok(done) => println!(
                "{}/{}/{}/{} -> {}",
                toggle.level,
                toggle.tech,
                toggle.topic,
                toggle.item,
                if done { "done" } else { "not done" }
            ),
            Err(ProgressSyncError::AuthRequired) => {
                eprintln!("log in to track progress (set ROADMAP_API_TOKEN)");
                break;
            }
            Err(err) => return Err(err.into()),
        }
    }

    // The process exits before any debounced save would fire; push now.
    if !args.toggles.is_empty() && view.sync_now().await.is_ok() {
        println!("synced: {:?}", view.status());
    }

    for level in view.catalog().levels() {
        for tech in &level.technologies {
            for topic in &tech.topics {
                let snapshot = view.topic_progress(&level.name, &tech.name, &topic.name);
                println!(
                    "{} / {} / {:<20} {:>3}%  ({}/{})",
                    level.name,
                    tech.name,
                    topic.name,
                    snapshot.percentage,
                    snapshot.completed,
                    snapshot.total
                );
            }
        }
    }
    let overall = view.overall_progress();
    println!(
        "\n{}: {}% ({}/{})",
        args.roadmap, overall.percentage, overall.completed, overall.total
    );
    view.close();
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None => Command::Dashboard,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Roadmap,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let config = ApiConfig::from_env().ok_or(ArgsError::MissingApiUrl)?;
    let storage = Storage::http(config);
    let session = build_session();

    let mut iter = argv.into_iter();
    match cmd {
        Command::Dashboard => {
            if let Some(arg) = iter.next() {
                return Err(ArgsError::UnknownArg(arg).into());
            }
            run_dashboard(&storage, session).await
        }
        Command::Roadmap => {
            let parsed = RoadmapArgs::parse(&mut iter).map_err(|e| {
                eprintln!("{e}");
                print_usage();
                e
            })?;
            run_roadmap(&storage, session, parsed).await
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
