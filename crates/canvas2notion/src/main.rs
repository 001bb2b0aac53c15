use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use canvas2notion::db::Store;
use canvas2notion::extract::{self, FetchConfig, MergeOutcome};
use canvas2notion::notify::{notify_all, StderrNotifier};
use canvas2notion::server::create_router;
use canvas2notion::types::AppState;
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::{info, Level};
use url::Url;

#[derive(Debug, Parser)]
#[command(name = "canvas2notion")]
#[command(about = "Extract Canvas assignments into a course-keyed store")]
struct Cli {
    /// Path to the storage database
    #[arg(long, env = "CANVAS2NOTION_DB", default_value = "canvas2notion.db")]
    db: PathBuf,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Extract assignments from an HTML file or page URL and save them
    Parse {
        /// HTML file path, or an http(s) URL to download
        source: String,
        /// Page URL used to resolve relative links (defaults to SOURCE when it is a URL)
        #[arg(long)]
        url: Option<String>,
        /// Cookie header sent when downloading SOURCE
        #[arg(long, env = "CANVAS2NOTION_COOKIE")]
        cookie: Option<String>,
    },
    /// Print saved assignments, optionally for a single course
    Show { course: Option<String> },
    /// Remove all saved assignments
    Clear,
    /// Read or change persisted options
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Serve saved assignments over HTTP
    Serve {
        #[arg(long, default_value = "127.0.0.1:3000")]
        address: SocketAddr,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Show every option with its effective value
    Get { key: Option<String> },
    /// Set an option; VALUE is stored as JSON when it parses, otherwise as a string
    Set { key: String, value: String },
    /// Remove an option so its default applies again
    Unset { key: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let store = Store::open(&cli.db).with_context(|| format!("opening {}", cli.db.display()))?;

    match cli.command {
        Commands::Parse {
            source,
            url,
            cookie,
        } => run_parse(&store, &source, url.as_deref(), cookie.as_deref()).await?,
        Commands::Show { course } => {
            let saved = store.load_assignments()?;
            let output = match course {
                Some(course) => match saved.assignments.get(&course) {
                    Some(records) => serde_json::to_string_pretty(records)?,
                    None => bail!("no saved assignments for {course}"),
                },
                None => serde_json::to_string_pretty(&saved.assignments)?,
            };
            println!("{output}");
        }
        Commands::Clear => {
            store.clear_saved_assignments()?;
            println!("cleared saved assignments");
        }
        Commands::Config { action } => run_config(&store, action)?,
        Commands::Serve { address } => {
            let router = create_router(Arc::new(AppState::new(store)));
            let listener = tokio::net::TcpListener::bind(address)
                .await
                .with_context(|| format!("binding {address}"))?;
            info!("Listening on http://{address}");
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = tokio::signal::ctrl_c().await;
                })
                .await?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_parse(
    store: &Store,
    source: &str,
    url: Option<&str>,
    cookie: Option<&str>,
) -> Result<()> {
    let source_url = Url::parse(source)
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https"));

    let html = match &source_url {
        Some(source_url) => extract::fetch_page(source_url, cookie, &FetchConfig::default()).await?,
        None => std::fs::read_to_string(source).with_context(|| format!("reading {source}"))?,
    };

    let page_url = match url {
        Some(url) => Some(Url::parse(url).with_context(|| format!("parsing page url {url}"))?),
        None => source_url,
    };

    let summary = extract::process_page(store, &html, page_url.as_ref(), Utc::now())?;
    notify_all(&summary.diagnostics, &mut StderrNotifier);

    match &summary.outcome {
        MergeOutcome::Saved { course, count } => {
            println!(
                "saved {count} of {} assignments for {course}",
                summary.fragments
            );
        }
        MergeOutcome::NoValidAssignments => {
            println!("no valid assignments among {} found", summary.fragments);
        }
        MergeOutcome::NoAssignmentsFound => println!("no assignments found"),
    }

    Ok(())
}

fn run_config(store: &Store, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let persisted = store.options()?;
            for (name, default) in extract::defaults() {
                if key.as_deref().is_some_and(|k| k != name) {
                    continue;
                }
                match persisted.get(name) {
                    Some(value) => println!("{name} = {value}"),
                    None => println!("{name} = {default} (default)"),
                }
            }
        }
        ConfigAction::Set { key, value } => {
            let value = serde_json::from_str(&value).unwrap_or(Value::String(value));
            store.set_option(&key, &value)?;
            println!("{key} = {value}");
        }
        ConfigAction::Unset { key } => {
            if store.remove_option(&key)? {
                println!("{key} restored to default");
            } else {
                println!("{key} was not set");
            }
        }
    }
    Ok(())
}
