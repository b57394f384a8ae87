//! CLI entry point for imgview.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use imgview_core::config::ConfigStore;
use imgview_core::registry::{
    DEFAULT_COMPLETION_CAPACITY, JobOutcome, JobStatus, completion_channel,
};
use imgview_core::{DownloadConfig, HttpClient, ImageResource, UrlScraper};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

mod cli;

use cli::{Args, Command, ConfigAction, NavCommand};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // Stdout carries image paths; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let mut store = ConfigStore::load_or_create(&args.config)
        .with_context(|| format!("failed to load config {}", args.config.display()))?;
    let mut config = store.download_config();
    if let Some(retry) = args.retry {
        config = config.with_retry(retry);
    }

    match args.command {
        Command::Open { target } => run_open(&target, &config).await,
        Command::Scrape { url } => run_scrape(&url, &config).await,
        Command::Config { action } => match action {
            ConfigAction::Show => {
                print_config(&args.config, &config);
                Ok(())
            }
            ConfigAction::Set { key, value } => {
                let value = serde_json::from_str(&value).unwrap_or(Value::String(value));
                store
                    .set(&key, value)
                    .with_context(|| format!("failed to set {key}"))?;
                println!("{key} = {}", store.get(&key).unwrap_or(&Value::Null));
                Ok(())
            }
        },
    }
}

/// Opens `target` and runs the navigation loop until `q` or end of input.
///
/// After stdin closes, the loop keeps running until the image under the
/// cursor has resolved, so piped sessions still see their last download.
async fn run_open(target: &str, config: &DownloadConfig) -> Result<()> {
    let (notifier, mut events) = completion_channel(DEFAULT_COMPLETION_CAPACITY);
    let mut resource = imgview_core::open(target, config, Arc::new(notifier))
        .await
        .with_context(|| format!("cannot open {target}"))?;

    info!(resource = %target, images = resource.len(), "resource opened");
    if resource.is_empty() {
        println!("no images in {target}");
        return Ok(());
    }

    let mut waiting = show(resource.as_ref(), resource.current());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        if !stdin_open && waiting.is_none() {
            break;
        }

        tokio::select! {
            line = lines.next_line(), if stdin_open => {
                let Some(line) = line.context("failed to read stdin")? else {
                    debug!("stdin closed");
                    stdin_open = false;
                    continue;
                };
                let path = match NavCommand::parse(&line) {
                    Some(NavCommand::Next) => resource.next(),
                    Some(NavCommand::Prev) => resource.prev(),
                    Some(NavCommand::Current) => resource.current(),
                    Some(NavCommand::Quit) => break,
                    None => {
                        if !line.trim().is_empty() {
                            eprintln!("unknown command {:?}; use n, p, c or q", line.trim());
                        }
                        continue;
                    }
                };
                waiting = show(resource.as_ref(), path);
            }
            Some(event) = events.recv() => {
                let path = resource.on_completion(&event);
                if waiting.as_deref() != Some(event.url.as_str()) {
                    continue;
                }
                match (path, &event.outcome) {
                    (Some(path), _) => waiting = show(resource.as_ref(), Some(path)),
                    (None, JobOutcome::Failed(failure)) => {
                        println!(
                            "{} {} (failed after {} attempts)",
                            position(resource.as_ref()),
                            event.url,
                            failure.attempts
                        );
                        waiting = None;
                    }
                    (None, JobOutcome::Completed(_)) => {}
                }
            }
            else => break,
        }
    }

    Ok(())
}

/// Prints the item under the cursor; returns its id if it is still downloading.
fn show(resource: &dyn ImageResource, path: Option<PathBuf>) -> Option<String> {
    let position = position(resource);
    if let Some(path) = path {
        println!("{position} {}", path.display());
        return None;
    }
    let id = resource.current_id()?;
    if resource.current_status() == Some(JobStatus::Failed) {
        println!("{position} {id} (failed)");
        return None;
    }
    println!("{position} {id} (downloading)");
    Some(id)
}

fn position(resource: &dyn ImageResource) -> String {
    format!("[{}/{}]", resource.index() + 1, resource.len())
}

async fn run_scrape(url: &str, config: &DownloadConfig) -> Result<()> {
    let client = HttpClient::new(config.proxy.as_ref()).context("failed to build HTTP client")?;
    let urls = UrlScraper::default()
        .scrape_page(&client, url)
        .await
        .with_context(|| format!("failed to scrape {url}"))?;

    info!(url, images = urls.len(), "page scraped");
    for image in urls {
        println!("{image}");
    }
    Ok(())
}

fn print_config(path: &Path, config: &DownloadConfig) {
    println!("config: {}", path.display());
    println!("retry: {}", config.retry);
    println!("cache_dir: {}", config.cache_root.display());
    match &config.proxy {
        Some(proxy) => {
            println!("proxy.http: {}", proxy.http.as_deref().unwrap_or("-"));
            println!("proxy.https: {}", proxy.https.as_deref().unwrap_or("-"));
        }
        None => println!("proxy: disabled"),
    }
}
