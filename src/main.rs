use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use feed_sniff::config::Config;
use feed_sniff::engine::DispatchAction;
use feed_sniff::probe::{probe_bytes, probe_url, ProbeReport};

/// Get the config directory path (~/.config/feed-sniff/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("feed-sniff"))
}

#[derive(Parser, Debug)]
#[command(
    name = "feed-sniff",
    about = "Decide whether a response is an RSS/Atom/RDF feed the way a browser would"
)]
struct Args {
    /// Config file (default: ~/.config/feed-sniff/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print the report as a single JSON line
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch a URL and sniff the live response
    Url {
        url: String,
    },
    /// Sniff a local file as if it had been served with the given Content-Type
    File {
        path: PathBuf,

        /// Content-Type header value to pretend the file was served with
        #[arg(long, default_value = "application/xml")]
        content_type: String,

        /// Size of the chunks the body is streamed in (default: from config)
        #[arg(long)]
        chunk_size: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => get_config_dir()?.join("config.toml"),
    };
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let report = match args.command {
        Command::Url { url } => {
            let mut builder = reqwest::Client::builder();
            if let Some(user_agent) = &config.user_agent {
                builder = builder.user_agent(user_agent);
            }
            let client = builder.build().context("Failed to build HTTP client")?;
            probe_url(&client, &url, &config.preview_path, config.request_timeout())
                .await
                .with_context(|| format!("Failed to probe {url}"))?
        }
        Command::File {
            path,
            content_type,
            chunk_size,
        } => {
            let body = std::fs::read(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            probe_bytes(
                &path.display().to_string(),
                &content_type,
                &body,
                chunk_size.unwrap_or(config.chunk_size),
                &config.preview_path,
            )
            .await
        }
    };

    if args.json {
        println!("{}", serde_json::to_string(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &ProbeReport) {
    println!("source:    {}", report.source);
    if let Some(status) = report.status {
        println!("status:    {status}");
    }
    println!("mime:      {}", report.mime.as_deref().unwrap_or("-"));
    println!("outcome:   {:?}", report.outcome);
    println!("delivered: {} bytes", report.delivered_bytes);
    for action in &report.actions {
        match action {
            DispatchAction::Cancel { request_id } => println!("action:    cancel #{request_id}"),
            DispatchAction::Navigate { request_id, url } => {
                println!("action:    navigate #{request_id} -> {url}")
            }
        }
    }
}
