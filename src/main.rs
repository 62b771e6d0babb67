//! Command-line entry point: capture a page, or run the snapshot store.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use pagestash::store::upload_snapshot;
use pagestash::{CaptureConfig, CaptureEngine, DetachedPage, HttpFetcher, ResourceFetcher, StoreConfig};

#[derive(Parser)]
#[command(name = "pagestash", version, about = "Capture web pages as self-contained HTML snapshots")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Capture a page and upload it to a snapshot store (or write it to a file).
    Capture {
        /// URL of the page to capture.
        url: String,

        /// Time-to-live for the stored snapshot, e.g. "30m", "1h", "7d".
        /// Anything else means the snapshot never expires.
        #[arg(long, default_value = "never")]
        expires: String,

        /// Snapshot store to upload to.
        #[arg(long, env = "PAGESTASH_SERVER", default_value = "http://127.0.0.1:8098")]
        server: String,

        /// Write the captured document to a file instead of uploading it.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Run the snapshot store server.
    Serve {
        /// Address to bind.
        #[arg(long, default_value = "127.0.0.1:8098")]
        listen: String,

        /// Public base URL for links returned to upload clients.
        #[arg(long, env = "PAGESTASH_PUBLIC_URL")]
        public_url: Option<String>,

        /// Upload size ceiling in bytes.
        #[arg(long, default_value_t = 10 * 1024 * 1024)]
        max_upload_bytes: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    match Cli::parse().command {
        Command::Capture {
            url,
            expires,
            server,
            output,
        } => capture(url, expires, server, output).await,
        Command::Serve {
            listen,
            public_url,
            max_upload_bytes,
        } => {
            let mut config = StoreConfig::default()
                .with_listen_addr(listen)
                .with_max_upload_bytes(max_upload_bytes);
            if let Some(url) = public_url {
                config = config.with_public_url(url);
            }
            pagestash::store::run(config).await
        }
    }
}

async fn capture(url: String, expires: String, server: String, output: Option<PathBuf>) -> Result<()> {
    let config = CaptureConfig::default();
    let fetcher = HttpFetcher::new(&config);

    // The page itself is the one fetch that is fatal: without it there is
    // nothing to capture.
    let html = fetcher
        .fetch_text(&url, "")
        .await
        .context("page could not be fetched")?;

    let engine = CaptureEngine::new(fetcher, DetachedPage, config);
    let result = engine.capture(&html, &url).await;
    if !result.success {
        bail!(
            "capture failed: {}",
            result.error.as_deref().unwrap_or("unknown error")
        );
    }

    match output {
        Some(path) => {
            let document = result.html.as_deref().unwrap_or_default();
            std::fs::write(&path, document)
                .with_context(|| format!("could not write {}", path.display()))?;
            log::info!("wrote {} bytes to {}", document.len(), path.display());
        }
        None => {
            let response = upload_snapshot(&server, &result, Some(&expires), true).await?;
            println!("{}", response.url);
        }
    }

    Ok(())
}
