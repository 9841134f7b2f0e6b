//! Chartfetch CLI
//!
//! Processes the queued client names against the records portal: logs in,
//! opens each client's profile, saves both consent forms as PDFs, and
//! records every outcome in the success/failure ledgers.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use chartfetch::portal::DEFAULT_PORTAL_URL;
use chartfetch::{run_batch, Config, PortalOptions, PortalSession, Roster};

#[derive(Parser, Debug)]
#[command(name = "chartfetch")]
#[command(about = "Fetch consent documents for queued clients from the records portal")]
struct Args {
    /// Credentials file (YAML, keyed by service)
    #[arg(long, default_value = "info.yml")]
    config: PathBuf,

    /// Service key inside the credentials file
    #[arg(long, default_value = "therapyappointment")]
    service: String,

    /// Queue of "First Last" names to process this run
    #[arg(long, default_value = "records.txt")]
    queue: PathBuf,

    /// Ledger of clients already processed successfully
    #[arg(long, default_value = "savedrecords.txt")]
    success_file: PathBuf,

    /// Ledger of clients that failed processing
    #[arg(long, default_value = "recordfailures.txt")]
    failure_file: PathBuf,

    /// Directory receiving the exported PDFs
    #[arg(long, default_value = "School Records Requests")]
    output_dir: PathBuf,

    /// Portal login URL
    #[arg(long, default_value = DEFAULT_PORTAL_URL)]
    portal_url: String,

    /// WebDriver endpoint (chromedriver)
    #[arg(long, env = "CHARTFETCH_WEBDRIVER_URL", default_value = "http://localhost:9515")]
    webdriver_url: String,

    /// Element wait timeout in seconds
    #[arg(long, default_value_t = 15)]
    timeout: u64,

    /// Run the browser headless
    #[arg(long)]
    headless: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Config problems are fatal before any file side effects.
    let config = Config::load(&args.config).context("failed to load credentials file")?;
    let credentials = config.credentials(&args.service)?.clone();

    let options = PortalOptions {
        portal_url: args.portal_url.clone(),
        webdriver_url: args.webdriver_url.clone(),
        headless: args.headless,
        wait_timeout: Duration::from_secs(args.timeout),
        output_dir: args.output_dir.clone(),
    };

    let roster = Roster::new(&args.queue, &args.success_file, &args.failure_file);

    let summary = run_batch(&roster, || async {
        let session = PortalSession::connect(&options).await?;
        if let Err(e) = session.login(&credentials).await {
            let _ = session.close().await;
            return Err(e);
        }
        Ok(session)
    })
    .await
    .context("run aborted")?;

    if summary.is_empty() {
        info!("no pending clients");
    } else {
        info!(
            succeeded = summary.succeeded.len(),
            failed = summary.failed.len(),
            "batch finished"
        );
        for name in &summary.failed {
            warn!(client = %name, "needs manual follow-up");
        }
    }

    Ok(())
}
