mod display;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use trackflow_core::{ClientConfig, ExpenseId, ExpensePayload};
use trackflow_store::FileStore;
use trackflow_sync::{
    Connectivity, ExpenseClient, HttpRateProvider, PlainText, RateCache, SyncEngine, scan_receipt,
};

#[derive(Parser)]
#[command(name = "trackflow", version)]
#[command(about = "Submit expenses, queueing them while offline and syncing later")]
struct Cli {
    /// Base URL of the expense API
    #[arg(long, global = true, env = "TRACKFLOW_API_URL")]
    api_url: Option<String>,

    /// Base URL of the exchange-rate provider
    #[arg(long, global = true, env = "TRACKFLOW_EXCHANGE_URL")]
    exchange_url: Option<String>,

    /// Bearer token for the expense API
    #[arg(long, global = true, env = "TRACKFLOW_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Directory holding the offline queue
    #[arg(long, global = true, env = "TRACKFLOW_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long, global = true, env = "TRACKFLOW_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Treat the network as unreachable
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit an expense, queueing it if it cannot be delivered now
    Submit {
        amount: f64,
        /// ISO 4217 code, e.g. USD
        currency: String,
        category: String,
        /// Expense date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(short, long)]
        description: Option<String>,
        /// Receipt file to attach; repeat for several
        #[arg(short, long = "receipt")]
        receipts: Vec<PathBuf>,
    },
    /// List expenses waiting to sync, oldest first
    Pending,
    /// Deliver every queued expense now
    Sync,
    /// Show connectivity and queue status
    Status,
    /// Drop one queued expense without sending it
    Discard { id: ExpenseId },
    /// Drop every queued expense
    Clear {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
    /// Convert an amount between currencies at current rates
    Convert {
        amount: f64,
        from: String,
        to: String,
        /// Base currency of the rate table to use
        #[arg(long, default_value = "USD")]
        base: String,
    },
    /// Guess expense fields from recognised receipt text
    Scan { file: PathBuf },
}

impl Cli {
    fn config(&self) -> ClientConfig {
        let mut config = ClientConfig::default();
        if let Some(url) = &self.api_url {
            config.api_base_url = url.clone();
        }
        if let Some(url) = &self.exchange_url {
            config.exchange_api_url = url.clone();
        }
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(secs) = self.timeout_secs {
            config.request_timeout = Duration::from_secs(secs);
        }
        config.auth_token = self.token.clone();
        config
    }
}

async fn open_engine(cli: &Cli, config: &ClientConfig) -> anyhow::Result<SyncEngine> {
    let dir = config.store_dir();
    let store = FileStore::open(&dir)
        .await
        .with_context(|| format!("opening offline queue at {}", dir.display()))?;
    let remote = ExpenseClient::new(config).context("building HTTP client")?;
    let engine = SyncEngine::new(
        Arc::new(store),
        Arc::new(remote),
        Connectivity::new(!cli.offline),
    )
    .await
    .context("reading offline queue")?;
    Ok(engine)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let config = cli.config();
    tracing::debug!(
        api = %config.api_base_url,
        offline = cli.offline,
        "trackflow v{}",
        env!("CARGO_PKG_VERSION")
    );

    match &cli.command {
        Commands::Submit {
            amount,
            currency,
            category,
            date,
            description,
            receipts,
        } => {
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let mut payload =
                ExpensePayload::new(*amount, currency.as_str(), category.as_str(), date);
            if let Some(description) = description {
                payload = payload.with_description(description.as_str());
            }
            for receipt in receipts {
                payload = payload.with_receipt(receipt);
            }

            let engine = open_engine(&cli, &config).await?;
            let submission = engine.submit(payload).await?;
            display::print_submission(&submission);
        }
        Commands::Pending => {
            let engine = open_engine(&cli, &config).await?;
            let records = engine.pending().await.context("listing offline queue")?;
            display::print_pending(&records);
        }
        Commands::Sync => {
            let engine = open_engine(&cli, &config).await?;
            let outcome = engine.drain().await;
            display::print_outcome(&outcome);
            display::print_state(&engine.state());
        }
        Commands::Status => {
            let engine = open_engine(&cli, &config).await?;
            display::print_state(&engine.state());
        }
        Commands::Discard { id } => {
            let engine = open_engine(&cli, &config).await?;
            engine
                .discard(*id)
                .await
                .with_context(|| format!("discarding {id}"))?;
            println!("Discarded {id}");
        }
        Commands::Clear { yes } => {
            if !yes {
                bail!("refusing to drop queued expenses without --yes");
            }
            let engine = open_engine(&cli, &config).await?;
            let dropped = engine.state().pending;
            engine.clear().await.context("clearing offline queue")?;
            println!("Dropped {dropped} queued expense(s)");
        }
        Commands::Convert {
            amount,
            from,
            to,
            base,
        } => {
            if cli.offline {
                bail!("exchange rates are not available offline");
            }
            let provider = HttpRateProvider::new(&config).context("building HTTP client")?;
            let cache = RateCache::new(Arc::new(provider), config.rates_ttl);
            let converted = cache.convert(base, *amount, from, to).await?;
            println!("{amount:.2} {from} = {converted:.2} {to}");
        }
        Commands::Scan { file } => {
            let bytes = tokio::fs::read(file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            let scan = scan_receipt(&PlainText, &bytes).await?;
            display::print_scan(&scan);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "trackflow",
            "--api-url",
            "https://expenses.example.com/api",
            "--timeout-secs",
            "3",
            "--offline",
            "pending",
        ])
        .unwrap();
        let config = cli.config();

        assert!(cli.offline);
        assert_eq!(config.api_base_url, "https://expenses.example.com/api");
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.store_namespace, ClientConfig::default().store_namespace);
    }

    #[test]
    fn submit_collects_receipts() {
        let cli = Cli::try_parse_from([
            "trackflow", "submit", "12.5", "USD", "Meals", "--date", "2025-03-14", "-r",
            "a.jpg", "-r", "b.jpg",
        ])
        .unwrap();
        match cli.command {
            Commands::Submit { date, receipts, .. } => {
                assert_eq!(date, NaiveDate::from_ymd_opt(2025, 3, 14));
                assert_eq!(receipts.len(), 2);
            }
            _ => panic!("expected submit"),
        }
    }

    #[test]
    fn discard_rejects_malformed_id() {
        assert!(Cli::try_parse_from(["trackflow", "discard", "not-a-uuid"]).is_err());
    }
}
