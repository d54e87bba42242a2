use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use wealthline::analytics::{score_portfolio, PortfolioPosition};
use wealthline::clock::{Clock, SystemClock};
use wealthline::config::{default_config_path, ResolvedConfig};
use wealthline::jobs::BatchRunner;
use wealthline::market_data::providers::EodhdPriceFeed;
use wealthline::market_data::{JsonlPriceCacheStore, PriceFeedProvider, PriceService};
use wealthline::models::Id;
use wealthline::portfolio::{
    window_start, ChartPeriod, DailyCapture, HistoryAssembler, JsonlSnapshotStore, Reconstructor,
    SnapshotStore,
};
use wealthline::replay::ReplayOptions;
use wealthline::storage::{find_account, JsonFileBrokerData};
use wealthline::symbols::{openfigi::OpenFigiMapper, JsonMappingCacheStore, SymbolResolver};

#[derive(Parser)]
#[command(name = "wealthline")]
#[command(about = "Portfolio history reconstruction and analytics")]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the resolved configuration
    Config,
    /// Rebuild daily snapshots from holdings, transactions and prices
    Reconstruct {
        /// User id; repeat to run a batch
        #[arg(long = "user", required = true)]
        users: Vec<String>,
        /// Completed days to rebuild, ending yesterday
        #[arg(long, default_value_t = 30, conflicts_with = "since")]
        days: u32,
        /// Rebuild from this date instead (YYYY-MM-DD)
        #[arg(long)]
        since: Option<NaiveDate>,
    },
    /// Record today's end-of-day snapshot from live broker values
    Capture {
        #[arg(long)]
        user: String,
    },
    /// Chart series for a period
    History {
        #[arg(long)]
        user: String,
        /// 1D, 1W, 1M, 3M, 6M, YTD, 1Y, 5Y or MAX
        #[arg(long, default_value = "1M")]
        period: ChartPeriod,
        /// Account id or name
        #[arg(long)]
        account: Option<String>,
    },
    /// Risk and diversification scores for a JSON list of positions
    Scores {
        #[arg(long)]
        positions: PathBuf,
    },
}

/// Stores and adapters rooted at the data directory.
struct Stores {
    broker: Arc<JsonFileBrokerData>,
    snapshots: Arc<dyn SnapshotStore>,
}

impl Stores {
    fn open(data_dir: &Path) -> Self {
        Self {
            broker: Arc::new(JsonFileBrokerData::new(data_dir.join("broker"))),
            snapshots: Arc::new(JsonlSnapshotStore::new(data_dir)),
        }
    }
}

fn reconstructor(config: &ResolvedConfig, stores: &Stores, clock: Arc<dyn Clock>) -> Result<Reconstructor> {
    let providers = &config.providers;
    let mut eodhd = EodhdPriceFeed::new(providers.eodhd_api_key()?);
    if let Some(url) = &providers.eodhd_base_url {
        eodhd = eodhd.with_base_url(url);
    }
    let feed: Arc<dyn PriceFeedProvider> = Arc::new(eodhd);

    let mut figi = OpenFigiMapper::new(providers.openfigi_api_key());
    if let Some(url) = &providers.openfigi_base_url {
        figi = figi.with_base_url(url);
    }

    let retry = config.network.retry_policy();
    let resolver = SymbolResolver::new(
        Arc::new(JsonMappingCacheStore::new(&config.data_dir)),
        feed.clone(),
    )
    .with_identifier_provider(Arc::new(figi))
    .with_limits(config.limits)
    .with_retry(retry)
    .with_clock(clock.clone());

    let prices = PriceService::new(
        Arc::new(JsonlPriceCacheStore::new(&config.data_dir)),
        feed,
    )
    .with_limits(config.limits)
    .with_retry(retry)
    .with_lookback_days(config.history.price_lookback_days)
    .with_clock(clock.clone());

    let replay = ReplayOptions::default()
        .with_settlement_lag(config.history.settlement_lag_days)
        .with_same_day_order(config.history.same_day_order);

    Ok(Reconstructor::new(
        stores.broker.clone(),
        stores.broker.clone(),
        Arc::new(resolver),
        Arc::new(prices),
        stores.snapshots.clone(),
    )
    .with_replay_options(replay)
    .with_clock(clock))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true)
                .json(),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let config_path = cli.config.unwrap_or_else(default_config_path);
    let config = ResolvedConfig::load_or_default(&config_path)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let stores = Stores::open(&config.data_dir);

    match cli.command {
        Command::Config => {
            print_json(&serde_json::json!({
                "config_file": config_path,
                "data_dir": config.data_dir,
                "limits": config.limits,
                "network": config.network,
                "history": config.history,
                "providers": config.providers,
            }))?;
        }
        Command::Reconstruct { users, days, since } => {
            let users: Vec<Id> = users.into_iter().map(Id::from).collect();
            let reconstructor = reconstructor(&config, &stores, clock.clone())?;
            let capture = DailyCapture::new(stores.broker.clone(), stores.snapshots.clone())
                .with_clock(clock.clone());
            let runner = BatchRunner::new(Arc::new(reconstructor), Arc::new(capture))
                .with_max_concurrent_users(config.limits.max_concurrent_users)
                .with_clock(clock.clone());

            match (users.as_slice(), since) {
                ([user], since) => {
                    let since = since.unwrap_or_else(|| window_start(clock.yesterday(), days));
                    print_json(&runner.refresh_user(user, since).await?)?;
                }
                (_, Some(since)) => {
                    let mut reports = Vec::with_capacity(users.len());
                    for user in &users {
                        reports.push(runner.refresh_user(user, since).await?);
                    }
                    print_json(&reports)?;
                }
                (_, None) => print_json(&runner.reconstruct_all(&users, days).await)?,
            }
        }
        Command::Capture { user } => {
            let capture = DailyCapture::new(stores.broker.clone(), stores.snapshots.clone())
                .with_clock(clock);
            let outcome = capture.capture(&Id::from(user)).await?;
            let status = if outcome.is_ok() {
                "ok"
            } else if outcome.is_degraded() {
                "degraded"
            } else {
                "skipped"
            };
            print_json(&serde_json::json!({
                "status": status,
                "reason": outcome.reason(),
                "snapshot": outcome.value(),
            }))?;
        }
        Command::History {
            user,
            period,
            account,
        } => {
            let user = Id::from(user);
            let account = match account {
                Some(account) => Some(find_account(stores.broker.as_ref(), &user, &account).await?.id),
                None => None,
            };
            let assembler = HistoryAssembler::new(stores.snapshots.clone(), stores.broker.clone())
                .with_near_zero_threshold(config.history.near_zero_threshold)
                .with_clock(clock);
            let series = assembler.assemble(&user, period, account.as_ref()).await?;
            print_json(&series)?;
        }
        Command::Scores { positions } => {
            let content = std::fs::read_to_string(&positions)
                .with_context(|| format!("Failed to read positions file: {}", positions.display()))?;
            let positions: Vec<PortfolioPosition> = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse positions file: {}", positions.display()))?;
            print_json(&score_portfolio(&positions))?;
        }
    }

    Ok(())
}
