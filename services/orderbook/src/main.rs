//! Book engine CLI
//!
//! Each invocation loads the book from a snapshot file, applies one
//! command and writes the snapshot back. Emitted events can also be
//! appended to a journal so the book can be rebuilt with `replay`.

use anyhow::{Context, Result, bail};
use book_common::{AccountId, Amount, EngineConfig, OrderId, WEI_PER_ETHER};
use clap::{Parser, Subcommand};
use orderbook_engine::{
    core::{OrderBook, Side},
    journal::Journal,
    replay::ReplayEngine,
    snapshot::{load_snapshot, save_snapshot},
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Sorted bid/ask book
#[derive(Parser)]
#[command(name = "orderbook-engine")]
#[command(about = "Sorted bid/ask book with fee deduction, journaling and replay")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Engine configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Snapshot file holding the book between invocations
    #[arg(long, global = true, default_value = "book.snapshot")]
    state: PathBuf,

    /// Append emitted events to this journal
    #[arg(long, global = true)]
    journal: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Place a bid
    PlaceBid {
        /// Deposit in wei, or whole/decimal ether with an `eth` suffix
        amount: String,
        /// Placing account
        #[arg(long, default_value = "anonymous")]
        owner: String,
    },
    /// Place an ask
    PlaceAsk {
        /// Deposit in wei, or whole/decimal ether with an `eth` suffix
        amount: String,
        /// Placing account
        #[arg(long, default_value = "anonymous")]
        owner: String,
    },
    /// Cancel a bid by placement id
    CancelBid {
        /// Placement id
        id: u64,
    },
    /// Cancel an ask by placement id
    CancelAsk {
        /// Placement id
        id: u64,
    },
    /// Net value held by an order
    Value {
        /// bid or ask
        side: Side,
        /// Placement id
        id: u64,
    },
    /// Ids on a side in rank order
    Fetch {
        /// bid or ask
        side: Side,
    },
    /// Rebuild the book from a journal and save it as the state
    Replay {
        /// Journal file to replay
        input: PathBuf,
    },
    /// Run the reference placement/cancellation scenarios in memory
    Demo,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "orderbook_engine=info".into()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = EngineConfig::load(cli.config.as_deref()).context("loading engine configuration")?;
    let config = retain_for_journal(config, cli.journal.as_deref());

    match cli.command {
        Commands::Demo => run_demo(&config),
        Commands::Replay { input } => {
            let events = Journal::read_all(&input)
                .with_context(|| format!("reading journal {}", input.display()))?;
            let mut engine = ReplayEngine::new(&config)?;
            engine.apply_all(&events)?;
            let stats = engine.stats().clone();
            let book = engine.into_book();
            save_snapshot(&cli.state, &book.snapshot())?;
            println!(
                "replayed {} events ({} placements, {} cancellations)",
                stats.events_applied, stats.placements, stats.cancellations
            );
            println!("bids:{}", book.fetch_bid());
            println!("asks:{}", book.fetch_ask());
            Ok(())
        }
        command => {
            let book = open_book(&cli.state, &config)?;
            let mutated = execute(&book, command)?;
            if mutated {
                persist(&book, &cli.state, cli.journal.as_deref())?;
            }
            Ok(())
        }
    }
}

/// Load the book from `state`, or start empty
fn open_book(state: &Path, config: &EngineConfig) -> Result<OrderBook> {
    if !state.exists() {
        info!("No state at {}, starting an empty book", state.display());
        return Ok(OrderBook::from_config(config)?);
    }

    let snapshot = load_snapshot(state).with_context(|| format!("loading state {}", state.display()))?;
    if snapshot.fee_bps != config.fee_bps {
        warn!(
            "State was built with a {} bps fee; keeping it over the configured {} bps",
            snapshot.fee_bps, config.fee_bps
        );
    }
    Ok(OrderBook::from_snapshot_with_config(snapshot, config)?)
}

/// Run a single book command, returning whether the book changed
fn execute(book: &OrderBook, command: Commands) -> Result<bool> {
    match command {
        Commands::PlaceBid { amount, owner } => {
            let id = book.place_bid(AccountId::new(owner), parse_amount(&amount)?)?;
            println!("{id}");
            Ok(true)
        }
        Commands::PlaceAsk { amount, owner } => {
            let id = book.place_ask(AccountId::new(owner), parse_amount(&amount)?)?;
            println!("{id}");
            Ok(true)
        }
        Commands::CancelBid { id } => {
            let order = book.cancel_bid(OrderId(id))?;
            println!("cancelled bid {} ({} wei)", order.id, order.net_amount);
            Ok(true)
        }
        Commands::CancelAsk { id } => {
            let order = book.cancel_ask(OrderId(id))?;
            println!("cancelled ask {} ({} wei)", order.id, order.net_amount);
            Ok(true)
        }
        Commands::Value { side, id } => {
            println!("{}", book.get_value(side, OrderId(id))?);
            Ok(false)
        }
        Commands::Fetch { side } => {
            println!("'{}'", book.fetch(side));
            Ok(false)
        }
        Commands::Replay { .. } | Commands::Demo => bail!("replay and demo do not run against saved state"),
    }
}

/// Keep every event in memory when they must reach an on-disk journal
fn retain_for_journal(config: EngineConfig, journal: Option<&Path>) -> EngineConfig {
    let Some(path) = journal else {
        return config;
    };
    if !config.journal_events || config.max_journal_events != 0 {
        warn!(
            "Journaling to {} requires retaining every event; overriding journal settings",
            path.display()
        );
    }
    EngineConfig {
        journal_events: true,
        max_journal_events: 0,
        ..config
    }
}

/// Save the snapshot and journal any new events
fn persist(book: &OrderBook, state: &Path, journal: Option<&Path>) -> Result<()> {
    let events = book.drain_events();
    if let Some(path) = journal {
        let mut journal = Journal::open(path)?;
        journal.append_all(&events)?;
        journal.flush()?;
    }
    save_snapshot(state, &book.snapshot())?;
    Ok(())
}

/// Parse `1000` (wei), `5eth` or `0.25ether`
fn parse_amount(raw: &str) -> Result<Amount> {
    let raw = raw.trim();
    let ether = raw
        .strip_suffix("ether")
        .or_else(|| raw.strip_suffix("eth"))
        .map(str::trim);

    let Some(ether) = ether else {
        let wei: u128 = raw.parse().with_context(|| format!("invalid wei amount '{raw}'"))?;
        return Ok(Amount::from_wei(wei));
    };

    let (whole, fraction) = ether.split_once('.').unwrap_or((ether, ""));
    if fraction.len() > 18 || !fraction.chars().all(|c| c.is_ascii_digit()) {
        bail!("invalid ether amount '{raw}'");
    }
    let whole: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().with_context(|| format!("invalid ether amount '{raw}'"))?
    };
    let fraction_wei: u128 = if fraction.is_empty() {
        0
    } else {
        format!("{fraction:0<18}").parse()?
    };

    whole
        .checked_mul(WEI_PER_ETHER)
        .and_then(|wei| wei.checked_add(fraction_wei))
        .map(Amount::from_wei)
        .with_context(|| format!("ether amount '{raw}' overflows"))
}

/// Reference scenarios: three bids and three asks of 1, 5 and 4 ether
fn run_demo(config: &EngineConfig) -> Result<()> {
    let book = OrderBook::from_config(config)?;

    for ether in [1, 5, 4] {
        book.place_bid("person1", Amount::from_ether(ether))?;
    }
    println!("bid 1 value: {}", book.get_bid_value(OrderId(1))?);
    println!("fetchBid: '{}'", book.fetch_bid());
    book.cancel_bid(OrderId(3))?;
    println!("after cancelBid(3): '{}'", book.fetch_bid());

    for ether in [1, 5, 4] {
        book.place_ask("person2", Amount::from_ether(ether))?;
    }
    println!("ask 1 value: {}", book.get_ask_value(OrderId(1))?);
    println!("fetchAsk: '{}'", book.fetch_ask());
    book.cancel_ask(OrderId(3))?;
    println!("after cancelAsk(3): '{}'", book.fetch_ask());

    let metrics = book.metrics().snapshot();
    info!(
        "{} placements, {} cancellations, {} wei in fees",
        metrics.total_placed(),
        metrics.total_cancelled(),
        metrics.fees_retained
    );
    Ok(())
}
