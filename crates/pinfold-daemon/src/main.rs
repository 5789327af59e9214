//! pinfold — autonomous pinning agent for a smart-contract content-pinning
//! market.
//!
//! Startup sequence for `pinfold run`:
//!   1. Load settings (TOML file + environment overrides)
//!   2. Open the state store and restore the event cursor
//!   3. Wire the ledger poller, policy filter, storage executor, and
//!      claim submitter; start the audit scheduler if enabled
//!   4. Run the main loop: poll → dispatch → process approvals → persist

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;

use pinfold_api::{DataFacade, ModeController};
use pinfold_audit::AuditOrchestrator;
use pinfold_core::config::{Mode, PolicyParams};
use pinfold_core::constants::format_xlm;
use pinfold_core::types::abbrev;
use pinfold_daemon::{Daemon, PolicyFilter, Settings};
use pinfold_ipfs::{GatewayPinExecutor, NodeProbeVerifier, StorageNodeClient};
use pinfold_ledger::{
    AgentKeypair, ClaimTxSubmitter, ContractEventPoller, ContractQueries, FlagTxSubmitter,
    LedgerRpcClient, TxDriver,
};
use pinfold_store::StateStore;

#[derive(Parser, Debug)]
#[command(
    name = "pinfold",
    version,
    about = "Autonomous pinning agent for the pin-market contract"
)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the pinning daemon.
    Run,
    /// Show the effective configuration.
    Status,
    /// Query on-chain participant status, wallet balance, and contract fees.
    Info,
    /// Generate a fresh signing keypair.
    Keygen,
    /// Register as a pinner on the pin-market contract.
    Register {
        /// Storage node peer id (e.g. 12D3KooW...).
        #[arg(long)]
        node_id: String,
        /// Storage node multiaddress (e.g. /ip4/1.2.3.4/tcp/4001).
        #[arg(long)]
        multiaddr: String,
        /// Minimum offer price to accept, in stroops.
        #[arg(long, default_value_t = 100)]
        min_price: u64,
        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },
    /// Leave the pinner registry and reclaim the stake.
    Unregister {
        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },
    /// Update on-chain pinner settings.
    UpdateParticipant {
        #[arg(long)]
        node_id: Option<String>,
        #[arg(long)]
        multiaddr: Option<String>,
        #[arg(long)]
        min_price: Option<u64>,
        #[arg(long)]
        active: Option<bool>,
    },
    /// Print the full dashboard snapshot as JSON.
    Dashboard,
    /// Approve queued offers by slot id.
    Approve {
        #[arg(value_delimiter = ',')]
        slots: Vec<u64>,
    },
    /// Reject queued offers by slot id.
    Reject {
        #[arg(value_delimiter = ',')]
        slots: Vec<u64>,
    },
    /// Publish a pin request (publisher-side helper for testing).
    Publish {
        #[arg(long)]
        cid: String,
        #[arg(long, default_value = "")]
        filename: String,
        /// Gateway URL the content can be fetched from.
        #[arg(long)]
        gateway: String,
        /// Offer price per pin, in stroops.
        #[arg(long)]
        offer_price: u64,
        #[arg(long, default_value_t = 3)]
        pin_qty: u32,
    },
    /// Cancel a published pin request (publisher-side helper for testing).
    CancelPin { slot: u64 },
    /// Switch the operating mode (autonomous | operator_approved).
    SetMode { mode: String },
    /// Update runtime policy values.
    SetPolicy {
        #[arg(long)]
        min_price: Option<u64>,
        #[arg(long)]
        max_content_size: Option<u64>,
    },
    /// Audit subsystem inspection.
    Audit {
        #[command(subcommand)]
        command: AuditCommand,
    },
}

#[derive(Subcommand, Debug)]
enum AuditCommand {
    /// Audit summary and tracked pin counts.
    Status,
    /// List tracked (CID, claimant) pairs.
    Tracked {
        /// Filter by status (tracking, verified, suspect, flag_submitted,
        /// slot_freed).
        #[arg(long)]
        status: Option<String>,
    },
    /// List claimants suspected of not serving content.
    Suspects,
    /// Show dispute submission history.
    Flags,
    /// Show recent verification cycle reports.
    Cycles {
        #[arg(short = 'n', long, default_value_t = 5)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "debug"
    } else {
        "info,pinfold=debug"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.parse().unwrap()),
        )
        .init();

    let settings = Settings::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Command::Run => run(settings).await,
        Command::Status => status(&settings),
        Command::Info => info(&settings).await,
        Command::Keygen => keygen(),
        Command::Register {
            node_id,
            multiaddr,
            min_price,
            yes,
        } => register(&settings, &node_id, &multiaddr, min_price, yes).await,
        Command::Unregister { yes } => unregister(&settings, yes).await,
        Command::UpdateParticipant {
            node_id,
            multiaddr,
            min_price,
            active,
        } => update_participant(&settings, node_id, multiaddr, min_price, active).await,
        Command::Dashboard => dashboard(&settings).await,
        Command::Publish {
            cid,
            filename,
            gateway,
            offer_price,
            pin_qty,
        } => publish(&settings, &cid, &filename, &gateway, offer_price, pin_qty).await,
        Command::CancelPin { slot } => cancel_pin(&settings, slot).await,
        Command::Approve { slots } => approve(&settings, &slots, true),
        Command::Reject { slots } => approve(&settings, &slots, false),
        Command::SetMode { mode } => set_mode(&settings, &mode),
        Command::SetPolicy {
            min_price,
            max_content_size,
        } => set_policy(&settings, min_price, max_content_size),
        Command::Audit { command } => audit(&settings, command),
    }
}

// ── Wiring helpers ────────────────────────────────────────────────────────────

fn open_store(settings: &Settings) -> anyhow::Result<Arc<StateStore>> {
    let path = PathBuf::from(&settings.store.database_path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating data dir {}", parent.display()))?;
    }
    Ok(Arc::new(
        StateStore::open(&path).context("opening state store")?,
    ))
}

fn keypair(settings: &Settings) -> anyhow::Result<Arc<AgentKeypair>> {
    settings.require_secret()?;
    Ok(Arc::new(AgentKeypair::from_secret(&settings.ledger.secret)?))
}

fn tx_driver(settings: &Settings, keypair: Arc<AgentKeypair>) -> TxDriver {
    TxDriver::new(
        LedgerRpcClient::new(&settings.ledger.rpc_url),
        &settings.ledger.contract_id,
        &settings.ledger.network_passphrase,
        keypair,
    )
}

fn queries(settings: &Settings, address: &str) -> Arc<ContractQueries> {
    Arc::new(ContractQueries::new(
        LedgerRpcClient::new(&settings.ledger.rpc_url),
        &settings.ledger.contract_id,
        address,
    ))
}

/// Policy parameters seeded from the file config; the facade mutates and
/// persists them at runtime.
fn policy_params(settings: &Settings) -> Arc<PolicyParams> {
    Arc::new(PolicyParams::new(
        settings.policy.min_price,
        settings.ipfs.max_content_size,
    ))
}

fn confirm(prompt: &str) -> anyhow::Result<bool> {
    print!("{prompt} [y/N] ");
    use std::io::Write;
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    let answer = line.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

// ── Commands ─────────────────────────────────────────────────────────────────

async fn run(settings: Settings) -> anyhow::Result<()> {
    settings.require_secret()?;
    settings.require_contract()?;

    let keypair = keypair(&settings)?;
    let address = keypair.address().to_string();
    info!(mode = %settings.daemon.mode, address = %address, "pinfold starting");
    info!(contract = %settings.ledger.contract_id, rpc = %settings.ledger.rpc_url, "ledger");
    info!(node = %settings.ipfs.node_rpc_url, "storage node");

    let store = open_store(&settings)?;
    // Seed the persisted runtime config from the file on first start; later
    // starts resume the last-chosen mode and policy.
    if !store.has_runtime_config()? {
        store.set_runtime_config(
            Some(&settings.daemon.mode),
            Some(settings.policy.min_price),
            Some(settings.ipfs.max_content_size),
        )?;
    }

    let rpc = LedgerRpcClient::new(&settings.ledger.rpc_url);
    let poller = Box::new(ContractEventPoller::new(
        rpc.clone(),
        &settings.ledger.contract_id,
        settings.ledger.start_ledger,
    ));
    let queries = queries(&settings, &address);
    let params = policy_params(&settings);
    let filter = PolicyFilter::new(queries.clone(), &address, params.clone());

    let node = StorageNodeClient::new(&settings.ipfs.node_rpc_url);
    let executor = Arc::new(GatewayPinExecutor::new(
        node.clone(),
        Duration::from_secs(settings.ipfs.gateway_fetch_timeout),
        settings.ipfs.max_content_size,
        settings.ipfs.fetch_retries,
    ));

    let driver = tx_driver(&settings, keypair);
    let submitter = Arc::new(ClaimTxSubmitter::new(driver.clone()));
    let mode = Arc::new(ModeController::new(
        settings.daemon.mode.parse::<Mode>().context("[daemon] mode")?,
    ));

    let audit = if settings.audit.enabled {
        let verifier = Arc::new(NodeProbeVerifier::new(
            node.clone(),
            Duration::from_secs(settings.audit.check_timeout),
            settings.audit.verification_methods.clone(),
        ));
        let disputes = Arc::new(FlagTxSubmitter::new(driver.clone(), store.clone()));
        Some(Arc::new(AuditOrchestrator::new(
            store.clone(),
            queries.clone(),
            verifier,
            disputes,
            settings.audit.clone(),
            &address,
        )))
    } else {
        None
    };

    let (mut daemon, shutdown) = Daemon::new(
        store,
        poller,
        filter,
        executor,
        submitter,
        mode,
        audit,
        Duration::from_secs(settings.daemon.poll_interval),
        Duration::from_secs(settings.daemon.error_backoff),
    );

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            wait_for_stop_signal().await;
            info!("stop requested");
            shutdown.stop();
        }
    });

    daemon.run().await?;
    Ok(())
}

async fn wait_for_stop_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(_) => return tokio::signal::ctrl_c().await.unwrap_or(()),
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn status(settings: &Settings) -> anyhow::Result<()> {
    println!("Mode:        {}", settings.daemon.mode);
    println!("RPC URL:     {}", settings.ledger.rpc_url);
    println!(
        "Contract:    {}",
        if settings.ledger.contract_id.is_empty() {
            "(not set)"
        } else {
            &settings.ledger.contract_id
        }
    );
    println!("Node RPC:    {}", settings.ipfs.node_rpc_url);
    println!("Min price:   {} stroops", settings.policy.min_price);
    println!("DB path:     {}", settings.store.database_path);
    println!("Audit:       {}", if settings.audit.enabled { "enabled" } else { "disabled" });
    println!(
        "Secret:      {}",
        if settings.ledger.secret.is_empty() {
            "(not set)"
        } else {
            "***configured***"
        }
    );
    Ok(())
}

async fn info(settings: &Settings) -> anyhow::Result<()> {
    settings.require_secret()?;
    settings.require_contract()?;
    let keypair = keypair(settings)?;
    let address = keypair.address().to_string();
    let queries = queries(settings, &address);

    use pinfold_core::traits::LedgerReader;
    println!("Address:    {address}");

    let balance = queries.wallet_balance(&address).await;
    println!("Balance:    {balance} stroops ({})", format_xlm(balance));

    let join_fee = queries.join_fee().await;
    let stake = queries.stake_amount().await;
    if let Some(fee) = join_fee {
        println!("Join fee:   {fee} stroops ({})", format_xlm(fee));
    }
    if let Some(stake) = stake {
        println!("Stake:      {stake} stroops ({})", format_xlm(stake));
    }
    if let Some(fee) = queries.pin_fee().await {
        println!("Pin fee:    {fee} stroops ({})", format_xlm(fee));
    }
    if let Some(price) = queries.min_offer_price().await {
        println!("Min offer:  {price} stroops");
    }
    if let Some(qty) = queries.min_pin_qty().await {
        println!("Min qty:    {qty}");
    }
    if let Some(count) = queries.pinner_count().await {
        println!("Pinners:    {count}");
    }

    println!();
    match queries.participant(&address).await {
        None => {
            println!("Pinner:     NOT REGISTERED");
            println!("  Run 'pinfold register' to join.");
        }
        Some(p) => {
            println!("Pinner:     REGISTERED");
            println!("  Active:         {}", p.active);
            println!("  Node ID:        {}", p.node_id);
            println!("  Multiaddr:      {}", p.multiaddr);
            println!("  Min price:      {} stroops", p.min_price);
            println!("  Pins completed: {}", p.pins_completed);
            println!("  Flags:          {}", p.flags);
            println!("  Staked:         {} stroops ({})", p.staked, format_xlm(p.staked));
        }
    }
    Ok(())
}

fn keygen() -> anyhow::Result<()> {
    let keypair = AgentKeypair::generate();
    println!("Address: {}", keypair.address());
    println!("Secret:  {}", keypair.secret_hex());
    println!();
    println!("Store the secret in PINFOLD_SECRET or [ledger] secret.");
    Ok(())
}

async fn register(
    settings: &Settings,
    node_id: &str,
    multiaddr: &str,
    min_price: u64,
    yes: bool,
) -> anyhow::Result<()> {
    settings.require_secret()?;
    settings.require_contract()?;
    let keypair = keypair(settings)?;
    let address = keypair.address().to_string();
    let queries = queries(settings, &address);

    use pinfold_core::traits::LedgerReader;
    if let Some(existing) = queries.participant(&address).await {
        println!("Already registered (active={})", existing.active);
        println!("Use 'pinfold update-participant' to change settings.");
        return Ok(());
    }

    let join_fee = queries.join_fee().await.unwrap_or(0);
    let stake = queries.stake_amount().await.unwrap_or(0);
    let balance = queries.wallet_balance(&address).await;
    let total_cost = join_fee + stake;

    println!("Registering as pinner");
    println!("  Address:    {address}");
    println!("  Node ID:    {node_id}");
    println!("  Multiaddr:  {multiaddr}");
    println!("  Min price:  {min_price} stroops");
    println!("  Join fee:   {join_fee} stroops ({})", format_xlm(join_fee));
    println!("  Stake:      {stake} stroops ({})", format_xlm(stake));
    println!("  Total cost: {total_cost} stroops ({})", format_xlm(total_cost));
    println!("  Balance:    {balance} stroops ({})", format_xlm(balance));

    if balance < total_cost {
        bail!("insufficient balance: need {} more stroops", total_cost - balance);
    }
    if !yes && !confirm("\nProceed with registration?")? {
        return Ok(());
    }

    let driver = tx_driver(settings, keypair);
    let sent = driver
        .invoke(
            "join_as_pinner",
            vec![
                serde_json::json!(address),
                serde_json::json!(node_id),
                serde_json::json!(multiaddr),
                serde_json::json!(min_price),
            ],
        )
        .await
        .context("join_as_pinner")?;
    println!("Registration successful (tx {})", abbrev(&sent.hash, 16));
    Ok(())
}

async fn unregister(settings: &Settings, yes: bool) -> anyhow::Result<()> {
    settings.require_secret()?;
    settings.require_contract()?;
    let keypair = keypair(settings)?;
    let address = keypair.address().to_string();
    let queries = queries(settings, &address);

    use pinfold_core::traits::LedgerReader;
    let Some(participant) = queries.participant(&address).await else {
        println!("Not registered as a pinner.");
        return Ok(());
    };

    println!("Leaving pinner registry");
    println!("  Address:  {address}");
    println!("  Active:   {}", participant.active);
    println!(
        "  Staked:   {} stroops ({})",
        participant.staked,
        format_xlm(participant.staked)
    );
    if !participant.active {
        println!("  Warning: pinner is inactive; the stake may be forfeited.");
    }
    if !yes && !confirm("\nProceed with unregistration?")? {
        return Ok(());
    }

    let driver = tx_driver(settings, keypair);
    let sent = driver
        .invoke("leave_as_pinner", vec![serde_json::json!(address)])
        .await
        .context("leave_as_pinner")?;
    let refund = sent.result.as_u64().unwrap_or(0);
    println!(
        "Unregistration successful (tx {}), refunded {refund} stroops",
        abbrev(&sent.hash, 16)
    );
    Ok(())
}

async fn update_participant(
    settings: &Settings,
    node_id: Option<String>,
    multiaddr: Option<String>,
    min_price: Option<u64>,
    active: Option<bool>,
) -> anyhow::Result<()> {
    if node_id.is_none() && multiaddr.is_none() && min_price.is_none() && active.is_none() {
        bail!("nothing to update; specify at least one option");
    }
    settings.require_secret()?;
    settings.require_contract()?;
    let keypair = keypair(settings)?;
    let address = keypair.address().to_string();

    let driver = tx_driver(settings, keypair);
    let sent = driver
        .invoke(
            "update_pinner",
            vec![
                serde_json::json!(address),
                serde_json::json!(node_id),
                serde_json::json!(multiaddr),
                serde_json::json!(min_price),
                serde_json::json!(active),
            ],
        )
        .await
        .context("update_pinner")?;
    println!("Update successful (tx {})", abbrev(&sent.hash, 16));
    Ok(())
}

async fn publish(
    settings: &Settings,
    cid: &str,
    filename: &str,
    gateway: &str,
    offer_price: u64,
    pin_qty: u32,
) -> anyhow::Result<()> {
    settings.require_secret()?;
    settings.require_contract()?;
    let keypair = keypair(settings)?;
    let address = keypair.address().to_string();

    let driver = tx_driver(settings, keypair);
    let sent = driver
        .invoke(
            "create_pin",
            vec![
                serde_json::json!(address),
                serde_json::json!(cid),
                serde_json::json!(filename),
                serde_json::json!(gateway),
                serde_json::json!(offer_price),
                serde_json::json!(pin_qty),
            ],
        )
        .await
        .context("create_pin")?;
    let slot = sent.result.as_u64().unwrap_or(0);
    println!("Pin request published: slot {slot} (tx {})", abbrev(&sent.hash, 16));
    Ok(())
}

async fn cancel_pin(settings: &Settings, slot: u64) -> anyhow::Result<()> {
    settings.require_secret()?;
    settings.require_contract()?;
    let keypair = keypair(settings)?;
    let address = keypair.address().to_string();

    let driver = tx_driver(settings, keypair);
    let sent = driver
        .invoke(
            "cancel_pin",
            vec![serde_json::json!(address), serde_json::json!(slot)],
        )
        .await
        .context("cancel_pin")?;
    println!("Pin request cancelled (tx {})", abbrev(&sent.hash, 16));
    Ok(())
}

/// Build a facade over the local store for the offline inspection and action
/// commands. The daemon must not be running (the store is single-process).
fn offline_facade(settings: &Settings) -> anyhow::Result<(Arc<StateStore>, DataFacade)> {
    let keypair = keypair(settings)?;
    let address = keypair.address().to_string();
    let store = open_store(settings)?;
    let runtime = store.get_runtime_config()?;
    let mode = Arc::new(ModeController::new(
        runtime.mode.parse().unwrap_or(Mode::Autonomous),
    ));
    let params = Arc::new(PolicyParams::new(runtime.min_price, runtime.max_content_size));
    let facade = DataFacade::new(
        store.clone(),
        queries(settings, &address),
        mode,
        params,
        None,
        &address,
    );
    Ok((store, facade))
}

async fn dashboard(settings: &Settings) -> anyhow::Result<()> {
    let (_store, facade) = offline_facade(settings)?;
    let snapshot = facade.dashboard().await?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

fn approve(settings: &Settings, slots: &[u64], approve: bool) -> anyhow::Result<()> {
    if slots.is_empty() {
        bail!("no slot ids given");
    }
    let (_store, facade) = offline_facade(settings)?;
    let results = if approve {
        facade.approve_offers(slots)?
    } else {
        facade.reject_offers(slots)?
    };
    for result in results {
        println!("{} {}", if result.success { "ok " } else { "ERR" }, result.message);
    }
    Ok(())
}

fn set_mode(settings: &Settings, mode: &str) -> anyhow::Result<()> {
    let (_store, facade) = offline_facade(settings)?;
    let result = facade.set_mode(mode)?;
    if !result.success {
        bail!("{}", result.message);
    }
    println!("{}", result.message);
    Ok(())
}

fn set_policy(
    settings: &Settings,
    min_price: Option<u64>,
    max_content_size: Option<u64>,
) -> anyhow::Result<()> {
    let (_store, facade) = offline_facade(settings)?;
    let result = facade.update_policy(min_price, max_content_size)?;
    if !result.success {
        bail!("{}", result.message);
    }
    println!("{}", result.message);
    Ok(())
}

fn audit(settings: &Settings, command: AuditCommand) -> anyhow::Result<()> {
    use pinfold_core::audit::TrackingStatus;

    let store = open_store(settings)?;
    match command {
        AuditCommand::Status => {
            let pins = store.tracked_pins(None)?;
            let flags = store.flag_history()?;
            let cycles = store.cycle_history(1)?;
            let count = |status: TrackingStatus| pins.iter().filter(|p| p.status == status).count();
            let bounties: u64 = flags.iter().filter_map(|f| f.bounty_earned).sum();

            println!("Audit Status");
            println!("  Enabled:            {}", settings.audit.enabled);
            println!("  Cycle interval:     {}s", settings.audit.cycle_interval);
            println!("  Failure threshold:  {}", settings.audit.failure_threshold);
            println!();
            println!("Tracked Pins");
            println!("  Total:              {}", pins.len());
            println!("  Tracking:           {}", count(TrackingStatus::Tracking));
            println!("  Verified:           {}", count(TrackingStatus::Verified));
            println!("  Suspect:            {}", count(TrackingStatus::Suspect));
            println!("  Flagged:            {}", count(TrackingStatus::FlagSubmitted));
            println!();
            println!("Flags");
            println!("  Total submitted:    {}", flags.len());
            println!("  Bounties earned:    {bounties} stroops ({})", format_xlm(bounties));
            if let Some(cycle) = cycles.first() {
                println!();
                println!("Last Cycle");
                println!("  Checked:            {}", cycle.total_checked);
                println!("  Passed:             {}", cycle.passed);
                println!("  Failed:             {}", cycle.failed);
                println!("  Duration:           {}ms", cycle.duration_ms);
            }
        }
        AuditCommand::Tracked { status } => {
            let filter = match status.as_deref() {
                Some(s) => Some([parse_status(s)?]),
                None => None,
            };
            let pins = store.tracked_pins(filter.as_ref().map(|f| f.as_slice()))?;
            if pins.is_empty() {
                println!("No tracked pins.");
            }
            for p in pins {
                println!(
                    "  [{:15}] cid={}... claimant={}... checks={} failures={}",
                    p.status.to_string(),
                    abbrev(&p.cid, 24),
                    abbrev(&p.claimant, 12),
                    p.total_checks,
                    p.consecutive_failures
                );
            }
        }
        AuditCommand::Suspects => {
            let pins = store.tracked_pins(Some(&[TrackingStatus::Suspect]))?;
            if pins.is_empty() {
                println!("No suspects.");
            }
            for p in pins {
                println!(
                    "  cid={}... claimant={}... failures={}/{}",
                    abbrev(&p.cid, 24),
                    abbrev(&p.claimant, 12),
                    p.consecutive_failures,
                    settings.audit.failure_threshold
                );
            }
        }
        AuditCommand::Flags => {
            let flags = store.flag_history()?;
            if flags.is_empty() {
                println!("No flags submitted.");
            }
            for f in flags {
                println!(
                    "  claimant={}... flags_after={:?} bounty={} tx={}... at={}",
                    abbrev(&f.claimant, 12),
                    f.flag_count_after,
                    f.bounty_earned.unwrap_or(0),
                    abbrev(&f.tx_id, 16),
                    f.submitted_at
                );
            }
        }
        AuditCommand::Cycles { limit } => {
            let cycles = store.cycle_history(limit)?;
            if cycles.is_empty() {
                println!("No verification cycles recorded.");
            }
            for c in cycles {
                println!(
                    "  #{} checked={} passed={} failed={} flagged={} errors={} duration={}ms",
                    c.id, c.total_checked, c.passed, c.failed, c.flagged, c.errors, c.duration_ms
                );
            }
        }
    }
    Ok(())
}

fn parse_status(s: &str) -> anyhow::Result<pinfold_core::audit::TrackingStatus> {
    use pinfold_core::audit::TrackingStatus::*;
    Ok(match s {
        "tracking" => Tracking,
        "verified" => Verified,
        "suspect" => Suspect,
        "flag_submitted" => FlagSubmitted,
        "slot_freed" => SlotFreed,
        other => bail!("unknown status: {other}"),
    })
}
