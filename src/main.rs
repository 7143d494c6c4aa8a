//! Mouse Click Counter CLI
//!
//! Counts primary mouse button clicks per device.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use crossbeam_channel::RecvTimeoutError;
use mouse_click_counter::{
    autostart,
    config::Config,
    interceptor::SystemInterceptor,
    ledger::{RecordEdit, UsageRecord, UsageStore},
    DeviceIdentityResolver, InstanceError, InstanceGuard, Notice, ServiceOptions,
    TrackingService, ABOUT, VERSION,
};
use std::io::{BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mouse-click-counter")]
#[command(version = VERSION)]
#[command(about = "Counts primary mouse button clicks per device", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start counting clicks until Ctrl+C
    Start,

    /// Show the current device and every saved record
    Status,

    /// Edit the switch details of a saved record
    Set {
        /// Device identity, as shown by `status`
        device: String,

        /// Switch brand
        #[arg(long)]
        brand: Option<String>,

        /// Switch model
        #[arg(long)]
        model: Option<String>,

        /// Path to a picture of the switch
        #[arg(long)]
        image: Option<String>,
    },

    /// Zero the counters of a saved record
    Reset {
        /// Device identity, as shown by `status`
        device: String,

        /// Do not ask for confirmation
        #[arg(long, short)]
        yes: bool,
    },

    /// Display information about the counter
    About,

    /// Show configuration
    Config,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start => cmd_start(),
        Commands::Status => cmd_status(),
        Commands::Set {
            device,
            brand,
            model,
            image,
        } => cmd_set(RecordEdit {
            device_identity: device,
            switch_brand: brand,
            switch_model: model,
            image_path: image,
        }),
        Commands::Reset { device, yes } => cmd_reset(&device, yes),
        Commands::About => {
            println!("{ABOUT}");
            Ok(())
        }
        Commands::Config => cmd_config(),
    }
}

fn cmd_start() -> Result<()> {
    println!("Mouse Click Counter v{VERSION}");
    println!();

    let config = load_config();
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }
    let _guard = acquire_guard(&config)?;

    #[cfg(target_os = "macos")]
    if !mouse_click_counter::interceptor::check_permission() {
        eprintln!("Warning: Input Monitoring permission not granted.");
        eprintln!();
        eprintln!("To grant permission:");
        eprintln!("1. Open System Settings > Privacy & Security");
        eprintln!("2. Select 'Input Monitoring'");
        eprintln!("3. Add this application to the allowed list");
        eprintln!("4. Restart the application");
        eprintln!();
    }

    let store = Arc::new(UsageStore::new(&config.data_path, config.persist_every));
    let mut service = TrackingService::new(
        store,
        DeviceIdentityResolver::system(),
        SystemInterceptor::new(),
        ServiceOptions::from(&config),
    );

    if config.auto_start {
        if let Err(e) = autostart::register() {
            warn!("{e}");
            service.notify(Notice::AutoStartFailed(e.to_string()));
        }
    }

    service.start()?;

    println!("Data directory: {}", config.data_path.display());
    if let Some(identity) = service.current_identity() {
        println!("Device: {identity}");
        if let Some(record) = service.store().snapshot(&identity) {
            println!(
                "  Today: {}  Total: {}",
                record.daily_clicks, record.total_clicks
            );
        }
    }
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Error setting Ctrl+C handler")?;

    let notices = service.notices().clone();
    while running.load(Ordering::SeqCst) {
        match notices.recv_timeout(Duration::from_millis(250)) {
            Ok(notice) => print_notice(&notice),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    println!();
    println!("Stopping...");
    service.stop();
    for notice in notices.try_iter() {
        print_notice(&notice);
    }

    for record in service.records() {
        println!(
            "{}: {} today, {} total",
            record.device_identity, record.daily_clicks, record.total_clicks
        );
    }
    println!();
    println!("{}", service.stats().summary());
    Ok(())
}

fn cmd_status() -> Result<()> {
    let config = load_config();

    println!("Mouse Click Counter Status");
    println!("==========================");
    println!();

    let running = match InstanceGuard::acquire(&config.data_path) {
        Ok(_) => false,
        Err(InstanceError::AlreadyRunning(_)) => true,
        Err(e) => {
            warn!("{e}");
            false
        }
    };
    println!(
        "Service: {}",
        if running { "running" } else { "not running" }
    );
    println!(
        "Current device: {}",
        DeviceIdentityResolver::system().resolve()
    );
    println!("Data directory: {}", config.data_path.display());
    println!();

    let store = UsageStore::new(&config.data_path, config.persist_every);
    let records = store.stored_records()?;
    if records.is_empty() {
        println!("No saved records found.");
        println!("Run 'mouse-click-counter start' to begin counting.");
        return Ok(());
    }

    println!("Saved records:");
    for record in &records {
        print_record(record);
    }
    Ok(())
}

fn cmd_set(edit: RecordEdit) -> Result<()> {
    if edit.switch_brand.is_none() && edit.switch_model.is_none() && edit.image_path.is_none() {
        bail!("Nothing to change; pass --brand, --model or --image");
    }

    let config = load_config();
    let _guard = acquire_guard(&config)?;
    let store = open_record(&config, &edit.device_identity)?;

    if let Some((_, e)) = store.commit(std::slice::from_ref(&edit)).into_iter().next() {
        return Err(e).context("Could not save settings");
    }

    println!("Saved settings for '{}'", edit.device_identity);
    if let Some(record) = store.snapshot(&edit.device_identity) {
        print_record(&record);
    }
    Ok(())
}

fn cmd_reset(device: &str, yes: bool) -> Result<()> {
    let config = load_config();
    let _guard = acquire_guard(&config)?;
    let store = open_record(&config, device)?;

    if !yes && !confirm(&format!("Reset all counters for '{device}'?"))? {
        println!("Cancelled.");
        return Ok(());
    }

    let record = store.reset(device)?;
    store
        .persist(device)
        .context("Counters were reset but could not be saved")?;

    println!("Counters reset for '{device}'");
    print_record(&record);
    Ok(())
}

fn cmd_config() -> Result<()> {
    let config = load_config();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {}", Config::config_path().display());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn load_config() -> Config {
    Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config ({e}); using defaults");
        Config::default()
    })
}

/// Take the instance lock, exiting with status 1 if the counter is running.
fn acquire_guard(config: &Config) -> Result<InstanceGuard> {
    match InstanceGuard::acquire(&config.data_path) {
        Ok(guard) => Ok(guard),
        Err(e @ InstanceError::AlreadyRunning(_)) => {
            eprintln!("Error: {e}");
            eprintln!("Stop the running counter first.");
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}

/// Load `device` into a fresh store, failing if it has never been saved.
fn open_record(config: &Config, device: &str) -> Result<UsageStore> {
    let store = UsageStore::new(&config.data_path, config.persist_every);
    if !store.is_known(device) {
        bail!("No saved record for '{device}'. Run 'mouse-click-counter status' to list devices.");
    }
    let lookup = store.get_or_create(device);
    if let Some(e) = lookup.persist_error {
        warn!("{e}");
    }
    Ok(store)
}

fn confirm(question: &str) -> Result<bool> {
    print!("{question} [y/N] ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes" | "Yes"))
}

fn print_notice(notice: &Notice) {
    match notice {
        Notice::DeviceChanged { .. } => println!("{notice}"),
        _ => eprintln!("Warning: {notice}"),
    }
}

fn print_record(record: &UsageRecord) {
    println!("  {}", record.device_identity);
    println!("    Switch:  {} {}", record.switch_brand, record.switch_model);
    println!("    Today:   {}", record.daily_clicks);
    println!("    Total:   {}", record.total_clicks);
    if let Some(created_at) = record.created_at {
        println!("    Since:   {}", created_at.format("%Y-%m-%d %H:%M:%S"));
    }
    if !record.image_path.is_empty() {
        println!("    Image:   {}", record.image_path);
    }
}
