//! Discogs Wantlist Monitor CLI
//!
//! Watches a Discogs wantlist and sends new marketplace listings to Telegram.

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use discoger_bot::api::{create_app, AppState};
use discoger_bot::bot::CommandBot;
use discoger_bot::services::Scheduler;
use discoger_bot::{Config, Database, DiscogsClient, Marketplace, Trigger};
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "discoger-bot")]
#[command(about = "Discogs wantlist monitor with Telegram notifications")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the monitor: scheduler, Telegram commands and keep-alive server
    Run,

    /// Run a single check now and print the result
    Check,

    /// Fetch and print the wantlist
    Wantlist {
        /// Maximum number of items to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show seen-listing statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("warn,discoger_bot={}", default_level))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", "Configuration error:".red().bold(), e);
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Run => run_bot(config).await?,
        Commands::Check => check_once(config).await?,
        Commands::Wantlist { limit } => show_wantlist(&config, limit).await?,
        Commands::Stats => show_stats(&config).await?,
    }

    Ok(())
}

async fn run_bot(config: Config) -> Result<()> {
    println!("\n{}", "=".repeat(70));
    println!("  {}", "DISCOGS WANTLIST MONITOR".bold());
    println!("  User: {} | Interval: {} minutes", config.discogs_username, config.check_interval_minutes);
    println!(
        "  Telegram chat: {}",
        match config.telegram_chat_id {
            Some(id) => id.to_string().green(),
            None => "waiting for first message".yellow(),
        }
    );
    println!("{}\n", "=".repeat(70));

    info!("Initializing application state...");
    let state = AppState::new(config.clone()).await?;

    let scheduler = Scheduler::new(
        state.checker.clone(),
        config.check_interval(),
        config.initial_check_delay(),
    );
    let scheduler_task = tokio::spawn(scheduler.run());

    let bot_task = tokio::spawn(CommandBot::new(state.clone()).run());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.keep_alive_port));
    let listener = TcpListener::bind(addr).await?;
    info!("Keep-alive server listening on {}", addr);
    let app = create_app(state);

    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(e) = result {
                error!("Keep-alive server stopped: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down...");
        }
    }

    scheduler_task.abort();
    bot_task.abort();

    Ok(())
}

async fn check_once(config: Config) -> Result<()> {
    let state = AppState::new(config).await?;

    println!("Checking wantlist...\n");
    let report = state.checker.check_now(Trigger::Manual).await?;

    println!("{}", "-".repeat(70));
    println!("  Items:          {} ({} checked, {} failed)", report.items_total, report.items_checked, report.items_failed);
    let new = format!("{}", report.new_listings);
    println!(
        "  New listings:   {}",
        if report.new_listings > 0 { new.green().bold() } else { new.normal() }
    );
    if report.delivery_failures > 0 {
        println!("  Not delivered:  {}", report.delivery_failures.to_string().yellow());
    }
    if report.storage_errors > 0 {
        println!("  Storage errors: {}", report.storage_errors.to_string().red());
    }
    println!("  Duration:       {:.1}s", report.duration_secs());
    println!("{}", "-".repeat(70));

    Ok(())
}

async fn show_wantlist(config: &Config, limit: usize) -> Result<()> {
    let client = DiscogsClient::new(config)?;

    println!("Fetching wantlist for {}...\n", config.discogs_username);
    let items = client.fetch_tracked_items().await?;

    println!("{}", "=".repeat(70));
    println!("  WANTLIST ({} items)", items.len());
    println!("{}\n", "=".repeat(70));

    for item in items.iter().take(limit) {
        println!(
            "  {} - {} ({})",
            item.artist.bold(),
            item.title,
            item.year_display()
        );
        println!("    {}", item.detail_url.dimmed());
    }

    if items.len() > limit {
        println!("\n  ... and {} more", items.len() - limit);
    }

    Ok(())
}

async fn show_stats(config: &Config) -> Result<()> {
    let db = Database::new(&config.database_path).await?;

    let per_item = db.count_seen_by_item().await?;
    let names: HashMap<String, String> = db
        .get_cached_items()
        .await?
        .into_iter()
        .map(|c| (c.item.id.clone(), format!("{} - {}", c.item.artist, c.item.title)))
        .collect();
    let total: i64 = per_item.iter().map(|(_, n)| n).sum();

    println!("\n{}", "=".repeat(70));
    println!("  MONITOR STATISTICS");
    println!("{}\n", "=".repeat(70));

    println!("  Seen listings:   {}", total);
    println!("  Cached releases: {}", names.len());

    if !per_item.is_empty() {
        println!("\nBy release:");
        for (item_id, count) in &per_item {
            let name = names.get(item_id).map(String::as_str).unwrap_or("(not cached)");
            println!("  {:>10}  {:>4}  {}", item_id, count, name);
        }
    }

    Ok(())
}
