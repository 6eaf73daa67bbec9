use clap::{Arg, Command};
use log::LevelFilter;
use repguard::batch::{BatchEvaluator, BatchRecord};
use repguard::config::Config;
use repguard::email_store::EmailStore;
use repguard::engine::ValidationEngine;
use repguard::ip_store::IpStore;
use repguard::metrics::MetricsCollector;
use repguard::refresh::RefreshCoordinator;
use std::process;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let matches = Command::new("repguard")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Email & IP reputation scoring service")
        .long_about(
            "Scores (email, IP) pairs for fraud/abuse risk by combining \
             disposable/role/typo email analysis with multi-source IP \
             blacklist membership. Reputation data is synced periodically \
             from remote sources with flat-file cache fallback.",
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("/etc/repguard.yaml"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("test-config")
                .long("test-config")
                .help("Test configuration validity")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("check")
                .long("check")
                .num_args(2)
                .value_names(["EMAIL", "IP"])
                .help("Evaluate one (email, IP) pair and print the finding as JSON"),
        )
        .arg(
            Arg::new("batch")
                .long("batch")
                .value_name("FILE")
                .help("Evaluate a JSON file of {email, ip} records and print the rows as JSON")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("sync")
                .long("sync")
                .help("Fetch fresh reputation data before a one-shot check (default: cache only)")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("status")
                .long("status")
                .help("Print loaded data counts and freshness as JSON")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        generate_default_config(generate_path);
        return;
    }

    let config_path = matches.get_one::<String>("config").unwrap();
    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            process::exit(1);
        }
    };

    if matches.get_flag("test-config") {
        println!(
            "Configuration OK: {} IP sources, sync every {}h, data dir {}",
            config.ip_sources.len(),
            config.sync_interval_hours,
            config.data_dir.display()
        );
        return;
    }

    let config = Arc::new(config);
    let email_store = Arc::new(EmailStore::new());
    let ip_store = Arc::new(IpStore::new());
    let (coordinator, refresh_handle) = RefreshCoordinator::new(
        Arc::clone(&config),
        Arc::clone(&email_store),
        Arc::clone(&ip_store),
    );

    // One-shot modes work from the cache unless --sync asks for a fetch
    let one_shot = matches.contains_id("check")
        || matches.get_one::<String>("batch").is_some()
        || matches.get_flag("status");

    if one_shot {
        coordinator.warm_start().await;
        if matches.get_flag("sync") {
            coordinator.refresh_all("manual").await;
        }

        let metrics = MetricsCollector::new(config.metrics_flush_seconds);
        let engine = Arc::new(
            ValidationEngine::new(email_store, ip_store).with_metrics(metrics.recorder()),
        );

        if let Some(mut values) = matches.get_many::<String>("check") {
            let email = values.next().expect("clap enforces two values");
            let ip = values.next().expect("clap enforces two values");
            check_pair(&engine, email, ip);
        } else if let Some(batch_file) = matches.get_one::<String>("batch") {
            run_batch_file(&config, &engine, batch_file);
        } else {
            print_json(&engine.status());
        }
        return;
    }

    log::info!("Starting repguard refresh daemon...");

    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal, exiting");
        process::exit(0);
    })
    .expect("Error setting signal handler");

    // The coordinator stops once every handle is dropped; keep ours for
    // the lifetime of the daemon.
    let _refresh_handle = refresh_handle;
    coordinator.run().await;
}

fn check_pair(engine: &ValidationEngine, email: &str, ip: &str) {
    match engine.evaluate(email, ip) {
        Ok(finding) => print_json(&finding),
        Err(e) => {
            eprintln!("Rejected: {e}");
            process::exit(1);
        }
    }
}

fn run_batch_file(config: &Config, engine: &Arc<ValidationEngine>, path: &str) {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading batch file '{path}': {e}");
            process::exit(1);
        }
    };

    let records: Vec<BatchRecord> = match serde_json::from_str(&content) {
        Ok(records) => records,
        Err(e) => {
            eprintln!("Invalid batch file '{path}': {e}");
            process::exit(1);
        }
    };

    let evaluator = BatchEvaluator::new(Arc::clone(engine), config.batch.clone());
    match evaluator.evaluate(&records) {
        Ok(rows) => print_json(&rows),
        Err(e) => {
            eprintln!("Batch rejected: {e}");
            process::exit(1);
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error serializing output: {e}");
            process::exit(1);
        }
    }
}

fn load_config(path: &str) -> anyhow::Result<Config> {
    if std::path::Path::new(path).exists() {
        Config::from_file(path)
    } else {
        log::warn!("Configuration file '{path}' not found, using default configuration");
        Ok(Config::default())
    }
}

fn generate_default_config(path: &str) {
    let config = Config::default();
    match config.to_file(path) {
        Ok(()) => {
            println!("Default configuration written to: {path}");
            println!("Please edit the configuration file to suit your needs.");
        }
        Err(e) => {
            eprintln!("Error writing configuration file: {e}");
            process::exit(1);
        }
    }
}
