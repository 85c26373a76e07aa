//! mysql-drivers - Main entry point.
//!
//! Reports which MySQL drivers this build can load, which one would be used,
//! and whether it can reach a server.

use mysql_drivers::config::{Command, Config, OutputFormat};
use mysql_drivers::db::{
    DriverAdapter, DriverRegistry, classify_error, close_connection, default_probe,
};
use mysql_drivers::error::{DriverError, DriverResult};
use mysql_drivers::models::{ConnectParams, Params};
use serde_json::json;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn main() {
    let config = Config::parse_args();
    init_tracing(&config);

    if let Err(e) = run(&config) {
        report_error(&config, &e);
        std::process::exit(1);
    }
}

fn run(config: &Config) -> DriverResult<()> {
    let options = config.driver_options()?;
    let registry = DriverRegistry::detect(&default_probe(), &options)?;

    match &config.command {
        Command::List => list(config, &registry),
        Command::Preferred => preferred(config, &registry),
        Command::Check { url } => check(config, &registry, url),
    }
}

fn list(config: &Config, registry: &DriverRegistry) -> DriverResult<()> {
    let summaries = registry.summaries();
    match config.format {
        OutputFormat::Json => print_json(&json!({ "drivers": summaries })),
        OutputFormat::Text => {
            if summaries.is_empty() {
                println!("No MySQL drivers available");
            }
            for s in &summaries {
                let marker = if s.preferred { "*" } else { " " };
                println!("{marker} {} ({})", s.name, s.backend);
            }
        }
    }
    Ok(())
}

fn preferred(config: &Config, registry: &DriverRegistry) -> DriverResult<()> {
    let name = registry.preferred_name().ok_or_else(no_driver)?;
    match config.format {
        OutputFormat::Json => print_json(&json!({
            "preferred": name,
            "forced": registry.forced_name().is_some(),
        })),
        OutputFormat::Text => println!("{name}"),
    }
    Ok(())
}

fn check(config: &Config, registry: &DriverRegistry, url: &str) -> DriverResult<()> {
    let params = ConnectParams::from_url(url)?;
    let adapter = match &config.driver {
        Some(name) if !name.trim().is_empty() => registry.get(name.trim())?,
        _ => registry.preferred().ok_or_else(no_driver)?,
    };

    info!(driver = adapter.name(), url = %params.masked_url(), "Checking connection");
    let rows = select_one(adapter.as_ref(), &params)?;

    match config.format {
        OutputFormat::Json => print_json(&json!({
            "driver": adapter.name(),
            "server": params.masked_url(),
            "ok": true,
            "rows": rows,
        })),
        OutputFormat::Text => println!("{}: OK ({})", adapter.name(), params.masked_url()),
    }
    Ok(())
}

fn select_one(adapter: &dyn DriverAdapter, params: &ConnectParams) -> DriverResult<usize> {
    let fault = |e| classify_error(adapter, e);

    let mut conn = adapter.connect(params).map_err(fault)?;
    let rows = {
        let mut cursor = adapter.cursor(conn.as_mut()).map_err(fault)?;
        cursor.execute("SELECT 1", &Params::None).map_err(fault)?;
        let rows = cursor.fetch_all().map_err(fault)?;
        cursor.close().map_err(fault)?;
        rows.len()
    };

    close_connection(adapter, conn.as_mut())?;
    Ok(rows)
}

fn no_driver() -> DriverError {
    DriverError::configuration(
        "No MySQL driver is available",
        "Build with the 'sqlx' feature or register a client library",
    )
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("Error: {e}"),
    }
}

fn report_error(config: &Config, err: &DriverError) {
    match config.format {
        OutputFormat::Json => print_json(&json!({
            "ok": false,
            "fault": err.fault_kind(),
            "retryable": err.is_retryable(),
            "error": err.to_string(),
            "suggestion": err.suggestion(),
        })),
        OutputFormat::Text => {
            eprintln!("Error: {err}");
            if let Some(suggestion) = err.suggestion() {
                eprintln!("Hint: {suggestion}");
            }
        }
    }
}
