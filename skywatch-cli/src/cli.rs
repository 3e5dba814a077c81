use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use skywatch_core::{
    Alert, AlertFeed, Config, DEFAULT_REFRESH_INTERVAL, Location, NewsFeed, PlaceResolver,
    RefreshTask, ServiceId, WeatherPipeline, WeatherReport,
};
use tracing::debug;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "skywatch", version, about = "Multi-source weather client")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store an API key for a keyed service.
    Configure {
        /// Service short name, e.g. "geocoder" or "spaceweather".
        service: String,
    },

    /// Show weather and active alerts for a place.
    Show {
        /// Place name or coordinates, e.g. "16.4634, 80.5067" or "40.7°N, 74.0°W".
        place: String,

        /// Calendar date (YYYY-MM-DD) to resolve instead of "now".
        #[arg(long)]
        date: Option<String>,
    },

    /// List active hazard and space-weather alerts for a place.
    Alerts {
        /// Place name or coordinates.
        place: String,
    },

    /// Show weather-related headlines for a place.
    News {
        /// Place name or coordinates.
        place: String,
    },

    /// Suggest place candidates for a partial query.
    Suggest {
        /// Partially typed place name.
        query: String,
    },

    /// Keep refreshing weather and alerts until interrupted.
    Watch {
        /// Place name or coordinates.
        place: String,

        /// Refresh interval in seconds.
        #[arg(
            long,
            default_value_t = DEFAULT_REFRESH_INTERVAL.as_secs(),
            value_parser = clap::value_parser!(u64).range(1..)
        )]
        interval: u64,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure { service } => configure(&service),
            Command::Show { place, date } => show(&place, date.as_deref()).await,
            Command::Alerts { place } => alerts(&place).await,
            Command::News { place } => news(&place).await,
            Command::Suggest { query } => suggest(&query).await,
            Command::Watch { place, interval } => watch(&place, interval).await,
        }
    }
}

fn configure(service: &str) -> Result<()> {
    let service = ServiceId::try_from(service)?;
    let mut config = Config::load()?;

    let api_key = inquire::Text::new(&format!("API key for {service}:")).prompt()?;
    config.upsert_api_key(service, api_key.trim().to_string());
    config.save()?;

    println!(
        "Saved {service} key to {}",
        Config::config_file_path()?.display()
    );
    Ok(())
}

async fn show(place: &str, date: Option<&str>) -> Result<()> {
    let target_date = date.map(parse_date).transpose()?;
    let config = Config::load()?;
    let location = resolve_place(&PlaceResolver::new(&config), place).await?;

    let pipeline = WeatherPipeline::new();
    let alert_feed = AlertFeed::new(&config);
    let (report, alerts) = tokio::join!(
        pipeline.resolve(&location, target_date),
        alert_feed.fetch_alerts(&location),
    );
    let report = report?;

    print_report(&location, &report);
    print_alerts(&alerts);
    Ok(())
}

async fn alerts(place: &str) -> Result<()> {
    let config = Config::load()?;
    let location = resolve_place(&PlaceResolver::new(&config), place).await?;

    let alerts = AlertFeed::new(&config).fetch_alerts(&location).await;

    println!("Alerts for {}", location.label());
    if alerts.is_empty() {
        println!("  No active alerts");
        return Ok(());
    }
    for alert in &alerts {
        print_alert(alert);
    }
    Ok(())
}

async fn news(place: &str) -> Result<()> {
    let config = Config::load()?;
    let location = resolve_place(&PlaceResolver::new(&config), place).await?;

    let items = NewsFeed::new().fetch_news(&location).await;

    println!("Weather news for {}", location.label());
    if items.is_empty() {
        println!("  No recent headlines");
        return Ok(());
    }
    for item in &items {
        match &item.source {
            Some(source) => println!("  {} ({source})", item.title),
            None => println!("  {}", item.title),
        }
        println!("    {}", item.link);
    }
    Ok(())
}

async fn suggest(query: &str) -> Result<()> {
    let config = Config::load()?;
    let resolver = PlaceResolver::new(&config);

    let candidates = resolver.suggest(query).await;
    if candidates.is_empty() {
        println!("No suggestions for '{query}'");
        return Ok(());
    }
    for candidate in &candidates {
        println!(
            "  {}  ({:.4}, {:.4})",
            candidate.label(),
            candidate.latitude,
            candidate.longitude
        );
    }
    Ok(())
}

async fn watch(place: &str, interval_secs: u64) -> Result<()> {
    let config = Config::load()?;
    let location = resolve_place(&PlaceResolver::new(&config), place).await?;

    let pipeline = WeatherPipeline::new();
    let alert_feed = Arc::new(AlertFeed::new(&config));

    // First cycle right away, then on the timer until Ctrl-C.
    run_cycle(&pipeline, &alert_feed, &location).await;

    let task = {
        let pipeline = pipeline.clone();
        let alert_feed = Arc::clone(&alert_feed);
        let location = location.clone();
        RefreshTask::spawn(Duration::from_secs(interval_secs), move || {
            let pipeline = pipeline.clone();
            let alert_feed = Arc::clone(&alert_feed);
            let location = location.clone();
            async move {
                run_cycle(&pipeline, &alert_feed, &location).await;
            }
        })
    };

    println!("\nRefreshing every {interval_secs}s; press Ctrl-C to stop.");
    tokio::signal::ctrl_c().await?;
    task.cancel();
    println!("Stopped.");
    Ok(())
}

async fn run_cycle(pipeline: &WeatherPipeline, alert_feed: &AlertFeed, location: &Location) {
    debug!("refreshing weather for {}", location.label());
    let (report, alerts) = tokio::join!(
        pipeline.resolve(location, None),
        alert_feed.fetch_alerts(location),
    );
    match report {
        Ok(report) => {
            print_report(location, &report);
            print_alerts(&alerts);
        }
        Err(err) => eprintln!("{err:#}"),
    }
}

async fn resolve_place(resolver: &PlaceResolver, place: &str) -> Result<Location> {
    resolver
        .resolve(place)
        .await
        .ok_or_else(|| anyhow!("Place not found: '{place}'. Try a city name or coordinates."))
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| anyhow!("Invalid date '{raw}': expected YYYY-MM-DD"))
}

fn print_report(location: &Location, report: &WeatherReport) {
    println!("Weather for {}", location.label());
    println!(
        "  {}  {:.1} C  (source: {})",
        report.current.condition.description(),
        report.current.temperature_c,
        report.source
    );
    println!(
        "  humidity {:.0}%  wind {:.1} m/s  precipitation {:.1} mm",
        report.current.humidity_pct, report.current.wind_speed_mps, report.current.precipitation_mm
    );
    println!("  as of {}", report.current.timestamp.to_rfc3339());

    if !report.hourly.is_empty() {
        println!("\nHourly:");
        for point in &report.hourly {
            println!(
                "  {}  {:>6.1} C  {:<13}  {:.1} mm",
                point.hour,
                point.temperature_c,
                point.condition.description(),
                point.precipitation_mm
            );
        }
    }
}

fn print_alerts(alerts: &[Alert]) {
    if alerts.is_empty() {
        println!("\nNo active weather alerts");
        return;
    }
    println!("\nAlerts:");
    for alert in alerts {
        print_alert(alert);
    }
}

fn print_alert(alert: &Alert) {
    println!("  [{}] {} - {}", alert.severity, alert.event, alert.area);
    if let Some(onset) = &alert.onset {
        println!("    onset: {onset}");
    }
    if let Some(expires) = &alert.expires {
        println!("    expires: {expires}");
    }
    if !alert.instruction.is_empty() {
        println!("    {}", alert.instruction);
    }
}
