use std::path::PathBuf;

use tender_alert::app::App;
use tender_alert::config::Config;
use tender_alert::error::{AppError, Result};
use tender_alert::models::{parse_price, SubscriberFilter, SubscriberId};

const USAGE: &str = "usage: tender-alert [--config <path>] [run | --once | --list | --subscribe <id> <kw1,kw2> [region] [max_price] | --unsubscribe <id>]";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();

    // Check for --config flag
    let config = match args.iter().position(|a| a == "--config") {
        Some(pos) => {
            let path = args
                .get(pos + 1)
                .map(PathBuf::from)
                .ok_or_else(|| AppError::Config(USAGE.to_string()))?;
            args.remove(pos + 1);
            args.remove(pos);
            Config::load_from(&path)?
        }
        None => Config::load()?,
    };

    let app = App::new(config).await?;

    match args.first().map(String::as_str) {
        None | Some("run") => {
            tokio::select! {
                result = app.run_forever() => result?,
                _ = tokio::signal::ctrl_c() => tracing::info!("interrupted, shutting down"),
            }
        }
        Some("--once") => {
            let report = app.run_once().await?;
            println!(
                "Fetched {}, new {}, notified {} of {} matches",
                report.fetched, report.new, report.delivered, report.matched
            );
        }
        Some("--list") => {
            for f in app.active_filters().await? {
                println!(
                    "{}\t{}\t{}\t{}",
                    f.subscriber_id,
                    f.keywords.join(","),
                    f.region.as_deref().unwrap_or("—"),
                    f.max_price.map(|p| p.to_string()).unwrap_or_else(|| "—".to_string()),
                );
            }
        }
        Some("--subscribe") => {
            let filter = parse_subscription(&args[1..])?;
            let id = filter.subscriber_id;
            app.subscribe(filter).await?;
            println!("Filter saved for {}", id);
        }
        Some("--unsubscribe") => {
            let id = parse_subscriber_id(args.get(1))?;
            app.unsubscribe(id).await?;
            println!("Filter removed for {}", id);
        }
        Some(_) => return Err(AppError::Config(USAGE.to_string())),
    }

    Ok(())
}

fn parse_subscriber_id(arg: Option<&String>) -> Result<SubscriberId> {
    arg.and_then(|s| s.parse().ok())
        .ok_or_else(|| AppError::Config(USAGE.to_string()))
}

fn parse_subscription(args: &[String]) -> Result<SubscriberFilter> {
    let id = parse_subscriber_id(args.first())?;
    let keywords = args
        .get(1)
        .map(|kw| kw.split(',').map(str::to_string).collect())
        .unwrap_or_default();

    let mut filter = SubscriberFilter::new(id, keywords);
    if let Some(region) = args.get(2) {
        filter = filter.with_region(region.as_str());
    }
    if let Some(price) = args.get(3) {
        let price = parse_price(price);
        if price > 0.0 {
            filter = filter.with_max_price(price);
        }
    }
    Ok(filter)
}
