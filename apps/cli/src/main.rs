mod args;
mod config;
mod paths;
mod render;

use std::io;
use std::sync::Arc;

use chrono::Utc;
use ingest::ReportFileSource;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use tracker_app::{
    PollMessage, Poller, TrackerSession, resolve_pricing_table, write_pricing_table,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = args::CliArgs::parse_args();
    init_tracing(args.debug);

    let loaded = config::load_or_create(args.config.as_deref()).map_err(io::Error::other)?;
    if loaded.created {
        tracing::info!(path = %loaded.file.display(), "created default config");
    }
    let (report_path, pricing_path, tracker_config) = args.apply(loaded.config);
    let pricing = resolve_pricing_table(pricing_path.as_deref())?;

    if let Some(path) = &args.export_pricing {
        write_pricing_table(path, &pricing)?;
        println!("Wrote {} pricing rules to {}", pricing.rules().len(), path.display());
        return Ok(());
    }

    let Some(report_path) = report_path else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "no usage report given; pass --report or set `report` in the config file",
        )
        .into());
    };
    let tracker_config = tracker_config.validate()?;
    let tier = tracker_config.tier;
    let interval = tracker_config.interval_secs;
    let session = Arc::new(TrackerSession::new(tracker_config, pricing));
    tracing::info!(
        report = %report_path.display(),
        tier = %tier,
        rules = session.pricing().rules().len(),
        "usage tracker starting"
    );
    let mut source = ReportFileSource::new(report_path);

    if args.once {
        return match session.run_once(&mut source, Utc::now()) {
            Ok(report) => {
                println!("{}", render::render_report(&report, tier));
                Ok(())
            }
            Err(err) => {
                println!("{}", render::render_failure(&err.to_string(), Utc::now()));
                Err(err.into())
            }
        };
    }

    println!(
        "Tracking usage from {} (refresh {}s) on tier {}.",
        source.path().display(),
        interval,
        tier
    );
    println!("Press Ctrl+C to exit.\n");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut rx = Poller::new(session, source).start(shutdown_rx);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            message = rx.recv() => match message {
                Some(PollMessage::Cycle(report)) => {
                    println!("{}\n", render::render_report(&report, tier));
                }
                Some(PollMessage::CycleFailed { message, at }) => {
                    println!("{}\n", render::render_failure(&message, at));
                }
                None => break,
            },
            _ = &mut ctrl_c => {
                let _ = shutdown_tx.send(true);
                println!("\nStopping tracker.");
                break;
            }
        }
    }

    Ok(())
}

fn init_tracing(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "usage_tracker={level},tracker_app={level},ingest={level}"
        ))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .init();
}
