use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use location_core::{
    AndroidDetail, AndroidPermissionOptions, ConfigureOptions, DesiredAccuracy, EventEmitter,
    Geolocation, GetLatestLocationOptions, IosAccuracy, IosPermission, Location, NativeBridge,
    PermissionStatus, PlatformPermissions, Rationale, RequestPermissionOptions,
};
use location_demo::{SimSettings, SimulatedNative, prelude::*};
use log::{info, warn};
use serde::Serialize;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Platform {
    Ios,
    Android,
}

#[derive(Debug, Parser)]
#[command(about = "Drive the location core against a simulated device")]
struct Cli {
    /// Which platform's permission model to use
    #[arg(long, value_enum, default_value_t = Platform::Ios)]
    platform: Platform,
    /// Milliseconds between simulated sensor readings
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,
    /// Seed for the simulated walk
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Decline the permission prompt
    #[arg(long)]
    deny: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print location updates as they arrive
    Watch {
        #[arg(long, default_value_t = 5)]
        count: usize,
        /// Only report significant changes
        #[arg(long)]
        significant: bool,
    },
    /// Print the next location once
    Latest {
        /// Give up after this many milliseconds, 0 waits forever
        #[arg(long, default_value_t = 10000)]
        timeout_ms: u64,
    },
    /// Print heading updates as they arrive
    Heading {
        #[arg(long, default_value_t = 5)]
        count: usize,
    },
    /// Request permission and print the resulting status
    Permission,
}

fn print_json(value: &impl Serialize) -> Result {
    let json = serde_json::to_string(value).context("Failed to serialize update")?;
    println!("{json}");
    Ok(())
}

fn permission_request() -> RequestPermissionOptions {
    RequestPermissionOptions {
        ios: Some(IosPermission::WhenInUse),
        android: Some(AndroidPermissionOptions {
            detail: AndroidDetail::Fine,
            rationale: Some(Rationale {
                title: "We need to access your location".to_string(),
                message: "We use your location to show where you are on the map".to_string(),
                button_positive: "OK".to_string(),
                button_negative: Some("Cancel".to_string()),
                button_neutral: None,
            }),
        }),
    }
}

async fn run<P: PlatformPermissions>(
    geo: Geolocation<SimulatedNative, P>,
    command: Command,
) -> Result {
    let warnings = geo.subscribe_to_warnings(|w| warn!("Native warning {}: {}", w.kind, w.message));
    let status_updates = geo.subscribe_to_permission_updates(|status| {
        info!("Permission status changed to {status:?}");
    });

    geo.configure(ConfigureOptions {
        distance_filter: Some(5.0),
        desired_accuracy: Some(DesiredAccuracy {
            ios: Some(IosAccuracy::Best),
            android: None,
        }),
        ..Default::default()
    })
    .await?;

    let granted = geo.request_permission(&permission_request()).await?;
    if !granted && !matches!(command, Command::Permission) {
        bail!("Location permission was not granted");
    }

    match command {
        Command::Permission => {
            let status: PermissionStatus = geo.get_current_permission().await?;
            print_json(&status)?;
        }
        Command::Latest { timeout_ms } => {
            let timeout = (timeout_ms != 0).then(|| Duration::from_millis(timeout_ms));
            match geo
                .get_latest_location(GetLatestLocationOptions { timeout })
                .await?
            {
                Some(location) => print_json(&location)?,
                None => warn!("No location arrived in time"),
            }
        }
        Command::Watch { count, significant } => {
            let (tx, mut rx) = mpsc::unbounded_channel();
            let listener = move |locations: &[Location]| {
                tx.send(locations.to_vec()).ok();
            };
            let subscription = if significant {
                geo.subscribe_to_significant_location_updates(listener)
                    .await?
            } else {
                geo.subscribe_to_location_updates(listener).await?
            };

            for _ in 0..count {
                tokio::select! {
                    batch = rx.recv() => match batch {
                        Some(batch) => print_json(&batch)?,
                        None => break,
                    },
                    _ = tokio::signal::ctrl_c() => break,
                }
            }

            subscription.unsubscribe().await?;
        }
        Command::Heading { count } => {
            let (tx, mut rx) = mpsc::unbounded_channel();
            let subscription = geo
                .subscribe_to_heading_updates(move |heading| {
                    tx.send(*heading).ok();
                })
                .await?;

            for _ in 0..count {
                tokio::select! {
                    heading = rx.recv() => match heading {
                        Some(heading) => print_json(&heading)?,
                        None => break,
                    },
                    _ = tokio::signal::ctrl_c() => break,
                }
            }

            subscription.unsubscribe().await?;
        }
    }

    status_updates.unsubscribe().await?;
    warnings.unsubscribe().await?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result {
    colog::init();

    let cli = Cli::parse();

    let events = EventEmitter::new();
    let native = SimulatedNative::new(
        SimSettings {
            interval: Duration::from_millis(cli.interval_ms.max(1)),
            seed: cli.seed,
            accept_prompts: !cli.deny,
            ..Default::default()
        },
        events.clone(),
    );
    let bridge = NativeBridge::resolve(Some(native.clone()), events);

    match cli.platform {
        Platform::Ios => run(Geolocation::ios(bridge), cli.command).await,
        Platform::Android => run(Geolocation::android(bridge, native), cli.command).await,
    }
}
