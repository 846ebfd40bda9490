mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, ConsoleCommand, CONSOLE_HELP};
use routesim::playback::{PlaybackEvent, PlaybackSession, PlaybackSnapshot};
use routesim::provider::{
    CoordinateGeocoder, DataProvider, FileDataProvider, JsonSettingsStore, MemoryStore,
    MockDataProvider, SettingsStore,
};
use routesim::selector::RouteSelector;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = cli.sim_config();
    config.validate().context("Invalid playback configuration")?;

    let provider: Arc<dyn DataProvider> = if cli.demo {
        Arc::new(MockDataProvider::demo())
    } else {
        if !cli.data_dir.is_dir() {
            anyhow::bail!("Route directory {:?} does not exist (use --demo for built-in routes)", cli.data_dir);
        }
        let provider = FileDataProvider::new(cli.data_dir.clone());
        info!(root = ?provider.root(), "Reading routes from disk");
        Arc::new(provider)
    };

    let store: Arc<dyn SettingsStore> = match cli.settings.clone().or_else(JsonSettingsStore::default_path) {
        Some(path) => {
            let store = JsonSettingsStore::open(path);
            info!(path = ?store.path(), "Using settings file");
            Arc::new(store)
        }
        None => {
            warn!("No config directory available, selected route will not be remembered");
            Arc::new(MemoryStore::new())
        }
    };

    let session = Arc::new(PlaybackSession::spawn(&config, Arc::new(CoordinateGeocoder)));
    let selector = RouteSelector::new(provider, store, session.clone());

    let initial = match &cli.route {
        Some(name) => selector.select_route(name).await,
        None => selector.restore().await,
    };
    let snapshot = initial.context("No route could be loaded")?;
    print_status(&snapshot);

    if !cli.paused {
        session.toggle_movement().await?;
    }

    let result = run(&cli, &selector).await;
    session.shutdown().await;
    result
}

/// Drive the session until the route ends, the tick budget runs out or the
/// user quits
async fn run(cli: &Cli, selector: &RouteSelector) -> Result<()> {
    let session = selector.session();
    let mut events = session.events();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut advances = 0u64;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }
            event = events.recv() => match event {
                Ok(PlaybackEvent::Advanced { .. }) => {
                    advances += 1;
                    print_status(&session.snapshot());
                    if cli.max_ticks.is_some_and(|max| advances >= max) {
                        info!(advances, "Tick budget reached");
                        break;
                    }
                }
                Ok(PlaybackEvent::ReachedEnd { .. }) if !cli.keep_running => {
                    print_status(&session.snapshot());
                    break;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event listener fell behind"),
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if !handle_console(&line, selector).await? {
                        break;
                    }
                }
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!(error = %e, "Failed to read stdin");
                    stdin_open = false;
                }
            },
        }
    }
    Ok(())
}

/// Returns false when the user asked to quit
async fn handle_console(line: &str, selector: &RouteSelector) -> Result<bool> {
    let session = selector.session();
    let command = match ConsoleCommand::parse(line) {
        Ok(Some(command)) => command,
        Ok(None) => return Ok(true),
        Err(e) => {
            println!("{e}\n{CONSOLE_HELP}");
            return Ok(true);
        }
    };

    match command {
        ConsoleCommand::Toggle => print_status(&session.toggle_movement().await?),
        ConsoleCommand::Restart => print_status(&session.restart().await?),
        ConsoleCommand::Step(n) => print_status(&session.set_step_size(n).await?),
        ConsoleCommand::Goto(target) => print_status(&session.reposition(target).await?),
        ConsoleCommand::Route(name) => match selector.select_route(&name).await {
            Ok(snapshot) => print_status(&snapshot),
            Err(e) => error!(route = %name, error = %e, "Route change failed"),
        },
        ConsoleCommand::Routes => {
            for name in selector.available_routes().await {
                println!("  {name}");
            }
        }
        ConsoleCommand::Status => {
            let snapshot = session.snapshot();
            print_status(&snapshot);
            if let Some(address) = snapshot.position.and_then(|p| p.address) {
                println!("  {address}");
            }
            println!("  route length {:.2} km", snapshot.route_length_m / 1000.0);
            let next_leg = snapshot
                .route
                .as_ref()
                .and_then(|route| route.segment_bearings().get(snapshot.current_index).copied());
            if let Some(bearing) = next_leg {
                println!("  next leg heading {bearing:.1}°");
            }
        }
        ConsoleCommand::Help => println!("{CONSOLE_HELP}"),
        ConsoleCommand::Quit => return Ok(false),
    }
    Ok(true)
}

fn print_status(snapshot: &PlaybackSnapshot) {
    let route = snapshot.route_name().unwrap_or("-");
    let len = snapshot.route.as_ref().map_or(0, |r| r.len());
    let (coords, when) = snapshot
        .position
        .as_ref()
        .map(|p| (p.coords.to_string(), p.timestamp_label.as_str()))
        .unwrap_or_else(|| ("-".to_string(), ""));

    println!(
        "[{:?}] {} {}/{} {:5.1}% heading {:5.1}° step {} @ {} {}",
        snapshot.status,
        route,
        snapshot.current_index + 1,
        len,
        snapshot.progress_percent,
        snapshot.heading_degrees,
        snapshot.step_size,
        coords,
        when,
    );
}
