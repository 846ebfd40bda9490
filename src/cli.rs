use anyhow::{anyhow, bail, Result};
use clap::Parser;
use routesim::config::{SimConfig, DEFAULT_LOST_POSITION_LIMIT};
use routesim::core::{Waypoint, DEFAULT_TOLERANCE};
use std::path::PathBuf;
use std::time::Duration;

/// Play back a vehicle route on a timer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory holding <route>.json / <route>.csv files
    #[arg(short, long, default_value = "routes")]
    pub data_dir: PathBuf,

    /// Serve built-in demo routes instead of reading files
    #[arg(long)]
    pub demo: bool,

    /// Route to select on start instead of the last persisted one
    #[arg(short, long)]
    pub route: Option<String>,

    /// Milliseconds between ticks
    #[arg(short, long, default_value_t = 1000)]
    pub tick_ms: u64,

    /// Waypoints advanced per tick (1-5)
    #[arg(short, long, default_value_t = 1)]
    pub step: usize,

    /// Position lookup tolerance in degrees
    #[arg(long, default_value_t = DEFAULT_TOLERANCE)]
    pub tolerance: f64,

    /// Lost-position ticks before snapping back (0 = never)
    #[arg(long, default_value_t = DEFAULT_LOST_POSITION_LIMIT)]
    pub lost_position_limit: u32,

    /// Settings file (defaults to the platform config dir)
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Load the route but wait for a `toggle` command before moving
    #[arg(long)]
    pub paused: bool,

    /// Keep running after the vehicle reaches the end of the route
    #[arg(long)]
    pub keep_running: bool,

    /// Exit after this many advances
    #[arg(long)]
    pub max_ticks: Option<u64>,
}

impl Cli {
    pub fn sim_config(&self) -> SimConfig {
        SimConfig {
            tick_period: Duration::from_millis(self.tick_ms),
            tolerance: self.tolerance,
            step_size: self.step,
            lost_position_limit: self.lost_position_limit,
            ..Default::default()
        }
    }
}

/// A line typed on stdin while playback runs
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Toggle,
    Restart,
    Step(usize),
    Route(String),
    Routes,
    Goto(Waypoint),
    Status,
    Help,
    Quit,
}

pub const CONSOLE_HELP: &str = "commands: toggle | restart | step <1-5> | route <name> | routes | goto <lat> <lon> | status | quit";

impl ConsoleCommand {
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (verb, rest) = line
            .split_once(char::is_whitespace)
            .map(|(verb, rest)| (verb, rest.trim()))
            .unwrap_or((line, ""));

        let command = match verb.to_lowercase().as_str() {
            "toggle" | "t" | "play" | "pause" => Self::Toggle,
            "restart" | "r" => Self::Restart,
            "step" => {
                let n = rest
                    .parse::<usize>()
                    .map_err(|_| anyhow!("step needs a number, got {:?}", rest))?;
                Self::Step(n)
            }
            "route" => {
                if rest.is_empty() {
                    bail!("route needs a name");
                }
                Self::Route(rest.to_string())
            }
            "routes" => Self::Routes,
            "goto" => {
                let mut parts = rest.split_whitespace().map(str::parse::<f64>);
                match (parts.next(), parts.next(), parts.next()) {
                    (Some(Ok(lat)), Some(Ok(lon)), None) => Self::Goto(Waypoint::new(lat, lon)),
                    _ => bail!("goto needs <lat> <lon>"),
                }
            }
            "status" | "s" => Self::Status,
            "help" | "?" => Self::Help,
            "quit" | "q" | "exit" => Self::Quit,
            other => bail!("unknown command {:?}", other),
        };
        Ok(Some(command))
    }
}
