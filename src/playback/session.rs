use crate::config::SimConfig;
use crate::core::{Route, Waypoint};
use crate::error::SessionError;
use crate::playback::engine::{PlaybackEngine, TickOutcome};
use crate::playback::{
    CurrentPosition, PlaybackEvent, PlaybackSnapshot, PlaybackStatus, ADDRESS_PLACEHOLDER,
};
use crate::provider::Geocoder;
use chrono::Local;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

const COMMAND_BUFFER: usize = 32;

/// Identifies the position an asynchronous result belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PositionStamp {
    /// Bumped on every route load
    generation: u64,
    /// Bumped on every position change
    sequence: u64,
}

/// Reverse-geocoding result for a stamped position
struct Enrichment {
    stamp: PositionStamp,
    coords: Waypoint,
    result: Result<String, String>,
}

enum Command {
    LoadRoute {
        route: Arc<Route>,
        ticket: Option<u64>,
        reply: oneshot::Sender<Option<PlaybackSnapshot>>,
    },
    Toggle {
        reply: oneshot::Sender<PlaybackSnapshot>,
    },
    Restart {
        reply: oneshot::Sender<PlaybackSnapshot>,
    },
    SetStepSize {
        step_size: usize,
        reply: oneshot::Sender<PlaybackSnapshot>,
    },
    Reposition {
        target: Waypoint,
        reply: oneshot::Sender<PlaybackSnapshot>,
    },
    Shutdown,
}

/// Handle to a running playback session
///
/// All state lives in a single background task that owns the
/// `PlaybackEngine` and the tick timer. Commands go in over a channel,
/// snapshots come out over a `watch` channel and conditions over a
/// `broadcast` channel. Must be created inside a tokio runtime.
pub struct PlaybackSession {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<PlaybackSnapshot>,
    events: broadcast::Sender<PlaybackEvent>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PlaybackSession {
    pub fn spawn(config: &SimConfig, geocoder: Arc<dyn Geocoder>) -> Self {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);

        let mut engine = PlaybackEngine::new(config.tolerance, config.lost_position_limit);
        let step_size = engine.set_step_size(config.step_size);

        let (snapshot_tx, snapshot_rx) = watch::channel(PlaybackSnapshot::idle(step_size));
        let (event_tx, _) = broadcast::channel(config.event_capacity);

        let actor = SessionActor {
            engine,
            tick_period: config.tick_period,
            geocoder,
            commands: command_rx,
            snapshots: snapshot_tx,
            events: event_tx.clone(),
            timer: None,
            enrichments: JoinSet::new(),
            generation: 0,
            sequence: 0,
            latest_ticket: 0,
            timestamp_label: String::new(),
            address: None,
            route_length_m: 0.0,
            end_reported: false,
        };
        let task = tokio::spawn(actor.run());

        Self {
            commands: command_tx,
            snapshots: snapshot_rx,
            events: event_tx,
            task: Mutex::new(Some(task)),
        }
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified after every state transition
    pub fn subscribe(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.snapshots.clone()
    }

    pub fn events(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: PlaybackEvent) {
        let _ = self.events.send(event);
    }

    /// Replace the active route; playback stops at its first waypoint
    pub async fn load_route(&self, route: Route) -> Result<PlaybackSnapshot, SessionError> {
        // unstamped loads are never superseded
        self.load_route_stamped(Arc::new(route), None)
            .await?
            .ok_or(SessionError::Closed)
    }

    /// Load a route tagged with a request number. Returns `None` when a load
    /// with a newer ticket has already been applied.
    pub(crate) async fn load_route_stamped(
        &self,
        route: Arc<Route>,
        ticket: Option<u64>,
    ) -> Result<Option<PlaybackSnapshot>, SessionError> {
        self.request(|reply| Command::LoadRoute { route, ticket, reply }).await
    }

    /// Start or pause movement
    pub async fn toggle_movement(&self) -> Result<PlaybackSnapshot, SessionError> {
        self.request(|reply| Command::Toggle { reply }).await
    }

    /// Stop and return to the start of the route
    pub async fn restart(&self) -> Result<PlaybackSnapshot, SessionError> {
        self.request(|reply| Command::Restart { reply }).await
    }

    /// Waypoints advanced per tick, clamped to 1..=5
    pub async fn set_step_size(&self, step_size: usize) -> Result<PlaybackSnapshot, SessionError> {
        self.request(|reply| Command::SetStepSize { step_size, reply }).await
    }

    /// Move the vehicle marker to an arbitrary coordinate
    pub async fn reposition(&self, target: Waypoint) -> Result<PlaybackSnapshot, SessionError> {
        self.request(|reply| Command::Reposition { target, reply }).await
    }

    /// Stop the tick timer and end the session task. Safe to call repeatedly.
    pub async fn shutdown(&self) {
        let Some(task) = self.task.lock().await.take() else {
            return;
        };
        let _ = self.commands.send(Command::Shutdown).await;
        if let Err(e) = task.await {
            warn!(error = %e, "Playback task ended abnormally");
        }
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| SessionError::Closed)?;
        response.await.map_err(|_| SessionError::Closed)
    }
}

struct SessionActor {
    engine: PlaybackEngine,
    tick_period: Duration,
    geocoder: Arc<dyn Geocoder>,
    commands: mpsc::Receiver<Command>,
    snapshots: watch::Sender<PlaybackSnapshot>,
    events: broadcast::Sender<PlaybackEvent>,
    /// Present only while running
    timer: Option<Interval>,
    enrichments: JoinSet<Enrichment>,
    generation: u64,
    sequence: u64,
    latest_ticket: u64,
    timestamp_label: String,
    address: Option<String>,
    route_length_m: f64,
    /// ReachedEnd already emitted for the current position
    end_reported: bool,
}

impl SessionActor {
    async fn run(mut self) {
        debug!(tick_period = ?self.tick_period, "Playback session started");

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle(command),
                },
                Some(joined) = self.enrichments.join_next() => match joined {
                    Ok(enrichment) => self.apply_enrichment(enrichment),
                    Err(e) if e.is_cancelled() => {}
                    Err(e) => warn!(error = %e, "Address lookup task failed"),
                },
                _ = Self::next_tick(&mut self.timer) => self.on_tick(),
            }
        }

        self.stop_timer();
        self.enrichments.abort_all();
        debug!("Playback session stopped");
    }

    async fn next_tick(timer: &mut Option<Interval>) {
        match timer {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending().await,
        }
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::LoadRoute { route, ticket, reply } => {
                let _ = reply.send(self.load_route(route, ticket));
            }
            Command::Toggle { reply } => {
                self.toggle();
                let _ = reply.send(self.publish());
            }
            Command::Restart { reply } => {
                if self.engine.restart() {
                    self.stop_timer();
                    info!("Playback restarted");
                    self.emit(PlaybackEvent::Restarted);
                    self.position_changed();
                }
                let _ = reply.send(self.publish());
            }
            Command::SetStepSize { step_size, reply } => {
                let applied = self.engine.set_step_size(step_size);
                debug!(requested = step_size, applied, "Step size changed");
                let _ = reply.send(self.publish());
            }
            Command::Reposition { target, reply } => {
                if self.engine.reposition(target) {
                    debug!(%target, "Vehicle repositioned");
                    self.position_changed();
                }
                let _ = reply.send(self.publish());
            }
            // handled by the run loop
            Command::Shutdown => {}
        }
    }

    fn load_route(&mut self, route: Arc<Route>, ticket: Option<u64>) -> Option<PlaybackSnapshot> {
        if let Some(ticket) = ticket {
            if ticket < self.latest_ticket {
                debug!(
                    route = route.name(),
                    ticket,
                    latest = self.latest_ticket,
                    "Ignoring superseded route load"
                );
                return None;
            }
            self.latest_ticket = ticket;
        }

        self.stop_timer();
        self.generation += 1;
        self.route_length_m = route.length_m();
        info!(
            route = route.name(),
            waypoints = route.len(),
            length_m = self.route_length_m,
            "Route loaded"
        );
        self.emit(PlaybackEvent::RouteLoaded {
            name: route.name().to_string(),
            waypoints: route.len(),
        });
        self.engine.load_route(route);
        self.position_changed();
        Some(self.publish())
    }

    fn toggle(&mut self) {
        match self.engine.toggle() {
            PlaybackStatus::Running => {
                self.start_timer();
                info!(step_size = self.engine.step_size(), "Playback started");
                self.emit(PlaybackEvent::Started);
            }
            PlaybackStatus::Stopped => {
                self.stop_timer();
                info!(index = self.engine.current_index(), "Playback paused");
                self.emit(PlaybackEvent::Stopped);
            }
            PlaybackStatus::Idle => debug!("Toggle ignored, no route loaded"),
        }
    }

    fn on_tick(&mut self) {
        match self.engine.tick() {
            TickOutcome::Inactive => self.stop_timer(),
            TickOutcome::Advanced { from, to } => {
                let heading_degrees = self.engine.heading();
                let progress_percent = self.engine.progress();
                debug!(from, to, heading_degrees, progress_percent, "Vehicle advanced");
                self.emit(PlaybackEvent::Advanced {
                    from,
                    to,
                    heading_degrees,
                    progress_percent,
                });

                self.position_changed();
                let at_end = self
                    .engine
                    .route()
                    .is_some_and(|route| to == route.last_index());
                if at_end {
                    self.report_end(to);
                }
                self.publish();
            }
            TickOutcome::AtEnd { index } => {
                // a one-waypoint route or a reposition onto the last waypoint
                if !self.end_reported {
                    self.report_end(index);
                }
                self.publish();
            }
            TickOutcome::LostPosition { target, misses } => {
                warn!(%target, misses, "Current position not found in route data");
                self.emit(PlaybackEvent::LostPosition { target, misses });
            }
            TickOutcome::Resynced { index } => {
                warn!(index, "Lost position persisted, snapping back to last known index");
                self.emit(PlaybackEvent::PositionResynced { index });
                self.position_changed();
                self.publish();
            }
        }
    }

    fn report_end(&mut self, index: usize) {
        info!(index, "Reached end of route");
        self.end_reported = true;
        self.emit(PlaybackEvent::ReachedEnd { index });
    }

    fn start_timer(&mut self) {
        let mut interval = time::interval_at(Instant::now() + self.tick_period, self.tick_period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.timer = Some(interval);
    }

    fn stop_timer(&mut self) {
        if self.timer.take().is_some() {
            debug!("Tick timer cancelled");
        }
    }

    fn stamp(&self) -> PositionStamp {
        PositionStamp {
            generation: self.generation,
            sequence: self.sequence,
        }
    }

    /// New position: fresh timestamp, address lookup in the background
    fn position_changed(&mut self) {
        self.sequence += 1;
        self.end_reported = false;
        self.timestamp_label = Local::now().format("%b %-d, %H:%M").to_string();
        self.address = None;

        let Some(coords) = self.engine.position() else {
            return;
        };
        let stamp = self.stamp();
        let geocoder = self.geocoder.clone();
        self.enrichments.spawn(async move {
            let result = geocoder
                .reverse_geocode(coords)
                .await
                .map_err(|e| e.to_string());
            Enrichment { stamp, coords, result }
        });
    }

    fn apply_enrichment(&mut self, enrichment: Enrichment) {
        if enrichment.stamp != self.stamp() {
            debug!(coords = %enrichment.coords, "Discarding address for a stale position");
            return;
        }

        let address = match enrichment.result {
            Ok(address) => address,
            Err(reason) => {
                warn!(coords = %enrichment.coords, %reason, "Error fetching address");
                self.emit(PlaybackEvent::GeocodeFailed {
                    coords: enrichment.coords,
                    reason,
                });
                ADDRESS_PLACEHOLDER.to_string()
            }
        };
        self.address = Some(address);
        self.publish();
    }

    fn emit(&self, event: PlaybackEvent) {
        let _ = self.events.send(event);
    }

    fn snapshot(&self) -> PlaybackSnapshot {
        let heading_degrees = self.engine.heading();
        PlaybackSnapshot {
            status: self.engine.status(),
            current_index: self.engine.current_index(),
            step_size: self.engine.step_size(),
            progress_percent: self.engine.progress(),
            heading_degrees,
            position: self.engine.position().map(|coords| CurrentPosition {
                coords,
                heading_degrees,
                timestamp_label: self.timestamp_label.clone(),
                address: self.address.clone(),
            }),
            route: self.engine.route().cloned(),
            route_length_m: self.route_length_m,
        }
    }

    /// Publish the current snapshot if it changed, and return it
    fn publish(&self) -> PlaybackSnapshot {
        let next = self.snapshot();
        self.snapshots.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next.clone();
                true
            }
        });
        next
    }
}
