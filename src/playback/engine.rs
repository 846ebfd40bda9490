use crate::core::{bearing, locate, Route, Waypoint};
use crate::playback::{PlaybackStatus, MAX_STEP_SIZE, MIN_STEP_SIZE};
use std::sync::Arc;

/// Result of a single tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Not running, nothing happened
    Inactive,
    /// Moved forward along the route
    Advanced { from: usize, to: usize },
    /// Already on the last waypoint
    AtEnd { index: usize },
    /// Last known position is not on the route
    LostPosition { target: Waypoint, misses: u32 },
    /// Gave up on the lost position and snapped back to the current index
    Resynced { index: usize },
}

/// Route playback state machine
///
/// Pure and synchronous: the owner decides when `tick` runs.
pub struct PlaybackEngine {
    route: Option<Arc<Route>>,
    status: PlaybackStatus,
    current_index: usize,
    position: Option<Waypoint>,
    step_size: usize,
    progress: f64,
    heading: f64,
    tolerance: f64,
    lost_position_limit: u32,
    missed_lookups: u32,
}

impl PlaybackEngine {
    pub fn new(tolerance: f64, lost_position_limit: u32) -> Self {
        Self {
            route: None,
            status: PlaybackStatus::Idle,
            current_index: 0,
            position: None,
            step_size: MIN_STEP_SIZE,
            progress: 0.0,
            heading: 0.0,
            tolerance,
            lost_position_limit,
            missed_lookups: 0,
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == PlaybackStatus::Running
    }

    pub fn route(&self) -> Option<&Arc<Route>> {
        self.route.as_ref()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// Last known position of the vehicle
    pub fn position(&self) -> Option<Waypoint> {
        self.position
    }

    pub fn step_size(&self) -> usize {
        self.step_size
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn heading(&self) -> f64 {
        self.heading
    }

    /// Replace the active route and park at its first waypoint
    pub fn load_route(&mut self, route: Arc<Route>) {
        self.position = Some(route.start());
        self.route = Some(route);
        self.status = PlaybackStatus::Stopped;
        self.reset_progress();
    }

    /// Start or pause. Returns the new status; no-op while idle.
    pub fn toggle(&mut self) -> PlaybackStatus {
        self.status = match self.status {
            PlaybackStatus::Idle => PlaybackStatus::Idle,
            PlaybackStatus::Stopped => PlaybackStatus::Running,
            PlaybackStatus::Running => PlaybackStatus::Stopped,
        };
        self.status
    }

    /// Stop and return to the first waypoint. Returns false while idle.
    pub fn restart(&mut self) -> bool {
        let Some(route) = &self.route else {
            return false;
        };
        self.position = Some(route.start());
        self.status = PlaybackStatus::Stopped;
        self.reset_progress();
        true
    }

    /// Clamp and store the step size, effective on the next tick
    pub fn set_step_size(&mut self, step_size: usize) -> usize {
        self.step_size = step_size.clamp(MIN_STEP_SIZE, MAX_STEP_SIZE);
        self.step_size
    }

    /// Override the last known position, e.g. after an external reset.
    ///
    /// A target on the route moves the vehicle to that waypoint along with
    /// its index and progress. A target off the route is kept as is and the
    /// next tick reports a lost position. Returns false while idle.
    pub fn reposition(&mut self, target: Waypoint) -> bool {
        let Some(route) = self.route.clone() else {
            return false;
        };
        match locate(&route, target, self.tolerance) {
            Some(index) => {
                self.current_index = index;
                self.position = route.get(index);
                self.progress = (index + 1) as f64 / route.len() as f64 * 100.0;
                self.missed_lookups = 0;
            }
            None => self.position = Some(target),
        }
        true
    }

    /// Advance the vehicle by one step
    pub fn tick(&mut self) -> TickOutcome {
        if !self.is_running() {
            return TickOutcome::Inactive;
        }
        let (Some(route), Some(target)) = (self.route.clone(), self.position) else {
            return TickOutcome::Inactive;
        };

        let Some(index) = locate(&route, target, self.tolerance) else {
            self.missed_lookups += 1;
            if self.lost_position_limit > 0 && self.missed_lookups >= self.lost_position_limit {
                self.missed_lookups = 0;
                self.position = route.get(self.current_index);
                return TickOutcome::Resynced { index: self.current_index };
            }
            return TickOutcome::LostPosition { target, misses: self.missed_lookups };
        };
        self.missed_lookups = 0;

        let next = (index + self.step_size).min(route.last_index());
        let len = route.len() as f64;

        if next == index {
            self.current_index = index;
            self.progress = (index + 1) as f64 / len * 100.0;
            return TickOutcome::AtEnd { index };
        }

        let from = route.waypoints()[index];
        let to = route.waypoints()[next];
        self.heading = bearing(from, to);
        self.position = Some(to);
        self.progress = (next + 1) as f64 / len * 100.0;
        self.current_index = next;

        TickOutcome::Advanced { from: index, to: next }
    }

    fn reset_progress(&mut self) {
        self.current_index = 0;
        self.progress = 0.0;
        self.heading = 0.0;
        self.missed_lookups = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DEFAULT_TOLERANCE;

    fn route(points: &[(f64, f64)]) -> Arc<Route> {
        Arc::new(Route::new("test", points.iter().map(|&p| p.into()).collect()).unwrap())
    }

    fn running(points: &[(f64, f64)]) -> PlaybackEngine {
        let mut engine = PlaybackEngine::new(DEFAULT_TOLERANCE, 3);
        engine.load_route(route(points));
        assert_eq!(engine.toggle(), PlaybackStatus::Running);
        engine
    }

    #[test]
    fn test_three_point_route() {
        let mut engine = running(&[(10.0, 10.0), (10.0, 11.0), (10.0, 12.0)]);
        assert_eq!(engine.progress(), 0.0);

        assert_eq!(engine.tick(), TickOutcome::Advanced { from: 0, to: 1 });
        assert_eq!(engine.current_index(), 1);
        assert!((engine.progress() - 200.0 / 3.0).abs() < 1e-9);

        assert_eq!(engine.tick(), TickOutcome::Advanced { from: 1, to: 2 });
        assert_eq!(engine.progress(), 100.0);

        assert_eq!(engine.tick(), TickOutcome::AtEnd { index: 2 });
        assert_eq!(engine.current_index(), 2);
        assert_eq!(engine.progress(), 100.0);
        // no auto-stop at the end
        assert!(engine.is_running());
    }

    #[test]
    fn test_single_step_walks_every_index() {
        let points: Vec<(f64, f64)> = (0..25).map(|i| (17.0 + i as f64 * 0.001, 78.0)).collect();
        let mut engine = running(&points);

        let mut last_progress = engine.progress();
        for expected in 1..points.len() {
            engine.tick();
            assert_eq!(engine.current_index(), expected);
            assert!(engine.progress() >= last_progress);
            last_progress = engine.progress();
        }
        assert_eq!(engine.progress(), 100.0);

        for _ in 0..3 {
            engine.tick();
            assert_eq!(engine.current_index(), points.len() - 1);
            assert_eq!(engine.progress(), 100.0);
        }
    }

    #[test]
    fn test_step_size_clamps_to_route_end() {
        let points: Vec<(f64, f64)> = (0..7).map(|i| (0.0, i as f64)).collect();
        let mut engine = running(&points);
        assert_eq!(engine.set_step_size(4), 4);

        assert_eq!(engine.tick(), TickOutcome::Advanced { from: 0, to: 4 });
        assert_eq!(engine.tick(), TickOutcome::Advanced { from: 4, to: 6 });
        assert_eq!(engine.progress(), 100.0);
    }

    #[test]
    fn test_step_size_bounds() {
        let mut engine = PlaybackEngine::new(DEFAULT_TOLERANCE, 3);
        assert_eq!(engine.set_step_size(0), MIN_STEP_SIZE);
        assert_eq!(engine.set_step_size(42), MAX_STEP_SIZE);
        assert_eq!(engine.set_step_size(3), 3);
        assert_eq!(engine.status(), PlaybackStatus::Idle);
    }

    #[test]
    fn test_heading_follows_leg() {
        let mut engine = running(&[(0.0, 0.0), (0.0, 1.0), (-1.0, 1.0)]);
        engine.tick();
        assert!((engine.heading() - 90.0).abs() < 1e-9);
        engine.tick();
        assert!((engine.heading() - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_restart_while_running() {
        let mut engine = running(&[(10.0, 10.0), (10.0, 11.0), (10.0, 12.0)]);
        engine.set_step_size(2);
        engine.tick();

        assert!(engine.restart());
        assert_eq!(engine.current_index(), 0);
        assert_eq!(engine.progress(), 0.0);
        assert_eq!(engine.status(), PlaybackStatus::Stopped);
        assert_eq!(engine.position(), Some(Waypoint::new(10.0, 10.0)));
        // step size survives a restart
        assert_eq!(engine.step_size(), 2);
    }

    #[test]
    fn test_idle_is_inert() {
        let mut engine = PlaybackEngine::new(DEFAULT_TOLERANCE, 3);
        assert_eq!(engine.toggle(), PlaybackStatus::Idle);
        assert!(!engine.restart());
        assert!(!engine.reposition(Waypoint::new(1.0, 1.0)));
        assert_eq!(engine.tick(), TickOutcome::Inactive);
    }

    #[test]
    fn test_stopped_does_not_tick() {
        let mut engine = running(&[(0.0, 0.0), (0.0, 1.0)]);
        engine.toggle();
        assert_eq!(engine.tick(), TickOutcome::Inactive);
        assert_eq!(engine.current_index(), 0);
    }

    #[test]
    fn test_lost_position_is_a_noop() {
        let mut engine = PlaybackEngine::new(DEFAULT_TOLERANCE, 0);
        engine.load_route(route(&[(10.0, 10.0), (10.0, 11.0)]));
        engine.toggle();
        let stray = Waypoint::new(45.0, 45.0);
        engine.reposition(stray);

        for misses in 1..=5 {
            assert_eq!(engine.tick(), TickOutcome::LostPosition { target: stray, misses });
            assert_eq!(engine.current_index(), 0);
            assert!(engine.is_running());
        }
    }

    #[test]
    fn test_lost_position_resyncs_after_limit() {
        let mut engine = running(&[(10.0, 10.0), (10.0, 11.0), (10.0, 12.0)]);
        engine.tick();
        engine.reposition(Waypoint::new(45.0, 45.0));

        assert!(matches!(engine.tick(), TickOutcome::LostPosition { misses: 1, .. }));
        assert!(matches!(engine.tick(), TickOutcome::LostPosition { misses: 2, .. }));
        assert_eq!(engine.tick(), TickOutcome::Resynced { index: 1 });
        assert_eq!(engine.position(), Some(Waypoint::new(10.0, 11.0)));

        assert_eq!(engine.tick(), TickOutcome::Advanced { from: 1, to: 2 });
    }

    #[test]
    fn test_reposition_onto_route_jumps() {
        let points: Vec<(f64, f64)> = (0..6).map(|i| (0.0, i as f64)).collect();
        let mut engine = running(&points);
        engine.reposition(Waypoint::new(0.0, 3.00001));
        assert_eq!(engine.tick(), TickOutcome::Advanced { from: 3, to: 4 });
    }

    #[test]
    fn test_reposition_onto_route_while_stopped() {
        let points: Vec<(f64, f64)> = (0..6).map(|i| (0.0, i as f64)).collect();
        let mut engine = PlaybackEngine::new(DEFAULT_TOLERANCE, 3);
        engine.load_route(route(&points));

        assert!(engine.reposition(Waypoint::new(0.0, 3.00001)));
        assert_eq!(engine.current_index(), 3);
        assert_eq!(engine.position(), Some(Waypoint::new(0.0, 3.0)));
        assert!((engine.progress() - 4.0 / 6.0 * 100.0).abs() < 1e-9);
        assert_eq!(engine.status(), PlaybackStatus::Stopped);
    }

    #[test]
    fn test_reposition_back_on_route_clears_misses() {
        let mut engine = running(&[(10.0, 10.0), (10.0, 11.0), (10.0, 12.0)]);
        engine.reposition(Waypoint::new(45.0, 45.0));
        assert!(matches!(engine.tick(), TickOutcome::LostPosition { misses: 1, .. }));
        assert!(matches!(engine.tick(), TickOutcome::LostPosition { misses: 2, .. }));

        engine.reposition(Waypoint::new(10.0, 11.0));
        assert_eq!(engine.current_index(), 1);
        engine.reposition(Waypoint::new(45.0, 45.0));
        assert!(matches!(engine.tick(), TickOutcome::LostPosition { misses: 1, .. }));
        // the off-route target leaves the index where it was
        assert_eq!(engine.current_index(), 1);
    }

    #[test]
    fn test_single_waypoint_route() {
        let mut engine = running(&[(5.0, 5.0)]);
        assert_eq!(engine.tick(), TickOutcome::AtEnd { index: 0 });
        assert_eq!(engine.progress(), 100.0);
    }

    #[test]
    fn test_load_route_resets_state() {
        let mut engine = running(&[(0.0, 0.0), (0.0, 1.0), (0.0, 2.0)]);
        engine.tick();
        engine.load_route(route(&[(1.0, 1.0), (1.0, 2.0)]));

        assert_eq!(engine.status(), PlaybackStatus::Stopped);
        assert_eq!(engine.current_index(), 0);
        assert_eq!(engine.progress(), 0.0);
        assert_eq!(engine.position(), Some(Waypoint::new(1.0, 1.0)));
    }
}
