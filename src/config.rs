use crate::core::DEFAULT_TOLERANCE;
use crate::playback::{MAX_STEP_SIZE, MIN_STEP_SIZE};
use anyhow::{bail, Result};
use std::time::Duration;

/// Default time between playback ticks
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(1000);

/// Lost-position ticks tolerated before snapping back to the current index
pub const DEFAULT_LOST_POSITION_LIMIT: u32 = 3;

/// Playback session configuration
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub tick_period: Duration,
    /// Coordinate tolerance for position lookup, in degrees
    pub tolerance: f64,
    pub step_size: usize,
    /// 0 disables recovery
    pub lost_position_limit: u32,
    /// Capacity of the event broadcast channel
    pub event_capacity: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_period: DEFAULT_TICK_PERIOD,
            tolerance: DEFAULT_TOLERANCE,
            step_size: MIN_STEP_SIZE,
            lost_position_limit: DEFAULT_LOST_POSITION_LIMIT,
            event_capacity: 64,
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<()> {
        if self.tick_period.is_zero() {
            bail!("tick period must be greater than zero");
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            bail!("tolerance must be a positive number, got {}", self.tolerance);
        }
        if !(MIN_STEP_SIZE..=MAX_STEP_SIZE).contains(&self.step_size) {
            bail!(
                "step size must be between {} and {}, got {}",
                MIN_STEP_SIZE,
                MAX_STEP_SIZE,
                self.step_size
            );
        }
        if self.event_capacity == 0 {
            bail!("event capacity must be greater than zero");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        SimConfig::default().validate().unwrap();
    }

    #[test]
    fn test_rejects_bad_values() {
        let bad = [
            SimConfig { tick_period: Duration::ZERO, ..Default::default() },
            SimConfig { tolerance: 0.0, ..Default::default() },
            SimConfig { tolerance: f64::NAN, ..Default::default() },
            SimConfig { step_size: 6, ..Default::default() },
            SimConfig { event_capacity: 0, ..Default::default() },
        ];
        for config in bad {
            assert!(config.validate().is_err(), "{config:?}");
        }
    }
}
