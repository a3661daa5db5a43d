use super::Window;
use crate::{
    defaults::{DEFAULT_EV_AGING_FACTOR, DEFAULT_EV_WINDOW},
    error::ConfigError,
    time::SimTime,
};
use std::time::Duration;
use tracing::trace;

/// ratio reported when neither host encountered anybody
const EQUALLY_SOCIAL: f64 = 0.5;
/// encounter values below this are treated as zero
const ZERO_ENCOUNTERS: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub struct EncounterValueConfig {
    /// weight of the last window, in `[0, 1]`
    pub aging_factor: f64,
    pub window: Duration,
}

impl Default for EncounterValueConfig {
    fn default() -> Self {
        Self {
            aging_factor: DEFAULT_EV_AGING_FACTOR,
            window: DEFAULT_EV_WINDOW,
        }
    }
}

/// Smoothed number of encounters per window, a measure of how social a
/// host is.
///
/// ```text
/// EV = w·encounters_in_window + (1 − w)·EV
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct EncounterValue {
    aging_factor: f64,
    window: Window,

    value: f64,
    window_counter: u32,

    version: u64,
}

impl EncounterValue {
    pub fn new(config: EncounterValueConfig) -> Result<Self, ConfigError> {
        let aging_factor = ConfigError::check_unit("EncounterValue.agingFactor", config.aging_factor)?;
        Ok(Self {
            aging_factor,
            window: Window::new("EncounterValue.windowLength", config.window)?,
            value: 0.0,
            window_counter: 0,
            version: 0,
        })
    }

    /// a fresh estimator with the same constants
    #[must_use]
    pub fn replicate(&self) -> Self {
        Self {
            aging_factor: self.aging_factor,
            window: self.window.clone(),
            value: 0.0,
            window_counter: 0,
            version: 0,
        }
    }

    #[inline]
    pub fn value(&self) -> f64 {
        self.value
    }

    #[inline]
    pub fn aging_factor(&self) -> f64 {
        self.aging_factor
    }

    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn add_encounter(&mut self) {
        self.window_counter += 1;
    }

    /// fold the encounters of every window that ended at or before `now`
    pub fn update(&mut self, now: SimTime) {
        for _ in 0..self.window.advance(now) {
            self.value = self.aging_factor * f64::from(self.window_counter)
                + (1.0 - self.aging_factor) * self.value;
            self.window_counter = 0;
            self.version += 1;
            trace!(ev = self.value, "encounter value updated");
        }
    }

    /// share of `other` in the sum of both encounter values
    ///
    /// A value above `0.5` means the other host is the more social one.
    pub fn ratio(&self, other: f64) -> f64 {
        if self.value < ZERO_ENCOUNTERS && other < ZERO_ENCOUNTERS {
            return EQUALLY_SOCIAL;
        }
        other / (self.value + other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: f64 = 10.0;
    const AGING: f64 = 0.3;
    const DELTA: f64 = 1e-9;

    fn encounter_value() -> EncounterValue {
        EncounterValue::new(EncounterValueConfig {
            aging_factor: AGING,
            window: Duration::from_secs_f64(WINDOW),
        })
        .unwrap()
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < DELTA,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn aging_factor_in_unit_interval() {
        let Err(error) = EncounterValue::new(EncounterValueConfig {
            aging_factor: 1.5,
            ..Default::default()
        }) else {
            panic!("aging factor above 1 should be refused")
        };
        assert!(matches!(error, ConfigError::OutOfRange { .. }));
    }

    #[test]
    fn starts_at_zero() {
        assert_eq!(encounter_value().value(), 0.0);
    }

    #[test]
    fn moving_average_over_windows() {
        let mut ev = encounter_value();
        for _ in 0..4 {
            ev.add_encounter();
        }
        ev.update(SimTime::from_secs(WINDOW - 1.0));
        assert_eq!(ev.value(), 0.0);

        ev.update(SimTime::from_secs(WINDOW));
        assert_close(ev.value(), AGING * 4.0);

        ev.add_encounter();
        ev.update(SimTime::from_secs(2.0 * WINDOW));
        assert_close(ev.value(), AGING * 1.0 + (1.0 - AGING) * AGING * 4.0);
    }

    #[test]
    fn empty_windows_decay() {
        let mut ev = encounter_value();
        ev.add_encounter();
        ev.update(SimTime::from_secs(WINDOW));

        // two windows without encounters at once
        ev.update(SimTime::from_secs(3.0 * WINDOW));
        assert_close(ev.value(), AGING * (1.0 - AGING).powi(2));
    }

    #[test]
    fn ratio() {
        let mut ev = encounter_value();
        assert_eq!(ev.ratio(0.0), 0.5);

        ev.add_encounter();
        ev.update(SimTime::from_secs(WINDOW));

        assert_close(ev.ratio(AGING), 0.5);
        assert_close(ev.ratio(3.0 * AGING), 0.75);
        assert_eq!(ev.ratio(0.0), 0.0);
    }
}
