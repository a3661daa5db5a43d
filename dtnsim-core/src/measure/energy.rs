use crate::{error::ConfigError, time::SimTime};
use std::time::Duration;

/// Settings of the battery model of a host.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyConfig {
    /// energy available when the host starts
    pub initial: f64,
    /// energy spent scanning for neighbours, per second (at most once per update)
    pub scan_cost: f64,
    /// energy spent per second while sending or receiving
    pub transmit_cost: f64,
    /// energy spent answering the discovery of a new neighbour
    pub scan_response_cost: f64,
    /// no energy is consumed before this point of the simulation
    pub warmup: Duration,
}

/// Remaining energy of a host.
///
/// The level only ever decreases and never goes below zero. Routers use
/// the [`Energy::remaining_ratio`] to decide whether to go into rescue
/// mode and refuse incoming messages once the battery is empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Energy {
    config: EnergyConfig,
    level: f64,
    last_update: SimTime,
}

impl EnergyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::check_positive("Energy.initialEnergy", self.initial)?;
        ConfigError::check_non_negative("Energy.scanEnergy", self.scan_cost)?;
        ConfigError::check_non_negative("Energy.transmitEnergy", self.transmit_cost)?;
        ConfigError::check_non_negative("Energy.scanResponseEnergy", self.scan_response_cost)?;
        Ok(())
    }
}

impl Energy {
    /// a full battery
    ///
    /// ```
    /// # use dtnsim_core::measure::{Energy, EnergyConfig};
    /// # use std::time::Duration;
    /// let energy = Energy::new(EnergyConfig {
    ///     initial: 100.0,
    ///     scan_cost: 0.1,
    ///     transmit_cost: 0.2,
    ///     scan_response_cost: 0.1,
    ///     warmup: Duration::ZERO,
    /// })
    /// .unwrap();
    /// assert_eq!(energy.remaining_ratio(), 1.0);
    /// ```
    pub fn new(config: EnergyConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            level: config.initial,
            config,
            last_update: SimTime::ZERO,
        })
    }

    #[inline]
    pub fn level(&self) -> f64 {
        self.level
    }

    #[inline]
    pub fn is_depleted(&self) -> bool {
        self.level <= 0.0
    }

    /// remaining energy as a fraction of the initial energy, in `[0, 1]`
    pub fn remaining_ratio(&self) -> f64 {
        self.level / self.config.initial
    }

    /// a fresh battery with the same settings
    #[must_use]
    pub fn replicate(&self) -> Self {
        Self {
            config: self.config.clone(),
            level: self.config.initial,
            last_update: SimTime::ZERO,
        }
    }

    /// account for the time elapsed since the last update
    pub fn update(&mut self, now: SimTime, transmitting: bool) {
        let delta = now.secs_since(self.last_update);
        self.last_update = now;

        if transmitting {
            self.reduce(now, delta * self.config.transmit_cost);
        }
        self.reduce(now, self.config.scan_cost * delta.min(1.0));
    }

    /// account for answering the discovery of a new neighbour
    pub fn on_discovery(&mut self, now: SimTime) {
        self.reduce(now, self.config.scan_response_cost);
    }

    fn reduce(&mut self, now: SimTime, amount: f64) {
        if now.as_secs() < self.config.warmup.as_secs_f64() {
            return;
        }
        self.level = (self.level - amount).max(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EnergyConfig {
        EnergyConfig {
            initial: 10.0,
            scan_cost: 0.5,
            transmit_cost: 1.0,
            scan_response_cost: 2.0,
            warmup: Duration::ZERO,
        }
    }

    #[test]
    fn invalid_initial_energy() {
        let Err(error) = Energy::new(EnergyConfig {
            initial: 0.0,
            ..config()
        }) else {
            panic!("a battery cannot start empty")
        };
        assert!(matches!(error, ConfigError::NotPositive { .. }));
    }

    #[test]
    fn transmitting_costs_more() {
        let mut idle = Energy::new(config()).unwrap();
        let mut busy = idle.clone();

        idle.update(SimTime::from_secs(2.0), false);
        busy.update(SimTime::from_secs(2.0), true);

        assert_eq!(idle.level(), 9.5);
        assert_eq!(busy.level(), 7.5);
    }

    #[test]
    fn never_below_zero() {
        let mut energy = Energy::new(config()).unwrap();
        for _ in 0..10 {
            energy.on_discovery(SimTime::ZERO);
        }

        assert_eq!(energy.level(), 0.0);
        assert!(energy.is_depleted());
        assert_eq!(energy.remaining_ratio(), 0.0);
    }

    #[test]
    fn warmup_is_free() {
        let mut energy = Energy::new(EnergyConfig {
            warmup: Duration::from_secs(100),
            ..config()
        })
        .unwrap();

        energy.update(SimTime::from_secs(50.0), true);
        energy.on_discovery(SimTime::from_secs(50.0));

        assert_eq!(energy.remaining_ratio(), 1.0);
    }

    #[test]
    fn replicate_is_full() {
        let mut energy = Energy::new(config()).unwrap();
        energy.on_discovery(SimTime::ZERO);

        assert_eq!(energy.replicate().level(), 10.0);
    }
}
