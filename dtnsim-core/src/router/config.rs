use super::{
    chooser::{ChooserKind, RescueConfig, UtilityConfig},
    eviction::EvictionConfig,
    prioritization::PrioritizationConfig,
};
use crate::{
    defaults::{
        DEFAULT_BUFFER_SIZE, DEFAULT_HISTORY_SIZE, DEFAULT_MESSAGE_ORDERING_INTERVAL,
        DEFAULT_POWER_THRESHOLD,
    },
    error::ConfigError,
    measure::EnergyConfig,
    rating::RatingsConfig,
};
use std::time::Duration;

/// Settings of a [`Router`] and of all its components.
///
/// Every component validates its own part when the router is built, so
/// an invalid configuration never produces a router.
///
/// [`Router`]: super::Router
#[derive(Debug, Clone, PartialEq)]
pub struct RouterConfig {
    /// capacity of the message buffer, in bytes
    pub buffer_size: u64,
    pub ratings: RatingsConfig,
    pub eviction: EvictionConfig,
    pub prioritization: PrioritizationConfig,
    /// chooser used while the host has enough energy
    pub chooser: ChooserKind,
    pub utility: UtilityConfig,
    pub rescue: RescueConfig,
    /// below this remaining energy ratio the router uses its rescue chooser
    pub power_threshold: f64,
    /// the non-direct messages are re-chosen and re-ordered at this interval
    pub message_ordering_interval: Duration,
    /// number of `(message, neighbour)` pairs remembered as sent
    pub history_size: usize,
    /// drop a message once it was handed over to its final recipient
    pub delete_delivered: bool,
    /// battery of the host, `None` for a host with unlimited energy
    pub energy: Option<EnergyConfig>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            ratings: RatingsConfig::default(),
            eviction: EvictionConfig::default(),
            prioritization: PrioritizationConfig::default(),
            chooser: ChooserKind::default(),
            utility: UtilityConfig::default(),
            rescue: RescueConfig::default(),
            power_threshold: DEFAULT_POWER_THRESHOLD,
            message_ordering_interval: DEFAULT_MESSAGE_ORDERING_INTERVAL,
            history_size: DEFAULT_HISTORY_SIZE,
            delete_delivered: false,
            energy: None,
        }
    }
}

impl RouterConfig {
    /// check the settings owned by the router itself
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::check_unit("DisasterRouter.powerThreshold", self.power_threshold)?;
        if let Some(energy) = &self.energy {
            energy.validate()?;
        }
        Ok(())
    }
}
