//! Key/value settings files.
//!
//! ```text
//! # comments start with a hash
//! Scenario.nrofHosts = 40
//! DisasterRouter.powerThreshold = 0.1
//! DeliveryPredictability.dpTimeUnit = 2s
//! ```
//!
//! Every key is `Namespace.name`. Components read their own keys with the
//! typed getters and fall back to their defaults for the keys that are
//! not set.

use anyhow::{Context as _, Result, bail};
use dtnsim_core::{
    error::ConfigError,
    measure::{Bandwidth, EnergyConfig, parse_size},
    rating::{
        DeliveryPredictabilityConfig, EncounterValueConfig, RatingsConfig,
        ReplicationsDensityConfig,
    },
    router::{
        EvictionConfig, PrioritizationConfig, RouterConfig,
        chooser::{ChooserKind, RescueConfig, UtilityConfig},
    },
    time::parse_duration,
};
use std::{collections::BTreeMap, fmt, path::Path, str::FromStr, time::Duration};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    values: BTreeMap<String, String>,
}

/// Types that can be built from [`Settings`].
pub trait FromSettings: Sized {
    fn from_settings(settings: &Settings) -> Result<Self, ConfigError>;
}

impl FromStr for Settings {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Settings {
    pub fn parse(text: &str) -> Result<Self> {
        let mut values = BTreeMap::new();

        for (number, line) in text.lines().enumerate() {
            let line = line.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                bail!("line {}: expecting `Namespace.key = value', found `{line}'", number + 1)
            };
            let (key, value) = (key.trim(), value.trim());
            if !key.contains('.') {
                bail!("line {}: key `{key}' has no namespace", number + 1)
            }
            values.insert(key.to_owned(), value.to_owned());
        }

        Ok(Self { values })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid settings file {}", path.display()))
    }

    /// set `key` to `value`, replacing any previous value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    fn get_with<T, E: fmt::Display>(
        &self,
        key: &str,
        parse: impl FnOnce(&str) -> Result<T, E>,
    ) -> Result<Option<T>, ConfigError> {
        let Some(value) = self.get_str(key) else {
            return Ok(None);
        };
        parse(value).map(Some).map_err(|error| ConfigError::Invalid {
            name: key.to_owned(),
            value: value.to_owned(),
            reason: error.to_string(),
        })
    }

    /// the value of `key`, `None` if it is not set
    pub fn get<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.get_with(key, str::parse)
    }

    /// the value of `key`, `default` if it is not set
    pub fn get_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        Ok(self.get(key)?.unwrap_or(default))
    }

    pub fn require<T>(&self, key: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.get(key)?.ok_or_else(|| ConfigError::Missing {
            name: key.to_owned(),
        })
    }

    /// a duration such as `30s` or `1m 30s`
    pub fn get_duration(&self, key: &str) -> Result<Option<Duration>, ConfigError> {
        self.get_with(key, parse_duration)
    }

    pub fn duration_or(&self, key: &str, default: Duration) -> Result<Duration, ConfigError> {
        Ok(self.get_duration(key)?.unwrap_or(default))
    }

    /// a size in bytes, with an optional `k`, `M` or `G` (binary) suffix
    pub fn get_size(&self, key: &str) -> Result<Option<u64>, ConfigError> {
        self.get_with(key, parse_size)
    }

    pub fn size_or(&self, key: &str, default: u64) -> Result<u64, ConfigError> {
        Ok(self.get_size(key)?.unwrap_or(default))
    }

    pub fn get_bandwidth(&self, key: &str) -> Result<Option<Bandwidth>, ConfigError> {
        self.get(key)
    }
}

fn parse_chooser(s: &str) -> Result<ChooserKind> {
    match s {
        "epidemic" | "Epidemic" => Ok(ChooserKind::Epidemic),
        "utility" | "Utility" => Ok(ChooserKind::Utility),
        other => bail!("unknown message chooser `{other}', expecting `epidemic' or `utility'"),
    }
}

impl FromSettings for RatingsConfig {
    fn from_settings(s: &Settings) -> Result<Self, ConfigError> {
        let dp = DeliveryPredictabilityConfig::default();
        let rd = ReplicationsDensityConfig::default();
        let ev = EncounterValueConfig::default();

        Ok(Self {
            delivery_predictability: DeliveryPredictabilityConfig {
                summand: s.get_or("DeliveryPredictability.dpInit", dp.summand)?,
                gamma: s.get_or("DeliveryPredictability.dpGamma", dp.gamma)?,
                beta: s.get_or("DeliveryPredictability.dpBeta", dp.beta)?,
                time_unit: s.duration_or("DeliveryPredictability.dpTimeUnit", dp.time_unit)?,
            },
            replications_density: ReplicationsDensityConfig {
                window: s.duration_or("ReplicationsDensity.windowLength", rd.window)?,
            },
            encounter_value: EncounterValueConfig {
                aging_factor: s.get_or("EncounterValue.agingFactor", ev.aging_factor)?,
                window: s.duration_or("EncounterValue.windowLength", ev.window)?,
            },
        })
    }
}

impl FromSettings for EvictionConfig {
    fn from_settings(s: &Settings) -> Result<Self, ConfigError> {
        let default = EvictionConfig::default();
        Ok(Self {
            hop_threshold: s
                .get("DisasterBufferComparator.hopThreshold")?
                .or(default.hop_threshold),
            age_threshold: s
                .get_duration("DisasterBufferComparator.ageThreshold")?
                .or(default.age_threshold),
        })
    }
}

impl FromSettings for PrioritizationConfig {
    fn from_settings(s: &Settings) -> Result<Self, ConfigError> {
        let default = PrioritizationConfig::default();
        Ok(Self {
            dp_weight: s.get_or("DisasterPrioritization.dpWeight", default.dp_weight)?,
            head_start_threshold: s.duration_or(
                "DisasterPrioritization.headStartThreshold",
                default.head_start_threshold,
            )?,
            priority_threshold: s.get_or(
                "DisasterPrioritization.priorityThreshold",
                default.priority_threshold,
            )?,
        })
    }
}

impl FromSettings for UtilityConfig {
    fn from_settings(s: &Settings) -> Result<Self, ConfigError> {
        let default = UtilityConfig::default();
        Ok(Self {
            prophet_plus_weight: s.get_or(
                "UtilityMessageChooser.prophetPlusWeight",
                default.prophet_plus_weight,
            )?,
            dp_weight: s.get_or("UtilityMessageChooser.dpWeight", default.dp_weight)?,
            power_weight: s.get_or("UtilityMessageChooser.powerWeight", default.power_weight)?,
            rd_weight: s.get_or("UtilityMessageChooser.rdWeight", default.rd_weight)?,
            ev_weight: s.get_or("UtilityMessageChooser.evWeight", default.ev_weight)?,
            threshold: s.get_or(
                "UtilityMessageChooser.messageUtilityThreshold",
                default.threshold,
            )?,
            data_utility_threshold: s.get_or(
                "UtilityMessageChooser.dataUtilityThreshold",
                default.data_utility_threshold,
            )?,
            power_threshold: s.get_or(
                "UtilityMessageChooser.powerThreshold",
                default.power_threshold,
            )?,
        })
    }
}

impl FromSettings for RescueConfig {
    fn from_settings(s: &Settings) -> Result<Self, ConfigError> {
        let default = RescueConfig::default();
        Ok(Self {
            power_threshold: s.get_or(
                "RescueModeMessageChooser.powerThreshold",
                default.power_threshold,
            )?,
            short_timespan_threshold: s.duration_or(
                "RescueModeMessageChooser.shortTimespanThreshold",
                default.short_timespan_threshold,
            )?,
        })
    }
}

/// `None` unless `Energy.initialEnergy` is set
impl FromSettings for Option<EnergyConfig> {
    fn from_settings(s: &Settings) -> Result<Self, ConfigError> {
        let Some(initial) = s.get("Energy.initialEnergy")? else {
            return Ok(None);
        };
        Ok(Some(EnergyConfig {
            initial,
            scan_cost: s.get_or("Energy.scanEnergy", 0.0)?,
            transmit_cost: s.get_or("Energy.transmitEnergy", 0.0)?,
            scan_response_cost: s.get_or("Energy.scanResponseEnergy", 0.0)?,
            warmup: s.duration_or("Energy.energyWarmup", Duration::ZERO)?,
        }))
    }
}

impl FromSettings for RouterConfig {
    fn from_settings(s: &Settings) -> Result<Self, ConfigError> {
        let default = RouterConfig::default();
        let chooser = s
            .get_with("DisasterRouter.messageChooser", parse_chooser)?
            .unwrap_or(default.chooser);

        Ok(Self {
            buffer_size: s.size_or("DisasterRouter.bufferSize", default.buffer_size)?,
            ratings: RatingsConfig::from_settings(s)?,
            eviction: EvictionConfig::from_settings(s)?,
            prioritization: PrioritizationConfig::from_settings(s)?,
            chooser,
            utility: UtilityConfig::from_settings(s)?,
            rescue: RescueConfig::from_settings(s)?,
            power_threshold: s.get_or("DisasterRouter.powerThreshold", default.power_threshold)?,
            message_ordering_interval: s.duration_or(
                "DisasterRouter.messageOrderingInterval",
                default.message_ordering_interval,
            )?,
            history_size: s.get_or("DisasterRouter.historySize", default.history_size)?,
            delete_delivered: s.get_or("DisasterRouter.deleteDelivered", default.delete_delivered)?,
            energy: Option::<EnergyConfig>::from_settings(s)?,
        })
    }
}
