use crate::settings::{FromSettings, Settings};
use dtnsim_core::{defaults::DEFAULT_BANDWIDTH, error::ConfigError, measure::Bandwidth};
use std::time::Duration;

/// Random contacts between the hosts.
///
/// A new contact between two random hosts that are not already in contact
/// comes up every `interval` on average and lasts between `min_duration`
/// and `max_duration`.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactProcess {
    pub interval: Duration,
    pub min_duration: Duration,
    pub max_duration: Duration,
    pub bandwidth: Bandwidth,
}

/// Random one-to-one messages between the hosts.
#[derive(Debug, Clone, PartialEq)]
pub struct Workload {
    /// a message is created every `interval` on average
    pub interval: Duration,
    pub min_size: u64,
    pub max_size: u64,
    pub ttl: Option<Duration>,
    /// priorities are drawn in `0..=max_priority`
    pub max_priority: u32,
}

/// Everything a [`Simulation`] needs besides the router settings.
///
/// [`Simulation`]: crate::Simulation
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub hosts: usize,
    pub end_time: Duration,
    pub update_interval: Duration,
    pub seed: u64,
    pub contacts: ContactProcess,
    pub messages: Workload,
}

impl Default for ContactProcess {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            min_duration: Duration::from_secs(5),
            max_duration: Duration::from_secs(60),
            bandwidth: DEFAULT_BANDWIDTH,
        }
    }
}

impl Default for Workload {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            min_size: 50 * 1_024,
            max_size: 500 * 1_024,
            ttl: None,
            max_priority: 0,
        }
    }
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            hosts: 20,
            end_time: Duration::from_secs(3_600),
            update_interval: Duration::from_secs(1),
            seed: 0,
            contacts: ContactProcess::default(),
            messages: Workload::default(),
        }
    }
}

impl Scenario {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hosts < 2 {
            return Err(ConfigError::Invalid {
                name: "Scenario.nrofHosts".to_owned(),
                value: self.hosts.to_string(),
                reason: "at least 2 hosts are needed".to_owned(),
            });
        }
        ConfigError::check_positive(
            "Scenario.updateInterval",
            self.update_interval.as_secs_f64(),
        )?;
        ConfigError::check_positive("Contacts.interval", self.contacts.interval.as_secs_f64())?;
        ConfigError::check_positive("Events.interval", self.messages.interval.as_secs_f64())?;
        ConfigError::check_positive(
            "Contacts.bandwidth",
            self.contacts.bandwidth.bytes_per_sec() as f64,
        )?;
        if self.contacts.min_duration > self.contacts.max_duration {
            return Err(ConfigError::Invalid {
                name: "Contacts.minDuration".to_owned(),
                value: format!("{:?}", self.contacts.min_duration),
                reason: "longer than Contacts.maxDuration".to_owned(),
            });
        }
        if self.messages.min_size > self.messages.max_size {
            return Err(ConfigError::Invalid {
                name: "Events.minSize".to_owned(),
                value: self.messages.min_size.to_string(),
                reason: "larger than Events.maxSize".to_owned(),
            });
        }
        Ok(())
    }

    /// number of simulation steps until the end time
    pub fn steps(&self) -> u64 {
        (self.end_time.as_secs_f64() / self.update_interval.as_secs_f64()).ceil() as u64
    }
}

impl FromSettings for Scenario {
    fn from_settings(s: &Settings) -> Result<Self, ConfigError> {
        let default = Scenario::default();
        let contacts = default.contacts;
        let messages = default.messages;

        let scenario = Self {
            hosts: s.get_or("Scenario.nrofHosts", default.hosts)?,
            end_time: s.duration_or("Scenario.endTime", default.end_time)?,
            update_interval: s.duration_or("Scenario.updateInterval", default.update_interval)?,
            seed: s.get_or("Scenario.seed", default.seed)?,
            contacts: ContactProcess {
                interval: s.duration_or("Contacts.interval", contacts.interval)?,
                min_duration: s.duration_or("Contacts.minDuration", contacts.min_duration)?,
                max_duration: s.duration_or("Contacts.maxDuration", contacts.max_duration)?,
                bandwidth: s
                    .get_bandwidth("Contacts.bandwidth")?
                    .unwrap_or(contacts.bandwidth),
            },
            messages: Workload {
                interval: s.duration_or("Events.interval", messages.interval)?,
                min_size: s.size_or("Events.minSize", messages.min_size)?,
                max_size: s.size_or("Events.maxSize", messages.max_size)?,
                ttl: s.get_duration("Events.ttl")?.or(messages.ttl),
                max_priority: s.get_or("Events.maxPriority", messages.max_priority)?,
            },
        };
        scenario.validate()?;
        Ok(scenario)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        Scenario::default().validate().unwrap();
        assert_eq!(Scenario::default().steps(), 3_600);
    }

    #[test]
    fn from_settings() {
        let settings = Settings::parse(
            "Scenario.nrofHosts = 5
             Scenario.endTime = 10m
             Scenario.seed = 42
             Contacts.bandwidth = 1MBps
             Events.maxSize = 1M
             Events.ttl = 5m",
        )
        .unwrap();
        let scenario = Scenario::from_settings(&settings).unwrap();

        assert_eq!(scenario.hosts, 5);
        assert_eq!(scenario.end_time, Duration::from_secs(600));
        assert_eq!(scenario.seed, 42);
        assert_eq!(scenario.contacts.bandwidth, Bandwidth::new(1_024 * 1_024));
        assert_eq!(scenario.messages.max_size, 1_024 * 1_024);
        assert_eq!(scenario.messages.ttl, Some(Duration::from_secs(300)));
        assert_eq!(scenario.contacts.interval, ContactProcess::default().interval);
    }

    #[test]
    fn inconsistent_ranges() {
        let settings = Settings::parse("Contacts.minDuration = 2m\nContacts.maxDuration = 1m").unwrap();
        let Err(error) = Scenario::from_settings(&settings) else {
            panic!("contacts cannot be shorter than their minimum length")
        };
        assert!(matches!(error, ConfigError::Invalid { .. }), "{error}");

        let settings = Settings::parse("Scenario.nrofHosts = 1").unwrap();
        assert!(Scenario::from_settings(&settings).is_err());
    }
}
