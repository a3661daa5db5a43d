use super::{Context, MessageChooser, available, is_offerable, wrap_data};
use crate::{
    defaults::{DEFAULT_RESCUE_POWER_THRESHOLD, DEFAULT_SHORT_TIMESPAN_THRESHOLD},
    error::{ConfigError, UsageError},
    router::{Candidate, Neighbor},
};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct RescueConfig {
    /// neighbours below this remaining energy ratio get nothing
    pub power_threshold: f64,
    /// only data modified within this timespan is shared
    pub short_timespan_threshold: Duration,
}

impl Default for RescueConfig {
    fn default() -> Self {
        Self {
            power_threshold: DEFAULT_RESCUE_POWER_THRESHOLD,
            short_timespan_threshold: DEFAULT_SHORT_TIMESPAN_THRESHOLD,
        }
    }
}

/// Chooser of a host running out of energy: hand everything over to the
/// neighbours that still have some energy, but only share recent data.
#[derive(Debug, Clone)]
pub struct RescueMode {
    power_threshold: f64,
    short_timespan_threshold: f64,
}

impl RescueMode {
    pub fn new(config: &RescueConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            power_threshold: ConfigError::check_unit(
                "RescueModeMessageChooser.powerThreshold",
                config.power_threshold,
            )?,
            short_timespan_threshold: config.short_timespan_threshold.as_secs_f64(),
        })
    }

    #[inline]
    pub fn power_threshold(&self) -> f64 {
        self.power_threshold
    }

    pub fn short_timespan_threshold(&self) -> Duration {
        Duration::from_secs_f64(self.short_timespan_threshold)
    }
}

impl MessageChooser for RescueMode {
    fn choose_non_direct_messages(
        &self,
        context: &Context<'_>,
        neighbors: &[Neighbor<'_>],
    ) -> Result<Vec<Candidate>, UsageError> {
        let mut chosen = Vec::new();
        for neighbor in available(neighbors) {
            if neighbor.energy_ratio() < self.power_threshold {
                continue;
            }
            chosen.extend(
                context
                    .messages
                    .iter()
                    .filter(|message| is_offerable(message, neighbor))
                    .map(|message| Candidate::new((*message).clone(), neighbor)),
            );
            let recent = context.data.iter().filter(|item| {
                context.now.secs_since(item.modified) <= self.short_timespan_threshold
            });
            chosen.extend(wrap_data(context, neighbor, recent));
        }
        Ok(chosen)
    }

    fn replicate(&self) -> Box<dyn MessageChooser> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        message::DataItem,
        rating::Ratings,
        router::chooser::tests::*,
        time::SimTime,
    };

    fn rescue() -> RescueMode {
        RescueMode::new(&RescueConfig {
            power_threshold: 0.3,
            short_timespan_threshold: Duration::from_secs(60),
        })
        .unwrap()
    }

    #[test]
    fn power_threshold_in_unit_interval() {
        let Err(error) = RescueMode::new(&RescueConfig {
            power_threshold: 1.5,
            ..RescueConfig::default()
        }) else {
            panic!("power threshold above 1 should be refused")
        };
        assert!(matches!(error, ConfigError::OutOfRange { .. }));
    }

    #[test]
    fn everything_to_strong_neighbors_only_recent_data() {
        let ratings = Ratings::new(Default::default()).unwrap().attach(OWN);
        let m1 = message("M1", OTHER);
        let items = [
            DataItem {
                id: 1,
                size: 5,
                utility: 0.1,
                modified: SimTime::from_secs(50.0),
            },
            DataItem {
                id: 2,
                size: 5,
                utility: 1.0,
                modified: SimTime::from_secs(10.0),
            },
        ];
        let context = Context {
            host: OWN,
            now: SimTime::from_secs(100.0),
            ratings: &ratings,
            messages: vec![&m1],
            data: &items,
        };

        let strong = router_with_energy(PEER, 0.9);
        let weak = router_with_energy(OTHER, 0.2);
        let to_strong = connection(PEER);
        let to_weak = connection(OTHER);

        let chosen = rescue()
            .choose_non_direct_messages(
                &context,
                &[neighbor(&to_strong, &strong), neighbor(&to_weak, &weak)],
            )
            .unwrap();
        assert_eq!(ids(&chosen), ["D1->h2", "M1->h2"]);
    }

    #[test]
    fn replica_keeps_settings() {
        let chooser = rescue();
        let replica = chooser.replicate();
        assert_eq!(format!("{chooser:?}"), format!("{replica:?}"));
    }
}
