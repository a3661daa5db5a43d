//! Rating mechanisms a router keeps about its surroundings.
//!
//! * [`DeliveryPredictability`]: how likely this host is to meet another;
//! * [`ReplicationsDensity`]: how widespread each buffered message is;
//! * [`EncounterValue`]: how social this host is.
//!
//! The three are owned together by a router through [`Ratings`]. They are
//! never shared between hosts: replicating a router creates fresh tables
//! with the same constants.

mod delivery;
mod density;
mod encounter;
mod window;

use crate::{
    error::{ConfigError, UsageError},
    host::HostId,
    message::{Message, MessageId},
    time::SimTime,
};

pub use self::{
    delivery::{DeliveryPredictability, DeliveryPredictabilityConfig},
    density::{ReplicationsDensity, ReplicationsDensityConfig, UNKNOWN_REPLICATIONS_DENSITY},
    encounter::{EncounterValue, EncounterValueConfig},
    window::Window,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RatingsConfig {
    pub delivery_predictability: DeliveryPredictabilityConfig,
    pub replications_density: ReplicationsDensityConfig,
    pub encounter_value: EncounterValueConfig,
}

/// The rating tables of one host.
#[derive(Debug, Clone, PartialEq)]
pub struct Ratings {
    delivery_predictability: DeliveryPredictability,
    replications_density: ReplicationsDensity,
    encounter_value: EncounterValue,
}

impl Ratings {
    pub fn new(config: RatingsConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            delivery_predictability: DeliveryPredictability::new(config.delivery_predictability)?,
            replications_density: ReplicationsDensity::new(config.replications_density)?,
            encounter_value: EncounterValue::new(config.encounter_value)?,
        })
    }

    #[must_use]
    pub fn attach(mut self, host: HostId) -> Self {
        self.delivery_predictability = self.delivery_predictability.attach(host);
        self
    }

    /// empty tables with the same constants
    #[must_use]
    pub fn replicate(&self) -> Self {
        Self {
            delivery_predictability: self.delivery_predictability.replicate(),
            replications_density: self.replications_density.replicate(),
            encounter_value: self.encounter_value.replicate(),
        }
    }

    #[inline]
    pub fn delivery_predictability(&self) -> &DeliveryPredictability {
        &self.delivery_predictability
    }

    #[inline]
    pub fn replications_density(&self) -> &ReplicationsDensity {
        &self.replications_density
    }

    #[inline]
    pub fn encounter_value(&self) -> &EncounterValue {
        &self.encounter_value
    }

    /// changes whenever any of the three tables changes
    ///
    /// Values derived from the ratings can be cached as long as the
    /// version stays the same.
    pub fn version(&self) -> u64 {
        self.delivery_predictability.version()
            + self.replications_density.version()
            + self.encounter_value.version()
    }

    /// delivery predictability of the message, see
    /// [`DeliveryPredictability::predictability`]
    pub fn predictability(&self, message: &Message) -> Result<f64, UsageError> {
        self.delivery_predictability.predictability(message)
    }

    /// replications density of the message, see
    /// [`ReplicationsDensity::density`]
    pub fn density(&self, message: &Message) -> Result<f64, UsageError> {
        self.replications_density.density(message.id())
    }

    /// how social `other` is compared to this host, see
    /// [`EncounterValue::ratio`]
    pub fn encounter_ratio(&self, other: &Ratings) -> f64 {
        self.encounter_value.ratio(other.encounter_value.value())
    }

    /// update the delivery predictabilities of two hosts meeting each other
    pub fn meet(a: &mut Self, b: &mut Self, now: SimTime) {
        DeliveryPredictability::update_both_sides(
            &mut a.delivery_predictability,
            &mut b.delivery_predictability,
            now,
        );
    }

    /// account for the encounter of `host`, holding the messages `buffered`
    pub(crate) fn add_encounter<'a>(
        &mut self,
        host: HostId,
        buffered: impl IntoIterator<Item = &'a MessageId>,
    ) {
        self.encounter_value.add_encounter();
        self.replications_density.add_encounter(host, buffered);
    }

    pub(crate) fn track(&mut self, message: &Message) {
        self.replications_density.add_message(message.id());
    }

    pub(crate) fn untrack(&mut self, message: &MessageId) {
        self.replications_density.remove_message(message);
    }

    /// end the windows that elapsed by `now`
    pub fn update(&mut self, now: SimTime) {
        self.encounter_value.update(now);
        self.replications_density.update(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ratings(host: u64) -> Ratings {
        Ratings::new(RatingsConfig::default())
            .unwrap()
            .attach(HostId::new(host))
    }

    #[test]
    fn encounters_change_the_version() {
        let mut a = ratings(1);
        let mut b = ratings(2);
        let version = a.version();

        Ratings::meet(&mut a, &mut b, SimTime::from_secs(1.0));
        assert_ne!(a.version(), version);

        let version = a.version();
        a.add_encounter(HostId::new(2), std::iter::empty());
        a.update(SimTime::from_secs(3600.0));
        assert_ne!(a.version(), version);
    }

    #[test]
    fn replicas_do_not_share_tables() {
        let mut a = ratings(1);
        let mut b = ratings(2);
        let copy = a.replicate().attach(HostId::new(3));

        Ratings::meet(&mut a, &mut b, SimTime::from_secs(1.0));

        assert!(a.delivery_predictability().get(HostId::new(2)) > 0.0);
        assert_eq!(copy.delivery_predictability().get(HostId::new(2)), 0.0);
    }
}
