use crate::{
    defaults::{DEFAULT_DP_BETA, DEFAULT_DP_GAMMA, DEFAULT_DP_SUMMAND, DEFAULT_DP_TIME_UNIT},
    error::{ConfigError, UsageError},
    host::HostId,
    message::{Message, MessageKind},
    time::SimTime,
};
use std::{collections::BTreeMap, time::Duration};
use tracing::trace;

/// Constants of the [`DeliveryPredictability`] table.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryPredictabilityConfig {
    /// increment applied when meeting a host, in `[0, 1]`
    pub summand: f64,
    /// decay per time unit, in `[0, 1]`
    pub gamma: f64,
    /// weight of transitive updates, in `[0, 1]`
    pub beta: f64,
    /// length of a decay time unit, must be positive
    pub time_unit: Duration,
}

impl Default for DeliveryPredictabilityConfig {
    fn default() -> Self {
        Self {
            summand: DEFAULT_DP_SUMMAND,
            gamma: DEFAULT_DP_GAMMA,
            beta: DEFAULT_DP_BETA,
            time_unit: DEFAULT_DP_TIME_UNIT,
        }
    }
}

/// Per host table of the likelihood to eventually meet other hosts.
///
/// Values are kept in `[0, 1]`. They grow when the hosts meet (directly
/// or through a common neighbour) and decay with the time elapsed since
/// the previous contact. Decay is applied lazily, when the next contact
/// updates the table.
///
/// Meeting a host `B` at age `a` (time units since the last update):
///
/// ```text
/// DP(A,B) = old·γ^a + (1 − old·γ^a)·s
/// DP(A,C) = old·γ^a + (1 − old·γ^a)·DP(A,B)·DP(B,C)·β     for all C known by B
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryPredictability {
    summand: f64,
    gamma: f64,
    beta: f64,
    /// seconds in one time unit
    time_unit: f64,

    host: HostId,
    values: BTreeMap<HostId, f64>,
    last_update: SimTime,
    version: u64,
}

impl DeliveryPredictabilityConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::check_unit("DeliveryPredictability.dpInit", self.summand)?;
        ConfigError::check_unit("DeliveryPredictability.dpGamma", self.gamma)?;
        ConfigError::check_unit("DeliveryPredictability.dpBeta", self.beta)?;
        ConfigError::check_positive(
            "DeliveryPredictability.dpTimeUnit",
            self.time_unit.as_secs_f64(),
        )?;
        Ok(())
    }
}

impl DeliveryPredictability {
    /// create an empty table, not attached to any host yet
    pub fn new(config: DeliveryPredictabilityConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            summand: config.summand,
            gamma: config.gamma,
            beta: config.beta,
            time_unit: config.time_unit.as_secs_f64(),
            host: HostId::ZERO,
            values: BTreeMap::new(),
            last_update: SimTime::ZERO,
            version: 0,
        })
    }

    /// the same table for `host`
    #[must_use]
    pub fn attach(mut self, host: HostId) -> Self {
        self.host = host;
        self
    }

    /// an empty, unattached table with the same constants
    #[must_use]
    pub fn replicate(&self) -> Self {
        Self {
            summand: self.summand,
            gamma: self.gamma,
            beta: self.beta,
            time_unit: self.time_unit,
            host: HostId::ZERO,
            values: BTreeMap::new(),
            last_update: SimTime::ZERO,
            version: 0,
        }
    }

    #[inline]
    pub fn host(&self) -> HostId {
        self.host
    }

    /// bumped every time a value of the table changes
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// delivery predictability to `peer`, `0` for hosts never heard of
    pub fn get(&self, peer: HostId) -> f64 {
        self.values.get(&peer).copied().unwrap_or(0.0)
    }

    pub fn known_hosts(&self) -> impl Iterator<Item = HostId> + '_ {
        self.values.keys().copied()
    }

    /// delivery predictability of a message
    ///
    /// One-to-one messages use the predictability to their recipient,
    /// multicast messages the best predictability to any member of their
    /// group. It is undefined for broadcasts and data messages.
    pub fn predictability(&self, message: &Message) -> Result<f64, UsageError> {
        match message.kind() {
            MessageKind::OneToOne { to } => Ok(self.get(*to)),
            MessageKind::Multicast { group } => Ok(group
                .members()
                .map(|member| self.get(member))
                .fold(0.0, f64::max)),
            MessageKind::Broadcast | MessageKind::Data { .. } => {
                Err(UsageError::PredictabilityUndefined {
                    id: message.id().clone(),
                    kind: message.tag(),
                })
            }
        }
    }

    /// update the tables of two hosts meeting each other at `now`
    ///
    /// Both direct updates are applied before the transitive ones so each
    /// side uses the fresh predictability to the other.
    pub fn update_both_sides(a: &mut Self, b: &mut Self, now: SimTime) {
        a.update_on_contact(b.host, now);
        b.update_on_contact(a.host, now);
        a.update_transitive(b);
        b.update_transitive(a);
    }

    fn update_on_contact(&mut self, other: HostId, now: SimTime) {
        self.decay(now);

        let old = self.get(other);
        self.values.insert(other, old + (1.0 - old) * self.summand);
        self.last_update = now;
        self.version += 1;

        trace!(host = %self.host, peer = %other, dp = self.get(other), "direct predictability update");
    }

    fn update_transitive(&mut self, other: &Self) {
        let to_other = self.get(other.host);
        for (&known, &via_other) in &other.values {
            if known == self.host {
                continue;
            }
            let old = self.get(known);
            self.values
                .insert(known, old + (1.0 - old) * to_other * via_other * self.beta);
        }
        self.version += 1;
    }

    fn decay(&mut self, now: SimTime) {
        let age = now.secs_since(self.last_update) / self.time_unit;
        if age == 0.0 {
            return;
        }
        let decay = self.gamma.powf(age);
        for value in self.values.values_mut() {
            *value *= decay;
        }
    }
}
