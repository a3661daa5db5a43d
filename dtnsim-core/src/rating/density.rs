use super::Window;
use crate::{
    defaults::DEFAULT_RD_WINDOW,
    error::{ConfigError, UsageError},
    host::HostId,
    message::MessageId,
    time::SimTime,
};
use std::{
    collections::{BTreeMap, BTreeSet},
    time::Duration,
};
use tracing::trace;

/// density of a message nobody reported on yet
pub const UNKNOWN_REPLICATIONS_DENSITY: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct ReplicationsDensityConfig {
    pub window: Duration,
}

impl Default for ReplicationsDensityConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_RD_WINDOW,
        }
    }
}

/// Estimates, for every buffered message, the share of encountered
/// neighbours that already hold a copy of it.
///
/// During a window the set of distinct neighbours and, per tracked
/// message, the set of neighbours holding it are collected. When the
/// window ends the density of every tracked message that was ever seen
/// at a neighbour becomes `holders / neighbours`. A message no neighbour
/// has held yet keeps its density, and so does every message after a
/// window without any encounter.
///
/// Only messages registered with [`add_message`] are tracked: asking for
/// any other message is an error.
///
/// [`add_message`]: ReplicationsDensity::add_message
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicationsDensity {
    window: Window,
    densities: BTreeMap<MessageId, f64>,

    encountered: BTreeSet<HostId>,
    /// holders in the current window, keyed by every message ever seen
    /// at a neighbour
    holders: BTreeMap<MessageId, BTreeSet<HostId>>,

    version: u64,
}

impl ReplicationsDensity {
    pub fn new(config: ReplicationsDensityConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            window: Window::new("ReplicationsDensity.windowLength", config.window)?,
            densities: BTreeMap::new(),
            encountered: BTreeSet::new(),
            holders: BTreeMap::new(),
            version: 0,
        })
    }

    /// an empty estimator with the same window
    #[must_use]
    pub fn replicate(&self) -> Self {
        Self {
            window: self.window.clone(),
            densities: BTreeMap::new(),
            encountered: BTreeSet::new(),
            holders: BTreeMap::new(),
            version: 0,
        }
    }

    #[inline]
    pub fn window(&self) -> &Window {
        &self.window
    }

    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// start tracking `id`, keeps the current density if already tracked
    pub fn add_message(&mut self, id: &MessageId) {
        if !self.densities.contains_key(id) {
            self.densities
                .insert(id.clone(), UNKNOWN_REPLICATIONS_DENSITY);
            self.version += 1;
        }
    }

    pub fn remove_message(&mut self, id: &MessageId) {
        if self.densities.remove(id).is_some() {
            self.holders.remove(id);
            self.version += 1;
        }
    }

    pub fn is_tracked(&self, id: &MessageId) -> bool {
        self.densities.contains_key(id)
    }

    /// record the encounter of `host`, holding the messages `buffered`
    ///
    /// Meeting the same host twice in a window counts once, but messages
    /// it acquired in between are accounted for.
    pub fn add_encounter<'a>(
        &mut self,
        host: HostId,
        buffered: impl IntoIterator<Item = &'a MessageId>,
    ) {
        self.encountered.insert(host);
        for id in buffered {
            if self.densities.contains_key(id) {
                self.holders.entry(id.clone()).or_default().insert(host);
            }
        }
    }

    pub fn density(&self, id: &MessageId) -> Result<f64, UsageError> {
        self.densities
            .get(id)
            .copied()
            .ok_or_else(|| UsageError::UntrackedMessage { id: id.clone() })
    }

    /// fold the encounters of every window that ended at or before `now`
    pub fn update(&mut self, now: SimTime) {
        for _ in 0..self.window.advance(now) {
            self.end_window();
        }
    }

    fn end_window(&mut self) {
        if self.encountered.is_empty() {
            return;
        }

        let neighbours = self.encountered.len() as f64;
        for (id, density) in self.densities.iter_mut() {
            let Some(holders) = self.holders.get(id) else {
                continue;
            };
            *density = holders.len() as f64 / neighbours;
        }
        trace!(neighbours, tracked = self.densities.len(), "replications densities updated");

        self.encountered.clear();
        self.holders.values_mut().for_each(BTreeSet::clear);
        self.version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: f64 = 10.0;
    const DELTA: f64 = 1e-9;
    const NOTHING: [&MessageId; 0] = [];

    fn density() -> ReplicationsDensity {
        ReplicationsDensity::new(ReplicationsDensityConfig {
            window: Duration::from_secs_f64(WINDOW),
        })
        .unwrap()
    }

    fn id(id: &str) -> MessageId {
        MessageId::from(id)
    }

    fn host(id: u64) -> HostId {
        HostId::new(id)
    }

    fn assert_density(rd: &ReplicationsDensity, message: &str, expected: f64) {
        let actual = rd.density(&id(message)).unwrap();
        assert!(
            (actual - expected).abs() < DELTA,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn window_length_must_be_positive() {
        let Err(error) = ReplicationsDensity::new(ReplicationsDensityConfig {
            window: Duration::ZERO,
        }) else {
            panic!("zero window should be refused")
        };
        assert!(matches!(error, ConfigError::NotPositive { .. }));
    }

    #[test]
    fn untracked_message_is_an_error() {
        let Err(error) = density().density(&id("M1")) else {
            panic!("untracked message should be an error")
        };
        assert_eq!(error, UsageError::UntrackedMessage { id: id("M1") });
    }

    #[test]
    fn never_updated_message_is_one_half() {
        let mut rd = density();
        rd.add_message(&id("M1"));
        assert_density(&rd, "M1", UNKNOWN_REPLICATIONS_DENSITY);
    }

    #[test]
    fn removed_message_is_untracked() {
        let mut rd = density();
        rd.add_message(&id("M1"));
        rd.remove_message(&id("M1"));
        assert!(rd.density(&id("M1")).is_err());
    }

    #[test]
    fn adding_known_message_keeps_density() {
        let mut rd = density();
        rd.add_message(&id("M1"));
        rd.add_encounter(host(1), [&id("M1")]);
        rd.update(SimTime::from_secs(WINDOW));

        rd.add_message(&id("M1"));
        assert_density(&rd, "M1", 1.0);
    }

    #[test]
    fn update_waits_for_window_end() {
        let mut rd = density();
        rd.add_message(&id("M1"));
        rd.add_encounter(host(1), [&id("M1")]);

        rd.update(SimTime::from_secs(WINDOW - 0.1));
        assert_density(&rd, "M1", UNKNOWN_REPLICATIONS_DENSITY);

        rd.update(SimTime::from_secs(WINDOW));
        assert_density(&rd, "M1", 1.0);
    }

    #[test]
    fn share_of_neighbours_holding_the_message() {
        let mut rd = density();
        rd.add_message(&id("M1"));
        rd.add_message(&id("M2"));

        rd.add_encounter(host(1), NOTHING);
        rd.add_encounter(host(2), [&id("M1")]);
        rd.add_encounter(host(3), [&id("M1"), &id("M2")]);
        rd.update(SimTime::from_secs(WINDOW));

        assert_density(&rd, "M1", 2.0 / 3.0);
        assert_density(&rd, "M2", 1.0 / 3.0);
    }

    #[test]
    fn consecutive_windows_are_independent() {
        let mut rd = density();
        rd.add_message(&id("M1"));
        rd.add_encounter(host(1), [&id("M1")]);
        rd.update(SimTime::from_secs(WINDOW));

        rd.add_encounter(host(2), [&id("M1")]);
        rd.add_encounter(host(3), [&id("M1")]);
        rd.add_encounter(host(4), NOTHING);
        rd.update(SimTime::from_secs(2.0 * WINDOW));

        assert_density(&rd, "M1", 2.0 / 3.0);
    }

    #[test]
    fn isolated_window_keeps_densities() {
        let mut rd = density();
        rd.add_message(&id("M1"));
        rd.add_encounter(host(1), NOTHING);
        rd.add_encounter(host(2), [&id("M1")]);
        rd.update(SimTime::from_secs(WINDOW));

        rd.update(SimTime::from_secs(2.0 * WINDOW));
        assert_density(&rd, "M1", 0.5);
    }

    #[test]
    fn message_never_seen_at_a_neighbour_keeps_its_density() {
        let mut rd = density();
        rd.add_message(&id("M1"));
        rd.add_message(&id("M2"));
        rd.add_encounter(host(1), NOTHING);
        rd.add_encounter(host(2), [&id("M2")]);
        rd.update(SimTime::from_secs(WINDOW));

        assert_density(&rd, "M1", UNKNOWN_REPLICATIONS_DENSITY);
        assert_density(&rd, "M2", 0.5);
    }

    #[test]
    fn message_seen_before_drops_to_zero_without_holders() {
        let mut rd = density();
        rd.add_message(&id("M1"));
        rd.add_encounter(host(1), [&id("M1")]);
        rd.update(SimTime::from_secs(WINDOW));
        assert_density(&rd, "M1", 1.0);

        rd.add_encounter(host(2), NOTHING);
        rd.update(SimTime::from_secs(2.0 * WINDOW));
        assert_density(&rd, "M1", 0.0);
    }

    #[test]
    fn same_neighbour_counts_once() {
        let mut rd = density();
        rd.add_message(&id("M1"));
        rd.add_encounter(host(1), [&id("M1")]);
        rd.add_encounter(host(1), [&id("M1")]);
        rd.add_encounter(host(2), NOTHING);
        rd.add_encounter(host(3), NOTHING);
        rd.update(SimTime::from_secs(WINDOW));

        assert_density(&rd, "M1", 1.0 / 3.0);
    }

    #[test]
    fn neighbour_acquiring_the_message_counts() {
        let mut rd = density();
        rd.add_message(&id("M1"));
        rd.add_encounter(host(1), NOTHING);
        rd.add_encounter(host(1), [&id("M1")]);
        rd.update(SimTime::from_secs(WINDOW));

        assert_density(&rd, "M1", 1.0);
    }

    #[test]
    fn untracked_messages_of_neighbours_are_ignored() {
        let mut rd = density();
        rd.add_encounter(host(1), [&id("M1")]);
        rd.update(SimTime::from_secs(WINDOW));

        assert!(!rd.is_tracked(&id("M1")));
    }
}
