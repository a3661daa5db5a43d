use super::Candidate;
use crate::{
    cache::Cache,
    connection::ConnectionId,
    defaults::{
        DEFAULT_HEAD_START_THRESHOLD, DEFAULT_PRIORITIZATION_DP_WEIGHT, DEFAULT_PRIORITY_THRESHOLD,
    },
    error::{ConfigError, UsageError},
    host::HostId,
    message::{Message, MessageId, MessageKind},
    rating::Ratings,
    time::SimTime,
};
use std::time::Duration;
use tracing::trace;

#[derive(Debug, Clone, PartialEq)]
pub struct PrioritizationConfig {
    /// weight of the neighbour's delivery predictability against the
    /// replications density, in `[0, 1]`
    pub dp_weight: f64,
    /// messages created that recently are sent before older ones
    pub head_start_threshold: Duration,
    /// messages with at least this priority are sent before the others
    pub priority_threshold: u32,
}

impl Default for PrioritizationConfig {
    fn default() -> Self {
        Self {
            dp_weight: DEFAULT_PRIORITIZATION_DP_WEIGHT,
            head_start_threshold: DEFAULT_HEAD_START_THRESHOLD,
            priority_threshold: DEFAULT_PRIORITY_THRESHOLD,
        }
    }
}

/// Baseline order of the candidates: highest value first.
///
/// ```text
/// value = w·DP(neighbour, m) + (1 − w)·(1 − RD(m))
/// ```
///
/// Data messages are valued by their utility. Broadcasts have no value,
/// they are always sent through the direct path.
#[derive(Debug, Clone)]
pub struct Prioritization {
    dp_weight: f64,
    values: Cache<(MessageId, ConnectionId), f64>,
}

/// Full send order of the non-direct candidates.
///
/// 1. candidates with a priority at or above the priority threshold, by
///    priority, highest first;
/// 2. the others, in the [`Prioritization`] order.
///
/// Non-data messages created within the head start threshold are then
/// moved right before the first non-data candidate, newest first.
#[derive(Debug, Clone)]
pub struct PrioritizationStrategy {
    head_start_threshold: f64,
    priority_threshold: u32,
    baseline: Prioritization,
}

impl Prioritization {
    pub fn new(dp_weight: f64) -> Result<Self, ConfigError> {
        let dp_weight = ConfigError::check_unit("DisasterPrioritization.dpWeight", dp_weight)?;
        Ok(Self {
            dp_weight,
            values: Cache::new(),
        })
    }

    #[must_use]
    pub fn replicate(&self) -> Self {
        Self {
            dp_weight: self.dp_weight,
            values: Cache::new(),
        }
    }

    #[inline]
    pub fn dp_weight(&self) -> f64 {
        self.dp_weight
    }

    #[inline]
    pub fn rd_weight(&self) -> f64 {
        1.0 - self.dp_weight
    }

    /// value of sending `candidate` to a neighbour with the ratings `neighbour`
    pub fn value(
        &mut self,
        now: SimTime,
        own: &Ratings,
        candidate: &Candidate,
        neighbour: &Ratings,
    ) -> Result<f64, UsageError> {
        self.values.validate(now, own.version());

        let key = (candidate.message.id().clone(), candidate.connection);
        let dp_weight = self.dp_weight;
        let message = &candidate.message;
        self.values
            .get_or_try_insert_with(key, neighbour.version(), || match message.kind() {
                MessageKind::Data { item, .. } => Ok(item.utility),
                MessageKind::Broadcast => Err(UsageError::BroadcastCandidate {
                    id: message.id().clone(),
                }),
                MessageKind::OneToOne { .. } | MessageKind::Multicast { .. } => {
                    let dp = neighbour.predictability(message)?;
                    let rd = own.density(message)?;
                    Ok(dp_weight * dp + (1.0 - dp_weight) * (1.0 - rd))
                }
            })
    }

    /// sort `candidates` by value, highest first
    ///
    /// `neighbour` gives the ratings of the host at the other end of a
    /// candidate's connection. Candidates toward unknown hosts are dropped.
    pub fn sort<'r>(
        &mut self,
        now: SimTime,
        own: &Ratings,
        candidates: Vec<Candidate>,
        neighbour: impl Fn(HostId) -> Option<&'r Ratings>,
    ) -> Result<Vec<Candidate>, UsageError> {
        let mut valued = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let Some(ratings) = neighbour(candidate.peer) else {
                trace!(peer = %candidate.peer, message = %candidate.message, "no ratings for candidate");
                continue;
            };
            let value = self.value(now, own, &candidate, ratings)?;
            valued.push((value, candidate));
        }

        valued.sort_by(|(a, _), (b, _)| b.total_cmp(a));
        Ok(valued.into_iter().map(|(_, candidate)| candidate).collect())
    }
}

impl PrioritizationStrategy {
    pub fn new(config: &PrioritizationConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            head_start_threshold: config.head_start_threshold.as_secs_f64(),
            priority_threshold: config.priority_threshold,
            baseline: Prioritization::new(config.dp_weight)?,
        })
    }

    #[must_use]
    pub fn replicate(&self) -> Self {
        Self {
            head_start_threshold: self.head_start_threshold,
            priority_threshold: self.priority_threshold,
            baseline: self.baseline.replicate(),
        }
    }

    #[inline]
    pub fn baseline(&self) -> &Prioritization {
        &self.baseline
    }

    #[inline]
    pub fn priority_threshold(&self) -> u32 {
        self.priority_threshold
    }

    pub fn head_start_threshold(&self) -> Duration {
        Duration::from_secs_f64(self.head_start_threshold)
    }

    pub fn is_head_start(&self, now: SimTime, message: &Message) -> bool {
        !message.is_data() && now.secs_since(message.created()) <= self.head_start_threshold
    }

    pub fn sort_messages<'r>(
        &mut self,
        now: SimTime,
        own: &Ratings,
        candidates: Vec<Candidate>,
        neighbour: impl Fn(HostId) -> Option<&'r Ratings>,
    ) -> Result<Vec<Candidate>, UsageError> {
        let mut head_start = Vec::new();
        let mut important = Vec::new();
        let mut others = Vec::new();
        for candidate in candidates {
            if self.is_head_start(now, &candidate.message) {
                head_start.push(candidate);
            } else if candidate.message.priority() >= self.priority_threshold {
                important.push(candidate);
            } else {
                others.push(candidate);
            }
        }

        let others = self.baseline.sort(now, own, others, neighbour)?;

        important.sort_by_key(|candidate| std::cmp::Reverse(candidate.message.priority()));
        let mut sorted = important;
        sorted.extend(others);

        head_start.sort_by(|a, b| {
            b.message
                .created()
                .as_secs()
                .total_cmp(&a.message.created().as_secs())
        });
        let index = sorted
            .iter()
            .position(|candidate| !candidate.message.is_data())
            .unwrap_or(sorted.len());
        sorted.splice(index..index, head_start);

        Ok(sorted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{message::DataItem, rating::RatingsConfig};

    const OWN: HostId = HostId::new(1);
    const NEIGHBOUR: HostId = HostId::new(2);
    const OFTEN_MET: HostId = HostId::new(10);
    const ONCE_MET: HostId = HostId::new(11);
    const NEVER_MET: HostId = HostId::new(12);

    const HEAD_START: f64 = 30.0;
    const NOW: f64 = 100.0;

    fn ratings(host: HostId) -> Ratings {
        Ratings::new(RatingsConfig::default()).unwrap().attach(host)
    }

    /// a neighbour with DP(OFTEN_MET) = 0.9375, DP(ONCE_MET) = 0.75
    fn neighbour() -> Ratings {
        let mut neighbour = ratings(NEIGHBOUR);
        let mut often = ratings(OFTEN_MET);
        let mut once = ratings(ONCE_MET);
        Ratings::meet(&mut neighbour, &mut often, SimTime::ZERO);
        Ratings::meet(&mut neighbour, &mut often, SimTime::ZERO);
        Ratings::meet(&mut neighbour, &mut once, SimTime::ZERO);
        neighbour
    }

    fn connection() -> ConnectionId {
        ConnectionId::new((OWN, NEIGHBOUR))
    }

    fn candidate(message: Message) -> Candidate {
        Candidate {
            message,
            connection: connection(),
            peer: NEIGHBOUR,
        }
    }

    fn one_to_one(id: &str, to: HostId, created: f64) -> Candidate {
        candidate(
            Message::builder(id)
                .from(OWN)
                .to(to)
                .size(10)
                .created(SimTime::from_secs(created))
                .build()
                .unwrap(),
        )
    }

    fn data(item: u64, utility: f64) -> Candidate {
        candidate(Message::data(
            OWN,
            NEIGHBOUR,
            DataItem {
                id: item,
                size: 10,
                utility,
                modified: SimTime::ZERO,
            },
            SimTime::from_secs(NOW),
        ))
    }

    fn strategy(dp_weight: f64) -> PrioritizationStrategy {
        PrioritizationStrategy::new(&PrioritizationConfig {
            dp_weight,
            head_start_threshold: Duration::from_secs_f64(HEAD_START),
            priority_threshold: 4,
        })
        .unwrap()
    }

    fn ids(candidates: &[Candidate]) -> Vec<&str> {
        candidates
            .iter()
            .map(|candidate| candidate.message.id().as_str())
            .collect()
    }

    fn sort(strategy: &mut PrioritizationStrategy, candidates: Vec<Candidate>) -> Vec<Candidate> {
        let mut own = ratings(OWN);
        for candidate in &candidates {
            own.track(&candidate.message);
        }
        let neighbour = neighbour();
        strategy
            .sort_messages(SimTime::from_secs(NOW), &own, candidates, |host| {
                (host == NEIGHBOUR).then_some(&neighbour)
            })
            .unwrap()
    }

    // ------------------------------------------------------------------
    // configuration
    // ------------------------------------------------------------------

    #[test]
    fn dp_weight_in_unit_interval() {
        let Err(error) = Prioritization::new(1.2) else {
            panic!("weight above 1 should be refused")
        };
        assert!(matches!(error, ConfigError::OutOfRange { .. }));

        let prioritization = Prioritization::new(0.8).unwrap();
        assert!((prioritization.rd_weight() - 0.2).abs() < 1e-12);
    }

    // ------------------------------------------------------------------
    // baseline
    // ------------------------------------------------------------------

    #[test]
    fn value_is_weighted_sum() {
        let mut own = ratings(OWN);
        let neighbour = neighbour();
        let candidate = one_to_one("M1", ONCE_MET, 0.0);
        own.track(&candidate.message);

        let mut prioritization = Prioritization::new(0.8).unwrap();
        let value = prioritization
            .value(SimTime::ZERO, &own, &candidate, &neighbour)
            .unwrap();

        assert!((value - (0.8 * 0.75 + 0.2 * 0.5)).abs() < 1e-12);
    }

    #[test]
    fn broadcast_cannot_be_valued() {
        let own = ratings(OWN);
        let neighbour = neighbour();
        let broadcast = candidate(
            Message::builder("B1")
                .from(OWN)
                .broadcast()
                .size(1)
                .build()
                .unwrap(),
        );

        let mut prioritization = Prioritization::new(0.8).unwrap();
        let Err(error) = prioritization.value(SimTime::ZERO, &own, &broadcast, &neighbour) else {
            panic!("broadcasts have no value")
        };
        assert!(matches!(error, UsageError::BroadcastCandidate { .. }));
    }

    #[test]
    fn neighbour_changes_refresh_the_value() {
        let mut own = ratings(OWN);
        let mut neighbour = neighbour();
        let candidate = data(1, 0.5);
        let message = one_to_one("M1", NEVER_MET, 0.0);
        own.track(&message.message);

        let mut prioritization = Prioritization::new(1.0).unwrap();
        let before = prioritization
            .value(SimTime::ZERO, &own, &message, &neighbour)
            .unwrap();
        assert_eq!(before, 0.0);
        assert_eq!(
            prioritization
                .value(SimTime::ZERO, &own, &candidate, &neighbour)
                .unwrap(),
            0.5
        );

        let mut never = ratings(NEVER_MET);
        Ratings::meet(&mut neighbour, &mut never, SimTime::ZERO);

        let after = prioritization
            .value(SimTime::ZERO, &own, &message, &neighbour)
            .unwrap();
        assert!(after > before);
    }

    // ------------------------------------------------------------------
    // strategy
    // ------------------------------------------------------------------

    fn mixed() -> Vec<Candidate> {
        vec![
            one_to_one("M3", NEVER_MET, 0.0),
            data(2, 0.8),
            one_to_one("M2", ONCE_MET, 0.0),
            one_to_one("M1", OFTEN_MET, 0.0),
            data(1, 1.0),
        ]
    }

    #[test]
    fn baseline_order() {
        let sorted = sort(&mut strategy(1.0), mixed());
        assert_eq!(ids(&sorted), ["D1", "M1", "D2", "M2", "M3"]);
    }

    #[test]
    fn head_start_goes_before_first_non_data_message() {
        let mut candidates = mixed();
        candidates[0] = one_to_one("M3", NEVER_MET, NOW - HEAD_START);

        let sorted = sort(&mut strategy(1.0), candidates);
        assert_eq!(ids(&sorted), ["D1", "M3", "M1", "D2", "M2"]);
    }

    #[test]
    fn newest_head_start_first() {
        let candidates = vec![
            one_to_one("M1", OFTEN_MET, NOW - 20.0),
            one_to_one("M2", NEVER_MET, NOW - 5.0),
            one_to_one("M3", ONCE_MET, 0.0),
        ];

        let sorted = sort(&mut strategy(1.0), candidates);
        assert_eq!(ids(&sorted), ["M2", "M1", "M3"]);
    }

    #[test]
    fn important_messages_lead_by_priority() {
        let mut important = one_to_one("P1", NEVER_MET, 0.0);
        important.message = Message::builder("P1")
            .from(OWN)
            .to(NEVER_MET)
            .size(10)
            .priority(5)
            .build()
            .unwrap();
        let mut more_important = one_to_one("P2", NEVER_MET, 0.0);
        more_important.message = Message::builder("P2")
            .from(OWN)
            .to(NEVER_MET)
            .size(10)
            .priority(9)
            .build()
            .unwrap();

        let mut candidates = mixed();
        candidates.push(important);
        candidates.push(more_important);

        let sorted = sort(&mut strategy(1.0), candidates);
        assert_eq!(ids(&sorted), ["P2", "P1", "D1", "M1", "D2", "M2", "M3"]);
    }

    #[test]
    fn candidates_of_unknown_neighbours_are_dropped() {
        let mut candidates = mixed();
        candidates[1].peer = HostId::new(77);

        let sorted = sort(&mut strategy(1.0), candidates);
        assert_eq!(ids(&sorted), ["D1", "M1", "M2", "M3"]);
    }
}
