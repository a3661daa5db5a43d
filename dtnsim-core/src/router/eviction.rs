use crate::{
    cache::Cache,
    defaults::{DEFAULT_AGE_THRESHOLD, DEFAULT_HOP_THRESHOLD},
    error::{ConfigError, UsageError},
    message::{Message, MessageId, MessageKind},
    rating::Ratings,
    time::SimTime,
};
use std::{cmp::Ordering, time::Duration};

/// Thresholds separating high rank messages from low rank ones.
///
/// Both are required, `None` is reported as a missing setting.
#[derive(Debug, Clone, PartialEq)]
pub struct EvictionConfig {
    pub hop_threshold: Option<u32>,
    pub age_threshold: Option<Duration>,
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self {
            hop_threshold: Some(DEFAULT_HOP_THRESHOLD),
            age_threshold: Some(DEFAULT_AGE_THRESHOLD),
        }
    }
}

/// Builder for a [`BufferComparator`].
#[derive(Debug, Clone, Default)]
pub struct BufferComparatorBuilder {
    hop_threshold: Option<u32>,
    age_threshold: Option<Duration>,
}

/// Orders buffered messages, the first one being the first to evict.
///
/// A message has a *high rank* while it did fewer hops than the hop
/// threshold and stayed in the buffer for less than the age threshold.
///
/// * low rank messages are evicted before high rank ones;
/// * among high rank messages, the one with the most hops goes first,
///   then the one received the earliest;
/// * among low rank messages, the least important goes first. Importance
///   is `1 − RD` for broadcasts, the delivery predictability for one-to-one
///   and multicast messages and the utility for data messages.
///
/// Remaining ties are broken by message identifier so the order is total.
///
/// Importance values are cached until the time or the ratings change.
#[derive(Debug, Clone)]
pub struct BufferComparator {
    hop_threshold: u32,
    age_threshold: f64,
    importance: Cache<MessageId, f64>,
}

#[derive(Debug, Clone, Copy)]
enum Rank {
    Low { importance: f64 },
    High { hops: u32, received: SimTime },
}

impl BufferComparatorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_hop_threshold(mut self, hop_threshold: u32) -> Self {
        self.hop_threshold = Some(hop_threshold);
        self
    }

    pub fn set_age_threshold(mut self, age_threshold: Duration) -> Self {
        self.age_threshold = Some(age_threshold);
        self
    }

    pub fn build(self) -> Result<BufferComparator, ConfigError> {
        let Some(hop_threshold) = self.hop_threshold else {
            return Err(ConfigError::Missing {
                name: "DisasterBufferComparator.hopThreshold".to_owned(),
            });
        };
        let Some(age_threshold) = self.age_threshold else {
            return Err(ConfigError::Missing {
                name: "DisasterBufferComparator.ageThreshold".to_owned(),
            });
        };

        Ok(BufferComparator {
            hop_threshold,
            age_threshold: age_threshold.as_secs_f64(),
            importance: Cache::new(),
        })
    }
}

impl BufferComparator {
    pub fn builder() -> BufferComparatorBuilder {
        BufferComparatorBuilder::new()
    }

    pub fn from_config(config: &EvictionConfig) -> Result<Self, ConfigError> {
        let mut builder = Self::builder();
        if let Some(hop_threshold) = config.hop_threshold {
            builder = builder.set_hop_threshold(hop_threshold);
        }
        if let Some(age_threshold) = config.age_threshold {
            builder = builder.set_age_threshold(age_threshold);
        }
        builder.build()
    }

    /// the same thresholds with an empty cache
    #[must_use]
    pub fn replicate(&self) -> Self {
        Self {
            hop_threshold: self.hop_threshold,
            age_threshold: self.age_threshold,
            importance: Cache::new(),
        }
    }

    #[inline]
    pub fn hop_threshold(&self) -> u32 {
        self.hop_threshold
    }

    pub fn age_threshold(&self) -> Duration {
        Duration::from_secs_f64(self.age_threshold)
    }

    pub fn has_high_rank(&self, now: SimTime, message: &Message) -> bool {
        message.hop_count() < self.hop_threshold
            && now.secs_since(message.received()) < self.age_threshold
    }

    /// compare two buffered messages, [`Ordering::Less`] if `a` is to be
    /// evicted before `b`
    pub fn compare(
        &mut self,
        now: SimTime,
        ratings: &Ratings,
        a: &Message,
        b: &Message,
    ) -> Result<Ordering, UsageError> {
        let rank_a = self.rank(now, ratings, a)?;
        let rank_b = self.rank(now, ratings, b)?;

        let ordering = match (rank_a, rank_b) {
            (Rank::Low { importance: a }, Rank::Low { importance: b }) => a.total_cmp(&b),
            (
                Rank::High {
                    hops: hops_a,
                    received: received_a,
                },
                Rank::High {
                    hops: hops_b,
                    received: received_b,
                },
            ) => hops_b
                .cmp(&hops_a)
                .then_with(|| received_a.as_secs().total_cmp(&received_b.as_secs())),
            (Rank::Low { .. }, Rank::High { .. }) => Ordering::Less,
            (Rank::High { .. }, Rank::Low { .. }) => Ordering::Greater,
        };

        Ok(ordering.then_with(|| a.id().cmp(b.id())))
    }

    /// the first message to evict among `messages`
    pub fn victim<'a>(
        &mut self,
        now: SimTime,
        ratings: &Ratings,
        messages: impl IntoIterator<Item = &'a Message>,
    ) -> Result<Option<&'a Message>, UsageError> {
        let mut victim: Option<&'a Message> = None;
        for message in messages {
            victim = match victim {
                Some(current)
                    if self.compare(now, ratings, current, message)? != Ordering::Greater =>
                {
                    Some(current)
                }
                _ => Some(message),
            };
        }
        Ok(victim)
    }

    fn rank(&mut self, now: SimTime, ratings: &Ratings, message: &Message) -> Result<Rank, UsageError> {
        if self.has_high_rank(now, message) {
            return Ok(Rank::High {
                hops: message.hop_count(),
                received: message.received(),
            });
        }

        self.importance.validate(now, ratings.version());
        let importance = self
            .importance
            .get_or_try_insert_with(message.id().clone(), 0, || {
                match message.kind() {
                    MessageKind::Broadcast => ratings.density(message).map(|density| 1.0 - density),
                    MessageKind::OneToOne { .. } | MessageKind::Multicast { .. } => {
                        ratings.predictability(message)
                    }
                    MessageKind::Data { item, .. } => Ok(item.utility),
                }
            })?;
        Ok(Rank::Low { importance })
    }
}
