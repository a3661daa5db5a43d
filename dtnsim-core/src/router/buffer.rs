use super::eviction::BufferComparator;
use crate::{
    error::UsageError,
    measure::Gauge,
    message::{Message, MessageId},
    rating::Ratings,
    time::SimTime,
};
use std::collections::BTreeMap;

/// The messages stored by a router, with their accounted size.
///
/// Insertion never fails: a message whose transfer was admitted lands
/// even if the buffer filled up in the meantime. Room is made beforehand,
/// at admission, with [`MessageBuffer::make_room`].
#[derive(Debug, Clone)]
pub struct MessageBuffer {
    messages: BTreeMap<MessageId, Message>,
    gauge: Gauge,
}

/// Outcome of [`MessageBuffer::make_room`].
#[derive(Debug, Default)]
pub struct Eviction {
    /// messages dropped to make room, in eviction order
    pub evicted: Vec<Message>,
    /// the requested size fits now
    pub fits: bool,
}

impl MessageBuffer {
    pub fn new(capacity: u64) -> Self {
        Self {
            messages: BTreeMap::new(),
            gauge: Gauge::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn capacity(&self) -> u64 {
        self.gauge.maximum_capacity()
    }

    pub fn set_capacity(&mut self, capacity: u64) {
        self.gauge.set_maximum_capacity(capacity);
    }

    #[inline]
    pub fn used(&self) -> u64 {
        self.gauge.used_capacity()
    }

    #[inline]
    pub fn free_space(&self) -> u64 {
        self.gauge.remaining_capacity()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.messages.contains_key(id)
    }

    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        self.messages.get(id)
    }

    /// buffered messages, by identifier
    pub fn iter(&self) -> impl Iterator<Item = &Message> + '_ {
        self.messages.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &MessageId> + '_ {
        self.messages.keys()
    }

    /// store `message`, replacing any message with the same identifier
    pub fn insert(&mut self, message: Message) {
        self.gauge.force_reserve(message.size());
        if let Some(previous) = self.messages.insert(message.id().clone(), message) {
            self.gauge.free(previous.size());
        }
    }

    pub fn remove(&mut self, id: &MessageId) -> Option<Message> {
        let message = self.messages.remove(id)?;
        self.gauge.free(message.size());
        Some(message)
    }

    /// remove and return the messages matching `predicate`
    pub fn drain_filter(&mut self, mut predicate: impl FnMut(&Message) -> bool) -> Vec<Message> {
        let ids: Vec<_> = self
            .messages
            .values()
            .filter(|message| predicate(message))
            .map(|message| message.id().clone())
            .collect();
        ids.iter().filter_map(|id| self.remove(id)).collect()
    }

    /// evict messages until `size` bytes are free
    ///
    /// Victims are picked with the `comparator`, among the messages for
    /// which `protected` is false. Nothing is evicted when `size` exceeds
    /// the capacity of the buffer. When the protected messages alone
    /// leave too little room, everything else is evicted and the outcome
    /// reports that the size still does not fit.
    pub fn make_room(
        &mut self,
        now: SimTime,
        size: u64,
        ratings: &Ratings,
        comparator: &mut BufferComparator,
        protected: impl Fn(&MessageId) -> bool,
    ) -> Result<Eviction, UsageError> {
        let mut eviction = Eviction::default();
        if self.gauge.exceeds_capacity(size) {
            return Ok(eviction);
        }

        while self.free_space() < size {
            let victim = comparator
                .victim(
                    now,
                    ratings,
                    self.messages
                        .values()
                        .filter(|message| !protected(message.id())),
                )?
                .map(|message| message.id().clone());
            let Some(message) = victim.and_then(|id| self.remove(&id)) else {
                return Ok(eviction);
            };
            eviction.evicted.push(message);
        }

        eviction.fits = true;
        Ok(eviction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        host::HostId,
        rating::RatingsConfig,
        router::eviction::EvictionConfig,
    };

    fn message(id: &str, size: u64) -> Message {
        Message::builder(id)
            .from(HostId::new(1))
            .to(HostId::new(2))
            .size(size)
            .build()
            .unwrap()
    }

    fn setup() -> (Ratings, BufferComparator) {
        (
            Ratings::new(RatingsConfig::default())
                .unwrap()
                .attach(HostId::new(1)),
            BufferComparator::from_config(&EvictionConfig::default()).unwrap(),
        )
    }

    fn make_room(buffer: &mut MessageBuffer, size: u64) -> Eviction {
        let (mut ratings, mut comparator) = setup();
        for message in buffer.iter() {
            ratings.track(message);
        }
        buffer
            .make_room(SimTime::ZERO, size, &ratings, &mut comparator, |_| false)
            .unwrap()
    }

    #[test]
    fn accounting() {
        let mut buffer = MessageBuffer::new(100);
        buffer.insert(message("M1", 30));
        buffer.insert(message("M2", 50));
        assert_eq!(buffer.used(), 80);

        buffer.insert(message("M1", 30));
        assert_eq!(buffer.used(), 80);

        buffer.remove(&MessageId::new("M2"));
        assert_eq!(buffer.free_space(), 70);
        assert!(buffer.remove(&MessageId::new("M2")).is_none());
    }

    #[test]
    fn too_big_never_fits() {
        let mut buffer = MessageBuffer::new(100);
        let eviction = make_room(&mut buffer, 101);

        assert!(!eviction.fits);
        assert!(eviction.evicted.is_empty());
        assert!(buffer.is_empty());
    }

    #[test]
    fn second_message_evicts_the_first() {
        let mut buffer = MessageBuffer::new(100);
        assert!(make_room(&mut buffer, 99).fits);
        buffer.insert(message("M1", 99));

        let eviction = make_room(&mut buffer, 99);
        assert!(eviction.fits);
        assert_eq!(eviction.evicted.len(), 1);
        assert_eq!(eviction.evicted[0].id().as_str(), "M1");
        assert!(buffer.is_empty());
    }

    #[test]
    fn protected_messages_stay() {
        let mut buffer = MessageBuffer::new(100);
        buffer.insert(message("M1", 60));
        buffer.insert(message("M2", 30));

        let (mut ratings, mut comparator) = setup();
        for message in buffer.iter() {
            ratings.track(message);
        }
        let sending = MessageId::new("M1");
        let eviction = buffer
            .make_room(SimTime::ZERO, 50, &ratings, &mut comparator, |id| *id == sending)
            .unwrap();

        assert!(!eviction.fits);
        assert_eq!(eviction.evicted.len(), 1);
        assert!(buffer.contains(&sending));
    }

    #[test]
    fn drain_expired() {
        let mut buffer = MessageBuffer::new(100);
        buffer.insert(message("M1", 10));
        buffer.insert(message("M2", 10));

        let drained = buffer.drain_filter(|message| message.id().as_str() == "M2");
        assert_eq!(drained.len(), 1);
        assert_eq!(buffer.used(), 10);
    }
}
