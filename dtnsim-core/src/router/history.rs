use crate::{host::HostId, message::MessageId};
use std::collections::VecDeque;

/// The last `(message, neighbour)` pairs a router successfully sent,
/// newest first. Older entries fall off once the history is full.
#[derive(Debug, Clone)]
pub struct SentHistory {
    capacity: usize,
    entries: VecDeque<(MessageId, HostId)>,
}

impl SentHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn add(&mut self, message: MessageId, neighbour: HostId) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_back();
        }
        self.entries.push_front((message, neighbour));
    }

    pub fn contains(&self, message: &MessageId, neighbour: HostId) -> bool {
        self.entries
            .iter()
            .any(|(id, host)| *host == neighbour && id == message)
    }

    /// entries from the newest to the oldest
    pub fn iter(&self) -> impl Iterator<Item = (&MessageId, HostId)> + '_ {
        self.entries.iter().map(|(id, host)| (id, *host))
    }
}
