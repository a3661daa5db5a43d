//! Applications running on top of a router.
//!
//! Every message a router receives goes through its applications, in the
//! order they were added, before being buffered. An application may
//! modify the message or drop it by returning `None`, in which case the
//! following applications do not see it.

use crate::{
    host::HostId,
    message::{DataItem, Message, MessageKind},
    time::SimTime,
};
use std::{collections::BTreeMap, fmt};
use tracing::trace;

pub trait Application: fmt::Debug {
    /// process `message`, just received by `host`
    fn handle(&mut self, now: SimTime, message: Message, host: HostId) -> Option<Message>;

    /// the data items this application shares with neighbours
    fn data_items(&self) -> Vec<DataItem> {
        Vec::new()
    }

    /// a fresh instance, with the same settings, for another host
    fn replicate(&self) -> Box<dyn Application>;
}

/// Keeps the data items received by its host, and shares them.
///
/// An item received twice keeps its most recent modification.
#[derive(Debug, Clone, Default)]
pub struct DataStore {
    items: BTreeMap<u64, DataItem>,
}

impl DataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// a store preloaded with `items`
    pub fn with_items(items: impl IntoIterator<Item = DataItem>) -> Self {
        let mut store = Self::new();
        for item in items {
            store.store(item);
        }
        store
    }

    pub fn store(&mut self, item: DataItem) {
        match self.items.get(&item.id) {
            Some(known) if known.modified >= item.modified => {}
            _ => {
                self.items.insert(item.id, item);
            }
        }
    }

    pub fn get(&self, id: u64) -> Option<&DataItem> {
        self.items.get(&id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Application for DataStore {
    fn handle(&mut self, _now: SimTime, message: Message, host: HostId) -> Option<Message> {
        if let MessageKind::Data { to, item } = message.kind() {
            if *to == host {
                trace!(%host, item = item.id, "data item stored");
                self.store(item.clone());
            }
        }
        Some(message)
    }

    fn data_items(&self) -> Vec<DataItem> {
        self.items.values().cloned().collect()
    }

    fn replicate(&self) -> Box<dyn Application> {
        Box::new(Self::new())
    }
}
