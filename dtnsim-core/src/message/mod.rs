//! Messages carried by the hosts of the network.
//!
//! A [`Message`] is created once by its sender, then copied at every hop:
//! all copies keep the same [`MessageId`] but each has its own hop count,
//! path and receive time.

mod builder;
mod id;

use crate::{host::HostId, time::SimTime};
use std::{collections::BTreeSet, fmt, sync::Arc, time::Duration};

pub use self::{
    builder::MessageBuilder,
    id::{MessageId, MessageIdGenerator},
};

/// A set of hosts addressed by a multicast message.
///
/// Membership is supplied from outside the core (community tables, scenario
/// files) and shared between all the copies of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    id: u32,
    members: Arc<BTreeSet<HostId>>,
}

/// A unit of application data that can be exchanged between neighbours.
///
/// The utility of an item is computed by the application owning it (from
/// its age, its distance, ...) and is only consumed here.
#[derive(Debug, Clone, PartialEq)]
pub struct DataItem {
    pub id: u64,
    pub size: u64,
    /// usefulness of the item in `[0, 1]`
    pub utility: f64,
    /// last time the item was modified
    pub modified: SimTime,
}

/// The addressing scheme of a [`Message`].
#[derive(Debug, Clone, PartialEq)]
pub enum MessageKind {
    /// a message for a single host
    OneToOne { to: HostId },
    /// a message for every host of the network
    Broadcast,
    /// a message for every member of the group
    Multicast { group: Group },
    /// application data sent to a neighbour
    Data { to: HostId, item: DataItem },
}

/// Fieldless version of [`MessageKind`], used for error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKindTag {
    OneToOne,
    Broadcast,
    Multicast,
    Data,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    id: MessageId,
    from: HostId,
    kind: MessageKind,
    size: u64,
    priority: u32,
    created: SimTime,
    received: SimTime,
    ttl: Option<Duration>,
    hop_count: u32,
    /// hosts visited so far, starting with the creator. `None` when path
    /// tracking is disabled.
    path: Option<Vec<HostId>>,
}

impl Group {
    pub fn new(id: u32, members: impl IntoIterator<Item = HostId>) -> Self {
        Self {
            id,
            members: Arc::new(members.into_iter().collect()),
        }
    }

    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    pub fn contains(&self, host: HostId) -> bool {
        self.members.contains(&host)
    }

    pub fn members(&self) -> impl Iterator<Item = HostId> + '_ {
        self.members.iter().copied()
    }
}

impl MessageKind {
    pub fn tag(&self) -> MessageKindTag {
        match self {
            Self::OneToOne { .. } => MessageKindTag::OneToOne,
            Self::Broadcast => MessageKindTag::Broadcast,
            Self::Multicast { .. } => MessageKindTag::Multicast,
            Self::Data { .. } => MessageKindTag::Data,
        }
    }
}

impl fmt::Display for MessageKindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OneToOne => f.write_str("one-to-one"),
            Self::Broadcast => f.write_str("broadcast"),
            Self::Multicast => f.write_str("multicast"),
            Self::Data => f.write_str("data"),
        }
    }
}

impl Message {
    /// start building a new message with the given identifier
    ///
    /// ```
    /// # use dtnsim_core::{host::HostId, message::Message};
    /// let message = Message::builder("M1")
    ///     .from(HostId::new(1))
    ///     .to(HostId::new(2))
    ///     .size(1_024)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(message.hop_count(), 0);
    /// ```
    pub fn builder(id: impl Into<MessageId>) -> MessageBuilder {
        MessageBuilder::new(id.into())
    }

    /// wrap a data item into a message for the neighbour `to`
    ///
    /// The message takes the size and utility of the item and the lowest
    /// priority.
    pub fn data(from: HostId, to: HostId, item: DataItem, now: SimTime) -> Self {
        Self {
            id: MessageId::data(item.id),
            from,
            size: item.size,
            kind: MessageKind::Data { to, item },
            priority: 0,
            created: now,
            received: now,
            ttl: None,
            hop_count: 0,
            path: Some(vec![from]),
        }
    }

    #[inline]
    pub fn id(&self) -> &MessageId {
        &self.id
    }

    #[inline]
    pub fn from(&self) -> HostId {
        self.from
    }

    #[inline]
    pub fn kind(&self) -> &MessageKind {
        &self.kind
    }

    #[inline]
    pub fn tag(&self) -> MessageKindTag {
        self.kind.tag()
    }

    /// single recipient of one-to-one and data messages
    pub fn to(&self) -> Option<HostId> {
        match &self.kind {
            MessageKind::OneToOne { to } | MessageKind::Data { to, .. } => Some(*to),
            MessageKind::Broadcast | MessageKind::Multicast { .. } => None,
        }
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    pub fn priority(&self) -> u32 {
        self.priority
    }

    #[inline]
    pub fn created(&self) -> SimTime {
        self.created
    }

    /// time at which this copy arrived in the buffer of its current holder
    #[inline]
    pub fn received(&self) -> SimTime {
        self.received
    }

    pub(crate) fn set_received(&mut self, time: SimTime) {
        self.received = time;
    }

    #[inline]
    pub fn hop_count(&self) -> u32 {
        self.hop_count
    }

    /// the hosts this copy went through, `None` if path tracking is disabled
    pub fn path(&self) -> Option<&[HostId]> {
        self.path.as_deref()
    }

    pub(crate) fn add_hop(&mut self, host: HostId) {
        self.hop_count += 1;
        if let Some(path) = self.path.as_mut() {
            path.push(host);
        }
    }

    #[inline]
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn is_expired(&self, now: SimTime) -> bool {
        self.ttl
            .is_some_and(|ttl| now.secs_since(self.created) >= ttl.as_secs_f64())
    }

    #[inline]
    pub fn is_data(&self) -> bool {
        matches!(self.kind, MessageKind::Data { .. })
    }

    #[inline]
    pub fn is_broadcast(&self) -> bool {
        matches!(self.kind, MessageKind::Broadcast)
    }

    /// utility of the wrapped data item, `None` for non-data messages
    pub fn utility(&self) -> Option<f64> {
        match &self.kind {
            MessageKind::Data { item, .. } => Some(item.utility),
            _ => None,
        }
    }

    /// `host` is one of the hosts this message is meant for
    pub fn is_final_recipient(&self, host: HostId) -> bool {
        match &self.kind {
            MessageKind::OneToOne { to } | MessageKind::Data { to, .. } => *to == host,
            MessageKind::Broadcast => true,
            MessageKind::Multicast { group } => group.contains(host),
        }
    }

    /// receiving this message at `host` ends its journey
    ///
    /// Broadcast and multicast messages keep spreading after reaching one
    /// of their recipients.
    pub fn completes_delivery(&self, host: HostId) -> bool {
        self.to() == Some(host)
    }

    /// a copy of this message for the next hop, keeping the identifier
    #[must_use]
    pub fn replicate(&self) -> Self {
        self.clone()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.id.fmt(f)
    }
}
