use super::{Group, Message, MessageId, MessageKind};
use crate::{host::HostId, time::SimTime};
use anyhow::{Result, bail};
use std::time::Duration;

/// Builder for a new [`Message`].
///
/// Obtained with [`Message::builder`]. The sender, the recipients and the
/// size are required; everything else has a default:
///
/// | Setting | Default |
/// |---------|---------|
/// | priority | `0` |
/// | creation time | [`SimTime::ZERO`] |
/// | time to live | unlimited |
/// | path tracking | enabled |
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    id: MessageId,
    from: Option<HostId>,
    kind: Option<MessageKind>,
    size: Option<u64>,
    priority: u32,
    created: SimTime,
    ttl: Option<Duration>,
    track_path: bool,
}

impl MessageBuilder {
    pub fn new(id: MessageId) -> Self {
        Self {
            id,
            from: None,
            kind: None,
            size: None,
            priority: 0,
            created: SimTime::ZERO,
            ttl: None,
            track_path: true,
        }
    }

    pub fn from(mut self, from: HostId) -> Self {
        self.from = Some(from);
        self
    }

    pub fn to(mut self, to: HostId) -> Self {
        self.kind = Some(MessageKind::OneToOne { to });
        self
    }

    pub fn broadcast(mut self) -> Self {
        self.kind = Some(MessageKind::Broadcast);
        self
    }

    pub fn multicast(mut self, group: Group) -> Self {
        self.kind = Some(MessageKind::Multicast { group });
        self
    }

    pub fn size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn created(mut self, created: SimTime) -> Self {
        self.created = created;
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// keep the list of hosts visited by the message, not only their count
    pub fn track_path(mut self, track_path: bool) -> Self {
        self.track_path = track_path;
        self
    }

    pub fn id(&self) -> &MessageId {
        &self.id
    }

    pub fn build(self) -> Result<Message> {
        let Some(from) = self.from else {
            bail!("Missing sender information (`from')")
        };
        let Some(kind) = self.kind else {
            bail!("Missing recipient information (`to', `broadcast' or `multicast')")
        };
        let Some(size) = self.size else {
            bail!("Missing message size (`size')")
        };

        Ok(Message {
            id: self.id,
            from,
            kind,
            size,
            priority: self.priority,
            created: self.created,
            received: self.created,
            ttl: self.ttl,
            hop_count: 0,
            path: self.track_path.then(|| vec![from]),
        })
    }
}
