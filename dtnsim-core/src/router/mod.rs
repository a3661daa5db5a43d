//! The router of a host: admission, buffering and the choice of what to
//! send next.
//!
//! A [`Router`] is first built from a [`RouterConfig`] as an unattached
//! prototype, then [replicated](Router::replicate) and
//! [attached](Router::attach) for every host of the network. Replicas
//! share nothing: each gets its own buffer and rating tables.
//!
//! The [`Network`] drives the router through its lifecycle:
//!
//! * [`Router::contact_up`] / [`Router::contact_down`] when a neighbour
//!   comes in or goes out of range;
//! * [`Router::receive_message`], [`Router::message_transferred`] and
//!   [`Router::message_aborted`] on the receiving end of a transfer;
//! * [`Router::transfer_started`], [`Router::transfer_done`] and
//!   [`Router::transfer_aborted`] on the sending end;
//! * [`Router::update`] then [`Router::candidates`] on every tick.
//!
//! Messages a neighbour is a final recipient of are sent first, by
//! priority. The other messages are chosen by the [`MessageChooser`] and
//! ordered by the [`PrioritizationStrategy`]; that list is cached and
//! recomputed at the message ordering interval or when a contact comes up.
//!
//! [`Network`]: crate::network::Network

mod buffer;
pub mod chooser;
mod config;
mod eviction;
mod history;
mod prioritization;

use crate::{
    application::Application,
    connection::{Connection, ConnectionId},
    error::{ConfigError, UsageError},
    host::HostId,
    measure::Energy,
    message::{DataItem, Message, MessageId},
    rating::Ratings,
    stats::{HostStats, RouterCounters},
    time::SimTime,
};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use tracing::{debug, trace, warn};

use self::chooser::{ChooserKind, Context, Epidemic, MessageChooser, RescueMode, Utility};

pub use self::{
    buffer::{Eviction, MessageBuffer},
    config::RouterConfig,
    eviction::{BufferComparator, BufferComparatorBuilder, EvictionConfig},
    history::SentHistory,
    prioritization::{Prioritization, PrioritizationConfig, PrioritizationStrategy},
};

/// Reasons for a router to refuse an incoming message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReceiveError {
    #[error("Host ({host}) is busy with another transfer")]
    Busy { host: HostId },
    #[error("Message ({id}) was already received")]
    Old { id: MessageId },
    #[error("Message ({id}) expired")]
    Expired { id: MessageId },
    #[error("Host ({host}) has no energy left")]
    LowResources { host: HostId },
    #[error("No room for message ({id}) of {size} bytes")]
    NoSpace { id: MessageId, size: u64 },
    #[error(transparent)]
    Usage(#[from] UsageError),
}

/// A message reaching one of its final recipients.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub message: Message,
    pub host: HostId,
    pub at: SimTime,
    /// the host never received this message before
    pub first: bool,
}

/// A neighbour as seen from a router: the connection to it and its router.
#[derive(Debug, Clone, Copy)]
pub struct Neighbor<'a> {
    pub connection: &'a Connection,
    pub host: HostId,
    pub router: &'a Router,
}

/// A message to send through a connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub message: Message,
    pub connection: ConnectionId,
    pub peer: HostId,
}

#[derive(Debug)]
pub struct Router {
    host: HostId,
    config: RouterConfig,

    buffer: MessageBuffer,
    delivered: HashSet<MessageId>,
    /// messages dropped by an application, never accepted again
    blacklist: HashSet<MessageId>,
    incoming: BTreeMap<(MessageId, HostId), Message>,
    sending: BTreeMap<ConnectionId, MessageId>,
    connections: BTreeMap<ConnectionId, HostId>,

    ratings: Ratings,
    chooser: Box<dyn MessageChooser>,
    rescue: RescueMode,
    in_rescue: bool,
    prioritization: PrioritizationStrategy,
    comparator: BufferComparator,
    energy: Option<Energy>,
    history: SentHistory,

    /// ordered non-direct candidates
    cached: Vec<Candidate>,
    last_ordering: Option<SimTime>,

    applications: Vec<Box<dyn Application>>,
    counters: RouterCounters,
}

impl<'a> Neighbor<'a> {
    #[inline]
    pub fn ratings(&self) -> &'a Ratings {
        self.router.ratings()
    }

    #[inline]
    pub fn is_transferring(&self) -> bool {
        self.router.is_transferring()
    }

    #[inline]
    pub fn has_message(&self, id: &MessageId) -> bool {
        self.router.has_message(id)
    }

    #[inline]
    pub fn energy_ratio(&self) -> f64 {
        self.router.remaining_energy_ratio()
    }
}

impl Candidate {
    pub fn new(message: Message, neighbor: &Neighbor<'_>) -> Self {
        Self {
            message,
            connection: neighbor.connection.id(),
            peer: neighbor.host,
        }
    }
}

impl Router {
    /// build an unattached router prototype
    pub fn new(config: RouterConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let chooser: Box<dyn MessageChooser> = match config.chooser {
            ChooserKind::Epidemic => Box::new(Epidemic),
            ChooserKind::Utility => Box::new(Utility::new(&config.utility)?),
        };
        let energy = config.energy.clone().map(Energy::new).transpose()?;

        Ok(Self {
            host: HostId::ZERO,
            buffer: MessageBuffer::new(config.buffer_size),
            delivered: HashSet::new(),
            blacklist: HashSet::new(),
            incoming: BTreeMap::new(),
            sending: BTreeMap::new(),
            connections: BTreeMap::new(),
            ratings: Ratings::new(config.ratings.clone())?,
            chooser,
            rescue: RescueMode::new(&config.rescue)?,
            in_rescue: false,
            prioritization: PrioritizationStrategy::new(&config.prioritization)?,
            comparator: BufferComparator::from_config(&config.eviction)?,
            energy,
            history: SentHistory::new(config.history_size),
            cached: Vec::new(),
            last_ordering: None,
            applications: Vec::new(),
            counters: RouterCounters::default(),
            config,
        })
    }

    /// bind the router to `host`
    #[must_use]
    pub fn attach(mut self, host: HostId) -> Self {
        self.host = host;
        self.ratings = self.ratings.attach(host);
        self
    }

    /// an unattached router with the same settings and no state
    ///
    /// The buffer, the rating tables, the battery and the applications of
    /// the copy start fresh.
    #[must_use]
    pub fn replicate(&self) -> Self {
        Self {
            host: HostId::ZERO,
            config: self.config.clone(),
            buffer: MessageBuffer::new(self.buffer.capacity()),
            delivered: HashSet::new(),
            blacklist: HashSet::new(),
            incoming: BTreeMap::new(),
            sending: BTreeMap::new(),
            connections: BTreeMap::new(),
            ratings: self.ratings.replicate(),
            chooser: self.chooser.replicate(),
            rescue: self.rescue.clone(),
            in_rescue: false,
            prioritization: self.prioritization.replicate(),
            comparator: self.comparator.replicate(),
            energy: self.energy.as_ref().map(Energy::replicate),
            history: SentHistory::new(self.history.capacity()),
            cached: Vec::new(),
            last_ordering: None,
            applications: self
                .applications
                .iter()
                .map(|application| application.replicate())
                .collect(),
            counters: RouterCounters::default(),
        }
    }

    pub fn set_buffer_size(&mut self, size: u64) {
        self.buffer.set_capacity(size);
    }

    pub fn set_energy(&mut self, energy: Energy) {
        self.energy = Some(energy);
    }

    pub fn add_application(&mut self, application: Box<dyn Application>) {
        self.applications.push(application);
    }

    #[inline]
    pub fn host(&self) -> HostId {
        self.host
    }

    #[inline]
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    #[inline]
    pub fn buffer(&self) -> &MessageBuffer {
        &self.buffer
    }

    #[inline]
    pub fn ratings(&self) -> &Ratings {
        &self.ratings
    }

    #[cfg(test)]
    pub(crate) fn ratings_mut(&mut self) -> &mut Ratings {
        &mut self.ratings
    }

    #[inline]
    pub fn energy(&self) -> Option<&Energy> {
        self.energy.as_ref()
    }

    /// `1.0` for hosts without a battery
    pub fn remaining_energy_ratio(&self) -> f64 {
        self.energy.as_ref().map_or(1.0, Energy::remaining_ratio)
    }

    #[inline]
    pub fn is_in_rescue_mode(&self) -> bool {
        self.in_rescue
    }

    #[inline]
    pub fn history(&self) -> &SentHistory {
        &self.history
    }

    /// a message is being received or sent
    pub fn is_transferring(&self) -> bool {
        !self.incoming.is_empty() || !self.sending.is_empty()
    }

    pub fn has_message(&self, id: &MessageId) -> bool {
        self.buffer.contains(id)
    }

    pub fn is_delivered(&self, id: &MessageId) -> bool {
        self.delivered.contains(id)
    }

    /// the neighbours currently in range, with the connection to each
    pub fn connections(&self) -> impl Iterator<Item = (ConnectionId, HostId)> + '_ {
        self.connections
            .iter()
            .map(|(connection, host)| (*connection, *host))
    }

    /// data items of all the applications
    pub fn data_items(&self) -> Vec<DataItem> {
        self.applications
            .iter()
            .flat_map(|application| application.data_items())
            .collect()
    }

    pub fn stats(&self) -> HostStats {
        HostStats {
            id: self.host,
            buffered: self.buffer.len(),
            buffer_used: self.buffer.used(),
            buffer_capacity: self.buffer.capacity(),
            energy_ratio: self.remaining_energy_ratio(),
            rescue_mode: self.in_rescue,
            connections: self.connections.len(),
            counters: self.counters,
        }
    }

    // ------------------------------------------------------------------
    // messages
    // ------------------------------------------------------------------

    /// store a message created at this host
    pub fn create_message(&mut self, now: SimTime, mut message: Message) -> Result<(), ReceiveError> {
        if self.has_message(message.id()) {
            return Err(ReceiveError::Old {
                id: message.id().clone(),
            });
        }
        self.make_room(now, &message)?;

        message.set_received(now);
        debug!(host = %self.host, message = %message, size = message.size(), "message created");
        self.ratings.track(&message);
        self.buffer.insert(message);
        self.counters.created += 1;
        Ok(())
    }

    /// admission of a message a neighbour starts sending
    ///
    /// On success, room has been made in the buffer and the router waits
    /// for [`Router::message_transferred`] or [`Router::message_aborted`].
    pub fn receive_message(
        &mut self,
        now: SimTime,
        message: &Message,
        from: HostId,
    ) -> Result<(), ReceiveError> {
        let result = self.admit(now, message);
        match &result {
            Ok(()) => {
                let mut copy = message.replicate();
                copy.add_hop(self.host);
                self.incoming.insert((message.id().clone(), from), copy);
            }
            Err(error) => {
                self.counters.refused += 1;
                trace!(host = %self.host, message = %message, %from, %error, "message refused");
            }
        }
        result
    }

    fn admit(&mut self, now: SimTime, message: &Message) -> Result<(), ReceiveError> {
        if self.is_transferring() {
            return Err(ReceiveError::Busy { host: self.host });
        }

        let id = message.id();
        if !message.is_data()
            && (self.buffer.contains(id) || self.delivered.contains(id) || self.blacklist.contains(id))
        {
            return Err(ReceiveError::Old { id: id.clone() });
        }

        let completes = message.completes_delivery(self.host);
        if !completes && message.is_expired(now) {
            return Err(ReceiveError::Expired { id: id.clone() });
        }
        if self.energy.as_ref().is_some_and(Energy::is_depleted) {
            return Err(ReceiveError::LowResources { host: self.host });
        }
        if !completes {
            self.make_room(now, message)?;
        }
        Ok(())
    }

    fn make_room(&mut self, now: SimTime, message: &Message) -> Result<(), ReceiveError> {
        let sending = &self.sending;
        let eviction = self.buffer.make_room(
            now,
            message.size(),
            &self.ratings,
            &mut self.comparator,
            |id| sending.values().any(|sent| sent == id),
        )?;

        for evicted in &eviction.evicted {
            debug!(host = %self.host, message = %evicted, "message evicted");
            self.forget(evicted.id());
            self.counters.evicted += 1;
        }

        if eviction.fits {
            Ok(())
        } else {
            Err(ReceiveError::NoSpace {
                id: message.id().clone(),
                size: message.size(),
            })
        }
    }

    /// a message left the buffer
    fn forget(&mut self, id: &MessageId) {
        self.ratings.untrack(id);
        self.cached.retain(|candidate| candidate.message.id() != id);
    }

    /// the message `id` from `from` has been fully received
    ///
    /// Returns the delivery if this host is one of its final recipients.
    pub fn message_transferred(
        &mut self,
        now: SimTime,
        id: &MessageId,
        from: HostId,
    ) -> Option<Delivery> {
        let Some(mut message) = self.incoming.remove(&(id.clone(), from)) else {
            warn!(host = %self.host, message = %id, %from, "no such incoming message");
            return None;
        };
        message.set_received(now);
        self.counters.received += 1;

        let mut outcome = Some(message.clone());
        for application in &mut self.applications {
            let Some(current) = outcome.take() else {
                break;
            };
            outcome = application.handle(now, current, self.host);
        }

        let is_recipient = message.is_final_recipient(self.host);
        let first = is_recipient && self.delivered.insert(id.clone());
        if first {
            self.counters.delivered += 1;
        }

        match outcome {
            Some(kept) if !kept.completes_delivery(self.host) => {
                self.ratings.track(&kept);
                self.buffer.insert(kept);
            }
            None if !first => {
                debug!(host = %self.host, message = %id, "message dropped by an application");
                self.blacklist.insert(id.clone());
            }
            _ => {}
        }

        is_recipient.then_some(Delivery {
            message,
            host: self.host,
            at: now,
            first,
        })
    }

    /// the transfer of the message `id` from `from` was interrupted
    pub fn message_aborted(&mut self, id: &MessageId, from: HostId) {
        if self.incoming.remove(&(id.clone(), from)).is_some() {
            self.counters.aborted += 1;
            debug!(host = %self.host, message = %id, %from, "incoming transfer aborted");
        }
    }

    /// this router started sending `id` through `connection`
    pub fn transfer_started(&mut self, connection: ConnectionId, id: &MessageId) {
        self.sending.insert(connection, id.clone());
    }

    /// this router finished sending `id` to `to`
    pub fn transfer_done(&mut self, connection: ConnectionId, id: &MessageId, to: HostId) {
        self.sending.remove(&connection);
        self.history.add(id.clone(), to);
        self.cached
            .retain(|candidate| !(candidate.peer == to && candidate.message.id() == id));
        self.counters.sent += 1;

        let handed_over = self
            .buffer
            .get(id)
            .is_some_and(|message| message.completes_delivery(to));
        if self.config.delete_delivered && handed_over {
            self.buffer.remove(id);
            self.forget(id);
            debug!(host = %self.host, message = %id, %to, "delivered message deleted");
        }
    }

    /// the transfer through `connection` was interrupted
    pub fn transfer_aborted(&mut self, connection: ConnectionId) {
        self.sending.remove(&connection);
    }

    // ------------------------------------------------------------------
    // time and contacts
    // ------------------------------------------------------------------

    pub fn update(&mut self, now: SimTime) {
        let transferring = self.is_transferring();
        if let Some(energy) = self.energy.as_mut() {
            energy.update(now, transferring);
        }

        let rescue = self.remaining_energy_ratio() < self.config.power_threshold;
        if rescue != self.in_rescue {
            debug!(host = %self.host, rescue, "message chooser switched");
            self.in_rescue = rescue;
            self.last_ordering = None;
        }

        self.ratings.update(now);

        for expired in self.buffer.drain_filter(|message| message.is_expired(now)) {
            debug!(host = %self.host, message = %expired, "message expired");
            self.forget(expired.id());
            self.counters.expired += 1;
        }
    }

    /// `neighbor` came in range through `connection`
    ///
    /// The delivery predictabilities of both ends are updated separately,
    /// with [`Router::meet`].
    pub fn contact_up(&mut self, now: SimTime, connection: &Connection, neighbor: &Router) {
        let peer = connection.other(self.host);
        self.ratings.add_encounter(peer, neighbor.buffer.ids());
        if let Some(energy) = self.energy.as_mut() {
            energy.on_discovery(now);
        }
        self.connections.insert(connection.id(), peer);
        debug!(host = %self.host, %peer, connection = %connection.id(), "contact up");
    }

    /// update the delivery predictabilities of this router and `other`,
    /// in contact with each other
    pub fn meet(&mut self, other: &mut Router, now: SimTime) {
        Ratings::meet(&mut self.ratings, &mut other.ratings, now);
    }

    pub fn contact_down(&mut self, connection: ConnectionId) {
        if let Some(peer) = self.connections.remove(&connection) {
            debug!(host = %self.host, %peer, %connection, "contact down");
        }
        self.cached
            .retain(|candidate| candidate.connection != connection);
    }

    // ------------------------------------------------------------------
    // choosing what to send
    // ------------------------------------------------------------------

    /// choose and order the non-direct messages for the `neighbors`
    pub fn recompute_cache(
        &mut self,
        now: SimTime,
        neighbors: &[Neighbor<'_>],
    ) -> Result<(), UsageError> {
        let data = self.data_items();
        let context = Context {
            host: self.host,
            now,
            ratings: &self.ratings,
            messages: self.buffer.iter().collect(),
            data: &data,
        };
        let chooser: &dyn MessageChooser = if self.in_rescue {
            &self.rescue
        } else {
            self.chooser.as_ref()
        };

        let history = &self.history;
        let chosen: Vec<_> = chooser
            .choose_non_direct_messages(&context, neighbors)?
            .into_iter()
            .filter(|candidate| !history.contains(candidate.message.id(), candidate.peer))
            .collect();

        let ratings_of = |host: HostId| {
            neighbors
                .iter()
                .find(|neighbor| neighbor.host == host)
                .map(|neighbor| neighbor.ratings())
        };
        self.cached = self
            .prioritization
            .sort_messages(now, &self.ratings, chosen, ratings_of)?;
        self.last_ordering = Some(now);

        trace!(host = %self.host, candidates = self.cached.len(), "non-direct messages ordered");
        Ok(())
    }

    /// the messages to try sending, in order: the direct messages, then
    /// the non-direct ones
    ///
    /// Nothing is offered while a transfer is in progress.
    pub fn candidates(
        &mut self,
        now: SimTime,
        neighbors: &[Neighbor<'_>],
    ) -> Result<Vec<Candidate>, UsageError> {
        let mut candidates = self.direct_candidates(neighbors);
        candidates.extend(self.non_direct_candidates(now, neighbors)?);
        Ok(candidates)
    }

    /// the buffered messages whose final recipient is an idle neighbour,
    /// highest priority first
    pub fn direct_candidates(&self, neighbors: &[Neighbor<'_>]) -> Vec<Candidate> {
        if !self.can_start_transfer() {
            return Vec::new();
        }
        let mut candidates: Vec<_> = neighbors
            .iter()
            .filter(|neighbor| !neighbor.is_transferring())
            .flat_map(|neighbor| self.direct_to(neighbor))
            .collect();
        candidates.sort_by_key(|candidate| std::cmp::Reverse(candidate.message.priority()));
        candidates
    }

    /// the buffered messages a neighbour asking for its deliverable
    /// messages can be sent, highest priority first
    ///
    /// Nothing is offered while this router is transferring, or when
    /// `requester` is not among the `neighbors`.
    pub fn deliverable_to(&self, requester: HostId, neighbors: &[Neighbor<'_>]) -> Vec<Candidate> {
        if self.is_transferring() {
            return Vec::new();
        }
        let mut candidates: Vec<_> = neighbors
            .iter()
            .filter(|neighbor| neighbor.host == requester)
            .flat_map(|neighbor| self.direct_to(neighbor))
            .collect();
        candidates.sort_by_key(|candidate| std::cmp::Reverse(candidate.message.priority()));
        candidates
    }

    /// the cached non-direct messages still sendable, in order
    ///
    /// The cache is recomputed once the ordering interval has elapsed.
    pub fn non_direct_candidates(
        &mut self,
        now: SimTime,
        neighbors: &[Neighbor<'_>],
    ) -> Result<Vec<Candidate>, UsageError> {
        if !self.can_start_transfer() {
            return Ok(Vec::new());
        }

        let interval = self.config.message_ordering_interval.as_secs_f64();
        let stale = self
            .last_ordering
            .is_none_or(|last| now.secs_since(last) >= interval);
        if stale {
            self.recompute_cache(now, neighbors)?;
        }

        Ok(self
            .cached
            .iter()
            .filter(|candidate| self.connections.contains_key(&candidate.connection))
            .filter(|candidate| !self.history.contains(candidate.message.id(), candidate.peer))
            .cloned()
            .collect())
    }

    #[inline]
    fn can_start_transfer(&self) -> bool {
        !self.is_transferring() && !self.connections.is_empty()
    }

    fn direct_to(&self, neighbor: &Neighbor<'_>) -> impl Iterator<Item = Candidate> {
        self.buffer
            .iter()
            .filter(|message| message.is_final_recipient(neighbor.host))
            .filter(|message| !neighbor.has_message(message.id()))
            .filter(|message| !self.history.contains(message.id(), neighbor.host))
            .map(|message| Candidate::new(message.clone(), neighbor))
    }
}
