use crate::{
    application::Application,
    connection::{Connection, ConnectionId, TransferError},
    defaults::DEFAULT_BANDWIDTH,
    error::UsageError,
    host::HostId,
    measure::{Bandwidth, Energy},
    message::{Message, MessageBuilder, MessageIdGenerator},
    router::{Candidate, Delivery, Neighbor, ReceiveError, Router},
    stats::{ConnectionStats, NetworkStats, TransferCounters},
    time::{Clock, SimTime},
};
use rand_chacha::ChaChaRng;
use rand_core::{Rng as _, SeedableRng as _};
use std::{collections::BTreeMap, time::Duration};
use thiserror::Error;
use tracing::{debug, trace};

/// This is the entry point for running a simulation with [`dtnsim_core`].
///
/// The [`Network`] owns the [`Router`] of every host and the
/// [`Connection`]s between hosts in range of each other. It keeps the
/// simulated [`Clock`] and, on every call to
/// [`advance_with`](Network::advance_with):
///
/// 1. completes the transfers that are done, reporting the deliveries;
/// 2. updates every router (energy, rating windows, expired messages);
/// 3. lets every idle router start sending its best candidate, its direct
///    messages first, then the messages its neighbours can deliver to it.
///
/// Contacts are driven from the outside with [`Network::connect`] and
/// [`Network::disconnect`].
///
/// [`dtnsim_core`]: crate
pub struct Network {
    message_id_generator: MessageIdGenerator,

    routers: BTreeMap<HostId, Router>,

    connections: BTreeMap<ConnectionId, Connection>,

    clock: Clock,

    transfers: TransferCounters,

    /// the last assigned ID
    ///
    /// ID 0 is reserved for unattached routers and never given
    id: HostId,

    /// Shuffles the order in which hosts are updated when
    /// [`Network::set_randomize_update_order`] is enabled.
    ///
    /// A single source keeps the simulation reproducible when seeded via
    /// [`Network::set_seed`].
    rng: ChaChaRng,
    randomize_update_order: bool,
}

/// Builder for configuring a new host before registering it with the network.
///
/// Obtained via [`Network::new_host`], from a router prototype. Every
/// setting defaults to the prototype's.
///
/// ## Example
///
/// ```
/// use dtnsim_core::{network::Network, router::{Router, RouterConfig}};
///
/// let prototype = Router::new(RouterConfig::default()).unwrap();
/// let mut network = Network::new();
///
/// let h1 = network.new_host(&prototype).build();
/// let h2 = network
///     .new_host(&prototype)
///     .set_buffer_size(1_024 * 1_024)
///     .build();
/// # assert_ne!(h1, h2);
/// ```
pub struct HostBuilder<'a> {
    router: Router,

    network: &'a mut Network,
}

/// Builder for a contact between two hosts.
///
/// Obtained via [`Network::connect`]. Call [`ConnectionBuilder::apply`] to
/// bring the contact up.
pub struct ConnectionBuilder<'a> {
    a: HostId,
    b: HostId,
    bandwidth: Bandwidth,
    network: &'a mut Network,
}

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Host ({host}) Not Found")]
    UnknownHost { host: HostId },
    #[error("Hosts ({connection}) are already connected")]
    AlreadyConnected { connection: ConnectionId },
    #[error("Hosts ({connection}) are not connected")]
    NotConnected { connection: ConnectionId },
    #[error("Host ({host}) cannot connect to itself")]
    SelfConnection { host: HostId },
    #[error("{0}")]
    Usage(#[from] UsageError),
    #[error("Host ({host}) refused the message: {reason}")]
    Rejected {
        host: HostId,
        #[source]
        reason: ReceiveError,
    },
}

impl HostBuilder<'_> {
    /// Set the capacity of the host's message buffer in bytes.
    pub fn set_buffer_size(mut self, size: u64) -> Self {
        self.router.set_buffer_size(size);
        self
    }

    /// Give the host a battery, replacing the prototype's.
    pub fn set_energy(mut self, energy: Energy) -> Self {
        self.router.set_energy(energy);
        self
    }

    /// Run `application` on the host, after the prototype's applications.
    pub fn add_application(mut self, application: impl Application + 'static) -> Self {
        self.router.add_application(Box::new(application));
        self
    }

    /// Finalise the host configuration and register it with the network.
    ///
    /// Returns the [`HostId`] assigned to this host.
    pub fn build(self) -> HostId {
        let Self { router, network } = self;

        network.id = network.id.next();
        let id = network.id;

        network.routers.insert(id, router.attach(id));
        debug!(host = %id, "host added");

        id
    }
}

impl ConnectionBuilder<'_> {
    /// Set the bandwidth of the contact, shared by both directions.
    pub fn set_bandwidth(mut self, bandwidth: Bandwidth) -> Self {
        self.bandwidth = bandwidth;
        self
    }

    /// Bring the contact up.
    ///
    /// Both routers account for the encounter and update their delivery
    /// predictabilities before choosing what to send to each other.
    pub fn apply(self) -> Result<ConnectionId, NetworkError> {
        let Self {
            a,
            b,
            bandwidth,
            network,
        } = self;

        if a == b {
            return Err(NetworkError::SelfConnection { host: a });
        }
        let id = ConnectionId::new((a, b));
        if network.connections.contains_key(&id) {
            return Err(NetworkError::AlreadyConnected { connection: id });
        }
        for host in [a, b] {
            if !network.routers.contains_key(&host) {
                return Err(NetworkError::UnknownHost { host });
            }
        }

        let now = network.clock.now();
        let connection = Connection::new(a, b, bandwidth);
        if let Some(mut initiator) = network.routers.remove(&a) {
            if let Some(peer) = network.routers.get_mut(&b) {
                initiator.contact_up(now, &connection, peer);
                initiator.meet(peer, now);
                peer.contact_up(now, &connection, &initiator);
            }
            network.routers.insert(a, initiator);
        }
        network.connections.insert(id, connection);

        for host in [a, b] {
            network
                .with_neighbors(host, |router, neighbors| router.recompute_cache(now, neighbors))
                .transpose()?;
        }

        Ok(id)
    }
}

impl Default for Network {
    fn default() -> Self {
        Self::new()
    }
}

impl Network {
    /// Create a new, empty simulated network, at time zero.
    ///
    /// # Example
    ///
    /// ```
    /// use dtnsim_core::{network::Network, router::{Router, RouterConfig}};
    ///
    /// let prototype = Router::new(RouterConfig::default()).unwrap();
    /// let mut network = Network::new();
    /// let h1 = network.new_host(&prototype).build();
    /// let h2 = network.new_host(&prototype).build();
    /// network.connect(h1, h2).apply().unwrap();
    /// ```
    pub fn new() -> Self {
        Self {
            message_id_generator: MessageIdGenerator::new("M"),
            routers: BTreeMap::new(),
            connections: BTreeMap::new(),
            clock: Clock::new(),
            transfers: TransferCounters::default(),
            id: HostId::ZERO,
            rng: ChaChaRng::seed_from_u64(0),
            randomize_update_order: false,
        }
    }

    /// Re-seed the network's random-number generator.
    ///
    /// The default seed is `0`.
    pub fn set_seed(&mut self, seed: u64) {
        self.rng = ChaChaRng::seed_from_u64(seed);
    }

    /// Update the hosts in a random order on every step instead of by
    /// increasing [`HostId`].
    pub fn set_randomize_update_order(&mut self, randomize: bool) {
        self.randomize_update_order = randomize;
    }

    /// Returns a handle on the simulated clock.
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    #[inline]
    pub fn now(&self) -> SimTime {
        self.clock.now()
    }

    /// Returns the shared [`MessageIdGenerator`] for this network.
    pub fn message_id_generator(&self) -> &MessageIdGenerator {
        &self.message_id_generator
    }

    /// Start building a message with a fresh identifier, created now.
    pub fn new_message(&self) -> MessageBuilder {
        Message::builder(self.message_id_generator.generate()).created(self.now())
    }

    /// Create a new host running a replica of `prototype`.
    ///
    /// Host IDs are assigned sequentially starting at `1`.
    pub fn new_host(&mut self, prototype: &Router) -> HostBuilder<'_> {
        HostBuilder {
            router: prototype.replicate(),
            network: self,
        }
    }

    pub fn router(&self, host: HostId) -> Option<&Router> {
        self.routers.get(&host)
    }

    pub fn hosts(&self) -> impl Iterator<Item = HostId> + '_ {
        self.routers.keys().copied()
    }

    pub fn connection(&self, a: HostId, b: HostId) -> Option<&Connection> {
        self.connections.get(&ConnectionId::new((a, b)))
    }

    pub fn is_connected(&self, a: HostId, b: HostId) -> bool {
        self.connections.contains_key(&ConnectionId::new((a, b)))
    }

    /// Bring up a contact between `a` and `b`.
    ///
    /// # Example
    ///
    /// ```
    /// # use dtnsim_core::{network::Network, router::{Router, RouterConfig}};
    /// let prototype = Router::new(RouterConfig::default()).unwrap();
    /// let mut network = Network::new();
    /// let h1 = network.new_host(&prototype).build();
    /// let h2 = network.new_host(&prototype).build();
    ///
    /// network
    ///     .connect(h1, h2)
    ///     .set_bandwidth("2MBps".parse().unwrap())
    ///     .apply()
    ///     .unwrap();
    /// assert!(network.is_connected(h2, h1));
    /// ```
    pub fn connect(&mut self, a: HostId, b: HostId) -> ConnectionBuilder<'_> {
        ConnectionBuilder {
            a,
            b,
            bandwidth: DEFAULT_BANDWIDTH,
            network: self,
        }
    }

    /// Take down the contact between `a` and `b`.
    ///
    /// A transfer still in flight is aborted: the receiver keeps nothing
    /// of it.
    pub fn disconnect(&mut self, a: HostId, b: HostId) -> Result<(), NetworkError> {
        let id = ConnectionId::new((a, b));
        let Some(mut connection) = self.connections.remove(&id) else {
            return Err(NetworkError::NotConnected { connection: id });
        };
        let now = self.now();

        let in_flight = connection
            .transfer()
            .filter(|transfer| transfer.is_in_flight())
            .map(|transfer| (transfer.message().id().clone(), transfer.from(), transfer.to()));
        if let Some((message, from, to)) = in_flight {
            self.transfers.bytes += connection.abort(now);
            self.transfers.aborted += 1;
            if let Some(receiver) = self.routers.get_mut(&to) {
                receiver.message_aborted(&message, from);
            }
            if let Some(sender) = self.routers.get_mut(&from) {
                sender.transfer_aborted(id);
            }
        }
        connection.set_down();

        for host in [a, b] {
            if let Some(router) = self.routers.get_mut(&host) {
                router.contact_down(id);
            }
        }
        Ok(())
    }

    /// Store `message` at its creator.
    pub fn create_message(&mut self, message: Message) -> Result<(), NetworkError> {
        let host = message.from();
        let now = self.now();
        let Some(router) = self.routers.get_mut(&host) else {
            return Err(NetworkError::UnknownHost { host });
        };
        router
            .create_message(now, message)
            .map_err(|reason| NetworkError::Rejected { host, reason })
    }

    /// Returns a point-in-time snapshot of the network state.
    pub fn stats(&self) -> NetworkStats {
        let now = self.now();

        let hosts = self.routers.values().map(Router::stats).collect();

        let connections = self
            .connections
            .values()
            .map(|connection| ConnectionStats {
                id: connection.id(),
                bandwidth: connection.bandwidth(),
                transferring: connection.is_transferring(),
                bytes_transferred: connection.total_bytes_transferred(now),
            })
            .collect();

        NetworkStats {
            hosts,
            connections,
            transfers: self.transfers,
        }
    }

    /// Advance the simulated time by `step` and run one round of the routers.
    ///
    /// The provided `handle` closure is called once for each message
    /// reaching one of its final recipients during this step.
    ///
    /// # Errors
    ///
    /// A [`NetworkError::Usage`] means a router asked a component for a
    /// value outside of its contract. The step is left unfinished.
    pub fn advance_with<H>(&mut self, step: Duration, mut handle: H) -> Result<(), NetworkError>
    where
        H: FnMut(Delivery),
    {
        let now = self.clock.advance(step);

        self.complete_transfers(now, &mut handle);

        let mut hosts: Vec<HostId> = self.routers.keys().copied().collect();
        if self.randomize_update_order {
            self.shuffle(&mut hosts);
        }

        for host in hosts {
            if let Some(router) = self.routers.get_mut(&host) {
                router.update(now);
            }
            self.start_transfer(now, host)?;
        }

        Ok(())
    }

    fn complete_transfers(&mut self, now: SimTime, handle: &mut impl FnMut(Delivery)) {
        let done: Vec<ConnectionId> = self
            .connections
            .values()
            .filter(|connection| connection.is_message_transferred(now))
            .map(Connection::id)
            .collect();

        for id in done {
            let Some(transfer) = self
                .connections
                .get_mut(&id)
                .and_then(Connection::finalize)
            else {
                continue;
            };
            let message = transfer.message().id().clone();
            let (from, to) = (transfer.from(), transfer.to());
            self.transfers.done += 1;
            self.transfers.bytes += transfer.message().size();
            debug!(connection = %id, %message, %from, %to, "transfer done");

            if let Some(delivery) = self
                .routers
                .get_mut(&to)
                .and_then(|receiver| receiver.message_transferred(now, &message, from))
            {
                handle(delivery);
            }
            if let Some(sender) = self.routers.get_mut(&from) {
                sender.transfer_done(id, &message, to);
            }
        }
    }

    /// start at most one transfer involving `host`
    ///
    /// The direct messages of `host` are tried first, then every idle
    /// neighbour is asked for the messages it can deliver to `host`, and
    /// only then the non-direct messages of `host`.
    fn start_transfer(&mut self, now: SimTime, host: HostId) -> Result<(), NetworkError> {
        let Some(direct) = self.with_neighbors(host, |router, neighbors| {
            router.direct_candidates(neighbors)
        }) else {
            return Ok(());
        };
        if self.try_candidates(now, host, direct)? {
            return Ok(());
        }

        if self.request_deliverable(now, host)? {
            return Ok(());
        }

        let others = self
            .with_neighbors(host, |router, neighbors| {
                router.non_direct_candidates(now, neighbors)
            })
            .transpose()?
            .unwrap_or_default();
        self.try_candidates(now, host, others)?;
        Ok(())
    }

    /// ask the idle neighbours of `host` for the messages they can
    /// deliver to it, until one transfer starts
    fn request_deliverable(&mut self, now: SimTime, host: HostId) -> Result<bool, NetworkError> {
        if self.routers.get(&host).is_none_or(Router::is_transferring) {
            return Ok(false);
        }
        let peers: Vec<HostId> = self
            .connections
            .values()
            .filter(|connection| connection.is_ready_for_transfer())
            .filter(|connection| connection.id().involves(host))
            .map(|connection| connection.other(host))
            .collect();

        for peer in peers {
            let deliverable = self
                .with_neighbors(peer, |router, neighbors| router.deliverable_to(host, neighbors))
                .unwrap_or_default();
            if self.try_candidates(now, peer, deliverable)? {
                trace!(%host, %peer, "deliverable message requested");
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// try the `candidates` of `host` in order until one transfer starts
    fn try_candidates(
        &mut self,
        now: SimTime,
        host: HostId,
        candidates: Vec<Candidate>,
    ) -> Result<bool, NetworkError> {
        for candidate in candidates {
            let Some(connection) = self.connections.get_mut(&candidate.connection) else {
                continue;
            };
            if !connection.is_ready_for_transfer() {
                continue;
            }
            let Some(receiver) = self.routers.get_mut(&candidate.peer) else {
                continue;
            };

            match connection.start_transfer(now, host, &candidate.message, receiver) {
                Ok(()) => {
                    if let Some(sender) = self.routers.get_mut(&host) {
                        sender.transfer_started(candidate.connection, candidate.message.id());
                    }
                    self.transfers.started += 1;
                    return Ok(true);
                }
                Err(TransferError::Denied {
                    reason: ReceiveError::Usage(error),
                    ..
                }) => return Err(error.into()),
                Err(error) => {
                    trace!(%host, message = %candidate.message.id(), %error, "candidate not sent");
                }
            }
        }

        Ok(false)
    }

    /// run `f` on the router of `host` with its neighbours
    ///
    /// The router is taken out of the network for the duration of the
    /// call so its neighbours can be borrowed alongside it.
    fn with_neighbors<R>(
        &mut self,
        host: HostId,
        f: impl FnOnce(&mut Router, &[Neighbor<'_>]) -> R,
    ) -> Option<R> {
        let mut router = self.routers.remove(&host)?;

        let neighbors: Vec<Neighbor<'_>> = self
            .connections
            .values()
            .filter(|connection| connection.is_up() && connection.id().involves(host))
            .filter_map(|connection| {
                let peer = connection.other(host);
                self.routers.get(&peer).map(|router| Neighbor {
                    connection,
                    host: peer,
                    router,
                })
            })
            .collect();
        let result = f(&mut router, &neighbors);
        drop(neighbors);

        self.routers.insert(host, router);
        Some(result)
    }

    fn shuffle(&mut self, hosts: &mut [HostId]) {
        for i in (1..hosts.len()).rev() {
            let j = (self.rng.next_u64() % (i as u64 + 1)) as usize;
            hosts.swap(i, j);
        }
    }
}
