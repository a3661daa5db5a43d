use crate::scenario::Scenario;
use anyhow::{Context as _, Result};
use dtnsim_core::{
    HostId, MessageId, Network, NetworkError, SimTime,
    router::{Delivery, ReceiveError, Router, RouterConfig},
};
use rand_chacha::ChaChaRng;
use rand_core::{Rng as _, SeedableRng as _};
use std::{collections::BTreeMap, fmt, time::Duration};
use tracing::{debug, info};

/// A seeded run of a [`Scenario`] over a network of routers built from
/// one [`RouterConfig`].
///
/// Two simulations with the same scenario (seed included) and the same
/// router settings produce the same [`Summary`].
pub struct Simulation {
    scenario: Scenario,
    network: Network,
    hosts: Vec<HostId>,
    rng: ChaChaRng,

    /// contacts currently up, with the time they go down
    contacts: Vec<(SimTime, HostId, HostId)>,
    next_contact: SimTime,
    next_message: SimTime,

    created: BTreeMap<MessageId, SimTime>,
    summary: Summary,
}

/// Outcome of a [`Simulation`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    pub created: u64,
    /// messages the creator could not store
    pub refused: u64,
    /// messages that reached their recipient, counted once per message
    pub delivered: u64,
    /// sum of the creation-to-delivery delays, in seconds
    latency_secs: f64,
    total_hops: u64,
    pub transfers_started: u64,
    pub transfers_aborted: u64,
    pub bytes_transferred: u64,
}

impl Summary {
    pub fn delivery_ratio(&self) -> f64 {
        if self.created == 0 {
            0.0
        } else {
            self.delivered as f64 / self.created as f64
        }
    }

    pub fn mean_latency(&self) -> Option<Duration> {
        (self.delivered > 0)
            .then(|| Duration::from_secs_f64(self.latency_secs / self.delivered as f64))
    }

    pub fn mean_hop_count(&self) -> Option<f64> {
        (self.delivered > 0).then(|| self.total_hops as f64 / self.delivered as f64)
    }

    fn record(&mut self, created: SimTime, delivery: &Delivery) {
        self.delivered += 1;
        self.latency_secs += delivery.at.secs_since(created);
        self.total_hops += u64::from(delivery.message.hop_count());
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "created:           {}", self.created)?;
        writeln!(f, "refused:           {}", self.refused)?;
        writeln!(f, "delivered:         {}", self.delivered)?;
        writeln!(f, "delivery ratio:    {:.4}", self.delivery_ratio())?;
        match self.mean_latency() {
            Some(latency) => writeln!(f, "mean latency:      {:.1}s", latency.as_secs_f64())?,
            None => writeln!(f, "mean latency:      -")?,
        }
        match self.mean_hop_count() {
            Some(hops) => writeln!(f, "mean hop count:    {hops:.2}")?,
            None => writeln!(f, "mean hop count:    -")?,
        }
        writeln!(f, "transfers started: {}", self.transfers_started)?;
        writeln!(f, "transfers aborted: {}", self.transfers_aborted)?;
        write!(f, "bytes transferred: {}", self.bytes_transferred)
    }
}

impl Simulation {
    pub fn new(scenario: Scenario, config: RouterConfig) -> Result<Self> {
        scenario.validate().context("Invalid scenario")?;
        let prototype = Router::new(config).context("Invalid router settings")?;

        let mut network = Network::new();
        network.set_seed(scenario.seed);
        let hosts = (0..scenario.hosts)
            .map(|_| network.new_host(&prototype).build())
            .collect();

        let mut simulation = Self {
            rng: ChaChaRng::seed_from_u64(scenario.seed),
            network,
            hosts,
            contacts: Vec::new(),
            next_contact: SimTime::ZERO,
            next_message: SimTime::ZERO,
            created: BTreeMap::new(),
            summary: Summary::default(),
            scenario,
        };
        simulation.next_contact = simulation.after(SimTime::ZERO, simulation.scenario.contacts.interval);
        simulation.next_message = simulation.after(SimTime::ZERO, simulation.scenario.messages.interval);
        Ok(simulation)
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn now(&self) -> SimTime {
        self.network.now()
    }

    /// the summary of the simulation so far
    pub fn summary(&self) -> Summary {
        let transfers = self.network.stats().transfers;
        Summary {
            transfers_started: transfers.started,
            transfers_aborted: transfers.aborted,
            bytes_transferred: transfers.bytes,
            ..self.summary.clone()
        }
    }

    /// run until the end time, calling `progress` after every step
    pub fn run(mut self, mut progress: impl FnMut(SimTime)) -> Result<Summary> {
        let end = SimTime::ZERO + self.scenario.end_time;
        while self.now() < end {
            self.step()?;
            progress(self.now());
        }
        let summary = self.summary();
        info!(
            created = summary.created,
            delivered = summary.delivered,
            ratio = summary.delivery_ratio(),
            "simulation done"
        );
        Ok(summary)
    }

    /// one update interval: contacts, new messages, then the routers
    pub fn step(&mut self) -> Result<()> {
        let now = self.now();

        self.end_contacts(now)?;
        while self.next_contact <= now {
            self.start_contact(now)?;
            self.next_contact = self.after(self.next_contact, self.scenario.contacts.interval);
        }
        while self.next_message <= now {
            self.create_message()?;
            self.next_message = self.after(self.next_message, self.scenario.messages.interval);
        }

        let step = self.scenario.update_interval;
        let (created, summary) = (&self.created, &mut self.summary);
        self.network.advance_with(step, |delivery| {
            if !delivery.first {
                return;
            }
            if let Some(at) = created.get(delivery.message.id()) {
                summary.record(*at, &delivery);
            }
        })?;
        Ok(())
    }

    fn end_contacts(&mut self, now: SimTime) -> Result<()> {
        let (ended, up): (Vec<_>, Vec<_>) = self
            .contacts
            .drain(..)
            .partition(|(until, _, _)| *until <= now);
        self.contacts = up;

        for (_, a, b) in ended {
            self.network.disconnect(a, b)?;
        }
        Ok(())
    }

    fn start_contact(&mut self, now: SimTime) -> Result<()> {
        let Some((a, b)) = self.random_pair(|network, a, b| !network.is_connected(a, b)) else {
            debug!("every host is already in contact with every other");
            return Ok(());
        };

        let contacts = &self.scenario.contacts;
        let (min, max, bandwidth) = (contacts.min_duration, contacts.max_duration, contacts.bandwidth);
        let length = min + (max - min).mul_f64(self.uniform());

        self.network
            .connect(a, b)
            .set_bandwidth(bandwidth)
            .apply()
            .with_context(|| format!("Failed to connect {a} and {b}"))?;
        self.contacts.push((now + length, a, b));
        Ok(())
    }

    fn create_message(&mut self) -> Result<()> {
        let Some((from, to)) = self.random_pair(|_, _, _| true) else {
            return Ok(());
        };
        let workload = self.scenario.messages.clone();
        let span = workload.max_size - workload.min_size;
        let size = workload.min_size + self.below(span + 1);
        let priority = self.below(u64::from(workload.max_priority) + 1) as u32;

        let mut builder = self
            .network
            .new_message()
            .from(from)
            .to(to)
            .size(size)
            .priority(priority);
        if let Some(ttl) = workload.ttl {
            builder = builder.ttl(ttl);
        }
        let message = builder.build()?;
        let id = message.id().clone();

        match self.network.create_message(message) {
            Ok(()) => {
                self.summary.created += 1;
                self.created.insert(id, self.network.now());
            }
            Err(NetworkError::Rejected {
                reason: ReceiveError::NoSpace { .. },
                ..
            }) => {
                self.summary.refused += 1;
                debug!(host = %from, message = %id, size, "no room for a new message");
            }
            Err(error) => return Err(error.into()),
        }
        Ok(())
    }

    /// two distinct hosts accepted by `filter`, picked at random
    fn random_pair(
        &mut self,
        filter: impl Fn(&Network, HostId, HostId) -> bool,
    ) -> Option<(HostId, HostId)> {
        let hosts = self.hosts.len() as u64;
        // a few random draws, then the first suitable pair after the last draw
        for _ in 0..8 {
            let ia = self.below(hosts) as usize;
            let a = self.hosts[ia];
            let ib = self.below(hosts) as usize;
            let b = self.hosts[ib];
            if a != b && filter(&self.network, a, b) {
                return Some((a, b));
            }
        }
        let start = self.below(hosts) as usize;
        let len = self.hosts.len();
        (0..len * len)
            .map(|i| ((start + i / len) % len, (start + i) % len))
            .map(|(i, j)| (self.hosts[i], self.hosts[j]))
            .find(|&(a, b)| a != b && filter(&self.network, a, b))
    }

    /// uniform in `0..n`
    fn below(&mut self, n: u64) -> u64 {
        self.rng.next_u64() % n
    }

    /// uniform in `[0, 1)`
    fn uniform(&mut self) -> f64 {
        (self.rng.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// `time` plus a random delay averaging to `interval`
    fn after(&mut self, time: SimTime, interval: Duration) -> SimTime {
        time + interval.mul_f64(2.0 * self.uniform())
    }
}
