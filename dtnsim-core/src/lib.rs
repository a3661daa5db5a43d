/*!
# Delay-tolerant network simulation core

Deterministic decision core of an opportunistic network simulator: the
hosts carry messages in bounded buffers and forward them to each other
whenever they come in contact, one message at a time per contact.

* [`network::Network`] owns the hosts, the contacts and the simulated
  clock. It is driven step by step with
  [`advance_with`](network::Network::advance_with).
* [`router::Router`] decides what a host accepts, what it drops when
  its buffer is full and what it sends next.
* [`rating`] holds the estimators a router keeps about its
  surroundings (delivery predictability, replications density,
  encounter value).

```
use dtnsim_core::{
    network::Network,
    router::{Router, RouterConfig},
};
use std::time::Duration;

let prototype = Router::new(RouterConfig::default()).unwrap();
let mut network = Network::new();
let h1 = network.new_host(&prototype).build();
let h2 = network.new_host(&prototype).build();

let message = network.new_message().from(h1).to(h2).size(1_024).build().unwrap();
network.create_message(message).unwrap();
network.connect(h1, h2).apply().unwrap();

let mut delivered = Vec::new();
for _ in 0..2 {
    network
        .advance_with(Duration::from_secs(1), |delivery| delivered.push(delivery))
        .unwrap();
}
assert_eq!(delivered.len(), 1);
assert_eq!(delivered[0].host, h2);
```
*/

pub mod application;
pub mod cache;
pub mod connection;
pub mod defaults;
pub mod error;
pub mod host;
pub mod measure;
pub mod message;
pub mod network;
pub mod rating;
pub mod router;
pub mod stats;
pub mod time;

pub use self::{
    host::HostId,
    message::{Message, MessageId},
    network::{Network, NetworkError},
    router::{Router, RouterConfig},
    time::SimTime,
};
