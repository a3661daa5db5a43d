//! Strategies choosing which buffered messages to offer to which neighbour.
//!
//! Messages whose final recipient is a neighbour never go through a
//! chooser: the router sends them on its direct path. Every chooser
//! applies the same gate before its own rule:
//!
//! * neighbours busy with a transfer get nothing;
//! * a neighbour is not offered a message it is a final recipient of;
//! * a neighbour is not offered a message it already buffers.
//!
//! Data items of the host's applications are wrapped into one data
//! message per neighbour.

mod epidemic;
mod rescue;
mod utility;

use super::{Candidate, Neighbor};
use crate::{
    error::UsageError,
    host::HostId,
    message::{DataItem, Message},
    rating::Ratings,
    time::SimTime,
};
use std::fmt;

pub use self::{
    epidemic::Epidemic,
    rescue::{RescueConfig, RescueMode},
    utility::{Utility, UtilityConfig},
};

/// The configurable choosers of a router. The rescue mode chooser is
/// always present and only used when the host is low on energy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChooserKind {
    Epidemic,
    #[default]
    Utility,
}

/// State of the choosing host, borrowed from its router.
#[derive(Debug, Clone)]
pub struct Context<'a> {
    pub host: HostId,
    pub now: SimTime,
    pub ratings: &'a Ratings,
    /// the buffered messages
    pub messages: Vec<&'a Message>,
    /// the data items the host's applications can share
    pub data: &'a [DataItem],
}

pub trait MessageChooser: fmt::Debug {
    /// the `(message, neighbour)` pairs worth sending, in no particular order
    fn choose_non_direct_messages(
        &self,
        context: &Context<'_>,
        neighbors: &[Neighbor<'_>],
    ) -> Result<Vec<Candidate>, UsageError>;

    /// the same chooser, with the same settings, for another router
    fn replicate(&self) -> Box<dyn MessageChooser>;
}

/// neighbours that can be offered something at all
fn available<'n, 'a>(neighbors: &'n [Neighbor<'a>]) -> impl Iterator<Item = &'n Neighbor<'a>> {
    neighbors
        .iter()
        .filter(|neighbor| !neighbor.is_transferring())
}

fn is_offerable(message: &Message, neighbor: &Neighbor<'_>) -> bool {
    !message.is_final_recipient(neighbor.host) && !neighbor.has_message(message.id())
}

fn wrap_data<'i>(
    context: &Context<'_>,
    neighbor: &Neighbor<'_>,
    items: impl IntoIterator<Item = &'i DataItem>,
) -> impl Iterator<Item = Candidate> {
    let from = context.host;
    let now = context.now;
    let connection = neighbor.connection.id();
    let peer = neighbor.host;
    items.into_iter().map(move |item| Candidate {
        message: Message::data(from, peer, item.clone(), now),
        connection,
        peer,
    })
}
