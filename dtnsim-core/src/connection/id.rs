use crate::host::HostId;
use std::fmt;

/// Unique identifier of the connection between two hosts
///
/// Two hosts have at most one connection at a time and the identifier
/// does not depend on which of them initiated it: for all hosts `h1` and
/// `h2` the identifier `(h1, h2)` is the same as `(h2, h1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId {
    smaller_id: HostId,
    larger_id: HostId,
}

impl ConnectionId {
    /// create the connection identifier from the given host tuple.
    ///
    /// ```
    /// # use dtnsim_core::{connection::ConnectionId, host::HostId};
    /// # let h1 = HostId::new(1);
    /// # let h2 = HostId::new(2);
    /// assert_eq!(ConnectionId::new((h1, h2)), ConnectionId::new((h2, h1)));
    /// ```
    pub fn new((a, b): (HostId, HostId)) -> Self {
        if a < b {
            Self {
                smaller_id: a,
                larger_id: b,
            }
        } else {
            Self {
                smaller_id: b,
                larger_id: a,
            }
        }
    }

    /// the two hosts of the connection, smallest identifier first
    #[inline]
    pub fn into_hosts(self) -> (HostId, HostId) {
        (self.smaller_id, self.larger_id)
    }

    #[inline]
    pub fn involves(&self, host: HostId) -> bool {
        self.smaller_id == host || self.larger_id == host
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<->{}", self.smaller_id, self.larger_id)
    }
}
