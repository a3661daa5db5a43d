use anyhow::anyhow;
use std::{fmt, str};

/// The identifier of a host (a simulated node) in the [`Network`]
///
/// [`HostId::ZERO`] is never handed out to a host of the network: it is
/// the address of a router prototype that has not been attached yet.
///
/// [`Network`]: crate::network::Network
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HostId(u64);

impl HostId {
    pub const ZERO: Self = HostId::new(0);
    pub const ONE: Self = HostId::new(1);

    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use = "function does not modify the current value"]
    pub(crate) fn next(self) -> Self {
        Self::new(self.0 + 1)
    }

    #[inline]
    pub fn into_u64(self) -> u64 {
        self.0
    }
}

impl str::FromStr for HostId {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix('h').unwrap_or(s);
        s.parse().map(Self).map_err(|error| anyhow!("{error}"))
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print() {
        assert_eq!(format!("{}", HostId(42)), "h42")
    }

    #[test]
    fn parse() {
        assert_eq!("42".parse::<HostId>().unwrap(), HostId(42));
        assert_eq!("h42".parse::<HostId>().unwrap(), HostId(42));
        assert!("hh42".parse::<HostId>().is_err());
    }

    #[test]
    fn next_is_sequential() {
        assert_eq!(HostId::ZERO.next(), HostId::ONE);
    }
}
