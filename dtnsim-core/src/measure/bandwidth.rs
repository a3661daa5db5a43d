use anyhow::{bail, ensure};
use logos::{Lexer, Logos};
use std::{fmt, str::FromStr, time::Duration};

/// The [`Bandwidth`] of a connection, in bytes per second.
///
/// A connection keeps the same bandwidth during its whole lifetime and
/// transfers one message at a time at that rate.
///
/// # Default
///
/// The [`Default`] bandwidth is [`defaults::DEFAULT_BANDWIDTH`].
///
/// # Example
///
/// ```
/// # use dtnsim_core::measure::Bandwidth;
/// # use std::time::Duration;
/// let bw: Bandwidth = "250kBps".parse().unwrap();
/// assert_eq!(bw.bytes_per_sec(), 250 * 1_024);
///
/// // a 50 bytes message takes 5 seconds at 10 bytes per second
/// let slow = Bandwidth::new(10);
/// assert_eq!(slow.transfer_time(50), Duration::from_secs(5));
/// ```
///
/// [`defaults::DEFAULT_BANDWIDTH`]: crate::defaults::DEFAULT_BANDWIDTH
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Bandwidth(u64);

impl Bandwidth {
    /// create a new [`Bandwidth`] of `bytes_per_sec` bytes per second
    pub const fn new(bytes_per_sec: u64) -> Self {
        Self(bytes_per_sec)
    }

    #[inline]
    pub const fn bytes_per_sec(&self) -> u64 {
        self.0
    }

    /// number of bytes (possibly fractional) sent in `secs` seconds
    #[inline]
    pub fn bytes_in(&self, secs: f64) -> f64 {
        self.0 as f64 * secs
    }

    /// seconds needed to send `size` bytes, infinite for a null bandwidth
    #[inline]
    pub fn transfer_secs(&self, size: u64) -> f64 {
        size as f64 / self.0 as f64
    }

    /// time needed to send `size` bytes
    ///
    /// Saturates to [`Duration::MAX`] for a null bandwidth.
    pub fn transfer_time(&self, size: u64) -> Duration {
        Duration::try_from_secs_f64(self.transfer_secs(size)).unwrap_or(Duration::MAX)
    }
}

impl Default for Bandwidth {
    fn default() -> Self {
        crate::defaults::DEFAULT_BANDWIDTH
    }
}

// --- Display ---

const K: u64 = 1_024;
const M: u64 = 1_024 * 1_024;
const G: u64 = 1_024 * 1_024 * 1_024;

impl fmt::Display for Bandwidth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let v = self.0;

        if v < K || v % K != 0 {
            write!(f, "{v}Bps")
        } else if v < M || v % M != 0 {
            write!(f, "{}kBps", v / K)
        } else if v < G || v % G != 0 {
            write!(f, "{}MBps", v / M)
        } else {
            write!(f, "{}GBps", v / G)
        }
    }
}

// --- FromStr ---

#[derive(Logos, Debug, PartialEq)]
#[logos(skip r"[ \t\n\f]+")]
enum BandwidthToken {
    #[token("Bps")]
    Bps,
    #[token("kBps")]
    KBps,
    #[token("MBps")]
    MBps,
    #[token("GBps")]
    GBps,

    #[regex("[0-9]+")]
    Value,
}

impl FromStr for Bandwidth {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut lex = Lexer::<'_, BandwidthToken>::new(s);

        let Some(Ok(BandwidthToken::Value)) = lex.next() else {
            bail!("Expecting to parse a number")
        };
        let number: u64 = lex.slice().parse()?;
        let Some(Ok(token)) = lex.next() else {
            bail!("Expecting to parse a unit")
        };
        let unit = match token {
            BandwidthToken::Bps => 1,
            BandwidthToken::KBps => K,
            BandwidthToken::MBps => M,
            BandwidthToken::GBps => G,
            BandwidthToken::Value => bail!("Expecting to parse a unit (Bps, kBps, ...)"),
        };

        ensure!(
            lex.next().is_none(),
            "Not expecting any other tokens to parse a bandwidth"
        );

        let Some(bytes_per_sec) = number.checked_mul(unit) else {
            bail!("Bandwidth `{s}' is too large")
        };

        Ok(Self::new(bytes_per_sec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bandwidth() {
        macro_rules! assert_bandwidth {
            ($string:literal == $value:expr) => {
                assert_eq!(
                    $string.parse::<Bandwidth>().unwrap(),
                    Bandwidth::new($value)
                );
            };
        }

        assert_bandwidth!("0Bps" == 0);
        assert_bandwidth!("42Bps" == 42);
        assert_bandwidth!("42kBps" == 42 * 1_024);
        assert_bandwidth!("42 MBps" == 42 * 1_024 * 1_024);
        assert_bandwidth!("1GBps" == 1_024 * 1_024 * 1_024);
    }

    #[test]
    fn print_bandwidth() {
        assert_eq!(Bandwidth::new(0).to_string(), "0Bps");
        assert_eq!(Bandwidth::new(1_000).to_string(), "1000Bps");
        assert_eq!(Bandwidth::new(250 * K).to_string(), "250kBps");
        assert_eq!(Bandwidth::new(M + K).to_string(), "1025kBps");
        assert_eq!(Bandwidth::new(3 * M).to_string(), "3MBps");
        assert_eq!(Bandwidth::new(2 * G).to_string(), "2GBps");
    }

    #[test]
    fn print_then_parse() {
        let bw = Bandwidth::new(250 * K);
        assert_eq!(bw.to_string().parse::<Bandwidth>().unwrap(), bw);
    }

    #[test]
    fn parse_invalid_strings() {
        assert!("42".parse::<Bandwidth>().is_err()); // no unit
        assert!("kBps".parse::<Bandwidth>().is_err()); // no number
        assert!("".parse::<Bandwidth>().is_err()); // empty
        assert!("42MBps extra".parse::<Bandwidth>().is_err()); // trailing token
        assert!("99999999999999999999GBps".parse::<Bandwidth>().is_err()); // overflow
    }

    #[test]
    fn transfer_time() {
        let bw = Bandwidth::new(10);

        assert_eq!(bw.transfer_secs(50), 5.0);
        assert_eq!(bw.bytes_in(3.0), 30.0);
        assert_eq!(Bandwidth::new(0).transfer_time(1), Duration::MAX);
    }
}
