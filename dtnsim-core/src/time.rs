//! Simulated time.
//!
//! All components read "now" from a [`Clock`] handle owned by whoever
//! drives the simulation (usually the [`Network`]). There is no global
//! clock: components that need the time receive a clone of the handle or
//! a [`SimTime`] argument.
//!
//! [`Network`]: crate::network::Network

use anyhow::{Result, anyhow, bail, ensure};
use logos::{Lexer, Logos};
use std::{
    fmt,
    ops::{Add, AddAssign},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

/// A point in simulated time, in seconds since the start of the run.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct SimTime(f64);

impl SimTime {
    pub const ZERO: Self = Self(0.0);

    /// create a [`SimTime`] from a number of seconds
    ///
    /// ```
    /// # use dtnsim_core::time::SimTime;
    /// let t = SimTime::from_secs(4.0);
    /// assert_eq!(t.as_secs(), 4.0);
    /// ```
    pub const fn from_secs(secs: f64) -> Self {
        Self(secs)
    }

    #[inline]
    pub const fn as_secs(self) -> f64 {
        self.0
    }

    /// seconds elapsed between `earlier` and `self`, `0.0` if `earlier`
    /// is in the future.
    #[inline]
    pub fn secs_since(self, earlier: SimTime) -> f64 {
        (self.0 - earlier.0).max(0.0)
    }

    /// [`Duration`] elapsed between `earlier` and `self`, saturating at zero.
    pub fn duration_since(self, earlier: SimTime) -> Duration {
        Duration::from_secs_f64(self.secs_since(earlier))
    }
}

impl Add<Duration> for SimTime {
    type Output = SimTime;
    fn add(self, rhs: Duration) -> Self::Output {
        SimTime(self.0 + rhs.as_secs_f64())
    }
}

impl AddAssign<Duration> for SimTime {
    fn add_assign(&mut self, rhs: Duration) {
        self.0 += rhs.as_secs_f64();
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

/// Shared handle on the simulated clock.
///
/// Cloning the handle shares the same underlying time: advancing one
/// clone is observed by all of them. The time is monotonic, attempts to
/// move it backwards are ignored.
///
/// ```
/// # use dtnsim_core::time::{Clock, SimTime};
/// # use std::time::Duration;
/// let clock = Clock::new();
/// let observer = clock.clone();
///
/// clock.advance(Duration::from_secs(3));
/// assert_eq!(observer.now(), SimTime::from_secs(3.0));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Clock(Arc<AtomicU64>);

impl Clock {
    pub fn new() -> Self {
        Self::starting_at(SimTime::ZERO)
    }

    pub fn starting_at(time: SimTime) -> Self {
        Self(Arc::new(AtomicU64::new(time.0.to_bits())))
    }

    #[inline]
    pub fn now(&self) -> SimTime {
        SimTime(f64::from_bits(self.0.load(Ordering::Acquire)))
    }

    /// move the clock forward by `step`, returning the new time
    pub fn advance(&self, step: Duration) -> SimTime {
        let next = self.now() + step;
        self.set(next);
        next
    }

    /// set the clock to `time` if it is not earlier than the current time
    pub fn set(&self, time: SimTime) {
        let current = self.now();
        debug_assert!(
            time >= current,
            "simulated time cannot go backward ({current} -> {time})"
        );
        if time > current {
            self.0.store(time.0.to_bits(), Ordering::Release);
        }
    }
}

/// Parse a human readable duration such as `"30s"`, `"1m 30s"` or `"2h"`.
///
/// Several `<number><unit>` pairs are summed up. Accepted units are
/// `ns`, `us`, `ms`, `s`, `m` and `h`.
///
/// ```
/// # use dtnsim_core::time::parse_duration;
/// # use std::time::Duration;
/// assert_eq!(parse_duration("1m 30s").unwrap(), Duration::from_secs(90));
/// ```
pub fn parse_duration(s: &str) -> Result<Duration> {
    let mut lex = Lexer::<'_, Token>::new(s);

    let mut total = Duration::ZERO;
    let mut parsed_any = false;

    while let Some(next) = lex.next() {
        let number: Token = next.map_err(|()| anyhow!("Failed to parse: {s}"))?;

        ensure!(
            number == Token::Value,
            "Expecting duration to start with a number. Cannot parse {s}"
        );
        let number: u64 = lex.slice().parse()?;

        let Some(Ok(measure)) = lex.next() else {
            bail!("Expecting a measure, failed to parse: {s}")
        };
        total += match measure {
            Token::NanoSeconds => Duration::from_nanos(number),
            Token::MicroSeconds => Duration::from_micros(number),
            Token::MilliSeconds => Duration::from_millis(number),
            Token::Seconds => Duration::from_secs(number),
            Token::Minutes => Duration::from_secs(number * 60),
            Token::Hours => Duration::from_secs(number * 3_600),
            Token::Value => bail!("Failed to parse `{s}', expecting a measure."),
        };
        parsed_any = true;
    }

    ensure!(parsed_any, "Expecting a duration, found nothing to parse");

    Ok(total)
}

#[derive(Logos, Debug, PartialEq)]
#[logos(skip r"[ \t\n\f]+")]
enum Token {
    #[token("ns")]
    NanoSeconds,
    #[regex("us|μs")]
    MicroSeconds,
    #[token("ms")]
    MilliSeconds,
    #[token("s")]
    Seconds,
    #[token("m")]
    Minutes,
    #[token("h")]
    Hours,

    #[regex("[0-9]+")]
    Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logos_lexer() {
        let mut lex = Token::lexer("12h");

        assert_eq!(lex.next(), Some(Ok(Token::Value)));
        assert_eq!(lex.slice(), "12");

        assert_eq!(lex.next(), Some(Ok(Token::Hours)));
        assert_eq!(lex.span(), 2..3);
    }

    #[test]
    fn parse() {
        assert_eq!(parse_duration("123ms").unwrap(), Duration::from_millis(123));
        assert_eq!(
            parse_duration("1s 2000ms 3000000us").unwrap(),
            Duration::from_secs(6)
        );
        assert_eq!(parse_duration("1h 1m").unwrap(), Duration::from_secs(3_660));
    }

    #[test]
    fn parse_invalid() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("12").is_err());
        assert!(parse_duration("s").is_err());
        assert!(parse_duration("3 parsecs").is_err());
    }

    #[test]
    fn clock_is_shared_between_clones() {
        let clock = Clock::new();
        let other = clock.clone();

        clock.advance(Duration::from_millis(1_500));
        assert_eq!(other.now().as_secs(), 1.5);

        other.advance(Duration::from_secs(1));
        assert_eq!(clock.now().as_secs(), 2.5);
    }

    #[test]
    fn elapsed_saturates() {
        let early = SimTime::from_secs(2.0);
        let late = SimTime::from_secs(5.0);

        assert_eq!(late.secs_since(early), 3.0);
        assert_eq!(early.secs_since(late), 0.0);
        assert_eq!(early.duration_since(late), Duration::ZERO);
    }
}
