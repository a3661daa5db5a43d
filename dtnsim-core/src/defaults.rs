use crate::measure::Bandwidth;
use std::time::Duration;

/// Default [`Bandwidth`] of a [`Connection`]
///
/// ```
/// # use dtnsim_core::defaults::*;
/// assert_eq!(DEFAULT_BANDWIDTH.to_string(), "250kBps");
/// ```
///
/// [`Connection`]: crate::connection::Connection
pub const DEFAULT_BANDWIDTH: Bandwidth = Bandwidth::new(250 * 1_024);

/// Default capacity of a router's message buffer, in bytes
pub const DEFAULT_BUFFER_SIZE: u64 = 5 * 1_024 * 1_024;

/// Default number of `(message, neighbour)` pairs remembered by a router
/// to avoid sending the same message twice to the same neighbour
pub const DEFAULT_HISTORY_SIZE: usize = 1_000;

/// Default interval between two recomputations of the non-direct messages
/// a router offers to its neighbours
pub const DEFAULT_MESSAGE_ORDERING_INTERVAL: Duration = Duration::from_secs(5);

// delivery predictability

pub const DEFAULT_DP_SUMMAND: f64 = 0.75;
pub const DEFAULT_DP_GAMMA: f64 = 0.95;
pub const DEFAULT_DP_BETA: f64 = 0.25;
pub const DEFAULT_DP_TIME_UNIT: Duration = Duration::from_secs(2);

// windowed estimators

pub const DEFAULT_EV_AGING_FACTOR: f64 = 0.3;
pub const DEFAULT_EV_WINDOW: Duration = Duration::from_millis(21_300);
pub const DEFAULT_RD_WINDOW: Duration = Duration::from_secs(12);

// buffer eviction

/// messages that did at least this many hops lose their high rank
pub const DEFAULT_HOP_THRESHOLD: u32 = 6;
/// messages buffered for at least this long lose their high rank
pub const DEFAULT_AGE_THRESHOLD: Duration = Duration::from_secs(300);

// send prioritization

pub const DEFAULT_HEAD_START_THRESHOLD: Duration = Duration::from_millis(30_400);
pub const DEFAULT_PRIORITY_THRESHOLD: u32 = 4;
pub const DEFAULT_PRIORITIZATION_DP_WEIGHT: f64 = 0.8;

// utility based message choosing

pub const DEFAULT_PROPHET_PLUS_WEIGHT: f64 = 0.65;
pub const DEFAULT_UTILITY_DP_WEIGHT: f64 = 0.95;
pub const DEFAULT_UTILITY_POWER_WEIGHT: f64 = 0.05;
pub const DEFAULT_UTILITY_RD_WEIGHT: f64 = 0.25;
pub const DEFAULT_UTILITY_EV_WEIGHT: f64 = 0.1;
pub const DEFAULT_UTILITY_THRESHOLD: f64 = 0.2;
pub const DEFAULT_DATA_UTILITY_THRESHOLD: f64 = 0.2;
/// neighbours below this remaining energy ratio are not offered anything
pub const DEFAULT_UTILITY_POWER_THRESHOLD: f64 = 0.1;

// energy

/// below this remaining energy ratio a router switches to rescue mode
pub const DEFAULT_POWER_THRESHOLD: f64 = 0.1;
/// neighbours below this remaining energy ratio get nothing in rescue mode
pub const DEFAULT_RESCUE_POWER_THRESHOLD: f64 = 0.1;
/// in rescue mode only data modified that recently is shared
pub const DEFAULT_SHORT_TIMESPAN_THRESHOLD: Duration = Duration::from_secs(120);
