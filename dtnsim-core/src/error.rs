//! Errors shared by every component of the decision core.
//!
//! * [`ConfigError`]: a setting is missing or outside its valid range.
//!   Raised once, at construction, and expected to abort the run.
//! * [`UsageError`]: a component was asked for a value outside of its
//!   contract. This is a programming error in the caller.
//!
//! Transient simulation events (a contact lost in the middle of a
//! transfer, a full buffer) are not errors of this module: they are
//! reported through the dedicated outcome types of the [`router`] and
//! [`connection`] modules.
//!
//! [`router`]: crate::router
//! [`connection`]: crate::connection

use crate::message::{MessageId, MessageKindTag};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{name} must be in [{min}, {max}], but is {value}")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("{name} must be positive, but is {value}")]
    NotPositive { name: &'static str, value: f64 },
    #[error("{name} must not be negative, but is {value}")]
    Negative { name: &'static str, value: f64 },
    #[error("Weights must sum up to 1, but sum up to {sum}")]
    WeightSum { sum: f64 },
    #[error("Missing setting `{name}'")]
    Missing { name: String },
    #[error("Invalid value `{value}' for `{name}': {reason}")]
    Invalid {
        name: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    #[error("Delivery predictability is undefined for {kind} message ({id})")]
    PredictabilityUndefined { id: MessageId, kind: MessageKindTag },
    #[error("Asked for the replications density of a non-stored message ({id})")]
    UntrackedMessage { id: MessageId },
    #[error("Cannot prioritize broadcast message ({id}), broadcasts use the direct path")]
    BroadcastCandidate { id: MessageId },
}

impl ConfigError {
    /// check `value` lies within `[0, 1]`
    ///
    /// ```
    /// # use dtnsim_core::error::ConfigError;
    /// assert!(ConfigError::check_unit("beta", 0.25).is_ok());
    /// assert!(ConfigError::check_unit("beta", 1.25).is_err());
    /// ```
    pub fn check_unit(name: &'static str, value: f64) -> Result<f64, Self> {
        Self::check_range(name, value, 0.0, 1.0)
    }

    pub fn check_range(name: &'static str, value: f64, min: f64, max: f64) -> Result<f64, Self> {
        // NaN fails the range check as well.
        if (min..=max).contains(&value) {
            Ok(value)
        } else {
            Err(Self::OutOfRange {
                name,
                value,
                min,
                max,
            })
        }
    }

    pub fn check_positive(name: &'static str, value: f64) -> Result<f64, Self> {
        if value > 0.0 {
            Ok(value)
        } else {
            Err(Self::NotPositive { name, value })
        }
    }

    pub fn check_non_negative(name: &'static str, value: f64) -> Result<f64, Self> {
        if value >= 0.0 {
            Ok(value)
        } else {
            Err(Self::Negative { name, value })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_is_out_of_range() {
        let Err(error) = ConfigError::check_unit("gamma", f64::NAN) else {
            panic!("NaN should be rejected")
        };
        assert!(matches!(error, ConfigError::OutOfRange { name: "gamma", .. }));
    }

    #[test]
    fn positive_excludes_zero() {
        assert!(ConfigError::check_positive("window", 0.0).is_err());
        assert!(ConfigError::check_non_negative("threshold", 0.0).is_ok());
        assert!(ConfigError::check_non_negative("threshold", -0.1).is_err());
    }

    #[test]
    fn messages() {
        let error = ConfigError::WeightSum { sum: 0.9 };
        assert_eq!(error.to_string(), "Weights must sum up to 1, but sum up to 0.9");
    }
}
