//! Error types for the stampede core library.

use crate::gateway::GatewayError;
use crate::lifecycle::ActivityStatus;
use crate::retry::{PollError, RetryError};
use std::time::Duration;
use thiserror::Error;

/// Main error type for stampede operations.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Invalid or missing configuration. Fails fast at startup, never retried.
    #[error("configuration error: {message}")]
    Configuration {
        /// What was wrong with the configuration.
        message: String,
    },

    /// The backend gateway reported a failure.
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// A caller requested a transition outside the lifecycle table.
    #[error("illegal tenant transition: {from} -> {to}")]
    IllegalTransition {
        /// Observed current status.
        from: ActivityStatus,
        /// Requested target status.
        to: ActivityStatus,
    },

    /// A retried operation failed on every attempt.
    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetryExhausted {
        /// How many attempts were made.
        attempts: usize,
        /// The failure observed on the final attempt.
        last: GatewayError,
    },

    /// Convergence polling did not observe the expected state in time.
    #[error("convergence polling timed out after {waited:?}")]
    ConvergenceTimeout {
        /// How long the poll waited before giving up.
        waited: Duration,
    },
}

impl Error {
    /// Shorthand for a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }
}

impl From<RetryError<GatewayError>> for Error {
    fn from(err: RetryError<GatewayError>) -> Self {
        let RetryError::Exhausted { attempts, last } = err;
        Self::RetryExhausted { attempts, last }
    }
}

impl From<PollError> for Error {
    fn from(err: PollError) -> Self {
        let PollError::Timeout { waited } = err;
        Self::ConvergenceTimeout { waited }
    }
}

/// Result type alias for stampede operations.
pub type Result<T> = std::result::Result<T, Error>;
