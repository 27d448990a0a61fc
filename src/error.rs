//! Crate-wide error taxonomy (§7 ERROR HANDLING DESIGN).
//!
//! A fatal error transitions the interface to a sink state: every subsequent
//! public call fails with [`CoreError::Usage`] except `finalize`, which stays
//! best-effort. Non-convergence of an implicit window is *not* modeled here;
//! it is an ordinary control-flow outcome (see `crate::scheme::Outcome`).

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, CoreError>;

/// The five error kinds from §7, plus the sink-state `Usage` variant from
/// §5's "Resource scoping" discussion (finalize-twice, call-after-fatal).
#[derive(Debug, Error)]
pub enum CoreError {
    /// Misuse by solver code or configuration: wrong state, out-of-range
    /// ids, `dt <= 0`, scalar/vector mismatch, unmatched participant name,
    /// duplicate data, unfulfilled action.
    #[error("precondition violated: {0}")]
    Precondition(String),

    /// Misuse detected while the state machine was otherwise healthy, e.g.
    /// a timestep mismatch across ranks, or first-participant rules.
    #[error("user error: {0}")]
    User(String),

    /// Static XML issues detected during construction; abort before
    /// `Initialized`.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A peer sent a message violating the scheme's expected ordering or
    /// payload layout.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Lower-level I/O failure from a communication channel.
    #[error("transport error: {0}")]
    Transport(String),

    /// A programming invariant was broken inside the core. Distinct from
    /// `User` because no caller-supplied input can trigger it.
    #[error("internal invariant violated: {0}")]
    Internal(String),

    /// The interface already reached a terminal state (prior fatal error,
    /// or `finalize` called twice); every call but `finalize` fails this way.
    #[error("usage error: {0}")]
    Usage(String),
}

impl CoreError {
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    pub fn user(msg: impl Into<String>) -> Self {
        Self::User(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }
}

/// Panics in debug builds, and in release builds returns
/// `Err(CoreError::Internal(..))`, for the handful of invariants the spec
/// calls out as programming bugs rather than user error (§7).
#[macro_export]
macro_rules! internal_invariant {
    ($cond:expr, $($msg:tt)*) => {
        if !$cond {
            debug_assert!($cond, $($msg)*);
            return Err($crate::error::CoreError::internal(format!($($msg)*)));
        }
    };
}
