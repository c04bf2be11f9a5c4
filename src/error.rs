use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Invalid wait configuration.
///
/// These are programmer errors and are returned before the first poll,
/// never as a [`WaitOutcome`](crate::WaitOutcome).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("timeout must be greater than zero")]
    NonPositiveTimeout,
    #[error("poll interval must be greater than zero")]
    NonPositiveInterval,
    #[error("backoff factor must be a finite number >= 1.0 (got {0})")]
    InvalidBackoff(f64),
    #[error("strategy chain contains no strategies")]
    EmptyStrategyChain,
    #[error("strategy '{label}' has a weight of zero")]
    ZeroWeight { label: String },
    #[error("strategy '{label}' received an empty share of the timeout budget")]
    BudgetTooSmall { label: String },
    #[error("invalid adaptive timeout configuration: {0}")]
    InvalidAdaptive(String),
}

/// Category of an error observed while evaluating a condition.
///
/// A [`PollPolicy`](crate::PollPolicy) lists the kinds that should be retried.
/// Every other kind aborts the wait immediately.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The target (element, frame, page) does not exist yet.
    NotFound,
    /// The target existed but was detached or re-rendered.
    Stale,
    NotInteractable,
    ClickIntercepted,
    /// An injected script threw.
    Script,
    /// Any other error reported by the automation driver.
    Driver,
    /// The application under test signalled a failure of its own.
    Application,
    /// A caller-defined category, such as `"spinner"`.
    Custom(Cow<'static, str>),
}

impl ErrorKind {
    pub fn custom<S: Into<Cow<'static, str>>>(name: S) -> Self {
        ErrorKind::Custom(name.into())
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::Stale => "stale",
            ErrorKind::NotInteractable => "not interactable",
            ErrorKind::ClickIntercepted => "click intercepted",
            ErrorKind::Script => "script error",
            ErrorKind::Driver => "driver error",
            ErrorKind::Application => "application error",
            ErrorKind::Custom(name) => return f.write_str(name),
        };
        f.write_str(name)
    }
}

/// An error reported by the observed system during a single poll.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ObservedError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ObservedError {
    pub fn new<S: Into<String>>(kind: ErrorKind, message: S) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn stale<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Stale, message)
    }

    pub fn application<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Application, message)
    }
}
