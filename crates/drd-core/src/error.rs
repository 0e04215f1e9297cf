// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use std::fmt;

/// Unexpected failures: malformed input, I/O, numerical breakdown.
///
/// Expected policy rejections are not errors; they are [`SkipReason`] values
/// carried inside `EntityOutcome::Skipped`.
#[derive(Debug)]
pub enum DrdError {
    InvalidInput(String),
    NumericalIssue(String),
    Io {
        context: String,
        source: std::io::Error,
    },
}

impl DrdError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn numerical_issue(msg: impl Into<String>) -> Self {
        Self::NumericalIssue(msg.into())
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Stable machine-readable code, used by the CLI error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::NumericalIssue(_) => "numerical_issue",
            Self::Io { .. } => "io_error",
        }
    }
}

impl fmt::Display for DrdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput(msg) => write!(f, "{msg}"),
            Self::NumericalIssue(msg) => write!(f, "{msg}"),
            Self::Io { context, source } => write!(f, "{context}: {source}"),
        }
    }
}

impl std::error::Error for DrdError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::InvalidInput(_) | Self::NumericalIssue(_) => None,
        }
    }
}

/// Expected per-entity policy rejections.
///
/// All five are terminal for the entity, logged, counted as skips, and never
/// abort the batch.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub enum SkipReason {
    /// Constant series: z-scores are undefined when the standard deviation is zero.
    DegenerateSeries,
    /// Null-signal or too-short series, rejected before the oracle runs.
    InsufficientData { detail: String },
    /// The external decomposition failed (non-convergence, numerical error, budget expiry).
    OracleFailure { cause: String },
    /// No downward changepoint inside the event window (or no changepoints at all).
    NoChangepointInWindow,
    /// Pre/post deviation distributions are not distinguishable from noise.
    NotSignificant { p_value: f64 },
}

impl SkipReason {
    pub fn insufficient_data(detail: impl Into<String>) -> Self {
        Self::InsufficientData {
            detail: detail.into(),
        }
    }

    pub fn oracle_failure(cause: impl Into<String>) -> Self {
        Self::OracleFailure {
            cause: cause.into(),
        }
    }

    /// Stable machine-readable code for logs and counters.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DegenerateSeries => "degenerate_series",
            Self::InsufficientData { .. } => "insufficient_data",
            Self::OracleFailure { .. } => "oracle_failure",
            Self::NoChangepointInWindow => "no_changepoint_in_window",
            Self::NotSignificant { .. } => "not_significant",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DegenerateSeries => {
                write!(f, "degenerate series: standard deviation is zero")
            }
            Self::InsufficientData { detail } => write!(f, "insufficient data: {detail}"),
            Self::OracleFailure { cause } => write!(f, "oracle failure: {cause}"),
            Self::NoChangepointInWindow => {
                write!(f, "no qualifying changepoint inside the event window")
            }
            Self::NotSignificant { p_value } => {
                write!(f, "pre/post difference not significant (p={p_value:.4})")
            }
        }
    }
}
