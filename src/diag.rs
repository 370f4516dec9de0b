//! Diagnostics.

use std::fmt::{self, Display, Formatter};

use ecow::EcoString;
use serde::{Deserialize, Serialize};

use crate::layout::BlockId;

/// The result type for layouting and all its subpasses.
pub type LayoutResult<T> = Result<T, Error>;

/// A result type with a string error message.
pub type StrResult<T> = Result<T, EcoString>;

/// A fatal error that aborts the build.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Error {
    /// The input was unusable: a malformed tree, an unknown font, a missing
    /// image.
    Input(EcoString),
    /// The engine violated one of its own invariants, e.g. produced a
    /// negative dimension or a non-monotone overflow adjustment.
    Internal {
        /// The solver iteration during which the invariant broke (0 for the
        /// initial layout pass).
        iteration: usize,
        /// The block being processed, if any.
        block: Option<BlockId>,
        /// What went wrong.
        message: EcoString,
    },
}

impl Error {
    /// Create an internal invariant error.
    pub fn internal(
        iteration: usize,
        block: Option<BlockId>,
        message: impl Into<EcoString>,
    ) -> Self {
        Self::Internal { iteration, block, message: message.into() }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Input(message) => write!(f, "input error: {message}"),
            Self::Internal { iteration, block, message } => {
                write!(f, "internal invariant violated: {message} (iteration {iteration}")?;
                if let Some(block) = block {
                    write!(f, ", block {block:?}")?;
                }
                write!(f, ")")
            }
        }
    }
}

impl std::error::Error for Error {}

/// How severe a diagnostic is.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Must be fixed for the output to be usable.
    Error,
    /// Should be fixed, the output degrades without it.
    Warning,
    /// Nice to fix.
    Info,
}

/// A non-fatal diagnostic emitted while layouting.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    /// The diagnostic's severity.
    pub severity: Severity,
    /// The id of the rule that produced this warning, if it came out of the
    /// constraint solver.
    pub rule: Option<EcoString>,
    /// The offending block, if any.
    pub block: Option<BlockId>,
    /// The zero-based page the warning concerns, if any.
    pub page: Option<usize>,
    /// A human-readable description.
    pub message: EcoString,
}

impl Warning {
    /// Create a bare warning without rule or position information.
    pub fn bare(severity: Severity, message: impl Into<EcoString>) -> Self {
        Self {
            severity,
            rule: None,
            block: None,
            page: None,
            message: message.into(),
        }
    }
}

/// Diagnostics accumulated over the course of a build.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct Feedback {
    /// The accumulated warnings, in emission order.
    pub warnings: Vec<Warning>,
}

impl Feedback {
    /// Create an empty feedback.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a warning.
    pub fn warn(&mut self, warning: Warning) {
        self.warnings.push(warning);
    }

    /// Merge two feedbacks into one.
    pub fn join(mut self, other: Self) -> Self {
        self.warnings.extend(other.warnings);
        self
    }
}

/// The result of a subpass: an output value plus the diagnostics the pass
/// generated along the way.
#[derive(Debug, Clone)]
pub struct Pass<T> {
    /// The output of this pass.
    pub output: T,
    /// The diagnostics generated in this pass.
    pub feedback: Feedback,
}

impl<T> Pass<T> {
    /// Create a new pass from output and feedback.
    pub fn new(output: T, feedback: Feedback) -> Self {
        Self { output, feedback }
    }
}

/// Early-return with an [`Error::Input`].
macro_rules! bail {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        return Err($crate::diag::Error::Input(ecow::eco_format!($fmt $(, $arg)*)))
    };
}

pub(crate) use bail;
