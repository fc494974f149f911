// src/error.rs
//! Unified error handling for the decomposition engine
//!
//! Every fallible operation in the crate returns [`DecompResult`]. Errors carry an
//! [`ErrorContext`] naming the component and operation that raised them, so a
//! failure deep inside conditioning still tells the caller which grid step broke.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

use crate::config::loader::ConfigError;

/// Unified error type for the decomposition engine
#[derive(Debug, Clone, Error)]
pub enum DecompError {
    /// Invalid or inconsistent configuration, raised before any work starts
    #[error("[CONFIG] Configuration error in {component}: {reason} ({})", .context.operation)]
    Configuration {
        component: String,
        reason: String,
        context: ErrorContext,
    },

    /// Malformed input bundle
    #[error("[DATA] Invalid {data_type}: {reason} ({})", .context.operation)]
    InvalidData {
        data_type: String,
        reason: String,
        context: ErrorContext,
    },

    /// Degenerate numerics (zero variance, ill-conditioned covariance, too few spikes)
    #[error("[NUMERIC] {stage} stage error: {reason} ({})", .context.operation)]
    Numeric {
        stage: ProcessingStage,
        reason: String,
        context: ErrorContext,
    },

    /// Segmentation produced nothing to analyse
    #[error("[SEGMENT] No usable analysis window: {reason}")]
    NoUsableWindows { reason: String },

    /// One electrode grid could not be processed
    #[error("[GRID] Grid {grid} failed: {reason}")]
    GridFailed { grid: usize, reason: String },

    /// Every electrode grid failed
    #[error("[SESSION] All {grids} grid(s) failed")]
    AllGridsFailed { grids: usize },

    /// Cooperative cancellation was requested
    #[error("[SESSION] Decomposition cancelled")]
    Cancelled,

    /// Configuration file loading errors
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Processing stages for error tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessingStage {
    Filtering,
    Whitening,
    Refinement,
}

impl fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessingStage::Filtering => "FILTERING",
            ProcessingStage::Whitening => "WHITENING",
            ProcessingStage::Refinement => "REFINEMENT",
        };
        write!(f, "{}", name)
    }
}

/// Error context for debugging and analysis
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorContext {
    pub component: String,
    pub operation: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub additional_info: HashMap<String, String>,
}

impl ErrorContext {
    /// Create a new error context
    pub fn new(component: &str, operation: &str) -> Self {
        Self {
            component: component.to_string(),
            operation: operation.to_string(),
            ..Self::default()
        }
    }

    /// Create error context with file and line information
    pub fn with_location(component: &str, operation: &str, file: &str, line: u32) -> Self {
        let mut context = Self::new(component, operation);
        context.file = Some(file.to_string());
        context.line = Some(line);
        context
    }

    /// Add additional information to the context
    pub fn add_info<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.additional_info.insert(key.into(), value.into());
        self
    }
}

/// Macro for creating error context with file and line info
#[macro_export]
macro_rules! error_context {
    ($component:expr, $operation:expr) => {
        $crate::error::ErrorContext::with_location($component, $operation, file!(), line!())
    };
}

impl DecompError {
    /// Whether the session recovers from this error locally and keeps going
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DecompError::Numeric { .. } | DecompError::GridFailed { .. })
    }

    /// Numeric degeneracy shorthand used throughout the processing modules
    pub fn numeric(stage: ProcessingStage, component: &str, reason: impl Into<String>) -> Self {
        DecompError::Numeric {
            stage,
            reason: reason.into(),
            context: ErrorContext::new(component, &stage.to_string().to_lowercase()),
        }
    }
}

/// Result type alias for decomposition operations
pub type DecompResult<T> = Result<T, DecompError>;

/// Error builder for convenient error construction
pub struct DecompErrorBuilder {
    component: String,
    operation: String,
}

impl DecompErrorBuilder {
    pub fn new(component: &str, operation: &str) -> Self {
        Self {
            component: component.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn configuration(self, reason: &str) -> DecompError {
        let context = ErrorContext::new(&self.component, &self.operation);
        DecompError::Configuration {
            component: self.component,
            reason: reason.to_string(),
            context,
        }
    }

    pub fn invalid_data(self, data_type: &str, reason: &str) -> DecompError {
        DecompError::InvalidData {
            data_type: data_type.to_string(),
            reason: reason.to_string(),
            context: ErrorContext::new(&self.component, &self.operation),
        }
    }

    pub fn numeric(self, stage: ProcessingStage, reason: &str) -> DecompError {
        DecompError::Numeric {
            stage,
            reason: reason.to_string(),
            context: ErrorContext::new(&self.component, &self.operation),
        }
    }
}
