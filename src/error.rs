//! # Error Types
//!
//! This module defines the error type returned by every print operation.
//!
//! Each variant is one failure category an operator can act on: a missing
//! host capability, no printer chosen, the wrong printer chosen, or a
//! transfer that broke partway through.

use thiserror::Error;

/// Main error type for comanda operations
#[derive(Debug, Error)]
pub enum PrintError {
    /// Host platform lacks the transport API entirely
    #[error("Transport not supported: {0}")]
    CapabilityAbsent(String),

    /// No device selected, or the user declined pairing
    #[error("Discovery failed: {0}")]
    Discovery(String),

    /// Device found but the expected service, characteristic or endpoint is absent
    #[error("Negotiation failed: {0}")]
    Negotiation(String),

    /// Write or transfer failed while delivering the receipt
    #[error("Transfer failed: {0}")]
    Transfer(String),

    /// Order or layout input could not be read or parsed
    #[error("Invalid input: {0}")]
    Input(String),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure category, for callers that branch on the kind of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    CapabilityAbsent,
    Discovery,
    Negotiation,
    Transfer,
    Input,
}

impl PrintError {
    /// Category of this failure.
    pub fn kind(&self) -> FailureKind {
        match self {
            PrintError::CapabilityAbsent(_) => FailureKind::CapabilityAbsent,
            PrintError::Discovery(_) => FailureKind::Discovery,
            PrintError::Negotiation(_) => FailureKind::Negotiation,
            PrintError::Transfer(_) => FailureKind::Transfer,
            PrintError::Input(_) | PrintError::Io(_) => FailureKind::Input,
        }
    }

    /// Plain-language message naming the failure category, for operator alerts.
    pub fn notice(&self) -> &'static str {
        match self {
            PrintError::CapabilityAbsent(_) => "printer transport not supported on this device",
            PrintError::Discovery(_) => "no printer selected",
            PrintError::Negotiation(_) => "printer endpoint not found, check that the right printer was chosen",
            PrintError::Transfer(_) => "connection failed, check that the printer is on and try again",
            PrintError::Input(_) => "invalid order or layout",
            PrintError::Io(_) => "I/O error",
        }
    }
}

/// Result type for print operations
pub type PrintResult<T> = Result<T, PrintError>;
