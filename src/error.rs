//! Error types for the control channel agent.

use std::collections::TryReserveError;
use std::io;
use std::net::Ipv4Addr;

use thiserror::Error;

use crate::ofp_queue::QueueEntry;

/// Failures raised while running the control channel.
///
/// Everything except `SetupFailure` is contained to the message being handled;
/// the session loop logs it and keeps going.
#[derive(Error, Debug)]
pub enum OfpError {
    /// A message buffer could not be obtained.
    #[error("failed to allocate message buffer")]
    AllocationFailure(#[from] TryReserveError),
    /// Sending to or receiving from the controller failed.
    #[error("transport failure: {0}")]
    Transport(#[from] io::Error),
    /// Received bytes are too short or disagree with the header length.
    #[error("malformed message: {reason} ({len} bytes)")]
    MalformedMessage { reason: &'static str, len: usize },
    /// An outgoing message does not fit the 16-bit header length field.
    #[error("message of {0} bytes exceeds the header length field")]
    MessageTooLarge(usize),
    /// No local interface could be bound to the controller address.
    #[error("no interface found for controller address {0}")]
    ResolutionFailure(Ipv4Addr),
    /// A bounded queue refused a new entry. The entry is handed back unsent.
    #[error("cross-path queue is full")]
    QueueFull(QueueEntry),
    /// Session bring-up failed; the session never started.
    #[error("session setup failed: {0}")]
    SetupFailure(#[source] Box<OfpError>),
}

impl OfpError {
    pub(crate) fn malformed(reason: &'static str, len: usize) -> OfpError {
        OfpError::MalformedMessage {
            reason: reason,
            len: len,
        }
    }

    pub(crate) fn setup(cause: OfpError) -> OfpError {
        OfpError::SetupFailure(Box::new(cause))
    }
}

pub type Result<T> = std::result::Result<T, OfpError>;
