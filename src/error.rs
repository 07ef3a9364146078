//! Unified error types for ble2lora.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! With the `defmt` feature they implement `defmt::Format` for
//! efficient on-target logging.

use crate::ble::channel::ChannelId;

/// Top-level error type used across the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The BLE stack failed or the link went away.
    Transport(TransportError),

    /// A characteristic payload could not be used.
    Channel(ChannelError),

    /// Flash read/write failed.
    Storage(StoreError),
}

/// Failures reported by the BLE transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// Advertising could not be started or was aborted.
    AdvertiseFailed,
    /// The peer is gone (or there never was one).
    Disconnected,
    /// The stack refused a notification.
    NotifyFailed,
    /// Raw error code from the stack.
    Raw(u32),
}

/// Problems with a single characteristic payload or operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelError {
    /// Payload longer than the receiving buffer.
    Oversized,
    /// Payload is not valid UTF-8 text.
    NotText,
    /// Payload is empty after trimming.
    Empty,
    /// The channel does not support the requested operation.
    Unsupported(ChannelId),
}

/// Persistent storage failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreError {
    /// Flash read/write/erase failed.
    Flash,
    /// A record was found but does not decode.
    Corrupt,
}

// Convenience conversions

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Error::Transport(e)
    }
}

impl From<ChannelError> for Error {
    fn from(e: ChannelError) -> Self {
        Error::Channel(e)
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Error::Storage(e)
    }
}
