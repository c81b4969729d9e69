#![cfg_attr(not(test), no_std)]

// This mod MUST go first, so that the others see its macros.
mod fmt;

pub mod blocking;
pub mod command;
pub mod config;
pub mod digest;
pub mod error;
pub mod urc;

#[cfg(test)]
mod test_helpers;

pub use atat;

pub use blocking::{CertificateLoader, Modem, SecurityData, Sms};
pub use config::{ModemConfig, Transport};
pub use digest::ResultCode;
pub use error::Error;
pub use urc::UrcHandler;

/// Baud rate the module boots with. Anything above this is negotiated with
/// `AT+IPR` during `begin`.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;
