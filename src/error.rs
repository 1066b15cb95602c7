//! Error
//!
//! This module provides the errors shared by the weather client and server,
//! built with [`thiserror`].
//!
use std::io;
use thiserror::Error;

/// Result use the [`WeatherError`] as error.
pub type Result<T> = std::result::Result<T, WeatherError>;

/// WeatherError covers local failures: transport problems and bad caller input.
///
/// Protocol outcomes such as an unsupported city are not errors, they travel
/// as a [`crate::protocol::Status`] inside a normal response.
#[derive(Error, Debug)]
pub enum WeatherError {
    #[error("io error {0}")]
    /// IO relevant errors
    IOError(#[from] io::Error),

    /// The peer closed the stream before a whole record arrived.
    #[error("short read: expected {expected} bytes, received {received}")]
    Truncated {
        /// Size of the fixed record.
        expected: usize,
        /// Bytes actually read before end of stream.
        received: usize,
    },

    /// A weather type code that is not a single ASCII character
    #[error("invalid weather type {0:?}, expected one ASCII character")]
    InvalidType(String),

    /// Requests must name a city
    #[error("the city name is empty")]
    EmptyCity,

    /// A NUL inside the name would cut it short on the wire
    #[error("the city name contains a NUL byte at offset {0}")]
    NulInCity(usize),

    /// The `-r` argument could not be split into type and city
    #[error("malformed request argument {0:?}")]
    InvalidRequestArg(String),

    /// Host name resolution produced no IPv4 address
    #[error("could not resolve {0} to an IPv4 address")]
    Unresolved(String),
}
