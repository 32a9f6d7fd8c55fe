//! NTRIP rover client.
//!
//! Maintains a durable subscription to an NTRIP caster: position
//! acquisition, HTTP-like handshake with Basic auth against a named
//! mountpoint, periodic upstream GGA reporting, continuous RTCM reception,
//! and automatic reconnection with exponential backoff. See [`NtripClient`].

pub mod config;
pub mod gga;
pub mod state;
pub mod version;

mod client;
pub use client::NtripClient;

mod controller;
mod credentials;
mod handshake;
mod session;

mod error;
pub use error::NtripClientError;
