//! # GridWire VEN Library
//!
//! This crate provides the client role ("Virtual End Node") of the
//! GridWire demand-response system.
//!
//! ## Overview
//!
//! The VEN registers with a VTN, polls it on a cadence and answers
//! distributed events with opt decisions. It provides:
//!
//! - **Transport**: Signed request/response round trips over HTTP with
//!   response signature pinning
//! - **Registration Flow**: Party registration and cancellation with
//!   clean abort on denial
//! - **Poll Loop**: A resilient background loop that swallows soft
//!   failures and keeps its cadence
//! - **Report Flows**: Report registration and data delivery
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ven::{VenClient, VenConfig};
//! use ven::protocol::messages::OptType;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = VenConfig::new("MyVEN", "http://vtn.example:8080/OpenADR2/Simple/2.0b");
//!     let mut client = VenClient::new(config)?;
//!     client.set_event_handler(|events| async move {
//!         println!("got {} events", events.len());
//!         OptType::OptIn
//!     });
//!
//!     if client.register().await.is_some() {
//!         client.start_polling();
//!     }
//!
//!     // ... run until shutdown ...
//!
//!     client.stop();
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Client configuration
//! - [`transport`]: HTTP round trips
//! - [`client`]: Registration, polling and report flows

pub mod client;
pub mod config;
pub mod transport;

// Re-export protocol for convenience
pub use protocol;

pub use client::{EventHandler, VenClient};
pub use config::{VenConfig, DEFAULT_POLL_INTERVAL, DEFAULT_REQUEST_TIMEOUT};
pub use transport::{Transport, TransportError};
