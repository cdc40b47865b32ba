//! # GridWire VTN Library
//!
//! This crate provides the server role ("Virtual Top Node") of the
//! GridWire demand-response system.
//!
//! ## Overview
//!
//! The VTN is the service VENs register with, poll and report to. It
//! provides:
//!
//! - **Handler Registry**: Named handler slots for registration, poll,
//!   event and report messages, validated at startup
//! - **Dispatch Pipeline**: Decode, replay check, signature
//!   verification, endpoint admission and handler invocation with a
//!   fixed failure-to-outcome mapping
//! - **HTTP Service**: The well-known `OpenADR2/Simple/2.0b` service
//!   paths on an axum listener with graceful shutdown
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vtn::{HandlerOutcome, HandlerRegistry, VtnConfig, VtnServer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut registry = HandlerRegistry::new();
//!     registry.add_handler("on_create_party_registration", |_envelope| async {
//!         Ok(HandlerOutcome::RegistrationAccepted {
//!             ven_id: "ven123".to_string(),
//!             registration_id: "reg456".to_string(),
//!         })
//!     })?;
//!
//!     let config = VtnConfig::new("MyVTN");
//!     let server = VtnServer::start(config, registry, "127.0.0.1:8080".parse()?).await?;
//!
//!     // ... serve until shutdown ...
//!
//!     server.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Server configuration
//! - [`dispatch`]: Handler contract and the dispatch pipeline
//! - [`service`]: HTTP route layer
//! - [`server`]: Server lifecycle

pub mod config;
pub mod dispatch;
pub mod server;
pub mod service;

// Re-export protocol for convenience
pub use protocol;

pub use config::{VtnConfig, VtnSigning, DEFAULT_HANDLER_TIMEOUT, DEFAULT_REQUESTED_POLL_FREQ};
pub use dispatch::{
    Dispatcher, EventTag, Handler, HandlerError, HandlerOutcome, HandlerRegistry, HandlerResult,
    HttpReply, RegistryError,
};
pub use server::VtnServer;
