//! # Connectors API Library
//!
//! This library provides the connector SDK (trait, metadata, registry), the
//! bundled MySQL connector and the HTTP service that hosts them.

pub mod auth;
pub mod config;
pub mod connectors;
pub mod error;
pub mod handlers;
pub mod server;
pub mod telemetry;
