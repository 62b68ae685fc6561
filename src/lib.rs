// src/lib.rs

//! Authentication discovery and session orchestration for cable modem
//! web interfaces.
//!
//! - `services::DiscoveryEngine` finds how a device authenticates
//! - `auth` holds one `AuthStrategy` per authentication family
//! - `hnap` implements the HNAP challenge-response handshake
//! - `pipeline::Orchestrator` runs poll cycles with session recovery and a
//!   circuit breaker

pub mod auth;
pub mod config;
pub mod error;
pub mod hnap;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
