//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the streaming core:
//! - Logging and tracing infrastructure
//! - Event bus system
//!
//! ## Overview
//!
//! This crate establishes the logging conventions and event broadcasting
//! used throughout the workspace. Hosts call
//! [`init_logging`](logging::init_logging) once at startup and subscribe to
//! an [`EventBus`](events::EventBus) to follow chapter loads.

pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
