//! Data types for remoting management connections.
//!
//! This crate contains the serde-serializable values that describe a
//! connection attempt: where to connect, with which transport options, and
//! which SASL mechanisms and properties apply. It carries no I/O.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond (de)serialization and validation
//! * Transport-neutral: Nothing here assumes a particular wire format
//!
//! Connection lifecycle behavior is built on top of these types in
//! `remoting-runtime`.

pub mod config;
pub mod message;
pub mod options;
pub mod sasl;

pub use config::*;
pub use message::*;
pub use options::*;
