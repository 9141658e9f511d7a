//! # eq3-domain
//!
//! Pure domain model for eQ-3 Bluetooth radiator thermostats.
//!
//! ## Responsibilities
//! - Foundational types: device addresses and error conventions
//! - Define the decoded **status** of a thermostat (mode, valve, set-point)
//! - Define the **connection states** a device session moves through
//! - Own the **wire codec**: GATT UUIDs, status notification decoding and
//!   command encoding
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod address;
pub mod error;
pub mod protocol;
pub mod thermostat;
