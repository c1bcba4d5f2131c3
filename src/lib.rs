#![cfg_attr(docsrs, feature(doc_cfg))]
//! # canbms_lib
//!
//! This crate turns the periodic CAN frames of a battery pack controller into a
//! consolidated battery state with safe charge/discharge current limits.
//!
//! The library is transport agnostic: feed raw `(id, payload)` pairs and periodic
//! ticks into a [`Controller`] and hand its snapshot to a [`publish::StateSink`].
//!
//! ## Features
//!
//! - `default`: Enables `bin-dependencies`, which is intended for compiling the `canbms` daemon and pulls in `socketcan` and `serde`.
//!
//! ### Transport Features
//! - `socketcan`: Enables the Linux SocketCAN frame source used by the daemon.
//!
//! ### Utility Features
//! - `protocol_serde`: Enables `serde` support for the decoded frames and published values.
//! - `bin-dependencies`: Enables all features required by the `canbms` binary executable.

/// Contains error types for the library.
mod error;

/// Alarm severities and the charge/discharge permissions they veto.
pub mod alarms;
/// Runtime parameters of the controller.
pub mod config;
/// Ties decoding, tracking, derating and the watchdog together.
pub mod controller;
/// Charge and discharge current limit derivation.
pub mod derating;
/// Cell voltage and temperature extremes.
pub mod extremes;
/// Decoding of the battery controller CAN frames.
pub mod protocol;
/// Fixed set of published paths and the sink abstraction.
pub mod publish;
/// The consolidated battery state.
pub mod state;
/// Best-effort push of cell voltage extremes.
pub mod telemetry;
/// Communication loss detection.
pub mod watchdog;

/// SocketCAN frame source feeding the controller.
#[cfg_attr(docsrs, doc(cfg(feature = "socketcan")))]
#[cfg(feature = "socketcan")]
pub mod bus;

pub use config::Config;
pub use controller::{Controller, Event};
pub use error::{Error, Result};
pub use state::BatteryState;
