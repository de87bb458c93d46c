//! # u-spc
//!
//! Attribute control charts for statistical process control (SPC).
//!
//! This crate tracks inspection samples of a manufacturing process and
//! computes center lines and control limits used to spot an
//! out-of-control process.
//!
//! ## Modules
//!
//! - [`spc`] — np-chart (fixed sample size) and p-chart (variable sample size)
//! - [`config`] — Sigma multiplier, rounding rule, index policy
//! - [`error`] — Error type for per-sample accessors
//!
//! ## Design Philosophy
//!
//! - **Lazy**: appends only mark statistics stale; the next read recomputes
//! - **Permissive**: inputs are not validated; degenerate charts yield NaN
//! - **Single-owner**: charts are plain values without internal locking
//!
//! Diagnostics are emitted through `tracing` (`trace` per append, `debug`
//! per recalculation). Install a subscriber in the application to see them.

pub mod config;
pub mod error;
pub mod spc;

pub use error::{ChartError, Result};
