//! Statistical Process Control (SPC) attribute charts.
//!
//! # Charts
//!
//! - [`NPChart`] — Count of nonconforming items (constant sample size)
//! - [`PChart`] — Proportion nonconforming (variable sample size)
//!
//! Both charts append samples in production order and recalculate their
//! statistics lazily, on the first read after an append. The shared
//! read-only view is the [`AttributeChart`] trait.
//!
//! # References
//!
//! - Montgomery, D.C. (2019). *Introduction to Statistical Quality Control*, 8th ed.
//! - ASTM E2587 — Standard Practice for Use of Control Charts

mod chart;
mod np_chart;
mod p_chart;

pub use chart::{AttributeChart, AttributeChartPoint, ControlLimits};
pub use np_chart::{NPChart, NPSample};
pub use p_chart::{PChart, PSample, SampleLimits};
