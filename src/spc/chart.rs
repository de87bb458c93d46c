//! Core attribute chart types and trait.
//!
//! Defines the building blocks shared by the np-chart and the p-chart:
//! control limits, chart points with an out-of-control flag, the lazily
//! recalculated statistics cache, and the [`AttributeChart`] trait.
//!
//! # References
//!
//! - Montgomery, D.C. (2019). *Introduction to Statistical Quality Control*, 8th ed.
//! - ASTM E2587 — Standard Practice for Use of Control Charts

use crate::config::IndexPolicy;
use crate::error::{ChartError, Result};

/// Control limits for a chart or a single sample.
///
/// # Invariants
///
/// - `lcl >= 0` (attribute statistics cannot be negative)
/// - `ucl` is never clamped
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ControlLimits {
    /// Upper control limit (UCL = CL + k sigma).
    pub ucl: f64,
    /// Center line (np-bar or p-bar).
    pub cl: f64,
    /// Lower control limit (LCL = max(0, CL - k sigma)).
    pub lcl: f64,
}

/// A single data point on an attributes control chart.
///
/// Contains the plotted statistic, the control limits that apply to it
/// (which vary per point on a p-chart), and an out-of-control flag.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttributeChartPoint {
    /// The zero-based index of this point in append order.
    pub index: usize,
    /// The plotted statistic (defective count or proportion).
    pub value: f64,
    /// Upper control limit for this point.
    pub ucl: f64,
    /// Center line for this point.
    pub cl: f64,
    /// Lower control limit for this point.
    pub lcl: f64,
    /// Whether this point is out of control (beyond UCL or below LCL).
    pub out_of_control: bool,
}

impl AttributeChartPoint {
    /// Build a point and flag it when the value falls strictly outside the limits.
    pub fn new(index: usize, value: f64, limits: ControlLimits) -> Self {
        Self {
            index,
            value,
            ucl: limits.ucl,
            cl: limits.cl,
            lcl: limits.lcl,
            out_of_control: value > limits.ucl || value < limits.lcl,
        }
    }
}

/// Cached derived statistics guarded by a dirty flag.
///
/// Owned by a chart. Appends call [`invalidate`](Cached::invalidate); reads
/// go through [`get_or_refresh`](Cached::get_or_refresh), which recomputes
/// at most once per batch of appends.
#[derive(Debug, Clone)]
pub(crate) struct Cached<T> {
    value: T,
    dirty: bool,
}

impl<T> Cached<T> {
    /// Wrap an already up-to-date value.
    pub(crate) fn new(value: T) -> Self {
        Self {
            value,
            dirty: false,
        }
    }

    /// Mark the cached value stale.
    pub(crate) fn invalidate(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Return the cached value, recomputing it first if it is stale.
    pub(crate) fn get_or_refresh(&mut self, recompute: impl FnOnce() -> T) -> &T {
        if self.dirty {
            self.value = recompute();
            self.dirty = false;
        }
        &self.value
    }
}

/// Clamp a lower control limit at zero. NaN and `-0.0` both become `0.0`.
pub(crate) fn clamp_non_negative(value: f64) -> f64 {
    value.max(0.0) + 0.0
}

/// Sum counts, saturating at `u64::MAX` instead of overflowing.
pub(crate) fn saturating_sum(values: impl Iterator<Item = u64>) -> u64 {
    values.fold(0, u64::saturating_add)
}

/// Look up `index` in `items` according to the configured index policy.
pub(crate) fn sample_at<T>(items: &[T], index: usize, policy: IndexPolicy) -> Result<&T> {
    match policy {
        IndexPolicy::Panic => Ok(&items[index]),
        IndexPolicy::ReturnError => items.get(index).ok_or(ChartError::SampleIndexOutOfRange {
            index,
            len: items.len(),
        }),
    }
}

/// Trait for attribute control charts.
///
/// Accessors that read derived statistics take `&mut self` because they may
/// trigger a recalculation. A chart is not internally synchronized; share it
/// across threads only behind a lock.
pub trait AttributeChart {
    /// Number of samples appended so far.
    fn len(&self) -> usize;

    /// Whether no samples have been appended.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of inspected items across all samples.
    fn total_inspected(&mut self) -> u64;

    /// Total number of defective items across all samples.
    fn total_defectives(&mut self) -> u64;

    /// The center line (np-bar or p-bar).
    fn center_line(&mut self) -> f64;

    /// The plotted statistic for the sample at `index`.
    fn statistic_for_sample(&mut self, index: usize) -> Result<f64>;

    /// The control limits that apply to the sample at `index`.
    fn control_limits_for_sample(&mut self, index: usize) -> Result<ControlLimits>;

    /// All chart points in append order.
    fn points(&mut self) -> Vec<AttributeChartPoint> {
        (0..self.len())
            .filter_map(|index| {
                let value = self.statistic_for_sample(index).ok()?;
                let limits = self.control_limits_for_sample(index).ok()?;
                Some(AttributeChartPoint::new(index, value, limits))
            })
            .collect()
    }

    /// Check if the process is in statistical control.
    ///
    /// Returns `true` if no point lies beyond its control limits.
    fn is_in_control(&mut self) -> bool {
        self.points().iter().all(|p| !p.out_of_control)
    }
}
