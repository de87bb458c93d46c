//! Proportion nonconforming (P) chart.
//!
//! Monitors the fraction of defective items in samples that may have
//! different sizes. Control limits are computed per sample because the
//! spread depends on that sample's inspection count.
//!
//! # Formulas
//!
//! - CL = p-bar = round3(total_defectives / total_inspected)
//! - p_i = round2(defectives_i / n_i)
//! - UCL_i = round2(p-bar + k * sqrt(p-bar * (1 - p-bar) / n_i))
//! - LCL_i = max(0, round2(p-bar - k * sqrt(p-bar * (1 - p-bar) / n_i)))
//!
//! `k = 3` unless configured otherwise. Rounding follows
//! [`RoundingMode`](crate::config::RoundingMode); clamping happens after rounding.
//!
//! # Reference
//!
//! Montgomery, D.C. (2019). *Introduction to Statistical Quality Control*, 8th ed.,
//! Chapter 7, Section 7.3.

use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use super::chart::{
    clamp_non_negative, sample_at, saturating_sum, AttributeChart, Cached, ControlLimits,
};
use crate::config::{ChartConfig, RoundingMode};
use crate::error::Result;

/// Decimal places of p-bar.
const P_BAR_DECIMALS: i32 = 3;
/// Decimal places of the per-sample proportion and limits.
const SAMPLE_DECIMALS: i32 = 2;

/// One inspection batch of a p-chart.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PSample {
    /// Production timestamp of the first item in this sample.
    pub start: DateTime<Utc>,
    /// Production timestamp of the last item in this sample.
    pub end: DateTime<Utc>,
    /// Number of inspected items in this sample.
    pub inspections: u64,
    /// Number of defective items found in this sample.
    pub defectives: u64,
}

/// Derived values of one p-chart sample, rounded to two decimals.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SampleLimits {
    /// Proportion defective.
    pub p: f64,
    /// Upper control limit.
    pub ucl: f64,
    /// Lower control limit, never negative.
    pub lcl: f64,
}

#[derive(Debug, Clone, PartialEq)]
struct PStats {
    total_inspected: u64,
    total_defectives: u64,
    p_bar: f64,
    /// One entry per sample, in append order.
    limits: Vec<SampleLimits>,
}

impl PStats {
    fn compute(samples: &[PSample], config: &ChartConfig) -> Self {
        let rounding: RoundingMode = config.rounding;
        let total_inspected = saturating_sum(samples.iter().map(|s| s.inspections));
        let total_defectives = saturating_sum(samples.iter().map(|s| s.defectives));

        // NaN when nothing has been inspected.
        let p_bar = rounding.round(
            total_defectives as f64 / total_inspected as f64,
            P_BAR_DECIMALS,
        );

        let limits = samples
            .iter()
            .map(|sample| {
                let n = sample.inspections as f64;
                let delta = config.sigma_multiplier * (p_bar * (1.0 - p_bar) / n).sqrt();
                SampleLimits {
                    p: rounding.round(sample.defectives as f64 / n, SAMPLE_DECIMALS),
                    ucl: rounding.round(p_bar + delta, SAMPLE_DECIMALS),
                    lcl: clamp_non_negative(rounding.round(p_bar - delta, SAMPLE_DECIMALS)),
                }
            })
            .collect();

        Self {
            total_inspected,
            total_defectives,
            p_bar,
            limits,
        }
    }
}

/// Proportion nonconforming (P) chart for a part and machine.
///
/// Appending only marks the cached statistics stale; the next accessor
/// recalculates p-bar and every sample's limits in one pass.
///
/// # Examples
/// ```
/// use chrono::{TimeZone, Utc};
/// use u_spc::spc::PChart;
///
/// let mut chart = PChart::new("P-100", "M-7");
/// let start = Utc.with_ymd_and_hms(2020, 1, 1, 12, 0, 0).unwrap();
/// let end = Utc.with_ymd_and_hms(2020, 1, 1, 13, 0, 0).unwrap();
/// chart.add_sample(start, end, 92, 6);
///
/// assert_eq!(chart.total_inspected(), 92);
/// assert_eq!(chart.proportion_defective_for_sample(0), Ok(0.07));
/// ```
#[derive(Debug, Clone)]
pub struct PChart {
    part: String,
    machine: String,
    samples: Vec<PSample>,
    cache: Cached<PStats>,
    config: ChartConfig,
}

impl PChart {
    /// Create a new P chart with the default configuration.
    pub fn new(part: impl Into<String>, machine: impl Into<String>) -> Self {
        Self::with_config(part, machine, ChartConfig::default())
    }

    /// Create a new P chart with an explicit configuration.
    pub fn with_config(
        part: impl Into<String>,
        machine: impl Into<String>,
        config: ChartConfig,
    ) -> Self {
        let stats = PStats::compute(&[], &config);
        Self {
            part: part.into(),
            machine: machine.into(),
            samples: Vec::new(),
            cache: Cached::new(stats),
            config,
        }
    }

    /// Append a sample. `defectives <= inspections` is not checked.
    pub fn add_sample(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        inspections: u64,
        defectives: u64,
    ) {
        self.samples.push(PSample {
            start,
            end,
            inspections,
            defectives,
        });
        self.cache.invalidate();
        trace!(
            chart = "p",
            part = %self.part,
            index = self.samples.len() - 1,
            inspections,
            defectives,
            "sample appended"
        );
    }

    /// Identifier of the inspected part.
    pub fn part(&self) -> &str {
        &self.part
    }

    /// Identifier of the machine which processed the inspected parts.
    pub fn machine(&self) -> &str {
        &self.machine
    }

    /// Configuration the chart was created with.
    pub fn config(&self) -> &ChartConfig {
        &self.config
    }

    /// All samples in append order.
    pub fn samples(&self) -> &[PSample] {
        &self.samples
    }

    /// Number of samples appended so far.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no samples have been appended.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Whether a sample was appended since the statistics were last computed.
    pub fn needs_recalculation(&self) -> bool {
        self.cache.is_dirty()
    }

    /// Sum of inspections over all samples.
    pub fn total_inspected(&mut self) -> u64 {
        self.stats().total_inspected
    }

    /// Sum of defectives over all samples.
    pub fn total_defectives(&mut self) -> u64 {
        self.stats().total_defectives
    }

    /// Overall proportion defective, rounded to three decimals.
    /// NaN when nothing has been inspected.
    pub fn p_bar(&mut self) -> f64 {
        self.stats().p_bar
    }

    /// Rounded proportion defective of the sample at `index`.
    pub fn proportion_defective_for_sample(&mut self, index: usize) -> Result<f64> {
        self.sample_limits(index).map(|l| l.p)
    }

    /// Rounded upper control limit of the sample at `index`.
    pub fn upper_control_limit_for_sample(&mut self, index: usize) -> Result<f64> {
        self.sample_limits(index).map(|l| l.ucl)
    }

    /// Rounded and clamped lower control limit of the sample at `index`.
    pub fn lower_control_limit_for_sample(&mut self, index: usize) -> Result<f64> {
        self.sample_limits(index).map(|l| l.lcl)
    }

    /// Derived values of the sample at `index` (append order).
    ///
    /// # Errors
    ///
    /// [`ChartError::SampleIndexOutOfRange`](crate::error::ChartError) when
    /// `index >= len()`, unless the chart is configured with
    /// [`IndexPolicy::Panic`](crate::config::IndexPolicy), in which case it panics.
    pub fn sample_limits(&mut self, index: usize) -> Result<SampleLimits> {
        let policy = self.config.index_policy;
        sample_at(&self.stats().limits, index, policy).copied()
    }

    fn stats(&mut self) -> &PStats {
        let samples = &self.samples;
        let config = &self.config;
        self.cache.get_or_refresh(|| {
            let stats = PStats::compute(samples, config);
            debug!(
                chart = "p",
                samples = samples.len(),
                total_inspected = stats.total_inspected,
                total_defectives = stats.total_defectives,
                p_bar = stats.p_bar,
                "recalculated p-chart"
            );
            stats
        })
    }
}

impl AttributeChart for PChart {
    fn len(&self) -> usize {
        self.samples.len()
    }

    fn total_inspected(&mut self) -> u64 {
        PChart::total_inspected(self)
    }

    fn total_defectives(&mut self) -> u64 {
        PChart::total_defectives(self)
    }

    fn center_line(&mut self) -> f64 {
        self.p_bar()
    }

    fn statistic_for_sample(&mut self, index: usize) -> Result<f64> {
        self.proportion_defective_for_sample(index)
    }

    fn control_limits_for_sample(&mut self, index: usize) -> Result<ControlLimits> {
        let limits = self.sample_limits(index)?;
        Ok(ControlLimits {
            ucl: limits.ucl,
            cl: self.p_bar(),
            lcl: limits.lcl,
        })
    }
}
