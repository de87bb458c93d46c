//! Count of nonconforming items (NP) chart.
//!
//! Monitors the count of defective items in samples of a constant size.
//! Because every sample has the same size, one pair of control limits
//! covers the whole chart.
//!
//! # Formulas
//!
//! - CL = np-bar = total_defectives / number_of_samples
//! - p-bar = np-bar / n
//! - UCL = np-bar + k * sqrt(np-bar * (1 - p-bar))
//! - LCL = max(0, np-bar - k * sqrt(np-bar * (1 - p-bar)))
//!
//! with `k = 3` unless configured otherwise. No rounding is applied.
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
use crate::config::ChartConfig;
use crate::error::Result;

/// One inspection batch of exactly `sample_size` items.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NPSample {
    /// Production timestamp of the first item in this sample.
    pub start: DateTime<Utc>,
    /// Production timestamp of the last item in this sample.
    pub end: DateTime<Utc>,
    /// Number of defective items found in this sample.
    pub defectives: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct NPStats {
    total_inspected: u64,
    total_defectives: u64,
    np_bar: f64,
    ucl: f64,
    lcl: f64,
}

impl NPStats {
    fn compute(samples: &[NPSample], sample_size: u64, sigma_multiplier: f64) -> Self {
        let count = samples.len() as u64;
        let total_inspected = sample_size.saturating_mul(count);
        let total_defectives = saturating_sum(samples.iter().map(|s| s.defectives));

        // NaN when there are no samples.
        let np_bar = total_defectives as f64 / count as f64;
        let p_bar = np_bar / sample_size as f64;
        let delta = sigma_multiplier * (np_bar * (1.0 - p_bar)).sqrt();

        Self {
            total_inspected,
            total_defectives,
            np_bar,
            ucl: np_bar + delta,
            lcl: clamp_non_negative(np_bar - delta),
        }
    }
}

/// Count of nonconforming items (NP) chart for a part, machine and
/// characteristic.
///
/// Statistics are recalculated lazily: [`add_sample`](NPChart::add_sample)
/// only marks the cache stale, and the next accessor recomputes every
/// statistic in one pass.
///
/// # Examples
/// ```
/// use chrono::{TimeZone, Utc};
/// use u_spc::spc::NPChart;
///
/// let mut chart = NPChart::new("P-100", "M-7", "burr on edge", 50);
/// let start = Utc.with_ymd_and_hms(2020, 1, 1, 12, 0, 0).unwrap();
/// let end = Utc.with_ymd_and_hms(2020, 1, 1, 13, 0, 0).unwrap();
/// chart.add_sample(start, end, 2);
/// chart.add_sample(start, end, 4);
///
/// assert_eq!(chart.total_inspected(), 100);
/// assert!((chart.np_bar() - 3.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone)]
pub struct NPChart {
    part: String,
    machine: String,
    characteristic: String,
    sample_size: u64,
    samples: Vec<NPSample>,
    cache: Cached<NPStats>,
    config: ChartConfig,
}

impl NPChart {
    /// Create a new NP chart with the default configuration.
    ///
    /// `sample_size` is the number of items inspected per sample and is
    /// fixed for the lifetime of the chart. It is not validated.
    pub fn new(
        part: impl Into<String>,
        machine: impl Into<String>,
        characteristic: impl Into<String>,
        sample_size: u64,
    ) -> Self {
        Self::with_config(part, machine, characteristic, sample_size, ChartConfig::default())
    }

    /// Create a new NP chart with an explicit configuration.
    pub fn with_config(
        part: impl Into<String>,
        machine: impl Into<String>,
        characteristic: impl Into<String>,
        sample_size: u64,
        config: ChartConfig,
    ) -> Self {
        let stats = NPStats::compute(&[], sample_size, config.sigma_multiplier);
        Self {
            part: part.into(),
            machine: machine.into(),
            characteristic: characteristic.into(),
            sample_size,
            samples: Vec::new(),
            cache: Cached::new(stats),
            config,
        }
    }

    /// Append a sample. Counts are not checked against the sample size.
    pub fn add_sample(&mut self, start: DateTime<Utc>, end: DateTime<Utc>, defectives: u64) {
        self.samples.push(NPSample {
            start,
            end,
            defectives,
        });
        self.cache.invalidate();
        trace!(
            chart = "np",
            part = %self.part,
            index = self.samples.len() - 1,
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

    /// Description of the inspected characteristic.
    pub fn characteristic(&self) -> &str {
        &self.characteristic
    }

    /// Number of inspected items per sample.
    pub fn sample_size(&self) -> u64 {
        self.sample_size
    }

    /// Configuration the chart was created with.
    pub fn config(&self) -> &ChartConfig {
        &self.config
    }

    /// All samples in append order.
    pub fn samples(&self) -> &[NPSample] {
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

    /// `sample_size * number_of_samples`.
    pub fn total_inspected(&mut self) -> u64 {
        self.stats().total_inspected
    }

    /// Sum of defectives over all samples.
    pub fn total_defectives(&mut self) -> u64 {
        self.stats().total_defectives
    }

    /// Average number of defectives per sample. NaN on an empty chart.
    pub fn np_bar(&mut self) -> f64 {
        self.stats().np_bar
    }

    /// Number of defectives of the sample at `index` (append order).
    ///
    /// # Errors
    ///
    /// [`ChartError::SampleIndexOutOfRange`](crate::error::ChartError) when
    /// `index >= len()`, unless the chart is configured with
    /// [`IndexPolicy::Panic`](crate::config::IndexPolicy), in which case it panics.
    pub fn defectives_for_sample(&mut self, index: usize) -> Result<u64> {
        self.stats();
        sample_at(&self.samples, index, self.config.index_policy).map(|s| s.defectives)
    }

    /// Upper control limit, never clamped.
    pub fn upper_control_limit(&mut self) -> f64 {
        self.stats().ucl
    }

    /// Lower control limit, clamped at 0.
    pub fn lower_control_limit(&mut self) -> f64 {
        self.stats().lcl
    }

    /// The chart-wide control limits.
    pub fn control_limits(&mut self) -> ControlLimits {
        let stats = self.stats();
        ControlLimits {
            ucl: stats.ucl,
            cl: stats.np_bar,
            lcl: stats.lcl,
        }
    }

    fn stats(&mut self) -> &NPStats {
        let samples = &self.samples;
        let sample_size = self.sample_size;
        let sigma_multiplier = self.config.sigma_multiplier;
        self.cache.get_or_refresh(|| {
            let stats = NPStats::compute(samples, sample_size, sigma_multiplier);
            debug!(
                chart = "np",
                samples = samples.len(),
                np_bar = stats.np_bar,
                ucl = stats.ucl,
                lcl = stats.lcl,
                "recalculated np-chart"
            );
            stats
        })
    }
}

impl AttributeChart for NPChart {
    fn len(&self) -> usize {
        self.samples.len()
    }

    fn total_inspected(&mut self) -> u64 {
        NPChart::total_inspected(self)
    }

    fn total_defectives(&mut self) -> u64 {
        NPChart::total_defectives(self)
    }

    fn center_line(&mut self) -> f64 {
        self.np_bar()
    }

    fn statistic_for_sample(&mut self, index: usize) -> Result<f64> {
        self.defectives_for_sample(index).map(|d| d as f64)
    }

    fn control_limits_for_sample(&mut self, index: usize) -> Result<ControlLimits> {
        sample_at(&self.samples, index, self.config.index_policy)?;
        Ok(self.control_limits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexPolicy;
    use crate::error::ChartError;
    use approx::assert_abs_diff_eq;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    const DEFECTIVES: [u64; 22] = [
        2, 4, 4, 3, 6, 2, 3, 0, 0, 3, 1, 5, 4, 7, 3, 2, 4, 1, 0, 5, 3, 1,
    ];

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, 1, 12, 0, 0).unwrap()
    }

    /// Hourly samples starting at 2020-01-01 12:00 UTC.
    fn build_chart(sample_size: u64, defectives: &[u64]) -> NPChart {
        let mut chart = NPChart::new(
            "Test Part ID",
            "Test Machine ID",
            "Test Characteristic",
            sample_size,
        );
        let mut start = t0();
        for &d in defectives {
            let end = start + Duration::hours(1);
            chart.add_sample(start, end, d);
            start = end;
        }
        chart
    }

    #[test]
    fn test_new_sets_metadata() {
        let chart = NPChart::new("Test Part ID", "Test Machine ID", "Test Characteristic", 99);
        assert_eq!(chart.part(), "Test Part ID");
        assert_eq!(chart.machine(), "Test Machine ID");
        assert_eq!(chart.characteristic(), "Test Characteristic");
        assert_eq!(chart.sample_size(), 99);
        assert!(chart.is_empty());
        assert!(!chart.needs_recalculation());
    }

    #[test]
    fn test_add_sample() {
        let chart = build_chart(50, &DEFECTIVES);
        assert_eq!(chart.len(), 22);
        assert!(chart.needs_recalculation());
        assert_eq!(chart.samples()[1].start, t0() + Duration::hours(1));
        assert_eq!(chart.samples()[1].end, t0() + Duration::hours(2));
    }

    #[test]
    fn test_textbook_scenario() {
        let mut chart = build_chart(50, &DEFECTIVES);
        assert_eq!(chart.total_inspected(), 1100);
        assert_eq!(chart.total_defectives(), 63);
        assert_abs_diff_eq!(chart.np_bar(), 63.0 / 22.0, epsilon = 1e-12);
        assert_abs_diff_eq!(chart.np_bar(), 2.86, epsilon = 0.005);
        assert_abs_diff_eq!(chart.upper_control_limit(), 7.8, epsilon = 0.05);
        assert_abs_diff_eq!(chart.lower_control_limit(), 0.0);
        assert!(!chart.needs_recalculation());
    }

    #[test]
    fn test_defectives_for_sample_in_append_order() {
        let mut chart = build_chart(50, &DEFECTIVES);
        for (i, &expected) in DEFECTIVES.iter().enumerate() {
            assert_eq!(chart.defectives_for_sample(i), Ok(expected), "sample {i}");
        }
    }

    #[test]
    fn test_limits_formula_unclamped() {
        // n=200, np-bar=10, p-bar=0.05 → sigma = sqrt(9.5)
        let mut chart = build_chart(200, &[10; 10]);
        let limits = chart.control_limits();
        let sigma = (10.0_f64 * 0.95).sqrt();
        assert_abs_diff_eq!(limits.cl, 10.0, epsilon = 1e-12);
        assert_abs_diff_eq!(limits.ucl, 10.0 + 3.0 * sigma, epsilon = 1e-12);
        assert_abs_diff_eq!(limits.lcl, 10.0 - 3.0 * sigma, epsilon = 1e-12);
    }

    #[test]
    fn test_no_rounding_applied() {
        let mut chart = build_chart(50, &DEFECTIVES);
        let np_bar: f64 = 63.0 / 22.0;
        let delta = 3.0 * (np_bar * (1.0 - np_bar / 50.0)).sqrt();
        assert_eq!(chart.upper_control_limit(), np_bar + delta);
    }

    #[test]
    fn test_sigma_multiplier() {
        let config = ChartConfig::default().with_sigma_multiplier(2.0);
        let mut chart = NPChart::with_config("A", "B", "C", 200, config);
        for _ in 0..10 {
            chart.add_sample(t0(), t0(), 10);
        }
        let sigma = (10.0_f64 * 0.95).sqrt();
        assert_abs_diff_eq!(chart.upper_control_limit(), 10.0 + 2.0 * sigma, epsilon = 1e-12);
    }

    #[test]
    fn test_reads_are_idempotent() {
        let mut chart = build_chart(50, &DEFECTIVES);
        let first = (chart.np_bar(), chart.upper_control_limit(), chart.lower_control_limit());
        let second = (chart.np_bar(), chart.upper_control_limit(), chart.lower_control_limit());
        assert_eq!(first, second);
    }

    #[test]
    fn test_interleaved_appends_recalculate() {
        let mut chart = build_chart(50, &[2, 4]);
        assert_abs_diff_eq!(chart.np_bar(), 3.0);
        assert_eq!(chart.total_inspected(), 100);

        chart.add_sample(t0(), t0(), 9);
        assert!(chart.needs_recalculation());
        assert_abs_diff_eq!(chart.np_bar(), 5.0);
        assert_eq!(chart.total_inspected(), 150);
        assert_eq!(chart.total_defectives(), 15);
    }

    #[test]
    fn test_empty_chart_is_nan() {
        let mut chart = NPChart::new("A", "B", "C", 50);
        assert_eq!(chart.total_inspected(), 0);
        assert_eq!(chart.total_defectives(), 0);
        assert!(chart.np_bar().is_nan());
        assert!(chart.upper_control_limit().is_nan());
        assert_abs_diff_eq!(chart.lower_control_limit(), 0.0);
    }

    #[test]
    fn test_unvalidated_inputs_do_not_crash() {
        // More defectives than items and a zero sample size are both accepted.
        let mut chart = build_chart(5, &[9, 9]);
        assert_eq!(chart.total_defectives(), 18);
        assert!(chart.upper_control_limit().is_nan());

        let mut zero = build_chart(0, &[1]);
        assert_eq!(zero.total_inspected(), 0);
        assert!(zero.lower_control_limit() >= 0.0);
    }

    #[test]
    fn test_totals_saturate_instead_of_overflowing() {
        let mut chart = build_chart(u64::MAX, &[u64::MAX, 1]);
        assert_eq!(chart.total_defectives(), u64::MAX);
        assert_eq!(chart.total_inspected(), u64::MAX);
    }

    #[test]
    fn test_out_of_range_index_returns_error() {
        let mut chart = build_chart(50, &DEFECTIVES);
        assert_eq!(
            chart.defectives_for_sample(22),
            Err(ChartError::SampleIndexOutOfRange { index: 22, len: 22 })
        );
        assert!(chart.control_limits_for_sample(22).is_err());
    }

    #[test]
    #[should_panic(expected = "index out of bounds")]
    fn test_out_of_range_index_panics_in_strict_mode() {
        let config = ChartConfig::default().with_index_policy(IndexPolicy::Panic);
        let mut chart = NPChart::with_config("A", "B", "C", 50, config);
        chart.add_sample(t0(), t0(), 1);
        let _ = chart.defectives_for_sample(1);
    }

    #[test]
    fn test_points_and_control_state() {
        let mut chart = build_chart(100, &[5; 20]);
        assert!(chart.is_in_control());

        chart.add_sample(t0(), t0(), 30);
        let points = chart.points();
        assert_eq!(points.len(), 21);
        assert!(points[20].out_of_control);
        assert_abs_diff_eq!(points[20].value, 30.0);
        assert!(!chart.is_in_control());
    }

    #[test]
    fn test_trait_object_view() {
        let mut chart = build_chart(50, &DEFECTIVES);
        let dyn_chart: &mut dyn AttributeChart = &mut chart;
        assert_eq!(dyn_chart.len(), 22);
        assert_eq!(dyn_chart.total_inspected(), 1100);
        assert_abs_diff_eq!(dyn_chart.statistic_for_sample(13).unwrap(), 7.0);
        assert_abs_diff_eq!(dyn_chart.center_line(), 63.0 / 22.0, epsilon = 1e-12);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_sample_serde() {
        let sample = NPSample {
            start: t0(),
            end: t0() + Duration::hours(1),
            defectives: 4,
        };
        let json = serde_json::to_string(&sample).unwrap();
        let back: NPSample = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sample);
    }

    proptest! {
        #[test]
        fn prop_totals_and_lcl(
            sample_size in 1u64..500,
            defectives in proptest::collection::vec(0u64..500, 1..40),
        ) {
            let defectives: Vec<u64> = defectives
                .into_iter()
                .map(|d| d % (sample_size + 1))
                .collect();
            let mut chart = build_chart(sample_size, &defectives);

            prop_assert_eq!(chart.total_inspected(), sample_size * defectives.len() as u64);
            prop_assert_eq!(chart.total_defectives(), defectives.iter().sum::<u64>());
            prop_assert!(chart.lower_control_limit() >= 0.0);
            prop_assert!(chart.upper_control_limit() >= chart.np_bar());

            let first = chart.control_limits();
            prop_assert_eq!(first, chart.control_limits());
        }
    }
}
