//! Chart configuration.
//!
//! Every chart carries a [`ChartConfig`]. The defaults reproduce the
//! classic Shewhart attribute charts: 3-sigma limits, half-away-from-zero
//! rounding, and typed errors for out-of-range sample indices.

/// Rounding rule applied to the rounded p-chart statistics.
///
/// Only values that land exactly on a tie after scaling are affected, e.g.
/// `0.125` rounded to two decimals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RoundingMode {
    /// Ties round away from zero (`0.125 -> 0.13`).
    #[default]
    HalfAwayFromZero,
    /// Ties round to the nearest even digit (`0.125 -> 0.12`).
    HalfEven,
}

impl RoundingMode {
    /// Round `value` to `decimals` decimal places.
    ///
    /// Non-finite inputs are returned unchanged.
    ///
    /// # Examples
    /// ```
    /// use u_spc::config::RoundingMode;
    /// assert_eq!(RoundingMode::HalfAwayFromZero.round(0.0625, 3), 0.063);
    /// assert_eq!(RoundingMode::HalfEven.round(0.0625, 3), 0.062);
    /// ```
    pub fn round(self, value: f64, decimals: i32) -> f64 {
        let scale = 10f64.powi(decimals);
        let scaled = value * scale;
        let rounded = match self {
            RoundingMode::HalfAwayFromZero => scaled.round(),
            RoundingMode::HalfEven => scaled.round_ties_even(),
        };
        rounded / scale
    }
}

/// What a per-sample accessor does when the index is past the last sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IndexPolicy {
    /// Return [`ChartError::SampleIndexOutOfRange`](crate::error::ChartError).
    #[default]
    ReturnError,
    /// Panic like a slice index would. Useful for strict compatibility checks.
    Panic,
}

/// Configuration shared by the np-chart and the p-chart.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChartConfig {
    /// Multiplier of the standard deviation for the control limits (default: 3.0).
    pub sigma_multiplier: f64,
    /// Rounding rule for p-bar and the per-sample p-chart values.
    pub rounding: RoundingMode,
    /// Out-of-range index behaviour of per-sample accessors.
    pub index_policy: IndexPolicy,
}

impl ChartConfig {
    /// Set the sigma multiplier.
    pub fn with_sigma_multiplier(mut self, sigma_multiplier: f64) -> Self {
        self.sigma_multiplier = sigma_multiplier;
        self
    }

    /// Set the rounding rule.
    pub fn with_rounding(mut self, rounding: RoundingMode) -> Self {
        self.rounding = rounding;
        self
    }

    /// Set the out-of-range index behaviour.
    pub fn with_index_policy(mut self, index_policy: IndexPolicy) -> Self {
        self.index_policy = index_policy;
        self
    }
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            sigma_multiplier: 3.0,
            rounding: RoundingMode::default(),
            index_policy: IndexPolicy::default(),
        }
    }
}
