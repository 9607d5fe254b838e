//! Re-normalizing sample weights to a target integrated exposure.

use rgs_core::cuts::ConfigError;

use crate::config::{ExposureConfig, SampleConfig};

/// Scale for `num_rows` events used out of a sample of `entries` events that
/// corresponds to `sample` exposure, so the subset represents `target`.
///
/// `target / sample × entries / num_rows`
pub fn exposure_scale(
    target: f64,
    sample: f64,
    entries: usize,
    num_rows: usize,
) -> Result<f64, ConfigError> {
    if !(sample.is_finite() && sample > 0.0) {
        return Err(ConfigError::Invalid(format!(
            "sample exposure must be > 0, got {sample}"
        )));
    }
    if num_rows == 0 {
        return Err(ConfigError::Invalid(
            "cannot scale an empty row window".into(),
        ));
    }
    Ok(target / sample * entries as f64 / num_rows as f64)
}

/// Weight scale for one configured sample.
///
/// An explicit `weight_scale` wins; otherwise the exposure rule applies, and
/// without an `[exposure]` section weights are used as stored.
pub fn sample_scale(
    sample: &SampleConfig,
    exposure: Option<&ExposureConfig>,
    entries: usize,
    num_rows: usize,
) -> Result<f64, ConfigError> {
    match (sample.weight_scale, exposure) {
        (Some(w), _) => Ok(w),
        (None, Some(exp)) => exposure_scale(exp.target, exp.sample, entries, num_rows),
        (None, None) => Ok(1.0),
    }
}
