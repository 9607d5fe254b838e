//! RGS Runner — search orchestration, exposure scaling, analysis, artifacts.
//!
//! This crate builds on `rgs-core` to provide:
//! - TOML search configuration with validation
//! - Exposure re-normalization of sample weights
//! - The search pipeline (load → generate → register → count)
//! - Best-cut ranking, outer-hull ladders, and cut application
//! - Result and manifest export with dataset fingerprinting

pub mod analysis;
pub mod config;
pub mod export;
pub mod exposure;
pub mod search;

pub use analysis::{
    apply_store_row, apply_to_samples, build_ladder, check_store_variables, find_best_cut,
    LadderReport, SampleYield,
};
pub use config::{ExposureConfig, LadderConfig, SampleConfig, SearchConfig, SearchSection};
pub use export::{load_artifacts, save_artifacts, SearchManifest, SCHEMA_VERSION};
pub use exposure::{exposure_scale, sample_scale};
pub use search::{prepare, run_search, PreparedSearch, SampleInfo, SearchError, SearchOutcome};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<SearchConfig>();
        assert_sync::<SearchConfig>();
        assert_send::<LadderConfig>();
        assert_sync::<LadderConfig>();
    }

    #[test]
    fn search_types_are_send_sync() {
        assert_send::<PreparedSearch>();
        assert_sync::<PreparedSearch>();
        assert_send::<SearchOutcome>();
        assert_sync::<SearchOutcome>();
        assert_send::<SearchError>();
    }

    #[test]
    fn report_types_are_send_sync() {
        assert_send::<LadderReport>();
        assert_sync::<LadderReport>();
        assert_send::<SearchManifest>();
        assert_sync::<SearchManifest>();
    }
}
