//! Performance-measurement wrapper for test bodies.
//!
//! In conformance mode a wrapped body runs once with its default parameters. In performance mode
//! it runs once per configuration and repeat; per-repeat metrics are summed, averaged and
//! written to a JSON results document.

mod config;
mod error;
mod executor;
mod recorder;
mod runner;
mod settings;

pub use config::{CaseInfo, ConfigSpec, PerformanceConfig, SuiteInfo};
pub use error::{Error, Result};
pub use executor::{
    IntoMetrics, RepeatResult, RepeatsOutcome, TEST_TIME_METRIC, run_repeat, run_repeats,
};
pub use recorder::{
    CaseRecord, ConfigRecord, Document, LoadOutcome, Recorder, SourceIdentity, SuiteRecord,
};
pub use runner::{
    CaseOutcome, ConfigOutcome, PerfCase, PerfRunner, Performance, performance,
};
pub use settings::{
    ExecutionMode, PERFORMANCE_ENV, PerfSettings, RESULTS_FILE_NAME, TEST_DIR_ENV,
};

pub use fsmock_metrics::{Parameters, ScalarMetric};
