pub mod metric;
pub mod params;

pub use metric::{Metric, MetricValue, PerRepeatMetric, ScalarMetric};
pub use params::{Parameters, merge_parameters};
