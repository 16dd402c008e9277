use std::collections::BTreeMap;

use crate::metric::{MetricValue, ScalarMetric};

/// Appends every default whose name `explicit` does not already define.
///
/// Explicit parameters keep their position and win over defaults of the same name.
pub fn merge_parameters(
    mut explicit: Vec<ScalarMetric>,
    defaults: &[ScalarMetric],
) -> Vec<ScalarMetric> {
    for param in defaults {
        if !explicit.iter().any(|p| p.name == param.name) {
            explicit.push(param.clone());
        }
    }
    explicit
}

/// Name to value view of a parameter list, as handed to test bodies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters {
    values: BTreeMap<String, MetricValue>,
}

impl Parameters {
    pub fn get(&self, name: &str) -> Option<MetricValue> {
        self.values.get(name).copied()
    }

    pub fn get_or(&self, name: &str, default: MetricValue) -> MetricValue {
        self.get(name).unwrap_or(default)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, MetricValue)> + '_ {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl From<&[ScalarMetric]> for Parameters {
    fn from(params: &[ScalarMetric]) -> Self {
        Self {
            values: params.iter().map(|p| (p.name.clone(), p.value)).collect(),
        }
    }
}

impl From<&Vec<ScalarMetric>> for Parameters {
    fn from(params: &Vec<ScalarMetric>) -> Self {
        Self::from(params.as_slice())
    }
}
