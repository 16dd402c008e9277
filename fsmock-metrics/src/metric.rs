use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Metrics are integers. Fractional values in a loaded document are truncated toward zero.
pub type MetricValue = i64;

/// A single named measurement (a parameter default, one repeat's value, a running sum or an
/// average).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalarMetric {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(deserialize_with = "lenient_value::deserialize")]
    pub value: MetricValue,
    #[serde(default)]
    pub unit: String,
}

impl ScalarMetric {
    pub fn new(name: impl Into<String>, value: MetricValue) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            value,
            unit: String::new(),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn aggregate(&mut self, value: MetricValue) {
        self.value = self.value.saturating_add(value);
    }

    /// Floor of `value / count`; `None` when `count` is zero.
    pub fn average(&self, count: u64) -> Option<ScalarMetric> {
        if count == 0 {
            return None;
        }
        let count = MetricValue::try_from(count).unwrap_or(MetricValue::MAX);

        Some(ScalarMetric {
            value: self.value.div_euclid(count),
            ..self.clone()
        })
    }

    /// Starts a per-repeat series seeded with this metric's value under `repeat`.
    pub fn into_per_repeat(self, repeat: u32) -> PerRepeatMetric {
        let mut values = BTreeMap::new();
        values.insert(repeat, self.value);

        PerRepeatMetric {
            name: self.name,
            description: self.description,
            values,
            unit: self.unit,
        }
    }
}

/// One value per repeat number, serialized as `{"value": {"1": .., "2": ..}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerRepeatMetric {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "value", with = "repeat_keys")]
    pub values: BTreeMap<u32, MetricValue>,
    #[serde(default)]
    pub unit: String,
}

impl PerRepeatMetric {
    pub fn append(&mut self, repeat: u32, value: MetricValue) {
        self.values.insert(repeat, value);
    }

    pub fn get(&self, repeat: u32) -> Option<MetricValue> {
        self.values.get(&repeat).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

mod lenient_value {
    use serde::{Deserialize, Deserializer};

    use super::MetricValue;

    #[derive(Deserialize)]
    #[serde(untagged)]
    pub(super) enum Number {
        Int(MetricValue),
        Float(f64),
    }

    impl From<Number> for MetricValue {
        fn from(n: Number) -> Self {
            match n {
                Number::Int(v) => v,
                // Saturating cast, NaN becomes 0.
                Number::Float(v) => v as MetricValue,
            }
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<MetricValue, D::Error>
    where
        D: Deserializer<'de>,
    {
        Number::deserialize(deserializer).map(MetricValue::from)
    }
}

// Untagged enums buffer their input, and buffered map keys stay strings, so repeat numbers are
// parsed here instead of relying on the JSON key conversion.
mod repeat_keys {
    use std::collections::BTreeMap;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::MetricValue;
    use super::lenient_value::Number;

    pub fn serialize<S>(values: &BTreeMap<u32, MetricValue>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(values.iter().map(|(k, v)| (k.to_string(), v)))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<u32, MetricValue>, D::Error>
    where
        D: Deserializer<'de>,
    {
        BTreeMap::<String, Number>::deserialize(deserializer)?
            .into_iter()
            .map(|(k, v)| {
                k.parse::<u32>()
                    .map(|k| (k, MetricValue::from(v)))
                    .map_err(|_| D::Error::custom(format!("invalid repeat number `{k}`")))
            })
            .collect()
    }
}

/// Either shape a metric takes in a persisted results document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Metric {
    Scalar(ScalarMetric),
    PerRepeat(PerRepeatMetric),
}

impl Metric {
    pub fn name(&self) -> &str {
        match self {
            Metric::Scalar(m) => &m.name,
            Metric::PerRepeat(m) => &m.name,
        }
    }

    pub fn unit(&self) -> &str {
        match self {
            Metric::Scalar(m) => &m.unit,
            Metric::PerRepeat(m) => &m.unit,
        }
    }

    pub fn as_scalar(&self) -> Option<&ScalarMetric> {
        match self {
            Metric::Scalar(m) => Some(m),
            Metric::PerRepeat(_) => None,
        }
    }

    pub fn as_per_repeat(&self) -> Option<&PerRepeatMetric> {
        match self {
            Metric::Scalar(_) => None,
            Metric::PerRepeat(m) => Some(m),
        }
    }
}

impl From<ScalarMetric> for Metric {
    fn from(m: ScalarMetric) -> Self {
        Metric::Scalar(m)
    }
}

impl From<PerRepeatMetric> for Metric {
    fn from(m: PerRepeatMetric) -> Self {
        Metric::PerRepeat(m)
    }
}
