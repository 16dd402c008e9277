use fsmock_metrics::ScalarMetric;

/// Suite-level metadata copied into the results document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuiteInfo {
    pub name: String,
    pub copyright: String,
    pub authors: Vec<String>,
    pub description: Option<String>,
}

impl SuiteInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_copyright(mut self, copyright: impl Into<String>) -> Self {
        self.copyright = copyright.into();
        self
    }

    /// Accepts a comma-separated author list.
    pub fn with_authors(mut self, authors: &str) -> Self {
        self.authors = authors
            .split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .collect();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseInfo {
    pub name: String,
    pub description: Option<String>,
}

impl CaseInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Per-case performance declaration: default repeats and parameters plus named configurations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformanceConfig {
    pub repeats: Option<u32>,
    pub parameters: Vec<ScalarMetric>,
    pub configs: Vec<ConfigSpec>,
}

impl PerformanceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn repeats(mut self, repeats: u32) -> Self {
        self.repeats = Some(repeats);
        self
    }

    pub fn parameter(mut self, parameter: ScalarMetric) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn config(mut self, config: ConfigSpec) -> Self {
        self.configs.push(config);
        self
    }

    pub fn default_repeats(&self) -> u32 {
        self.repeats.unwrap_or(1)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigSpec {
    pub name: String,
    pub description: String,
    pub repeats: Option<u32>,
    pub parameters: Vec<ScalarMetric>,
}

impl ConfigSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn repeats(mut self, repeats: u32) -> Self {
        self.repeats = Some(repeats);
        self
    }

    pub fn parameter(mut self, parameter: ScalarMetric) -> Self {
        self.parameters.push(parameter);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authors_are_split_and_trimmed() {
        let s = SuiteInfo::new("fslogic").with_authors("Alice Smith, Bob Jones ,, Carol");
        assert_eq!(s.authors, vec!["Alice Smith", "Bob Jones", "Carol"]);
    }

    #[test]
    fn repeats_default_to_one() {
        assert_eq!(PerformanceConfig::new().default_repeats(), 1);
        assert_eq!(PerformanceConfig::new().repeats(5).default_repeats(), 5);
    }
}
