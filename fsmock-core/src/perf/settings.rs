use std::path::{Path, PathBuf};

pub const PERFORMANCE_ENV: &str = "performance";
pub const TEST_DIR_ENV: &str = "test_dir";
pub const RESULTS_FILE_NAME: &str = "performance.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum ExecutionMode {
    /// Run each case once with its default parameters.
    #[default]
    Conformance,

    /// Run every configuration with repeats and record the results.
    Performance,
}

/// Process-wide settings for wrapped test cases, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerfSettings {
    pub mode: ExecutionMode,
    pub results_path: PathBuf,
}

impl Default for PerfSettings {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Conformance,
            results_path: Path::new(".").join(RESULTS_FILE_NAME),
        }
    }
}

impl PerfSettings {
    pub fn conformance() -> Self {
        Self::default()
    }

    pub fn performance(results_path: impl Into<PathBuf>) -> Self {
        Self {
            mode: ExecutionMode::Performance,
            results_path: results_path.into(),
        }
    }

    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// `performance=True` selects performance mode; `test_dir` holds the results file.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut settings = Self::default();
        for (k, v) in vars {
            match k.as_ref() {
                PERFORMANCE_ENV if v.as_ref() == "True" => {
                    settings.mode = ExecutionMode::Performance;
                }
                TEST_DIR_ENV => {
                    settings.results_path = Path::new(v.as_ref()).join(RESULTS_FILE_NAME);
                }
                _ => {}
            }
        }
        settings
    }

    pub fn is_performance(&self) -> bool {
        self.mode == ExecutionMode::Performance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_conformance_in_current_dir() {
        let s = PerfSettings::from_vars(Vec::<(String, String)>::new());
        assert_eq!(s.mode, ExecutionMode::Conformance);
        assert_eq!(s.results_path, Path::new(".").join("performance.json"));
    }

    #[test]
    fn performance_flag_must_be_exactly_true() {
        let s = PerfSettings::from_vars([("performance", "True")]);
        assert!(s.is_performance());

        let s = PerfSettings::from_vars([("performance", "true")]);
        assert!(!s.is_performance());

        let s = PerfSettings::from_vars([("performance", "1")]);
        assert!(!s.is_performance());
    }

    #[test]
    fn test_dir_selects_results_location() {
        let s = PerfSettings::from_vars([("test_dir", "/tmp/run-1"), ("performance", "True")]);
        assert_eq!(s.results_path, Path::new("/tmp/run-1/performance.json"));
        assert_eq!(s.mode, ExecutionMode::Performance);
    }

    #[test]
    fn mode_parses_and_displays() {
        assert_eq!(ExecutionMode::Performance.to_string(), "performance");
        assert_eq!(
            "conformance".parse::<ExecutionMode>().ok(),
            Some(ExecutionMode::Conformance)
        );
    }
}
