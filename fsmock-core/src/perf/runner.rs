use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use fsmock_metrics::{Metric, Parameters, merge_parameters};

use super::config::{CaseInfo, ConfigSpec, PerformanceConfig, SuiteInfo};
use super::error::{Error, Result};
use super::executor::{IntoMetrics, run_repeats};
use super::recorder::{ConfigRecord, Recorder};
use super::settings::{ExecutionMode, PerfSettings};

/// Settings plus the results recorder shared by every wrapped case of a run.
#[derive(Debug, Clone)]
pub struct PerfRunner {
    settings: PerfSettings,
    recorder: Recorder,
}

impl PerfRunner {
    pub fn new(settings: PerfSettings) -> Self {
        let recorder = Recorder::new(settings.results_path.clone());
        Self { settings, recorder }
    }

    pub fn from_env() -> Self {
        Self::new(PerfSettings::from_env())
    }

    pub fn with_recorder(mut self, recorder: Recorder) -> Self {
        self.recorder = recorder;
        self
    }

    pub fn settings(&self) -> &PerfSettings {
        &self.settings
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    pub fn mode(&self) -> ExecutionMode {
        self.settings.mode
    }
}

/// Declares how a case is measured. `skip` forces a single conformance run.
pub fn performance(config: PerformanceConfig, skip: bool) -> Performance {
    Performance { config, skip }
}

#[derive(Debug, Clone, Default)]
pub struct Performance {
    config: PerformanceConfig,
    skip: bool,
}

impl Performance {
    pub fn wrap<F>(self, suite: SuiteInfo, case: CaseInfo, body: F) -> PerfCase<F> {
        PerfCase {
            suite,
            case,
            config: self.config,
            skip: self.skip,
            body,
        }
    }
}

/// A test body bound to its suite, case and performance declaration.
pub struct PerfCase<F> {
    suite: SuiteInfo,
    case: CaseInfo,
    config: PerformanceConfig,
    skip: bool,
    body: F,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigOutcome {
    pub name: String,
    pub repeats: u32,
    pub successful: u32,
    pub failed: BTreeMap<u32, String>,
}

impl ConfigOutcome {
    pub fn succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseOutcome {
    Conformance,
    Performance {
        case: String,
        configs: Vec<ConfigOutcome>,
    },
}

impl CaseOutcome {
    pub fn passed(&self) -> bool {
        match self {
            CaseOutcome::Conformance => true,
            CaseOutcome::Performance { configs, .. } => configs.iter().all(ConfigOutcome::succeeded),
        }
    }

    /// Fails when any repeat of any configuration failed.
    pub fn ensure_passed(self) -> Result<()> {
        if self.passed() {
            return Ok(());
        }
        match self {
            CaseOutcome::Performance { case, .. } => Err(Error::ConfigurationsFailed { case }),
            CaseOutcome::Conformance => Ok(()),
        }
    }
}

impl<F> PerfCase<F> {
    pub fn suite(&self) -> &SuiteInfo {
        &self.suite
    }

    pub fn case(&self) -> &CaseInfo {
        &self.case
    }

    pub fn run<R>(&mut self, runner: &PerfRunner) -> Result<CaseOutcome>
    where
        F: FnMut(&Parameters) -> anyhow::Result<R>,
        R: IntoMetrics,
    {
        if self.skip || runner.mode() == ExecutionMode::Conformance {
            return self.run_conformance();
        }

        let mut configs = Vec::with_capacity(self.config.configs.len());
        for spec in &self.config.configs {
            configs.push(run_config(
                runner,
                &self.suite,
                &self.case,
                &self.config,
                spec,
                &mut self.body,
            )?);
        }
        Ok(CaseOutcome::Performance {
            case: self.case.name.clone(),
            configs,
        })
    }

    fn run_conformance<R>(&mut self) -> Result<CaseOutcome>
    where
        F: FnMut(&Parameters) -> anyhow::Result<R>,
    {
        let params = Parameters::from(&self.config.parameters);
        (self.body)(&params).map_err(Error::Conformance)?;
        Ok(CaseOutcome::Conformance)
    }
}

fn run_config<F, R>(
    runner: &PerfRunner,
    suite: &SuiteInfo,
    case: &CaseInfo,
    defaults: &PerformanceConfig,
    spec: &ConfigSpec,
    body: &mut F,
) -> Result<ConfigOutcome>
where
    F: FnMut(&Parameters) -> anyhow::Result<R>,
    R: IntoMetrics,
{
    let parameters = merge_parameters(spec.parameters.clone(), &defaults.parameters);
    let repeats = spec.repeats.unwrap_or_else(|| defaults.default_repeats());
    tracing::info!(
        suite = %suite.name,
        case = %case.name,
        config = %spec.name,
        repeats,
        "running performance configuration"
    );

    let outcome = run_repeats(body, &Parameters::from(&parameters), repeats);
    let average = match outcome.average() {
        Ok(average) => average,
        Err(err) => {
            tracing::warn!(config = %spec.name, error = %err, "recording empty average");
            Vec::new()
        }
    };

    let record = ConfigRecord {
        name: spec.name.clone(),
        completed: epoch_millis(),
        parameters: parameters.into_iter().map(Metric::from).collect(),
        description: spec.description.clone(),
        repeats_number: repeats,
        successful_repeats_number: outcome.successful,
        successful_repeats_summary: outcome.summary.iter().cloned().map(Metric::from).collect(),
        successful_repeats_average: average.into_iter().map(Metric::from).collect(),
        successful_repeats_details: outcome.details.iter().cloned().map(Metric::from).collect(),
        failed_repeats_details: outcome.failed.clone(),
    };
    runner.recorder().record(suite, case, record)?;

    tracing::info!(
        config = %spec.name,
        successful = outcome.successful,
        failed = outcome.failed.len(),
        "performance configuration done"
    );
    Ok(ConfigOutcome {
        name: spec.name.clone(),
        repeats,
        successful: outcome.successful,
        failed: outcome.failed,
    })
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use fsmock_metrics::ScalarMetric;

    use super::*;
    use crate::perf::{LoadOutcome, SourceIdentity};

    fn runner(dir: &std::path::Path, mode: ExecutionMode) -> PerfRunner {
        let settings = PerfSettings {
            mode,
            results_path: dir.join("performance.json"),
        };
        let recorder = Recorder::new(&settings.results_path).with_identity(SourceIdentity::default());
        PerfRunner::new(settings).with_recorder(recorder)
    }

    fn declaration() -> PerformanceConfig {
        PerformanceConfig::new()
            .repeats(3)
            .parameter(ScalarMetric::new("files", 1))
            .config(ConfigSpec::new("few").description("few files"))
            .config(
                ConfigSpec::new("many")
                    .repeats(2)
                    .parameter(ScalarMetric::new("files", 100)),
            )
    }

    #[test]
    fn conformance_runs_once_with_defaults() {
        let dir = match tempfile::tempdir() {
            Ok(d) => d,
            Err(err) => panic!("tempdir: {err}"),
        };
        let runner = runner(dir.path(), ExecutionMode::Conformance);
        let mut seen = Vec::new();
        let mut case = performance(declaration(), false).wrap(
            SuiteInfo::new("suite"),
            CaseInfo::new("case"),
            |p: &Parameters| -> anyhow::Result<()> {
                seen.push(p.get_or("files", -1));
                Ok(())
            },
        );

        let outcome = case.run(&runner);
        drop(case);

        assert!(matches!(outcome, Ok(CaseOutcome::Conformance)));
        assert_eq!(seen, vec![1]);
        assert!(matches!(runner.recorder().load(), LoadOutcome::NotFound));
    }

    #[test]
    fn conformance_failure_propagates() {
        let dir = match tempfile::tempdir() {
            Ok(d) => d,
            Err(err) => panic!("tempdir: {err}"),
        };
        let runner = runner(dir.path(), ExecutionMode::Performance);
        let mut case = performance(declaration(), true).wrap(
            SuiteInfo::new("suite"),
            CaseInfo::new("case"),
            |_: &Parameters| -> anyhow::Result<()> { anyhow::bail!("wrong reply") },
        );

        match case.run(&runner) {
            Err(Error::Conformance(err)) => assert_eq!(err.to_string(), "wrong reply"),
            other => panic!("expected conformance error, got {other:?}"),
        }
        assert!(matches!(runner.recorder().load(), LoadOutcome::NotFound));
    }

    #[test]
    fn performance_records_every_config() {
        let dir = match tempfile::tempdir() {
            Ok(d) => d,
            Err(err) => panic!("tempdir: {err}"),
        };
        let runner = runner(dir.path(), ExecutionMode::Performance);
        let mut case = performance(declaration(), false).wrap(
            SuiteInfo::new("suite").with_authors("A"),
            CaseInfo::new("case"),
            |p: &Parameters| -> anyhow::Result<ScalarMetric> {
                Ok(ScalarMetric::new("touched", p.get_or("files", 0)))
            },
        );

        let outcome = match case.run(&runner) {
            Ok(o) => o,
            Err(err) => panic!("run: {err}"),
        };
        assert!(outcome.passed());

        let LoadOutcome::Loaded(doc) = runner.recorder().load() else {
            panic!("expected results document");
        };
        let few = doc.config("suite", "case", "few");
        let many = doc.config("suite", "case", "many");
        let (Some(few), Some(many)) = (few, many) else {
            panic!("both configurations must be recorded");
        };

        assert_eq!(few.repeats_number, 3);
        assert_eq!(few.successful_repeats_number, 3);
        assert_eq!(few.description, "few files");
        assert_eq!(many.repeats_number, 2);

        let avg = |r: &ConfigRecord, name: &str| {
            r.successful_repeats_average
                .iter()
                .find(|m| m.name() == name)
                .and_then(Metric::as_scalar)
                .map(|m| m.value)
        };
        assert_eq!(avg(few, "touched"), Some(1));
        assert_eq!(avg(many, "touched"), Some(100));
        assert!(avg(few, "test_time").is_some());
        assert_eq!(many.parameters[0].as_scalar().map(|m| m.value), Some(100));
    }

    #[test]
    fn any_failed_repeat_fails_the_case() {
        let dir = match tempfile::tempdir() {
            Ok(d) => d,
            Err(err) => panic!("tempdir: {err}"),
        };
        let runner = runner(dir.path(), ExecutionMode::Performance);
        let config = PerformanceConfig::new()
            .repeats(2)
            .config(ConfigSpec::new("only"));
        let mut calls = 0;
        let mut case = performance(config, false).wrap(
            SuiteInfo::new("suite"),
            CaseInfo::new("flaky"),
            |_: &Parameters| -> anyhow::Result<()> {
                calls += 1;
                anyhow::ensure!(calls != 2, "second repeat fails");
                Ok(())
            },
        );

        let outcome = match case.run(&runner) {
            Ok(o) => o,
            Err(err) => panic!("run: {err}"),
        };
        assert!(!outcome.passed());
        assert!(matches!(
            outcome.ensure_passed(),
            Err(Error::ConfigurationsFailed { case }) if case == "flaky"
        ));

        let LoadOutcome::Loaded(doc) = runner.recorder().load() else {
            panic!("expected results document");
        };
        let Some(only) = doc.config("suite", "flaky", "only") else {
            panic!("configuration must be recorded");
        };
        assert_eq!(only.successful_repeats_number, 1);
        assert_eq!(only.failed_repeats_details.len(), 1);
    }

    #[test]
    fn config_without_successes_is_recorded_with_empty_average() {
        let dir = match tempfile::tempdir() {
            Ok(d) => d,
            Err(err) => panic!("tempdir: {err}"),
        };
        let runner = runner(dir.path(), ExecutionMode::Performance);
        let config = PerformanceConfig::new()
            .repeats(3)
            .config(ConfigSpec::new("broken"));
        let mut case = performance(config, false).wrap(
            SuiteInfo::new("suite"),
            CaseInfo::new("always_fails"),
            |_: &Parameters| -> anyhow::Result<ScalarMetric> { anyhow::bail!("server gone") },
        );

        let outcome = match case.run(&runner) {
            Ok(o) => o,
            Err(err) => panic!("run: {err}"),
        };
        assert!(!outcome.passed());

        let LoadOutcome::Loaded(doc) = runner.recorder().load() else {
            panic!("expected results document");
        };
        let Some(broken) = doc.config("suite", "always_fails", "broken") else {
            panic!("configuration must be recorded");
        };
        assert_eq!(broken.repeats_number, 3);
        assert_eq!(broken.successful_repeats_number, 0);
        assert!(broken.successful_repeats_summary.is_empty());
        assert!(broken.successful_repeats_average.is_empty());
        assert!(broken.successful_repeats_details.is_empty());
        assert_eq!(
            broken.failed_repeats_details.keys().copied().collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(
            broken
                .failed_repeats_details
                .values()
                .all(|text| text.starts_with("server gone"))
        );
    }

    #[test]
    fn no_configs_passes_without_recording() {
        let dir = match tempfile::tempdir() {
            Ok(d) => d,
            Err(err) => panic!("tempdir: {err}"),
        };
        let runner = runner(dir.path(), ExecutionMode::Performance);
        let mut case = performance(PerformanceConfig::new(), false).wrap(
            SuiteInfo::new("suite"),
            CaseInfo::new("bare"),
            |_: &Parameters| -> anyhow::Result<()> { Ok(()) },
        );

        let outcome = case.run(&runner);
        assert!(matches!(outcome, Ok(ref o) if o.passed()));
        assert!(matches!(runner.recorder().load(), LoadOutcome::NotFound));
    }
}
