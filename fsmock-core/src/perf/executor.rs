use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use fsmock_metrics::{Parameters, PerRepeatMetric, ScalarMetric};

use super::error::{Error, Result};

pub const TEST_TIME_METRIC: &str = "test_time";

/// Values a test body may return as its extra metrics.
pub trait IntoMetrics {
    fn into_metrics(self) -> Vec<ScalarMetric>;
}

impl IntoMetrics for () {
    fn into_metrics(self) -> Vec<ScalarMetric> {
        Vec::new()
    }
}

impl IntoMetrics for ScalarMetric {
    fn into_metrics(self) -> Vec<ScalarMetric> {
        vec![self]
    }
}

impl IntoMetrics for Option<ScalarMetric> {
    fn into_metrics(self) -> Vec<ScalarMetric> {
        self.into_iter().collect()
    }
}

impl IntoMetrics for Vec<ScalarMetric> {
    fn into_metrics(self) -> Vec<ScalarMetric> {
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RepeatResult {
    /// `test_time` first, followed by the body's own metrics.
    Success(Vec<ScalarMetric>),
    /// Error text and trace of a failed or panicking body.
    Failure(String),
}

impl RepeatResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

fn test_time_metric(elapsed: Duration) -> ScalarMetric {
    let us = i64::try_from(elapsed.as_micros()).unwrap_or(i64::MAX);
    ScalarMetric::new(TEST_TIME_METRIC, us)
        .with_description("Test execution time.")
        .with_unit("us")
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "test body panicked".to_string()
    }
}

/// Message, cause chain and a stack trace. The trace is taken here when the error carries none.
fn error_text(err: &anyhow::Error) -> String {
    match err.backtrace().status() {
        BacktraceStatus::Captured => format!("{err:#}\n{err:?}"),
        _ => format!("{err:#}\n{err:?}\n\nStack backtrace:\n{}", Backtrace::force_capture()),
    }
}

/// Runs the body once and times it. Errors and panics become [`RepeatResult::Failure`].
pub fn run_repeat<F, R>(body: &mut F, params: &Parameters) -> RepeatResult
where
    F: FnMut(&Parameters) -> anyhow::Result<R>,
    R: IntoMetrics,
{
    let started = Instant::now();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| body(params)));
    let elapsed = started.elapsed();

    match outcome {
        Ok(Ok(out)) => {
            let mut metrics = vec![test_time_metric(elapsed)];
            metrics.extend(out.into_metrics());
            RepeatResult::Success(metrics)
        }
        Ok(Err(err)) => RepeatResult::Failure(error_text(&err)),
        Err(payload) => RepeatResult::Failure(format!(
            "{}\n{}",
            panic_message(payload.as_ref()),
            Backtrace::force_capture()
        )),
    }
}

/// Accumulated results of all repeats of one configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepeatsOutcome {
    pub repeats: u32,
    pub successful: u32,
    /// Per-metric sums over successful repeats.
    pub summary: Vec<ScalarMetric>,
    /// Per-metric values keyed by repeat number. Failed repeats hold 0.
    pub details: Vec<PerRepeatMetric>,
    pub failed: BTreeMap<u32, String>,
}

impl RepeatsOutcome {
    pub fn record(&mut self, repeat: u32, result: RepeatResult) {
        self.repeats = self.repeats.max(repeat);
        match result {
            RepeatResult::Success(metrics) if self.successful == 0 => {
                self.summary = metrics.clone();
                self.details = metrics
                    .into_iter()
                    .map(|m| {
                        let mut d = m.into_per_repeat(repeat);
                        for &earlier in self.failed.keys() {
                            d.append(earlier, 0);
                        }
                        d
                    })
                    .collect();
                self.successful = 1;
            }
            RepeatResult::Success(metrics) => {
                for (idx, m) in metrics.into_iter().enumerate() {
                    if let Some(slot) = slot_of(&self.summary, idx, &m.name, |s| &s.name) {
                        self.summary[slot].aggregate(m.value);
                    }
                    if let Some(slot) = slot_of(&self.details, idx, &m.name, |d| &d.name) {
                        self.details[slot].append(repeat, m.value);
                    }
                }
                self.zero_fill(repeat);
                self.successful += 1;
            }
            RepeatResult::Failure(text) => {
                self.zero_fill(repeat);
                self.failed.insert(repeat, text);
            }
        }
    }

    fn zero_fill(&mut self, repeat: u32) {
        for d in &mut self.details {
            if d.get(repeat).is_none() {
                d.append(repeat, 0);
            }
        }
    }

    /// Summary divided by the number of successful repeats.
    pub fn average(&self) -> Result<Vec<ScalarMetric>> {
        if self.successful == 0 {
            return Err(Error::NoSuccessfulRepeats);
        }
        Ok(self
            .summary
            .iter()
            .filter_map(|m| m.average(u64::from(self.successful)))
            .collect())
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

fn slot_of<T>(items: &[T], idx: usize, name: &str, name_of: impl Fn(&T) -> &String) -> Option<usize> {
    match items.get(idx) {
        Some(item) if name_of(item) == name => Some(idx),
        _ => items.iter().position(|item| name_of(item) == name),
    }
}

/// Runs `repeats` repeats (numbered from 1) with the same parameters.
pub fn run_repeats<F, R>(body: &mut F, params: &Parameters, repeats: u32) -> RepeatsOutcome
where
    F: FnMut(&Parameters) -> anyhow::Result<R>,
    R: IntoMetrics,
{
    let mut outcome = RepeatsOutcome::default();
    for repeat in 1..=repeats {
        let result = run_repeat(body, params);
        if let RepeatResult::Failure(text) = &result {
            let first_line = text.lines().next().unwrap_or_default();
            tracing::warn!(repeat, error = first_line, "repeat failed");
        }
        outcome.record(repeat, result);
    }
    outcome.repeats = repeats;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric(name: &str, value: i64) -> ScalarMetric {
        ScalarMetric::new(name, value)
    }

    #[test]
    fn success_prepends_test_time() {
        let mut body = |_: &Parameters| -> anyhow::Result<ScalarMetric> { Ok(metric("ops", 7)) };
        let result = run_repeat(&mut body, &Parameters::default());

        let RepeatResult::Success(metrics) = &result else {
            panic!("expected success, got {result:?}");
        };
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[0].name, TEST_TIME_METRIC);
        assert_eq!(metrics[0].unit, "us");
        assert_eq!(metrics[0].description, "Test execution time.");
        assert!(metrics[0].value >= 0);
        assert_eq!(metrics[1], metric("ops", 7));
    }

    #[test]
    fn errors_and_panics_become_failures() {
        let mut failing = |_: &Parameters| -> anyhow::Result<()> { anyhow::bail!("boom") };
        let RepeatResult::Failure(text) = run_repeat(&mut failing, &Parameters::default()) else {
            panic!("expected failure");
        };
        assert!(text.starts_with("boom"));
        assert!(text.contains("Stack backtrace:"));
        assert!(text.lines().count() > 3, "no trace in {text:?}");

        let mut panicking = |_: &Parameters| -> anyhow::Result<()> { panic!("kaboom") };
        let RepeatResult::Failure(text) = run_repeat(&mut panicking, &Parameters::default()) else {
            panic!("expected failure");
        };
        assert!(text.starts_with("kaboom"));
        assert!(text.lines().count() > 2, "no trace in {text:?}");
    }

    #[test]
    fn averages_successful_repeats() {
        let mut outcome = RepeatsOutcome::default();
        for (repeat, v) in [(1, 10), (2, 20), (3, 30)] {
            outcome.record(repeat, RepeatResult::Success(vec![metric("ops", v)]));
        }

        assert_eq!(outcome.summary, vec![metric("ops", 60)]);
        assert_eq!(outcome.average().ok(), Some(vec![metric("ops", 20)]));
        assert_eq!(outcome.details[0].get(2), Some(20));
        assert!(outcome.all_succeeded());
    }

    #[test]
    fn failed_repeats_record_zero_details() {
        let mut outcome = RepeatsOutcome::default();
        outcome.record(1, RepeatResult::Failure("first".into()));
        outcome.record(2, RepeatResult::Success(vec![metric("ops", 4)]));
        outcome.record(3, RepeatResult::Failure("third".into()));
        outcome.record(4, RepeatResult::Success(vec![metric("ops", 8)]));

        assert_eq!(outcome.repeats, 4);
        assert_eq!(outcome.successful, 2);
        assert_eq!(outcome.summary, vec![metric("ops", 12)]);
        assert_eq!(outcome.average().ok(), Some(vec![metric("ops", 6)]));

        let details = &outcome.details[0];
        assert_eq!(details.len(), 4);
        assert_eq!(details.get(1), Some(0));
        assert_eq!(details.get(3), Some(0));
        assert_eq!(details.get(4), Some(8));

        assert_eq!(outcome.failed.len(), 2);
        assert_eq!(outcome.failed.get(&3).map(String::as_str), Some("third"));
    }

    #[test]
    fn no_successful_repeats_cannot_be_averaged() {
        let mut outcome = RepeatsOutcome::default();
        outcome.record(1, RepeatResult::Failure("nope".into()));

        assert!(matches!(outcome.average(), Err(Error::NoSuccessfulRepeats)));
        assert!(outcome.details.is_empty());
        assert!(!outcome.all_succeeded());
    }

    #[test]
    fn run_repeats_numbers_from_one() {
        let mut calls = 0;
        let mut body = |p: &Parameters| -> anyhow::Result<ScalarMetric> {
            calls += 1;
            if calls == 2 {
                anyhow::bail!("second call fails");
            }
            Ok(metric("size", p.get_or("size", 0)))
        };
        let params = Parameters::from(&vec![metric("size", 3)]);
        let outcome = run_repeats(&mut body, &params, 3);

        assert_eq!(outcome.repeats, 3);
        assert_eq!(outcome.successful, 2);
        assert_eq!(outcome.failed.keys().copied().collect::<Vec<_>>(), vec![2]);
        assert_eq!(outcome.summary[1], metric("size", 6));
    }
}
