use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use fsmock_metrics::Metric;
use serde::{Deserialize, Serialize};

use super::config::{CaseInfo, SuiteInfo};
use super::error::Result;

/// The persisted results document, stored under a top-level `performance` key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub repository: String,
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub commit: String,
    #[serde(default)]
    pub suites: BTreeMap<String, SuiteRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteRecord {
    pub name: String,
    #[serde(default)]
    pub copyright: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub cases: BTreeMap<String, CaseRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub configs: BTreeMap<String, ConfigRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigRecord {
    pub name: String,
    /// Milliseconds since the Unix epoch.
    pub completed: u64,
    pub parameters: Vec<Metric>,
    #[serde(default)]
    pub description: String,
    pub repeats_number: u32,
    pub successful_repeats_number: u32,
    pub successful_repeats_summary: Vec<Metric>,
    pub successful_repeats_average: Vec<Metric>,
    pub successful_repeats_details: Vec<Metric>,
    #[serde(default)]
    pub failed_repeats_details: BTreeMap<u32, String>,
}

#[derive(Deserialize)]
struct ResultsFile {
    performance: Document,
}

#[derive(Serialize)]
struct ResultsFileRef<'a> {
    performance: &'a Document,
}

impl Document {
    /// Inserts or replaces one configuration's record, refreshing suite and case metadata.
    pub fn upsert(&mut self, suite: &SuiteInfo, case: &CaseInfo, config: ConfigRecord) {
        let suite_record = self
            .suites
            .entry(suite.name.clone())
            .or_insert_with(|| SuiteRecord {
                name: suite.name.clone(),
                ..SuiteRecord::default()
            });
        suite_record.copyright = suite.copyright.clone();
        suite_record.authors = suite.authors.clone();
        suite_record.description = suite.description.clone();

        let case_record = suite_record
            .cases
            .entry(case.name.clone())
            .or_insert_with(|| CaseRecord {
                name: case.name.clone(),
                ..CaseRecord::default()
            });
        case_record.description = case.description.clone();
        case_record.configs.insert(config.name.clone(), config);
    }

    pub fn config(&self, suite: &str, case: &str, config: &str) -> Option<&ConfigRecord> {
        self.suites
            .get(suite)?
            .cases
            .get(case)?
            .configs
            .get(config)
    }
}

#[derive(Debug)]
pub enum LoadOutcome {
    NotFound,
    /// The file exists but could not be read.
    Unreadable(String),
    ParseError(String),
    Loaded(Document),
}

/// Repository name, branch and commit of the checkout the tests run from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceIdentity {
    pub repository: String,
    pub branch: String,
    pub commit: String,
}

impl SourceIdentity {
    pub fn detect() -> Self {
        Self::detect_in(Path::new("."))
    }

    /// Unknown fields are left empty when `git` is missing or `dir` is not a checkout.
    pub fn detect_in(dir: &Path) -> Self {
        let toplevel = git(dir, &["rev-parse", "--show-toplevel"]);
        let repository = Path::new(&toplevel)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            repository,
            branch: git(dir, &["rev-parse", "--abbrev-ref", "HEAD"]),
            commit: git(dir, &["rev-parse", "HEAD"]),
        }
    }

    fn into_document(self) -> Document {
        Document {
            repository: self.repository,
            branch: self.branch,
            commit: self.commit,
            suites: BTreeMap::new(),
        }
    }
}

fn git(dir: &Path, args: &[&str]) -> String {
    Command::new("git")
        .current_dir(dir)
        .args(args)
        .output()
        .ok()
        .filter(|out| out.status.success())
        .map(|out| String::from_utf8_lossy(&out.stdout).trim().to_string())
        .unwrap_or_default()
}

/// Reads and rewrites the results file, one configuration at a time.
#[derive(Debug, Clone)]
pub struct Recorder {
    path: PathBuf,
    identity: Option<SourceIdentity>,
}

impl Recorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            identity: None,
        }
    }

    /// Uses a fixed identity for fresh documents instead of asking `git`.
    pub fn with_identity(mut self, identity: SourceIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> LoadOutcome {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return LoadOutcome::NotFound,
            Err(err) => return LoadOutcome::Unreadable(err.to_string()),
        };
        match serde_json::from_str::<ResultsFile>(&text) {
            Ok(file) => LoadOutcome::Loaded(file.performance),
            Err(err) => LoadOutcome::ParseError(err.to_string()),
        }
    }

    /// Loads the existing document, or starts a fresh one when it is missing or unreadable.
    pub fn load_or_fresh(&self) -> Document {
        match self.load() {
            LoadOutcome::Loaded(doc) => doc,
            LoadOutcome::NotFound => {
                tracing::debug!(path = %self.path.display(), "no results file yet");
                self.fresh()
            }
            LoadOutcome::Unreadable(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "cannot read results file, starting fresh");
                self.fresh()
            }
            LoadOutcome::ParseError(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "discarding malformed results file");
                self.fresh()
            }
        }
    }

    fn fresh(&self) -> Document {
        self.identity
            .clone()
            .unwrap_or_else(SourceIdentity::detect)
            .into_document()
    }

    pub fn save(&self, doc: &Document) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(&ResultsFileRef { performance: doc })?;
        fs::write(&self.path, text)?;
        Ok(())
    }

    pub fn record(&self, suite: &SuiteInfo, case: &CaseInfo, config: ConfigRecord) -> Result<()> {
        let mut doc = self.load_or_fresh();
        doc.upsert(suite, case, config);
        self.save(&doc)
    }
}
