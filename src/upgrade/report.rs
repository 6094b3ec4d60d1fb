// src/upgrade/report.rs

//! The structured result handed back to callers of `upgrade`

use super::error::UpgradeError;
use crate::resolver::GraphNode;
use serde::Serialize;
use std::path::PathBuf;

/// Terminal state of an upgrade request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    /// Nothing needed doing
    Noop,
    #[default]
    Failure,
}

/// Both renderings of the error that ended an upgrade
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub kind: String,
    pub oneline: String,
    pub multiline: String,
}

impl From<&UpgradeError> for ErrorReport {
    fn from(err: &UpgradeError) -> Self {
        Self {
            kind: err.kind().to_string(),
            oneline: err.to_string(),
            multiline: err.multiline(),
        }
    }
}

/// Outcome of one upgrade request
///
/// `error` is set exactly when `result` is `Noop` or `Failure`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpgradeResult {
    pub module_name: String,
    /// Installed version in display form (`v1.0.0`), when known
    pub installed_version: Option<String>,
    /// Explicit version, or `latest`/`best`
    pub requested_version: Option<String>,
    pub result: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReport>,
    /// Install path of the graph root
    pub base_dir: Option<PathBuf>,
    pub affected_modules: Vec<GraphNode>,
}

impl UpgradeResult {
    /// A result that knows only which module was asked for
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            ..Default::default()
        }
    }

    /// Record the versions learned once the installed module was found
    pub fn with_versions(mut self, installed_version: Option<String>, requested_version: String) -> Self {
        self.installed_version = installed_version;
        self.requested_version = Some(requested_version);
        self
    }

    /// Finish as a success over the given resolution graph
    pub fn succeeded(mut self, graph: Vec<GraphNode>) -> Self {
        self.result = Outcome::Success;
        self.error = None;
        self.base_dir = graph.first().map(|node| node.install_path.clone());
        self.affected_modules = graph;
        self
    }

    /// Finish as a noop or failure, depending on the error
    pub fn stopped(mut self, err: &UpgradeError) -> Self {
        self.result = if err.is_noop() {
            Outcome::Noop
        } else {
            Outcome::Failure
        };
        self.error = Some(ErrorReport::from(err));
        self
    }

    pub fn is_success(&self) -> bool {
        self.result == Outcome::Success
    }

    pub fn is_failure(&self) -> bool {
        self.result == Outcome::Failure
    }
}
