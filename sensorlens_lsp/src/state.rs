//! Report loading and the shared session for sensorlens LSP
//!
//! Passes run under the write guard, so readers only ever see a completed
//! tree.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sensorlens::filter::FilterSpec;
use sensorlens::highlight::Highlight;
use sensorlens::representation::{NodeLabel, Representation};
use sensorlens::session::LensSession;
use sensorlens::tree::NodeId;
use sensorlens::{LensError, Report};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("report not found at {0:?}. Run the profiler with report output enabled first.")]
    NotFound(PathBuf),

    #[error("error reading report {0:?}: {1}")]
    Read(PathBuf, String),

    #[error("error parsing report {0:?}: {1}")]
    Parse(PathBuf, String),

    #[error("no report loaded")]
    NotLoaded,

    #[error(transparent)]
    Lens(#[from] LensError),
}

impl StateError {
    /// Errors caused by the request itself rather than by the server state.
    pub fn is_user_input(&self) -> bool {
        matches!(self, StateError::Lens(e) if e.is_user_input())
    }
}

struct Loaded {
    session: LensSession,
    path: PathBuf,
}

/// Session state wrapper for async access
#[derive(Clone, Default)]
pub struct ReportState {
    inner: Arc<RwLock<Option<Loaded>>>,
}

impl ReportState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a report and run the first pass with the given view.
    pub async fn load(
        &self,
        path: &Path,
        filter: &FilterSpec,
        representation: Representation,
    ) -> Result<(), StateError> {
        let report = read_report(path).await?;
        let session = LensSession::with_settings(report, filter, representation)?;
        *self.inner.write().await = Some(Loaded {
            session,
            path: path.to_path_buf(),
        });
        Ok(())
    }

    /// Re-read the report from disk, keeping filter and representation.
    pub async fn reload(&self) -> Result<(), StateError> {
        let path = self.report_path().await.ok_or(StateError::NotLoaded)?;
        let report = read_report(&path).await?;
        let mut guard = self.inner.write().await;
        let loaded = guard.as_mut().ok_or(StateError::NotLoaded)?;
        loaded.session.set_report(report)?;
        Ok(())
    }

    pub async fn is_loaded(&self) -> bool {
        self.inner.read().await.is_some()
    }

    pub async fn report_path(&self) -> Option<PathBuf> {
        self.inner.read().await.as_ref().map(|l| l.path.clone())
    }

    pub async fn set_representation(
        &self,
        representation: Representation,
    ) -> Result<Vec<NodeLabel>, StateError> {
        let mut guard = self.inner.write().await;
        let loaded = guard.as_mut().ok_or(StateError::NotLoaded)?;
        loaded.session.set_representation(representation)?;
        Ok(root_labels(&loaded.session))
    }

    pub async fn set_filter(&self, spec: FilterSpec) -> Result<Vec<NodeLabel>, StateError> {
        let mut guard = self.inner.write().await;
        let loaded = guard.as_mut().ok_or(StateError::NotLoaded)?;
        loaded.session.set_filter(spec)?;
        Ok(root_labels(&loaded.session))
    }

    pub async fn root_labels(&self) -> Result<Vec<NodeLabel>, StateError> {
        let guard = self.inner.read().await;
        let loaded = guard.as_ref().ok_or(StateError::NotLoaded)?;
        Ok(root_labels(&loaded.session))
    }

    pub async fn children_labels(&self, id: NodeId) -> Result<Vec<NodeLabel>, StateError> {
        let guard = self.inner.read().await;
        let loaded = guard.as_ref().ok_or(StateError::NotLoaded)?;
        let rendered = loaded.session.rendered().ok_or(StateError::NotLoaded)?;
        Ok(rendered.children_labels(id)?)
    }

    /// Highlights of a project-relative file. Empty when nothing is loaded
    /// or the report does not know the file.
    pub async fn highlights(&self, file: &str) -> Vec<Highlight> {
        let guard = self.inner.read().await;
        let Some(loaded) = guard.as_ref() else {
            return Vec::new();
        };
        match loaded.session.highlights(file) {
            Ok(highlights) => highlights,
            Err(e) => {
                tracing::debug!("no highlights for {}: {}", file, e);
                Vec::new()
            }
        }
    }

    /// Label of the tree node at a project-relative path.
    pub async fn label_for_path(&self, path: &str) -> Option<NodeLabel> {
        let guard = self.inner.read().await;
        let rendered = guard.as_ref()?.session.rendered()?;
        let id = rendered.find_by_path(path)?;
        rendered.label(id).ok().cloned()
    }
}

fn root_labels(session: &LensSession) -> Vec<NodeLabel> {
    session
        .rendered()
        .map(|r| r.root_labels())
        .unwrap_or_default()
}

async fn read_report(path: &Path) -> Result<Report, StateError> {
    if !path.exists() {
        return Err(StateError::NotFound(path.to_path_buf()));
    }
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| StateError::Read(path.to_path_buf(), e.to_string()))?;
    Report::from_json(&content).map_err(|e| StateError::Parse(path.to_path_buf(), e.to_string()))
}
