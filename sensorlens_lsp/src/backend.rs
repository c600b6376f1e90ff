//! LSP Backend implementation for sensorlens
//!
//! Provides lifecycle handlers, document synchronization and the custom
//! tree requests.

use std::path::{Path, PathBuf};

use dashmap::DashMap;
use sensorlens::LensError;
use sensorlens::config::SensorLensConfig;
use sensorlens::filter::{FilterSpec, GlobFilter};
use sensorlens::formula::validate_formula;
use sensorlens::representation::{NodeLabel, Representation, ValueSelection};
use sensorlens::tree::NodeId;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tower_lsp::jsonrpc::{Error, ErrorCode, Result};
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};

use crate::diagnostics;
use crate::hover::hover_for_position;
use crate::state::{ReportState, StateError};

/// Overrides accepted in `initializationOptions` and
/// `workspace/didChangeConfiguration` (optionally nested under `sensorlens`).
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LensOptions {
    pub report: Option<PathBuf>,
    pub filter: Option<FilterSpec>,
    pub representation: Option<Representation>,
}

impl LensOptions {
    fn from_settings(settings: &serde_json::Value) -> Option<Self> {
        let section = settings.get("sensorlens").unwrap_or(settings);
        match serde_json::from_value(section.clone()) {
            Ok(options) => Some(options),
            Err(e) => {
                tracing::warn!("ignoring invalid sensorlens settings: {}", e);
                None
            }
        }
    }

    /// Fill absent overrides from `other`.
    fn merged_over(self, other: &LensOptions) -> Self {
        Self {
            report: self.report.or_else(|| other.report.clone()),
            filter: self.filter.or_else(|| other.filter.clone()),
            representation: self
                .representation
                .or_else(|| other.representation.clone()),
        }
    }

    /// Merge over `other`, rejecting globs and formulas a pass would refuse.
    fn merged_checked(self, other: &LensOptions) -> std::result::Result<Self, LensError> {
        let merged = self.merged_over(other);
        if let Some(filter) = &merged.filter {
            GlobFilter::new(filter)?;
        }
        if let Some(repr) = &merged.representation {
            if repr.selection == ValueSelection::CustomFormula {
                validate_formula(repr.formula.as_deref().unwrap_or(""))?;
            }
        }
        Ok(merged)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChildrenParams {
    pub id: NodeId,
}

/// sensorlens LSP backend state
pub struct Backend {
    /// LSP client for sending notifications/responses
    client: Client,
    /// Published diagnostics per open document URI
    cached_diagnostics: DashMap<Url, Vec<Diagnostic>>,
    /// Workspace root path
    workspace_root: RwLock<Option<PathBuf>>,
    options: RwLock<LensOptions>,
    state: ReportState,
}

impl Backend {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            cached_diagnostics: DashMap::new(),
            workspace_root: RwLock::new(None),
            options: RwLock::new(LensOptions::default()),
            state: ReportState::new(),
        }
    }

    /// Load the report with config file values and client overrides.
    async fn load_report(&self) {
        let Some(root) = self.workspace_root.read().await.clone() else {
            return;
        };
        let config = SensorLensConfig::load(&root);
        let options = self.options.read().await.clone();

        let path = match &options.report {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => root.join(path),
            None => config.report_path(&root),
        };
        let filter = options.filter.unwrap_or(config.filter);
        let representation = options.representation.unwrap_or(config.representation);

        match self.state.load(&path, &filter, representation).await {
            Ok(()) => {
                tracing::info!("Loaded report from {}", path.display());
                self.client
                    .log_message(MessageType::INFO, "sensorlens report loaded")
                    .await;
            }
            Err(e) => {
                tracing::warn!("Failed to load report: {}", e);
                self.client
                    .log_message(MessageType::WARNING, format!("{}", e))
                    .await;
            }
        }
    }

    async fn relative_path(&self, uri: &Url) -> Option<String> {
        let root = self.workspace_root.read().await.clone()?;
        relative_to(&root, uri)
    }

    /// Trigger diagnostics for a document
    async fn publish_diagnostics(&self, uri: Url) {
        let diags = match self.relative_path(&uri).await {
            Some(file) => {
                tracing::debug!("Highlighting: {}", file);
                diagnostics::collect_diagnostics(&self.state, &file).await
            }
            None => Vec::new(),
        };

        self.cached_diagnostics.insert(uri.clone(), diags.clone());
        self.client.publish_diagnostics(uri, diags, None).await;
    }

    /// Refresh diagnostics of every open document after a new pass.
    async fn republish_all(&self) {
        let uris: Vec<Url> = self
            .cached_diagnostics
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        for uri in uris {
            self.publish_diagnostics(uri).await;
        }
    }

    /// `sensorlens/tree`
    pub async fn tree(&self) -> Result<Vec<NodeLabel>> {
        self.state.root_labels().await.map_err(to_rpc_error)
    }

    /// `sensorlens/children`
    pub async fn children(&self, params: ChildrenParams) -> Result<Vec<NodeLabel>> {
        self.state
            .children_labels(params.id)
            .await
            .map_err(to_rpc_error)
    }

    /// `sensorlens/setRepresentation`, answers with the new root labels.
    pub async fn set_representation(
        &self,
        representation: Representation,
    ) -> Result<Vec<NodeLabel>> {
        let roots = self
            .state
            .set_representation(representation.clone())
            .await
            .map_err(to_rpc_error)?;
        self.options.write().await.representation = Some(representation);
        self.republish_all().await;
        Ok(roots)
    }

    /// `sensorlens/setFilter`, answers with the new root labels.
    pub async fn set_filter(&self, filter: FilterSpec) -> Result<Vec<NodeLabel>> {
        let roots = self
            .state
            .set_filter(filter.clone())
            .await
            .map_err(to_rpc_error)?;
        self.options.write().await.filter = Some(filter);
        self.republish_all().await;
        Ok(roots)
    }

    async fn watch_report(&self) {
        let options = DidChangeWatchedFilesRegistrationOptions {
            watchers: vec![FileSystemWatcher {
                glob_pattern: GlobPattern::String("**/.sensorlens/**".to_string()),
                kind: None,
            }],
        };
        let registration = Registration {
            id: "sensorlens-report-watch".to_string(),
            method: "workspace/didChangeWatchedFiles".to_string(),
            register_options: serde_json::to_value(options).ok(),
        };
        if let Err(e) = self.client.register_capability(vec![registration]).await {
            tracing::debug!("client refused file watching: {}", e);
        }
    }
}

fn relative_to(root: &Path, uri: &Url) -> Option<String> {
    let path = uri.to_file_path().ok()?;
    let relative = path.strip_prefix(root).ok()?;
    Some(
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
    )
}

fn to_rpc_error(e: StateError) -> Error {
    if e.is_user_input() {
        tracing::warn!("rejected request: {}", e);
        Error::invalid_params(e.to_string())
    } else {
        Error {
            code: ErrorCode::InternalError,
            message: e.to_string().into(),
            data: None,
        }
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        if let Some(root) = params.root_uri.as_ref().and_then(|u| u.to_file_path().ok()) {
            tracing::info!("Workspace root: {}", root.display());
            *self.workspace_root.write().await = Some(root);
        }
        if let Some(options) = params
            .initialization_options
            .as_ref()
            .and_then(LensOptions::from_settings)
        {
            match options.merged_checked(&LensOptions::default()) {
                Ok(options) => *self.options.write().await = options,
                Err(e) => tracing::warn!("ignoring initialization options: {}", e),
            }
        }

        Ok(InitializeResult {
            server_info: Some(ServerInfo {
                name: "sensorlens-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Options(
                    TextDocumentSyncOptions {
                        open_close: Some(true),
                        change: Some(TextDocumentSyncKind::NONE),
                        save: Some(TextDocumentSyncSaveOptions::Supported(true)),
                        ..Default::default()
                    },
                )),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                ..Default::default()
            },
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        tracing::info!("sensorlens-lsp server initialized");

        self.load_report().await;
        self.watch_report().await;

        self.client
            .log_message(MessageType::INFO, "sensorlens-lsp ready")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        tracing::info!("sensorlens-lsp server shutting down");
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        tracing::debug!("did_open: {}", uri);
        self.publish_diagnostics(uri).await;
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        let uri = params.text_document.uri;
        tracing::debug!("did_save: {}", uri);
        self.publish_diagnostics(uri).await;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        tracing::debug!("did_close: {}", uri);

        self.cached_diagnostics.remove(&uri);

        // Publish empty diagnostics to clear any shown in the editor
        self.client.publish_diagnostics(uri, vec![], None).await;
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let uri = params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;
        let Some(file) = self.relative_path(&uri).await else {
            return Ok(None);
        };

        let highlights = self.state.highlights(&file).await;
        let label = self.state.label_for_path(&file).await;
        Ok(hover_for_position(&highlights, position, label.as_ref()))
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        let Some(incoming) = LensOptions::from_settings(&params.settings) else {
            return;
        };
        // Rejected settings are never stored.
        let accepted = {
            let mut options = self.options.write().await;
            incoming
                .merged_checked(&options)
                .map(|merged| *options = merged)
        };
        if let Err(e) = accepted {
            tracing::warn!("rejected sensorlens settings: {}", e);
            self.client
                .show_message(MessageType::WARNING, format!("sensorlens: {}", e))
                .await;
            return;
        }
        self.load_report().await;
        self.republish_all().await;
    }

    async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        let Some(report) = self.state.report_path().await else {
            self.load_report().await;
            self.republish_all().await;
            return;
        };
        let touched = params
            .changes
            .iter()
            .filter_map(|change| change.uri.to_file_path().ok())
            .any(|path| path == report || path.ends_with("config.toml"));
        if !touched {
            return;
        }

        tracing::info!("report or config changed, reloading");
        self.load_report().await;
        self.republish_all().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensorlens::measurement::SensorField;
    use sensorlens::representation::DisplayMode;

    #[test]
    fn relative_paths_use_forward_slashes() {
        let root = PathBuf::from("/work/project");
        let uri = Url::from_file_path("/work/project/src/util/a.ts").expect("file url");
        assert_eq!(relative_to(&root, &uri).as_deref(), Some("src/util/a.ts"));

        let outside = Url::from_file_path("/elsewhere/a.ts").expect("file url");
        assert_eq!(relative_to(&root, &outside), None);
    }

    #[test]
    fn options_accept_nested_section() {
        let settings = serde_json::json!({
            "sensorlens": {
                "report": "out/report.json",
                "filter": {"include": "src"},
                "representation": {"field": "profilerHits", "mode": "totally-relative"}
            }
        });
        let options = LensOptions::from_settings(&settings).expect("options");
        assert_eq!(options.report, Some(PathBuf::from("out/report.json")));
        assert_eq!(
            options.filter.and_then(|f| f.include).as_deref(),
            Some("src")
        );
        let repr = options.representation.expect("representation");
        assert_eq!(repr.selection, ValueSelection::Field(SensorField::ProfilerHits));
        assert_eq!(repr.mode, DisplayMode::TotallyRelative);
    }

    #[test]
    fn invalid_options_are_ignored() {
        let settings = serde_json::json!({"representation": {"field": "nope"}});
        assert!(LensOptions::from_settings(&settings).is_none());
    }

    #[test]
    fn merge_keeps_previous_overrides() {
        let previous = LensOptions {
            report: Some(PathBuf::from("a.json")),
            filter: Some(FilterSpec::new(Some("src"), None)),
            representation: None,
        };
        let incoming = LensOptions {
            filter: Some(FilterSpec::new(None, Some("lib"))),
            ..Default::default()
        };
        let merged = incoming.merged_over(&previous);
        assert_eq!(merged.report, Some(PathBuf::from("a.json")));
        assert_eq!(
            merged.filter.and_then(|f| f.exclude).as_deref(),
            Some("lib")
        );
    }

    #[test]
    fn rejected_settings_leave_options_untouched() {
        let previous = LensOptions {
            filter: Some(FilterSpec::new(Some("src"), None)),
            representation: Some(Representation::field(
                SensorField::ProfilerHits,
                DisplayMode::Absolute,
            )),
            ..Default::default()
        };

        let settings = serde_json::json!({
            "representation": {"field": "customFormula", "formula": "bogus"}
        });
        let incoming = LensOptions::from_settings(&settings).expect("well-formed settings");
        let err = incoming.merged_checked(&previous).unwrap_err();
        assert!(matches!(err, LensError::Formula(_)));

        let incoming = LensOptions {
            filter: Some(FilterSpec::new(Some("src/[x"), None)),
            ..Default::default()
        };
        assert!(matches!(
            incoming.merged_checked(&previous),
            Err(LensError::InvalidGlob { .. })
        ));

        let incoming = LensOptions {
            representation: Some(Representation::formula(
                "aggregatedCPUTime / profilerHits",
                DisplayMode::Absolute,
            )),
            ..Default::default()
        };
        let merged = incoming.merged_checked(&previous).expect("valid settings");
        assert_eq!(merged.filter, previous.filter);
        assert_eq!(
            merged.representation.map(|r| r.selection),
            Some(ValueSelection::CustomFormula)
        );
    }

    #[test]
    fn user_errors_map_to_invalid_params() {
        let err = to_rpc_error(StateError::Lens(LensError::InvalidGlob {
            pattern: "[".into(),
            reason: "unclosed".into(),
        }));
        assert_eq!(err.code, ErrorCode::InvalidParams);
        assert_eq!(to_rpc_error(StateError::NotLoaded).code, ErrorCode::InternalError);
    }
}
