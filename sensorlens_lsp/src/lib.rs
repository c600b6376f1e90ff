//! sensorlens Language Server Protocol implementation
//!
//! Publishes per-line measurements as diagnostics and hovers, and serves the
//! filtered, aggregated report tree to editor tree views through custom
//! requests:
//!
//! - `sensorlens/tree`: root labels
//! - `sensorlens/children`: labels of one node's children (`{"id": n}`)
//! - `sensorlens/setRepresentation`: switch field, formula or display mode
//! - `sensorlens/setFilter`: switch include/exclude globs

use tower_lsp::{LspService, Server};

mod backend;
mod diagnostics;
mod hover;
mod state;

pub use backend::{Backend, ChildrenParams, LensOptions};
pub use state::{ReportState, StateError};

/// Run the LSP server over stdio
pub async fn run_server() -> anyhow::Result<()> {
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::build(Backend::new)
        .custom_method("sensorlens/tree", Backend::tree)
        .custom_method("sensorlens/children", Backend::children)
        .custom_method("sensorlens/setRepresentation", Backend::set_representation)
        .custom_method("sensorlens/setFilter", Backend::set_filter)
        .finish();
    Server::new(stdin, stdout, socket).serve(service).await;

    Ok(())
}
