//! sensorlens LSP Server binary entry point

use sensorlens_lsp::run_server;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run_server().await {
        tracing::error!("LSP server error: {}", e);
        std::process::exit(1);
    }
}
