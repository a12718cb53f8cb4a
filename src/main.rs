use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::signal;

use report_generator::config::Config;
use report_generator::llm::{GeminiProvider, LlmClient, Provider};
use report_generator::pipeline::{ReportOrchestrator, ReportSettings};
use report_generator::render::{DocumentRenderer, FontStore, Logo, Typography};
use report_generator::telemetry::init_telemetry;
use report_generator::{AppState, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("invalid configuration")?;

    let telemetry_guard = init_telemetry(&config)?;

    tracing::info!(
        port = config.port,
        environment = %config.environment,
        model = %config.gemini_model,
        "Starting interview-report-generator"
    );

    let fonts = Arc::new(
        FontStore::load_dir(&config.fonts_dir)
            .with_context(|| format!("loading fonts from {}", config.fonts_dir.display()))?,
    );
    tracing::info!(
        dir = %config.fonts_dir.display(),
        fonts = ?fonts.names(),
        "Fonts loaded"
    );
    for name in [&config.body_font, &config.heading_font] {
        if fonts.get(name).is_none() {
            tracing::warn!(font = %name, "Configured font is not in the fonts directory");
        }
    }

    let logo = config.logo_path.as_deref().and_then(|path| match Logo::load(path) {
        Ok(logo) => {
            tracing::info!(
                path = %path.display(),
                width = logo.width(),
                height = logo.height(),
                "Logo loaded"
            );
            Some(Arc::new(logo))
        }
        Err(err) => {
            tracing::warn!(error = %err, "Logo unavailable, reports are rendered without it");
            None
        }
    });

    let provider: Arc<dyn Provider> = Arc::new(
        GeminiProvider::new(
            &config.gemini_api_key,
            &config.gemini_base_url,
            config.request_timeout,
        )
        .context("building Gemini HTTP client")?,
    );
    let llm_client = LlmClient::new(
        provider,
        config.retry,
        config.request_timeout,
        config.max_prompt_bytes,
    );

    let renderer = Arc::new(
        DocumentRenderer::new(
            fonts.clone(),
            Typography {
                body: config.body_font.clone(),
                heading: config.heading_font.clone(),
            },
        )
        .with_logo(logo),
    );
    let orchestrator = Arc::new(ReportOrchestrator::new(
        llm_client,
        renderer,
        ReportSettings::from_config(&config),
    ));

    let state = AppState {
        orchestrator,
        fonts,
    };
    let app = routes::create_router(state, config.http_request_timeout);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(%addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    telemetry_guard.shutdown();

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
