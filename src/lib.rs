pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod render;
pub mod routes;
pub mod telemetry;

use std::sync::Arc;

pub use config::Config;

use pipeline::ReportOrchestrator;
use render::FontStore;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ReportOrchestrator>,
    pub fonts: Arc<FontStore>,
}
