pub mod compose;
pub mod content;
pub mod labels;
pub mod orchestrator;
pub mod prompt;
pub mod request;

pub use orchestrator::{
    ErrorKind, ReportError, ReportOrchestrator, ReportOutcome, ReportRun, ReportSettings,
    ReportState,
};
pub use request::{Audience, InterviewMetrics, ReportRequest};
