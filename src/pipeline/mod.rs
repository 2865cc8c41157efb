//! Pipeline orchestration: context plus controller.

mod context;
mod controller;

pub use context::AnalysisContext;
pub use controller::PipelineController;
