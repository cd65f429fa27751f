mod config;
mod processor;

pub use config::PipelineConfig;
pub use processor::{dump_grid_json, ReportPipeline};
