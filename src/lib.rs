pub mod config;
pub mod docx;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod progress;
pub mod report;
pub mod textutil;
