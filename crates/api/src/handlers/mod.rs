pub mod gpu;
pub mod jobs;
pub mod llm;
