//! Essay feedback server: rubric evaluation through Gemini with
//! deterministic scoring and rendering.

pub mod assessment;
pub mod config;
pub mod error;
pub mod feedback;
pub mod generation;
pub mod http;
pub mod prompts;
