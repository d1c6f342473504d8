pub mod ai_service;
pub mod gemini; // Google Gemini REST adapter

pub use ai_service::{GenerativeService, Generation};
pub use gemini::GeminiService;
