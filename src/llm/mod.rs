pub mod gemini;

pub use gemini::{GeminiClient, PortraitGenerator, ResponsePart, SourceImage};
