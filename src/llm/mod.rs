pub mod backend;
pub mod client;
pub mod invoke;
pub mod ollama;
pub mod prompt;
