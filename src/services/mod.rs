pub mod generator;
pub mod llm;
pub mod parser;
pub mod prompt;
pub mod setup;
pub mod storyboard;
