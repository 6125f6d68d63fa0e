pub mod core;
pub mod services;

pub use crate::core::story::{
    CharacterProfile, GenerationMetadata, GenerationOptions, GenerationResult, Scene, Story,
    StoryboardRequest,
};
pub use crate::services::generator::{AvailabilityReport, RetryPolicy, StoryGenerator};
pub use crate::services::llm::LlmClient;
