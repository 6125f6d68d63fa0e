use serde::{Deserialize, Serialize};

/// Number of scenes every normally completed story carries.
pub const SCENES_PER_STORY: usize = 4;

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CharacterProfile {
    pub name: String,
    #[serde(default)]
    pub traits: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl CharacterProfile {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_traits(mut self, traits: &[&str]) -> Self {
        self.traits = traits.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOptions {
    #[serde(default = "default_tone")]
    pub tone: String, // lighthearted, serious, humorous, dramatic, mysterious, romantic
    #[serde(default = "default_length")]
    pub length: String, // short, medium, long
    #[serde(default = "default_true")]
    pub include_voice: bool,
    #[serde(default = "default_true")]
    pub include_video: bool,
}

fn default_tone() -> String {
    "lighthearted".to_string()
}
fn default_length() -> String {
    "medium".to_string()
}
fn default_true() -> bool {
    true
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            tone: default_tone(),
            length: default_length(),
            include_voice: true,
            include_video: true,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub id: String,
    pub number: usize,
    pub title: String,
    pub content: String,
    pub description: String,
    pub character_name: String,
    pub storyboard_prompt: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub title: String,
    pub scenes: Vec<Scene>,
    pub total_scenes: usize,
    pub character: CharacterProfile,
    #[serde(default, skip_serializing_if = "is_false")]
    pub emergency_fallback: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub fallback_parsed: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Story {
    pub fn title_for(character: &CharacterProfile) -> String {
        format!("{}'s Adventure", character.name)
    }

    /// True when the parser had to degrade to anything but the primary strategy.
    pub fn is_degraded(&self) -> bool {
        self.emergency_fallback || self.fallback_parsed
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationMetadata {
    pub genre: String,
    pub character_name: String,
    pub estimated_read_time: usize,
    pub scene_count: usize,
    pub generated_by: String,
    pub attempt: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub success: bool,
    pub story: Story,
    pub raw_text: String,
    pub metadata: GenerationMetadata,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoryboardRequest {
    pub prompt: String,
    pub scene_id: String,
    pub image_url: Option<String>,
}

/// Minutes, one per started thousand characters.
pub fn estimated_read_time(raw_text: &str) -> usize {
    raw_text.chars().count().div_ceil(1000)
}
