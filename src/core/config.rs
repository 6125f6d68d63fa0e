use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::core::story::GenerationOptions;
use crate::services::llm::LlmConfig;

const CONFIG_FILE: &str = "config.yml";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_output")]
    pub output_folder: String,

    #[serde(default)]
    pub unattended: bool,

    pub llm: LlmConfig,

    #[serde(default)]
    pub defaults: StoryDefaults,
}

/// Values the interactive runner offers when the user gives none.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoryDefaults {
    #[serde(default = "default_genre")]
    pub genre: String,
    #[serde(default = "default_style")]
    pub storyboard_style: String,
    #[serde(default)]
    pub options: GenerationOptions,
}

impl Default for StoryDefaults {
    fn default() -> Self {
        Self {
            genre: default_genre(),
            storyboard_style: default_style(),
            options: GenerationOptions::default(),
        }
    }
}

fn default_output() -> String {
    "output".to_string()
}
fn default_genre() -> String {
    "adventure".to_string()
}
fn default_style() -> String {
    "storybook".to_string()
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Path::new(CONFIG_FILE);
        if !path.exists() {
            anyhow::bail!("{} not found. Please create one.", CONFIG_FILE);
        }
        Self::load_from(path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Config = serde_yaml_ng::from_str(content)?;
        config.llm.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(Path::new(CONFIG_FILE))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = serde_yaml_ng::to_string(self)?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.output_folder)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_gets_defaults() -> Result<()> {
        let yaml = r#"
llm:
  provider: gemini
  gemini:
    api_key: "abc"
    model: "gemini-1.5-flash"
"#;
        let config = Config::from_yaml(yaml)?;
        assert_eq!(config.output_folder, "output");
        assert_eq!(config.llm.max_attempts, 3);
        assert_eq!(config.llm.retry_delay_seconds, 2);
        assert_eq!(config.llm.timeout_seconds, 45);
        assert_eq!(config.llm.probe_timeout_seconds, 30);
        assert_eq!(config.defaults.genre, "adventure");
        assert_eq!(config.defaults.options.tone, "lighthearted");
        Ok(())
    }

    #[test]
    fn test_missing_provider_section_is_rejected() {
        let yaml = r#"
llm:
  provider: openai
"#;
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("openai"));
    }

    #[test]
    fn test_save_and_load_roundtrip_through_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.yml");
        let yaml = r#"
output_folder: stories
llm:
  provider: ollama
  max_attempts: 5
  ollama:
    base_url: "http://localhost:11434/"
    model: "llama3"
defaults:
  genre: fantasy
  options:
    tone: mysterious
    length: long
"#;
        fs::write(&path, yaml)?;
        let config = Config::load_from(&path)?;
        assert_eq!(config.output_folder, "stories");
        assert_eq!(config.llm.max_attempts, 5);
        assert_eq!(config.defaults.genre, "fantasy");
        assert_eq!(config.defaults.options.length, "long");
        assert!(config.defaults.options.include_video);

        let copy_path = dir.path().join("copy.yml");
        config.save_to(&copy_path)?;
        let reloaded = Config::load_from(&copy_path)?;
        assert_eq!(reloaded.llm.provider, "ollama");
        assert_eq!(reloaded.defaults.options.tone, "mysterious");
        Ok(())
    }

    #[test]
    fn test_load_from_missing_file_mentions_path() {
        let err = Config::load_from(Path::new("/definitely/not/here.yml")).unwrap_err();
        assert!(err.to_string().contains("here.yml"));
    }
}
