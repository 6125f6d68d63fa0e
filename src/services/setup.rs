use crate::core::config::Config;
use crate::core::story::{CharacterProfile, GenerationOptions};
use anyhow::{anyhow, Result};
use inquire::{Confirm, Select, Text};

pub const TONES: &[&str] = &[
    "lighthearted",
    "serious",
    "humorous",
    "dramatic",
    "mysterious",
    "romantic",
];
pub const LENGTHS: &[&str] = &["short", "medium", "long"];

/// Everything needed for one generation call.
#[derive(Debug, Clone)]
pub struct StoryRequest {
    pub prompt: String,
    pub genre: String,
    pub character: CharacterProfile,
    pub options: GenerationOptions,
}

/// Splits "brave, curious ,, kind" into trimmed, non-empty traits.
pub fn parse_traits(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Builds a request from command line arguments: `<prompt> <character> [genre]`.
pub fn request_from_args(config: &Config, args: &[String]) -> Result<StoryRequest> {
    let prompt = args
        .first()
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| anyhow!("Unattended mode needs a story prompt argument"))?;
    let name = args.get(1).map(String::as_str).unwrap_or("the protagonist");
    let genre = args.get(2).unwrap_or(&config.defaults.genre);

    Ok(StoryRequest {
        prompt: prompt.clone(),
        genre: genre.clone(),
        character: CharacterProfile::new(name),
        options: config.defaults.options.clone(),
    })
}

fn select_with_default(prompt: &str, choices: &[&str], default: &str) -> Result<String> {
    let cursor = choices.iter().position(|c| *c == default).unwrap_or(0);
    let selection = Select::new(prompt, choices.to_vec())
        .with_starting_cursor(cursor)
        .prompt()?;
    Ok(selection.to_string())
}

pub fn run_setup(config: &Config) -> Result<StoryRequest> {
    let prompt = Text::new("What should the story be about?").prompt()?;
    if prompt.trim().is_empty() {
        return Err(anyhow!("A story prompt is required"));
    }
    let genre = Text::new("Genre:")
        .with_default(&config.defaults.genre)
        .prompt()?;

    let name = Text::new("Character name:").prompt()?;
    let traits = Text::new("Character traits (comma separated):")
        .with_default("")
        .prompt()?;
    let description = Text::new("Character description (optional):")
        .with_default("")
        .prompt()?;

    let defaults = &config.defaults.options;
    let tone = select_with_default("Tone:", TONES, &defaults.tone)?;
    let length = select_with_default("Length:", LENGTHS, &defaults.length)?;
    let include_voice = Confirm::new("Prepare the story for voice narration?")
        .with_default(defaults.include_voice)
        .prompt()?;
    let include_video = Confirm::new("Prepare the story for storyboard video?")
        .with_default(defaults.include_video)
        .prompt()?;

    let mut character = CharacterProfile::new(name.trim());
    character.traits = parse_traits(&traits);
    if !description.trim().is_empty() {
        character.description = Some(description.trim().to_string());
    }

    Ok(StoryRequest {
        prompt,
        genre,
        character,
        options: GenerationOptions {
            tone,
            length,
            include_voice,
            include_video,
        },
    })
}

/// Copies the request's genre and options into the config defaults.
pub fn remember_choices(config: &mut Config, request: &StoryRequest) {
    config.defaults.genre = request.genre.clone();
    config.defaults.options = request.options.clone();
}

/// Asks whether to keep this run's choices as defaults and writes `config.yml` if so.
pub fn offer_to_remember(config: &mut Config, request: &StoryRequest) -> Result<()> {
    let remember = Confirm::new("Use these choices as defaults next time?")
        .with_default(false)
        .prompt()?;
    if remember {
        remember_choices(config, request);
        config.save()?;
        println!("Defaults saved to config.yml");
    }
    Ok(())
}
