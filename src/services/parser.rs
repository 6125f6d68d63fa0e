use crate::core::story::{CharacterProfile, Scene, Story, SCENES_PER_STORY};
use crate::services::storyboard::build_storyboard_prompt;
use log::{debug, info, warn};
use regex::Regex;
use std::sync::LazyLock;

/// Shorter responses cannot hold a usable story.
pub const MIN_RESPONSE_CHARS: usize = 50;
const EMERGENCY_CONTENT_CHARS: usize = 500;
const EMERGENCY_PLACEHOLDER: &str =
    "The story could not be generated in full. Please try again in a moment.";

static SCENE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)scene\s*\d+\s*:").expect("valid scene marker regex"));

static SCENE_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^scene\s*(\d+)\s*:?").expect("valid scene header regex"));

/// A scene as recovered from text, before numbering and storyboard prompts.
#[derive(Debug, Clone, PartialEq)]
pub struct RawScene {
    pub title: String,
    pub content: String,
}

impl RawScene {
    fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }
}

/// Which rung of the ladder produced the scenes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Markers,
    LineScan,
    SentenceChunks,
}

type Rung = (Strategy, fn(&str) -> Option<Vec<RawScene>>);

const LADDER: [Rung; 3] = [
    (Strategy::Markers, split_on_markers),
    (Strategy::LineScan, scan_lines),
    (Strategy::SentenceChunks, chunk_sentences),
];

fn clean_title(title: &str) -> String {
    title
        .trim_matches(|c: char| c.is_whitespace() || c == '*' || c == '#' || c == '-')
        .to_string()
}

fn non_empty(scenes: Vec<RawScene>) -> Option<Vec<RawScene>> {
    (!scenes.is_empty()).then_some(scenes)
}

/// Splits on `SCENE <n>:` markers; the first line of each segment is its title.
pub fn split_on_markers(text: &str) -> Option<Vec<RawScene>> {
    // Anything before the first marker is preamble.
    let scenes = SCENE_MARKER
        .split(text)
        .skip(1)
        .filter_map(|segment| {
            let segment = segment.trim();
            let (title, body) = segment.split_once('\n').unwrap_or((segment, ""));
            let title = clean_title(title);
            let content = body
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            (!title.is_empty() && !content.is_empty()).then(|| RawScene::new(title, content))
        })
        .collect();
    non_empty(scenes)
}

/// Line-by-line scan tolerating `Scene <n>` headers without a colon.
pub fn scan_lines(text: &str) -> Option<Vec<RawScene>> {
    fn flush(current: Option<(String, Vec<&str>)>, scenes: &mut Vec<RawScene>) {
        if let Some((title, lines)) = current {
            let content = lines.join(" ").trim().to_string();
            if !content.is_empty() {
                scenes.push(RawScene::new(title, content));
            }
        }
    }

    let mut scenes = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let unmarked = line.trim_start_matches(|c: char| c == '*' || c == '#' || c.is_whitespace());
        if let Some(header) = SCENE_HEADER.captures(unmarked) {
            flush(current.take(), &mut scenes);
            let marker = header.get(0).map_or(0, |m| m.end());
            let mut title = clean_title(&unmarked[marker..]);
            if title.is_empty() {
                title = format!("Scene {}", &header[1]);
            }
            current = Some((title, Vec::new()));
        } else if let Some((_, lines)) = current.as_mut() {
            lines.push(line);
        }
    }
    flush(current, &mut scenes);

    non_empty(scenes)
}

/// Last resort: distribute sentences evenly over four scenes.
pub fn chunk_sentences(text: &str) -> Option<Vec<RawScene>> {
    let sentences: Vec<&str> = text
        .split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if sentences.is_empty() {
        return None;
    }

    let per_chunk = sentences.len().div_ceil(SCENES_PER_STORY);
    let scenes = sentences
        .chunks(per_chunk)
        .take(SCENES_PER_STORY)
        .enumerate()
        .map(|(i, chunk)| RawScene::new(format!("Scene {}", i + 1), format!("{}.", chunk.join(". "))))
        .collect();
    non_empty(scenes)
}

/// Turns free-form model output into a story; never fails.
pub struct SceneParser<'a> {
    character: &'a CharacterProfile,
}

impl<'a> SceneParser<'a> {
    pub fn new(character: &'a CharacterProfile) -> Self {
        Self { character }
    }

    pub fn parse(&self, raw_text: &str) -> Story {
        if raw_text.trim().is_empty() || raw_text.chars().count() < MIN_RESPONSE_CHARS {
            warn!(
                "Model response too short ({} chars), using emergency fallback",
                raw_text.chars().count()
            );
            let content = if raw_text.trim().is_empty() {
                EMERGENCY_PLACEHOLDER
            } else {
                raw_text.trim()
            };
            return self.emergency_story(content);
        }

        for (strategy, rung) in LADDER {
            if let Some(raw_scenes) = rung(raw_text) {
                info!("Parsed {} scene(s) using {:?} strategy", raw_scenes.len(), strategy);
                return self.assemble(raw_scenes, strategy != Strategy::Markers);
            }
            debug!("{:?} strategy found no scenes", strategy);
        }

        warn!("No parsing strategy produced scenes, using emergency fallback");
        let excerpt: String = raw_text.trim().chars().take(EMERGENCY_CONTENT_CHARS).collect();
        self.emergency_story(&excerpt)
    }

    fn scene(&self, number: usize, title: String, content: String) -> Scene {
        Scene {
            id: format!("scene_{}", number),
            number,
            storyboard_prompt: build_storyboard_prompt(&title, &content, self.character),
            description: content.clone(),
            character_name: self.character.name.clone(),
            title,
            content,
        }
    }

    fn assemble(&self, mut raw_scenes: Vec<RawScene>, fallback_parsed: bool) -> Story {
        if raw_scenes.len() > SCENES_PER_STORY {
            info!("Truncating {} scenes to {}", raw_scenes.len(), SCENES_PER_STORY);
            raw_scenes.truncate(SCENES_PER_STORY);
        }
        while raw_scenes.len() < SCENES_PER_STORY {
            let number = raw_scenes.len() + 1;
            debug!("Padding with generic scene {}", number);
            raw_scenes.push(RawScene::new(
                format!("Scene {}", number),
                format!(
                    "{} continues their adventure with determination and courage.",
                    self.character.name
                ),
            ));
        }

        let scenes: Vec<Scene> = raw_scenes
            .into_iter()
            .enumerate()
            .map(|(i, raw)| self.scene(i + 1, raw.title, raw.content))
            .collect();

        Story {
            title: Story::title_for(self.character),
            total_scenes: scenes.len(),
            scenes,
            character: self.character.clone(),
            emergency_fallback: false,
            fallback_parsed,
        }
    }

    fn emergency_story(&self, content: &str) -> Story {
        let scene = self.scene(1, "The Adventure Begins".to_string(), content.to_string());
        Story {
            title: Story::title_for(self.character),
            scenes: vec![scene],
            total_scenes: 1,
            character: self.character.clone(),
            emergency_fallback: true,
            fallback_parsed: false,
        }
    }
}
