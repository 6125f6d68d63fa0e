use crate::core::story::{CharacterProfile, Scene, StoryboardRequest};

/// A keyword rule: if any keyword occurs in the text, the label applies.
pub type Rule = (&'static [&'static str], &'static str);

pub const SETTING_RULES: &[Rule] = &[
    (&["library", "book"], "ancient library with towering bookshelves"),
    (&["forest", "tree"], "mystical forest"),
    (&["cave", "underground"], "mysterious cave"),
    (&["castle", "tower"], "medieval castle"),
    (&["city", "street"], "bustling city street"),
    (&["mountain", "peak"], "mountain landscape"),
    (&["ocean", "sea"], "coastal scene with ocean"),
];
pub const DEFAULT_SETTING: &str = "indoor scene";

pub const ACTION_RULES: &[Rule] = &[
    (&["running", "chase"], "running or chasing"),
    (&["fighting", "battle"], "in combat stance"),
    (&["searching", "looking"], "searching and investigating"),
    (&["climbing", "ascending"], "climbing"),
    (&["flying", "soaring"], "flying through the air"),
    (&["discovering", "found"], "making a discovery"),
    (&["hiding", "sneaking"], "hiding or sneaking"),
];
pub const DEFAULT_ACTION: &str = "standing";

pub const MOOD_RULES: &[Rule] = &[
    (&["scared", "afraid", "terrified"], "scared or worried"),
    (&["happy", "excited", "joy"], "happy and excited"),
    (&["angry", "furious", "mad"], "angry or determined"),
    (&["surprised", "shocked", "amazed"], "surprised and amazed"),
    (&["sad", "crying", "upset"], "sad or emotional"),
    (&["curious", "wonder", "investigate"], "curious and focused"),
];
pub const DEFAULT_MOOD: &str = "neutral";

const SNIPPET_CHARS: usize = 150;

/// First rule with a matching keyword wins.
pub fn classify(text: &str, rules: &[Rule], default: &'static str) -> &'static str {
    let text = text.to_lowercase();
    rules
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| text.contains(k)))
        .map(|(_, label)| *label)
        .unwrap_or(default)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneTags {
    pub setting: &'static str,
    pub action: &'static str,
    pub mood: &'static str,
}

impl SceneTags {
    pub fn from_content(content: &str) -> Self {
        Self {
            setting: classify(content, SETTING_RULES, DEFAULT_SETTING),
            action: classify(content, ACTION_RULES, DEFAULT_ACTION),
            mood: classify(content, MOOD_RULES, DEFAULT_MOOD),
        }
    }
}

fn snippet(content: &str) -> String {
    let content = content.trim();
    if content.chars().count() <= SNIPPET_CHARS {
        content.to_string()
    } else {
        let cut: String = content.chars().take(SNIPPET_CHARS).collect();
        format!("{}...", cut.trim_end())
    }
}

/// Image-generation prompt describing one scene.
pub fn build_storyboard_prompt(title: &str, content: &str, character: &CharacterProfile) -> String {
    let tags = SceneTags::from_content(content);
    let traits: Vec<&str> = character.traits.iter().take(2).map(String::as_str).collect();
    let character_line = if traits.is_empty() {
        character.name.clone()
    } else {
        format!("{} ({})", character.name, traits.join(", "))
    };

    format!(
        "Storyboard frame: \"{title}\"\n\
        Character: {character_line}\n\
        Setting: {setting}\n\
        Action: {name} is {action}\n\
        Mood: {mood}\n\
        Visual style: colorful children's book illustration, clean line art, soft shading\n\
        Camera: medium wide shot, eye level, character clearly visible in the frame\n\
        Lighting: warm cinematic lighting with gentle depth of field\n\
        Scene details: {details}",
        setting = tags.setting,
        name = character.name,
        action = tags.action,
        mood = tags.mood,
        details = snippet(content),
    )
}

/// Stored prompt, or a fresh one when it no longer names the scene and its character.
fn scene_prompt(scene: &Scene) -> String {
    let stored = scene.storyboard_prompt.trim();
    if !stored.is_empty()
        && stored.contains(scene.title.as_str())
        && stored.contains(scene.character_name.as_str())
    {
        return stored.to_string();
    }
    build_storyboard_prompt(
        &scene.title,
        &scene.content,
        &CharacterProfile::new(&scene.character_name),
    )
}

/// Request payload for the external image service, which fills in `image_url`.
pub fn storyboard_request(scene: &Scene, style: &str) -> StoryboardRequest {
    let style = style.trim();
    let body = scene_prompt(scene);
    let prompt = if style.is_empty() {
        body
    } else {
        format!("Art style: {}\n{}", style, body)
    };
    StoryboardRequest {
        prompt,
        scene_id: scene.id.clone(),
        image_url: None,
    }
}
