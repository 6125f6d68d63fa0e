use crate::core::story::{CharacterProfile, GenerationOptions, SCENES_PER_STORY};

pub const SYSTEM_PROMPT: &str =
    "You are a creative children's story writer. Follow the requested output format exactly.";

const DEFAULT_NAME: &str = "the protagonist";
const DEFAULT_TRAITS: &str = "adventurous";
const DEFAULT_DESCRIPTION: &str = "a curious character ready for adventure";

fn tone_guidance(tone: &str) -> &'static str {
    match tone {
        "lighthearted" => "Keep the story fun, warm and uplifting, with playful moments and a happy ending.",
        "serious" => "Give the story weight: real stakes, thoughtful choices and a meaningful resolution.",
        "humorous" => "Make the story funny: silly situations, comic timing and a laugh-out-loud ending.",
        "dramatic" => "Build tension scene by scene with high stakes, emotional beats and a powerful climax.",
        "mysterious" => "Wrap the story in intrigue: clues, secrets and a satisfying reveal at the end.",
        "romantic" => "Focus on connection and feelings, with tender moments and a heartfelt ending.",
        _ => "Write an engaging story with a clear beginning, middle and end.",
    }
}

fn length_guidance(length: &str) -> &'static str {
    match length {
        "short" => "Keep each scene brief: 2 short sentences.",
        "medium" => "Each scene should be 2-3 sentences long.",
        "long" => "Each scene should be 3 rich, descriptive sentences.",
        _ => "Each scene should be a few sentences long.",
    }
}

/// One beat of the worked example: (title, humorous, dramatic, mysterious, default).
type ExampleBeat = (&'static str, &'static str, &'static str, &'static str, &'static str);

const EXAMPLE_BEATS: [ExampleBeat; SCENES_PER_STORY] = [
    (
        "The Strange Map",
        "{name} found a map in the attic, but it was upside down and covered in cookie crumbs. After turning it the right way, {name} laughed and decided to follow it anyway.",
        "{name} discovered an ancient map hidden beneath the attic floorboards. Its edges were scorched, and a warning was scrawled across the top in faded red ink.",
        "{name} found a map in the attic that had not been there yesterday. Its ink shimmered faintly, and one path glowed only when the lights went out.",
        "{name} found an old map in the attic, marked with a bright red X. Excited, {name} packed a bag and set off to see where it would lead.",
    ),
    (
        "Into the Forest",
        "The trail led into a forest where a squirrel demanded a toll of three jokes. {name} told the worst jokes ever, and the squirrel fell off its branch laughing.",
        "The path plunged into a dark forest where the trees groaned in the wind. {name} pressed on, heart pounding, as the trail behind vanished into shadow.",
        "The path wound into a silent forest where every tree bore the same strange symbol. {name} noticed footprints that matched their own, already walking ahead.",
        "The map led {name} into a sunny forest full of singing birds. A friendly fox showed {name} a shortcut across a sparkling stream.",
    ),
    (
        "The Hidden Cave",
        "At the cave, {name} tripped over a sleeping dragon who only wanted a blanket. {name} lent their jacket, and the grateful dragon pointed the way with a sneeze.",
        "Inside the cave, the ground shook as a great stone door began to close. {name} leapt through the gap at the last second, alone with the echoing dark.",
        "Inside the cave, whispers echoed from walls covered in the same glowing ink as the map. {name} followed the whispers deeper, lantern trembling.",
        "At the end of the stream was a hidden cave glowing with soft light. {name} stepped inside, amazed by crystals that sparkled like stars.",
    ),
    (
        "The Treasure",
        "The treasure chest was full of rubber ducks and a note saying 'Gotcha!'. {name} laughed so hard that the whole cave joined in with echoes.",
        "At the heart of the cave, {name} found the treasure and the truth it guarded. With courage and a steady hand, {name} made the choice that saved the village.",
        "The treasure was a mirror that showed the attic where it all began. {name} smiled, finally understanding who had drawn the map all along.",
        "Deep inside, {name} found a chest filled with golden coins and old letters. {name} realized the real treasure was the adventure itself and headed home proudly.",
    ),
];

fn example_story(tone: &str, name: &str) -> String {
    EXAMPLE_BEATS
        .iter()
        .enumerate()
        .map(|(i, (title, humorous, dramatic, mysterious, default))| {
            let body = match tone {
                "humorous" => humorous,
                "dramatic" => dramatic,
                "mysterious" => mysterious,
                _ => default,
            };
            format!("SCENE {}: {}\n{}", i + 1, title, body.replace("{name}", name))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Builds the full instruction text sent to the language model.
pub fn build_story_prompt(
    prompt: &str,
    genre: &str,
    character: &CharacterProfile,
    options: &GenerationOptions,
) -> String {
    let name = if character.name.trim().is_empty() {
        DEFAULT_NAME
    } else {
        character.name.as_str()
    };
    let traits = if character.traits.is_empty() {
        DEFAULT_TRAITS.to_string()
    } else {
        character.traits.join(", ")
    };
    let description = character
        .description
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .unwrap_or(DEFAULT_DESCRIPTION);

    let mut text = format!(
        "Write a {genre} short story based on this idea: \"{prompt}\"\n\
        \n\
        Main character:\n\
        - Name: {name}\n\
        - Traits: {traits}\n\
        - Description: {description}\n\
        \n\
        Tone: {tone}\n\
        Length: {length}\n\
        \n\
        OUTPUT FORMAT (follow exactly):\n\
        - Write exactly {count} scenes.\n\
        - Start each scene with the marker \"SCENE <number>:\" followed by a short scene title on the same line.\n\
        - On the next lines write the scene narrative, 2-3 sentences in plain prose.\n\
        - Do not add any introduction, conclusion, headings or notes outside the {count} scenes.\n\
        - Keep {name} at the center of every scene.\n\
        \n\
        EXAMPLE:\n\
        {example}\n",
        tone = tone_guidance(&options.tone),
        length = length_guidance(&options.length),
        count = SCENES_PER_STORY,
        example = example_story(&options.tone, name),
    );

    if options.include_voice {
        text.push_str(
            "\nThe story will be narrated aloud: use clear, simple sentences that read naturally, and avoid symbols or text that cannot be spoken.\n",
        );
    }
    if options.include_video {
        text.push_str(
            "\nEach scene will be illustrated as a storyboard frame: describe the setting, what the character is doing and how they feel in vivid visual detail.\n",
        );
    }

    text.push_str("\nNow write the story.");
    text
}
