use anyhow::{Context, Result};
use log::warn;
use std::fs;
use std::path::Path;
use story2board::core::config::Config;
use story2board::services::generator::StoryGenerator;
use story2board::services::llm::create_llm;
use story2board::services::setup;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let mut config = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            eprintln!("Please ensure 'config.yml' exists with valid LLM settings.");
            return Err(e);
        }
    };
    config.ensure_directories()?;

    let llm = create_llm(&config)?;
    let generator = StoryGenerator::from_config(&config, llm);

    let report = generator.check_availability().await;
    if !report.available {
        warn!(
            "Model {} looks unavailable: {}",
            report.model,
            report.error.as_deref().unwrap_or("unknown error")
        );
    }

    let request = if config.unattended {
        let args: Vec<String> = std::env::args().skip(1).collect();
        setup::request_from_args(&config, &args)?
    } else {
        let request = setup::run_setup(&config)?;
        setup::offer_to_remember(&mut config, &request)?;
        request
    };

    println!("Writing a story about {}...", request.character.name);
    let result = generator
        .generate_story(&request.prompt, &request.genre, &request.character, &request.options)
        .await?;

    let storyboards =
        generator.storyboard_requests(&result.story, &config.defaults.storyboard_style);
    let output = serde_json::json!({
        "result": result,
        "storyboards": storyboards,
    });
    let content = serde_json::to_string_pretty(&output)?;
    println!("{}", content);

    let file_name = format!(
        "{}.json",
        result
            .story
            .title
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .collect::<String>()
    );
    let path = Path::new(&config.output_folder).join(file_name);
    fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Story saved to {:?}", path);

    Ok(())
}
