use crate::core::config::Config;
use crate::core::story::{
    estimated_read_time, CharacterProfile, GenerationMetadata, GenerationOptions,
    GenerationResult, Scene, Story, StoryboardRequest,
};
use crate::services::llm::LlmClient;
use crate::services::parser::SceneParser;
use crate::services::prompt::{build_story_prompt, SYSTEM_PROMPT};
use crate::services::storyboard::storyboard_request;
use anyhow::{anyhow, Result};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Substrings (lower case) marking a model failure as transient.
const RETRYABLE_MARKERS: &[&str] = &[
    "overloaded",
    "service unavailable",
    "503",
    "temporarily unavailable",
    "rate limit",
    "quota exceeded",
    "timed out",
    "timeout",
];

const PROBE_PROMPT: &str = "Reply with the single word: ready";

pub fn is_retryable(message: &str) -> bool {
    let message = message.to_lowercase();
    RETRYABLE_MARKERS.iter().any(|m| message.contains(m))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub retry_delay: Duration,
    pub request_timeout: Duration,
    pub probe_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(2),
            request_timeout: Duration::from_secs(45),
            probe_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.llm.max_attempts.max(1),
            retry_delay: Duration::from_secs(config.llm.retry_delay_seconds),
            request_timeout: Duration::from_secs(config.llm.timeout_seconds),
            probe_timeout: Duration::from_secs(config.llm.probe_timeout_seconds),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityReport {
    pub available: bool,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

pub struct StoryGenerator {
    llm: Box<dyn LlmClient>,
    policy: RetryPolicy,
}

impl StoryGenerator {
    pub fn new(llm: Box<dyn LlmClient>, policy: RetryPolicy) -> Self {
        Self { llm, policy }
    }

    pub fn from_config(config: &Config, llm: Box<dyn LlmClient>) -> Self {
        Self::new(llm, RetryPolicy::from_config(config))
    }

    pub fn model(&self) -> &str {
        self.llm.model()
    }

    /// Runs one model call, treating the deadline as an ordinary failure.
    async fn call_with_deadline(&self, deadline: Duration, prompt: &str) -> Result<String> {
        // Dropping the losing future cancels the in-flight request.
        match tokio::time::timeout(deadline, self.llm.chat(SYSTEM_PROMPT, prompt)).await {
            Ok(result) => result,
            Err(_) => Err(anyhow!(
                "request timed out after {} seconds",
                deadline.as_secs()
            )),
        }
    }

    pub async fn generate_story(
        &self,
        prompt: &str,
        genre: &str,
        character: &CharacterProfile,
        options: &GenerationOptions,
    ) -> Result<GenerationResult> {
        let max_attempts = self.policy.max_attempts.max(1);
        let instruction = build_story_prompt(prompt, genre, character, options);
        let mut attempts_made = 0;
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            attempts_made = attempt;
            info!(
                "Generating story with {} (attempt {}/{})",
                self.model(),
                attempt,
                max_attempts
            );

            match self
                .call_with_deadline(self.policy.request_timeout, &instruction)
                .await
            {
                Ok(raw_text) => {
                    let story = SceneParser::new(character).parse(&raw_text);
                    if story.is_degraded() {
                        warn!(
                            "Story for {} parsed in degraded mode ({} scene(s))",
                            character.name, story.total_scenes
                        );
                    }
                    return Ok(self.result(genre, character, story, raw_text, attempt));
                }
                Err(e) => {
                    last_error = e.to_string();
                    if !is_retryable(&last_error) {
                        error!("Non-retryable model error: {}", last_error);
                        break;
                    }
                    if attempt < max_attempts {
                        warn!(
                            "Attempt {} failed ({}), retrying in {:?}",
                            attempt, last_error, self.policy.retry_delay
                        );
                        tokio::time::sleep(self.policy.retry_delay).await;
                    }
                }
            }
        }

        Err(anyhow!(
            "Story generation failed after {} attempt(s): {}",
            attempts_made,
            last_error
        ))
    }

    /// Issues a minimal model call; never returns an error.
    pub async fn check_availability(&self) -> AvailabilityReport {
        let model = self.model().to_string();
        match self
            .call_with_deadline(self.policy.probe_timeout, PROBE_PROMPT)
            .await
        {
            Ok(_) => AvailabilityReport {
                available: true,
                model,
                message: Some("Model is available".to_string()),
                error: None,
                retryable: None,
            },
            Err(e) => {
                let error = e.to_string();
                warn!("Model {} unavailable: {}", model, error);
                AvailabilityReport {
                    available: false,
                    model,
                    message: None,
                    retryable: Some(is_retryable(&error)),
                    error: Some(error),
                }
            }
        }
    }

    pub fn storyboard_request(&self, scene: &Scene, style: &str) -> StoryboardRequest {
        storyboard_request(scene, style)
    }

    pub fn storyboard_requests(&self, story: &Story, style: &str) -> Vec<StoryboardRequest> {
        story
            .scenes
            .iter()
            .map(|scene| storyboard_request(scene, style))
            .collect()
    }

    fn result(
        &self,
        genre: &str,
        character: &CharacterProfile,
        story: Story,
        raw_text: String,
        attempt: usize,
    ) -> GenerationResult {
        let metadata = GenerationMetadata {
            genre: genre.to_string(),
            character_name: character.name.clone(),
            estimated_read_time: estimated_read_time(&raw_text),
            scene_count: story.total_scenes,
            generated_by: self.model().to_string(),
            attempt,
        };
        GenerationResult {
            success: true,
            story,
            raw_text,
            metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    const FOUR_SCENES: &str = "SCENE 1: The Map\nMia found a map in the library.\n\n\
        SCENE 2: The Forest\nShe was running through the forest.\n\n\
        SCENE 3: The Cave\nInside the cave, Mia was amazed.\n\n\
        SCENE 4: Home\nMia came home happy and excited.";

    // Mock LLM Client replaying scripted responses
    #[derive(Debug)]
    struct MockLlmClient {
        responses: Mutex<VecDeque<std::result::Result<String, String>>>,
        call_count: Arc<Mutex<usize>>,
    }

    impl MockLlmClient {
        fn new(responses: Vec<std::result::Result<&str, &str>>) -> Self {
            Self {
                responses: Mutex::new(
                    responses
                        .into_iter()
                        .map(|r| r.map(str::to_string).map_err(str::to_string))
                        .collect(),
                ),
                call_count: Arc::new(Mutex::new(0)),
            }
        }
    }

    #[async_trait]
    impl LlmClient for MockLlmClient {
        async fn chat(&self, system: &str, _user: &str) -> Result<String> {
            assert_eq!(system, SYSTEM_PROMPT);
            *self.call_count.lock().unwrap() += 1;
            match self.responses.lock().unwrap().pop_front() {
                Some(Ok(text)) => Ok(text),
                Some(Err(msg)) => Err(anyhow!(msg)),
                None => Err(anyhow!("mock exhausted")),
            }
        }

        fn model(&self) -> &str {
            "mock-model"
        }
    }

    #[derive(Debug)]
    struct SlowLlmClient;

    #[async_trait]
    impl LlmClient for SlowLlmClient {
        async fn chat(&self, _system: &str, _user: &str) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(FOUR_SCENES.to_string())
        }

        fn model(&self) -> &str {
            "slow-model"
        }
    }

    #[derive(Debug)]
    struct HangingLlmClient;

    #[async_trait]
    impl LlmClient for HangingLlmClient {
        async fn chat(&self, _system: &str, _user: &str) -> Result<String> {
            std::future::pending::<Result<String>>().await
        }

        fn model(&self) -> &str {
            "hanging-model"
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            retry_delay: Duration::from_millis(1),
            request_timeout: Duration::from_millis(200),
            probe_timeout: Duration::from_millis(200),
        }
    }

    fn with_mock(mock: MockLlmClient) -> (StoryGenerator, Arc<Mutex<usize>>) {
        let calls = mock.call_count.clone();
        (StoryGenerator::new(Box::new(mock), fast_policy()), calls)
    }

    fn mia() -> CharacterProfile {
        CharacterProfile::new("Mia").with_traits(&["brave"])
    }

    #[test]
    fn test_retryable_classification() {
        for msg in [
            "The model is OVERLOADED",
            "Service Unavailable",
            "Gemini API error (HTTP 503): busy",
            "temporarily unavailable",
            "Rate limit reached",
            "quota exceeded for project",
            "request timed out after 45 seconds",
            "connect Timeout",
        ] {
            assert!(is_retryable(msg), "{}", msg);
        }
        assert!(!is_retryable("invalid api key"));
        assert!(!is_retryable("HTTP 400: bad request"));
    }

    #[tokio::test]
    async fn test_first_attempt_success() -> Result<()> {
        let (generator, calls) = with_mock(MockLlmClient::new(vec![Ok(FOUR_SCENES)]));
        let result = generator
            .generate_story("a map", "adventure", &mia(), &GenerationOptions::default())
            .await?;

        assert!(result.success);
        assert_eq!(*calls.lock().unwrap(), 1);
        assert_eq!(result.raw_text, FOUR_SCENES);
        assert_eq!(result.story.scenes.len(), 4);
        assert_eq!(result.metadata.attempt, 1);
        assert_eq!(result.metadata.scene_count, 4);
        assert_eq!(result.metadata.genre, "adventure");
        assert_eq!(result.metadata.character_name, "Mia");
        assert_eq!(result.metadata.generated_by, "mock-model");
        assert_eq!(result.metadata.estimated_read_time, 1);
        assert!(result.story.scenes[1].storyboard_prompt.contains("mystical forest"));
        Ok(())
    }

    #[tokio::test]
    async fn test_retries_rate_limit_then_succeeds() -> Result<()> {
        let (generator, calls) = with_mock(MockLlmClient::new(vec![
            Err("rate limit exceeded"),
            Err("Rate Limit exceeded again"),
            Ok(FOUR_SCENES),
        ]));
        let result = generator
            .generate_story("a map", "adventure", &mia(), &GenerationOptions::default())
            .await?;

        assert!(result.success);
        assert_eq!(result.metadata.attempt, 3);
        assert_eq!(*calls.lock().unwrap(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_non_retryable_fails_immediately() {
        let (generator, calls) = with_mock(MockLlmClient::new(vec![
            Err("invalid api key"),
            Ok(FOUR_SCENES),
        ]));
        let err = generator
            .generate_story("a map", "adventure", &mia(), &GenerationOptions::default())
            .await
            .unwrap_err();

        assert_eq!(*calls.lock().unwrap(), 1);
        let msg = err.to_string();
        assert!(msg.contains("after 1 attempt"));
        assert!(msg.contains("invalid api key"));
    }

    #[tokio::test]
    async fn test_exhausted_attempts_report_last_error() {
        let (generator, calls) = with_mock(MockLlmClient::new(vec![
            Err("model overloaded"),
            Err("service unavailable"),
            Err("quota exceeded"),
        ]));
        let err = generator
            .generate_story("a map", "adventure", &mia(), &GenerationOptions::default())
            .await
            .unwrap_err();

        assert_eq!(*calls.lock().unwrap(), 3);
        let msg = err.to_string();
        assert!(msg.contains("after 3 attempt"));
        assert!(msg.contains("quota exceeded"));
    }

    #[tokio::test]
    async fn test_timeout_counts_as_retryable_failure() {
        let generator = StoryGenerator::new(Box::new(SlowLlmClient), fast_policy());
        let err = generator
            .generate_story("a map", "adventure", &mia(), &GenerationOptions::default())
            .await
            .unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("after 3 attempt"));
        assert!(msg.contains("request timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_fixed_delay_between_attempts() -> Result<()> {
        let mock = MockLlmClient::new(vec![Err("model overloaded"), Ok(FOUR_SCENES)]);
        let generator = StoryGenerator::new(Box::new(mock), RetryPolicy::default());

        let start = tokio::time::Instant::now();
        let result = generator
            .generate_story("a map", "adventure", &mia(), &GenerationOptions::default())
            .await?;
        let elapsed = start.elapsed();

        assert_eq!(result.metadata.attempt, 2);
        assert!(elapsed >= Duration::from_secs(2), "{:?}", elapsed);
        assert!(elapsed < Duration::from_secs(3), "{:?}", elapsed);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_delay_after_non_retryable_error() {
        let mock = MockLlmClient::new(vec![Err("invalid api key"), Ok(FOUR_SCENES)]);
        let generator = StoryGenerator::new(Box::new(mock), RetryPolicy::default());

        let start = tokio::time::Instant::now();
        let result = generator
            .generate_story("a map", "adventure", &mia(), &GenerationOptions::default())
            .await;

        assert!(result.is_err());
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_policy_timeout_message() {
        let generator = StoryGenerator::new(Box::new(HangingLlmClient), RetryPolicy::default());

        let start = tokio::time::Instant::now();
        let err = generator
            .generate_story("a map", "adventure", &mia(), &GenerationOptions::default())
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Story generation failed after 3 attempt(s): request timed out after 45 seconds"
        );
        // three 45s deadlines plus two 2s pauses
        assert!(start.elapsed() >= Duration::from_secs(139));
    }

    #[tokio::test]
    async fn test_degraded_parse_is_still_success() -> Result<()> {
        let (generator, _) = with_mock(MockLlmClient::new(vec![Ok("Too short.")]));
        let result = generator
            .generate_story("a map", "adventure", &mia(), &GenerationOptions::default())
            .await?;

        assert!(result.success);
        assert!(result.story.emergency_fallback);
        assert_eq!(result.story.total_scenes, 1);
        assert_eq!(result.metadata.scene_count, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_availability_probe() {
        let (generator, _) = with_mock(MockLlmClient::new(vec![Ok("ready")]));
        let report = generator.check_availability().await;
        assert!(report.available);
        assert_eq!(report.model, "mock-model");
        assert!(report.message.is_some());
        assert!(report.retryable.is_none());

        let (generator, _) = with_mock(MockLlmClient::new(vec![Err("HTTP 503: overloaded")]));
        let report = generator.check_availability().await;
        assert!(!report.available);
        assert_eq!(report.retryable, Some(true));
        assert!(report.error.unwrap().contains("overloaded"));

        let generator = StoryGenerator::new(Box::new(SlowLlmClient), fast_policy());
        let report = generator.check_availability().await;
        assert!(!report.available);
        assert_eq!(report.model, "slow-model");
        assert_eq!(report.retryable, Some(true));
    }

    #[tokio::test]
    async fn test_storyboard_requests_cover_every_scene() -> Result<()> {
        let (generator, _) = with_mock(MockLlmClient::new(vec![Ok(FOUR_SCENES)]));
        let result = generator
            .generate_story("a map", "adventure", &mia(), &GenerationOptions::default())
            .await?;

        let requests = generator.storyboard_requests(&result.story, "watercolor");
        assert_eq!(requests.len(), 4);
        for (request, scene) in requests.iter().zip(&result.story.scenes) {
            assert_eq!(request.scene_id, scene.id);
            assert!(request.prompt.contains(&scene.title));
            assert!(request.prompt.contains("Mia"));
            assert!(request.image_url.is_none());
        }
        let single = generator.storyboard_request(&result.story.scenes[0], "comic");
        assert!(single.prompt.starts_with("Art style: comic"));
        Ok(())
    }

    #[test]
    fn test_policy_from_config() -> Result<()> {
        let config = Config::from_yaml(
            "llm:\n  provider: gemini\n  retry_delay_seconds: 0\n  gemini:\n    api_key: k\n    model: m\n",
        )?;
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.retry_delay, Duration::ZERO);
        assert_eq!(policy.request_timeout, Duration::from_secs(45));
        assert_eq!(policy.probe_timeout, RetryPolicy::default().probe_timeout);
        Ok(())
    }
}
