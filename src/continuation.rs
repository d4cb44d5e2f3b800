// Story continuation: prompt construction, generation, and segment splitting.

use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::error::AppError;
use crate::generation::TextGenerator;
use crate::metrics;

pub const MISSING_FIELDS: &str = "Missing required fields.";

/// Body of `POST /api/generateStory`. Every field is optional at the wire
/// level so that a missing field surfaces as a validation error, not a
/// deserialization rejection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinuationRequest {
    pub genre: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub duration: Option<String>,
    pub description: Option<String>,
    pub current_story: Option<String>,
    pub choice: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinuationResponse {
    pub story: String,
    pub choices: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_segment_prompt: Option<String>,
}

/// A request whose required fields are all present and non-empty.
#[derive(Debug, Clone)]
pub struct StoryTurn {
    pub genre: String,
    pub duration: String,
    pub description: String,
    pub current_story: String,
    pub choice: String,
}

// The frontend binds duration to a number input, so accept `5` as well as `"5"`.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn required(field: Option<String>) -> Result<String, AppError> {
    match field {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AppError::Validation(MISSING_FIELDS.to_string())),
    }
}

impl TryFrom<ContinuationRequest> for StoryTurn {
    type Error = AppError;

    fn try_from(req: ContinuationRequest) -> Result<Self, Self::Error> {
        Ok(StoryTurn {
            genre: required(req.genre)?,
            duration: required(req.duration)?,
            description: required(req.description)?,
            current_story: required(req.current_story)?,
            choice: required(req.choice)?,
        })
    }
}

pub fn build_prompt(turn: &StoryTurn) -> String {
    format!(
        "{}\n\nUser choice: {}\n\nGenre: {}. Target reading time: {} minutes.\n\n\
         Continue the story with the following themes: {}\n\nContinue the story from here.",
        turn.current_story, turn.choice, turn.genre, turn.duration, turn.description
    )
}

/// Split on `.`, trimming each fragment and dropping empty ones.
pub fn split_sentences(text: &str) -> Vec<String> {
    text.split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn join_sentences(sentences: &[String]) -> String {
    sentences
        .iter()
        .map(|s| format!("{s}."))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Partition sentences at `floor(n / 2)`. A single sentence stays in the
/// first half so the displayed segment is never empty.
pub fn split_halves(text: &str) -> Result<(Vec<String>, Vec<String>), AppError> {
    let mut first = split_sentences(text);
    if first.is_empty() {
        return Err(AppError::EmptyContent);
    }
    let mid = (first.len() / 2).max(1);
    let second = first.split_off(mid);
    Ok((first, second))
}

pub fn choices_for(description: &str) -> Vec<String> {
    vec![
        format!("Continue the story of {description}"),
        format!("Add a plot twist involving {description}"),
        format!("Change the setting around {description}"),
    ]
}

/// How the caller grows its accumulated story with a returned segment.
pub fn append_segment(current: &str, segment: &str) -> String {
    format!("{current} {segment}")
}

#[derive(Clone)]
pub struct ContinuationService {
    generator: Arc<dyn TextGenerator>,
}

impl ContinuationService {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    pub async fn continue_story(
        &self,
        req: ContinuationRequest,
    ) -> Result<ContinuationResponse, AppError> {
        let turn = StoryTurn::try_from(req)?;
        let prompt = build_prompt(&turn);

        metrics::GENERATION_REQUESTS_TOTAL.inc();
        let started = Instant::now();
        let generated = self.generator.generate(&prompt).await;
        metrics::GENERATION_DURATION_SECONDS.observe(started.elapsed().as_secs_f64());

        let text = generated.map_err(|e| {
            metrics::GENERATION_FAILURES_TOTAL.inc();
            AppError::from(e)
        })?;

        let (first, second) = split_halves(&text)?;
        let next_segment_prompt = if second.is_empty() {
            None
        } else {
            Some(join_sentences(&second))
        };

        Ok(ContinuationResponse {
            story: join_sentences(&first),
            choices: choices_for(&turn.description),
            next_segment_prompt,
        })
    }
}
