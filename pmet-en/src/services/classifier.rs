//! LLM topic classification
//!
//! Batch pass assigning one research category per paper title through an
//! OpenAI-compatible chat-completion endpoint. This is the simpler sibling
//! of the enrichment loop: one bounded retry loop covers transport failures
//! and unparseable responses alike, and the table is its own checkpoint.
//!
//! Response rows are matched back to the requested titles by exact title,
//! then by cleaned title, then by batch position as a last resort — the
//! endpoint's output ordering is not trusted.

use crate::store::RecordTable;
use pmet_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Category column owned by the classifier
pub const CATEGORY_COLUMN: &str = "ai_category";

/// Fixed category list offered to the model
pub const CATEGORIES: &[&str] = &[
    "Machine Learning (including Deep Learning)",
    "Representation Learning and Optimization",
    "Probability, Statistics, and Inference",
    "Natural Language Processing",
    "Computer Vision",
    "Multimodal Learning",
    "AI Foundations and Theory",
    "Reinforcement Learning and Decision Making",
    "Interpretability, Fairness, and Applied Systems",
];

const BATCH_SIZE: usize = 5;
const MAX_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_secs(2);
const BATCH_PAUSE: Duration = Duration::from_secs(1);
/// Batches between intermediate table saves
const CHECKPOINT_INTERVAL: usize = 10;

/// Endpoint settings for the classifier
#[derive(Debug, Clone)]
pub struct ClassifierOptions {
    /// OpenAI-compatible endpoint base URL
    pub base_url: String,
    /// Bearer API key
    pub api_key: String,
    /// Model name requested from the endpoint
    pub model: String,
    /// Pause between batches; zero disables pacing
    pub batch_pause: Duration,
}

impl ClassifierOptions {
    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        Self {
            base_url,
            api_key,
            model,
            batch_pause: BATCH_PAUSE,
        }
    }
}

/// Counters for one classification pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassifySummary {
    pub pending: usize,
    pub classified: usize,
    pub unmatched: usize,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

/// One title/category pair returned by the model
#[derive(Debug, Clone, Deserialize)]
struct Assignment {
    title: String,
    category: String,
}

#[derive(Deserialize)]
struct AssignmentList {
    #[serde(default)]
    results: Vec<Assignment>,
}

/// LLM topic classifier over a record table
pub struct TopicClassifier {
    http_client: reqwest::Client,
    options: ClassifierOptions,
}

impl TopicClassifier {
    pub fn new(options: ClassifierOptions) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| Error::Internal(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            options,
        })
    }

    /// Classify every row missing a category, checkpointing periodically
    pub async fn classify_table(&self, table: &mut RecordTable) -> Result<ClassifySummary> {
        table.ensure_column(CATEGORY_COLUMN);

        let pending: Vec<(usize, String)> = (0..table.len())
            .filter_map(|row| {
                let title = table.title(row);
                if title.is_empty() || !table.cell(row, CATEGORY_COLUMN).trim().is_empty() {
                    None
                } else {
                    Some((row, title.to_string()))
                }
            })
            .collect();

        let total_batches = pending.len().div_ceil(BATCH_SIZE);
        tracing::info!(
            table = %table.path().display(),
            pending = pending.len(),
            batches = total_batches,
            "Starting classification pass"
        );

        let mut summary = ClassifySummary {
            pending: pending.len(),
            ..ClassifySummary::default()
        };

        for (batch_index, batch) in pending.chunks(BATCH_SIZE).enumerate() {
            let titles: Vec<String> = batch.iter().map(|(_, title)| title.clone()).collect();

            let assignments = self.request_classifications(&titles).await;
            if assignments.is_empty() {
                tracing::warn!(
                    batch = batch_index + 1,
                    "No usable classifications for this batch"
                );
                summary.unmatched += batch.len();
            } else {
                let matched = match_categories(&titles, &assignments);
                for ((row, title), category) in batch.iter().zip(matched) {
                    match category {
                        Some(category) => {
                            table.set_cell(*row, CATEGORY_COLUMN, &category);
                            summary.classified += 1;
                        }
                        None => {
                            tracing::warn!(title = %title, "No category matched this title");
                            summary.unmatched += 1;
                        }
                    }
                }
            }

            if (batch_index + 1) % CHECKPOINT_INTERVAL == 0 {
                table.save()?;
                tracing::debug!(batch = batch_index + 1, "Intermediate checkpoint written");
            }

            if batch_index + 1 < total_batches && !self.options.batch_pause.is_zero() {
                tokio::time::sleep(self.options.batch_pause).await;
            }
        }

        table.save()?;

        tracing::info!(
            table = %table.path().display(),
            classified = summary.classified,
            unmatched = summary.unmatched,
            "Classification pass finished"
        );

        Ok(summary)
    }

    /// One batch through the bounded retry loop; empty on give-up
    async fn request_classifications(&self, titles: &[String]) -> Vec<Assignment> {
        let prompt = build_prompt(titles);

        for attempt in 1..=MAX_ATTEMPTS {
            match self.send_chat(&prompt).await {
                Ok(content) => match parse_assignments(&content) {
                    Some(assignments) => return assignments,
                    None => {
                        tracing::warn!(attempt, "Unparseable classification response");
                    }
                },
                Err(err) => {
                    tracing::warn!(attempt, error = %err, "Classification request failed");
                }
            }

            if attempt < MAX_ATTEMPTS {
                tokio::time::sleep(RETRY_BACKOFF * attempt).await;
            }
        }

        Vec::new()
    }

    async fn send_chat(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/chat/completions",
            self.options.base_url.trim_end_matches('/')
        );

        let request = ChatRequest {
            model: &self.options.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.1,
            response_format: ResponseFormat {
                format: "json_object",
            },
        };

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.options.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Internal(format!("chat request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Internal(format!("chat status {}: {}", status, body)));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Internal(format!("chat body: {}", e)))?;

        chat.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| Error::Internal("chat response had no choices".to_string()))
    }
}

/// Normalize a title for prompt embedding and fallback matching
fn clean_title(title: &str) -> String {
    title
        .replace('\\', " ")
        .replace('"', "'")
        .replace('\n', " ")
        .trim()
        .to_string()
}

fn build_prompt(titles: &[String]) -> String {
    let mut prompt = format!(
        "As an AI expert, please classify the following papers into one of the \
         categories below.\nSelect strictly from the provided list:\n{}\n\n\
         Return the result in JSON format as follows:\n\
         {{\n    \"results\": [\n        {{\"title\": \"Paper Title 1\", \
         \"category\": \"Category Name\"}},\n        ...\n    ]\n}}\n\n\
         Note:\n\
         1. The \"title\" field in the JSON must match the provided title exactly \
         (including symbols).\n\
         2. If the title contains LaTeX formulas or special characters, keep them \
         as is. Do not escape or modify them to ensure valid JSON.\n\n\
         Papers to classify:\n",
        CATEGORIES.join(", ")
    );

    for (index, title) in titles.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", index + 1, clean_title(title)));
    }

    prompt
}

/// Strip a Markdown code fence, if the model wrapped its JSON in one
fn extract_json(content: &str) -> &str {
    let trimmed = content.trim();

    for fence in ["```json", "```"] {
        if let Some(start) = trimmed.find(fence) {
            let rest = &trimmed[start + fence.len()..];
            if let Some(end) = rest.find("```") {
                return rest[..end].trim();
            }
            return rest.trim();
        }
    }

    trimmed
}

fn parse_assignments(content: &str) -> Option<Vec<Assignment>> {
    let json = extract_json(content);
    let list: AssignmentList = serde_json::from_str(json).ok()?;
    if list.results.is_empty() {
        None
    } else {
        Some(list.results)
    }
}

/// Match returned assignments back to the requested titles
///
/// Exact title first, cleaned title second, batch position last. The
/// positional fallback only applies when the model returned as many rows as
/// were requested.
fn match_categories(titles: &[String], assignments: &[Assignment]) -> Vec<Option<String>> {
    titles
        .iter()
        .enumerate()
        .map(|(index, title)| {
            if let Some(assignment) = assignments.iter().find(|a| &a.title == title) {
                return Some(assignment.category.clone());
            }

            let cleaned = clean_title(title);
            if let Some(assignment) = assignments.iter().find(|a| a.title == cleaned) {
                return Some(assignment.category.clone());
            }

            if assignments.len() == titles.len() {
                return assignments.get(index).map(|a| a.category.clone());
            }

            None
        })
        .collect()
}
