//! OpenAI chat-completions client for the answer reformatting pass.
//!
//! Turns raw answer text into a constrained HTML fragment (allowed tags
//! only, verbatim text) ahead of page generation, tracking token usage so
//! a cost estimate can be reported at the end of a run.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

const API_URL: &str = "https://api.openai.com/v1/chat/completions";
const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 2000;
const TEMPERATURE: f32 = 0.2;

const IN_COST_PER_1M: f64 = 0.40;
const OUT_COST_PER_1M: f64 = 1.60;

const DEV_PROMPT: &str = r#"
You format text into an HTML fragment to be inserted inside:
<p class="T286Pc">{HERE}</p>

Output ONLY the HTML fragment for {HERE}. Do NOT include <p>, <html>, <body>, <div>, or any commentary.

Allowed tags only: <br>, <b>, <ul>, <ol>, <li>, <h3>, <h4>.
No attributes. No markdown.
"#;

const TASK_PROMPT: &str = r#"
Format the INPUT TEXT to resemble a Google AI Overview layout using headings, bullets, bold, and line breaks.

CRITICAL CONSTRAINT:
- Preserve the input text verbatim.
- Do not add, remove, reorder, or modify any words, characters, or punctuation.
- The output must contain all original characters in the same order.
- Only insert HTML tags (from the allowed list) and whitespace/line breaks to structure the text.
- Headings may only wrap existing text; do not invent new titles.
- Bullet points should be added only when there is a list of sentences that follow the structure "lorem ipsum: sentence follows."
- Bold the clause before the colon in bullet points.
- Do not add line breaks between bullet points.
- Only assign headings to standalone phrases followed by lists (e.g. "Who is eligible for a free card?",
"Key Information and Statistics", "Key Takeaways").

INPUT TEXT:
"#;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error (status {status}): {message}")]
    Api {
        status: u16,
        message: String,
        retryable: bool,
    },
    #[error("API returned no completion choices")]
    Empty,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// Cumulative token counts across a formatting run.
#[derive(Debug, Default, Clone, Copy)]
pub struct UsageTotals {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl UsageTotals {
    pub fn estimated_cost(&self) -> f64 {
        (self.prompt_tokens as f64 * IN_COST_PER_1M
            + self.completion_tokens as f64 * OUT_COST_PER_1M)
            / 1_000_000.0
    }
}

pub struct Reformatter {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl Reformatter {
    pub fn from_env(model: &str) -> Result<Self, LlmError> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| LlmError::MissingApiKey)?;
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model: model.to_string(),
        })
    }

    /// Reformat one answer text, retrying transient failures with
    /// exponential backoff. Token usage is accumulated into `totals`.
    pub async fn reformat(&self, text: &str, totals: &mut UsageTotals) -> Result<String, LlmError> {
        let mut attempt = 0;
        loop {
            match self.call(text, totals).await {
                Ok(out) => return Ok(out),
                Err(e) if attempt < MAX_RETRIES && is_retryable(&e) => {
                    attempt += 1;
                    let backoff_ms = BASE_BACKOFF_MS * 2u64.pow(attempt - 1);
                    warn!(
                        "reformat attempt {}/{} failed ({}), retrying in {}ms",
                        attempt, MAX_RETRIES, e, backoff_ms
                    );
                    tokio::time::sleep(std::time::Duration::from_millis(backoff_ms)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn call(&self, text: &str, totals: &mut UsageTotals) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "developer",
                    content: DEV_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: format!("{TASK_PROMPT}\n{text}"),
                },
            ],
            temperature: TEMPERATURE,
        };

        let response = self
            .client
            .post(API_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| {
                    v.get("error")?
                        .get("message")?
                        .as_str()
                        .map(str::to_string)
                })
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
                retryable: status.as_u16() == 429 || status.is_server_error(),
            });
        }

        let parsed: ChatResponse = response.json().await?;
        if let Some(usage) = parsed.usage {
            totals.prompt_tokens += usage.prompt_tokens;
            totals.completion_tokens += usage.completion_tokens;
        }
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(LlmError::Empty)?;
        Ok(content.trim_end_matches('\n').to_string())
    }
}

fn is_retryable(e: &LlmError) -> bool {
    match e {
        LlmError::Api { retryable, .. } => *retryable,
        LlmError::Http(e) => e.is_timeout() || e.is_connect(),
        _ => false,
    }
}
