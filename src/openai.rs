//! Minimal OpenAI client for the Free-Text Evaluator.
//!
//! We only call chat.completions and request either plain text (translation) or a
//! strict JSON object (relevance evaluation).
//! Calls are instrumented and log model names, latencies, and response sizes (not contents).
//!
//! NOTE: We never log the API key or the user's text.

use std::time::{Duration, Instant};

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{instrument, info, error};

use crate::domain::{EvalError, Evaluation, Language};

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub fast_model: String,
  pub strong_model: String,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok()?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let fast_model =
      std::env::var("OPENAI_FAST_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
    let strong_model =
      std::env::var("OPENAI_STRONG_MODEL").unwrap_or_else(|_| "gpt-4o".into());

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(20))
      .build()
      .ok()?;

    Some(Self { client, api_key, base_url, fast_model, strong_model })
  }

  async fn chat(&self, req: &ChatCompletionRequest) -> Result<String, EvalError> {
    let url = format!("{}/chat/completions", self.base_url);
    let res = self.client.post(&url)
      .header(USER_AGENT, "wayfinder-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(req).send().await?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      let message = extract_openai_error(&body).unwrap_or(body);
      return Err(EvalError::Http { status, message });
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| EvalError::Parse(e.to_string()))?;
    if let Some(usage) = &body.usage {
      info!(target: "evaluator", prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    Ok(body.choices.first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default())
  }

  fn request(model: &str, system: &str, user: &str, temperature: f32, json: bool) -> ChatCompletionRequest {
    ChatCompletionRequest {
      model: model.to_string(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature,
      response_format: json.then(|| ResponseFormat { r#type: "json_object".into() }),
    }
  }

  /// One evaluator round trip: contextual instruction + raw user text -> relevance + reply.
  #[instrument(level = "info", skip(self, instruction, user_text), fields(model = %self.strong_model, instr_len = instruction.len(), text_len = user_text.len()))]
  pub async fn evaluate(&self, instruction: &str, user_text: &str) -> Result<Evaluation, EvalError> {
    let start = Instant::now();
    let req = Self::request(&self.strong_model, instruction, user_text, 0.3, true);
    let result = self.chat(&req).await.and_then(|text| parse_evaluation(&text));
    let elapsed = start.elapsed();
    match &result {
      Ok(e) => info!(target: "evaluator", ?elapsed, relevant = e.is_relevant, reply_len = e.text.len(), "Evaluation received"),
      Err(e) => error!(target: "evaluator", ?elapsed, error = %e, "Evaluation failed"),
    }
    result
  }

  /// Translate evaluator output into a secondary language.
  #[instrument(level = "info", skip(self, system, text), fields(model = %self.fast_model, lang = target.code(), text_len = text.len()))]
  pub async fn translate(&self, system: &str, text: &str, target: Language) -> Result<String, EvalError> {
    let input = text.trim();
    if input.is_empty() { return Ok(String::new()); }
    let req = Self::request(&self.fast_model, system, input, 0.0, false);
    let out = self.chat(&req).await?;
    let out = out.trim();
    if out.is_empty() {
      return Err(EvalError::Parse("empty translation".into()));
    }
    Ok(out.to_string())
  }
}

/// Parse the evaluator's JSON object.
pub fn parse_evaluation(text: &str) -> Result<Evaluation, EvalError> {
  serde_json::from_str::<Evaluation>(text.trim()).map_err(|e| EvalError::Parse(e.to_string()))
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}
