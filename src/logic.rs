//! Evaluator plumbing shared by the WebSocket driver and the HTTP handlers.
//!
//! This includes:
//!   - running one Free-Text Evaluator round trip (OpenAI, or the local fallback)
//!   - translating evaluator output for secondary-language sessions
//!   - the achievement catalog view

use tracing::{debug, instrument, warn};

use crate::domain::{EvalError, Evaluation, Language};
use crate::engine::EvalTicket;
use crate::state::AppState;

/// One evaluator round trip for an engine ticket. Output is translated when the
/// session renders in a secondary language; a failed translation keeps the original text.
#[instrument(level = "info", skip(state, ticket), fields(node = %ticket.node_id, lang = ticket.language.code(), text_len = ticket.user_text.len()))]
pub async fn evaluate_free_text(state: &AppState, ticket: &EvalTicket) -> Result<Evaluation, EvalError> {
  let mut eval = match &state.openai {
    Some(oa) => oa.evaluate(&ticket.instruction, &ticket.user_text).await?,
    None => {
      debug!(target: "evaluator", node = %ticket.node_id, "Using local evaluator");
      evaluate_local(&ticket.user_text)
    }
  };

  if !ticket.language.is_primary() {
    eval.text = do_translate(state, &eval.text, ticket.language).await;
  }
  Ok(eval)
}

/// Translate into `language`, falling back to the untranslated text.
#[instrument(level = "info", skip(state, text), fields(text_len = text.len(), lang = language.code()))]
pub async fn do_translate(state: &AppState, text: &str, language: Language) -> String {
  if language.is_primary() {
    return text.to_string();
  }
  if let Some(oa) = &state.openai {
    match oa.translate(&state.prompts.translate_system, text, language).await {
      Ok(t) => return t,
      Err(e) => warn!(target: "evaluator", error = %e, "Translation failed; keeping original text"),
    }
  }
  text.to_string()
}

/// Achievement catalog, localized.
pub fn achievement_catalog(state: &AppState, language: Language) -> Vec<(String, String)> {
  state
    .content
    .achievements
    .iter()
    .map(|(id, def)| (id.clone(), state.content.strings.translate(language, &def.title, &[])))
    .collect()
}

// -------- Local fallback --------

/// Offline evaluator: any answer with at least three letters counts as relevant.
fn evaluate_local(answer: &str) -> Evaluation {
  let letters = answer.chars().filter(|c| c.is_alphabetic()).count();
  if letters >= 3 {
    Evaluation { is_relevant: true, text: "Thanks for sharing that, {name}!".into() }
  } else {
    Evaluation { is_relevant: false, text: "Could you tell me a bit more?".into() }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::state::test_state;

  fn ticket(text: &str, language: Language) -> EvalTicket {
    EvalTicket {
      epoch: 0,
      node_id: "ask_major".into(),
      instruction: "instr".into(),
      user_text: text.into(),
      language,
    }
  }

  #[tokio::test]
  async fn local_evaluator_judges_by_length() {
    let state = test_state();
    let ok = evaluate_free_text(&state, &ticket("biology", Language::En)).await.unwrap();
    assert!(ok.is_relevant);
    let short = evaluate_free_text(&state, &ticket("?!", Language::En)).await.unwrap();
    assert!(!short.is_relevant);
  }

  #[tokio::test]
  async fn translation_without_client_keeps_text() {
    let state = test_state();
    assert_eq!(do_translate(&state, "Hello", Language::Zh).await, "Hello");
    let eval = evaluate_free_text(&state, &ticket("数学很好", Language::Zh)).await.unwrap();
    assert!(eval.is_relevant);
  }

  #[test]
  fn catalog_is_localized() {
    let state = test_state();
    let catalog = achievement_catalog(&state, Language::En);
    assert!(catalog.contains(&("streak_3".to_string(), "Three in a row".to_string())));
  }
}
