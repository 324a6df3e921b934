//! Loading agent configuration (evaluator prompts, pacing, analytics) from TOML.
//!
//! See `AgentConfig`, `Prompts`, `Timing` and `AnalyticsCfg` for the expected schema.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, error};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AgentConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub timing: Timing,
  #[serde(default)]
  pub analytics: AnalyticsCfg,
  #[serde(default)]
  pub content_path: Option<String>,
}

/// Instructions sent to the Free-Text Evaluator. `instructions` is keyed by prompt node id;
/// prompts without an entry use `default_instruction`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub structural_instruction: String,
  pub default_instruction: String,
  pub instructions: HashMap<String, String>,
  pub translate_system: String,
}

impl Default for Prompts {
  fn default() -> Self {
    let mut instructions = HashMap::new();
    instructions.insert(
      "ask_major".to_string(),
      "You are a friendly campus guide chatting with {name}. The user was asked what they study or want to study. Relevant = the answer names a field, subject or career interest. Reply with one warm sentence acknowledging it.".to_string(),
    );
    instructions.insert(
      "quiz_q5_prompt".to_string(),
      "You are grading a short answer. Question: in your own words, why should AI-generated text be fact-checked? Relevant = the answer gives any sensible reason (errors, hallucinations, bias, outdated data). Reply with one encouraging sentence of feedback.".to_string(),
    );
    instructions.insert(
      "quiz_q6_prompt".to_string(),
      "You are grading a short answer. Question: name one way AI could help in {major}. Relevant = the answer describes a plausible use. Reply with one encouraging sentence of feedback.".to_string(),
    );
    Self {
      structural_instruction: "Respond ONLY with strict JSON: {\"isRelevant\": boolean, \"text\": string}. If the user's message is off-topic, set isRelevant to false and use text to gently steer them back to the question.".into(),
      default_instruction: "You are a friendly tutor. Decide whether the user's message answers the last question.".into(),
      instructions,
      translate_system: "Translate the user's text into natural Simplified Chinese. Output ONLY the translation text.".into(),
    }
  }
}

impl Prompts {
  /// Full evaluator instruction for a prompt node, with `{name}`/`{major}` filled in.
  pub fn instruction_for(&self, node_id: &str, subs: &[(&str, &str)]) -> String {
    let context = self.instructions.get(node_id).unwrap_or(&self.default_instruction);
    format!(
      "{}\n\n{}",
      crate::util::fill_template(context, subs),
      self.structural_instruction
    )
  }
}

/// UI pacing. Not a correctness boundary.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct Timing {
  pub typing_delay_ms: u64,
  pub achievement_toast_ms: u64,
}

impl Default for Timing {
  fn default() -> Self {
    Self { typing_delay_ms: 600, achievement_toast_ms: 3000 }
  }
}

impl Timing {
  pub fn typing_delay(&self) -> Duration { Duration::from_millis(self.typing_delay_ms) }
  pub fn achievement_toast(&self) -> Duration { Duration::from_millis(self.achievement_toast_ms) }
}

/// External form endpoint for result export, plus its field names.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AnalyticsCfg {
  pub form_url: Option<String>,
  pub name_field: String,
  pub email_field: String,
  pub institution_field: String,
  pub score_field: String,
}

impl Default for AnalyticsCfg {
  fn default() -> Self {
    Self {
      form_url: None,
      name_field: "name".into(),
      email_field: "email".into(),
      institution_field: "institution".into(),
      score_field: "score".into(),
    }
  }
}

/// Attempt to load `AgentConfig` from AGENT_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_agent_config_from_env() -> Option<AgentConfig> {
  let path = std::env::var("AGENT_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<AgentConfig>(&s) {
      Ok(cfg) => {
        info!(target: "wayfinder_backend", %path, "Loaded agent config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "wayfinder_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "wayfinder_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn partial_toml_keeps_defaults() {
    let cfg: AgentConfig = toml::from_str(
      "[timing]\ntyping_delay_ms = 0\n[prompts.instructions]\nask_major = \"Custom for {name}\"\n",
    )
    .unwrap();
    assert_eq!(cfg.timing.typing_delay_ms, 0);
    assert_eq!(cfg.timing.achievement_toast_ms, 3000);
    assert!(cfg.prompts.structural_instruction.contains("isRelevant"));
    assert!(cfg.analytics.form_url.is_none());
    assert_eq!(cfg.analytics.score_field, "score");
  }

  #[test]
  fn instruction_combines_context_and_structure() {
    let p = Prompts::default();
    let text = p.instruction_for("quiz_q6_prompt", &[("name", "Ana"), ("major", "biology")]);
    assert!(text.contains("help in biology"));
    assert!(text.ends_with(&p.structural_instruction));
    let fallback = p.instruction_for("unknown_prompt", &[]);
    assert!(fallback.starts_with(&p.default_instruction));
  }
}
