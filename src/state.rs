//! Application state: the loaded course, evaluator prompts, pacing, OpenAI client,
//! and the HTTP client used for analytics export.
//!
//! Everything here is read-only after startup; per-session state lives in each `Engine`.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::config::{load_agent_config_from_env, AgentConfig, AnalyticsCfg, Prompts, Timing};
use crate::content::{load_content, Content};
use crate::domain::Language;
use crate::engine::Engine;
use crate::openai::OpenAI;

#[derive(Clone)]
pub struct AppState {
    pub content: Arc<Content>,
    pub prompts: Arc<Prompts>,
    pub timing: Timing,
    pub analytics: AnalyticsCfg,
    pub openai: Option<OpenAI>,
    pub http: reqwest::Client,
}

impl AppState {
    /// Build state from env: load config and content, init OpenAI.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg = load_agent_config_from_env().unwrap_or_default();
        let content = load_content(cfg.content_path.as_deref());
        info!(
            target: "wayfinder_backend",
            nodes = content.nodes.len(),
            quiz_questions = content.quiz_order.len(),
            progress_steps = content.total_progress_steps,
            "Course ready"
        );

        // Build optional OpenAI client (if API key present).
        let openai = OpenAI::from_env();
        if let Some(oa) = &openai {
            info!(target: "wayfinder_backend", base_url = %oa.base_url, fast_model = %oa.fast_model, strong_model = %oa.strong_model, "OpenAI enabled.");
        } else {
            info!(target: "wayfinder_backend", "OpenAI disabled (no OPENAI_API_KEY). Using local evaluator.");
        }

        Self::from_parts(cfg, content, openai)
    }

    pub fn from_parts(cfg: AgentConfig, content: Content, openai: Option<OpenAI>) -> Self {
        Self {
            content: Arc::new(content),
            prompts: Arc::new(cfg.prompts),
            timing: cfg.timing,
            analytics: cfg.analytics,
            openai,
            http: reqwest::Client::new(),
        }
    }

    /// Fresh engine for one session.
    pub fn new_engine(&self, language: Language) -> Engine {
        Engine::new(self.content.clone(), self.prompts.clone(), self.timing, language)
    }
}

#[cfg(test)]
pub(crate) fn test_state() -> AppState {
    let mut cfg = AgentConfig::default();
    cfg.timing = Timing { typing_delay_ms: 0, achievement_toast_ms: 10 };
    AppState::from_parts(cfg, crate::seeds::demo_course(), None)
}
