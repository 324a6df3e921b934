//! Domain models: content-graph nodes, rendered transcript messages, evaluator results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Language tag used for rendering. `En` is the primary language.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
  #[default]
  En,
  Zh,
}

impl Language {
  pub const PRIMARY: Language = Language::En;

  pub fn code(self) -> &'static str {
    match self {
      Language::En => "en",
      Language::Zh => "zh",
    }
  }

  pub fn is_primary(self) -> bool { self == Self::PRIMARY }
}

/// What a button does besides navigating to its target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonAction {
  #[default]
  Navigate,
  RestartGame,
  RestartQuiz,
}

/// Button as declared in the content graph (label is a text key).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
  pub label: String,
  pub target: String,
  #[serde(default, rename = "type")]
  pub action: ButtonAction,
}

/// Free-text data a prompt stores into the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capture {
  Name,
  Major,
}

/// Branch set of a loop question. `parent_loop` marks a secondary loop.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoopSpec {
  pub branches: BTreeMap<String, Button>,
  pub exhausted: String,
  #[serde(default)]
  pub parent_loop: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DragItem {
  pub id: String,
  pub label: String,
  pub category: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DragDropQuiz {
  pub categories: Vec<String>,
  pub items: Vec<DragItem>,
  pub correct: String,
  pub incorrect: String,
}

impl DragDropQuiz {
  /// True when every item was dropped into its own category.
  pub fn grade(&self, placements: &BTreeMap<String, String>) -> bool {
    self.items.iter().all(|item| placements.get(&item.id) == Some(&item.category))
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WordSearchQuiz {
  pub words: Vec<String>,
  #[serde(default)]
  pub grid: Vec<String>,
  pub correct: String,
  pub skip: String,
}

/// Node kind plus the kind-specific payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
  Message,
  Answer,
  Prompt {
    next: String,
    #[serde(default)]
    capture: Option<Capture>,
  },
  LoopQuestion(LoopSpec),
  Redirect { target: String },
  RedirectNextQuiz,
  DragDropQuiz(DragDropQuiz),
  WordSearchQuiz(WordSearchQuiz),
}

/// One unit of the branching content graph. Immutable once loaded.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Node {
  #[serde(default)]
  pub id: String,
  #[serde(default)]
  pub text: String,
  #[serde(flatten)]
  pub kind: NodeKind,
  #[serde(default)]
  pub buttons: Vec<Button>,
  #[serde(default)]
  pub is_correct: Option<bool>,
  #[serde(default)]
  pub is_dynamic: bool,
  #[serde(default)]
  pub achievement: Option<String>,
}

impl Node {
  /// Every node id this node can lead to.
  pub fn targets(&self) -> Vec<&str> {
    let mut out: Vec<&str> = self.buttons.iter().map(|b| b.target.as_str()).collect();
    match &self.kind {
      NodeKind::Prompt { next, .. } => out.push(next),
      NodeKind::LoopQuestion(spec) => {
        out.extend(spec.branches.values().map(|b| b.target.as_str()));
        out.push(&spec.exhausted);
      }
      NodeKind::Redirect { target } => out.push(target),
      NodeKind::DragDropQuiz(q) => {
        out.push(&q.correct);
        out.push(&q.incorrect);
      }
      NodeKind::WordSearchQuiz(q) => {
        out.push(&q.correct);
        out.push(&q.skip);
      }
      NodeKind::Message | NodeKind::Answer | NodeKind::RedirectNextQuiz => {}
    }
    out
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
  User,
  System,
}

/// Button after localization, as shown in the transcript.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RenderedButton {
  pub label: String,
  pub target: String,
  #[serde(rename = "type")]
  pub action: ButtonAction,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub branch: Option<String>,
}

/// Quiz payload embedded into a rendered message.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "quiz", rename_all = "snake_case")]
pub enum QuizPayload {
  DragDrop {
    categories: Vec<String>,
    items: Vec<RenderedDragItem>,
  },
  WordSearch {
    words: Vec<String>,
    grid: Vec<String>,
  },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RenderedDragItem {
  pub id: String,
  pub label: String,
}

/// Transcript entry.
#[derive(Clone, Debug, Serialize)]
pub struct Message {
  pub id: Uuid,
  pub sender: Sender,
  pub text: String,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub buttons: Vec<RenderedButton>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub quiz: Option<QuizPayload>,
  pub language: Language,
}

impl Message {
  pub fn user(text: impl Into<String>, language: Language) -> Self {
    Self { id: Uuid::new_v4(), sender: Sender::User, text: text.into(), buttons: vec![], quiz: None, language }
  }

  pub fn system(text: impl Into<String>, language: Language) -> Self {
    Self { id: Uuid::new_v4(), sender: Sender::System, text: text.into(), buttons: vec![], quiz: None, language }
  }
}

/// Result of one Free-Text Evaluator round trip.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Evaluation {
  #[serde(rename = "isRelevant")]
  pub is_relevant: bool,
  pub text: String,
}

#[derive(Debug, Error)]
pub enum EvalError {
  #[error("transport error: {0}")]
  Transport(String),
  #[error("evaluator HTTP {status}: {message}")]
  Http { status: u16, message: String },
  #[error("could not parse evaluator response: {0}")]
  Parse(String),
}

impl From<reqwest::Error> for EvalError {
  fn from(e: reqwest::Error) -> Self { EvalError::Transport(e.to_string()) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn drag_drop_grading_requires_every_item() {
    let quiz = DragDropQuiz {
      categories: vec!["input".into(), "output".into()],
      items: vec![
        DragItem { id: "kbd".into(), label: "dd_keyboard".into(), category: "input".into() },
        DragItem { id: "mon".into(), label: "dd_monitor".into(), category: "output".into() },
      ],
      correct: "ok".into(),
      incorrect: "bad".into(),
    };
    let mut placements = BTreeMap::new();
    placements.insert("kbd".to_string(), "input".to_string());
    assert!(!quiz.grade(&placements));
    placements.insert("mon".to_string(), "output".to_string());
    assert!(quiz.grade(&placements));
    placements.insert("mon".to_string(), "input".to_string());
    assert!(!quiz.grade(&placements));
  }

  #[test]
  fn evaluation_parses_camel_case_flag() {
    let e: Evaluation = serde_json::from_str(r#"{"isRelevant": true, "text": "Nice"}"#).unwrap();
    assert!(e.is_relevant);
    assert_eq!(e.text, "Nice");
  }
}
