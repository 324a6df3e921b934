//! The static course: content graph plus the fixed tables the engine consults
//! (quiz order, progress nodes, point values, achievements, revisit overrides, strings).
//!
//! Loaded once at startup from TOML (`CONTENT_PATH`) or built from `seeds`; never mutated.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Deserialize;
use tracing::{error, info, warn};

use crate::domain::Node;
use crate::i18n::Strings;
use crate::scoring::{achievement, QuizPoints};

/// Catalog entry for an achievement id.
#[derive(Clone, Debug, Deserialize)]
pub struct AchievementDef {
  pub title: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Content {
  pub entry: String,
  pub quiz_start: String,
  pub quiz_end: String,
  #[serde(default)]
  pub quiz_order: Vec<String>,
  #[serde(default)]
  pub progress_nodes: HashSet<String>,
  pub total_progress_steps: u32,
  pub generic_revisit: String,
  #[serde(default)]
  pub revisit_overrides: HashMap<String, String>,
  #[serde(default)]
  pub points: HashMap<String, QuizPoints>,
  #[serde(default)]
  pub achievements: BTreeMap<String, AchievementDef>,
  pub nodes: HashMap<String, Node>,
  #[serde(default)]
  pub strings: Strings,
}

impl Content {
  /// Parse a TOML course and fill node ids from their table keys.
  pub fn from_toml(src: &str) -> Result<Self, toml::de::Error> {
    let mut content: Content = toml::from_str(src)?;
    content.assign_ids();
    Ok(content)
  }

  pub(crate) fn assign_ids(&mut self) {
    for (id, node) in self.nodes.iter_mut() {
      node.id = id.clone();
    }
  }

  pub fn node(&self, id: &str) -> Option<&Node> {
    self.nodes.get(id)
  }

  /// Id following `after` in the canonical quiz order. `None` means the quiz is over.
  pub fn next_quiz_after(&self, after: Option<&str>) -> Option<&str> {
    match after {
      None => self.quiz_order.first().map(String::as_str),
      Some(last) => {
        let pos = self.quiz_order.iter().position(|q| q == last)?;
        self.quiz_order.get(pos + 1).map(String::as_str)
      }
    }
  }

  pub fn is_quiz_question(&self, id: &str) -> bool {
    self.quiz_order.iter().any(|q| q == id)
  }

  pub fn revisit_key(&self, node_id: &str) -> &str {
    self.revisit_overrides.get(node_id).map(String::as_str).unwrap_or(&self.generic_revisit)
  }

  /// Consistency report. Problems are returned as text; nothing here is fatal.
  pub fn validate(&self) -> Vec<String> {
    let mut problems = Vec::new();
    for anchor in [&self.entry, &self.quiz_start, &self.quiz_end] {
      if !self.nodes.contains_key(anchor) {
        problems.push(format!("anchor node '{anchor}' is missing"));
      }
    }
    let mut ids: Vec<&String> = self.nodes.keys().collect();
    ids.sort();
    for id in ids {
      let node = &self.nodes[id];
      for target in node.targets() {
        if !self.nodes.contains_key(target) {
          problems.push(format!("node '{id}' points at unknown node '{target}'"));
        }
      }
      if let Some(a) = &node.achievement {
        if !self.achievements.contains_key(a) {
          problems.push(format!("node '{id}' grants unknown achievement '{a}'"));
        }
      }
    }
    for q in &self.quiz_order {
      if !self.nodes.contains_key(q) {
        problems.push(format!("quiz order lists unknown node '{q}'"));
      }
      if !self.points.contains_key(q) {
        problems.push(format!("quiz question '{q}' has no point values"));
      }
    }
    for p in &self.progress_nodes {
      if !self.nodes.contains_key(p) {
        problems.push(format!("progress node '{p}' is missing"));
      }
    }
    for builtin in achievement::BUILTIN {
      if !self.achievements.contains_key(builtin) {
        problems.push(format!("achievement '{builtin}' is not in the catalog"));
      }
    }
    problems
  }
}

/// Load the course from `CONTENT_PATH` (or the configured path); fall back to the built-in one.
pub fn load_content(configured: Option<&str>) -> Content {
  let path = std::env::var("CONTENT_PATH").ok().or_else(|| configured.map(str::to_string));
  let content = match path {
    Some(path) => match std::fs::read_to_string(&path) {
      Ok(src) => match Content::from_toml(&src) {
        Ok(c) => {
          info!(target: "wayfinder_backend", %path, nodes = c.nodes.len(), "Loaded content graph (TOML)");
          c
        }
        Err(e) => {
          error!(target: "wayfinder_backend", %path, error = %e, "Failed to parse content graph; using built-in course");
          crate::seeds::demo_course()
        }
      },
      Err(e) => {
        error!(target: "wayfinder_backend", %path, error = %e, "Failed to read content graph; using built-in course");
        crate::seeds::demo_course()
      }
    },
    None => crate::seeds::demo_course(),
  };

  for problem in content.validate() {
    warn!(target: "wayfinder_backend", %problem, "Content graph inconsistency");
  }
  content
}
