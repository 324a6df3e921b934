//! Session state: the mutable record of one user's progress.
//!
//! Mutated only by the conversation engine (and the scoring helpers it calls).

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::branches::LoopTracker;

pub const MAX_SCORE: u32 = 1000;

/// Achievement ids in unlock order. An id is stored at most once and never removed.
#[derive(Debug, Default, Clone, Serialize)]
#[serde(transparent)]
pub struct Achievements(Vec<String>);

impl Achievements {
  /// Returns true only the first time `id` is unlocked.
  pub fn unlock(&mut self, id: &str) -> bool {
    if self.contains(id) {
      return false;
    }
    self.0.push(id.to_string());
    true
  }

  pub fn contains(&self, id: &str) -> bool {
    self.0.iter().any(|a| a == id)
  }

  #[cfg(test)]
  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.0.iter().map(String::as_str)
  }
}

#[derive(Debug, Clone)]
pub struct SessionState {
  pub score: u32,
  pub streak: u32,
  pub achievements: Achievements,
  pub visited_progress: HashSet<String>,
  pub progress_points: u32,
  pub quiz_correct: u32,
  pub user_name: Option<String>,
  pub user_major: Option<String>,
  pub last_question_id: Option<String>,
  pub attempts: HashMap<String, u32>,
  pub quiz_completed: bool,
  pub current_node: String,
  pub loops: LoopTracker,
}

impl SessionState {
  pub fn new(entry: &str) -> Self {
    Self {
      score: 0,
      streak: 0,
      achievements: Achievements::default(),
      visited_progress: HashSet::new(),
      progress_points: 0,
      quiz_correct: 0,
      user_name: None,
      user_major: None,
      last_question_id: None,
      attempts: HashMap::new(),
      quiz_completed: false,
      current_node: entry.to_string(),
      loops: LoopTracker::default(),
    }
  }

  /// Add points, clamped to `MAX_SCORE`. A no-op once the quiz is completed.
  pub fn add_score(&mut self, points: u32) -> u32 {
    if self.quiz_completed {
      return 0;
    }
    let before = self.score;
    self.score = self.score.saturating_add(points).min(MAX_SCORE);
    self.score - before
  }

  pub fn attempts_for(&self, question_id: &str) -> u32 {
    self.attempts.get(question_id).copied().unwrap_or(0)
  }

  pub fn record_attempt(&mut self, question_id: &str) -> u32 {
    let n = self.attempts.entry(question_id.to_string()).or_insert(0);
    *n += 1;
    *n
  }

  /// Learning progress in percent (0..=100).
  pub fn progress_percent(&self, total_steps: u32) -> u32 {
    if total_steps == 0 {
      return 0;
    }
    let visited = u32::try_from(self.visited_progress.len()).unwrap_or(u32::MAX);
    (visited.saturating_mul(100) / total_steps).min(100)
  }

  /// Substitution pairs for `{name}` / `{major}` tokens.
  pub fn substitutions(&self) -> [(&'static str, &str); 2] {
    [
      ("name", self.user_name.as_deref().unwrap_or("")),
      ("major", self.user_major.as_deref().unwrap_or("")),
    ]
  }
}

/// Read-only view pushed to clients after each action.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
  pub score: u32,
  pub streak: u32,
  pub progress_percent: u32,
  pub quiz_correct: u32,
  pub achievements: Vec<String>,
  pub current_node: String,
  pub input_enabled: bool,
  pub awaiting_evaluation: bool,
  pub quiz_completed: bool,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn score_is_clamped_and_frozen_after_quiz() {
    let mut s = SessionState::new("start");
    assert_eq!(s.add_score(990), 990);
    assert_eq!(s.add_score(50), 10);
    assert_eq!(s.score, MAX_SCORE);
    s.score = 100;
    s.quiz_completed = true;
    assert_eq!(s.add_score(50), 0);
    assert_eq!(s.score, 100);
  }

  #[test]
  fn achievements_unlock_once() {
    let mut a = Achievements::default();
    assert!(a.unlock("streak_3"));
    assert!(!a.unlock("streak_3"));
    assert_eq!(a.len(), 1);
    assert_eq!(a.iter().collect::<Vec<_>>(), vec!["streak_3"]);
  }

  #[test]
  fn progress_percent_is_capped() {
    let mut s = SessionState::new("start");
    assert_eq!(s.progress_percent(0), 0);
    s.visited_progress.insert("a".into());
    assert_eq!(s.progress_percent(4), 25);
    s.visited_progress.insert("b".into());
    s.visited_progress.insert("c".into());
    assert_eq!(s.progress_percent(2), 100);
  }

  #[test]
  fn attempts_count_per_question() {
    let mut s = SessionState::new("start");
    assert_eq!(s.record_attempt("q5"), 1);
    assert_eq!(s.record_attempt("q5"), 2);
    assert_eq!(s.record_attempt("q6"), 1);
    assert_eq!(s.attempts_for("q5"), 2);
    assert_eq!(s.attempts_for("q7"), 0);
  }
}
