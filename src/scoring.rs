//! Scoring policies: multiple-choice / drag-drop answers, open-ended prompts,
//! word search, and learning progress.
//!
//! Every path goes through `SessionState::add_score`, which clamps to [0, 1000]
//! and turns into a no-op once the quiz is completed.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::session::SessionState;

/// Built-in achievement ids.
pub mod achievement {
  pub const FIRST_STEPS: &str = "first_steps";
  pub const STREAK_3: &str = "streak_3";
  pub const BRANCH_COMPLETE: &str = "branch_complete";
  pub const ALL_TOPICS: &str = "all_topics";
  pub const QUIZ_MASTER: &str = "quiz_master";

  pub const BUILTIN: [&str; 5] = [FIRST_STEPS, STREAK_3, BRANCH_COMPLETE, ALL_TOPICS, QUIZ_MASTER];
}

pub const PROGRESS_POINTS: u32 = 10;
pub const PROGRESS_CAP: u32 = 200;
pub const ATTEMPT_PENALTY: u32 = 10;
pub const STREAK_ACHIEVEMENT_AT: u32 = 3;
pub const QUIZ_MASTER_THRESHOLD: u32 = 5;

/// Fixed base/bonus values for one quiz question.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct QuizPoints {
  pub base: u32,
  #[serde(default)]
  pub bonus: u32,
}

impl QuizPoints {
  /// Base plus the streak bonus when the streak is already running.
  fn with_streak(self, streak: u32) -> u32 {
    if streak > 0 { self.base + self.bonus } else { self.base }
  }
}

/// Outcome of one scoring step.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Scored {
  pub awarded: u32,
  pub unlocks: Vec<&'static str>,
}

fn count_correct(session: &mut SessionState, awarded: u32) -> Scored {
  session.streak += 1;
  session.quiz_correct += 1;
  let mut unlocks = vec![];
  if session.streak == STREAK_ACHIEVEMENT_AT {
    unlocks.push(achievement::STREAK_3);
  }
  Scored { awarded, unlocks }
}

/// Multiple-choice and drag-drop answers, keyed by `last_question_id`.
pub fn score_quiz_answer(session: &mut SessionState, points: Option<QuizPoints>, correct: bool) -> Scored {
  if !correct {
    debug!(target: "scoring", question = ?session.last_question_id, "Incorrect answer; streak reset");
    session.streak = 0;
    return Scored::default();
  }
  let points = points.unwrap_or_else(|| {
    warn!(target: "scoring", question = ?session.last_question_id, "No point values for question");
    QuizPoints::default()
  });
  let awarded = session.add_score(points.with_streak(session.streak));
  debug!(target: "scoring", question = ?session.last_question_id, awarded, streak = session.streak + 1, "Correct answer");
  count_correct(session, awarded)
}

/// Relevant answer to an open-ended quiz prompt: 10 points off per extra attempt, floored at 0.
pub fn score_open_ended(session: &mut SessionState, question_id: &str, points: Option<QuizPoints>) -> Scored {
  let points = points.unwrap_or_default();
  let attempts = session.attempts_for(question_id).max(1);
  let penalty = ATTEMPT_PENALTY * (attempts - 1);
  let earned = points.with_streak(session.streak).saturating_sub(penalty);
  let awarded = session.add_score(earned);
  debug!(target: "scoring", %question_id, attempts, penalty, awarded, "Open-ended answer scored");
  count_correct(session, awarded)
}

pub fn score_word_search_complete(session: &mut SessionState, points: Option<QuizPoints>) -> Scored {
  let earned = points.unwrap_or_default().with_streak(session.streak);
  let awarded = session.add_score(earned);
  count_correct(session, awarded)
}

pub fn score_word_search_skip(session: &mut SessionState) {
  session.streak = 0;
}

/// First visit of a progress node during the learning phase.
pub fn score_progress(session: &mut SessionState, node_id: &str) -> u32 {
  if !session.visited_progress.insert(node_id.to_string()) {
    return 0;
  }
  if session.quiz_completed || session.progress_points >= PROGRESS_CAP {
    return 0;
  }
  let earned = PROGRESS_POINTS.min(PROGRESS_CAP - session.progress_points);
  let awarded = session.add_score(earned);
  session.progress_points += awarded;
  awarded
}

/// Score a restarted quiz begins with: the learning-progress points already earned.
pub fn progress_score_for(visited: usize) -> u32 {
  u32::try_from(visited)
    .unwrap_or(u32::MAX)
    .saturating_mul(PROGRESS_POINTS)
    .min(PROGRESS_CAP)
}

#[cfg(test)]
mod tests {
  use super::*;

  const Q2: QuizPoints = QuizPoints { base: 40, bonus: 10 };
  const Q6: QuizPoints = QuizPoints { base: 130, bonus: 20 };

  fn session() -> SessionState {
    SessionState::new("start")
  }

  #[test]
  fn correct_answer_with_running_streak_gets_bonus() {
    let mut s = session();
    s.streak = 1;
    s.score = 70;
    let r = score_quiz_answer(&mut s, Some(Q2), true);
    assert_eq!(r.awarded, 50);
    assert_eq!(s.score, 120);
    assert_eq!(s.streak, 2);
    assert_eq!(s.quiz_correct, 1);
  }

  #[test]
  fn first_correct_answer_gets_base_only() {
    let mut s = session();
    assert_eq!(score_quiz_answer(&mut s, Some(Q2), true).awarded, 40);
  }

  #[test]
  fn incorrect_answer_resets_streak_without_points() {
    let mut s = session();
    s.streak = 2;
    s.score = 300;
    assert_eq!(score_quiz_answer(&mut s, Some(Q2), false), Scored::default());
    assert_eq!(s.streak, 0);
    assert_eq!(s.score, 300);
  }

  #[test]
  fn streak_of_three_requests_achievement_exactly_once() {
    let mut s = session();
    assert!(score_quiz_answer(&mut s, Some(Q2), true).unlocks.is_empty());
    assert!(score_quiz_answer(&mut s, Some(Q2), true).unlocks.is_empty());
    assert_eq!(score_quiz_answer(&mut s, Some(Q2), true).unlocks, vec![achievement::STREAK_3]);
    assert!(score_quiz_answer(&mut s, Some(Q2), true).unlocks.is_empty());
  }

  #[test]
  fn open_ended_third_attempt_is_penalized() {
    let mut s = session();
    s.streak = 1;
    s.attempts.insert("quiz_q6_prompt".into(), 3);
    let r = score_open_ended(&mut s, "quiz_q6_prompt", Some(Q6));
    assert_eq!(r.awarded, 130);
    assert_eq!(s.streak, 2);
  }

  #[test]
  fn open_ended_penalty_floors_at_zero() {
    let mut s = session();
    s.attempts.insert("q".into(), 40);
    s.score = 55;
    let r = score_open_ended(&mut s, "q", Some(QuizPoints { base: 100, bonus: 0 }));
    assert_eq!(r.awarded, 0);
    assert_eq!(s.score, 55);
    assert_eq!(s.quiz_correct, 1);
  }

  #[test]
  fn word_search_complete_and_skip() {
    let mut s = session();
    s.streak = 2;
    let r = score_word_search_complete(&mut s, Some(QuizPoints { base: 60, bonus: 15 }));
    assert_eq!(r.awarded, 75);
    assert_eq!(r.unlocks, vec![achievement::STREAK_3]);
    let score = s.score;
    score_word_search_skip(&mut s);
    assert_eq!(s.streak, 0);
    assert_eq!(s.score, score);
  }

  #[test]
  fn progress_awards_once_per_node_up_to_cap() {
    let mut s = session();
    assert_eq!(score_progress(&mut s, "n0"), 10);
    assert_eq!(score_progress(&mut s, "n0"), 0);
    for i in 1..30 {
      score_progress(&mut s, &format!("n{i}"));
    }
    assert_eq!(s.progress_points, PROGRESS_CAP);
    assert_eq!(s.score, PROGRESS_CAP);
    assert_eq!(s.visited_progress.len(), 30);
  }

  #[test]
  fn progress_cap_ignores_quiz_points() {
    let mut s = session();
    s.score = 400;
    assert_eq!(score_progress(&mut s, "n0"), 10);
    assert_eq!(s.score, 410);
  }

  #[test]
  fn progress_stops_after_quiz_completion() {
    let mut s = session();
    s.quiz_completed = true;
    assert_eq!(score_progress(&mut s, "n0"), 0);
    assert!(s.visited_progress.contains("n0"));
  }

  #[test]
  fn restart_score_comes_from_progress_nodes() {
    assert_eq!(progress_score_for(3), 30);
    assert_eq!(progress_score_for(50), PROGRESS_CAP);
  }
}
