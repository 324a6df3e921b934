//! Property-based tests for the conversation engine
//!
//! Random action sequences against the demo course; session invariants are checked
//! after every step.

use super::*;
use crate::domain::LoopSpec;
use crate::seeds::demo_course;
use crate::session::MAX_SCORE;
use proptest::prelude::*;
use std::collections::HashSet;

// ============================================================================
// Test Helpers
// ============================================================================

#[derive(Debug, Clone)]
enum Action {
    Choose(usize),
    Submit(String),
    ResolveRelevant,
    ResolveIrrelevant,
    ResolveFailed,
    CompleteWordSearch,
    SkipWordSearch,
    DragDrop(bool),
    RestartGame,
    RestartQuiz,
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        8 => (0usize..4).prop_map(Action::Choose),
        3 => "[a-zA-Z ]{0,16}".prop_map(Action::Submit),
        3 => Just(Action::ResolveRelevant),
        1 => Just(Action::ResolveIrrelevant),
        1 => Just(Action::ResolveFailed),
        1 => Just(Action::CompleteWordSearch),
        1 => Just(Action::SkipWordSearch),
        1 => any::<bool>().prop_map(Action::DragDrop),
        1 => Just(Action::RestartGame),
        1 => Just(Action::RestartQuiz),
    ]
}

fn test_engine() -> Engine {
    let timing = Timing { typing_delay_ms: 0, achievement_toast_ms: 0 };
    Engine::new(Arc::new(demo_course()), Arc::new(Prompts::default()), timing, Language::En)
}

fn main_loop_size(content: &Content) -> usize {
    content
        .nodes
        .values()
        .find_map(|n| match &n.kind {
            NodeKind::LoopQuestion(LoopSpec { parent_loop: None, branches, .. }) => Some(branches.len()),
            _ => None,
        })
        .unwrap_or(0)
}

fn correct_placements() -> BTreeMap<String, String> {
    [("chatbot", "dd_cat_ai"), ("spam_filter", "dd_cat_ai"), ("calculator", "dd_cat_not_ai")]
        .into_iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect()
}

/// Apply one action. Evaluator tickets are collected so later steps can resolve them,
/// including tickets made stale by a restart.
fn apply(e: &mut Engine, action: &Action, pending: &mut Vec<EvalTicket>) -> Vec<Effect> {
    let result = match action {
        Action::Choose(i) => e.choose(*i),
        Action::Submit(text) => e.submit_text(text),
        Action::ResolveRelevant => Ok(resolve(e, pending, Ok(Evaluation { is_relevant: true, text: "Great.".into() }))),
        Action::ResolveIrrelevant => {
            Ok(resolve(e, pending, Ok(Evaluation { is_relevant: false, text: "Try again.".into() })))
        }
        Action::ResolveFailed => Ok(resolve(e, pending, Err(EvalError::Transport("down".into())))),
        Action::CompleteWordSearch => e.complete_word_search(),
        Action::SkipWordSearch => e.skip_word_search(),
        Action::DragDrop(correct) => {
            let placements = if *correct { correct_placements() } else { BTreeMap::new() };
            e.complete_drag_drop(&placements)
        }
        Action::RestartGame => Ok(e.reset()),
        Action::RestartQuiz => Ok(e.restart_quiz()),
    };
    let effects = result.unwrap_or_default();
    pending.extend(effects.iter().filter_map(|f| match f {
        Effect::Evaluate(t) => Some(t.clone()),
        _ => None,
    }));
    effects
}

fn resolve(e: &mut Engine, pending: &mut Vec<EvalTicket>, result: Result<Evaluation, EvalError>) -> Vec<Effect> {
    match pending.pop() {
        Some(ticket) => e.resolve_evaluation(ticket, result),
        None => vec![],
    }
}

fn unlocked_ids(effects: &[Effect]) -> Vec<&str> {
    effects
        .iter()
        .filter_map(|f| match f {
            Effect::Achievement { id, .. } => Some(id.as_str()),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    /// Score, streak, achievements and main-loop visitation stay consistent
    /// for any sequence of user actions and evaluator results.
    #[test]
    fn prop_session_invariants_hold(actions in proptest::collection::vec(arb_action(), 0..80)) {
        let mut e = test_engine();
        let declared = main_loop_size(&e.content);
        let mut pending = vec![];
        e.start();
        let mut expected_streak = 0u32;

        for action in &actions {
            let epoch = e.epoch;
            let before = e.session().clone();
            let effects = apply(&mut e, action, &mut pending);
            let after = e.session();
            let restarted = e.epoch != epoch;

            prop_assert!(after.score <= MAX_SCORE, "score out of range: {}", after.score);
            prop_assert!(e.content.node(&after.current_node).is_some(), "current node missing: {}", after.current_node);

            // Streak is the run of correct answers since the last wrong answer or restart.
            let node_changed = after.current_node != before.current_node;
            let wrong_answer = node_changed
                && e.content.node(&after.current_node).and_then(|n| n.is_correct) == Some(false);
            let skipped = matches!(action, Action::SkipWordSearch) && after.last_question_id.is_some() && !effects.is_empty();
            if restarted {
                expected_streak = 0;
            } else if after.quiz_correct > before.quiz_correct {
                prop_assert_eq!(after.quiz_correct, before.quiz_correct + 1);
                expected_streak += 1;
            } else if wrong_answer || skipped {
                expected_streak = 0;
            }
            prop_assert_eq!(after.streak, expected_streak, "after {:?}", action);

            // Achievements: no duplicates, never removed, each unlocked at most once.
            let ids: Vec<&str> = after.achievements.iter().collect();
            let unique: HashSet<&str> = ids.iter().copied().collect();
            prop_assert_eq!(ids.len(), unique.len());
            let fresh = unlocked_ids(&effects);
            let fresh_unique: HashSet<&str> = fresh.iter().copied().collect();
            prop_assert_eq!(fresh.len(), fresh_unique.len());

            // Main-loop visitation is bounded by the declared branches.
            prop_assert!(after.loops.main_visited() <= declared);

            if !restarted {
                prop_assert!(after.score >= before.score, "score decreased: {} -> {}", before.score, after.score);
                prop_assert!(after.loops.main_visited() >= before.loops.main_visited());
                for id in before.achievements.iter() {
                    prop_assert!(after.achievements.contains(id), "achievement {} removed", id);
                }
                for id in &fresh {
                    prop_assert!(!before.achievements.contains(id), "achievement {} unlocked twice", id);
                }
            }
        }
    }

    /// Results of calls issued before a restart never change the session.
    #[test]
    fn prop_stale_results_are_dropped(text in "[a-zA-Z]{3,12}", relevant in any::<bool>()) {
        let mut e = test_engine();
        e.start();
        let mut pending = vec![];
        for action in [Action::Choose(0), Action::Submit("Ana".into()), Action::Choose(0), Action::Submit(text)] {
            apply(&mut e, &action, &mut pending);
        }
        prop_assert!(e.is_awaiting_evaluation());
        let ticket = pending.pop().unwrap();
        e.reset();
        let before = e.snapshot();
        let effects = e.resolve_evaluation(ticket, Ok(Evaluation { is_relevant: relevant, text: "late".into() }));
        prop_assert!(effects.is_empty());
        let after = e.snapshot();
        prop_assert_eq!(after.current_node, before.current_node);
        prop_assert_eq!(after.score, before.score);
        prop_assert_eq!(e.transcript().len(), 1);
    }
}
