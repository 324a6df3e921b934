//! Built-in demo course. Guarantees the app is useful without an external content file,
//! and is the fixture the engine tests run against.

use std::collections::{BTreeMap, HashMap};

use crate::content::{AchievementDef, Content};
use crate::domain::{
  Button, ButtonAction, Capture, DragDropQuiz, DragItem, Language, LoopSpec, Node, NodeKind, WordSearchQuiz,
};
use crate::i18n::Strings;
use crate::scoring::QuizPoints;

fn btn(label: &str, target: &str) -> Button {
  Button { label: label.into(), target: target.into(), action: ButtonAction::Navigate }
}

fn node(id: &str, text: &str, kind: NodeKind) -> Node {
  Node {
    id: id.into(),
    text: text.into(),
    kind,
    buttons: vec![],
    is_correct: None,
    is_dynamic: false,
    achievement: None,
  }
}

fn message(id: &str, buttons: Vec<Button>) -> Node {
  Node { buttons, ..node(id, id, NodeKind::Message) }
}

fn answer(id: &str, correct: bool) -> Node {
  Node {
    buttons: vec![btn("btn_next", "next_quiz")],
    is_correct: Some(correct),
    ..node(id, id, NodeKind::Answer)
  }
}

fn multiple_choice(id: &str, options: &[(&str, bool)]) -> Node {
  let buttons = options
    .iter()
    .map(|(label, ok)| btn(label, &format!("{id}_{}", if *ok { "correct" } else { "wrong" })))
    .collect();
  message(id, buttons)
}

fn lp(branches: &[(&str, &str, &str)], exhausted: &str, parent: Option<&str>) -> NodeKind {
  NodeKind::LoopQuestion(LoopSpec {
    branches: branches
      .iter()
      .map(|(key, label, target)| (key.to_string(), btn(label, target)))
      .collect::<BTreeMap<_, _>>(),
    exhausted: exhausted.into(),
    parent_loop: parent.map(str::to_string),
  })
}

fn demo_nodes() -> Vec<Node> {
  vec![
    message("welcome", vec![btn("btn_start", "ask_name")]),
    node("ask_name", "ask_name", NodeKind::Prompt { next: "greet_name".into(), capture: Some(Capture::Name) }),
    message("greet_name", vec![btn("btn_continue", "ask_major")]),
    Node {
      is_dynamic: true,
      ..node("ask_major", "ask_major", NodeKind::Prompt { next: "major_reply".into(), capture: Some(Capture::Major) })
    },
    Node { is_dynamic: true, ..message("major_reply", vec![btn("btn_continue", "main_loop")]) },
    node(
      "main_loop",
      "main_loop",
      lp(
        &[
          ("what_is_ai", "btn_topic_ai", "topic_ai"),
          ("how_it_learns", "btn_topic_learning", "topic_learning"),
          ("ethics", "btn_topic_ethics", "topic_ethics"),
        ],
        "quiz_intro",
        None,
      ),
    ),
    message("topic_ai", vec![btn("btn_more", "topic_ai_examples")]),
    message("topic_ai_examples", vec![btn("btn_back", "main_loop")]),
    message("topic_learning", vec![btn("btn_continue", "learning_loop")]),
    node(
      "learning_loop",
      "learning_loop",
      lp(
        &[("data", "btn_learning_data", "learning_data"), ("training", "btn_learning_training", "learning_training")],
        "learning_done",
        Some("main_loop"),
      ),
    ),
    message("learning_data", vec![btn("btn_back", "learning_loop")]),
    message("learning_training", vec![btn("btn_back", "learning_loop")]),
    node("learning_done", "", NodeKind::Redirect { target: "main_loop".into() }),
    Node { achievement: Some("curious_mind".into()), ..message("topic_ethics", vec![btn("btn_back", "main_loop")]) },
    message("quiz_intro", vec![btn("btn_start_quiz", "quiz_q1")]),
    multiple_choice("quiz_q1", &[("q1_a", false), ("q1_b", true), ("q1_c", false)]),
    answer("quiz_q1_correct", true),
    answer("quiz_q1_wrong", false),
    multiple_choice("quiz_q2", &[("q2_a", true), ("q2_b", false)]),
    answer("quiz_q2_correct", true),
    answer("quiz_q2_wrong", false),
    node(
      "quiz_q3",
      "quiz_q3",
      NodeKind::DragDropQuiz(DragDropQuiz {
        categories: vec!["dd_cat_ai".into(), "dd_cat_not_ai".into()],
        items: vec![
          DragItem { id: "chatbot".into(), label: "dd_chatbot".into(), category: "dd_cat_ai".into() },
          DragItem { id: "spam_filter".into(), label: "dd_spam_filter".into(), category: "dd_cat_ai".into() },
          DragItem { id: "calculator".into(), label: "dd_calculator".into(), category: "dd_cat_not_ai".into() },
        ],
        correct: "quiz_q3_correct".into(),
        incorrect: "quiz_q3_wrong".into(),
      }),
    ),
    answer("quiz_q3_correct", true),
    answer("quiz_q3_wrong", false),
    node(
      "quiz_q4",
      "quiz_q4",
      NodeKind::WordSearchQuiz(WordSearchQuiz {
        words: vec!["DATA".into(), "MODEL".into(), "BIAS".into()],
        grid: vec![
          "DATAXQ".into(),
          "MODELW".into(),
          "ZBIASK".into(),
          "PLMNOR".into(),
        ],
        correct: "quiz_q4_done".into(),
        skip: "quiz_q4_skipped".into(),
      }),
    ),
    message("quiz_q4_done", vec![btn("btn_next", "next_quiz")]),
    message("quiz_q4_skipped", vec![btn("btn_next", "next_quiz")]),
    Node {
      is_dynamic: true,
      ..node("quiz_q5_prompt", "quiz_q5_prompt", NodeKind::Prompt { next: "quiz_q5_feedback".into(), capture: None })
    },
    Node { is_dynamic: true, ..message("quiz_q5_feedback", vec![btn("btn_next", "next_quiz")]) },
    Node {
      is_dynamic: true,
      ..node("quiz_q6_prompt", "quiz_q6_prompt", NodeKind::Prompt { next: "quiz_q6_feedback".into(), capture: None })
    },
    Node { is_dynamic: true, ..message("quiz_q6_feedback", vec![btn("btn_next", "next_quiz")]) },
    node("next_quiz", "", NodeKind::RedirectNextQuiz),
    message(
      "quiz_end",
      vec![
        Button { label: "btn_restart_quiz".into(), target: "quiz_q1".into(), action: ButtonAction::RestartQuiz },
        Button { label: "btn_restart".into(), target: "welcome".into(), action: ButtonAction::RestartGame },
      ],
    ),
  ]
}

const EN: &[(&str, &str)] = &[
  ("welcome", "Hi! I'm your guide to artificial intelligence. Ready for a short tour?"),
  ("btn_start", "Let's go"),
  ("ask_name", "First things first: what's your name?"),
  ("greet_name", "Nice to meet you, {name}!"),
  ("btn_continue", "Continue"),
  ("ask_major", "What do you study, or what would you like to study?"),
  ("major_reply", "Great choice, {name}. {major} and AI have a lot in common."),
  ("main_loop", "Which topic do you want to explore?"),
  ("main_loop_revisit", "Welcome back, {name}. What's next?"),
  ("loop_revisit", "Pick another one."),
  ("btn_topic_ai", "What is AI?"),
  ("btn_topic_learning", "How does it learn?"),
  ("btn_topic_ethics", "Is it fair?"),
  ("topic_ai", "AI is software that performs tasks we usually associate with human thinking."),
  ("btn_more", "Show me examples"),
  ("topic_ai_examples", "Chatbots, translation tools and spam filters are everyday examples."),
  ("btn_back", "Back"),
  ("topic_learning", "Most modern AI learns patterns from examples instead of following hand-written rules."),
  ("learning_loop", "Which part should we look at?"),
  ("btn_learning_data", "The data"),
  ("btn_learning_training", "The training"),
  ("learning_data", "Data is the set of examples a model learns from. Its quality shapes the result."),
  ("learning_training", "Training adjusts the model step by step until its predictions improve."),
  ("topic_ethics", "AI can repeat biases hidden in its data, so its output always deserves a critical look."),
  ("quiz_intro", "You've seen every topic. Time for a short quiz!"),
  ("btn_start_quiz", "Start the quiz"),
  ("btn_next", "Next"),
  ("quiz_q1", "Which of these is an example of AI?"),
  ("q1_a", "A light switch"),
  ("q1_b", "A spam filter"),
  ("q1_c", "A paper map"),
  ("quiz_q1_correct", "Correct! Spam filters learn to spot junk mail."),
  ("quiz_q1_wrong", "Not quite. The spam filter is the AI here."),
  ("quiz_q2", "Where does a model learn its patterns from?"),
  ("q2_a", "From data"),
  ("q2_b", "From the screen"),
  ("quiz_q2_correct", "Exactly, from data."),
  ("quiz_q2_wrong", "Not quite. Models learn from data."),
  ("quiz_q3", "Sort each item into the right group."),
  ("dd_cat_ai", "AI"),
  ("dd_cat_not_ai", "Not AI"),
  ("dd_chatbot", "Chatbot"),
  ("dd_spam_filter", "Spam filter"),
  ("dd_calculator", "Pocket calculator"),
  ("quiz_q3_correct", "Perfect sorting!"),
  ("quiz_q3_wrong", "Some items ended up in the wrong group."),
  ("quiz_q4", "Find the hidden words."),
  ("quiz_q4_done", "You found them all!"),
  ("quiz_q4_skipped", "No problem, let's move on."),
  ("quiz_q5_prompt", "In your own words: why should AI-generated text be fact-checked?"),
  ("quiz_q5_feedback", "Thanks for your answer."),
  ("quiz_q6_prompt", "Name one way AI could help in {major}."),
  ("quiz_q6_feedback", "Thanks for your idea, {name}."),
  ("quiz_end", "That's the end of the quiz. Well done, {name}!"),
  ("btn_restart_quiz", "Retry the quiz"),
  ("btn_restart", "Start over"),
  ("evaluator_apology", "Sorry, something went wrong on my side. Could you send that again?"),
  ("ach_first_steps", "First steps"),
  ("ach_streak_3", "Three in a row"),
  ("ach_branch_complete", "Explorer"),
  ("ach_all_topics", "Seen it all"),
  ("ach_quiz_master", "Quiz master"),
  ("ach_curious_mind", "Curious mind"),
];

const ZH: &[(&str, &str)] = &[
  ("welcome", "你好！我是你的人工智能向导。准备好开始简短的旅程了吗？"),
  ("btn_start", "开始吧"),
  ("ask_name", "首先，你叫什么名字？"),
  ("greet_name", "很高兴认识你，{name}！"),
  ("btn_continue", "继续"),
  ("ask_major", "你学什么专业，或者想学什么？"),
  ("major_reply", "好选择，{name}。{major}和人工智能有很多共同点。"),
  ("main_loop", "你想了解哪个主题？"),
  ("main_loop_revisit", "欢迎回来，{name}。接下来看什么？"),
  ("loop_revisit", "再选一个吧。"),
  ("btn_topic_ai", "什么是人工智能？"),
  ("btn_topic_learning", "它是怎么学习的？"),
  ("btn_topic_ethics", "它公平吗？"),
  ("btn_back", "返回"),
  ("btn_next", "下一题"),
  ("quiz_intro", "所有主题都看完了。来做个小测验吧！"),
  ("btn_start_quiz", "开始测验"),
  ("quiz_end", "测验结束。做得好，{name}！"),
  ("evaluator_apology", "抱歉，我这边出了点问题。可以再发一次吗？"),
];

/// The built-in course: intro, a three-topic main loop with a nested loop, and a six-question quiz.
pub fn demo_course() -> Content {
  let nodes: HashMap<String, Node> = demo_nodes().into_iter().map(|n| (n.id.clone(), n)).collect();

  let mut strings = Strings::default();
  for (k, v) in EN {
    strings.insert(Language::En, k, v);
  }
  for (k, v) in ZH {
    strings.insert(Language::Zh, k, v);
  }

  let points = [
    ("quiz_q1", 30, 10),
    ("quiz_q2", 40, 10),
    ("quiz_q3", 50, 15),
    ("quiz_q4", 60, 15),
    ("quiz_q5_prompt", 100, 20),
    ("quiz_q6_prompt", 130, 20),
  ]
  .into_iter()
  .map(|(id, base, bonus)| (id.to_string(), QuizPoints { base, bonus }))
  .collect();

  let achievements = ["first_steps", "streak_3", "branch_complete", "all_topics", "quiz_master", "curious_mind"]
    .into_iter()
    .map(|id| (id.to_string(), AchievementDef { title: format!("ach_{id}") }))
    .collect();

  let progress_nodes = ["topic_ai", "topic_ai_examples", "topic_learning", "learning_data", "learning_training", "topic_ethics"]
    .into_iter()
    .map(str::to_string)
    .collect();

  Content {
    entry: "welcome".into(),
    quiz_start: "quiz_q1".into(),
    quiz_end: "quiz_end".into(),
    quiz_order: ["quiz_q1", "quiz_q2", "quiz_q3", "quiz_q4", "quiz_q5_prompt", "quiz_q6_prompt"]
      .into_iter()
      .map(str::to_string)
      .collect(),
    progress_nodes,
    total_progress_steps: 6,
    generic_revisit: "loop_revisit".into(),
    revisit_overrides: HashMap::from([("main_loop".to_string(), "main_loop_revisit".to_string())]),
    points,
    achievements,
    nodes,
    strings,
  }
}
