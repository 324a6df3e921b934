//! Conversation engine: interprets the content graph against one session.
//!
//! The engine is a synchronous state machine. Every user action returns the list of
//! `Effect`s the session driver must carry out in order (pauses, messages, evaluator
//! calls). The only asynchronous boundary is the Free-Text Evaluator: the engine hands
//! out an `EvalTicket` and later receives the result through `resolve_evaluation`.
//! Tickets carry the session epoch, so results that arrive after a reset are dropped.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::{Prompts, Timing};
use crate::content::Content;
use crate::domain::{
    Button, ButtonAction, Capture, EvalError, Evaluation, Language, Message, Node, NodeKind, QuizPayload,
    RenderedButton, RenderedDragItem,
};
use crate::scoring::{self, achievement, Scored, QUIZ_MASTER_THRESHOLD};
use crate::session::{SessionSnapshot, SessionState};
use crate::util::{fill_template, trunc_for_log};

/// Longest chain of silent transitions (redirects, exhausted loops) followed in one step.
const MAX_HOPS: usize = 32;

const APOLOGY_KEY: &str = "evaluator_apology";

/// A move to another node. Evaluator text travels with the transition that renders it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Plain(String),
    WithText(String, String),
}

impl Transition {
    pub fn node_id(&self) -> &str {
        match self {
            Transition::Plain(id) | Transition::WithText(id, _) => id,
        }
    }
}

/// Work for the session driver, in order.
#[derive(Debug, Clone)]
pub enum Effect {
    /// "Typing" pause before the next message.
    Typing(Duration),
    Message(Message),
    Input { enabled: bool },
    Composing { active: bool },
    Achievement { id: String, title: String, duration: Duration },
    Evaluate(EvalTicket),
    TranscriptCleared,
}

/// One outstanding Free-Text Evaluator request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalTicket {
    pub epoch: u64,
    pub node_id: String,
    pub instruction: String,
    pub user_text: String,
    pub language: Language,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("an answer is already being evaluated")]
    Busy,
    #[error("the conversation is not waiting for text input")]
    NotAwaitingText,
    #[error("answer text is empty")]
    EmptyText,
    #[error("no button at index {0}")]
    UnknownButton(usize),
    #[error("current node is not a {0} quiz")]
    WrongQuizKind(&'static str),
}

pub struct Engine {
    content: Arc<Content>,
    prompts: Arc<Prompts>,
    timing: Timing,
    language: Language,
    session: SessionState,
    transcript: Vec<Message>,
    buttons: Vec<RenderedButton>,
    input_enabled: bool,
    in_flight: Option<EvalTicket>,
    epoch: u64,
}

impl Engine {
    pub fn new(content: Arc<Content>, prompts: Arc<Prompts>, timing: Timing, language: Language) -> Self {
        let session = SessionState::new(&content.entry);
        Self {
            content,
            prompts,
            timing,
            language,
            session,
            transcript: Vec::new(),
            buttons: Vec::new(),
            input_enabled: false,
            in_flight: None,
            epoch: 0,
        }
    }

    /// Render the entry node.
    pub fn start(&mut self) -> Vec<Effect> {
        let entry = self.content.entry.clone();
        self.enter(Transition::Plain(entry))
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    #[cfg(test)]
    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    #[cfg(test)]
    pub fn buttons(&self) -> &[RenderedButton] {
        &self.buttons
    }

    #[cfg(test)]
    pub fn language(&self) -> Language {
        self.language
    }

    /// Affects messages rendered from now on; the transcript keeps its language tags.
    pub fn set_language(&mut self, language: Language) {
        self.language = language;
    }

    #[cfg(test)]
    pub fn is_awaiting_evaluation(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            score: self.session.score,
            streak: self.session.streak,
            progress_percent: self.session.progress_percent(self.content.total_progress_steps),
            quiz_correct: self.session.quiz_correct,
            achievements: self.session.achievements.iter().map(str::to_string).collect(),
            current_node: self.session.current_node.clone(),
            input_enabled: self.input_enabled,
            awaiting_evaluation: self.in_flight.is_some(),
            quiz_completed: self.session.quiz_completed,
        }
    }

    // --- user actions ---

    /// The user picked one of the currently rendered buttons.
    #[instrument(level = "debug", skip(self), fields(node = %self.session.current_node))]
    pub fn choose(&mut self, index: usize) -> Result<Vec<Effect>, EngineError> {
        if self.in_flight.is_some() {
            return Err(EngineError::Busy);
        }
        let button = self.buttons.get(index).cloned().ok_or(EngineError::UnknownButton(index))?;

        match button.action {
            ButtonAction::RestartGame => return Ok(self.reset()),
            ButtonAction::RestartQuiz => return Ok(self.restart_quiz()),
            ButtonAction::Navigate => {}
        }

        let mut effects = vec![self.push(Message::user(button.label.clone(), self.language))];
        if let Some(branch) = &button.branch {
            self.consume_branch(branch, &mut effects);
        }
        effects.extend(self.enter(Transition::Plain(button.target)));
        Ok(effects)
    }

    /// Free text typed into an active prompt.
    #[instrument(level = "debug", skip(self, text), fields(node = %self.session.current_node, text_len = text.len()))]
    pub fn submit_text(&mut self, text: &str) -> Result<Vec<Effect>, EngineError> {
        if self.in_flight.is_some() {
            return Err(EngineError::Busy);
        }
        let content = Arc::clone(&self.content);
        let node = match content.node(&self.session.current_node) {
            Some(node) if self.input_enabled && matches!(node.kind, NodeKind::Prompt { .. }) => node,
            _ => return Err(EngineError::NotAwaitingText),
        };
        let NodeKind::Prompt { next, capture } = &node.kind else {
            return Err(EngineError::NotAwaitingText);
        };
        let text = text.trim();
        if text.is_empty() {
            return Err(EngineError::EmptyText);
        }

        let mut effects = vec![self.push(Message::user(text, self.language))];
        self.unlock(achievement::FIRST_STEPS, &mut effects);
        self.input_enabled = false;
        effects.push(Effect::Input { enabled: false });

        if node.is_dynamic {
            let ticket = EvalTicket {
                epoch: self.epoch,
                node_id: node.id.clone(),
                instruction: self.prompts.instruction_for(&node.id, &self.session.substitutions()),
                user_text: text.to_string(),
                language: self.language,
            };
            debug!(target: "engine", node = %node.id, epoch = self.epoch, "Awaiting evaluator");
            self.in_flight = Some(ticket.clone());
            effects.push(Effect::Composing { active: true });
            effects.push(Effect::Evaluate(ticket));
            return Ok(effects);
        }

        if let Some(capture) = capture {
            self.capture(*capture, text);
        }
        effects.extend(self.enter(Transition::Plain(next.clone())));
        Ok(effects)
    }

    /// Feed an evaluator result back into the flow. Stale tickets are ignored.
    #[instrument(level = "debug", skip(self, ticket, result), fields(node = %ticket.node_id, epoch = ticket.epoch))]
    pub fn resolve_evaluation(&mut self, ticket: EvalTicket, result: Result<Evaluation, EvalError>) -> Vec<Effect> {
        if ticket.epoch != self.epoch || self.in_flight.as_ref() != Some(&ticket) {
            debug!(target: "engine", node = %ticket.node_id, epoch = ticket.epoch, current_epoch = self.epoch, "Dropping stale evaluator result");
            return vec![];
        }
        self.in_flight = None;
        let mut effects = vec![Effect::Composing { active: false }];

        let content = Arc::clone(&self.content);
        let Some(NodeKind::Prompt { next, capture }) = content.node(&ticket.node_id).map(|n| &n.kind) else {
            warn!(target: "engine", node = %ticket.node_id, "Evaluated node is not a prompt");
            return effects;
        };
        let is_quiz = content.is_quiz_question(&ticket.node_id);

        match result {
            Err(e) => {
                warn!(target: "engine", node = %ticket.node_id, error = %e, "Evaluator call failed; re-prompting");
                let apology = self.localize(APOLOGY_KEY);
                effects.push(self.push(Message::system(apology, self.language)));
                self.reprompt(&mut effects);
            }
            Ok(eval) if !eval.is_relevant => {
                if is_quiz {
                    self.session.record_attempt(&ticket.node_id);
                }
                info!(target: "engine", node = %ticket.node_id, reply = %trunc_for_log(&eval.text, 40), "Irrelevant answer; re-prompting");
                let text = fill_template(&eval.text, &self.session.substitutions());
                effects.push(self.push(Message::system(text, self.language)));
                self.reprompt(&mut effects);
            }
            Ok(eval) => {
                if is_quiz {
                    self.session.record_attempt(&ticket.node_id);
                    self.session.last_question_id = Some(ticket.node_id.clone());
                    let points = content.points.get(&ticket.node_id).copied();
                    let scored = scoring::score_open_ended(&mut self.session, &ticket.node_id, points);
                    self.apply_unlocks(scored, &mut effects);
                }
                if let Some(capture) = capture {
                    self.capture(*capture, &ticket.user_text);
                }
                effects.extend(self.enter(Transition::WithText(next.clone(), eval.text)));
            }
        }
        effects
    }

    /// Drag-drop quiz finished; the engine grades the placements (item id -> category).
    #[instrument(level = "debug", skip(self, placements), fields(node = %self.session.current_node))]
    pub fn complete_drag_drop(&mut self, placements: &BTreeMap<String, String>) -> Result<Vec<Effect>, EngineError> {
        if self.in_flight.is_some() {
            return Err(EngineError::Busy);
        }
        let content = Arc::clone(&self.content);
        let Some(NodeKind::DragDropQuiz(quiz)) = content.node(&self.session.current_node).map(|n| &n.kind) else {
            return Err(EngineError::WrongQuizKind("drag-drop"));
        };
        let correct = quiz.grade(placements);
        self.session.last_question_id = Some(self.session.current_node.clone());
        debug!(target: "engine", %correct, "Drag-drop graded");
        let target = if correct { &quiz.correct } else { &quiz.incorrect };
        Ok(self.enter(Transition::Plain(target.clone())))
    }

    #[instrument(level = "debug", skip(self), fields(node = %self.session.current_node))]
    pub fn complete_word_search(&mut self) -> Result<Vec<Effect>, EngineError> {
        let (id, target) = self.word_search()?;
        let mut effects = vec![];
        self.session.last_question_id = Some(id.clone());
        let points = self.content.points.get(&id).copied();
        let scored = scoring::score_word_search_complete(&mut self.session, points);
        self.apply_unlocks(scored, &mut effects);
        effects.extend(self.enter(Transition::Plain(target.0)));
        Ok(effects)
    }

    #[instrument(level = "debug", skip(self), fields(node = %self.session.current_node))]
    pub fn skip_word_search(&mut self) -> Result<Vec<Effect>, EngineError> {
        let (id, target) = self.word_search()?;
        self.session.last_question_id = Some(id);
        scoring::score_word_search_skip(&mut self.session);
        Ok(self.enter(Transition::Plain(target.1)))
    }

    /// Back to a fresh session at the entry node.
    pub fn reset(&mut self) -> Vec<Effect> {
        self.epoch += 1;
        let was_composing = self.in_flight.take().is_some();
        self.session = SessionState::new(&self.content.entry);
        self.transcript.clear();
        self.buttons.clear();
        self.input_enabled = false;
        info!(target: "engine", epoch = self.epoch, "Session reset");

        let mut effects = vec![Effect::TranscriptCleared];
        if was_composing {
            effects.push(Effect::Composing { active: false });
        }
        effects.push(Effect::Input { enabled: false });
        effects.extend(self.start());
        effects
    }

    /// Replay the quiz only. Learning history, loops and achievements stay.
    pub fn restart_quiz(&mut self) -> Vec<Effect> {
        self.epoch += 1;
        let was_composing = self.in_flight.take().is_some();
        let s = &mut self.session;
        s.score = scoring::progress_score_for(s.visited_progress.len());
        s.progress_points = s.score;
        s.streak = 0;
        s.quiz_correct = 0;
        s.attempts.clear();
        s.quiz_completed = false;
        s.last_question_id = None;
        self.buttons.clear();
        self.input_enabled = false;
        info!(target: "engine", epoch = self.epoch, score = self.session.score, "Quiz restarted");

        let mut effects = vec![];
        if was_composing {
            effects.push(Effect::Composing { active: false });
        }
        effects.push(Effect::Input { enabled: false });
        let start = self.content.quiz_start.clone();
        effects.extend(self.enter(Transition::Plain(start)));
        effects
    }

    // --- transitions ---

    /// Follow a transition, including any silent hops, until something is rendered.
    /// An abandoned chain (unknown id, too many hops) leaves the session on the node it started from.
    fn enter(&mut self, transition: Transition) -> Vec<Effect> {
        let content = Arc::clone(&self.content);
        let origin = self.session.current_node.clone();
        let mut effects = Vec::new();
        let mut next = Some(transition);
        let mut hops = 0;

        while let Some(transition) = next.take() {
            hops += 1;
            if hops > MAX_HOPS {
                warn!(target: "engine", node = %transition.node_id(), "Too many silent transitions; stopping");
                self.session.current_node = origin;
                break;
            }
            let Some(node) = content.node(transition.node_id()) else {
                warn!(target: "engine", node = %transition.node_id(), "Unknown node id; ignoring transition");
                self.session.current_node = origin;
                break;
            };
            next = self.arrive(node, transition, &mut effects);
        }
        effects
    }

    /// Make `node` current, apply its side effects, and render it or name the next hop.
    fn arrive(&mut self, node: &Node, transition: Transition, effects: &mut Vec<Effect>) -> Option<Transition> {
        let content = Arc::clone(&self.content);
        debug!(target: "engine", node = %node.id, "Entering node");
        self.session.current_node = node.id.clone();

        if content.is_quiz_question(&node.id) {
            self.session.last_question_id = Some(node.id.clone());
        }
        if let Some(correct) = node.is_correct {
            let points = self.session.last_question_id.as_ref().and_then(|q| content.points.get(q)).copied();
            let scored = scoring::score_quiz_answer(&mut self.session, points, correct);
            self.apply_unlocks(scored, effects);
        }
        if content.progress_nodes.contains(&node.id) {
            scoring::score_progress(&mut self.session, &node.id);
        }
        if let Some(id) = &node.achievement {
            self.unlock(id, effects);
        }
        if node.id == content.quiz_end {
            self.finish_quiz(effects);
        }

        // Evaluator text rides along silent hops until a node renders it.
        let carried = match transition {
            Transition::WithText(_, text) => Some(text),
            Transition::Plain(_) => None,
        };

        match &node.kind {
            NodeKind::Redirect { target } => Some(forward(target.clone(), carried)),
            NodeKind::RedirectNextQuiz => {
                let next = content
                    .next_quiz_after(self.session.last_question_id.as_deref())
                    .unwrap_or(content.quiz_end.as_str());
                Some(forward(next.to_string(), carried))
            }
            NodeKind::LoopQuestion(spec) => {
                let remaining = self.session.loops.remaining(&node.id, spec);
                if remaining.is_empty() {
                    debug!(target: "engine", node = %node.id, "Loop exhausted");
                    return Some(forward(spec.exhausted.clone(), carried));
                }
                let text = dynamic_text(node, carried);
                let key: &str = if self.session.loops.is_revisit(&node.id, spec) {
                    content.revisit_key(&node.id)
                } else {
                    &node.text
                };
                let buttons = remaining
                    .into_iter()
                    .map(|branch| self.render_button(&spec.branches[branch], Some(branch)))
                    .collect();
                self.render(key, text, buttons, None, effects);
                None
            }
            NodeKind::Prompt { .. } => {
                let text = dynamic_text(node, carried);
                self.render(&node.text, text, vec![], None, effects);
                self.input_enabled = true;
                effects.push(Effect::Input { enabled: true });
                None
            }
            NodeKind::DragDropQuiz(quiz) => {
                let payload = QuizPayload::DragDrop {
                    categories: quiz.categories.iter().map(|c| self.localize(c)).collect(),
                    items: quiz
                        .items
                        .iter()
                        .map(|i| RenderedDragItem { id: i.id.clone(), label: self.localize(&i.label) })
                        .collect(),
                };
                let text = dynamic_text(node, carried);
                self.render(&node.text, text, vec![], Some(payload), effects);
                None
            }
            NodeKind::WordSearchQuiz(quiz) => {
                let payload = QuizPayload::WordSearch { words: quiz.words.clone(), grid: quiz.grid.clone() };
                let text = dynamic_text(node, carried);
                self.render(&node.text, text, vec![], Some(payload), effects);
                None
            }
            NodeKind::Message | NodeKind::Answer => {
                let buttons = node.buttons.iter().map(|b| self.render_button(b, None)).collect();
                let text = dynamic_text(node, carried);
                self.render(&node.text, text, buttons, None, effects);
                None
            }
        }
    }

    fn render(
        &mut self,
        key: &str,
        dynamic_text: Option<String>,
        buttons: Vec<RenderedButton>,
        quiz: Option<QuizPayload>,
        effects: &mut Vec<Effect>,
    ) {
        let text = match dynamic_text {
            Some(text) => fill_template(&text, &self.session.substitutions()),
            None => {
                if !self.timing.typing_delay().is_zero() {
                    effects.push(Effect::Typing(self.timing.typing_delay()));
                }
                self.localize(key)
            }
        };
        self.input_enabled = false;
        self.buttons = buttons.clone();
        let message = Message { buttons, quiz, ..Message::system(text, self.language) };
        effects.push(self.push(message));
    }

    fn render_button(&self, button: &Button, branch: Option<&str>) -> RenderedButton {
        RenderedButton {
            label: self.localize(&button.label),
            target: button.target.clone(),
            action: button.action,
            branch: branch.map(str::to_string),
        }
    }

    fn localize(&self, key: &str) -> String {
        self.content.strings.translate(self.language, key, &self.session.substitutions())
    }

    fn push(&mut self, message: Message) -> Effect {
        self.transcript.push(message.clone());
        Effect::Message(message)
    }

    fn reprompt(&mut self, effects: &mut Vec<Effect>) {
        self.input_enabled = true;
        effects.push(Effect::Input { enabled: true });
    }

    // --- bookkeeping ---

    fn capture(&mut self, capture: Capture, text: &str) {
        let value = Some(text.trim().to_string());
        match capture {
            Capture::Name => self.session.user_name = value,
            Capture::Major => self.session.user_major = value,
        }
    }

    fn consume_branch(&mut self, branch: &str, effects: &mut Vec<Effect>) {
        let content = Arc::clone(&self.content);
        let Some(NodeKind::LoopQuestion(spec)) = content.node(&self.session.current_node).map(|n| &n.kind) else {
            return;
        };
        let progress = self.session.loops.consume(&self.session.current_node, spec, branch);
        if progress.first_branch {
            self.unlock(achievement::BRANCH_COMPLETE, effects);
        }
        if progress.all_branches {
            self.unlock(achievement::ALL_TOPICS, effects);
        }
    }

    fn finish_quiz(&mut self, effects: &mut Vec<Effect>) {
        if self.session.quiz_completed {
            return;
        }
        if self.session.quiz_correct >= QUIZ_MASTER_THRESHOLD {
            self.unlock(achievement::QUIZ_MASTER, effects);
        }
        self.session.quiz_completed = true;
        info!(target: "engine", score = self.session.score, correct = self.session.quiz_correct, "Quiz completed");
    }

    fn word_search(&self) -> Result<(String, (String, String)), EngineError> {
        if self.in_flight.is_some() {
            return Err(EngineError::Busy);
        }
        match self.content.node(&self.session.current_node).map(|n| &n.kind) {
            Some(NodeKind::WordSearchQuiz(quiz)) => {
                Ok((self.session.current_node.clone(), (quiz.correct.clone(), quiz.skip.clone())))
            }
            _ => Err(EngineError::WrongQuizKind("word-search")),
        }
    }

    fn apply_unlocks(&mut self, scored: Scored, effects: &mut Vec<Effect>) {
        for id in scored.unlocks {
            self.unlock(id, effects);
        }
    }

    /// Unlock an achievement once. Ids missing from the catalog are ignored.
    fn unlock(&mut self, id: &str, effects: &mut Vec<Effect>) {
        let Some(def) = self.content.achievements.get(id) else {
            warn!(target: "engine", achievement = %id, "Unknown achievement id; ignoring");
            return;
        };
        if !self.session.achievements.unlock(id) {
            return;
        }
        info!(target: "engine", achievement = %id, "Achievement unlocked");
        effects.push(Effect::Achievement {
            id: id.to_string(),
            title: self.localize(&def.title),
            duration: self.timing.achievement_toast(),
        });
    }
}

fn forward(target: String, carried: Option<String>) -> Transition {
    match carried {
        Some(text) => Transition::WithText(target, text),
        None => Transition::Plain(target),
    }
}

/// Text to render in place of the table text. Only dynamic nodes accept evaluator output.
fn dynamic_text(node: &Node, carried: Option<String>) -> Option<String> {
    match carried {
        Some(text) if node.is_dynamic => Some(text),
        Some(_) => {
            warn!(target: "engine", node = %node.id, "Evaluator text sent to a static node; using table text");
            None
        }
        None => None,
    }
}

#[cfg(test)]
mod proptests;
