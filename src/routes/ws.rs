//! WebSocket upgrade + session driver. One connection is one conversation session.
//!
//! The socket is split into a reader task (parses client JSON), a writer task
//! (serializes server messages) and the driver, which owns the `Engine` and carries
//! out its effects: typing pauses, evaluator calls, and outgoing messages.

use std::collections::VecDeque;
use std::sync::Arc;

use axum::{
  extract::{
    ws::{Message, WebSocket},
    Query, State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, error, instrument, debug, warn};

use crate::analytics::{spawn_export, ExportForm};
use crate::domain::{EvalError, Evaluation, Language};
use crate::engine::{Effect, EngineError, EvalTicket, Engine};
use crate::logic::evaluate_free_text;
use crate::protocol::{effect_to_out, ClientWsMessage, LanguageQuery, ServerWsMessage};
use crate::state::AppState;

type EvalResult = (EvalTicket, Result<Evaluation, EvalError>);

#[instrument(level = "info", skip(state, q))]
pub async fn ws_upgrade(
  ws: WebSocketUpgrade,
  State(state): State<Arc<AppState>>,
  Query(q): Query<LanguageQuery>,
) -> impl IntoResponse {
  info!(target: "wayfinder_backend", "WebSocket upgrade requested");
  let language = q.language.unwrap_or_default();
  ws.on_upgrade(move |socket| handle_ws(socket, state, language))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(socket: WebSocket, state: Arc<AppState>, language: Language) {
  info!(target: "wayfinder_backend", "WebSocket connected");
  let (mut sink, mut stream) = socket.split();
  let (out_tx, mut out_rx) = mpsc::channel::<ServerWsMessage>(64);
  let (in_tx, in_rx) = mpsc::channel::<ClientWsMessage>(32);

  let writer = tokio::spawn(async move {
    while let Some(msg) = out_rx.recv().await {
      let out = serde_json::to_string(&msg).unwrap_or_else(|e| {
        serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
      });
      if let Err(e) = sink.send(Message::Text(out)).await {
        error!(target: "wayfinder_backend", error = %e, "WS send error");
        break;
      }
    }
  });

  let reader_out = out_tx.clone();
  let reader = tokio::spawn(async move {
    while let Some(Ok(msg)) = stream.next().await {
      match msg {
        Message::Text(txt) => match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "wayfinder_backend", "WS received: {:?}", incoming.kind());
            if in_tx.send(incoming).await.is_err() {
              break;
            }
          }
          Err(e) => {
            let _ = reader_out.send(ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) }).await;
          }
        },
        Message::Close(_) => break,
        _ => {}
      }
    }
  });

  SessionDriver::new(state, language, out_tx).run(in_rx).await;
  reader.abort();
  let _ = writer.await;
  info!(target: "wayfinder_backend", "WebSocket disconnected");
}

impl ClientWsMessage {
  /// Variant name for logs (user text is never logged).
  fn kind(&self) -> &'static str {
    match self {
      ClientWsMessage::Ping => "ping",
      ClientWsMessage::SetLanguage { .. } => "set_language",
      ClientWsMessage::Choose { .. } => "choose",
      ClientWsMessage::SubmitText { .. } => "submit_text",
      ClientWsMessage::CompleteDragDrop { .. } => "complete_drag_drop",
      ClientWsMessage::CompleteWordSearch => "complete_word_search",
      ClientWsMessage::SkipWordSearch => "skip_word_search",
      ClientWsMessage::RestartGame => "restart_game",
      ClientWsMessage::RestartQuiz => "restart_quiz",
      ClientWsMessage::ExportResults { .. } => "export_results",
    }
  }
}

/// Owns one session's engine and executes its effects in order.
pub struct SessionDriver {
  state: Arc<AppState>,
  engine: Engine,
  out: mpsc::Sender<ServerWsMessage>,
  eval_tx: mpsc::Sender<EvalResult>,
  eval_rx: mpsc::Receiver<EvalResult>,
  deferred: VecDeque<ClientWsMessage>,
  closed: bool,
}

impl SessionDriver {
  pub fn new(state: Arc<AppState>, language: Language, out: mpsc::Sender<ServerWsMessage>) -> Self {
    let engine = state.new_engine(language);
    let (eval_tx, eval_rx) = mpsc::channel(4);
    Self { state, engine, out, eval_tx, eval_rx, deferred: VecDeque::new(), closed: false }
  }

  /// Drive the session until the client goes away.
  pub async fn run(mut self, mut inbox: mpsc::Receiver<ClientWsMessage>) {
    let effects = self.engine.start();
    self.execute(effects, &mut inbox).await;

    while !self.closed {
      let effects = match self.deferred.pop_front() {
        Some(msg) => self.dispatch(msg).await,
        None => tokio::select! {
          msg = inbox.recv() => match msg {
            Some(msg) => self.dispatch(msg).await,
            None => break,
          },
          Some((ticket, result)) = self.eval_rx.recv() => self.engine.resolve_evaluation(ticket, result),
        },
      };
      self.execute(effects, &mut inbox).await;
    }
  }

  async fn send(&mut self, msg: ServerWsMessage) {
    if self.out.send(msg).await.is_err() {
      self.closed = true;
    }
  }

  /// Apply one client action to the engine. Rejected actions leave the session untouched.
  async fn dispatch(&mut self, msg: ClientWsMessage) -> Vec<Effect> {
    let result: Result<Vec<Effect>, EngineError> = match msg {
      ClientWsMessage::Ping => {
        self.send(ServerWsMessage::Pong).await;
        return vec![];
      }
      ClientWsMessage::SetLanguage { language } => {
        self.engine.set_language(language);
        Ok(vec![])
      }
      ClientWsMessage::Choose { index } => self.engine.choose(index),
      ClientWsMessage::SubmitText { text } => self.engine.submit_text(&text),
      ClientWsMessage::CompleteDragDrop { placements } => self.engine.complete_drag_drop(&placements),
      ClientWsMessage::CompleteWordSearch => self.engine.complete_word_search(),
      ClientWsMessage::SkipWordSearch => self.engine.skip_word_search(),
      ClientWsMessage::RestartGame => Ok(self.engine.reset()),
      ClientWsMessage::RestartQuiz => Ok(self.engine.restart_quiz()),
      ClientWsMessage::ExportResults { email, institution } => {
        let session = self.engine.session();
        let form = ExportForm {
          name: session.user_name.clone().unwrap_or_default(),
          email,
          institution,
          score: session.score,
        };
        spawn_export(self.state.http.clone(), &self.state.analytics, form);
        Ok(vec![])
      }
    };

    match result {
      Ok(effects) => effects,
      Err(e) => {
        warn!(target: "engine", error = %e, "Rejected client action");
        self.send(ServerWsMessage::Error { message: e.to_string() }).await;
        vec![]
      }
    }
  }

  /// Carry out effects in order, then push a state snapshot.
  /// A restart arriving during a typing pause drops whatever was still queued.
  async fn execute(&mut self, effects: Vec<Effect>, inbox: &mut mpsc::Receiver<ClientWsMessage>) {
    let mut queue: VecDeque<Effect> = effects.into();
    while let Some(effect) = queue.pop_front() {
      if self.closed {
        return;
      }
      match effect {
        Effect::Typing(delay) => {
          self.send(ServerWsMessage::Typing { active: true }).await;
          let sleep = tokio::time::sleep(delay);
          tokio::pin!(sleep);
          let mut restart = None;
          loop {
            tokio::select! {
              _ = &mut sleep => break,
              msg = inbox.recv() => match msg {
                Some(msg) if msg.is_reset() => {
                  restart = Some(msg);
                  break;
                }
                Some(msg) => self.deferred.push_back(msg),
                None => {
                  self.closed = true;
                  return;
                }
              },
            }
          }
          self.send(ServerWsMessage::Typing { active: false }).await;
          if let Some(msg) = restart {
            debug!(target: "engine", "Restart during typing pause; dropping queued output");
            queue.clear();
            self.deferred.clear();
            queue.extend(self.dispatch(msg).await);
          }
        }
        Effect::Evaluate(ticket) => self.spawn_evaluation(ticket),
        other => {
          if let Some(out) = effect_to_out(&other) {
            self.send(out).await;
          }
        }
      }
    }
    let snapshot = self.engine.snapshot();
    self.send(ServerWsMessage::State { snapshot }).await;
  }

  fn spawn_evaluation(&self, ticket: EvalTicket) {
    let state = self.state.clone();
    let tx = self.eval_tx.clone();
    tokio::spawn(async move {
      let result = evaluate_free_text(&state, &ticket).await;
      let _ = tx.send((ticket, result)).await;
    });
  }
}
