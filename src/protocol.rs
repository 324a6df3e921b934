//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{Language, Message};
use crate::engine::Effect;
use crate::session::SessionSnapshot;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    SetLanguage {
        language: Language,
    },
    Choose {
        index: usize,
    },
    SubmitText {
        text: String,
    },
    CompleteDragDrop {
        placements: BTreeMap<String, String>,
    },
    CompleteWordSearch,
    SkipWordSearch,
    RestartGame,
    RestartQuiz,
    ExportResults {
        email: String,
        institution: String,
    },
}

impl ClientWsMessage {
    /// Actions that discard pending output (including a running typing pause).
    pub fn is_reset(&self) -> bool {
        matches!(self, ClientWsMessage::RestartGame | ClientWsMessage::RestartQuiz)
    }
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Message {
        message: Message,
    },
    Typing {
        active: bool,
    },
    Composing {
        active: bool,
    },
    Input {
        enabled: bool,
    },
    Achievement {
        id: String,
        title: String,
        duration_ms: u64,
    },
    TranscriptCleared,
    State {
        snapshot: SessionSnapshot,
    },
    Error {
        message: String,
    },
}

/// Client-visible form of an engine effect. Pauses and evaluator requests are
/// carried out by the driver and have no direct message.
pub fn effect_to_out(effect: &Effect) -> Option<ServerWsMessage> {
    match effect {
        Effect::Message(m) => Some(ServerWsMessage::Message { message: m.clone() }),
        Effect::Input { enabled } => Some(ServerWsMessage::Input { enabled: *enabled }),
        Effect::Composing { active } => Some(ServerWsMessage::Composing { active: *active }),
        Effect::Achievement { id, title, duration } => Some(ServerWsMessage::Achievement {
            id: id.clone(),
            title: title.clone(),
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        }),
        Effect::TranscriptCleared => Some(ServerWsMessage::TranscriptCleared),
        Effect::Typing(_) | Effect::Evaluate(_) => None,
    }
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct LanguageQuery {
    pub language: Option<Language>,
}

#[derive(Serialize)]
pub struct AchievementOut {
    pub id: String,
    pub title: String,
}

#[derive(Deserialize)]
pub struct TranslateIn {
    pub text: String,
    #[serde(default)]
    pub language: Language,
}
#[derive(Serialize)]
pub struct TranslateOut {
    pub translation: String,
}

#[derive(Serialize)]
pub struct ExportOut {
    pub ok: bool,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn client_messages_parse_by_tag() {
        let m: ClientWsMessage = serde_json::from_str(r#"{"type":"choose","index":2}"#).unwrap();
        assert!(matches!(m, ClientWsMessage::Choose { index: 2 }));
        let m: ClientWsMessage = serde_json::from_str(r#"{"type":"set_language","language":"zh"}"#).unwrap();
        assert!(matches!(m, ClientWsMessage::SetLanguage { language: Language::Zh }));
        let m: ClientWsMessage =
            serde_json::from_str(r#"{"type":"complete_drag_drop","placements":{"a":"x"}}"#).unwrap();
        assert!(matches!(m, ClientWsMessage::CompleteDragDrop { ref placements } if placements["a"] == "x"));
        let m: ClientWsMessage = serde_json::from_str(r#"{"type":"restart_quiz"}"#).unwrap();
        assert!(m.is_reset());
    }

    #[test]
    fn effects_map_to_server_messages() {
        let out = effect_to_out(&Effect::Achievement {
            id: "streak_3".into(),
            title: "Three in a row".into(),
            duration: Duration::from_secs(3),
        })
        .unwrap();
        let v = serde_json::to_value(&out).unwrap();
        assert_eq!(v["type"], "achievement");
        assert_eq!(v["duration_ms"], 3000);
        assert!(effect_to_out(&Effect::Typing(Duration::from_millis(5))).is_none());
        let v = serde_json::to_value(effect_to_out(&Effect::TranscriptCleared).unwrap()).unwrap();
        assert_eq!(v["type"], "transcript_cleared");
    }
}
