//! Outbound events: what the relay sends to participants.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::ConnectionId;

/// Rejected-event error codes.
pub mod codes {
    /// The frame could not be decoded into a known event.
    pub const MALFORMED_EVENT: u16 = 1001;
    /// The room identifier is unusable.
    pub const INVALID_ROOM: u16 = 1002;
    /// The room is at capacity.
    pub const ROOM_FULL: u16 = 1003;
}

/// An event sent to a participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Session established; tells the client its own connection id.
    Connected {
        /// The connection id assigned to this client.
        id: ConnectionId,
    },
    /// Another participant joined the room.
    UserJoined(ConnectionId),
    /// Current membership of the room.
    RoomUsers {
        /// Number of members.
        count: usize,
        /// Member connection ids.
        users: Vec<ConnectionId>,
    },
    /// The room just reached two participants.
    ReadyToCall,
    /// A participant left the room.
    UserLeft(ConnectionId),
    Offer(Offer),
    Answer(Answer),
    IceCandidate(IceCandidate),
    TranscriptUpdate(TranscriptUpdate),
    QuestionAsked(QuestionAsked),
    AnswerSubmitted(AnswerSubmitted),
    PlagiarismResult(PlagiarismResult),
    /// The sender's last event was rejected.
    Error {
        /// Error code, see [`codes`].
        code: u16,
        /// Human-readable reason.
        message: String,
    },
}

/// Relayed SDP offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub offer: Value,
    pub from: ConnectionId,
}

/// Relayed SDP answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: Value,
    pub from: ConnectionId,
}

/// Relayed ICE candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: Value,
    pub from: ConnectionId,
}

/// Relayed transcript chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptUpdate {
    pub transcript: Value,
    pub timestamp: Value,
    pub from: ConnectionId,
}

/// Relayed question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionAsked {
    pub question: Value,
    pub from: ConnectionId,
}

/// Relayed answer submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSubmitted {
    pub question_id: Value,
    pub transcript: Value,
    pub from: ConnectionId,
}

/// Relayed plagiarism score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlagiarismResult {
    pub question_id: Value,
    pub score: Value,
    pub interpretation: Value,
    pub from: ConnectionId,
}

impl ServerEvent {
    /// Create an error event.
    #[must_use]
    pub fn error(code: u16, message: impl Into<String>) -> Self {
        ServerEvent::Error {
            code,
            message: message.into(),
        }
    }

    /// The wire name of this event.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Connected { .. } => "connected",
            ServerEvent::UserJoined(_) => "user-joined",
            ServerEvent::RoomUsers { .. } => "room-users",
            ServerEvent::ReadyToCall => "ready-to-call",
            ServerEvent::UserLeft(_) => "user-left",
            ServerEvent::Offer(_) => "offer",
            ServerEvent::Answer(_) => "answer",
            ServerEvent::IceCandidate(_) => "ice-candidate",
            ServerEvent::TranscriptUpdate(_) => "transcript-update",
            ServerEvent::QuestionAsked(_) => "question-asked",
            ServerEvent::AnswerSubmitted(_) => "answer-submitted",
            ServerEvent::PlagiarismResult(_) => "plagiarism-result",
            ServerEvent::Error { .. } => "error",
        }
    }
}
