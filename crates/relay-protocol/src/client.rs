//! Inbound events: what a participant sends to the relay.
//!
//! Relay payload fields are kept as opaque [`Value`]s. The relay never
//! inspects offers, candidates or transcripts; it only needs `roomId`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{ConnectionId, RoomId};
use crate::server::{self, ServerEvent};

/// An event received from a participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Join a room, leaving the current one if any.
    JoinRoom(RoomId),
    /// Leave a room explicitly.
    LeaveRoom(RoomId),
    /// SDP offer for the other participant.
    Offer(Offer),
    /// SDP answer for the other participant.
    Answer(Answer),
    /// Trickled ICE candidate.
    IceCandidate(IceCandidate),
    /// Live transcript chunk.
    TranscriptUpdate(TranscriptUpdate),
    /// Interviewer asked a question.
    QuestionAsked(QuestionAsked),
    /// Interviewee submitted an answer.
    AnswerSubmitted(AnswerSubmitted),
    /// Plagiarism score for an answer.
    PlagiarismResult(PlagiarismResult),
}

/// Payload of an inbound `offer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    pub room_id: RoomId,
    pub offer: Value,
}

/// Payload of an inbound `answer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub room_id: RoomId,
    pub answer: Value,
}

/// Payload of an inbound `ice-candidate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub room_id: RoomId,
    pub candidate: Value,
}

/// Payload of an inbound `transcript-update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptUpdate {
    pub room_id: RoomId,
    pub transcript: Value,
    pub timestamp: Value,
}

/// Payload of an inbound `question-asked`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionAsked {
    pub room_id: RoomId,
    pub question: Value,
}

/// Payload of an inbound `answer-submitted`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSubmitted {
    pub room_id: RoomId,
    pub question_id: Value,
    pub transcript: Value,
}

/// Payload of an inbound `plagiarism-result`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlagiarismResult {
    pub room_id: RoomId,
    pub question_id: Value,
    pub score: Value,
    pub interpretation: Value,
}

impl ClientEvent {
    /// The wire name of this event.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinRoom(_) => "join-room",
            ClientEvent::LeaveRoom(_) => "leave-room",
            ClientEvent::Offer(_) => "offer",
            ClientEvent::Answer(_) => "answer",
            ClientEvent::IceCandidate(_) => "ice-candidate",
            ClientEvent::TranscriptUpdate(_) => "transcript-update",
            ClientEvent::QuestionAsked(_) => "question-asked",
            ClientEvent::AnswerSubmitted(_) => "answer-submitted",
            ClientEvent::PlagiarismResult(_) => "plagiarism-result",
        }
    }

    /// The room this event is addressed to.
    #[must_use]
    pub fn room_id(&self) -> &str {
        match self {
            ClientEvent::JoinRoom(room) | ClientEvent::LeaveRoom(room) => room,
            ClientEvent::Offer(e) => &e.room_id,
            ClientEvent::Answer(e) => &e.room_id,
            ClientEvent::IceCandidate(e) => &e.room_id,
            ClientEvent::TranscriptUpdate(e) => &e.room_id,
            ClientEvent::QuestionAsked(e) => &e.room_id,
            ClientEvent::AnswerSubmitted(e) => &e.room_id,
            ClientEvent::PlagiarismResult(e) => &e.room_id,
        }
    }

    /// Sort this event by what the router does with it. Relay events are
    /// converted into the outbound event the other members see, stamped
    /// with the sender.
    #[must_use]
    pub fn into_routed(self, from: &ConnectionId) -> Routed {
        let from = from.clone();
        let (room_id, event) = match self {
            ClientEvent::JoinRoom(room_id) => return Routed::Join(room_id),
            ClientEvent::LeaveRoom(room_id) => return Routed::Leave(room_id),
            ClientEvent::Offer(Offer { room_id, offer }) => {
                (room_id, ServerEvent::Offer(server::Offer { offer, from }))
            }
            ClientEvent::Answer(Answer { room_id, answer }) => {
                (room_id, ServerEvent::Answer(server::Answer { answer, from }))
            }
            ClientEvent::IceCandidate(IceCandidate { room_id, candidate }) => (
                room_id,
                ServerEvent::IceCandidate(server::IceCandidate { candidate, from }),
            ),
            ClientEvent::TranscriptUpdate(TranscriptUpdate {
                room_id,
                transcript,
                timestamp,
            }) => (
                room_id,
                ServerEvent::TranscriptUpdate(server::TranscriptUpdate {
                    transcript,
                    timestamp,
                    from,
                }),
            ),
            ClientEvent::QuestionAsked(QuestionAsked { room_id, question }) => (
                room_id,
                ServerEvent::QuestionAsked(server::QuestionAsked { question, from }),
            ),
            ClientEvent::AnswerSubmitted(AnswerSubmitted {
                room_id,
                question_id,
                transcript,
            }) => (
                room_id,
                ServerEvent::AnswerSubmitted(server::AnswerSubmitted {
                    question_id,
                    transcript,
                    from,
                }),
            ),
            ClientEvent::PlagiarismResult(PlagiarismResult {
                room_id,
                question_id,
                score,
                interpretation,
            }) => (
                room_id,
                ServerEvent::PlagiarismResult(server::PlagiarismResult {
                    question_id,
                    score,
                    interpretation,
                    from,
                }),
            ),
        };
        Routed::Relay { room_id, event }
    }
}

/// An inbound event sorted by its effect on the room registry.
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    /// Join a room, leaving any other.
    Join(RoomId),
    /// Leave a room.
    Leave(RoomId),
    /// Forward an event to the other members of a room.
    Relay {
        /// Room whose members receive the event.
        room_id: RoomId,
        /// The event as the other members see it.
        event: ServerEvent,
    },
}
