use core::fmt;

use crate::client::models::QuestionPayload;

pub const QUESTION_SECONDS: u32 = 20;
pub const MAX_CODE_LEN: usize = 6;
pub const ANSWER_SLOTS: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Screen {
    Join,
    Waiting,
    Question,
    AnswerSubmitted,
    Final,
}

impl Screen {
    /// Screens during which the refresh poller looks for the next question.
    pub fn is_question_phase(&self) -> bool {
        matches!(self, Screen::Question | Screen::AnswerSubmitted)
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Screen::Join => write!(f, "join"),
            Screen::Waiting => write!(f, "waiting"),
            Screen::Question => write!(f, "question"),
            Screen::AnswerSubmitted => write!(f, "answer_submitted"),
            Screen::Final => write!(f, "final"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Participant {
    display_name: String,
    session_id: Option<String>,
}

impl Participant {
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Name edits are only honoured before a session has been assigned.
    pub fn set_display_name(&mut self, name: impl Into<String>) {
        if self.session_id.is_none() {
            self.display_name = name.into();
        }
    }

    pub fn assign_session(&mut self, session_id: String) {
        self.display_name = self.display_name.trim().to_string();
        self.session_id = Some(session_id);
    }
}

/// Join code as typed by the participant. Always uppercase, at most six characters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionCode(String);

impl SessionCode {
    pub fn from_input(raw: &str) -> Self {
        let code = raw
            .chars()
            .flat_map(char::to_uppercase)
            .take(MAX_CODE_LEN)
            .collect();

        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Form sent to the server on join.
    pub fn normalized(&self) -> String {
        self.0.trim().to_uppercase()
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

/// Identity used to decide whether the session advanced to a new question.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QuestionKey {
    Id(String),
    Index(i64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionView {
    pub key: QuestionKey,
    pub question_text: String,
}

impl QuestionView {
    /// `None` when the payload carries no question, which ends the quiz.
    pub fn from_payload(payload: QuestionPayload) -> Option<Self> {
        if payload.is_empty() {
            return None;
        }

        let question_text = payload.question_text.unwrap_or_default();
        let key = match (payload.question_id, payload.index) {
            (Some(id), _) if !id.is_empty() => QuestionKey::Id(id),
            (_, Some(index)) => QuestionKey::Index(index),
            _ => QuestionKey::Text(question_text.clone()),
        };

        Some(Self { key, question_text })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerSubmission {
    pub session_id: String,
    pub display_name: String,
    pub answer_index: u8,
    pub time_remaining: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreState {
    pub score: f64,
    pub last_answer_correct: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubmissionState {
    #[default]
    NotSubmitted,
    Pending,
    Submitted,
    Failed,
}

impl SubmissionState {
    pub fn is_answered(&self) -> bool {
        matches!(self, SubmissionState::Pending | SubmissionState::Submitted)
    }

    pub fn accepts_submission(&self) -> bool {
        matches!(self, SubmissionState::NotSubmitted | SubmissionState::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastSeverity {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub id: u64,
    pub message: String,
    pub severity: ToastSeverity,
}

/// Snapshot handed to the presentation layer after every controller step.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub screen: Screen,
    pub display_name: String,
    pub code: String,
    pub question_text: Option<String>,
    pub time_left: u32,
    pub selected_answer: Option<u8>,
    pub is_answered: bool,
    pub submission: SubmissionState,
    pub score: ScoreState,
    pub toast: Option<Toast>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    SetName(String),
    SetCode(String),
    Join,
    SubmitAnswer(u8),
    Shutdown,
}
