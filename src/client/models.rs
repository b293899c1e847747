use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    pub name: String,
    pub code: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    pub quiz_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct QuizStateResponse {
    pub started: bool,
    pub current_index: i64,
}

impl QuizStateResponse {
    pub fn has_started(&self) -> bool {
        self.started && self.current_index >= 0
    }
}

/// Current question as served by the session. Only the fields needed to
/// detect advancement are read; option content is never shown on the device.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct QuestionPayload {
    pub question_text: Option<String>,
    #[serde(deserialize_with = "string_or_number")]
    pub question_id: Option<String>,
    pub index: Option<i64>,
}

/// Ids may be sent as strings or as plain numbers.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(id)) => Some(id),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => None,
    })
}

impl QuestionPayload {
    pub fn is_empty(&self) -> bool {
        self.question_text
            .as_deref()
            .is_none_or(|text| text.trim().is_empty())
    }
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    pub quiz_id: String,
    pub name: String,
    pub answer: u8,
    pub time_left: u32,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct AnswerResponse {
    pub correct: bool,
    pub score: f64,
}
