use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum QuizClientError {
    #[error("Http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request rejected: {0} - {1}")]
    Rejected(StatusCode, String),

    #[error("Api error: {0} - {1}")]
    Api(StatusCode, String),

    #[error("Failed to deserialize response: {0}")]
    Deserialize(#[from] serde_json::Error),
}

impl QuizClientError {
    /// Text shown to the participant when a join attempt fails.
    pub fn join_message(&self) -> String {
        match self {
            QuizClientError::Rejected(_, message) => message.clone(),
            QuizClientError::Api(_, _) | QuizClientError::Deserialize(_) => {
                "Failed to join quiz".to_string()
            }
            QuizClientError::Http(_) => "Connection error. Please try again.".to_string(),
        }
    }
}
