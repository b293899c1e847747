use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, error};

use crate::client::{
    api_base::ApiBase,
    models::{
        AnswerRequest, AnswerResponse, ErrorResponse, JoinRequest, JoinResponse, QuestionPayload,
        QuizStateResponse,
    },
    quiz_client_error::QuizClientError,
};

/// Remote quiz session as seen from a participant device.
#[async_trait]
pub trait QuizApi: Send + Sync {
    async fn join(&self, request: &JoinRequest) -> Result<JoinResponse, QuizClientError>;

    async fn quiz_state(&self, quiz_id: &str) -> Result<QuizStateResponse, QuizClientError>;

    /// `Ok(None)` means the session has no current question, i.e. the quiz is over.
    async fn current_question(
        &self,
        quiz_id: &str,
    ) -> Result<Option<QuestionPayload>, QuizClientError>;

    async fn submit_answer(
        &self,
        request: &AnswerRequest,
    ) -> Result<AnswerResponse, QuizClientError>;
}

#[derive(Debug, Clone)]
pub struct QuizClient {
    client: Client,
    api_base: ApiBase,
}

impl QuizClient {
    pub fn new(client: Client, api_base: ApiBase) -> Self {
        Self { client, api_base }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base.as_str(), path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, QuizClientError> {
        let url = self.url(path);
        debug!("QuizClient GET {}", url);
        let response = self.client.get(&url).send().await?;
        let response = Self::ensure_success(response).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, QuizClientError> {
        let url = self.url(path);
        debug!("QuizClient POST {}", url);
        let response = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn ensure_success(response: Response) -> Result<Response, QuizClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or("No body".into());
        error!("QuizClient request failed: {} - {}", status, body);

        match serde_json::from_str::<ErrorResponse>(&body) {
            Ok(ErrorResponse {
                error: Some(message),
            }) if !message.trim().is_empty() => Err(QuizClientError::Rejected(status, message)),
            _ => Err(QuizClientError::Api(status, body)),
        }
    }
}

#[async_trait]
impl QuizApi for QuizClient {
    async fn join(&self, request: &JoinRequest) -> Result<JoinResponse, QuizClientError> {
        self.post_json("/api/student/join", request).await
    }

    async fn quiz_state(&self, quiz_id: &str) -> Result<QuizStateResponse, QuizClientError> {
        self.get_json(&format!("/api/student/quizzes/{}/state", quiz_id))
            .await
    }

    async fn current_question(
        &self,
        quiz_id: &str,
    ) -> Result<Option<QuestionPayload>, QuizClientError> {
        let url = self.url(&format!("/api/student/quizzes/{}/current-question", quiz_id));
        debug!("QuizClient GET {}", url);
        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("No current question for quiz {}", quiz_id);
            return Ok(None);
        }

        let response = Self::ensure_success(response).await?;
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(None);
        }

        let payload: Option<QuestionPayload> = serde_json::from_str(&body)?;
        Ok(payload.filter(|payload| !payload.is_empty()))
    }

    async fn submit_answer(
        &self,
        request: &AnswerRequest,
    ) -> Result<AnswerResponse, QuizClientError> {
        self.post_json("/api/student/answer", request).await
    }
}
