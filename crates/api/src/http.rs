use std::env;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response};
use serde::Serialize;

use practice_core::model::{
    AnswerPayload, DifficultyId, DifficultyLevel, HelpResponse, Question, QuestionId, SessionId,
    SessionRecord,
};

use crate::cancel::CancelToken;
use crate::contract::{PracticeApi, VoiceStream};
use crate::error::ApiError;

const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/v1";

/// Connection settings for the HTTP collaborator client.
#[derive(Clone, Debug)]
pub struct HttpConfig {
    pub base_url: String,
}

impl HttpConfig {
    /// Reads the base URL from `PRACTICE_API_BASE_URL`, falling back to the
    /// local development server.
    #[must_use]
    pub fn from_env() -> Self {
        let base_url =
            env::var("PRACTICE_API_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        Self { base_url }
    }
}

/// `reqwest`-backed implementation of [`PracticeApi`].
#[derive(Clone)]
pub struct HttpPracticeApi {
    client: Client,
    config: HttpConfig,
}

#[derive(Debug, Serialize)]
struct StartSessionRequest {
    difficulty_level_id: DifficultyId,
    total_questions: u32,
}

impl HttpPracticeApi {
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(HttpConfig::from_env())
    }

    #[must_use]
    pub fn new(config: HttpConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }

    async fn check(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(ApiError::from_status(status.as_u16(), message))
    }
}

#[async_trait]
impl PracticeApi for HttpPracticeApi {
    async fn difficulty_levels(&self) -> Result<Vec<DifficultyLevel>, ApiError> {
        let response = self
            .client
            .get(self.url("difficulty/levels"))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn start_session(
        &self,
        difficulty_id: DifficultyId,
        total_questions: u32,
    ) -> Result<SessionRecord, ApiError> {
        let response = self
            .client
            .post(self.url("practice/start"))
            .json(&StartSessionRequest {
                difficulty_level_id: difficulty_id,
                total_questions,
            })
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn next_question(&self, session_id: SessionId) -> Result<Question, ApiError> {
        let response = self
            .client
            .get(self.url("practice/question"))
            .query(&[("session_id", session_id.to_string())])
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn submit_answer(&self, payload: &AnswerPayload) -> Result<Question, ApiError> {
        let response = self
            .client
            .post(self.url("practice/answer"))
            .json(payload)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn summary(&self, session_id: SessionId) -> Result<SessionRecord, ApiError> {
        let response = self
            .client
            .get(self.url("practice/summary"))
            .query(&[("session_id", session_id.to_string())])
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn question_help(
        &self,
        session_id: SessionId,
        question_id: QuestionId,
        cancel: &CancelToken,
    ) -> Result<HelpResponse, ApiError> {
        let request = async {
            let response = self
                .client
                .get(self.url("practice/help"))
                .query(&[
                    ("session_id", session_id.to_string()),
                    ("question_id", question_id.to_string()),
                ])
                .send()
                .await?;
            Ok::<HelpResponse, ApiError>(Self::check(response).await?.json().await?)
        };

        tokio::select! {
            () = cancel.cancelled() => Err(ApiError::Cancelled),
            result = request => result,
        }
    }

    async fn voice_help_stream(
        &self,
        session_id: SessionId,
        question_id: QuestionId,
    ) -> Result<VoiceStream, ApiError> {
        let response = self
            .client
            .get(self.url("practice/voice-help"))
            .query(&[
                ("session_id", session_id.to_string()),
                ("question_id", question_id.to_string()),
            ])
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.bytes_stream().map(|chunk| chunk.map_err(ApiError::from)).boxed())
    }

    async fn voice_help_audio(
        &self,
        session_id: SessionId,
        question_id: QuestionId,
    ) -> Result<Vec<u8>, ApiError> {
        let response = self
            .client
            .get(self.url("practice/voice-help"))
            .query(&[
                ("session_id", session_id.to_string()),
                ("question_id", question_id.to_string()),
            ])
            .send()
            .await?;
        let bytes = Self::check(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}
