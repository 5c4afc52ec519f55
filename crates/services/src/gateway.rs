use std::env;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use learncheck_core::model::{OptionId, Question, QuestionId, QuestionOption, TutorialId, UserId, UserPreferences};

use crate::error::GatewayError;

//
// ─── WIRE SHAPES ───────────────────────────────────────────────────────────────
//

/// Descriptive metadata delivered with a quiz fetch.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizMetadata {
    #[serde(default)]
    pub module_title: Option<String>,
    #[serde(default)]
    pub context_text: Option<String>,
}

/// Everything a quiz fetch returns: the question bank, metadata, and the
/// student's presentation preferences.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizPayload {
    pub questions: Vec<Question>,
    #[serde(default)]
    pub metadata: QuizMetadata,
    #[serde(default)]
    pub user_preferences: UserPreferences,
}

/// Inputs for AI hint generation: enough context for the backend to explain
/// why the submitted answer missed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HintRequest {
    pub tutorial_id: TutorialId,
    pub question_id: QuestionId,
    pub question: String,
    pub context_text: String,
    pub student_answer: Vec<OptionId>,
    pub options: Vec<QuestionOption>,
}

#[derive(Debug, Deserialize)]
struct HintResponse {
    hint: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResetQuestionResponse {
    questions: Vec<Question>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResetQuestionRequest<'a> {
    user_id: &'a UserId,
    question_index: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResetAllRequest<'a> {
    user_id: &'a UserId,
}

//
// ─── GATEWAY CONTRACT ──────────────────────────────────────────────────────────
//

/// Boundary to the quiz backend: fetch, hint generation, and resets.
///
/// All four operations are remote and may fail; the controller decides which
/// failures are fatal and which degrade silently.
#[async_trait]
pub trait QuizGateway: Send + Sync {
    /// Fetch the question bank, metadata, and preferences for a tutorial.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` when the backend is unreachable or rejects the
    /// request.
    async fn fetch_quiz_data(
        &self,
        tutorial_id: &TutorialId,
        user_id: &UserId,
    ) -> Result<QuizPayload, GatewayError>;

    /// Generate a hint for an incorrectly answered question.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` on transport failure or an empty response.
    async fn generate_hint(&self, request: &HintRequest) -> Result<String, GatewayError>;

    /// Regenerate the question at `question_index`, returning its replacement.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` on transport failure or when the backend sends
    /// no replacement question.
    async fn reset_single_question(
        &self,
        tutorial_id: &TutorialId,
        user_id: &UserId,
        question_index: usize,
    ) -> Result<Question, GatewayError>;

    /// Reset the whole question bank server-side.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` when the backend is unreachable or rejects the
    /// request.
    async fn reset_all_questions(
        &self,
        tutorial_id: &TutorialId,
        user_id: &UserId,
    ) -> Result<(), GatewayError>;
}

//
// ─── HTTP ADAPTER ──────────────────────────────────────────────────────────────
//

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl GatewayConfig {
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("LEARNCHECK_API_BASE_URL").ok()?;
        if base_url.trim().is_empty() {
            return None;
        }
        let api_key = env::var("LEARNCHECK_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());
        Some(Self { base_url, api_key })
    }
}

/// `reqwest`-backed [`QuizGateway`].
#[derive(Clone)]
pub struct HttpQuizGateway {
    client: Client,
    config: Option<GatewayConfig>,
}

impl HttpQuizGateway {
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(GatewayConfig::from_env())
    }

    #[must_use]
    pub fn new(config: Option<GatewayConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }

    fn config(&self) -> Result<&GatewayConfig, GatewayError> {
        self.config.as_ref().ok_or(GatewayError::Disabled)
    }

    fn endpoint(config: &GatewayConfig, path: &str) -> String {
        format!("{}/{}", config.base_url.trim_end_matches('/'), path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.config.as_ref().and_then(|c| c.api_key.as_ref()) {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[async_trait]
impl QuizGateway for HttpQuizGateway {
    async fn fetch_quiz_data(
        &self,
        tutorial_id: &TutorialId,
        user_id: &UserId,
    ) -> Result<QuizPayload, GatewayError> {
        let config = self.config()?;
        let url = Self::endpoint(config, &format!("tutorials/{tutorial_id}/quiz"));

        let response = self
            .authorize(self.client.get(url))
            .query(&[("userId", user_id.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GatewayError::HttpStatus(response.status()));
        }

        Ok(response.json().await?)
    }

    async fn generate_hint(&self, request: &HintRequest) -> Result<String, GatewayError> {
        let config = self.config()?;
        let url = Self::endpoint(config, "hints");

        let response = self
            .authorize(self.client.post(url))
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GatewayError::HttpStatus(response.status()));
        }

        let body: HintResponse = response.json().await?;
        let hint = body
            .hint
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(GatewayError::EmptyPayload)?;

        Ok(hint)
    }

    async fn reset_single_question(
        &self,
        tutorial_id: &TutorialId,
        user_id: &UserId,
        question_index: usize,
    ) -> Result<Question, GatewayError> {
        let config = self.config()?;
        let url = Self::endpoint(config, &format!("tutorials/{tutorial_id}/questions/reset"));

        let response = self
            .authorize(self.client.post(url))
            .json(&ResetQuestionRequest {
                user_id,
                question_index,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GatewayError::HttpStatus(response.status()));
        }

        let body: ResetQuestionResponse = response.json().await?;
        body.questions
            .into_iter()
            .next()
            .ok_or(GatewayError::EmptyPayload)
    }

    async fn reset_all_questions(
        &self,
        tutorial_id: &TutorialId,
        user_id: &UserId,
    ) -> Result<(), GatewayError> {
        let config = self.config()?;
        let url = Self::endpoint(config, &format!("tutorials/{tutorial_id}/reset"));

        let response = self
            .authorize(self.client.post(url))
            .json(&ResetAllRequest { user_id })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GatewayError::HttpStatus(response.status()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiz_payload_parses_backend_json() {
        let json = r#"{
            "questions": [{
                "id": "q1",
                "question": "Pick one",
                "options": [
                    {"id": "a", "text": "A", "is_correct": true},
                    {"id": "b", "text": "B", "is_correct": false}
                ],
                "feedback": "because",
                "pre_hint": "look closer"
            }],
            "metadata": {"moduleTitle": "Intro", "contextText": "Lesson text"},
            "userPreferences": {"theme": "dark"}
        }"#;

        let payload: QuizPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.questions.len(), 1);
        assert_eq!(payload.metadata.module_title.as_deref(), Some("Intro"));
        assert_eq!(payload.user_preferences.theme(), Some("dark"));
    }

    #[test]
    fn quiz_payload_tolerates_missing_metadata_and_prefs() {
        let json = r#"{"questions": []}"#;
        let payload: QuizPayload = serde_json::from_str(json).unwrap();
        assert!(payload.questions.is_empty());
        assert!(payload.metadata.module_title.is_none());
        assert_eq!(payload.user_preferences.theme(), None);
    }

    #[test]
    fn hint_request_serializes_camel_case() {
        let request = HintRequest {
            tutorial_id: TutorialId::new("t1"),
            question_id: QuestionId::new("q1"),
            question: "Pick one".into(),
            context_text: "Lesson".into(),
            student_answer: vec![OptionId::new("b")],
            options: Vec::new(),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["tutorialId"], "t1");
        assert_eq!(json["questionId"], "q1");
        assert_eq!(json["contextText"], "Lesson");
        assert_eq!(json["studentAnswer"][0], "b");
    }

    #[test]
    fn unconfigured_gateway_is_disabled() {
        let gateway = HttpQuizGateway::new(None);
        assert!(!gateway.enabled());
    }

    #[test]
    fn endpoint_join_strips_trailing_slash() {
        let config = GatewayConfig {
            base_url: "https://api.example.test/v1/".into(),
            api_key: None,
        };
        assert_eq!(
            HttpQuizGateway::endpoint(&config, "hints"),
            "https://api.example.test/v1/hints"
        );
    }
}
