//! The metered AI tutor action

use super::{build_tutor_prompt, CompletionProvider, QuestionSource, TUTOR_SYSTEM_INSTRUCTION};
use crate::metering::{DenialReason, Remaining, TokenCheckResult, TokenMeter};
use crate::store::StoreError;
use learnmore_core::{performance, LearnMoreError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// A student's request for an explanation of a wrong answer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TutorRequest {
    pub question_id: String,
    #[serde(default)]
    pub wrong_answer: serde_json::Value,
}

/// Tutor explanation plus the caller's remaining balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TutorReply {
    pub explanation: String,
    pub remaining: Remaining,
}

#[derive(Debug, Error)]
pub enum TutorError {
    #[error("Missing questionId")]
    MissingQuestionId,

    #[error("Question not found: {question_id}")]
    QuestionNotFound { question_id: String },

    #[error("{0}")]
    Denied(DenialReason),

    #[error("Storage failure: {0}")]
    Store(#[from] StoreError),

    #[error("AI provider failure: {0}")]
    Provider(#[source] LearnMoreError),
}

impl TutorError {
    /// HTTP status a request handler should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            TutorError::MissingQuestionId => 400,
            TutorError::QuestionNotFound { .. } => 404,
            TutorError::Denied(DenialReason::Unauthorized) => 401,
            TutorError::Denied(DenialReason::InsufficientTokens) => 403,
            TutorError::Store(_) => 500,
            TutorError::Provider(_) => 502,
        }
    }
}

/// Explains wrong answers, charging one AI token per explanation
pub struct TutorService {
    meter: TokenMeter,
    questions: Arc<dyn QuestionSource>,
    provider: Arc<dyn CompletionProvider>,
}

impl TutorService {
    pub fn new(
        meter: TokenMeter,
        questions: Arc<dyn QuestionSource>,
        provider: Arc<dyn CompletionProvider>,
    ) -> Self {
        Self {
            meter,
            questions,
            provider,
        }
    }

    /// Explain why `request.wrong_answer` is wrong.
    ///
    /// The question is looked up before metering so a bad id costs nothing.
    /// Once the token is consumed it stays consumed, even if the provider
    /// call fails afterwards.
    pub async fn explain(
        &self,
        user_id: Option<&str>,
        request: &TutorRequest,
    ) -> Result<TutorReply, TutorError> {
        let question_id = request.question_id.trim();
        if question_id.is_empty() {
            return Err(TutorError::MissingQuestionId);
        }

        let question = self
            .questions
            .find_question(question_id)
            .await?
            .ok_or_else(|| TutorError::QuestionNotFound {
                question_id: question_id.to_string(),
            })?;

        let remaining = match self.meter.consume_token(user_id).await? {
            TokenCheckResult::Granted { remaining } => remaining,
            TokenCheckResult::Denied { reason } => {
                info!(question_id = question_id, reason = %reason, "Tutor request denied");
                return Err(TutorError::Denied(reason));
            }
        };

        let prompt = build_tutor_prompt(&question, &request.wrong_answer);
        debug!(
            question_id = question_id,
            provider = self.provider.name(),
            prompt_chars = prompt.len(),
            "Requesting tutor explanation"
        );

        let explanation = performance::measure_async(
            "tutor_completion",
            self.provider.complete(TUTOR_SYSTEM_INSTRUCTION, &prompt),
        )
        .await
        .map_err(|e| {
            e.log();
            TutorError::Provider(e)
        })?;

        Ok(TutorReply {
            explanation,
            remaining,
        })
    }
}
