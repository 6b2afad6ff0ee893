//! Question lookup for the tutor

use super::QuestionContext;
use crate::store::StoreResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Source of practice questions (the content database in production)
#[async_trait]
pub trait QuestionSource: Send + Sync {
    async fn find_question(&self, question_id: &str) -> StoreResult<Option<QuestionContext>>;
}

/// In-memory question source
#[derive(Debug, Clone, Default)]
pub struct MemoryQuestionSource {
    questions: Arc<RwLock<HashMap<String, QuestionContext>>>,
}

impl MemoryQuestionSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_questions<I>(questions: I) -> Self
    where
        I: IntoIterator<Item = QuestionContext>,
    {
        let questions = questions
            .into_iter()
            .map(|q| (q.id.clone(), q))
            .collect();
        Self {
            questions: Arc::new(RwLock::new(questions)),
        }
    }

    pub async fn insert(&self, question: QuestionContext) {
        self.questions
            .write()
            .await
            .insert(question.id.clone(), question);
    }
}

#[async_trait]
impl QuestionSource for MemoryQuestionSource {
    async fn find_question(&self, question_id: &str) -> StoreResult<Option<QuestionContext>> {
        Ok(self.questions.read().await.get(question_id).cloned())
    }
}
