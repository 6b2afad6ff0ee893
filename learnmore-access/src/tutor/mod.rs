//! AI Tutor
//!
//! Explains a student's wrong answer with a generative-AI model. Each
//! explanation is a metered action: the caller's token is consumed right
//! before the completion request is issued.

pub mod prompt;
pub mod provider;
pub mod questions;
pub mod service;

pub use prompt::{build_tutor_prompt, QuestionContext, TUTOR_SYSTEM_INSTRUCTION};
pub use provider::{CompletionProvider, GeminiProvider};
pub use questions::{MemoryQuestionSource, QuestionSource};
pub use service::{TutorError, TutorReply, TutorRequest, TutorService};
