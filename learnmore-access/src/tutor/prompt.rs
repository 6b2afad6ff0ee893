//! Tutor prompt construction

use serde::{Deserialize, Serialize};

/// System instruction for the Socratic tutor
pub const TUTOR_SYSTEM_INSTRUCTION: &str = "\
You are a Socratic AI Tutor for high school students.
Your goal is to help the student understand *why* they made a mistake, not just give the answer.
1. Be encouraging but concise.
2. Identify the likely misconception based on their wrong answer.
3. Guide them to the correct answer using a hint or a question.
4. Use LaTeX for math formulas (wrapped in $...$).
5. Do NOT just say \"The answer is B\". Explain the logic.
";

/// Everything the tutor needs to know about a practice question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionContext {
    pub id: String,
    pub subject: String,
    /// Chapter title the question belongs to
    pub topic: String,
    /// 1 (easy) to 5 (hard)
    pub difficulty: u8,
    pub content: String,
    pub correct_answer: serde_json::Value,
    #[serde(default)]
    pub explanation: Option<String>,
}

/// Build the user prompt explaining a wrong answer to `question`
pub fn build_tutor_prompt(question: &QuestionContext, wrong_answer: &serde_json::Value) -> String {
    let explanation = question
        .explanation
        .as_deref()
        .filter(|text| !text.trim().is_empty())
        .unwrap_or("None provided");

    format!(
        "Subject: {subject}\n\
         Topic: {topic}\n\
         Question Difficulty: {difficulty}/5\n\
         \n\
         Question Content:\n\
         {content}\n\
         \n\
         Correct Answer: {correct}\n\
         Explanation (for reference): {explanation}\n\
         \n\
         Student's Wrong Answer: {wrong}\n\
         \n\
         Please explain to the student why their answer might be wrong and guide them to the correct reasoning.\n",
        subject = question.subject,
        topic = question.topic,
        difficulty = question.difficulty,
        content = question.content,
        correct = question.correct_answer,
        explanation = explanation,
        wrong = wrong_answer,
    )
}
