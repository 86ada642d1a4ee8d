use crate::models::question::QuestionType;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(range(min = 0, max = 100))]
    pub pass_threshold: i32,
    #[validate(range(min = 1))]
    pub max_attempts: Option<i32>,
    pub shuffle_questions: Option<bool>,
    pub shuffle_options: Option<bool>,
    #[validate(range(min = 1))]
    pub time_limit_minutes: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuizRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    #[validate(range(min = 0, max = 100))]
    pub pass_threshold: Option<i32>,
    #[validate(range(min = 1))]
    pub max_attempts: Option<i32>,
    pub shuffle_questions: Option<bool>,
    pub shuffle_options: Option<bool>,
    #[validate(range(min = 1))]
    pub time_limit_minutes: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    pub question_type: QuestionType,
    #[validate(length(min = 1))]
    pub text: String,
    pub required: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuestionRequest {
    #[validate(length(min = 1))]
    pub text: Option<String>,
    pub required: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOptionRequest {
    #[validate(length(min = 1))]
    pub text: String,
    pub is_correct: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateOptionRequest {
    #[validate(length(min = 1))]
    pub text: Option<String>,
    pub is_correct: Option<bool>,
}

/// Raw submission: question id to whatever the client sent for it. The
/// shape depends on the question type and is interpreted by the grader.
#[derive(Debug, Deserialize)]
pub struct SubmitAttemptRequest {
    pub answers: HashMap<Uuid, JsonValue>,
}
