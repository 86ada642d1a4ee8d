use crate::dto::quiz_dto::SubmitAttemptRequest;
use crate::error::{is_unique_violation, Error, Result};
use crate::models::attempt::{AttemptAnswer, QuizAttempt};
use crate::models::question::{Question, QuestionOption, QuestionType, QuestionWithOptions};
use crate::models::quiz::Quiz;
use crate::services::grading::{GradingService, QuizReport};
use serde::Serialize;
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct SubmissionResult {
    pub attempt: QuizAttempt,
    #[serde(flatten)]
    pub report: QuizReport,
}

#[derive(Debug, Serialize)]
pub struct AttemptWithAnswers {
    #[serde(flatten)]
    pub attempt: QuizAttempt,
    pub answers: Vec<AttemptAnswer>,
}

#[derive(Clone)]
pub struct AttemptService {
    pool: PgPool,
}

impl AttemptService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Records one submission. Grading runs over data fetched up front; the
    /// try-index computation, the attempt row and every answer row all land
    /// in a single transaction, so an attempt can never be persisted with
    /// fewer answers than the quiz had questions. The unique
    /// (quiz_id, user_id, try_index) index turns a concurrent duplicate into
    /// a conflict instead of a second attempt with the same index.
    pub async fn submit(
        &self,
        quiz_id: Uuid,
        user_id: Uuid,
        req: SubmitAttemptRequest,
    ) -> Result<SubmissionResult> {
        let quiz = self.fetch_quiz(quiz_id).await?;
        if !quiz.published {
            return Err(Error::Forbidden(
                "Quiz is not published yet".to_string(),
            ));
        }

        let questions = self.fetch_questions(quiz_id).await?;
        let report = GradingService::check_quiz(&questions, &req.answers, quiz.pass_threshold)?;

        let mut tx = self.pool.begin().await?;

        let prior: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM quiz_attempts WHERE quiz_id = $1 AND user_id = $2"#,
        )
        .bind(quiz_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(max) = quiz.max_attempts {
            if prior >= i64::from(max) {
                return Err(Error::BadRequest(format!(
                    "Maximum of {} attempts reached for this quiz",
                    max
                )));
            }
        }

        let attempt = sqlx::query_as::<_, QuizAttempt>(
            r#"
            INSERT INTO quiz_attempts (quiz_id, user_id, try_index, score, percent, passed)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(quiz_id)
        .bind(user_id)
        .bind(prior as i32 + 1)
        .bind(report.score)
        .bind(report.percent)
        .bind(report.passed)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::Conflict("A concurrent submission was recorded first; retry".to_string())
            } else {
                e.into()
            }
        })?;

        let correctness: HashMap<Uuid, bool> = report
            .details
            .iter()
            .map(|d| (d.question_id, d.correct))
            .collect();

        // One answer row per question in the quiz at submission time.
        for q in &questions {
            let submitted = req.answers.get(&q.question.id);
            let (selected_option_id, selected_option_ids, text_value) =
                split_answer(q.question.question_type, submitted);

            sqlx::query(
                r#"
                INSERT INTO attempt_answers (
                    attempt_id, question_id, selected_option_id,
                    selected_option_ids, text_value, is_correct
                )
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(attempt.id)
            .bind(q.question.id)
            .bind(selected_option_id)
            .bind(selected_option_ids)
            .bind(text_value)
            .bind(correctness.get(&q.question.id).copied().unwrap_or(false))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(SubmissionResult { attempt, report })
    }

    pub async fn list_for_quiz(&self, quiz_id: Uuid) -> Result<Vec<QuizAttempt>> {
        self.fetch_quiz(quiz_id).await?;
        let attempts = sqlx::query_as::<_, QuizAttempt>(
            r#"SELECT * FROM quiz_attempts WHERE quiz_id = $1 ORDER BY submitted_at DESC"#,
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(attempts)
    }

    pub async fn list_for_user(&self, quiz_id: Uuid, user_id: Uuid) -> Result<Vec<QuizAttempt>> {
        self.fetch_quiz(quiz_id).await?;
        let attempts = sqlx::query_as::<_, QuizAttempt>(
            r#"
            SELECT * FROM quiz_attempts
            WHERE quiz_id = $1 AND user_id = $2
            ORDER BY try_index ASC
            "#,
        )
        .bind(quiz_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(attempts)
    }

    /// Attempt detail is visible to its owner and to any teacher with
    /// authority over the quiz's lesson.
    pub async fn get_attempt(&self, attempt_id: Uuid, viewer_id: Uuid) -> Result<AttemptWithAnswers> {
        let attempt = sqlx::query_as::<_, QuizAttempt>(
            r#"SELECT * FROM quiz_attempts WHERE id = $1"#,
        )
        .bind(attempt_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Attempt not found".to_string()))?;

        if attempt.user_id != viewer_id {
            let allowed: Option<bool> = sqlx::query_scalar(
                r#"
                SELECT (l.teacher_id = $2 OR s.owner_id = $2)
                FROM quizzes qz
                JOIN lessons l ON l.id = qz.lesson_id
                JOIN modules m ON m.id = l.module_id
                JOIN subjects s ON s.id = m.subject_id
                WHERE qz.id = $1
                "#,
            )
            .bind(attempt.quiz_id)
            .bind(viewer_id)
            .fetch_optional(&self.pool)
            .await?;
            if !allowed.unwrap_or(false) {
                return Err(Error::Forbidden(
                    "Attempt belongs to another user".to_string(),
                ));
            }
        }

        let answers = sqlx::query_as::<_, AttemptAnswer>(
            r#"
            SELECT a.* FROM attempt_answers a
            JOIN questions q ON q.id = a.question_id
            WHERE a.attempt_id = $1
            ORDER BY q.position ASC
            "#,
        )
        .bind(attempt.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(AttemptWithAnswers { attempt, answers })
    }

    async fn fetch_quiz(&self, quiz_id: Uuid) -> Result<Quiz> {
        sqlx::query_as::<_, Quiz>(r#"SELECT * FROM quizzes WHERE id = $1"#)
            .bind(quiz_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Quiz not found".to_string()))
    }

    async fn fetch_questions(&self, quiz_id: Uuid) -> Result<Vec<QuestionWithOptions>> {
        let questions = sqlx::query_as::<_, Question>(
            r#"SELECT * FROM questions WHERE quiz_id = $1 ORDER BY position ASC"#,
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;

        let options = sqlx::query_as::<_, QuestionOption>(
            r#"
            SELECT o.* FROM question_options o
            JOIN questions q ON q.id = o.question_id
            WHERE q.quiz_id = $1
            ORDER BY o.position ASC
            "#,
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;

        let mut by_question: HashMap<Uuid, Vec<QuestionOption>> = HashMap::new();
        for option in options {
            by_question.entry(option.question_id).or_default().push(option);
        }

        Ok(questions
            .into_iter()
            .map(|question| {
                let options = by_question.remove(&question.id).unwrap_or_default();
                QuestionWithOptions { question, options }
            })
            .collect())
    }
}

/// Splits the raw submitted value into the storage column matching the
/// question type; the other two stay NULL.
fn split_answer(
    question_type: QuestionType,
    submitted: Option<&JsonValue>,
) -> (Option<Uuid>, Option<Vec<Uuid>>, Option<String>) {
    let Some(value) = submitted else {
        return (None, None, None);
    };
    match question_type {
        QuestionType::SingleChoice | QuestionType::Dropdown => (
            value.as_str().and_then(|s| Uuid::parse_str(s).ok()),
            None,
            None,
        ),
        QuestionType::MultiChoice => {
            let ids = value.as_array().map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().and_then(|s| Uuid::parse_str(s).ok()))
                    .collect::<Vec<_>>()
            });
            (None, ids, None)
        }
        QuestionType::ShortText => (None, None, value.as_str().map(|s| s.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn split_answer_routes_by_question_type() {
        let id = Uuid::new_v4();
        let single = json!(id.to_string());
        let (sel, multi, text) = split_answer(QuestionType::SingleChoice, Some(&single));
        assert_eq!(sel, Some(id));
        assert!(multi.is_none() && text.is_none());

        let ids = json!([id.to_string()]);
        let (sel, multi, text) = split_answer(QuestionType::MultiChoice, Some(&ids));
        assert!(sel.is_none() && text.is_none());
        assert_eq!(multi, Some(vec![id]));

        let (sel, multi, text) = split_answer(QuestionType::ShortText, Some(&json!("paris")));
        assert!(sel.is_none() && multi.is_none());
        assert_eq!(text.as_deref(), Some("paris"));

        let (sel, multi, text) = split_answer(QuestionType::Dropdown, None);
        assert!(sel.is_none() && multi.is_none() && text.is_none());
    }
}
