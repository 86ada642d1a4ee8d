use crate::dto::quiz_dto::{
    CreateOptionRequest, CreateQuestionRequest, CreateQuizRequest, UpdateOptionRequest,
    UpdateQuestionRequest, UpdateQuizRequest,
};
use crate::error::{Error, Result};
use crate::models::question::{Question, QuestionOption, QuestionWithOptions};
use crate::models::quiz::Quiz;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Clone)]
pub struct QuizService {
    pool: PgPool,
}

impl QuizService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_quiz(
        &self,
        lesson_id: Uuid,
        teacher_id: Uuid,
        req: CreateQuizRequest,
    ) -> Result<Quiz> {
        self.ensure_lesson_authority(lesson_id, teacher_id).await?;
        // Quizzes start unpublished.
        let quiz = sqlx::query_as::<_, Quiz>(
            r#"
            INSERT INTO quizzes (
                lesson_id, title, pass_threshold, max_attempts,
                shuffle_questions, shuffle_options, time_limit_minutes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(lesson_id)
        .bind(&req.title)
        .bind(req.pass_threshold)
        .bind(req.max_attempts)
        .bind(req.shuffle_questions.unwrap_or(false))
        .bind(req.shuffle_options.unwrap_or(false))
        .bind(req.time_limit_minutes)
        .fetch_one(&self.pool)
        .await?;
        Ok(quiz)
    }

    pub async fn list_quizzes(&self, lesson_id: Uuid) -> Result<Vec<Quiz>> {
        let quizzes = sqlx::query_as::<_, Quiz>(
            r#"SELECT * FROM quizzes WHERE lesson_id = $1 ORDER BY created_at ASC"#,
        )
        .bind(lesson_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(quizzes)
    }

    pub async fn get_quiz(&self, quiz_id: Uuid) -> Result<Quiz> {
        let quiz = sqlx::query_as::<_, Quiz>(r#"SELECT * FROM quizzes WHERE id = $1"#)
            .bind(quiz_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Quiz not found".to_string()))?;
        Ok(quiz)
    }

    pub async fn get_quiz_with_questions(&self, quiz_id: Uuid) -> Result<(Quiz, Vec<QuestionWithOptions>)> {
        let quiz = self.get_quiz(quiz_id).await?;
        let questions = self.load_questions(quiz_id).await?;
        Ok((quiz, questions))
    }

    pub async fn update_quiz(
        &self,
        quiz_id: Uuid,
        teacher_id: Uuid,
        req: UpdateQuizRequest,
    ) -> Result<Quiz> {
        self.ensure_quiz_authority(quiz_id, teacher_id).await?;
        let quiz = sqlx::query_as::<_, Quiz>(
            r#"
            UPDATE quizzes
            SET title = COALESCE($1, title),
                pass_threshold = COALESCE($2, pass_threshold),
                max_attempts = COALESCE($3, max_attempts),
                shuffle_questions = COALESCE($4, shuffle_questions),
                shuffle_options = COALESCE($5, shuffle_options),
                time_limit_minutes = COALESCE($6, time_limit_minutes),
                updated_at = NOW()
            WHERE id = $7
            RETURNING *
            "#,
        )
        .bind(&req.title)
        .bind(req.pass_threshold)
        .bind(req.max_attempts)
        .bind(req.shuffle_questions)
        .bind(req.shuffle_options)
        .bind(req.time_limit_minutes)
        .bind(quiz_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(quiz)
    }

    pub async fn set_published(&self, quiz_id: Uuid, teacher_id: Uuid, published: bool) -> Result<Quiz> {
        self.ensure_quiz_authority(quiz_id, teacher_id).await?;
        let quiz = sqlx::query_as::<_, Quiz>(
            r#"UPDATE quizzes SET published = $1, updated_at = NOW() WHERE id = $2 RETURNING *"#,
        )
        .bind(published)
        .bind(quiz_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(quiz)
    }

    pub async fn delete_quiz(&self, quiz_id: Uuid, teacher_id: Uuid) -> Result<()> {
        self.ensure_quiz_authority(quiz_id, teacher_id).await?;
        sqlx::query(r#"DELETE FROM quizzes WHERE id = $1"#)
            .bind(quiz_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn create_question(
        &self,
        quiz_id: Uuid,
        teacher_id: Uuid,
        req: CreateQuestionRequest,
    ) -> Result<Question> {
        self.ensure_quiz_authority(quiz_id, teacher_id).await?;
        let question = sqlx::query_as::<_, Question>(
            r#"
            INSERT INTO questions (quiz_id, question_type, text, position, required)
            VALUES ($1, $2, $3, (SELECT COALESCE(MAX(position), 0) + 1 FROM questions WHERE quiz_id = $1), $4)
            RETURNING *
            "#,
        )
        .bind(quiz_id)
        .bind(req.question_type)
        .bind(&req.text)
        .bind(req.required.unwrap_or(true))
        .fetch_one(&self.pool)
        .await?;
        Ok(question)
    }

    pub async fn update_question(
        &self,
        question_id: Uuid,
        teacher_id: Uuid,
        req: UpdateQuestionRequest,
    ) -> Result<Question> {
        let quiz_id = self.question_quiz(question_id).await?;
        self.ensure_quiz_authority(quiz_id, teacher_id).await?;
        let question = sqlx::query_as::<_, Question>(
            r#"
            UPDATE questions
            SET text = COALESCE($1, text), required = COALESCE($2, required)
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(&req.text)
        .bind(req.required)
        .bind(question_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(question)
    }

    pub async fn delete_question(&self, question_id: Uuid, teacher_id: Uuid) -> Result<()> {
        let quiz_id = self.question_quiz(question_id).await?;
        self.ensure_quiz_authority(quiz_id, teacher_id).await?;
        sqlx::query(r#"DELETE FROM questions WHERE id = $1"#)
            .bind(question_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn reorder_questions(
        &self,
        quiz_id: Uuid,
        teacher_id: Uuid,
        ordered_ids: &[Uuid],
    ) -> Result<Vec<QuestionWithOptions>> {
        self.ensure_quiz_authority(quiz_id, teacher_id).await?;
        let mut tx = self.pool.begin().await?;
        for (idx, question_id) in ordered_ids.iter().enumerate() {
            sqlx::query(r#"UPDATE questions SET position = $1 WHERE id = $2 AND quiz_id = $3"#)
                .bind(idx as i32 + 1)
                .bind(question_id)
                .bind(quiz_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        self.load_questions(quiz_id).await
    }

    pub async fn create_option(
        &self,
        question_id: Uuid,
        teacher_id: Uuid,
        req: CreateOptionRequest,
    ) -> Result<QuestionOption> {
        let quiz_id = self.question_quiz(question_id).await?;
        self.ensure_quiz_authority(quiz_id, teacher_id).await?;
        let option = sqlx::query_as::<_, QuestionOption>(
            r#"
            INSERT INTO question_options (question_id, text, is_correct, position)
            VALUES ($1, $2, $3, (SELECT COALESCE(MAX(position), 0) + 1 FROM question_options WHERE question_id = $1))
            RETURNING *
            "#,
        )
        .bind(question_id)
        .bind(&req.text)
        .bind(req.is_correct.unwrap_or(false))
        .fetch_one(&self.pool)
        .await?;
        Ok(option)
    }

    pub async fn update_option(
        &self,
        option_id: Uuid,
        teacher_id: Uuid,
        req: UpdateOptionRequest,
    ) -> Result<QuestionOption> {
        let question_id = self.option_question(option_id).await?;
        let quiz_id = self.question_quiz(question_id).await?;
        self.ensure_quiz_authority(quiz_id, teacher_id).await?;
        let option = sqlx::query_as::<_, QuestionOption>(
            r#"
            UPDATE question_options
            SET text = COALESCE($1, text), is_correct = COALESCE($2, is_correct)
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(&req.text)
        .bind(req.is_correct)
        .bind(option_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(option)
    }

    pub async fn delete_option(&self, option_id: Uuid, teacher_id: Uuid) -> Result<()> {
        let question_id = self.option_question(option_id).await?;
        let quiz_id = self.question_quiz(question_id).await?;
        self.ensure_quiz_authority(quiz_id, teacher_id).await?;
        sqlx::query(r#"DELETE FROM question_options WHERE id = $1"#)
            .bind(option_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn reorder_options(
        &self,
        question_id: Uuid,
        teacher_id: Uuid,
        ordered_ids: &[Uuid],
    ) -> Result<Vec<QuestionOption>> {
        let quiz_id = self.question_quiz(question_id).await?;
        self.ensure_quiz_authority(quiz_id, teacher_id).await?;
        let mut tx = self.pool.begin().await?;
        for (idx, option_id) in ordered_ids.iter().enumerate() {
            sqlx::query(
                r#"UPDATE question_options SET position = $1 WHERE id = $2 AND question_id = $3"#,
            )
            .bind(idx as i32 + 1)
            .bind(option_id)
            .bind(question_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        let options = sqlx::query_as::<_, QuestionOption>(
            r#"SELECT * FROM question_options WHERE question_id = $1 ORDER BY position ASC"#,
        )
        .bind(question_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(options)
    }

    pub async fn load_questions(&self, quiz_id: Uuid) -> Result<Vec<QuestionWithOptions>> {
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

    async fn question_quiz(&self, question_id: Uuid) -> Result<Uuid> {
        let quiz_id: Option<Uuid> =
            sqlx::query_scalar(r#"SELECT quiz_id FROM questions WHERE id = $1"#)
                .bind(question_id)
                .fetch_optional(&self.pool)
                .await?;
        quiz_id.ok_or_else(|| Error::NotFound("Question not found".to_string()))
    }

    async fn option_question(&self, option_id: Uuid) -> Result<Uuid> {
        let question_id: Option<Uuid> =
            sqlx::query_scalar(r#"SELECT question_id FROM question_options WHERE id = $1"#)
                .bind(option_id)
                .fetch_optional(&self.pool)
                .await?;
        question_id.ok_or_else(|| Error::NotFound("Option not found".to_string()))
    }

    /// Mutation and result-viewing rights: the lesson's teacher or the
    /// subject owner.
    pub async fn ensure_quiz_authority(&self, quiz_id: Uuid, teacher_id: Uuid) -> Result<()> {
        let lesson_id: Option<Uuid> =
            sqlx::query_scalar(r#"SELECT lesson_id FROM quizzes WHERE id = $1"#)
                .bind(quiz_id)
                .fetch_optional(&self.pool)
                .await?;
        let lesson_id = lesson_id.ok_or_else(|| Error::NotFound("Quiz not found".to_string()))?;
        self.ensure_lesson_authority(lesson_id, teacher_id).await
    }

    async fn ensure_lesson_authority(&self, lesson_id: Uuid, teacher_id: Uuid) -> Result<()> {
        let allowed: Option<bool> = sqlx::query_scalar(
            r#"
            SELECT (l.teacher_id = $2 OR s.owner_id = $2)
            FROM lessons l
            JOIN modules m ON m.id = l.module_id
            JOIN subjects s ON s.id = m.subject_id
            WHERE l.id = $1
            "#,
        )
        .bind(lesson_id)
        .bind(teacher_id)
        .fetch_optional(&self.pool)
        .await?;

        match allowed {
            None => Err(Error::NotFound("Lesson not found".to_string())),
            Some(false) => Err(Error::Forbidden(
                "Only the owning teacher may modify this quiz".to_string(),
            )),
            Some(true) => Ok(()),
        }
    }
}
