use crate::dto::content_dto::{
    CreateLessonRequest, CreateModuleRequest, CreateSubjectRequest, UpdateLessonRequest,
    UpdateModuleRequest, UpdateSubjectRequest,
};
use crate::error::{Error, Result};
use crate::models::lesson::Lesson;
use crate::models::module::Module;
use crate::models::subject::Subject;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct ContentService {
    pool: PgPool,
}

impl ContentService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_subject(&self, owner_id: Uuid, req: CreateSubjectRequest) -> Result<Subject> {
        let subject = sqlx::query_as::<_, Subject>(
            r#"
            INSERT INTO subjects (owner_id, title, description)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(owner_id)
        .bind(&req.title)
        .bind(&req.description)
        .fetch_one(&self.pool)
        .await?;

        Ok(subject)
    }

    pub async fn list_subjects(&self) -> Result<Vec<Subject>> {
        let subjects = sqlx::query_as::<_, Subject>(
            r#"SELECT * FROM subjects ORDER BY created_at ASC"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(subjects)
    }

    pub async fn get_subject(&self, subject_id: Uuid) -> Result<Subject> {
        let subject = sqlx::query_as::<_, Subject>(r#"SELECT * FROM subjects WHERE id = $1"#)
            .bind(subject_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Subject not found".to_string()))?;
        Ok(subject)
    }

    pub async fn update_subject(
        &self,
        subject_id: Uuid,
        teacher_id: Uuid,
        req: UpdateSubjectRequest,
    ) -> Result<Subject> {
        self.ensure_subject_owner(subject_id, teacher_id).await?;
        let subject = sqlx::query_as::<_, Subject>(
            r#"
            UPDATE subjects
            SET title = COALESCE($1, title),
                description = COALESCE($2, description),
                updated_at = NOW()
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(&req.title)
        .bind(&req.description)
        .bind(subject_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(subject)
    }

    pub async fn delete_subject(&self, subject_id: Uuid, teacher_id: Uuid) -> Result<()> {
        self.ensure_subject_owner(subject_id, teacher_id).await?;
        sqlx::query(r#"DELETE FROM subjects WHERE id = $1"#)
            .bind(subject_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn ensure_subject_owner(&self, subject_id: Uuid, teacher_id: Uuid) -> Result<()> {
        let subject = self.get_subject(subject_id).await?;
        if subject.owner_id != teacher_id {
            return Err(Error::Forbidden(
                "Only the owning teacher may modify this subject".to_string(),
            ));
        }
        Ok(())
    }

    pub async fn create_module(
        &self,
        subject_id: Uuid,
        teacher_id: Uuid,
        req: CreateModuleRequest,
    ) -> Result<Module> {
        self.ensure_subject_owner(subject_id, teacher_id).await?;
        // Dense order: next position is max(existing) + 1.
        let module = sqlx::query_as::<_, Module>(
            r#"
            INSERT INTO modules (subject_id, title, position)
            VALUES ($1, $2, (SELECT COALESCE(MAX(position), 0) + 1 FROM modules WHERE subject_id = $1))
            RETURNING *
            "#,
        )
        .bind(subject_id)
        .bind(&req.title)
        .fetch_one(&self.pool)
        .await?;
        Ok(module)
    }

    pub async fn list_modules(&self, subject_id: Uuid) -> Result<Vec<Module>> {
        self.get_subject(subject_id).await?;
        let modules = sqlx::query_as::<_, Module>(
            r#"SELECT * FROM modules WHERE subject_id = $1 ORDER BY position ASC"#,
        )
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(modules)
    }

    pub async fn update_module(
        &self,
        module_id: Uuid,
        teacher_id: Uuid,
        req: UpdateModuleRequest,
    ) -> Result<Module> {
        let subject_id = self.module_subject(module_id).await?;
        self.ensure_subject_owner(subject_id, teacher_id).await?;
        let module = sqlx::query_as::<_, Module>(
            r#"
            UPDATE modules
            SET title = COALESCE($1, title), updated_at = NOW()
            WHERE id = $2
            RETURNING *
            "#,
        )
        .bind(&req.title)
        .bind(module_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(module)
    }

    pub async fn delete_module(&self, module_id: Uuid, teacher_id: Uuid) -> Result<()> {
        let subject_id = self.module_subject(module_id).await?;
        self.ensure_subject_owner(subject_id, teacher_id).await?;
        sqlx::query(r#"DELETE FROM modules WHERE id = $1"#)
            .bind(module_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Bulk order overwrite: position becomes the index in the submitted list.
    pub async fn reorder_modules(
        &self,
        subject_id: Uuid,
        teacher_id: Uuid,
        ordered_ids: &[Uuid],
    ) -> Result<Vec<Module>> {
        self.ensure_subject_owner(subject_id, teacher_id).await?;
        let mut tx = self.pool.begin().await?;
        for (idx, module_id) in ordered_ids.iter().enumerate() {
            sqlx::query(
                r#"UPDATE modules SET position = $1, updated_at = NOW() WHERE id = $2 AND subject_id = $3"#,
            )
            .bind(idx as i32 + 1)
            .bind(module_id)
            .bind(subject_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        self.list_modules(subject_id).await
    }

    async fn module_subject(&self, module_id: Uuid) -> Result<Uuid> {
        let subject_id: Option<Uuid> =
            sqlx::query_scalar(r#"SELECT subject_id FROM modules WHERE id = $1"#)
                .bind(module_id)
                .fetch_optional(&self.pool)
                .await?;
        subject_id.ok_or_else(|| Error::NotFound("Module not found".to_string()))
    }

    pub async fn create_lesson(
        &self,
        module_id: Uuid,
        teacher_id: Uuid,
        req: CreateLessonRequest,
    ) -> Result<Lesson> {
        let subject_id = self.module_subject(module_id).await?;
        self.ensure_subject_owner(subject_id, teacher_id).await?;
        let lesson = sqlx::query_as::<_, Lesson>(
            r#"
            INSERT INTO lessons (module_id, teacher_id, title, content, position)
            VALUES ($1, $2, $3, $4, (SELECT COALESCE(MAX(position), 0) + 1 FROM lessons WHERE module_id = $1))
            RETURNING *
            "#,
        )
        .bind(module_id)
        .bind(teacher_id)
        .bind(&req.title)
        .bind(&req.content)
        .fetch_one(&self.pool)
        .await?;
        Ok(lesson)
    }

    pub async fn list_lessons(&self, module_id: Uuid) -> Result<Vec<Lesson>> {
        self.module_subject(module_id).await?;
        let lessons = sqlx::query_as::<_, Lesson>(
            r#"SELECT * FROM lessons WHERE module_id = $1 ORDER BY position ASC"#,
        )
        .bind(module_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(lessons)
    }

    pub async fn get_lesson(&self, lesson_id: Uuid) -> Result<Lesson> {
        let lesson = sqlx::query_as::<_, Lesson>(r#"SELECT * FROM lessons WHERE id = $1"#)
            .bind(lesson_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Lesson not found".to_string()))?;
        Ok(lesson)
    }

    pub async fn update_lesson(
        &self,
        lesson_id: Uuid,
        teacher_id: Uuid,
        req: UpdateLessonRequest,
    ) -> Result<Lesson> {
        self.ensure_lesson_teacher(lesson_id, teacher_id).await?;
        let lesson = sqlx::query_as::<_, Lesson>(
            r#"
            UPDATE lessons
            SET title = COALESCE($1, title),
                content = COALESCE($2, content),
                updated_at = NOW()
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(&req.title)
        .bind(&req.content)
        .bind(lesson_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(lesson)
    }

    pub async fn delete_lesson(&self, lesson_id: Uuid, teacher_id: Uuid) -> Result<()> {
        self.ensure_lesson_teacher(lesson_id, teacher_id).await?;
        sqlx::query(r#"DELETE FROM lessons WHERE id = $1"#)
            .bind(lesson_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn reorder_lessons(
        &self,
        module_id: Uuid,
        teacher_id: Uuid,
        ordered_ids: &[Uuid],
    ) -> Result<Vec<Lesson>> {
        let subject_id = self.module_subject(module_id).await?;
        self.ensure_subject_owner(subject_id, teacher_id).await?;
        let mut tx = self.pool.begin().await?;
        for (idx, lesson_id) in ordered_ids.iter().enumerate() {
            sqlx::query(
                r#"UPDATE lessons SET position = $1, updated_at = NOW() WHERE id = $2 AND module_id = $3"#,
            )
            .bind(idx as i32 + 1)
            .bind(lesson_id)
            .bind(module_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        self.list_lessons(module_id).await
    }

    /// A lesson is mutable by the teacher who owns it or by the subject owner.
    async fn ensure_lesson_teacher(&self, lesson_id: Uuid, teacher_id: Uuid) -> Result<()> {
        let lesson = self.get_lesson(lesson_id).await?;
        if lesson.teacher_id == teacher_id {
            return Ok(());
        }
        let subject_id = self.module_subject(lesson.module_id).await?;
        self.ensure_subject_owner(subject_id, teacher_id).await
    }
}
