use crate::dto::students_dto::{GroupStats, SubjectStats};
use crate::error::{Error, Result};
use crate::models::group::{StudentGroup, SubjectStudent};
use sqlx::PgPool;
use uuid::Uuid;

/// Deletion semantics for a group that still has members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupDeleteMode {
    /// Members keep their subject membership with a nulled group ref.
    Reassign,
    /// Members lose their subject membership entirely.
    Remove,
}

impl GroupDeleteMode {
    pub fn parse(raw: Option<&str>) -> Result<Self> {
        match raw {
            None | Some("reassign") => Ok(Self::Reassign),
            Some("remove") => Ok(Self::Remove),
            Some(other) => Err(Error::BadRequest(format!(
                "Unknown group delete mode: {}",
                other
            ))),
        }
    }
}

#[derive(Clone)]
pub struct StudentsService {
    pool: PgPool,
}

impl StudentsService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The acting teacher must own at least one lesson in the subject. This
    /// is a query re-evaluated on every mutation, not a cached permission.
    pub async fn ensure_teaches_subject(&self, subject_id: Uuid, teacher_id: Uuid) -> Result<()> {
        let teaches: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM lessons l
                JOIN modules m ON m.id = l.module_id
                WHERE m.subject_id = $1 AND l.teacher_id = $2
            )
            "#,
        )
        .bind(subject_id)
        .bind(teacher_id)
        .fetch_one(&self.pool)
        .await?;
        if !teaches {
            return Err(Error::Forbidden(
                "Teacher has no lessons in this subject".to_string(),
            ));
        }
        Ok(())
    }

    pub async fn add_student(
        &self,
        subject_id: Uuid,
        teacher_id: Uuid,
        student_id: Uuid,
    ) -> Result<SubjectStudent> {
        self.ensure_teaches_subject(subject_id, teacher_id).await?;
        let membership = sqlx::query_as::<_, SubjectStudent>(
            r#"
            INSERT INTO subject_students (subject_id, student_id)
            VALUES ($1, $2)
            ON CONFLICT (subject_id, student_id) DO UPDATE SET subject_id = EXCLUDED.subject_id
            RETURNING *
            "#,
        )
        .bind(subject_id)
        .bind(student_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(membership)
    }

    pub async fn remove_student(
        &self,
        subject_id: Uuid,
        teacher_id: Uuid,
        student_id: Uuid,
    ) -> Result<()> {
        self.ensure_teaches_subject(subject_id, teacher_id).await?;
        let result = sqlx::query(
            r#"DELETE FROM subject_students WHERE subject_id = $1 AND student_id = $2"#,
        )
        .bind(subject_id)
        .bind(student_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(
                "Student is not enrolled in this subject".to_string(),
            ));
        }
        Ok(())
    }

    pub async fn list_students(&self, subject_id: Uuid) -> Result<Vec<SubjectStudent>> {
        let students = sqlx::query_as::<_, SubjectStudent>(
            r#"SELECT * FROM subject_students WHERE subject_id = $1 ORDER BY created_at ASC"#,
        )
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(students)
    }

    pub async fn create_group(
        &self,
        subject_id: Uuid,
        teacher_id: Uuid,
        name: &str,
    ) -> Result<StudentGroup> {
        self.ensure_teaches_subject(subject_id, teacher_id).await?;
        let group = sqlx::query_as::<_, StudentGroup>(
            r#"
            INSERT INTO student_groups (subject_id, name)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(subject_id)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(group)
    }

    pub async fn rename_group(
        &self,
        group_id: Uuid,
        teacher_id: Uuid,
        name: &str,
    ) -> Result<StudentGroup> {
        let group = self.fetch_group(group_id).await?;
        self.ensure_teaches_subject(group.subject_id, teacher_id).await?;
        let group = sqlx::query_as::<_, StudentGroup>(
            r#"UPDATE student_groups SET name = $1 WHERE id = $2 RETURNING *"#,
        )
        .bind(name)
        .bind(group_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(group)
    }

    pub async fn list_groups(&self, subject_id: Uuid) -> Result<Vec<StudentGroup>> {
        let groups = sqlx::query_as::<_, StudentGroup>(
            r#"SELECT * FROM student_groups WHERE subject_id = $1 ORDER BY created_at ASC"#,
        )
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(groups)
    }

    pub async fn delete_group(
        &self,
        group_id: Uuid,
        teacher_id: Uuid,
        mode: GroupDeleteMode,
    ) -> Result<()> {
        let group = self.fetch_group(group_id).await?;
        self.ensure_teaches_subject(group.subject_id, teacher_id).await?;

        let mut tx = self.pool.begin().await?;
        match mode {
            GroupDeleteMode::Reassign => {
                sqlx::query(r#"UPDATE subject_students SET group_id = NULL WHERE group_id = $1"#)
                    .bind(group_id)
                    .execute(&mut *tx)
                    .await?;
            }
            GroupDeleteMode::Remove => {
                sqlx::query(r#"DELETE FROM subject_students WHERE group_id = $1"#)
                    .bind(group_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }
        sqlx::query(r#"DELETE FROM student_groups WHERE id = $1"#)
            .bind(group_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Assigning moves students already in another group of the subject.
    pub async fn assign_students(
        &self,
        group_id: Uuid,
        teacher_id: Uuid,
        student_ids: &[Uuid],
    ) -> Result<Vec<SubjectStudent>> {
        let group = self.fetch_group(group_id).await?;
        self.ensure_teaches_subject(group.subject_id, teacher_id).await?;
        let updated = sqlx::query_as::<_, SubjectStudent>(
            r#"
            UPDATE subject_students
            SET group_id = $1
            WHERE subject_id = $2 AND student_id = ANY($3)
            RETURNING *
            "#,
        )
        .bind(group_id)
        .bind(group.subject_id)
        .bind(student_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(updated)
    }

    pub async fn remove_from_group(
        &self,
        group_id: Uuid,
        teacher_id: Uuid,
        student_id: Uuid,
    ) -> Result<()> {
        let group = self.fetch_group(group_id).await?;
        self.ensure_teaches_subject(group.subject_id, teacher_id).await?;
        let result = sqlx::query(
            r#"UPDATE subject_students SET group_id = NULL WHERE group_id = $1 AND student_id = $2"#,
        )
        .bind(group_id)
        .bind(student_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(
                "Student is not in this group".to_string(),
            ));
        }
        Ok(())
    }

    /// Count rollups only; no score aggregation.
    pub async fn subject_stats(&self, subject_id: Uuid) -> Result<SubjectStats> {
        let (student_count, grouped_count): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COUNT(group_id)
            FROM subject_students
            WHERE subject_id = $1
            "#,
        )
        .bind(subject_id)
        .fetch_one(&self.pool)
        .await?;

        let group_count: i64 =
            sqlx::query_scalar(r#"SELECT COUNT(*) FROM student_groups WHERE subject_id = $1"#)
                .bind(subject_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(SubjectStats {
            student_count,
            group_count,
            grouped_count,
            ungrouped_count: student_count - grouped_count,
        })
    }

    pub async fn group_stats(&self, subject_id: Uuid) -> Result<Vec<GroupStats>> {
        let rows: Vec<(Uuid, String, i64)> = sqlx::query_as(
            r#"
            SELECT g.id, g.name, COUNT(ss.id)
            FROM student_groups g
            LEFT JOIN subject_students ss ON ss.group_id = g.id
            WHERE g.subject_id = $1
            GROUP BY g.id, g.name, g.created_at
            ORDER BY g.created_at ASC
            "#,
        )
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(group_id, name, student_count)| GroupStats {
                group_id,
                name,
                student_count,
            })
            .collect())
    }

    async fn fetch_group(&self, group_id: Uuid) -> Result<StudentGroup> {
        sqlx::query_as::<_, StudentGroup>(r#"SELECT * FROM student_groups WHERE id = $1"#)
            .bind(group_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Group not found".to_string()))
    }
}
