use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StudentGroup {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SubjectStudent {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub student_id: Uuid,
    pub group_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
