use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateGroupRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateGroupRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct AddStudentRequest {
    pub student_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct AssignStudentsRequest {
    pub student_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteGroupQuery {
    /// "reassign" (default) nulls members' group ref; "remove" drops their
    /// subject membership entirely.
    pub mode: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubjectStats {
    pub student_count: i64,
    pub group_count: i64,
    pub grouped_count: i64,
    pub ungrouped_count: i64,
}

#[derive(Debug, Serialize)]
pub struct GroupStats {
    pub group_id: Uuid,
    pub name: String,
    pub student_count: i64,
}
