use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Supervisor,
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Student => write!(f, "student"),
            Role::Supervisor => write!(f, "supervisor"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub supervisor_id: Option<String>,
    /// Populated for supervisors only
    #[serde(default)]
    pub assigned_students: Vec<String>,
}

/// Returned by `POST /token` together with the bearer token
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub user: User,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Thesis {
    pub id: String,
    pub student_id: String,
    pub filename: String,
    // The server emits naive ISO timestamps without an offset
    pub upload_date: NaiveDateTime,
    pub status: ThesisStatus,
    #[serde(default)]
    pub student_name: Option<String>,
    #[serde(default)]
    pub ai_feedback_id: Option<String>,
    #[serde(default)]
    pub supervisor_feedback_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ThesisStatus {
    Pending,
    ReviewedByAi,
    ReviewedBySupervisor,
    Approved,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UploadAck {
    pub message: String,
    pub thesis_id: String,
    pub filename: String,
    pub status: ThesisStatus,
}

/// One selectable analysis aspect offered by `GET /feedback-options`
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FeedbackOption {
    pub id: String,
    pub label: String,
    pub description: String,
    pub enabled: bool,
    #[serde(default)]
    pub default: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SupervisorFeedback {
    pub id: String,
    pub thesis_id: String,
    pub reviewer_id: String,
    pub content: String,
    pub created_at: NaiveDateTime,
    pub is_ai_feedback: bool,
    #[serde(default)]
    pub thesis: Option<Thesis>,
    #[serde(default)]
    pub student_name: Option<String>,
}

/// Ack from the feedback-save endpoints
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SaveFeedbackAck {
    pub message: String,
    pub feedback_id: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AssignmentAck {
    pub message: String,
    pub student_id: String,
    pub supervisor_id: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SupervisorAssignment {
    pub supervisor_id: String,
    pub supervisor_name: String,
    pub student_id: String,
    pub student_name: String,
    #[serde(default)]
    pub theses: Vec<Thesis>,
}

/// Parameters for one AI feedback generation request
#[derive(Debug, Clone, Default)]
pub struct FeedbackRequest {
    pub thesis_id: String,
    pub custom_instructions: String,
    pub predefined_questions: Vec<String>,
    pub selected_options: String,
}

/// Common error types for all API calls
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// Errors that can end a streaming feedback session
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Caught before any network call; the session stays `Idle`
    #[error("{0}")]
    Validation(String),

    /// Transport failure, non-success HTTP status, or missing body
    #[error("Transport error: {0}")]
    Transport(String),

    /// An `error`-typed frame from the server, message shown verbatim
    #[error("{0}")]
    Protocol(String),
}
