use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// The canonical identity record stored in the `users` table. Credential data
/// lives separately in `user_auths` so that profile reads never touch the hash.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow, Default)]
pub struct User {
    pub id: Uuid,
    pub full_name: String,
    pub age: i16,
}

/// UserAuth
///
/// Credential row from the `user_auths` table. `password` holds the bcrypt
/// hash, never plaintext. This struct is internal to the login flow and is
/// never serialized into a response.
#[derive(Debug, Clone, FromRow, Default)]
pub struct UserAuth {
    pub user_id: Uuid,
    pub username: String,
    pub password: String,
}

/// Mood
///
/// A row of the fixed mood catalog (`moods` table) that daily entries
/// reference by level.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow, Default)]
pub struct Mood {
    pub id: i16,
    pub name: String,
}

/// DailyMood
///
/// A single mood entry. The `(user_id, date)` pair is unique: a user records
/// at most one mood per day, enforced at the database level.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow, Default)]
pub struct DailyMood {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub mood_level: i16,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Quiz
///
/// A quiz record from the `quizzes` table, owned by the generating user.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow, Default)]
pub struct Quiz {
    pub id: Uuid,
    pub generated_by_user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Question
///
/// Quiz content is stored as opaque structured documents: `possible_answers`
/// and `correct_answer` are JSONB whose shape depends on `question_type`
/// (e.g. 'multiple_choice', 'true_false').
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow, Default)]
pub struct Question {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub question_text: String,
    pub question_type: String,
    pub possible_answers: serde_json::Value,
    pub correct_answer: serde_json::Value,
}

/// QuizAttempt
///
/// A user's run at a quiz. Attempts expire 20 minutes after they start
/// (database default on `expired_at`); answers are rejected after completion
/// or expiry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow, Default)]
pub struct QuizAttempt {
    pub id: Uuid,
    pub user_id: Uuid,
    pub quiz_id: Uuid,
    pub attempted_at: DateTime<Utc>,
    pub expired_at: DateTime<Utc>,
    pub is_completed: bool,
    pub score: Option<i32>,
    pub points_earned: Option<i32>,
}

/// AttemptAnswer
///
/// One graded answer inside an attempt. `is_correct` is resolved server-side
/// by comparing `user_answer` with the question's `correct_answer`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow, Default)]
pub struct AttemptAnswer {
    pub id: Uuid,
    pub attempt_id: Uuid,
    pub question_id: Uuid,
    pub user_answer: Option<serde_json::Value>,
    pub is_correct: Option<bool>,
}

/// DailyScore
///
/// One score row per user per day (`UNIQUE (user_id, date)`).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow, Default)]
pub struct DailyScore {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub score: i32,
}

/// UserPreference
///
/// Opaque preference document (JSONB), keyed by user.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow, Default)]
pub struct UserPreference {
    pub user_id: Uuid,
    pub user_preferences: Option<serde_json::Value>,
}

/// UserCollection
///
/// Aggregate progress row for a user: running score, points, a condition
/// summary document, and the number of quiz attempts taken.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow, Default)]
pub struct UserCollection {
    pub user_id: Uuid,
    pub score: i32,
    pub point_earned: i32,
    pub user_condition_summary: serde_json::Value,
    pub num_quiz_attempt: Option<i32>,
}

// --- Request Payloads (Input Schemas) ---

/// LoginForm
///
/// Form-encoded credentials for POST /api/v1/login (OAuth2 password-style).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// RegisterRequest
///
/// Input payload for the public registration endpoint. The password is hashed
/// with bcrypt before it touches the repository and is never logged.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub full_name: String,
    pub age: i16,
    pub username: String,
    pub password: String,
}

/// CheckRequest
///
/// Input payload for the harmful-content check. The URL shape is validated
/// before any browser or network activity occurs.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct CheckRequest {
    pub url: String,
}

impl CheckRequest {
    /// Rejects anything that is not an absolute http(s) URL. Mirrors the
    /// request-validation contract: invalid shapes never reach the browser.
    pub fn validate(&self) -> Result<(), String> {
        if self.url.starts_with("http://") || self.url.starts_with("https://") {
            Ok(())
        } else {
            Err("URL must start with http:// or https://".to_string())
        }
    }
}

/// RecordMoodRequest
///
/// Input payload for recording a daily mood. `date` defaults to today when
/// omitted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct RecordMoodRequest {
    pub date: Option<NaiveDate>,
    pub mood_level: i16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// CreateQuizRequest
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct CreateQuizRequest {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// CreateQuestionRequest
///
/// Answers are accepted as opaque JSON documents; the server only requires
/// that `correct_answer` is comparable to submitted answers by equality.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct CreateQuestionRequest {
    pub question_text: String,
    pub question_type: String,
    pub possible_answers: serde_json::Value,
    pub correct_answer: serde_json::Value,
}

/// SubmitAnswerRequest
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct SubmitAnswerRequest {
    pub question_id: Uuid,
    pub user_answer: serde_json::Value,
}

/// UpdatePreferencesRequest
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct UpdatePreferencesRequest {
    pub user_preferences: serde_json::Value,
}

// --- Response Schemas (Output) ---

/// TokenResponse
///
/// Bearer-token body returned by the login endpoint. The same token is also
/// set as an HTTP-only cookie named `token`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

/// HarmfulVerdict
///
/// Structured verdict produced by the LLM classification call. Both fields are
/// always present on a successful check.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default, PartialEq)]
pub struct HarmfulVerdict {
    /// Whether the page content is harmful (e.g. online gambling or phishing).
    pub is_harmful: bool,
    /// Summary of the harmful content detected (hoax, phishing, not safe,
    /// online gambling, piracy, virus).
    pub summary_harmful: String,
}

/// UserProfile
///
/// Output schema for the authenticated user's profile (GET /me), joining the
/// identity row with the credential username.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct UserProfile {
    pub id: Uuid,
    pub full_name: String,
    pub age: i16,
    pub username: String,
}

/// HealthResponse
///
/// Body of the unauthenticated health check at `/`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct HealthResponse {
    pub status: String,
}

/// ErrorDetail
///
/// Uniform error body: `{"detail": "..."}`. Auth failures deliberately keep
/// the message generic so callers cannot distinguish unknown users from wrong
/// passwords.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct ErrorDetail {
    pub detail: String,
}

impl ErrorDetail {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}
