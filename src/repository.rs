use crate::models::{
    AttemptAnswer, CreateQuestionRequest, CreateQuizRequest, DailyMood, DailyScore, Mood, Question,
    Quiz, QuizAttempt, RecordMoodRequest, RegisterRequest, User, UserAuth, UserCollection,
    UserPreference,
};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// RepoError
///
/// Error surface for repository writes. Unique-constraint violations (one mood
/// entry / one daily score per user per day, unique usernames) are surfaced as
/// `Duplicate` so handlers can map them to 409 Conflict.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("duplicate entry")]
    Duplicate,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl RepoError {
    fn from_sqlx(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return RepoError::Duplicate;
            }
        }
        RepoError::Database(e)
    }
}

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations, allowing the
/// handlers to interact with the data layer without knowing the concrete
/// implementation (Postgres, Mock, etc.).
///
/// **Send + Sync + async_trait** are required to make the trait object
/// (`Arc<dyn Repository>`) safely shareable across Axum's async task
/// boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Identity ---
    // Creates the identity row and its credential row atomically.
    async fn create_user(&self, req: RegisterRequest, password_hash: String)
    -> Result<User, RepoError>;
    async fn get_user(&self, id: Uuid) -> Option<User>;
    // Credential lookup for login. Returns None for unknown usernames; the
    // handler keeps the rejection message identical either way.
    async fn get_user_auth(&self, username: &str) -> Option<UserAuth>;
    async fn get_username(&self, user_id: Uuid) -> Option<String>;
    // Deletes the user; all dependent rows go with it via ON DELETE CASCADE.
    async fn delete_user(&self, id: Uuid) -> bool;

    // --- Moods ---
    async fn list_moods(&self) -> Vec<Mood>;
    // Fails with Duplicate when an entry already exists for the user+date.
    async fn record_daily_mood(
        &self,
        user_id: Uuid,
        req: RecordMoodRequest,
    ) -> Result<DailyMood, RepoError>;
    async fn get_daily_moods(&self, user_id: Uuid) -> Vec<DailyMood>;

    // --- Quizzes ---
    async fn create_quiz(&self, user_id: Uuid, req: CreateQuizRequest) -> Result<Quiz, RepoError>;
    async fn get_quiz(&self, id: Uuid) -> Option<Quiz>;
    async fn get_my_quizzes(&self, user_id: Uuid) -> Vec<Quiz>;
    async fn add_question(
        &self,
        quiz_id: Uuid,
        req: CreateQuestionRequest,
    ) -> Result<Question, RepoError>;
    async fn get_questions(&self, quiz_id: Uuid) -> Vec<Question>;
    async fn get_question(&self, id: Uuid) -> Option<Question>;

    // --- Attempts ---
    // Starts an attempt; `expired_at` defaults to 20 minutes out.
    async fn start_attempt(&self, user_id: Uuid, quiz_id: Uuid) -> Result<QuizAttempt, RepoError>;
    // Ownership-scoped lookup: only the attempting user sees their attempt.
    async fn get_attempt(&self, id: Uuid, user_id: Uuid) -> Option<QuizAttempt>;
    async fn record_answer(
        &self,
        attempt_id: Uuid,
        question_id: Uuid,
        user_answer: serde_json::Value,
        is_correct: bool,
    ) -> Result<AttemptAnswer, RepoError>;
    async fn get_attempt_answers(&self, attempt_id: Uuid) -> Vec<AttemptAnswer>;
    // Marks the attempt completed with its grade. Returns None if the attempt
    // does not exist, belongs to someone else, or was already completed.
    async fn complete_attempt(
        &self,
        attempt_id: Uuid,
        user_id: Uuid,
        score: i32,
        points_earned: i32,
    ) -> Option<QuizAttempt>;

    // --- Scores ---
    // Fails with Duplicate when a score already exists for the user+date.
    async fn record_daily_score(
        &self,
        user_id: Uuid,
        date: NaiveDate,
        score: i32,
    ) -> Result<DailyScore, RepoError>;
    async fn get_daily_scores(&self, user_id: Uuid) -> Vec<DailyScore>;

    // --- Preferences & Collection ---
    async fn get_preferences(&self, user_id: Uuid) -> Option<UserPreference>;
    // Upsert: the preference document is replaced wholesale.
    async fn set_preferences(
        &self,
        user_id: Uuid,
        prefs: serde_json::Value,
    ) -> Result<UserPreference, RepoError>;
    async fn get_collection(&self, user_id: Uuid) -> Option<UserCollection>;
    // Accumulates attempt results into the per-user aggregate row.
    async fn bump_collection(
        &self,
        user_id: Uuid,
        score: i32,
        points: i32,
    ) -> Result<UserCollection, RepoError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer access across the
/// application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by the
/// PostgreSQL database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    /// create_user
    ///
    /// Inserts the `users` row and its `user_auths` credential row inside one
    /// transaction so a duplicate username never leaves an orphaned identity.
    async fn create_user(
        &self,
        req: RegisterRequest,
        password_hash: String,
    ) -> Result<User, RepoError> {
        let mut tx = self.pool.begin().await?;
        let new_id = Uuid::new_v4();

        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (id, full_name, age) VALUES ($1, $2, $3) RETURNING id, full_name, age",
        )
        .bind(new_id)
        .bind(&req.full_name)
        .bind(req.age)
        .fetch_one(&mut *tx)
        .await
        .map_err(RepoError::from_sqlx)?;

        sqlx::query("INSERT INTO user_auths (user_id, username, password) VALUES ($1, $2, $3)")
            .bind(new_id)
            .bind(&req.username)
            .bind(&password_hash)
            .execute(&mut *tx)
            .await
            .map_err(RepoError::from_sqlx)?;

        tx.commit().await?;
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> Option<User> {
        sqlx::query_as::<_, User>("SELECT id, full_name, age FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_user error: {:?}", e);
                None
            })
    }

    async fn get_user_auth(&self, username: &str) -> Option<UserAuth> {
        sqlx::query_as::<_, UserAuth>(
            "SELECT user_id, username, password FROM user_auths WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_user_auth error: {:?}", e);
            None
        })
    }

    async fn get_username(&self, user_id: Uuid) -> Option<String> {
        sqlx::query_scalar::<_, String>("SELECT username FROM user_auths WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_username error: {:?}", e);
                None
            })
    }

    /// delete_user
    ///
    /// The single DELETE relies on ON DELETE CASCADE to remove the user's
    /// auth, mood, quiz-attempt, score, preference, and collection rows.
    async fn delete_user(&self, id: Uuid) -> bool {
        match sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
        {
            Ok(res) => res.rows_affected() > 0,
            Err(e) => {
                tracing::error!("delete_user error: {:?}", e);
                false
            }
        }
    }

    async fn list_moods(&self) -> Vec<Mood> {
        sqlx::query_as::<_, Mood>("SELECT id, name FROM moods ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("list_moods error: {:?}", e);
                vec![]
            })
    }

    /// record_daily_mood
    ///
    /// Plain INSERT without ON CONFLICT: a second entry for the same user+date
    /// hits the unique constraint and comes back as `Duplicate`.
    async fn record_daily_mood(
        &self,
        user_id: Uuid,
        req: RecordMoodRequest,
    ) -> Result<DailyMood, RepoError> {
        let date = req.date.unwrap_or_else(|| Utc::now().date_naive());
        sqlx::query_as::<_, DailyMood>(
            r#"
            INSERT INTO daily_moods (id, user_id, date, mood_level, notes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, date, mood_level, notes, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(date)
        .bind(req.mood_level)
        .bind(&req.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)
    }

    async fn get_daily_moods(&self, user_id: Uuid) -> Vec<DailyMood> {
        sqlx::query_as::<_, DailyMood>(
            "SELECT id, user_id, date, mood_level, notes, created_at FROM daily_moods WHERE user_id = $1 ORDER BY date DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_daily_moods error: {:?}", e);
            vec![]
        })
    }

    async fn create_quiz(&self, user_id: Uuid, req: CreateQuizRequest) -> Result<Quiz, RepoError> {
        sqlx::query_as::<_, Quiz>(
            r#"
            INSERT INTO quizzes (id, generated_by_user_id, title, description)
            VALUES ($1, $2, $3, $4)
            RETURNING id, generated_by_user_id, title, description, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&req.title)
        .bind(&req.description)
        .fetch_one(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)
    }

    async fn get_quiz(&self, id: Uuid) -> Option<Quiz> {
        sqlx::query_as::<_, Quiz>(
            "SELECT id, generated_by_user_id, title, description, created_at FROM quizzes WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_quiz error: {:?}", e);
            None
        })
    }

    async fn get_my_quizzes(&self, user_id: Uuid) -> Vec<Quiz> {
        sqlx::query_as::<_, Quiz>(
            "SELECT id, generated_by_user_id, title, description, created_at FROM quizzes WHERE generated_by_user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_my_quizzes error: {:?}", e);
            vec![]
        })
    }

    async fn add_question(
        &self,
        quiz_id: Uuid,
        req: CreateQuestionRequest,
    ) -> Result<Question, RepoError> {
        sqlx::query_as::<_, Question>(
            r#"
            INSERT INTO questions (id, quiz_id, question_text, question_type, possible_answers, correct_answer)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, quiz_id, question_text, question_type, possible_answers, correct_answer
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(quiz_id)
        .bind(&req.question_text)
        .bind(&req.question_type)
        .bind(&req.possible_answers)
        .bind(&req.correct_answer)
        .fetch_one(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)
    }

    async fn get_questions(&self, quiz_id: Uuid) -> Vec<Question> {
        sqlx::query_as::<_, Question>(
            "SELECT id, quiz_id, question_text, question_type, possible_answers, correct_answer FROM questions WHERE quiz_id = $1",
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_questions error: {:?}", e);
            vec![]
        })
    }

    async fn get_question(&self, id: Uuid) -> Option<Question> {
        sqlx::query_as::<_, Question>(
            "SELECT id, quiz_id, question_text, question_type, possible_answers, correct_answer FROM questions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_question error: {:?}", e);
            None
        })
    }

    /// start_attempt
    ///
    /// `attempted_at`, `expired_at` (+20 minutes) and `is_completed` all come
    /// from column defaults.
    async fn start_attempt(&self, user_id: Uuid, quiz_id: Uuid) -> Result<QuizAttempt, RepoError> {
        sqlx::query_as::<_, QuizAttempt>(
            r#"
            INSERT INTO quiz_attempts (id, user_id, quiz_id)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, quiz_id, attempted_at, expired_at, is_completed, score, points_earned
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(quiz_id)
        .fetch_one(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)
    }

    async fn get_attempt(&self, id: Uuid, user_id: Uuid) -> Option<QuizAttempt> {
        sqlx::query_as::<_, QuizAttempt>(
            "SELECT id, user_id, quiz_id, attempted_at, expired_at, is_completed, score, points_earned FROM quiz_attempts WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_attempt error: {:?}", e);
            None
        })
    }

    async fn record_answer(
        &self,
        attempt_id: Uuid,
        question_id: Uuid,
        user_answer: serde_json::Value,
        is_correct: bool,
    ) -> Result<AttemptAnswer, RepoError> {
        sqlx::query_as::<_, AttemptAnswer>(
            r#"
            INSERT INTO attempt_answers (id, attempt_id, question_id, user_answer, is_correct)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, attempt_id, question_id, user_answer, is_correct
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(attempt_id)
        .bind(question_id)
        .bind(&user_answer)
        .bind(is_correct)
        .fetch_one(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)
    }

    async fn get_attempt_answers(&self, attempt_id: Uuid) -> Vec<AttemptAnswer> {
        sqlx::query_as::<_, AttemptAnswer>(
            "SELECT id, attempt_id, question_id, user_answer, is_correct FROM attempt_answers WHERE attempt_id = $1",
        )
        .bind(attempt_id)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_attempt_answers error: {:?}", e);
            vec![]
        })
    }

    /// complete_attempt
    ///
    /// The `is_completed = false` guard makes completion idempotent-safe: a
    /// second completion affects no rows and yields None.
    async fn complete_attempt(
        &self,
        attempt_id: Uuid,
        user_id: Uuid,
        score: i32,
        points_earned: i32,
    ) -> Option<QuizAttempt> {
        sqlx::query_as::<_, QuizAttempt>(
            r#"
            UPDATE quiz_attempts
            SET is_completed = true, score = $3, points_earned = $4
            WHERE id = $1 AND user_id = $2 AND is_completed = false
            RETURNING id, user_id, quiz_id, attempted_at, expired_at, is_completed, score, points_earned
            "#,
        )
        .bind(attempt_id)
        .bind(user_id)
        .bind(score)
        .bind(points_earned)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("complete_attempt error: {:?}", e);
            None
        })
    }

    async fn record_daily_score(
        &self,
        user_id: Uuid,
        date: NaiveDate,
        score: i32,
    ) -> Result<DailyScore, RepoError> {
        sqlx::query_as::<_, DailyScore>(
            r#"
            INSERT INTO daily_scores (id, user_id, date, score)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, date, score
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(date)
        .bind(score)
        .fetch_one(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)
    }

    async fn get_daily_scores(&self, user_id: Uuid) -> Vec<DailyScore> {
        sqlx::query_as::<_, DailyScore>(
            "SELECT id, user_id, date, score FROM daily_scores WHERE user_id = $1 ORDER BY date DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_daily_scores error: {:?}", e);
            vec![]
        })
    }

    async fn get_preferences(&self, user_id: Uuid) -> Option<UserPreference> {
        sqlx::query_as::<_, UserPreference>(
            "SELECT user_id, user_preferences FROM user_preferences WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_preferences error: {:?}", e);
            None
        })
    }

    async fn set_preferences(
        &self,
        user_id: Uuid,
        prefs: serde_json::Value,
    ) -> Result<UserPreference, RepoError> {
        sqlx::query_as::<_, UserPreference>(
            r#"
            INSERT INTO user_preferences (user_id, user_preferences)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET user_preferences = EXCLUDED.user_preferences
            RETURNING user_id, user_preferences
            "#,
        )
        .bind(user_id)
        .bind(&prefs)
        .fetch_one(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)
    }

    async fn get_collection(&self, user_id: Uuid) -> Option<UserCollection> {
        sqlx::query_as::<_, UserCollection>(
            "SELECT user_id, score, point_earned, user_condition_summary, num_quiz_attempt FROM user_collections WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_collection error: {:?}", e);
            None
        })
    }

    /// bump_collection
    ///
    /// Upsert that accumulates: a fresh row starts from this attempt's result,
    /// an existing row adds to its running totals and attempt count.
    async fn bump_collection(
        &self,
        user_id: Uuid,
        score: i32,
        points: i32,
    ) -> Result<UserCollection, RepoError> {
        sqlx::query_as::<_, UserCollection>(
            r#"
            INSERT INTO user_collections (user_id, score, point_earned, user_condition_summary, num_quiz_attempt)
            VALUES ($1, $2, $3, $4, 1)
            ON CONFLICT (user_id) DO UPDATE SET
                score = user_collections.score + EXCLUDED.score,
                point_earned = user_collections.point_earned + EXCLUDED.point_earned,
                num_quiz_attempt = COALESCE(user_collections.num_quiz_attempt, 0) + 1
            RETURNING user_id, score, point_earned, user_condition_summary, num_quiz_attempt
            "#,
        )
        .bind(user_id)
        .bind(score)
        .bind(points)
        .bind(serde_json::json!({}))
        .fetch_one(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)
    }
}
