use crate::{
    AppState,
    auth::{AuthUser, create_access_token, hash_password, verify_password},
    checker::CheckOutcome,
    models::{
        AttemptAnswer, CheckRequest, CreateQuestionRequest, CreateQuizRequest, DailyMood,
        DailyScore, ErrorDetail,
        HarmfulVerdict, HealthResponse, LoginForm, Mood, Question, Quiz, QuizAttempt,
        RecordMoodRequest, RegisterRequest, SubmitAnswerRequest, TokenResponse,
        UpdatePreferencesRequest, User, UserCollection, UserPreference, UserProfile,
    },
    repository::RepoError,
};
use axum::{
    Json,
    extract::{Form, Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

type ApiError = (StatusCode, Json<ErrorDetail>);

fn api_error(status: StatusCode, detail: impl Into<String>) -> ApiError {
    (status, Json(ErrorDetail::new(detail)))
}

fn internal_error() -> ApiError {
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
}

// --- Public Handlers ---

/// health
///
/// [Public Route] Liveness check at the application root.
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "Ok".to_string(),
    })
}

/// login
///
/// [Public Route] Verifies form-encoded credentials against the stored bcrypt
/// hash and issues a signed bearer token, also set as an HTTP-only cookie.
///
/// *Security*: unknown usernames and wrong passwords produce the identical
/// 401 body, preventing account enumeration.
#[utoipa::path(
    post,
    path = "/api/v1/login",
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 401, description = "Bad credentials", body = ErrorDetail)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!("User login attempt with username: {}", form.username);

    let user_auth = state.repo.get_user_auth(&form.username).await;
    let verified = user_auth
        .as_ref()
        .map(|auth| verify_password(&form.password, &auth.password))
        .unwrap_or(false);

    let user_auth = match (user_auth, verified) {
        (Some(auth), true) => auth,
        _ => {
            return Err(api_error(
                StatusCode::UNAUTHORIZED,
                "Invalid username or password",
            ));
        }
    };

    let access_token =
        create_access_token(user_auth.user_id, &user_auth.username, &state.config).map_err(
            |e| {
                tracing::error!("Error during user login: {:?}", e);
                internal_error()
            },
        )?;

    let cookie = format!(
        "token={}; HttpOnly; Secure; SameSite=Lax; Path=/",
        access_token
    );

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(TokenResponse {
            access_token,
            token_type: "bearer".to_string(),
        }),
    ))
}

/// register
///
/// [Public Route] Creates the identity and credential rows atomically. The
/// plaintext password is hashed before it reaches the repository and is never
/// persisted or logged.
#[utoipa::path(
    post,
    path = "/api/v1/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = User),
        (status = 409, description = "Username taken", body = ErrorDetail)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let password_hash = hash_password(&payload.password).map_err(|e| {
        tracing::error!("Password hashing failed: {:?}", e);
        internal_error()
    })?;

    match state.repo.create_user(payload, password_hash).await {
        Ok(user) => Ok((StatusCode::CREATED, Json(user))),
        Err(RepoError::Duplicate) => {
            Err(api_error(StatusCode::CONFLICT, "Username already taken"))
        }
        Err(e) => {
            tracing::error!("register error: {:?}", e);
            Err(internal_error())
        }
    }
}

/// list_moods
///
/// [Public Route] The fixed mood catalog that daily entries reference.
#[utoipa::path(
    get,
    path = "/api/v1/moods",
    responses((status = 200, description = "Mood catalog", body = [Mood]))
)]
pub async fn list_moods(State(state): State<AppState>) -> Json<Vec<Mood>> {
    Json(state.repo.list_moods().await)
}

// --- Harmful-Content Checker ---

/// check_harmful
///
/// [Authenticated Route] Runs the harmful-content pipeline for a URL.
///
/// The URL shape is validated first: anything that is not http(s) is rejected
/// with 422 before any browser or network activity. When the checker cannot
/// produce a verdict the caller receives the neutral "nothing to check"
/// response; the underlying cause is only logged.
#[utoipa::path(
    post,
    path = "/api/v1/check_harmful",
    request_body = CheckRequest,
    responses(
        (status = 200, description = "Verdict", body = HarmfulVerdict),
        (status = 422, description = "Invalid URL shape", body = ErrorDetail),
        (status = 500, description = "Internal failure", body = ErrorDetail)
    )
)]
pub async fn check_harmful(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CheckRequest>,
) -> Result<Json<HarmfulVerdict>, ApiError> {
    payload
        .validate()
        .map_err(|msg| api_error(StatusCode::UNPROCESSABLE_ENTITY, msg))?;

    tracing::info!(
        "Checking harmful content: {} (requested by {})",
        payload.url,
        user_id
    );

    match state.checker.check(&payload.url).await {
        CheckOutcome::Verdict(verdict) => Ok(Json(verdict)),
        CheckOutcome::Unavailable(reason) => {
            tracing::warn!("No verdict for {}: {}", payload.url, reason);
            Ok(Json(HarmfulVerdict {
                is_harmful: false,
                summary_harmful: "No content to check.".to_string(),
            }))
        }
    }
}

// --- Profile ---

/// get_me
///
/// [Authenticated Route] The authenticated user's profile, joining the
/// identity row with the credential username. The stored username is
/// authoritative; the one in the token claims is only a convenience copy.
#[utoipa::path(
    get,
    path = "/api/v1/me",
    responses((status = 200, description = "Profile", body = UserProfile))
)]
pub async fn get_me(
    AuthUser { id, username }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UserProfile>, ApiError> {
    let user = state
        .repo
        .get_user(id)
        .await
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "User not found"))?;

    let username = state.repo.get_username(id).await.unwrap_or(username);

    Ok(Json(UserProfile {
        id: user.id,
        full_name: user.full_name,
        age: user.age,
        username,
    }))
}

/// delete_me
///
/// [Authenticated Route] Deletes the account. All dependent rows (auth,
/// moods, quizzes, attempts, scores, preferences, collections) are removed by
/// the database's cascade rules.
#[utoipa::path(
    delete,
    path = "/api/v1/me",
    responses(
        (status = 204, description = "Account deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_me(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> StatusCode {
    if state.repo.delete_user(id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

// --- Moods ---

/// record_mood
///
/// [Authenticated Route] Records the user's mood for a day (default: today).
///
/// *Invariant*: one entry per user per day; a second submission for the same
/// date hits the unique constraint and returns 409.
#[utoipa::path(
    post,
    path = "/api/v1/me/moods",
    request_body = RecordMoodRequest,
    responses(
        (status = 201, description = "Recorded", body = DailyMood),
        (status = 409, description = "Already recorded for this date", body = ErrorDetail)
    )
)]
pub async fn record_mood(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<RecordMoodRequest>,
) -> Result<(StatusCode, Json<DailyMood>), ApiError> {
    match state.repo.record_daily_mood(id, payload).await {
        Ok(mood) => Ok((StatusCode::CREATED, Json(mood))),
        Err(RepoError::Duplicate) => Err(api_error(
            StatusCode::CONFLICT,
            "Mood already recorded for this date",
        )),
        Err(e) => {
            tracing::error!("record_mood error: {:?}", e);
            Err(internal_error())
        }
    }
}

/// get_my_moods
///
/// [Authenticated Route] The user's mood history, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/me/moods",
    responses((status = 200, description = "Mood history", body = [DailyMood]))
)]
pub async fn get_my_moods(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Json<Vec<DailyMood>> {
    Json(state.repo.get_daily_moods(id).await)
}

// --- Quizzes ---

/// create_quiz
///
/// [Authenticated Route] Creates a quiz owned by the requesting user.
#[utoipa::path(
    post,
    path = "/api/v1/quizzes",
    request_body = CreateQuizRequest,
    responses((status = 201, description = "Created", body = Quiz))
)]
pub async fn create_quiz(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<(StatusCode, Json<Quiz>), ApiError> {
    match state.repo.create_quiz(id, payload).await {
        Ok(quiz) => Ok((StatusCode::CREATED, Json(quiz))),
        Err(e) => {
            tracing::error!("create_quiz error: {:?}", e);
            Err(internal_error())
        }
    }
}

/// get_my_quizzes
///
/// [Authenticated Route] Lists quizzes generated by the requesting user.
#[utoipa::path(
    get,
    path = "/api/v1/quizzes",
    responses((status = 200, description = "My quizzes", body = [Quiz]))
)]
pub async fn get_my_quizzes(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Json<Vec<Quiz>> {
    Json(state.repo.get_my_quizzes(id).await)
}

/// get_quiz_details
///
/// [Authenticated Route] Retrieves a single quiz by ID.
#[utoipa::path(
    get,
    path = "/api/v1/quizzes/{id}",
    params(("id" = Uuid, Path, description = "Quiz ID")),
    responses((status = 200, description = "Found", body = Quiz))
)]
pub async fn get_quiz_details(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Quiz>, StatusCode> {
    match state.repo.get_quiz(id).await {
        Some(quiz) => Ok(Json(quiz)),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// add_question
///
/// [Authenticated Route] Adds a question to a quiz.
///
/// *Authorization*: only the quiz owner may add questions (Owner-Only check).
#[utoipa::path(
    post,
    path = "/api/v1/quizzes/{id}/questions",
    params(("id" = Uuid, Path, description = "Quiz ID")),
    request_body = CreateQuestionRequest,
    responses(
        (status = 201, description = "Added", body = Question),
        (status = 403, description = "Not Owner"),
        (status = 404, description = "Quiz not found")
    )
)]
pub async fn add_question(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(quiz_id): Path<Uuid>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<(StatusCode, Json<Question>), ApiError> {
    let quiz = state
        .repo
        .get_quiz(quiz_id)
        .await
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Quiz not found"))?;

    if quiz.generated_by_user_id != user_id {
        return Err(api_error(
            StatusCode::FORBIDDEN,
            "Only the quiz owner can add questions",
        ));
    }

    match state.repo.add_question(quiz_id, payload).await {
        Ok(question) => Ok((StatusCode::CREATED, Json(question))),
        Err(e) => {
            tracing::error!("add_question error: {:?}", e);
            Err(internal_error())
        }
    }
}

/// get_questions
///
/// [Authenticated Route] Lists the questions of a quiz.
#[utoipa::path(
    get,
    path = "/api/v1/quizzes/{id}/questions",
    params(("id" = Uuid, Path, description = "Quiz ID")),
    responses((status = 200, description = "Questions", body = [Question]))
)]
pub async fn get_questions(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(quiz_id): Path<Uuid>,
) -> Json<Vec<Question>> {
    Json(state.repo.get_questions(quiz_id).await)
}

// --- Attempts ---

/// start_attempt
///
/// [Authenticated Route] Opens a quiz attempt; the attempt expires 20 minutes
/// after it starts.
#[utoipa::path(
    post,
    path = "/api/v1/quizzes/{id}/attempts",
    params(("id" = Uuid, Path, description = "Quiz ID")),
    responses(
        (status = 201, description = "Attempt started", body = QuizAttempt),
        (status = 404, description = "Quiz not found")
    )
)]
pub async fn start_attempt(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(quiz_id): Path<Uuid>,
) -> Result<(StatusCode, Json<QuizAttempt>), ApiError> {
    if state.repo.get_quiz(quiz_id).await.is_none() {
        return Err(api_error(StatusCode::NOT_FOUND, "Quiz not found"));
    }

    match state.repo.start_attempt(user_id, quiz_id).await {
        Ok(attempt) => Ok((StatusCode::CREATED, Json(attempt))),
        Err(e) => {
            tracing::error!("start_attempt error: {:?}", e);
            Err(internal_error())
        }
    }
}

/// submit_answer
///
/// [Authenticated Route] Records an answer inside an open attempt.
///
/// Grading happens server-side: the submitted document is compared for JSONB
/// equality with the question's `correct_answer`. Answers against completed
/// or expired attempts are rejected with 409.
#[utoipa::path(
    post,
    path = "/api/v1/attempts/{id}/answers",
    params(("id" = Uuid, Path, description = "Attempt ID")),
    request_body = SubmitAnswerRequest,
    responses(
        (status = 201, description = "Answer recorded", body = AttemptAnswer),
        (status = 404, description = "Attempt or question not found"),
        (status = 409, description = "Attempt closed", body = ErrorDetail)
    )
)]
pub async fn submit_answer(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(attempt_id): Path<Uuid>,
    Json(payload): Json<SubmitAnswerRequest>,
) -> Result<(StatusCode, Json<AttemptAnswer>), ApiError> {
    let attempt = state
        .repo
        .get_attempt(attempt_id, user_id)
        .await
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Attempt not found"))?;

    if attempt.is_completed || attempt.expired_at < Utc::now() {
        return Err(api_error(
            StatusCode::CONFLICT,
            "Attempt is completed or expired",
        ));
    }

    let question = state
        .repo
        .get_question(payload.question_id)
        .await
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Question not found"))?;

    if question.quiz_id != attempt.quiz_id {
        return Err(api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Question does not belong to the attempted quiz",
        ));
    }

    let is_correct = question.correct_answer == payload.user_answer;

    match state
        .repo
        .record_answer(attempt_id, payload.question_id, payload.user_answer, is_correct)
        .await
    {
        Ok(answer) => Ok((StatusCode::CREATED, Json(answer))),
        Err(e) => {
            tracing::error!("submit_answer error: {:?}", e);
            Err(internal_error())
        }
    }
}

/// complete_attempt
///
/// [Authenticated Route] Grades and closes an attempt: score is the
/// percentage of correct answers, points are 10 per correct answer. The
/// result is folded into the user's daily score (first completion of the day
/// owns the unique row) and aggregate collection.
#[utoipa::path(
    post,
    path = "/api/v1/attempts/{id}/complete",
    params(("id" = Uuid, Path, description = "Attempt ID")),
    responses(
        (status = 200, description = "Completed", body = QuizAttempt),
        (status = 404, description = "Attempt not found"),
        (status = 409, description = "Already completed", body = ErrorDetail)
    )
)]
pub async fn complete_attempt(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(attempt_id): Path<Uuid>,
) -> Result<Json<QuizAttempt>, ApiError> {
    if state.repo.get_attempt(attempt_id, user_id).await.is_none() {
        return Err(api_error(StatusCode::NOT_FOUND, "Attempt not found"));
    }

    let answers = state.repo.get_attempt_answers(attempt_id).await;
    let total = answers.len() as i32;
    let correct = answers
        .iter()
        .filter(|a| a.is_correct == Some(true))
        .count() as i32;

    let score = if total > 0 { 100 * correct / total } else { 0 };
    let points_earned = correct * 10;

    let attempt = state
        .repo
        .complete_attempt(attempt_id, user_id, score, points_earned)
        .await
        .ok_or_else(|| api_error(StatusCode::CONFLICT, "Attempt already completed"))?;

    // Daily-score uniqueness means only the first completion of the day lands
    // a row; later completions keep their attempt result regardless.
    let today = Utc::now().date_naive();
    match state.repo.record_daily_score(user_id, today, score).await {
        Ok(_) => {}
        Err(RepoError::Duplicate) => {
            tracing::debug!("daily score already recorded for {} on {}", user_id, today);
        }
        Err(e) => tracing::error!("record_daily_score error: {:?}", e),
    }

    if let Err(e) = state
        .repo
        .bump_collection(user_id, score, points_earned)
        .await
    {
        tracing::error!("bump_collection error: {:?}", e);
    }

    Ok(Json(attempt))
}

// --- Scores, Preferences, Collection ---

/// get_my_scores
///
/// [Authenticated Route] The user's daily score history, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/me/scores",
    responses((status = 200, description = "Daily scores", body = [DailyScore]))
)]
pub async fn get_my_scores(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Json<Vec<DailyScore>> {
    Json(state.repo.get_daily_scores(id).await)
}

/// get_preferences
///
/// [Authenticated Route] The user's opaque preference document. Users who
/// never saved preferences get an empty row rather than a 404.
#[utoipa::path(
    get,
    path = "/api/v1/me/preferences",
    responses((status = 200, description = "Preferences", body = UserPreference))
)]
pub async fn get_preferences(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Json<UserPreference> {
    let prefs = state
        .repo
        .get_preferences(id)
        .await
        .unwrap_or(UserPreference {
            user_id: id,
            user_preferences: None,
        });
    Json(prefs)
}

/// set_preferences
///
/// [Authenticated Route] Replaces the preference document wholesale (upsert).
#[utoipa::path(
    put,
    path = "/api/v1/me/preferences",
    request_body = UpdatePreferencesRequest,
    responses((status = 200, description = "Saved", body = UserPreference))
)]
pub async fn set_preferences(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdatePreferencesRequest>,
) -> Result<Json<UserPreference>, ApiError> {
    match state
        .repo
        .set_preferences(id, payload.user_preferences)
        .await
    {
        Ok(prefs) => Ok(Json(prefs)),
        Err(e) => {
            tracing::error!("set_preferences error: {:?}", e);
            Err(internal_error())
        }
    }
}

/// get_collection
///
/// [Authenticated Route] The aggregate progress row. 404 until the user has
/// completed at least one attempt.
#[utoipa::path(
    get,
    path = "/api/v1/me/collection",
    responses(
        (status = 200, description = "Collection", body = UserCollection),
        (status = 404, description = "No collection yet")
    )
)]
pub async fn get_collection(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UserCollection>, StatusCode> {
    match state.repo.get_collection(id).await {
        Some(collection) => Ok(Json(collection)),
        None => Err(StatusCode::NOT_FOUND),
    }
}
