use async_trait::async_trait;
use axum::{
    Json,
    body::to_bytes,
    extract::{Form, Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, Validation, decode};
use mindguard::{
    AppState,
    auth::{AuthUser, Claims, hash_password},
    checker::{
        ClassifyError, FetchError, HarmfulChecker, PageCapture, PageFetcher, ScreenshotPair,
        VerdictClassifier,
    },
    config::AppConfig,
    handlers,
    models::{
        AttemptAnswer, CheckRequest, CreateQuestionRequest, CreateQuizRequest, DailyMood,
        DailyScore, HarmfulVerdict, LoginForm, Mood, Question, Quiz, QuizAttempt,
        RecordMoodRequest, RegisterRequest, SubmitAnswerRequest, TokenResponse, User, UserAuth,
        UserCollection, UserPreference,
    },
    repository::{RepoError, Repository},
};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};
use uuid::Uuid;

// --- MOCK REPOSITORY IMPLEMENTATION ---

// Handlers depend on the Repository trait, so pre-canned rows and a few
// behavior switches are all the control the tests need.
#[derive(Default)]
struct MockRepo {
    user: Option<User>,
    user_auth: Option<UserAuth>,
    username: Option<String>,
    duplicate_username: bool,
    duplicate_mood: bool,
    delete_user_result: bool,
    quiz: Option<Quiz>,
    question: Option<Question>,
    attempt: Option<QuizAttempt>,
    answers: Vec<AttemptAnswer>,
    complete_result: Option<QuizAttempt>,
    // Records the (score, points_earned) the handler computed at completion.
    // Arc so the test keeps a handle after the repo moves into the state.
    completion_input: Arc<Mutex<Option<(i32, i32)>>>,
    collection: Option<UserCollection>,
}

#[async_trait]
impl Repository for MockRepo {
    async fn create_user(
        &self,
        req: RegisterRequest,
        _password_hash: String,
    ) -> Result<User, RepoError> {
        if self.duplicate_username {
            return Err(RepoError::Duplicate);
        }
        Ok(User {
            id: Uuid::new_v4(),
            full_name: req.full_name,
            age: req.age,
        })
    }
    async fn get_user(&self, _id: Uuid) -> Option<User> {
        self.user.clone()
    }
    async fn get_user_auth(&self, _username: &str) -> Option<UserAuth> {
        self.user_auth.clone()
    }
    async fn get_username(&self, _user_id: Uuid) -> Option<String> {
        self.username.clone()
    }
    async fn delete_user(&self, _id: Uuid) -> bool {
        self.delete_user_result
    }

    async fn list_moods(&self) -> Vec<Mood> {
        vec![]
    }
    async fn record_daily_mood(
        &self,
        user_id: Uuid,
        req: RecordMoodRequest,
    ) -> Result<DailyMood, RepoError> {
        if self.duplicate_mood {
            return Err(RepoError::Duplicate);
        }
        Ok(DailyMood {
            id: Uuid::new_v4(),
            user_id,
            date: req.date.unwrap_or_else(|| Utc::now().date_naive()),
            mood_level: req.mood_level,
            notes: req.notes,
            created_at: Utc::now(),
        })
    }
    async fn get_daily_moods(&self, _user_id: Uuid) -> Vec<DailyMood> {
        vec![]
    }

    async fn create_quiz(&self, user_id: Uuid, req: CreateQuizRequest) -> Result<Quiz, RepoError> {
        Ok(Quiz {
            id: Uuid::new_v4(),
            generated_by_user_id: user_id,
            title: req.title,
            description: req.description,
            created_at: Utc::now(),
        })
    }
    async fn get_quiz(&self, _id: Uuid) -> Option<Quiz> {
        self.quiz.clone()
    }
    async fn get_my_quizzes(&self, _user_id: Uuid) -> Vec<Quiz> {
        vec![]
    }
    async fn add_question(
        &self,
        quiz_id: Uuid,
        req: CreateQuestionRequest,
    ) -> Result<Question, RepoError> {
        Ok(Question {
            id: Uuid::new_v4(),
            quiz_id,
            question_text: req.question_text,
            question_type: req.question_type,
            possible_answers: req.possible_answers,
            correct_answer: req.correct_answer,
        })
    }
    async fn get_questions(&self, _quiz_id: Uuid) -> Vec<Question> {
        vec![]
    }
    async fn get_question(&self, _id: Uuid) -> Option<Question> {
        self.question.clone()
    }

    async fn start_attempt(&self, user_id: Uuid, quiz_id: Uuid) -> Result<QuizAttempt, RepoError> {
        Ok(QuizAttempt {
            id: Uuid::new_v4(),
            user_id,
            quiz_id,
            attempted_at: Utc::now(),
            expired_at: Utc::now() + Duration::minutes(20),
            is_completed: false,
            score: None,
            points_earned: None,
        })
    }
    async fn get_attempt(&self, _id: Uuid, _user_id: Uuid) -> Option<QuizAttempt> {
        self.attempt.clone()
    }
    async fn record_answer(
        &self,
        attempt_id: Uuid,
        question_id: Uuid,
        user_answer: serde_json::Value,
        is_correct: bool,
    ) -> Result<AttemptAnswer, RepoError> {
        Ok(AttemptAnswer {
            id: Uuid::new_v4(),
            attempt_id,
            question_id,
            user_answer: Some(user_answer),
            is_correct: Some(is_correct),
        })
    }
    async fn get_attempt_answers(&self, _attempt_id: Uuid) -> Vec<AttemptAnswer> {
        self.answers.clone()
    }
    async fn complete_attempt(
        &self,
        _attempt_id: Uuid,
        _user_id: Uuid,
        score: i32,
        points_earned: i32,
    ) -> Option<QuizAttempt> {
        *self.completion_input.lock().unwrap() = Some((score, points_earned));
        self.complete_result.clone()
    }

    async fn record_daily_score(
        &self,
        user_id: Uuid,
        date: chrono::NaiveDate,
        score: i32,
    ) -> Result<DailyScore, RepoError> {
        Ok(DailyScore {
            id: Uuid::new_v4(),
            user_id,
            date,
            score,
        })
    }
    async fn get_daily_scores(&self, _user_id: Uuid) -> Vec<DailyScore> {
        vec![]
    }

    async fn get_preferences(&self, _user_id: Uuid) -> Option<UserPreference> {
        None
    }
    async fn set_preferences(
        &self,
        user_id: Uuid,
        prefs: serde_json::Value,
    ) -> Result<UserPreference, RepoError> {
        Ok(UserPreference {
            user_id,
            user_preferences: Some(prefs),
        })
    }
    async fn get_collection(&self, _user_id: Uuid) -> Option<UserCollection> {
        self.collection.clone()
    }
    async fn bump_collection(
        &self,
        user_id: Uuid,
        score: i32,
        points: i32,
    ) -> Result<UserCollection, RepoError> {
        Ok(UserCollection {
            user_id,
            score,
            point_earned: points,
            user_condition_summary: serde_json::json!({}),
            num_quiz_attempt: Some(1),
        })
    }
}

// --- MOCK CHECKER SEAMS ---

/// Fetcher that flags whether it was invoked; used to prove URL validation
/// happens before any browser activity.
struct FlagFetcher {
    called: Arc<AtomicBool>,
    fail: bool,
}

#[async_trait]
impl PageFetcher for FlagFetcher {
    async fn fetch(&self, _url: &str) -> Result<PageCapture, FetchError> {
        self.called.store(true, Ordering::SeqCst);
        if self.fail {
            Err(FetchError::Navigation("connection refused".into()))
        } else {
            Ok(PageCapture {
                html: Some("url: http://x\n<body>fine</body>".to_string()),
                screenshots: None,
            })
        }
    }
}

struct StubClassifier {
    verdict: HarmfulVerdict,
}

#[async_trait]
impl VerdictClassifier for StubClassifier {
    async fn classify(
        &self,
        _text: &str,
        _screenshots: Option<&ScreenshotPair>,
    ) -> Result<HarmfulVerdict, ClassifyError> {
        Ok(self.verdict.clone())
    }
}

// --- Test Setup Helpers ---

const TEST_USER_ID: Uuid = Uuid::from_u128(42);

fn auth_user() -> AuthUser {
    AuthUser {
        id: TEST_USER_ID,
        username: "tester".to_string(),
    }
}

fn app_state(repo: MockRepo) -> AppState {
    app_state_with_checker(repo, FlagFetcher {
        called: Arc::new(AtomicBool::new(false)),
        fail: false,
    })
}

fn app_state_with_checker(repo: MockRepo, fetcher: FlagFetcher) -> AppState {
    let checker = HarmfulChecker::new(
        Arc::new(fetcher),
        Arc::new(StubClassifier {
            verdict: HarmfulVerdict {
                is_harmful: false,
                summary_harmful: "Nothing suspicious.".to_string(),
            },
        }),
    );
    AppState {
        repo: Arc::new(repo),
        checker: Arc::new(checker),
        config: AppConfig::default(),
    }
}

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// --- Login ---

#[tokio::test]
async fn test_login_success_sets_cookie_and_issues_decodable_token() {
    let repo = MockRepo {
        user_auth: Some(UserAuth {
            user_id: TEST_USER_ID,
            username: "tester".to_string(),
            password: hash_password("correct horse").unwrap(),
        }),
        ..Default::default()
    };
    let state = app_state(repo);
    let secret = state.config.jwt_secret.clone();

    let result = handlers::login(
        State(state),
        Form(LoginForm {
            username: "tester".to_string(),
            password: "correct horse".to_string(),
        }),
    )
    .await;

    let response = result.expect("login should succeed").into_response();
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("cookie must be set")
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("token="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));

    let token: TokenResponse = body_json(response).await;
    assert_eq!(token.token_type, "bearer");

    let claims = decode::<Claims>(
        &token.access_token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .expect("issued token must validate")
    .claims;
    assert_eq!(claims.sub, TEST_USER_ID);
    assert_eq!(claims.username, "tester");
}

#[tokio::test]
async fn test_login_wrong_password_is_unauthorized() {
    let repo = MockRepo {
        user_auth: Some(UserAuth {
            user_id: TEST_USER_ID,
            username: "tester".to_string(),
            password: hash_password("correct horse").unwrap(),
        }),
        ..Default::default()
    };

    let result = handlers::login(
        State(app_state(repo)),
        Form(LoginForm {
            username: "tester".to_string(),
            password: "wrong horse".to_string(),
        }),
    )
    .await;

    let (status, Json(detail)) = result.err().expect("login must fail");
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(detail.detail, "Invalid username or password");
}

#[tokio::test]
async fn test_login_unknown_user_gets_identical_rejection() {
    let result = handlers::login(
        State(app_state(MockRepo::default())),
        Form(LoginForm {
            username: "nobody".to_string(),
            password: "anything".to_string(),
        }),
    )
    .await;

    // Same status and body as the wrong-password case: no account enumeration.
    let (status, Json(detail)) = result.err().expect("login must fail");
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(detail.detail, "Invalid username or password");
}

// --- Registration ---

#[tokio::test]
async fn test_register_success_is_created() {
    let result = handlers::register(
        State(app_state(MockRepo::default())),
        axum::Json(RegisterRequest {
            full_name: "Test Person".to_string(),
            age: 30,
            username: "newbie".to_string(),
            password: "a password".to_string(),
        }),
    )
    .await;

    let (status, axum::Json(user)) = result.expect("register should succeed");
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(user.full_name, "Test Person");
    assert_eq!(user.age, 30);
}

#[tokio::test]
async fn test_register_duplicate_username_conflicts() {
    let repo = MockRepo {
        duplicate_username: true,
        ..Default::default()
    };

    let result = handlers::register(
        State(app_state(repo)),
        axum::Json(RegisterRequest {
            full_name: "Test Person".to_string(),
            age: 30,
            username: "taken".to_string(),
            password: "a password".to_string(),
        }),
    )
    .await;

    let (status, Json(detail)) = result.err().expect("register must fail");
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(detail.detail, "Username already taken");
}

// --- Harmful-Content Checker ---

#[tokio::test]
async fn test_check_harmful_rejects_non_http_url_before_fetching() {
    let called = Arc::new(AtomicBool::new(false));
    let state = app_state_with_checker(MockRepo::default(), FlagFetcher {
        called: called.clone(),
        fail: false,
    });

    let result = handlers::check_harmful(
        auth_user(),
        State(state),
        axum::Json(CheckRequest {
            url: "ftp://example.com/file".to_string(),
        }),
    )
    .await;

    let (status, Json(detail)) = result.err().expect("validation must fail");
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(detail.detail, "URL must start with http:// or https://");
    // Validation failures must never reach the browser layer.
    assert!(!called.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_check_harmful_returns_classifier_verdict() {
    let state = app_state_with_checker(MockRepo::default(), FlagFetcher {
        called: Arc::new(AtomicBool::new(false)),
        fail: false,
    });

    let result = handlers::check_harmful(
        auth_user(),
        State(state),
        axum::Json(CheckRequest {
            url: "https://example.com".to_string(),
        }),
    )
    .await;

    let axum::Json(verdict) = result.expect("check should succeed");
    assert!(!verdict.is_harmful);
    assert_eq!(verdict.summary_harmful, "Nothing suspicious.");
}

#[tokio::test]
async fn test_check_harmful_collapses_failures_to_neutral_response() {
    let state = app_state_with_checker(MockRepo::default(), FlagFetcher {
        called: Arc::new(AtomicBool::new(false)),
        fail: true,
    });

    let result = handlers::check_harmful(
        auth_user(),
        State(state),
        axum::Json(CheckRequest {
            url: "http://unreachable.example".to_string(),
        }),
    )
    .await;

    // A dead page is a 200 with the neutral body, never an error.
    let axum::Json(verdict) = result.expect("failures collapse to 200");
    assert!(!verdict.is_harmful);
    assert_eq!(verdict.summary_harmful, "No content to check.");
}

// --- Account & Moods ---

#[tokio::test]
async fn test_delete_me_reports_missing_account() {
    let found = MockRepo {
        delete_user_result: true,
        ..Default::default()
    };
    assert_eq!(
        handlers::delete_me(auth_user(), State(app_state(found))).await,
        StatusCode::NO_CONTENT
    );

    assert_eq!(
        handlers::delete_me(auth_user(), State(app_state(MockRepo::default()))).await,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_record_mood_duplicate_day_conflicts() {
    let repo = MockRepo {
        duplicate_mood: true,
        ..Default::default()
    };

    let result = handlers::record_mood(
        auth_user(),
        State(app_state(repo)),
        axum::Json(RecordMoodRequest {
            date: None,
            mood_level: 4,
            notes: None,
        }),
    )
    .await;

    let (status, Json(detail)) = result.err().expect("second entry must fail");
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(detail.detail, "Mood already recorded for this date");
}

// --- Quizzes & Attempts ---

#[tokio::test]
async fn test_add_question_requires_quiz_ownership() {
    let repo = MockRepo {
        quiz: Some(Quiz {
            id: Uuid::new_v4(),
            generated_by_user_id: Uuid::new_v4(), // someone else's quiz
            title: "Not yours".to_string(),
            description: None,
            created_at: Utc::now(),
        }),
        ..Default::default()
    };
    let quiz_id = repo.quiz.as_ref().unwrap().id;

    let result = handlers::add_question(
        auth_user(),
        State(app_state(repo)),
        Path(quiz_id),
        axum::Json(CreateQuestionRequest {
            question_text: "2+2?".to_string(),
            question_type: "multiple_choice".to_string(),
            possible_answers: serde_json::json!(["3", "4"]),
            correct_answer: serde_json::json!("4"),
        }),
    )
    .await;

    let (status, _) = result.err().expect("non-owner must be rejected");
    assert_eq!(status, StatusCode::FORBIDDEN);
}

fn open_attempt(quiz_id: Uuid) -> QuizAttempt {
    QuizAttempt {
        id: Uuid::new_v4(),
        user_id: TEST_USER_ID,
        quiz_id,
        attempted_at: Utc::now(),
        expired_at: Utc::now() + Duration::minutes(20),
        is_completed: false,
        score: None,
        points_earned: None,
    }
}

#[tokio::test]
async fn test_submit_answer_grades_against_correct_answer() {
    let quiz_id = Uuid::new_v4();
    let question = Question {
        id: Uuid::new_v4(),
        quiz_id,
        question_text: "2+2?".to_string(),
        question_type: "multiple_choice".to_string(),
        possible_answers: serde_json::json!(["3", "4"]),
        correct_answer: serde_json::json!("4"),
    };
    let repo = MockRepo {
        attempt: Some(open_attempt(quiz_id)),
        question: Some(question.clone()),
        ..Default::default()
    };
    let attempt_id = repo.attempt.as_ref().unwrap().id;

    let result = handlers::submit_answer(
        auth_user(),
        State(app_state(repo)),
        Path(attempt_id),
        axum::Json(SubmitAnswerRequest {
            question_id: question.id,
            user_answer: serde_json::json!("4"),
        }),
    )
    .await;

    let (status, axum::Json(answer)) = result.expect("answer should be recorded");
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(answer.is_correct, Some(true));
}

#[tokio::test]
async fn test_submit_answer_rejected_after_completion() {
    let quiz_id = Uuid::new_v4();
    let mut attempt = open_attempt(quiz_id);
    attempt.is_completed = true;

    let repo = MockRepo {
        attempt: Some(attempt.clone()),
        ..Default::default()
    };

    let result = handlers::submit_answer(
        auth_user(),
        State(app_state(repo)),
        Path(attempt.id),
        axum::Json(SubmitAnswerRequest {
            question_id: Uuid::new_v4(),
            user_answer: serde_json::json!("4"),
        }),
    )
    .await;

    let (status, Json(detail)) = result.err().expect("closed attempt must reject");
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(detail.detail, "Attempt is completed or expired");
}

#[tokio::test]
async fn test_submit_answer_rejected_after_expiry() {
    let quiz_id = Uuid::new_v4();
    let mut attempt = open_attempt(quiz_id);
    attempt.expired_at = Utc::now() - Duration::minutes(1);

    let repo = MockRepo {
        attempt: Some(attempt.clone()),
        ..Default::default()
    };

    let result = handlers::submit_answer(
        auth_user(),
        State(app_state(repo)),
        Path(attempt.id),
        axum::Json(SubmitAnswerRequest {
            question_id: Uuid::new_v4(),
            user_answer: serde_json::json!("4"),
        }),
    )
    .await;

    let (status, _) = result.err().expect("expired attempt must reject");
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_complete_attempt_scores_percentage_and_points() {
    let quiz_id = Uuid::new_v4();
    let attempt = open_attempt(quiz_id);
    let attempt_id = attempt.id;

    let answer = |correct: bool| AttemptAnswer {
        id: Uuid::new_v4(),
        attempt_id,
        question_id: Uuid::new_v4(),
        user_answer: Some(serde_json::json!("x")),
        is_correct: Some(correct),
    };

    let mut completed = attempt.clone();
    completed.is_completed = true;
    completed.score = Some(50);
    completed.points_earned = Some(20);

    let completion_input = Arc::new(Mutex::new(None));
    let repo = MockRepo {
        attempt: Some(attempt),
        answers: vec![answer(true), answer(false), answer(true), answer(false)],
        complete_result: Some(completed),
        completion_input: completion_input.clone(),
        ..Default::default()
    };

    let result =
        handlers::complete_attempt(auth_user(), State(app_state(repo)), Path(attempt_id)).await;

    let Json(graded) = result.expect("completion should succeed");
    assert!(graded.is_completed);

    // 2 of 4 correct: score is 50 percent, points are 10 per correct answer.
    assert_eq!(*completion_input.lock().unwrap(), Some((50, 20)));
    assert_eq!(graded.score, Some(50));
    assert_eq!(graded.points_earned, Some(20));
}

#[tokio::test]
async fn test_complete_attempt_twice_conflicts() {
    let quiz_id = Uuid::new_v4();
    let mut attempt = open_attempt(quiz_id);
    attempt.is_completed = true;

    // complete_result None models the repository's is_completed=false guard
    // matching no rows.
    let repo = MockRepo {
        attempt: Some(attempt.clone()),
        complete_result: None,
        ..Default::default()
    };

    let result =
        handlers::complete_attempt(auth_user(), State(app_state(repo)), Path(attempt.id)).await;

    let (status, Json(detail)) = result.err().expect("second completion must fail");
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(detail.detail, "Attempt already completed");
}

// --- Collection ---

#[tokio::test]
async fn test_get_collection_missing_is_not_found() {
    let result =
        handlers::get_collection(auth_user(), State(app_state(MockRepo::default()))).await;
    assert_eq!(result.err(), Some(StatusCode::NOT_FOUND));
}
