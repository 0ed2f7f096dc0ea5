use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Defines the routes accessible to any user who has passed the
/// authentication layer. This covers the whole per-user surface: profile,
/// mood tracking, quizzes and attempts, scores, preferences, the collection
/// aggregate, and the harmful-content checker.
///
/// Access Control Strategy:
/// Every handler in this module relies on the `AuthUser` extractor middleware
/// being present on the router layer above. Handlers therefore always receive
/// a validated `AuthUser` with the user's ID, which is used for all
/// Owner-Only authorization checks (e.g. in `add_question`).
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // POST /check_harmful
        // Runs the harmful-content pipeline: headless render, text plus
        // screenshot extraction, structured model verdict. Failures collapse
        // to the neutral response; only the URL shape is a client error.
        .route("/check_harmful", post(handlers::check_harmful))
        // GET/DELETE /me
        // The authenticated user's profile, and full account deletion.
        // Deletion cascades through every dependent table.
        .route("/me", get(handlers::get_me).delete(handlers::delete_me))
        // --- Mood Tracking ---
        // POST/GET /me/moods
        // Records today's mood (one entry per day, 409 on repeats) and lists
        // the history newest first.
        .route(
            "/me/moods",
            post(handlers::record_mood).get(handlers::get_my_moods),
        )
        // --- Quizzes ---
        // POST/GET /quizzes
        // Creates a quiz owned by the caller; lists the caller's quizzes.
        .route(
            "/quizzes",
            post(handlers::create_quiz).get(handlers::get_my_quizzes),
        )
        // GET /quizzes/{id}
        // Single quiz lookup, available to any authenticated user.
        .route("/quizzes/{id}", get(handlers::get_quiz_details))
        // POST/GET /quizzes/{id}/questions
        // Adding questions is Owner-Only; reading them is open so other
        // users can take the quiz.
        .route(
            "/quizzes/{id}/questions",
            post(handlers::add_question).get(handlers::get_questions),
        )
        // --- Attempts ---
        // POST /quizzes/{id}/attempts
        // Opens a 20-minute attempt window against an existing quiz.
        .route("/quizzes/{id}/attempts", post(handlers::start_attempt))
        // POST /attempts/{id}/answers
        // Records one graded answer; rejected once the attempt is completed
        // or past its expiry.
        .route("/attempts/{id}/answers", post(handlers::submit_answer))
        // POST /attempts/{id}/complete
        // Grades and closes the attempt, then folds the result into the
        // daily score and the collection aggregate.
        .route("/attempts/{id}/complete", post(handlers::complete_attempt))
        // --- Scores, Preferences, Collection ---
        // GET /me/scores
        // Daily score history, newest first.
        .route("/me/scores", get(handlers::get_my_scores))
        // GET/PUT /me/preferences
        // Opaque preference document; PUT replaces it wholesale.
        .route(
            "/me/preferences",
            get(handlers::get_preferences).put(handlers::set_preferences),
        )
        // GET /me/collection
        // Aggregate progress row; 404 until the first completed attempt.
        .route("/me/collection", get(handlers::get_collection))
}
