//! Booking service routes

use axum::{
    Form, Json, Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{
    booking::BookingForm,
    error::{AppError, AppResult},
    oauth::AuthorizationState,
    session::{
        ACCESS_TOKEN_MAX_AGE, AUTHORIZATION_STATE_MAX_AGE, CookieSession, SessionKey,
        SessionStore,
    },
    settings::CALLBACK_PATH,
    state::AppState,
    views::{self, BookingPage, LoginPage},
};

/// Query string of the OAuth2 redirect
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Create the router for the booking service
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index).post(create_booking))
        .route(CALLBACK_PATH, get(callback))
        .route("/logout", get(logout))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "booking-service"
    }))
}

/// Booking form for signed-in users, login page otherwise
pub async fn index(State(state): State<AppState>, session: CookieSession) -> AppResult<Response> {
    match session.get(SessionKey::AccessToken) {
        Some(access_token) => render_form(&state, &access_token).await,
        None => render_login_page(&state, session),
    }
}

async fn render_form(state: &AppState, access_token: &str) -> AppResult<Response> {
    let events = state
        .calendar_client
        .list_upcoming_events(access_token)
        .await?;
    info!("Rendering booking form with {} events", events.len());

    let page = BookingPage {
        events,
        timezone: state.calendar_client.timezone().to_string(),
    };

    Ok(views::render(&page)?.into_response())
}

fn render_login_page(state: &AppState, mut session: CookieSession) -> AppResult<Response> {
    info!("No access token, rendering login page");

    let request = state.oauth_client.authorization_request();
    session.set(
        SessionKey::AuthorizationState,
        request.state.encode(),
        AUTHORIZATION_STATE_MAX_AGE,
    );

    let page = LoginPage {
        authorization_url: request.url,
    };

    Ok((session, views::render(&page)?).into_response())
}

/// OAuth2 redirect target: exchange the code for an access token
pub async fn callback(
    State(state): State<AppState>,
    mut session: CookieSession,
    Query(query): Query<CallbackQuery>,
) -> AppResult<Response> {
    if let Some(error) = query.error {
        return Err(AppError::Authorization(
            query.error_description.unwrap_or(error),
        ));
    }

    let pending = session
        .get(SessionKey::AuthorizationState)
        .and_then(|value| AuthorizationState::decode(&value))
        .ok_or(AppError::InvalidState)?;

    let returned_state = query.state.ok_or(AppError::InvalidState)?;
    if !pending.matches(&returned_state) {
        warn!("OAuth state mismatch on callback");
        return Err(AppError::InvalidState);
    }

    let code = query
        .code
        .ok_or_else(|| AppError::BadRequest("missing authorization code".to_string()))?;

    let access_token = state
        .oauth_client
        .exchange_code(code, pending.pkce_verifier)
        .await?;
    info!("Authorization completed");

    session.set(SessionKey::AccessToken, access_token, ACCESS_TOKEN_MAX_AGE);
    session.expire(SessionKey::AuthorizationState);

    Ok((session, redirect_home()).into_response())
}

/// Booking form submission
pub async fn create_booking(
    State(state): State<AppState>,
    session: CookieSession,
    Form(form): Form<BookingForm>,
) -> AppResult<Response> {
    let Some(access_token) = session.get(SessionKey::AccessToken) else {
        info!("Booking submitted without access token, redirecting to login");
        return Ok(redirect_home());
    };

    let event = form.into_event()?;
    state
        .calendar_client
        .create_event(&access_token, &event)
        .await?;
    info!("Booked {} at {}", event.room, event.start);

    Ok(redirect_home())
}

/// Forget the access token
pub async fn logout(mut session: CookieSession) -> Response {
    info!("Logout request");
    session.expire(SessionKey::AccessToken);
    (session, redirect_home()).into_response()
}

fn redirect_home() -> Response {
    (StatusCode::FOUND, [(header::LOCATION, "/")]).into_response()
}
