//! HTML pages

use askama::Template;
use axum::response::Html;
use common::calendar::CalendarEvent;

use crate::error::AppResult;

/// Page shown to visitors without an access token
#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginPage {
    pub authorization_url: String,
}

/// Upcoming events and the booking form
#[derive(Template)]
#[template(path = "form.html")]
pub struct BookingPage {
    pub events: Vec<CalendarEvent>,
    pub timezone: String,
}

pub fn render<T: Template>(page: &T) -> AppResult<Html<String>> {
    Ok(Html(page.render()?))
}
