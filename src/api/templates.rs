//! HTML pages.

use crate::discord::User;
use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use tracing::error;

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexPage {
    pub title: &'static str,
    pub user: Option<User>,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginPage {
    pub title: &'static str,
    pub user: Option<User>,
    pub oauth2_link: String,
}

/// Page that forwards the browser to an external link.
#[derive(Template)]
#[template(path = "redirect.html")]
pub struct RedirectPage {
    pub title: &'static str,
    pub user: Option<User>,
    pub redirect_url: &'static str,
}

#[derive(Template)]
#[template(path = "404.html")]
pub struct NotFoundPage {
    pub title: &'static str,
    pub user: Option<User>,
}

/// Render a template, turning render errors into a bare 500.
pub fn render<T: Template>(template: &T) -> Response {
    match template.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!("Template render error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
        }
    }
}
