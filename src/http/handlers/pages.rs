//! HTML page handlers.
//!
//! Pages are minimal server-rendered shells; the interesting behavior is
//! upstream in the pipeline. Forms embed the CSRF token the middleware
//! issued for this request.

use axum::extract::Extension;
use axum::response::Html;

use crate::middleware::csrf::CsrfToken;
use crate::session::Principal;

fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\n<html><head><title>{title}</title></head><body>{body}</body></html>"
    ))
}

/// Hidden input carrying the CSRF token for a rendered form.
fn csrf_field(token: Option<&CsrfToken>) -> String {
    match token {
        Some(CsrfToken(value)) => {
            format!(r#"<input type="hidden" name="_csrf" value="{value}">"#)
        }
        None => String::new(),
    }
}

/// Error banner shown when a form post bounces back to its page.
fn error_banner(error: Option<&str>) -> String {
    match error {
        Some(message) => format!(r#"<p class="error">{message}</p>"#),
        None => String::new(),
    }
}

pub async fn home() -> Html<String> {
    page("Home", "<h1>Collect form submissions without a backend</h1>")
}

/// The auth handlers call the render functions directly when a browser
/// form post fails, so the page comes back with the error in place.
pub fn render_login(token: Option<&CsrfToken>, error: Option<&str>) -> Html<String> {
    let field = csrf_field(token);
    let banner = error_banner(error);
    page(
        "Log in",
        &format!(
            r#"{banner}<form method="post" action="/login">{field}<input name="email"><input name="password" type="password"><button>Log in</button></form>"#
        ),
    )
}

pub fn render_signup(token: Option<&CsrfToken>, error: Option<&str>) -> Html<String> {
    let field = csrf_field(token);
    let banner = error_banner(error);
    page(
        "Sign up",
        &format!(
            r#"{banner}<form method="post" action="/signup">{field}<input name="email"><input name="name"><input name="password" type="password"><button>Sign up</button></form>"#
        ),
    )
}

pub fn render_reset_password(token: Option<&CsrfToken>, error: Option<&str>) -> Html<String> {
    let field = csrf_field(token);
    let banner = error_banner(error);
    page(
        "Reset password",
        &format!(
            r#"{banner}<form method="post" action="/reset-password">{field}<input name="email"><button>Send reset link</button></form>"#
        ),
    )
}

pub async fn login_page(token: Option<Extension<CsrfToken>>) -> Html<String> {
    render_login(token.as_deref(), None)
}

pub async fn signup_page(token: Option<Extension<CsrfToken>>) -> Html<String> {
    render_signup(token.as_deref(), None)
}

pub async fn reset_password_page(token: Option<Extension<CsrfToken>>) -> Html<String> {
    render_reset_password(token.as_deref(), None)
}

pub async fn demo() -> Html<String> {
    page("Demo", "<h1>Demo form</h1>")
}

pub async fn dashboard(
    Extension(principal): Extension<Principal>,
    token: Option<Extension<CsrfToken>>,
) -> Html<String> {
    let user = match &principal {
        Principal::Authenticated { user_id, .. } => user_id.clone(),
        Principal::Anonymous => String::new(),
    };
    let field = csrf_field(token.as_deref());
    page(
        "Dashboard",
        &format!(
            r#"<h1>Dashboard</h1><p data-user="{user}">Your forms</p><form method="post" action="/logout">{field}<button>Log out</button></form>"#
        ),
    )
}

pub async fn profile() -> Html<String> {
    page("Profile", "<h1>Profile</h1>")
}

pub async fn settings() -> Html<String> {
    page("Settings", "<h1>Settings</h1>")
}

pub async fn forms_index() -> Html<String> {
    page("Forms", "<h1>Your forms</h1>")
}

pub async fn admin() -> Html<String> {
    page("Admin", "<h1>Admin</h1>")
}
