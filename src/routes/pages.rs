// ABOUTME: Placeholder HTML pages for the marketing site, auth forms and dashboard
// ABOUTME: Access rules for these paths are enforced by the request gateway
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use axum::extract::Path;
use axum::response::Html;
use axum::routing::get;
use axum::Router;

/// Page routes handler
pub struct PageRoutes;

impl PageRoutes {
    /// Create all page routes
    pub fn routes() -> Router {
        Router::new()
            .route("/", get(|| async { page("Atelier", "Websites for small businesses.") }))
            .route("/login", get(|| async { page("Log in", "Sign in to your account.") }))
            .route("/register", get(|| async { page("Register", "Create an account.") }))
            .route("/dashboard", get(|| async { page("Dashboard", "Your projects.") }))
            .route("/dashboard/*rest", get(Self::dashboard_section))
    }

    async fn dashboard_section(Path(rest): Path<String>) -> Html<String> {
        page("Dashboard", &format!("Section: {}", html_escape(&rest)))
    }
}

fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!doctype html>\n<html lang=\"en\"><head><meta charset=\"utf-8\"><title>{title}</title></head>\
         <body><main><h1>{title}</h1><p>{body}</p></main></body></html>"
    ))
}

fn html_escape(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '<' => "&lt;".to_owned(),
            '>' => "&gt;".to_owned(),
            '&' => "&amp;".to_owned(),
            '"' => "&quot;".to_owned(),
            '\'' => "&#39;".to_owned(),
            other => other.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("<b>\"x\"&'y'"), "&lt;b&gt;&quot;x&quot;&amp;&#39;y&#39;");
    }
}
