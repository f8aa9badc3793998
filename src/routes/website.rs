// ABOUTME: Website generation route for signed-in accounts
// ABOUTME: Asks the LLM for a single self-contained HTML page from a business description
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use super::JsonBody;
use crate::errors::AppError;
use crate::llm::prompts::{website_system_prompt, website_user_prompt};
use crate::llm::{ChatMessage, ChatRequest, TokenUsage};
use crate::middleware::CurrentAccount;
use crate::resources::ServerResources;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Output ceiling for a generated page
const WEBSITE_MAX_TOKENS: u32 = 4096;

/// Body of `POST /api/generate-website`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateWebsiteRequest {
    /// Description of the site to build
    #[serde(default)]
    pub prompt: Option<String>,
    /// Business name to feature
    #[serde(default)]
    pub business_name: Option<String>,
}

/// Reply to `POST /api/generate-website`
#[derive(Debug, Serialize)]
pub struct GenerateWebsiteResponse {
    /// Generated HTML document
    pub html: String,
    /// Model that produced it
    pub model: String,
    /// Token accounting, when the provider reports it
    pub usage: Option<TokenUsage>,
}

/// Remove a surrounding markdown code fence, if the model added one
#[must_use]
pub fn strip_code_fence(output: &str) -> &str {
    let trimmed = output.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`html`) on the opening fence line
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Website generation routes handler
pub struct WebsiteRoutes;

impl WebsiteRoutes {
    /// Create all website generation routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/generate-website", post(Self::generate))
            .with_state(resources)
    }

    async fn generate(
        State(resources): State<Arc<ServerResources>>,
        current: CurrentAccount,
        JsonBody(request): JsonBody<GenerateWebsiteRequest>,
    ) -> Result<Response, AppError> {
        let prompt = request
            .prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| AppError::missing_fields(&["prompt"]))?;

        let chat_request = ChatRequest::new(vec![
            ChatMessage::system(website_system_prompt()),
            ChatMessage::user(website_user_prompt(prompt, request.business_name.as_deref())),
        ])
        .with_max_tokens(WEBSITE_MAX_TOKENS);

        let response = resources.llm_provider.complete(&chat_request).await?;
        info!(
            account_id = %current.account_id,
            model = %response.model,
            "Website generated"
        );

        Ok(Json(GenerateWebsiteResponse {
            html: strip_code_fence(&response.content).to_owned(),
            model: response.model,
            usage: response.usage,
        })
        .into_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("<html></html>"), "<html></html>");
        assert_eq!(
            strip_code_fence("```html\n<html></html>\n```"),
            "<html></html>"
        );
        assert_eq!(strip_code_fence("  ```\n<p>x</p>\n```  "), "<p>x</p>");
    }
}
