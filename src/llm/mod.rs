// ABOUTME: LLM provider abstraction for the site chat assistant and website generator
// ABOUTME: Role-tagged messages plus a model id in, text plus token usage out
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # LLM Provider Interface
//!
//! Handlers talk to a `dyn LlmProvider` held in the server resources, so the
//! production OpenAI-compatible client and test doubles are interchangeable.
//!
//! ## Example
//!
//! ```rust,no_run
//! use atelier_server::llm::{ChatMessage, ChatRequest, LlmProvider};
//!
//! async fn example(provider: &dyn LlmProvider) {
//!     let request = ChatRequest::new(vec![
//!         ChatMessage::system("You are a helpful assistant."),
//!         ChatMessage::user("Do you build online shops?"),
//!     ]);
//!     let response = provider.complete(&request).await;
//! }
//! ```

mod openai_compatible;
pub mod prompts;

pub use openai_compatible::OpenAiCompatibleProvider;

use crate::errors::AppError;
use async_trait::async_trait;
pub use atelier_core::models::{MessageRole, TokenUsage};
use serde::{Deserialize, Serialize};

/// One role-tagged turn sent to the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who said it
    pub role: MessageRole,
    /// What was said
    pub content: String,
}

impl ChatMessage {
    /// Message with an explicit role, used when replaying stored history
    #[must_use]
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Instructions that frame the conversation
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Visitor input
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }
}

/// A completion request: the full prompt plus optional overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// System prompt, replayed history and the new user turn
    pub messages: Vec<ChatMessage>,
    /// Model override; `None` uses the provider's configured model
    pub model: Option<String>,
    /// Cap on generated tokens
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    /// Request with provider defaults
    #[must_use]
    pub const fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            model: None,
            max_tokens: None,
        }
    }

    /// Ask for a specific model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Limit the length of the reply
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Text produced by the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Reply text
    pub content: String,
    /// Model that actually answered
    pub model: String,
    /// Token accounting, when the provider reports it
    pub usage: Option<TokenUsage>,
    /// Why generation stopped
    pub finish_reason: Option<String>,
}

/// Chat completion backend
///
/// Calls are made once with no retry; a failure is reported to the visitor.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Model used when a request does not name one
    fn default_model(&self) -> &str;

    /// Run one completion
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, AppError>;
}
