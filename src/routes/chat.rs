// ABOUTME: Chat route handlers for the site assistant and conversation history
// ABOUTME: Anonymous visitors are tracked by cookie; signed-in visitors by account
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Chat routes
//!
//! Sending a message never requires a session. Without one, the visitor's
//! anonymous identity is resolved or minted and owns the conversation until
//! they register or log in.

use super::JsonBody;
use crate::errors::{AppError, AppResult};
use crate::llm::prompts::assistant_system_prompt;
use crate::llm::{ChatMessage, ChatRequest};
use crate::middleware::MaybeAccount;
use crate::models::{Caller, ConversationWithMessages, MessageMetadata, MessageRecord, MessageRole};
use crate::resources::ServerResources;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::cookie::SignedCookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Longest generated conversation title, in characters
const TITLE_MAX_CHARS: usize = 60;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Body of `POST /api/chat`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    /// Visitor's message
    #[serde(default)]
    pub message: Option<String>,
    /// Existing conversation to continue
    #[serde(default)]
    pub conversation_id: Option<Uuid>,
    /// Model override
    #[serde(default)]
    pub model: Option<String>,
}

/// Reply to `POST /api/chat`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResponse {
    /// Conversation the exchange was stored in
    pub conversation_id: Uuid,
    /// Stored visitor message
    pub user_message: MessageRecord,
    /// Stored assistant reply
    pub ai_response: MessageRecord,
}

/// Reply to `GET /api/conversations`
#[derive(Debug, Serialize)]
pub struct ConversationListResponse {
    /// Conversations with their messages, most recent activity first
    pub conversations: Vec<ConversationWithMessages>,
    /// Number of conversations
    pub total: usize,
}

/// Body of `PATCH /api/conversations/:id`
#[derive(Debug, Deserialize)]
pub struct RenameConversationRequest {
    /// New title
    #[serde(default)]
    pub title: Option<String>,
}

// ============================================================================
// Chat Routes
// ============================================================================

/// Chat routes handler
pub struct ChatRoutes;

impl ChatRoutes {
    /// Create all chat routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/chat", post(Self::send_message))
            .route("/api/conversations", get(Self::list_conversations))
            .route(
                "/api/conversations/:conversation_id",
                get(Self::get_conversation).patch(Self::rename_conversation),
            )
            .with_state(resources)
    }

    /// Caller for read paths: never mints an identity
    async fn resolve_caller(
        resources: &ServerResources,
        account: &MaybeAccount,
        jar: &SignedCookieJar,
    ) -> AppResult<Caller> {
        if let Some(account_id) = account.account_id() {
            return Ok(Caller {
                account_id: Some(account_id),
                anonymous_id: None,
            });
        }
        Ok(Caller {
            account_id: None,
            anonymous_id: resources.anonymous_identities.lookup(jar).await?,
        })
    }

    fn parse_conversation_id(raw: &str) -> AppResult<Uuid> {
        Uuid::parse_str(raw).map_err(|_| AppError::not_found("Conversation"))
    }

    fn title_from_message(message: &str) -> String {
        let mut title: String = message.chars().take(TITLE_MAX_CHARS).collect();
        if message.chars().count() > TITLE_MAX_CHARS {
            title.push_str("...");
        }
        title
    }

    // ========================================================================
    // Handlers
    // ========================================================================

    /// Store the visitor's message, ask the assistant, store and return its reply
    async fn send_message(
        State(resources): State<Arc<ServerResources>>,
        account: MaybeAccount,
        headers: HeaderMap,
        JsonBody(request): JsonBody<SendMessageRequest>,
    ) -> Result<Response, AppError> {
        let message = request
            .message
            .as_deref()
            .map(str::trim)
            .filter(|message| !message.is_empty())
            .ok_or_else(|| AppError::missing_fields(&["message"]))?
            .to_owned();

        let jar = resources.cookie_jar(&headers);
        let (jar, caller) = match account.account_id() {
            Some(account_id) => (
                jar,
                Caller {
                    account_id: Some(account_id),
                    anonymous_id: None,
                },
            ),
            None => {
                let (jar, anonymous_id) = resources.anonymous_identities.ensure(jar).await?;
                (
                    jar,
                    Caller {
                        account_id: None,
                        anonymous_id: Some(anonymous_id),
                    },
                )
            }
        };

        // A freshly minted identity already owns rows, so its cookie goes out
        // with every outcome from here on
        let outcome = Self::exchange(&resources, &caller, &message, request).await;
        Ok(match outcome {
            Ok(body) => (jar, Json(body)).into_response(),
            Err(error) => (jar, error).into_response(),
        })
    }

    /// Persist the visitor message, then the assistant's reply
    async fn exchange(
        resources: &ServerResources,
        caller: &Caller,
        message: &str,
        request: SendMessageRequest,
    ) -> AppResult<SendMessageResponse> {
        let owner = caller
            .owner()
            .ok_or_else(|| AppError::internal("Chat caller has no owner"))?;

        let conversation = match request.conversation_id {
            Some(id) => resources.chat.authorize(id, caller).await?.into_record(),
            None => {
                resources
                    .chat
                    .create_conversation(&owner, Some(&Self::title_from_message(message)))
                    .await?
            }
        };

        let user_message = resources
            .chat
            .create_message(conversation.id, MessageRole::User, message, None)
            .await?;

        let history = resources.chat.get_messages(conversation.id).await?;
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage::system(assistant_system_prompt()));
        messages.extend(
            history
                .iter()
                .filter(|stored| stored.role != MessageRole::System)
                .map(|stored| ChatMessage::new(stored.role, stored.content.clone())),
        );

        let mut chat_request = ChatRequest::new(messages);
        if let Some(model) = request.model.filter(|model| !model.trim().is_empty()) {
            chat_request = chat_request.with_model(model);
        }
        let reply = resources.llm_provider.complete(&chat_request).await?;

        let metadata = MessageMetadata {
            model: Some(reply.model.clone()),
            usage: reply.usage,
        };
        let ai_response = resources
            .chat
            .create_message(
                conversation.id,
                MessageRole::Assistant,
                &reply.content,
                Some(&metadata),
            )
            .await?;

        info!(
            conversation_id = %conversation.id,
            owner = ?owner,
            model = %reply.model,
            "Chat exchange stored"
        );

        Ok(SendMessageResponse {
            conversation_id: conversation.id,
            user_message,
            ai_response,
        })
    }

    /// History for the current visitor; empty when they have no identity
    async fn list_conversations(
        State(resources): State<Arc<ServerResources>>,
        account: MaybeAccount,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let jar = resources.cookie_jar(&headers);
        let caller = Self::resolve_caller(&resources, &account, &jar).await?;

        let conversations = match caller.owner() {
            Some(owner) => resources.chat.with_messages(&owner).await?,
            None => Vec::new(),
        };

        let total = conversations.len();
        Ok(Json(ConversationListResponse {
            conversations,
            total,
        })
        .into_response())
    }

    /// One conversation with its messages
    async fn get_conversation(
        State(resources): State<Arc<ServerResources>>,
        account: MaybeAccount,
        headers: HeaderMap,
        Path(conversation_id): Path<String>,
    ) -> Result<Response, AppError> {
        let id = Self::parse_conversation_id(&conversation_id)?;
        let jar = resources.cookie_jar(&headers);
        let caller = Self::resolve_caller(&resources, &account, &jar).await?;

        let authorized = resources.chat.authorize(id, &caller).await?;
        let conversation = resources
            .chat
            .conversation_with_messages(authorized.into_record())
            .await?;
        Ok(Json(conversation).into_response())
    }

    /// Rename a conversation the caller owns
    async fn rename_conversation(
        State(resources): State<Arc<ServerResources>>,
        account: MaybeAccount,
        headers: HeaderMap,
        Path(conversation_id): Path<String>,
        JsonBody(request): JsonBody<RenameConversationRequest>,
    ) -> Result<Response, AppError> {
        let title = request
            .title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .ok_or_else(|| AppError::missing_fields(&["title"]))?
            .to_owned();

        let id = Self::parse_conversation_id(&conversation_id)?;
        let jar = resources.cookie_jar(&headers);
        let caller = Self::resolve_caller(&resources, &account, &jar).await?;

        let authorized = resources.chat.authorize(id, &caller).await?;
        let renamed = resources
            .chat
            .rename_conversation(authorized, &title)
            .await?;
        Ok(Json(renamed).into_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_from_message_truncates_on_chars() {
        assert_eq!(ChatRoutes::title_from_message("Hello"), "Hello");
        let long = "é".repeat(70);
        let title = ChatRoutes::title_from_message(&long);
        assert_eq!(title.chars().count(), TITLE_MAX_CHARS + 3);
        assert!(title.ends_with("..."));
    }
}
