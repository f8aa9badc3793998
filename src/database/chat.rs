// ABOUTME: Database operations for chat conversations and their append-only messages
// ABOUTME: Owner-scoped listing, store-clock ordering, and access-checked renames
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use super::{format_timestamp, now, parse_optional_uuid, parse_timestamp, parse_uuid};
use crate::errors::{AppError, AppResult};
use crate::models::{
    Caller, ConversationRecord, ConversationWithMessages, MessageMetadata, MessageRecord,
    MessageRole, OwnerRef, TokenUsage,
};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

const CONVERSATION_COLUMNS: &str =
    "id, title, account_id, anonymous_id, last_message_at, created_at, updated_at";

// ============================================================================
// Access control
// ============================================================================

/// A conversation the current caller has been verified to own
///
/// Only [`AuthorizedConversation::check`] constructs this type, so mutating
/// operations that take it cannot run without an ownership check.
#[derive(Debug, Clone)]
pub struct AuthorizedConversation(ConversationRecord);

impl AuthorizedConversation {
    /// Verify that `caller` owns `conversation`
    ///
    /// # Errors
    ///
    /// Returns `PERMISSION_DENIED` when the caller is not the owner
    pub fn check(conversation: ConversationRecord, caller: &Caller) -> AppResult<Self> {
        if caller.owns(&conversation.owner) {
            Ok(Self(conversation))
        } else {
            Err(AppError::permission_denied(
                "Conversation belongs to another user",
            ))
        }
    }

    /// The verified conversation
    #[must_use]
    pub const fn record(&self) -> &ConversationRecord {
        &self.0
    }

    /// Unwrap the verified conversation
    #[must_use]
    pub fn into_record(self) -> ConversationRecord {
        self.0
    }
}

// ============================================================================
// Chat Manager
// ============================================================================

/// Chat database operations manager
pub struct ChatManager {
    pool: SqlitePool,
}

impl ChatManager {
    /// Create a new chat manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ========================================================================
    // Conversation Operations
    // ========================================================================

    /// Create a new conversation owned by `owner`
    ///
    /// Anonymous inserts only succeed while the identity is live, checked in
    /// the same statement, so a conversation can never be attached to an
    /// identity whose history was already transferred.
    ///
    /// # Errors
    ///
    /// Returns `IDENTITY_MIGRATED` for a migrated identity, `RESOURCE_NOT_FOUND`
    /// for an unknown one, or a database error if the insert fails
    pub async fn create_conversation(
        &self,
        owner: &OwnerRef,
        title: Option<&str>,
    ) -> AppResult<ConversationRecord> {
        let id = Uuid::new_v4();
        let created_at = now();
        let timestamp = format_timestamp(&created_at);

        let inserted = match owner {
            OwnerRef::Account(account_id) => sqlx::query(
                r"
                INSERT INTO conversations (id, title, account_id, anonymous_id, last_message_at, created_at, updated_at)
                VALUES ($1, $2, $3, NULL, $4, $4, $4)
                ",
            )
            .bind(id.to_string())
            .bind(title)
            .bind(account_id.to_string())
            .bind(&timestamp)
            .execute(&self.pool)
            .await,
            OwnerRef::Anonymous(anonymous_id) => sqlx::query(
                r"
                INSERT INTO conversations (id, title, account_id, anonymous_id, last_message_at, created_at, updated_at)
                SELECT $1, $2, NULL, $3, $4, $4, $4
                WHERE EXISTS (
                    SELECT 1 FROM anonymous_identities WHERE id = $3 AND migrated = 0
                )
                ",
            )
            .bind(id.to_string())
            .bind(title)
            .bind(anonymous_id.to_string())
            .bind(&timestamp)
            .execute(&self.pool)
            .await,
        }
        .map_err(|e| AppError::database(format!("Failed to create conversation: {e}")))?;

        if inserted.rows_affected() == 0 {
            return Err(self.inactive_identity_error(owner).await);
        }

        Ok(ConversationRecord {
            id,
            title: title.map(ToOwned::to_owned),
            owner: *owner,
            last_message_at: created_at,
            created_at,
            updated_at: created_at,
        })
    }

    async fn inactive_identity_error(&self, owner: &OwnerRef) -> AppError {
        let Some(anonymous_id) = owner.anonymous_id() else {
            return AppError::internal("Conversation insert affected no rows");
        };
        let exists = sqlx::query("SELECT 1 FROM anonymous_identities WHERE id = $1")
            .bind(anonymous_id.to_string())
            .fetch_optional(&self.pool)
            .await;
        match exists {
            Ok(Some(_)) => AppError::identity_migrated(),
            Ok(None) => AppError::not_found("Anonymous identity"),
            Err(e) => AppError::database(format!("Failed to check anonymous identity: {e}")),
        }
    }

    /// Get a conversation by ID without any ownership filter
    ///
    /// Callers at the API boundary must pass the result through
    /// [`AuthorizedConversation::check`].
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_conversation(&self, id: Uuid) -> AppResult<Option<ConversationRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = $1"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get conversation: {e}")))?;

        row.as_ref().map(row_to_conversation).transpose()
    }

    /// Load a conversation and verify the caller owns it
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_NOT_FOUND` for an unknown ID and `PERMISSION_DENIED`
    /// when another owner holds it
    pub async fn authorize(&self, id: Uuid, caller: &Caller) -> AppResult<AuthorizedConversation> {
        let conversation = self
            .get_conversation(id)
            .await?
            .ok_or_else(|| AppError::not_found("Conversation"))?;
        AuthorizedConversation::check(conversation, caller)
    }

    /// Conversations owned by an account, most recent activity first
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn list_for_account(&self, account_id: Uuid) -> AppResult<Vec<ConversationRecord>> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {CONVERSATION_COLUMNS} FROM conversations
            WHERE account_id = $1
            ORDER BY last_message_at DESC, created_at DESC
            "
        ))
        .bind(account_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list account conversations: {e}")))?;

        rows.iter().map(row_to_conversation).collect()
    }

    /// Conversations owned by an anonymous identity, most recent activity first
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn list_for_anonymous(
        &self,
        anonymous_id: Uuid,
    ) -> AppResult<Vec<ConversationRecord>> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {CONVERSATION_COLUMNS} FROM conversations
            WHERE anonymous_id = $1
            ORDER BY last_message_at DESC, created_at DESC
            "
        ))
        .bind(anonymous_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::database(format!("Failed to list anonymous conversations: {e}"))
        })?;

        rows.iter().map(row_to_conversation).collect()
    }

    /// Conversations of exactly one owner
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn list_by_owner(&self, owner: &OwnerRef) -> AppResult<Vec<ConversationRecord>> {
        match owner {
            OwnerRef::Account(id) => self.list_for_account(*id).await,
            OwnerRef::Anonymous(id) => self.list_for_anonymous(*id).await,
        }
    }

    /// Every conversation of `owner` with its ordered messages
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails
    pub async fn with_messages(&self, owner: &OwnerRef) -> AppResult<Vec<ConversationWithMessages>> {
        let conversations = self.list_by_owner(owner).await?;
        let mut result = Vec::with_capacity(conversations.len());
        for conversation in conversations {
            result.push(self.conversation_with_messages(conversation).await?);
        }
        Ok(result)
    }

    /// Attach the ordered message list to a conversation
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn conversation_with_messages(
        &self,
        conversation: ConversationRecord,
    ) -> AppResult<ConversationWithMessages> {
        let messages = self.get_messages(conversation.id).await?;
        Ok(ConversationWithMessages::new(conversation, messages))
    }

    /// Rename a conversation the caller has been verified to own
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails or the conversation vanished
    pub async fn rename_conversation(
        &self,
        conversation: AuthorizedConversation,
        title: &str,
    ) -> AppResult<ConversationRecord> {
        let updated_at = now();
        let mut record = conversation.into_record();

        let result = sqlx::query("UPDATE conversations SET title = $1, updated_at = $2 WHERE id = $3")
            .bind(title)
            .bind(format_timestamp(&updated_at))
            .bind(record.id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to rename conversation: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Conversation"));
        }

        record.title = Some(title.to_owned());
        record.updated_at = updated_at;
        Ok(record)
    }

    // ========================================================================
    // Message Operations
    // ========================================================================

    /// Append a message and bump the conversation's activity timestamps
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_NOT_FOUND` for an unknown conversation, or a database
    /// error if either statement fails
    pub async fn create_message(
        &self,
        conversation_id: Uuid,
        role: MessageRole,
        content: &str,
        metadata: Option<&MessageMetadata>,
    ) -> AppResult<MessageRecord> {
        let id = Uuid::new_v4();
        let created_at = now();
        let timestamp = format_timestamp(&created_at);
        let usage = metadata.and_then(|m| m.usage);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))?;

        // Writers may commit out of timestamp order; never move the activity time back
        let touched = sqlx::query(
            r"
            UPDATE conversations
            SET last_message_at = MAX(last_message_at, $1), updated_at = MAX(updated_at, $1)
            WHERE id = $2
            ",
        )
        .bind(&timestamp)
        .bind(conversation_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to update conversation: {e}")))?
        .rows_affected();

        if touched == 0 {
            return Err(AppError::not_found("Conversation"));
        }

        sqlx::query(
            r"
            INSERT INTO messages (id, conversation_id, role, content, model, prompt_tokens, completion_tokens, total_tokens, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(id.to_string())
        .bind(conversation_id.to_string())
        .bind(role.as_str())
        .bind(content)
        .bind(metadata.and_then(|m| m.model.as_deref()))
        .bind(usage.map(|u| i64::from(u.prompt_tokens)))
        .bind(usage.map(|u| i64::from(u.completion_tokens)))
        .bind(usage.map(|u| i64::from(u.total_tokens)))
        .bind(&timestamp)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to add message: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit message: {e}")))?;

        Ok(MessageRecord {
            id,
            conversation_id,
            role,
            content: content.to_owned(),
            created_at,
            metadata: metadata.cloned(),
        })
    }

    /// Messages of a conversation in creation order
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_messages(&self, conversation_id: Uuid) -> AppResult<Vec<MessageRecord>> {
        let rows = sqlx::query(
            r"
            SELECT id, conversation_id, role, content, model, prompt_tokens, completion_tokens, total_tokens, created_at
            FROM messages
            WHERE conversation_id = $1
            ORDER BY created_at ASC, seq ASC
            ",
        )
        .bind(conversation_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get messages: {e}")))?;

        rows.iter().map(row_to_message).collect()
    }
}

fn row_to_conversation(row: &SqliteRow) -> AppResult<ConversationRecord> {
    let id = parse_uuid(row.get("id"))?;
    let owner = OwnerRef::from_columns(
        parse_optional_uuid(row.get("account_id"))?,
        parse_optional_uuid(row.get("anonymous_id"))?,
    )
    .ok_or_else(|| AppError::database(format!("Conversation {id} has no single owner")))?;

    Ok(ConversationRecord {
        id,
        title: row.get("title"),
        owner,
        last_message_at: parse_timestamp(row.get("last_message_at"))?,
        created_at: parse_timestamp(row.get("created_at"))?,
        updated_at: parse_timestamp(row.get("updated_at"))?,
    })
}

fn row_to_message(row: &SqliteRow) -> AppResult<MessageRecord> {
    let role: &str = row.get("role");
    let role = role
        .parse::<MessageRole>()
        .map_err(|e| AppError::database(format!("Invalid stored message: {e}")))?;

    let model: Option<String> = row.get("model");
    let usage = match (
        row.get::<Option<i64>, _>("prompt_tokens"),
        row.get::<Option<i64>, _>("completion_tokens"),
        row.get::<Option<i64>, _>("total_tokens"),
    ) {
        (Some(prompt), Some(completion), Some(total)) => Some(TokenUsage {
            prompt_tokens: u32::try_from(prompt).unwrap_or(u32::MAX),
            completion_tokens: u32::try_from(completion).unwrap_or(u32::MAX),
            total_tokens: u32::try_from(total).unwrap_or(u32::MAX),
        }),
        _ => None,
    };
    let metadata = (model.is_some() || usage.is_some()).then_some(MessageMetadata { model, usage });

    Ok(MessageRecord {
        id: parse_uuid(row.get("id"))?,
        conversation_id: parse_uuid(row.get("conversation_id"))?,
        role,
        content: row.get("content"),
        created_at: parse_timestamp(row.get("created_at"))?,
        metadata,
    })
}
