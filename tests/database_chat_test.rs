// ABOUTME: Integration tests for the conversation store on a file-backed SQLite database
// ABOUTME: Ordering, ownership checks, message metadata and persistence across reopen
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use atelier_server::database::{AuthorizedConversation, Database};
use atelier_server::errors::ErrorCode;
use atelier_server::llm::{MessageRole, TokenUsage};
use atelier_server::models::{Caller, MessageMetadata, OwnerRef};
use common::init_test_logging;
use tempfile::TempDir;
use uuid::Uuid;

async fn file_database(dir: &TempDir) -> Database {
    pooled_file_database(dir, 2).await
}

async fn pooled_file_database(dir: &TempDir, connections: u32) -> Database {
    init_test_logging();
    let url = format!("sqlite:{}", dir.path().join("chat.db").display());
    Database::new(&url, connections).await.unwrap()
}

fn anonymous_caller(id: Uuid) -> Caller {
    Caller {
        account_id: None,
        anonymous_id: Some(id),
    }
}

#[tokio::test]
async fn test_messages_persist_across_reopen_in_order() {
    let dir = TempDir::new().unwrap();
    let conversation_id = {
        let database = file_database(&dir).await;
        let account = database
            .accounts()
            .create("ada@example.com", "hash", Some("Ada"))
            .await
            .unwrap();
        let chat = database.chat();
        let conversation = chat
            .create_conversation(&OwnerRef::Account(account.id), Some("Launch"))
            .await
            .unwrap();

        chat.create_message(conversation.id, MessageRole::User, "first", None)
            .await
            .unwrap();
        let metadata = MessageMetadata {
            model: Some("gpt-4o-mini".to_owned()),
            usage: Some(TokenUsage {
                prompt_tokens: 3,
                completion_tokens: 4,
                total_tokens: 7,
            }),
        };
        chat.create_message(conversation.id, MessageRole::Assistant, "second", Some(&metadata))
            .await
            .unwrap();
        chat.create_message(conversation.id, MessageRole::User, "third", None)
            .await
            .unwrap();
        database.close().await;
        conversation.id
    };

    let database = file_database(&dir).await;
    let messages = database.chat().get_messages(conversation_id).await.unwrap();
    let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, ["first", "second", "third"]);
    assert_eq!(messages[1].role, MessageRole::Assistant);
    let metadata = messages[1].metadata.as_ref().unwrap();
    assert_eq!(metadata.model.as_deref(), Some("gpt-4o-mini"));
    assert_eq!(metadata.usage.unwrap().total_tokens, 7);
    assert!(messages[0].metadata.is_none());
}

#[tokio::test]
async fn test_listing_orders_by_latest_activity() {
    let dir = TempDir::new().unwrap();
    let database = file_database(&dir).await;
    let store = database.anonymous_identities();
    let visitor = store.create("visitor-token").await.unwrap().id;
    let chat = database.chat();
    let owner = OwnerRef::Anonymous(visitor);

    let older = chat.create_conversation(&owner, Some("older")).await.unwrap();
    let newer = chat.create_conversation(&owner, Some("newer")).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    chat.create_message(older.id, MessageRole::User, "bump", None)
        .await
        .unwrap();

    let listed = chat.list_by_owner(&owner).await.unwrap();
    let ids: Vec<Uuid> = listed.iter().map(|c| c.id).collect();
    assert_eq!(ids, [older.id, newer.id]);

    let with_messages = chat.with_messages(&owner).await.unwrap();
    assert_eq!(with_messages[0].message_count, 1);
    assert_eq!(with_messages[1].message_count, 0);
}

#[tokio::test]
async fn test_authorization_follows_ownership() {
    let dir = TempDir::new().unwrap();
    let database = file_database(&dir).await;
    let store = database.anonymous_identities();
    let owner_id = store.create("owner-token").await.unwrap().id;
    let other_id = store.create("other-token").await.unwrap().id;
    let chat = database.chat();

    let conversation = chat
        .create_conversation(&OwnerRef::Anonymous(owner_id), None)
        .await
        .unwrap();

    let authorized = chat
        .authorize(conversation.id, &anonymous_caller(owner_id))
        .await
        .unwrap();
    let renamed = chat.rename_conversation(authorized, "Renamed").await.unwrap();
    assert_eq!(renamed.title.as_deref(), Some("Renamed"));
    assert!(renamed.updated_at >= conversation.updated_at);

    let denied = chat
        .authorize(conversation.id, &anonymous_caller(other_id))
        .await
        .unwrap_err();
    assert_eq!(denied.http_status(), 403);

    let missing = chat
        .authorize(Uuid::new_v4(), &anonymous_caller(owner_id))
        .await
        .unwrap_err();
    assert_eq!(missing.http_status(), 404);

    assert!(AuthorizedConversation::check(conversation, &Caller::default()).is_err());
}

#[tokio::test]
async fn test_message_for_unknown_conversation_is_not_found() {
    let dir = TempDir::new().unwrap();
    let database = file_database(&dir).await;

    let err = database
        .chat()
        .create_message(Uuid::new_v4(), MessageRole::User, "orphan", None)
        .await
        .unwrap_err();
    assert_eq!(err.http_status(), 404);
}

#[tokio::test]
async fn test_account_emails_are_normalized_and_unique() {
    let dir = TempDir::new().unwrap();
    let database = file_database(&dir).await;
    let accounts = database.accounts();

    let created = accounts
        .create("  Grace@Example.COM ", "hash", None)
        .await
        .unwrap();
    assert_eq!(created.email, "grace@example.com");

    let found = accounts.get_by_email("GRACE@example.com").await.unwrap().unwrap();
    assert_eq!(found.id, created.id);
    assert_eq!(accounts.get_by_id(created.id).await.unwrap().unwrap().email, created.email);

    let duplicate = accounts.create("grace@example.com", "hash", None).await.unwrap_err();
    assert_eq!(duplicate.http_status(), 409);
}

#[tokio::test]
async fn test_activity_time_never_moves_backwards() {
    let dir = TempDir::new().unwrap();
    let database = file_database(&dir).await;
    let account = database
        .accounts()
        .create("ada@example.com", "hash", None)
        .await
        .unwrap();
    let chat = database.chat();
    let conversation = chat
        .create_conversation(&OwnerRef::Account(account.id), None)
        .await
        .unwrap();

    // A writer that committed with a later timestamp than ours
    let later = "2999-01-01T00:00:00.000000Z";
    sqlx::query("UPDATE conversations SET last_message_at = $1 WHERE id = $2")
        .bind(later)
        .bind(conversation.id.to_string())
        .execute(database.pool())
        .await
        .unwrap();

    chat.create_message(conversation.id, MessageRole::User, "late commit", None)
        .await
        .unwrap();

    let stored = chat.get_conversation(conversation.id).await.unwrap().unwrap();
    assert_eq!(stored.last_message_at.to_rfc3339(), "2999-01-01T00:00:00+00:00");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_migration_racing_anonymous_writes_orphans_nothing() {
    const RACING_INSERTS: usize = 8;

    let dir = TempDir::new().unwrap();
    let database = pooled_file_database(&dir, 6).await;
    let account = database
        .accounts()
        .create("ada@example.com", "hash", None)
        .await
        .unwrap();
    let store = database.anonymous_identities();
    let visitor = store.create("racing-token").await.unwrap().id;
    let existing = database
        .chat()
        .create_conversation(&OwnerRef::Anonymous(visitor), Some("existing"))
        .await
        .unwrap()
        .id;

    let mut inserts = tokio::task::JoinSet::new();
    for i in 0..RACING_INSERTS {
        let chat = database.chat();
        inserts.spawn(async move {
            let title = format!("race {i}");
            chat.create_conversation(&OwnerRef::Anonymous(visitor), Some(title.as_str()))
                .await
        });
    }
    let mut replies = tokio::task::JoinSet::new();
    for i in 0..RACING_INSERTS {
        let chat = database.chat();
        replies.spawn(async move {
            chat.create_message(existing, MessageRole::User, &format!("reply {i}"), None)
                .await
        });
    }
    let moved = store.migrate_to_account(visitor, account.id).await.unwrap();

    let mut created = 0_u64;
    while let Some(result) = inserts.join_next().await {
        match result.unwrap() {
            Ok(conversation) => {
                assert_eq!(conversation.owner, OwnerRef::Anonymous(visitor));
                created += 1;
            }
            Err(e) => assert_eq!(e.code, ErrorCode::IdentityMigrated),
        }
    }
    while let Some(result) = replies.join_next().await {
        result.unwrap().unwrap();
    }

    // Every conversation that made it in was swept up by the migration
    assert_eq!(moved, created + 1);
    let (stranded,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM conversations WHERE anonymous_id = $1")
            .bind(visitor.to_string())
            .fetch_one(database.pool())
            .await
            .unwrap();
    assert_eq!(stranded, 0);

    let chat = database.chat();
    assert!(chat
        .list_by_owner(&OwnerRef::Anonymous(visitor))
        .await
        .unwrap()
        .is_empty());
    let owned = chat.list_by_owner(&OwnerRef::Account(account.id)).await.unwrap();
    assert_eq!(owned.len() as u64, moved);
    assert_eq!(
        chat.get_messages(existing).await.unwrap().len(),
        RACING_INSERTS
    );
    assert!(store.get(visitor).await.unwrap().unwrap().migrated);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_messages_read_back_in_creation_order() {
    let dir = TempDir::new().unwrap();
    let database = pooled_file_database(&dir, 6).await;
    let visitor = database
        .anonymous_identities()
        .create("busy-token")
        .await
        .unwrap()
        .id;
    let owner = OwnerRef::Anonymous(visitor);
    let conversation = database
        .chat()
        .create_conversation(&owner, None)
        .await
        .unwrap()
        .id;

    let mut writers = tokio::task::JoinSet::new();
    for i in 0..12 {
        let chat = database.chat();
        writers.spawn(async move {
            chat.create_message(conversation, MessageRole::User, &format!("m{i}"), None)
                .await
        });
    }
    let mut written = Vec::new();
    while let Some(result) = writers.join_next().await {
        written.push(result.unwrap().unwrap());
    }

    let chat = database.chat();
    let messages = chat.get_messages(conversation).await.unwrap();
    assert_eq!(messages.len(), written.len());
    assert!(messages
        .windows(2)
        .all(|pair| pair[0].created_at <= pair[1].created_at));

    // Rows with the same timestamp fall back to insertion order, so repeated
    // reads and the history view agree
    let again: Vec<Uuid> = chat
        .get_messages(conversation)
        .await
        .unwrap()
        .iter()
        .map(|m| m.id)
        .collect();
    let first: Vec<Uuid> = messages.iter().map(|m| m.id).collect();
    assert_eq!(first, again);
    let history = chat.with_messages(&owner).await.unwrap();
    let from_history: Vec<Uuid> = history[0].messages.iter().map(|m| m.id).collect();
    assert_eq!(first, from_history);
}
