// ABOUTME: Core data models shared by storage, identity, and HTTP layers
// ABOUTME: Accounts, anonymous identities, conversation ownership, and messages
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

mod account;
mod conversation;
mod identity;

pub use account::{AccountRecord, AccountSummary};
pub use conversation::{
    ConversationRecord, ConversationWithMessages, MessageMetadata, MessageRecord, MessageRole,
    TokenUsage,
};
pub use identity::{AnonymousIdentity, Caller, OwnerRef};
