// ABOUTME: Session continuity for visitors who have not signed in yet
// ABOUTME: Cookie-backed anonymous identities and their transfer to an account
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Identity
//!
//! A visitor without a session gets an opaque token in a signed cookie. The
//! token maps to an [`AnonymousIdentity`](crate::models::AnonymousIdentity)
//! row that owns their conversations until they register or log in, at which
//! point [`SessionMigrator`] hands everything over to the account.

/// Anonymous identity cookie management
pub mod anonymous;
/// Anonymous-to-account history transfer
pub mod migration;

pub use anonymous::AnonymousIdentityManager;
pub use migration::SessionMigrator;
