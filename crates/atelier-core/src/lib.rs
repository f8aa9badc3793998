// ABOUTME: Core types and constants for the Atelier session continuity layer
// ABOUTME: Foundation crate with error handling, domain models, and constants
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![deny(unsafe_code)]

//! # Atelier Core
//!
//! Foundation crate providing shared types and constants for the Atelier
//! server. This crate is designed to change infrequently, enabling
//! incremental compilation benefits in the workspace.
//!
//! ## Modules
//!
//! - **errors**: Unified error handling with `AppError` and `ErrorCode`
//! - **models**: Accounts, anonymous identities, conversations, and messages
//! - **constants**: Cookie names, lifetimes, and default route policy

/// Unified error handling system with standard error codes and HTTP responses
pub mod errors;

/// Application constants organized by domain
pub mod constants;

/// Core data models (accounts, identities, conversations, messages)
pub mod models;
