// ABOUTME: System prompts for LLM interactions loaded at compile time
// ABOUTME: One prompt for the site chat assistant and one for website generation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # System Prompts
//!
//! Prompts live in markdown files next to this module so they can be edited
//! without touching code.

/// Chat assistant system prompt
pub const ASSISTANT_SYSTEM_PROMPT: &str = include_str!("assistant_system.md");

/// Website generator system prompt
pub const WEBSITE_SYSTEM_PROMPT: &str = include_str!("website_system.md");

/// System prompt prepended to every chat completion
#[must_use]
pub const fn assistant_system_prompt() -> &'static str {
    ASSISTANT_SYSTEM_PROMPT
}

/// System prompt for single-page website generation
#[must_use]
pub const fn website_system_prompt() -> &'static str {
    WEBSITE_SYSTEM_PROMPT
}

/// User prompt for website generation, naming the business when given
#[must_use]
pub fn website_user_prompt(prompt: &str, business_name: Option<&str>) -> String {
    match business_name.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => format!("Business name: {name}\n\n{prompt}"),
        None => prompt.to_owned(),
    }
}
