// ABOUTME: Clients for the third-party services the site calls on a visitor's behalf
// ABOUTME: Payments (Stripe) and scheduling (Calendly), plus shared HTTP error mapping
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! External API Clients
//!
//! Every call is awaited with the configured provider timeout and never
//! retried. Timeouts and provider failures surface as 503 errors; a
//! provider's 4xx rejection is forwarded with its own status and message.

/// Shared reqwest client construction and error mapping
pub mod http;
/// Payment intent creation
pub mod payments;
/// Available slot lookup
pub mod scheduling;

pub use payments::{CreatePaymentIntent, PaymentIntent, PaymentsClient};
pub use scheduling::{AvailableSlots, SchedulingClient};
