// ABOUTME: Anonymous visitor identities and the exclusive ownership reference for conversations
// ABOUTME: OwnerRef makes "both owners" and "no owner" unrepresentable
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A visitor tracked by cookie before they hold an account
///
/// Identities are never deleted. Once `migrated` is set the identity no longer
/// resolves from its cookie and cannot own new conversations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnonymousIdentity {
    /// Identity ID
    pub id: Uuid,
    /// Opaque token carried by the signed cookie
    #[serde(skip_serializing)]
    pub token: String,
    /// When the identity was minted
    pub created_at: DateTime<Utc>,
    /// Whether the identity's history was transferred to an account
    pub migrated: bool,
    /// When the transfer happened
    pub migrated_at: Option<DateTime<Utc>>,
    /// Account that received the history
    pub migrated_to: Option<Uuid>,
}

/// Owner of a conversation: exactly one of an account or an anonymous identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum OwnerRef {
    /// Durable account
    Account(Uuid),
    /// Cookie-tracked anonymous identity
    Anonymous(Uuid),
}

impl OwnerRef {
    /// Account ID when account-owned
    #[must_use]
    pub const fn account_id(&self) -> Option<Uuid> {
        match self {
            Self::Account(id) => Some(*id),
            Self::Anonymous(_) => None,
        }
    }

    /// Anonymous identity ID when anonymously owned
    #[must_use]
    pub const fn anonymous_id(&self) -> Option<Uuid> {
        match self {
            Self::Account(_) => None,
            Self::Anonymous(id) => Some(*id),
        }
    }

    /// Rebuild from the two nullable storage columns
    ///
    /// Returns `None` unless exactly one column is set.
    #[must_use]
    pub const fn from_columns(account_id: Option<Uuid>, anonymous_id: Option<Uuid>) -> Option<Self> {
        match (account_id, anonymous_id) {
            (Some(id), None) => Some(Self::Account(id)),
            (None, Some(id)) => Some(Self::Anonymous(id)),
            _ => None,
        }
    }
}

/// Who is making a request, as resolved by the session layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Caller {
    /// Verified account from the session token
    pub account_id: Option<Uuid>,
    /// Anonymous identity from the signed cookie
    pub anonymous_id: Option<Uuid>,
}

impl Caller {
    /// Owner used for new conversations and history; the account wins when both are present
    #[must_use]
    pub const fn owner(&self) -> Option<OwnerRef> {
        match (self.account_id, self.anonymous_id) {
            (Some(id), _) => Some(OwnerRef::Account(id)),
            (None, Some(id)) => Some(OwnerRef::Anonymous(id)),
            (None, None) => None,
        }
    }

    /// Whether this caller may act on something owned by `owner`
    #[must_use]
    pub fn owns(&self, owner: &OwnerRef) -> bool {
        match owner {
            OwnerRef::Account(id) => self.account_id == Some(*id),
            OwnerRef::Anonymous(id) => self.anonymous_id == Some(*id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_from_columns_requires_exactly_one() {
        let id = Uuid::new_v4();
        assert_eq!(OwnerRef::from_columns(Some(id), None), Some(OwnerRef::Account(id)));
        assert_eq!(OwnerRef::from_columns(None, Some(id)), Some(OwnerRef::Anonymous(id)));
        assert_eq!(OwnerRef::from_columns(Some(id), Some(id)), None);
        assert_eq!(OwnerRef::from_columns(None, None), None);
    }

    #[test]
    fn test_caller_prefers_account() {
        let account = Uuid::new_v4();
        let anonymous = Uuid::new_v4();
        let caller = Caller {
            account_id: Some(account),
            anonymous_id: Some(anonymous),
        };
        assert_eq!(caller.owner(), Some(OwnerRef::Account(account)));
        assert!(caller.owns(&OwnerRef::Anonymous(anonymous)));
        assert!(!caller.owns(&OwnerRef::Account(Uuid::new_v4())));
        assert_eq!(Caller::default().owner(), None);
    }
}
