use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Telegram user id of a message sender.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct OwnerId(pub i64);

/// Destination chat: either a numeric id or an `@channel` username.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ChatId(pub String);

impl ChatId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<i64> for ChatId {
    fn from(id: i64) -> Self {
        ChatId(id.to_string())
    }
}

impl From<&str> for ChatId {
    fn from(id: &str) -> Self {
        ChatId(id.to_string())
    }
}

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identities allowed to run privileged commands. Fixed at startup.
#[derive(Debug, Clone, Default)]
pub struct OwnerSet {
    owners: HashSet<OwnerId>,
}

impl OwnerSet {
    pub fn new(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            owners: ids.into_iter().map(OwnerId).collect(),
        }
    }

    pub fn is_owner(&self, id: OwnerId) -> bool {
        self.owners.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}
