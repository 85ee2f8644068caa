use serde::{Deserialize, Serialize};

/// A single scraped item. Deals live for one cycle and are never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Deal {
    pub title: String,
    pub link: String,
}

impl Deal {
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
        }
    }
}
