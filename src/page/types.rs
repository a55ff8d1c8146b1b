use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for one live page instance
pub type PageInstanceId = Uuid;

/// Identifier of a kind of page (an activity or fragment screen).
///
/// Each screen supplies its identifier when it reports lifecycle events, so
/// page comparison is plain string equality.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct PageId(String);

impl PageId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PageId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for PageId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// A live page: the kind of page plus the identity of this instance.
///
/// Two instances of the same screen share a [`PageId`] but never a
/// [`PageInstanceId`], which lets the tracker ignore out-of-order pause and
/// destroy callbacks from a screen that is no longer current.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PageRef {
    pub page: PageId,
    pub instance: PageInstanceId,
}

impl PageRef {
    /// Create a reference to a new instance of `page`
    pub fn new(page: impl Into<PageId>) -> Self {
        Self {
            page: page.into(),
            instance: Uuid::new_v4(),
        }
    }

    /// Check whether this instance is a page of the given kind
    pub fn is(&self, page: &PageId) -> bool {
        &self.page == page
    }
}

impl fmt::Display for PageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.page, self.instance)
    }
}

/// Observer notified whenever the visible page changes.
///
/// Observers that report [`is_satisfied`](Self::is_satisfied) after a check
/// are removed by the tracker; observers that always return `false` stay
/// registered until removed explicitly.
pub trait PageConditionObserver: Send + Sync {
    fn check(&self, activity: Option<&PageRef>, fragment: Option<&PageRef>);
    fn is_satisfied(&self) -> bool;
}
