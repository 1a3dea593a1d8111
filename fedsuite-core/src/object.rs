//! Identifiers for federated objects
//!
//! Numeric ids are local to the instance that issued them and must never be
//! compared across instances. [`ObjectRef`] is the cross-instance identity.

use crate::locator::Locator;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

macro_rules! local_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

local_id!(
    /// Instance-local community id
    CommunityId
);
local_id!(
    /// Instance-local post id
    PostId
);
local_id!(
    /// Instance-local comment id
    CommentId
);
local_id!(
    /// Instance-local person id
    PersonId
);
local_id!(
    /// Instance-local private message id
    PrivateMessageId
);
local_id!(
    /// Instance-local community tag id
    TagId
);
local_id!(ReportId);
local_id!(NotificationId);
local_id!(InstanceId);

/// Stable, instance-independent identity (`ap_id`) of a federated object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectRef(Url);

impl ObjectRef {
    pub fn new(url: Url) -> Self {
        Self(url)
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Host and port of the instance that created the object.
    pub fn home_domain(&self) -> Option<String> {
        Locator::Uri(self.0.clone()).domain()
    }

    pub fn to_locator(&self) -> Locator {
        Locator::Uri(self.0.clone())
    }
}

impl From<Url> for ObjectRef {
    fn from(url: Url) -> Self {
        Self(url)
    }
}

impl From<&ObjectRef> for Locator {
    fn from(object: &ObjectRef) -> Self {
        object.to_locator()
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_ref_home_domain() {
        let r = ObjectRef::new(Url::parse("http://lemmy-beta:8551/post/12").unwrap());
        assert_eq!(r.home_domain().as_deref(), Some("lemmy-beta:8551"));
        assert_eq!(r.to_locator().to_string(), "http://lemmy-beta:8551/post/12");
    }

    #[test]
    fn test_ids_are_transparent() {
        let id: PostId = serde_json::from_str("42").unwrap();
        assert_eq!(id, PostId(42));
        assert_eq!(serde_json::to_string(&CommunityId(7)).unwrap(), "7");
    }
}
