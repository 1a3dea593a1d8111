//! Core domain models for the fedsuite harness
//!
//! This crate contains the types shared by the API client, the harness and
//! the scenario runner: instances under test, federated object identities,
//! shorthand locators, subscription state, entity views, the error taxonomy
//! and suite configuration.

pub mod config;
pub mod error;
pub mod instance;
pub mod locator;
pub mod object;
pub mod random;
pub mod subscription;
pub mod views;

pub use config::SuiteConfig;
pub use error::{Error, RemoteErrorKind, Result};
pub use instance::{Credentials, Instance, Jwt};
pub use locator::Locator;
pub use object::{
    CommentId, CommunityId, InstanceId, NotificationId, ObjectRef, PersonId, PostId,
    PrivateMessageId, ReportId, TagId,
};
pub use random::{random_name, random_string};
pub use subscription::{CommunityFollowerState, FollowTracker, SubscribedType};
