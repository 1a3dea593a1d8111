//! Authenticated actors on one instance

use fedsuite_client::FederatedApi;
use fedsuite_core::{Credentials, Instance, Jwt, Locator};
use std::fmt;
use std::sync::Arc;

/// An instance plus the credential of one actor on it.
///
/// Several sessions may share an instance endpoint with distinct
/// credentials, e.g. the seed admin and a freshly registered user.
#[derive(Clone)]
pub struct Session {
    instance: Instance,
    api: Arc<dyn FederatedApi>,
    credentials: Credentials,
    jwt: Jwt,
}

impl Session {
    pub fn new(
        instance: Instance,
        api: Arc<dyn FederatedApi>,
        credentials: Credentials,
        jwt: Jwt,
    ) -> Self {
        Self {
            instance,
            api,
            credentials,
            jwt,
        }
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn name(&self) -> &str {
        &self.instance.name
    }

    pub fn username(&self) -> &str {
        &self.credentials.username_or_email
    }

    pub(crate) fn password(&self) -> &str {
        &self.credentials.password
    }

    pub fn api(&self) -> &dyn FederatedApi {
        self.api.as_ref()
    }

    pub(crate) fn api_handle(&self) -> Arc<dyn FederatedApi> {
        self.api.clone()
    }

    pub fn jwt(&self) -> &Jwt {
        &self.jwt
    }

    pub(crate) fn auth(&self) -> Option<&Jwt> {
        Some(&self.jwt)
    }

    /// Same actor presenting `jwt` instead of its own token.
    pub fn with_jwt(&self, jwt: Jwt) -> Session {
        Session {
            jwt,
            ..self.clone()
        }
    }

    /// `@user@domain` locator of this session's actor.
    pub fn person_locator(&self) -> Locator {
        self.instance.person_locator(self.username())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("instance", &self.instance.name)
            .field("username", &self.username())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.username(), self.instance.name)
    }
}
