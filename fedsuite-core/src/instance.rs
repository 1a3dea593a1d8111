//! Instances under test and their credentials

use crate::{config::InstanceConfig, locator::Locator, Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Opaque bearer credential returned by login or registration.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Jwt(String);

impl Jwt {
    pub fn new<S: Into<String>>(token: S) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for Jwt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Jwt(***)")
    }
}

/// Login credentials for one account.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username_or_email: String,
    pub password: String,
}

impl Credentials {
    pub fn new<U: Into<String>, P: Into<String>>(username_or_email: U, password: P) -> Self {
        Self {
            username_or_email: username_or_email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username_or_email", &self.username_or_email)
            .field("password", &"***")
            .finish()
    }
}

/// One running server under test.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub name: String,
    pub base_url: Url,
    /// Host and port other instances federate with, e.g. `lemmy-alpha:8541`.
    pub domain: String,
    pub seed_user: String,
    /// Seed user credential, attached after login.
    pub jwt: Option<Jwt>,
}

impl Instance {
    pub fn new<N: Into<String>, D: Into<String>, U: Into<String>>(
        name: N,
        base_url: Url,
        domain: D,
        seed_user: U,
    ) -> Self {
        Self {
            name: name.into(),
            base_url,
            domain: domain.into(),
            seed_user: seed_user.into(),
            jwt: None,
        }
    }

    pub fn from_config(config: &InstanceConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            Error::configuration(format!(
                "instance {} has invalid base_url {}: {}",
                config.name, config.base_url, e
            ))
        })?;
        Ok(Self::new(
            &config.name,
            base_url,
            &config.domain,
            &config.seed_user,
        ))
    }

    pub fn is_logged_in(&self) -> bool {
        self.jwt.is_some()
    }

    /// Federation host without the port, as used by the instance allow list.
    pub fn host(&self) -> &str {
        self.domain
            .split_once(':')
            .map(|(host, _)| host)
            .unwrap_or(&self.domain)
    }

    /// `!name@domain` locator for a community homed on this instance.
    pub fn community_locator(&self, name: &str) -> Locator {
        Locator::community(name, &self.domain)
    }

    /// `@name@domain` locator for a person homed on this instance.
    pub fn person_locator(&self, name: &str) -> Locator {
        Locator::person(name, &self.domain)
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.base_url)
    }
}
