//! Shorthand locators accepted by an instance's object resolver

use crate::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use url::Url;

static SHORTHAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([!@])([A-Za-z0-9_]+)@([A-Za-z0-9.\-]+(?::[0-9]{1,5})?)$")
        .expect("shorthand locator pattern is valid")
});

/// A string the remote resolves literally: `!community@host:port`,
/// `@person@host:port` or a canonical object URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Locator {
    Community { name: String, domain: String },
    Person { name: String, domain: String },
    Uri(Url),
}

impl Locator {
    pub fn community<N: Into<String>, D: Into<String>>(name: N, domain: D) -> Self {
        Self::Community {
            name: name.into(),
            domain: domain.into(),
        }
    }

    pub fn person<N: Into<String>, D: Into<String>>(name: N, domain: D) -> Self {
        Self::Person {
            name: name.into(),
            domain: domain.into(),
        }
    }

    pub fn uri(uri: Url) -> Self {
        Self::Uri(uri)
    }

    /// Domain the locator points at, including the port if present.
    pub fn domain(&self) -> Option<String> {
        match self {
            Locator::Community { domain, .. } | Locator::Person { domain, .. } => {
                Some(domain.clone())
            }
            Locator::Uri(url) => url.host_str().map(|host| match url.port() {
                Some(port) => format!("{}:{}", host, port),
                None => host.to_string(),
            }),
        }
    }

    pub fn is_shorthand(&self) -> bool {
        !matches!(self, Locator::Uri(_))
    }
}

impl FromStr for Locator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some(caps) = SHORTHAND.captures(s) {
            let name = caps[2].to_string();
            let domain = caps[3].to_string();
            return Ok(match &caps[1] {
                "!" => Locator::Community { name, domain },
                _ => Locator::Person { name, domain },
            });
        }

        if s.starts_with('!') || s.starts_with('@') {
            return Err(Error::InvalidLocator(s.to_string()));
        }

        match Url::parse(s) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(Locator::Uri(url)),
            _ => Err(Error::InvalidLocator(s.to_string())),
        }
    }
}

impl TryFrom<String> for Locator {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Locator> for String {
    fn from(locator: Locator) -> Self {
        locator.to_string()
    }
}

impl From<Url> for Locator {
    fn from(url: Url) -> Self {
        Locator::Uri(url)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Community { name, domain } => write!(f, "!{}@{}", name, domain),
            Locator::Person { name, domain } => write!(f, "@{}@{}", name, domain),
            Locator::Uri(url) => f.write_str(url.as_str()),
        }
    }
}
