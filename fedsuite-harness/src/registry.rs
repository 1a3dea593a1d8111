//! Registry of the instances under test

use crate::session::Session;
use fedsuite_client::forms::Login;
use fedsuite_client::{FederatedApi, HttpClient};
use fedsuite_core::config::{HttpConfig, InstanceConfig};
use fedsuite_core::{Credentials, Error, Instance, Jwt, RemoteErrorKind, Result, SuiteConfig};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info};

struct Entry {
    instance: Instance,
    api: Arc<dyn FederatedApi>,
    credentials: Option<Credentials>,
}

/// Named instance endpoints and their seed credentials.
///
/// Built once per run and passed by reference.
#[derive(Default)]
pub struct InstanceRegistry {
    entries: Vec<Entry>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with an HTTP client for every configured instance.
    pub fn from_config(config: &SuiteConfig) -> Result<Self> {
        let mut registry = Self::new();
        for instance in &config.instances {
            registry.register_http(instance, &config.http)?;
        }
        Ok(registry)
    }

    /// Register an instance served by `api`.
    pub fn register(&mut self, instance: Instance, api: Arc<dyn FederatedApi>) -> Result<&Instance> {
        if self.entries.iter().any(|e| e.instance.name == instance.name) {
            return Err(Error::configuration(format!(
                "instance {} is already registered",
                instance.name
            )));
        }
        debug!(instance = %instance, "Registering instance");
        self.entries.push(Entry {
            instance,
            api,
            credentials: None,
        });
        Ok(&self.entries[self.entries.len() - 1].instance)
    }

    pub fn register_http(&mut self, config: &InstanceConfig, http: &HttpConfig) -> Result<&Instance> {
        let instance = Instance::from_config(config)?;
        let client = HttpClient::new(&instance.base_url, http)?;
        self.register(instance, Arc::new(client))
    }

    fn entry(&self, name: &str) -> Result<&Entry> {
        self.entries
            .iter()
            .find(|e| e.instance.name == name)
            .ok_or_else(|| Error::configuration(format!("unknown instance {}", name)))
    }

    fn entry_mut(&mut self, name: &str) -> Result<&mut Entry> {
        self.entries
            .iter_mut()
            .find(|e| e.instance.name == name)
            .ok_or_else(|| Error::configuration(format!("unknown instance {}", name)))
    }

    pub fn instance(&self, name: &str) -> Result<&Instance> {
        self.entry(name).map(|e| &e.instance)
    }

    pub fn instances(&self) -> impl Iterator<Item = &Instance> {
        self.entries.iter().map(|e| &e.instance)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.instance.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Log in on `name` and keep the credential on the instance.
    ///
    /// Rejected credentials fail with an auth error; nothing is retried.
    pub async fn login(&mut self, name: &str, credentials: &Credentials) -> Result<Session> {
        let (instance, api) = {
            let entry = self.entry(name)?;
            (entry.instance.clone(), entry.api.clone())
        };
        let jwt = authenticate(api.as_ref(), credentials).await?;
        let entry = self.entry_mut(name)?;
        entry.instance.jwt = Some(jwt.clone());
        entry.credentials = Some(credentials.clone());
        info!(instance = name, user = %credentials.username_or_email, "Logged in");
        Ok(Session::new(instance, api, credentials.clone(), jwt))
    }

    /// Log every seed user in concurrently.
    pub async fn login_all(&mut self, password: &str) -> Result<Vec<Session>> {
        let logins = self.entries.iter().map(|entry| {
            let instance = entry.instance.clone();
            let api = entry.api.clone();
            let credentials = Credentials::new(&instance.seed_user, password);
            async move {
                let jwt = authenticate(api.as_ref(), &credentials).await?;
                Ok::<_, Error>((instance, api, credentials, jwt))
            }
        });

        let mut sessions = Vec::with_capacity(self.entries.len());
        for result in join_all(logins).await {
            let (instance, api, credentials, jwt) = result?;
            let entry = self.entry_mut(&instance.name)?;
            entry.instance.jwt = Some(jwt.clone());
            entry.credentials = Some(credentials.clone());
            sessions.push(Session::new(instance, api, credentials, jwt));
        }
        info!(count = sessions.len(), "Logged in all seed users");
        Ok(sessions)
    }

    /// Seed user session of a logged-in instance.
    pub fn session(&self, name: &str) -> Result<Session> {
        let entry = self.entry(name)?;
        match (&entry.instance.jwt, &entry.credentials) {
            (Some(jwt), Some(credentials)) => Ok(Session::new(
                entry.instance.clone(),
                entry.api.clone(),
                credentials.clone(),
                jwt.clone(),
            )),
            _ => Err(Error::configuration(format!(
                "instance {} has not logged in yet",
                name
            ))),
        }
    }

    /// Seed user sessions of all instances, in registration order.
    pub fn sessions(&self) -> Result<Vec<Session>> {
        self.entries
            .iter()
            .map(|e| self.session(&e.instance.name))
            .collect()
    }
}

pub(crate) async fn authenticate(api: &dyn FederatedApi, credentials: &Credentials) -> Result<Jwt> {
    let response = api
        .login(&Login {
            username_or_email: credentials.username_or_email.clone(),
            password: credentials.password.clone(),
        })
        .await?;
    response.jwt.ok_or_else(|| Error::Auth {
        operation: "login".to_string(),
        kind: RemoteErrorKind::new("missing_jwt"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fake_registry;
    use std::time::Duration;

    fn registry() -> (fedsuite_client::fake::FakeFederation, InstanceRegistry) {
        fake_registry(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_login_all_attaches_credentials() {
        let (federation, mut registry) = registry();
        assert!(registry.session("alpha").is_err());

        let sessions = registry.login_all("lemmylemmy").await.unwrap();
        assert_eq!(sessions.len(), 5);
        assert!(registry.instances().all(|i| i.is_logged_in()));
        assert_eq!(registry.session("gamma").unwrap().username(), "lemmy_gamma");
        assert_eq!(federation.calls("epsilon", "login"), 1);
    }

    #[tokio::test]
    async fn test_rejected_login_is_auth_error() {
        let (_federation, mut registry) = registry();
        let err = registry
            .login("alpha", &Credentials::new("lemmy_alpha", "wrong"))
            .await
            .unwrap_err();
        assert!(err.is_auth());
        assert!(!registry.instance("alpha").unwrap().is_logged_in());
    }

    #[test]
    fn test_unknown_and_duplicate_instances() {
        let (federation, mut registry) = registry();
        let err = registry.instance("zeta").unwrap_err();
        assert_eq!(err.category(), "configuration");

        let alpha = registry.instance("alpha").unwrap().clone();
        assert!(registry
            .register(alpha, federation.instance("alpha"))
            .is_err());
        assert_eq!(registry.len(), 5);
    }

    #[test]
    fn test_from_config_builds_http_clients() {
        let registry = InstanceRegistry::from_config(&SuiteConfig::default()).unwrap();
        assert_eq!(
            registry.names(),
            vec!["alpha", "beta", "gamma", "delta", "epsilon"]
        );
        assert_eq!(registry.instance("beta").unwrap().domain, "lemmy-beta:8551");
    }
}
