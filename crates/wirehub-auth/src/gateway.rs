//! Auth gateway — verifies route credentials against the token store.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use wirehub_core::config::tokens::TokensConfig;
use wirehub_core::{AppError, AppResult};
use wirehub_plugin::routes::{RouteGuard, RouteRequest, TokenRequirement};

use crate::tokens::TokenStore;

/// Verifier capability built from the static token table.
///
/// The gateway itself is stateless beyond its configuration; per-route
/// verifiers produced by [`verifier`](Self::verifier) are spliced into the
/// route table as each route's first prerequisite.
#[derive(Debug, Clone)]
pub struct AuthGateway {
    store: Arc<TokenStore>,
    token_name: String,
    enabled: bool,
}

impl AuthGateway {
    /// Creates a gateway over a token store.
    pub fn new(store: TokenStore, token_name: &str, enabled: bool) -> Self {
        Self {
            store: Arc::new(store),
            token_name: token_name.to_string(),
            enabled,
        }
    }

    /// Creates a gateway from the tokens configuration section.
    pub fn from_config(config: &TokensConfig) -> AppResult<Self> {
        Ok(Self::new(
            TokenStore::from_config(config)?,
            &config.name,
            config.enabled,
        ))
    }

    /// The configured credential name.
    pub fn token_name(&self) -> &str {
        &self.token_name
    }

    /// Whether token checking is enforced.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Verifies an extracted credential against the allowed groups.
    ///
    /// Accepts iff checking is disabled, or the credential matches a secret
    /// registered under an allowed group (`None` = any group). Rejection is
    /// a forbidden error.
    pub fn authorize(&self, credential: Option<&str>, groups: Option<&[String]>) -> AppResult<()> {
        if !self.enabled {
            return Ok(());
        }

        match credential {
            Some(secret) if self.store.is_valid(secret, groups) => Ok(()),
            _ => {
                debug!(groups = ?groups, "Credential rejected");
                Err(AppError::forbidden("could not validate credentials"))
            }
        }
    }

    /// Extracts the credential from a request and verifies it.
    ///
    /// Extraction precedence is query parameter, then header, then cookie,
    /// under the requirement's token name (falling back to the gateway's).
    pub fn verify_request(
        &self,
        request: &RouteRequest,
        requirement: &TokenRequirement,
    ) -> AppResult<()> {
        let name = requirement
            .token_name
            .as_deref()
            .unwrap_or(&self.token_name);
        let credential = request.credential(name);
        self.authorize(credential, requirement.groups.as_deref())
    }

    /// Produces the route guard spliced in front of a token-gated route.
    pub fn verifier(&self, requirement: &TokenRequirement) -> Arc<dyn RouteGuard> {
        Arc::new(AuthVerifier {
            gateway: self.clone(),
            requirement: requirement.clone(),
        })
    }
}

/// Route guard bound to one route's token requirement.
struct AuthVerifier {
    gateway: AuthGateway,
    requirement: TokenRequirement,
}

#[async_trait]
impl RouteGuard for AuthVerifier {
    async fn check(&self, request: &RouteRequest) -> AppResult<()> {
        self.gateway.verify_request(request, &self.requirement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn gateway(enabled: bool) -> AuthGateway {
        let mut groups = HashMap::new();
        groups.insert(
            "admin".to_string(),
            HashMap::from([("alice".to_string(), "secretA".to_string())]),
        );
        AuthGateway::new(TokenStore::from_groups(groups), "token", enabled)
    }

    fn request_with_query(token: &str) -> RouteRequest {
        let mut request = RouteRequest::default();
        request.query.insert("token".to_string(), token.to_string());
        request
    }

    #[test]
    fn accepts_valid_group_secret() {
        let gateway = gateway(true);
        let requirement = TokenRequirement::group("admin");
        assert!(
            gateway
                .verify_request(&request_with_query("secretA"), &requirement)
                .is_ok()
        );
    }

    #[test]
    fn rejects_secret_from_other_group() {
        let gateway = gateway(true);
        let requirement = TokenRequirement::group("ops");
        let err = gateway
            .verify_request(&request_with_query("secretA"), &requirement)
            .unwrap_err();
        assert_eq!(err.kind, wirehub_core::error::ErrorKind::Forbidden);
    }

    #[test]
    fn rejects_missing_credential() {
        let gateway = gateway(true);
        let requirement = TokenRequirement::any_group();
        let err = gateway
            .verify_request(&RouteRequest::default(), &requirement)
            .unwrap_err();
        assert_eq!(err.kind, wirehub_core::error::ErrorKind::Forbidden);
    }

    #[test]
    fn disabled_gateway_accepts_everything() {
        let gateway = gateway(false);
        assert!(
            gateway
                .verify_request(&RouteRequest::default(), &TokenRequirement::group("admin"))
                .is_ok()
        );
        assert!(
            gateway
                .verify_request(&request_with_query("junk"), &TokenRequirement::group("ops"))
                .is_ok()
        );
    }

    #[test]
    fn extraction_precedence_query_header_cookie() {
        let gateway = gateway(true);
        let requirement = TokenRequirement::group("admin");

        // Valid cookie alone is accepted.
        let mut request = RouteRequest::default();
        request
            .cookies
            .insert("token".to_string(), "secretA".to_string());
        assert!(gateway.verify_request(&request, &requirement).is_ok());

        // An invalid header shadows the valid cookie.
        request
            .headers
            .insert("token".to_string(), "wrong".to_string());
        assert!(gateway.verify_request(&request, &requirement).is_err());

        // A valid query parameter shadows the invalid header.
        request
            .query
            .insert("token".to_string(), "secretA".to_string());
        assert!(gateway.verify_request(&request, &requirement).is_ok());
    }

    #[test]
    fn per_route_token_name_override() {
        let gateway = gateway(true);
        let requirement = TokenRequirement::group("admin").with_token_name("api-key");

        let mut request = RouteRequest::default();
        request
            .headers
            .insert("api-key".to_string(), "secretA".to_string());
        assert!(gateway.verify_request(&request, &requirement).is_ok());
    }

    #[tokio::test]
    async fn verifier_guard_checks_requests() {
        let gateway = gateway(true);
        let guard = gateway.verifier(&TokenRequirement::group("admin"));

        assert!(guard.check(&request_with_query("secretA")).await.is_ok());
        assert!(guard.check(&request_with_query("wrong")).await.is_err());
    }
}
