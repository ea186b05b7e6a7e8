use chainrun_core::config::GatewayConfig;
use chainrun_core::types::UserId;

/// Result of a successful authentication.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthResult {
    pub name: String,
    pub user_id: UserId,
}

/// Match a bearer key against the configured API keys.
///
/// Returns `None` when the key is missing or unknown. There is no anonymous
/// access: every workflow belongs to a user.
pub fn validate_bearer(config: &GatewayConfig, bearer: Option<&str>) -> Option<AuthResult> {
    let bearer = bearer?.trim();
    if bearer.is_empty() {
        return None;
    }
    config
        .api_keys
        .iter()
        .find(|ak| ak.key == bearer)
        .map(|ak| AuthResult {
            name: ak.name.clone(),
            user_id: ak.user_id,
        })
}

/// Pull the token out of an `Authorization: Bearer <token>` header value.
pub fn extract_bearer(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
}
