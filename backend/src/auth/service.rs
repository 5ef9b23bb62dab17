//! Core business logic for the authentication system.
//!
//! Resolves the `Authorization` header into an [`AuthContext`]: bearer
//! parsing, token verification through the identity provider, the whitelist
//! gate and the user-record sync. Also owns the admin check and the startup
//! whitelist seed.

use super::errors::AuthError;
use super::models::{AuthContext, CurrentUser};
use crate::config::Config;
use crate::database::queries::{self, UserSync};
use crate::database::{Database, DbResult};
use crate::errors::AppResult;
use adapters::identity::SupabaseIdentity;
use adapters::IdentityProvider;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct AuthService {
    enabled: bool,
    identity: Option<Arc<dyn IdentityProvider>>,
    admin_emails: Vec<String>,
    db: Database,
}

impl AuthService {
    pub fn new(config: &Config, identity: Option<Arc<dyn IdentityProvider>>, db: Database) -> Self {
        Self {
            enabled: config.auth_enabled(),
            identity,
            admin_emails: config.admin_emails.clone(),
            db,
        }
    }

    /// Builds the service with the Supabase identity provider when it is configured.
    pub fn from_config(config: &Config, db: Database) -> Self {
        let identity: Option<Arc<dyn IdentityProvider>> =
            match SupabaseIdentity::new(&config.supabase_url, &config.supabase_service_key) {
                Ok(identity) => Some(Arc::new(identity)),
                Err(err) => {
                    if config.auth_enabled() {
                        warn!("Authentication is enabled but token verification is unavailable: {err}");
                    }
                    None
                }
            };
        Self::new(config, identity, db)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_admin(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        !email.is_empty() && self.admin_emails.iter().any(|admin| *admin == email)
    }

    /// Authenticates a request from its `Authorization` header value.
    pub async fn authenticate(&self, header: Option<&str>) -> AppResult<AuthContext> {
        if !self.enabled {
            return Ok(AuthContext::default());
        }

        let token = parse_bearer(header)?;
        let identity = self.identity.as_ref().ok_or(AuthError::NotConfigured)?;
        let verified = identity
            .verify_token(token)
            .await
            .map_err(AuthError::from)?;

        let is_admin = self.is_admin(&verified.email);
        if !is_admin {
            let email = verified.email.clone();
            let allowed = self
                .db
                .call(move |conn| queries::is_email_allowed(conn, &email))
                .await?;
            if !allowed {
                warn!("Rejected login for email outside the whitelist");
                return Err(AuthError::EmailNotAllowed.into());
            }
        }

        let user = verified.clone();
        self.db
            .call(move |conn| {
                queries::get_or_create_user(
                    conn,
                    &UserSync {
                        id: &user.id,
                        email: &user.email,
                        display_name: user.display_name.as_deref(),
                        avatar_url: user.avatar_url.as_deref(),
                    },
                )
            })
            .await?;
        debug!(user_id = %verified.id, "Request authenticated");

        Ok(AuthContext {
            user: Some(CurrentUser {
                id: verified.id,
                email: verified.email,
                role: verified.role,
                display_name: verified.display_name,
                avatar_url: verified.avatar_url,
                is_admin,
            }),
        })
    }

    /// Passes everything through when auth is disabled.
    pub fn require_admin(&self, context: &AuthContext) -> Result<(), AuthError> {
        if !self.enabled {
            return Ok(());
        }
        match &context.user {
            Some(user) if self.is_admin(&user.email) => Ok(()),
            _ => Err(AuthError::AdminRequired),
        }
    }

    /// Seeds the whitelist from `emails` when it is empty. Returns how many were added.
    pub async fn seed_whitelist(&self, emails: Vec<String>) -> DbResult<usize> {
        let added = self
            .db
            .call(move |conn| {
                if queries::count_allowed_emails(conn)? > 0 {
                    return Ok(0);
                }
                let mut added = 0;
                for email in emails.iter().filter(|email| !email.trim().is_empty()) {
                    queries::add_allowed_email(conn, email, Some("system"))?;
                    added += 1;
                }
                Ok(added)
            })
            .await?;
        if added > 0 {
            info!("Seeded whitelist with {added} emails");
        }
        Ok(added)
    }
}

/// Extracts the token from `Bearer <token>` (scheme case-insensitive).
pub fn parse_bearer(header: Option<&str>) -> Result<&str, AuthError> {
    let header = header.ok_or(AuthError::MissingHeader)?;
    let mut parts = header.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        _ => Err(AuthError::InvalidHeader),
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_bearer, AuthService};
    use crate::auth::errors::AuthError;
    use crate::auth::models::{AuthContext, CurrentUser};
    use crate::config::Config;
    use crate::database::Database;

    #[test]
    fn bearer_parsing() {
        assert!(matches!(parse_bearer(None), Err(AuthError::MissingHeader)));
        assert!(matches!(parse_bearer(Some("Token abc")), Err(AuthError::InvalidHeader)));
        assert!(matches!(parse_bearer(Some("Bearer a b")), Err(AuthError::InvalidHeader)));
        assert!(matches!(parse_bearer(Some("Bearer")), Err(AuthError::InvalidHeader)));
        assert_eq!(parse_bearer(Some("bearer abc")).unwrap(), "abc");
    }

    #[tokio::test]
    async fn disabled_auth_is_unscoped_and_admin() {
        let db = Database::open_in_memory().unwrap();
        let auth = AuthService::new(&Config::default(), None, db);
        let context = auth.authenticate(None).await.unwrap();
        assert!(context.user.is_none());
        assert!(auth.require_admin(&context).is_ok());
    }

    #[tokio::test]
    async fn enabled_auth_without_identity_provider_is_rejected() {
        let config = Config {
            supabase_url: "https://x.supabase.co".to_string(),
            supabase_jwt_secret: "secret".to_string(),
            admin_emails: vec!["root@x.com".to_string()],
            ..Config::default()
        };
        let auth = AuthService::new(&config, None, Database::open_in_memory().unwrap());
        let err = auth.authenticate(Some("Bearer t")).await.unwrap_err();
        assert_eq!(err.to_string(), "identity provider not configured");

        let user = CurrentUser {
            id: "u".into(),
            email: "someone@x.com".into(),
            role: "authenticated".into(),
            display_name: None,
            avatar_url: None,
            is_admin: false,
        };
        let context = AuthContext { user: Some(user) };
        assert!(matches!(auth.require_admin(&context), Err(AuthError::AdminRequired)));

        assert!(auth.is_admin(" Root@X.com"));
        assert!(!auth.is_admin(""));
        assert!(!auth.is_admin("someone@x.com"));
    }

    #[tokio::test]
    async fn seeding_only_happens_on_empty_whitelist() {
        let auth = AuthService::new(&Config::default(), None, Database::open_in_memory().unwrap());
        let seeded = auth
            .seed_whitelist(vec!["a@x.com".into(), " ".into()])
            .await
            .unwrap();
        assert_eq!(seeded, 1);
        assert_eq!(auth.seed_whitelist(vec!["b@x.com".into()]).await.unwrap(), 0);
    }
}
