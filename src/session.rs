//! Demo login sessions as explicit values.
//!
//! Authentication here is a demo-grade shared-secret check, not a security
//! boundary. What matters is the shape: instead of an ambient mutable
//! "logged in" flag, a successful login returns a [`Session`] value that
//! callers thread through explicitly, and logout consumes it.

use crate::config::AppConfig;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("demo credentials are not configured")]
    NotConfigured,

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("user registration is not supported in this demo application")]
    RegistrationUnsupported,
}

/// Proof of a completed demo login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    username: String,
    token: String,
}

impl Session {
    /// Check the supplied credentials against the configured demo pair.
    /// Fails fast when the deployment has no credentials configured.
    pub fn login(config: &AppConfig, username: &str, password: &str) -> Result<Session, AuthError> {
        let (expected_user, expected_pass) = match (&config.demo_username, &config.demo_password) {
            (Some(user), Some(pass)) => (user, pass),
            _ => return Err(AuthError::NotConfigured),
        };

        if username == expected_user && password == expected_pass {
            Ok(Session {
                username: username.to_string(),
                token: format!("demo-session:{username}"),
            })
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Ending a session is a pure transition: the value is consumed and
    /// nothing ambient remains to clean up.
    pub fn logout(self) {}
}

/// The demo has no sign-up path.
pub fn register() -> Result<Session, AuthError> {
    Err(AuthError::RegistrationUnsupported)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(user: Option<&str>, pass: Option<&str>) -> AppConfig {
        AppConfig {
            text_api_key: "k".into(),
            image_api_key: "k".into(),
            base_url: "http://localhost".into(),
            demo_username: user.map(str::to_string),
            demo_password: pass.map(str::to_string),
        }
    }

    #[test]
    fn login_succeeds_with_matching_credentials() {
        let config = config(Some("demo"), Some("hunter2"));
        let session = Session::login(&config, "demo", "hunter2").unwrap();
        assert_eq!(session.username(), "demo");
        assert!(!session.token().is_empty());
        session.logout();
    }

    #[test]
    fn login_rejects_wrong_credentials() {
        let config = config(Some("demo"), Some("hunter2"));
        assert!(matches!(
            Session::login(&config, "demo", "wrong"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn login_fails_fast_without_configured_credentials() {
        let config = config(None, None);
        assert!(matches!(
            Session::login(&config, "demo", "hunter2"),
            Err(AuthError::NotConfigured)
        ));
    }

    #[test]
    fn registration_is_unsupported() {
        assert!(matches!(register(), Err(AuthError::RegistrationUnsupported)));
    }
}
