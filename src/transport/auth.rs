use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use http::Extensions;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next};
use std::fmt;

use crate::error::{ExporterError, Result};

/// Username and password for HTTP Basic authentication
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Both parts are required
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Result<Self> {
        let username = username.into();
        let password = password.into();
        if username.is_empty() || password.is_empty() {
            return Err(ExporterError::MissingAuthCredentials);
        }
        Ok(Self { username, password })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Value of the `Authorization` header for these credentials
    pub fn header_value(&self) -> String {
        let encoded = STANDARD.encode(format!("{}:{}", self.username, self.password));
        format!("Basic {}", encoded)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Adds an `Authorization: Basic ...` header to every outgoing request
pub struct BasicAuthMiddleware {
    header: HeaderValue,
}

impl BasicAuthMiddleware {
    pub fn new(credentials: &Credentials) -> Result<Self> {
        let mut header = HeaderValue::from_str(&credentials.header_value())
            .map_err(|e| ExporterError::Config(format!("Invalid basic auth header: {}", e)))?;
        header.set_sensitive(true);
        Ok(Self { header })
    }
}

#[async_trait]
impl Middleware for BasicAuthMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        req.headers_mut().insert(AUTHORIZATION, self.header.clone());
        next.run(req, extensions).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_require_both_parts() {
        assert!(Credentials::new("testuser", "password").is_ok());
        for (user, pass) in [("testuser", ""), ("", "password"), ("", "")] {
            assert!(matches!(
                Credentials::new(user, pass),
                Err(ExporterError::MissingAuthCredentials)
            ));
        }
    }

    #[test]
    fn test_header_value() {
        let creds = Credentials::new("testuser", "password").unwrap();
        // base64("testuser:password")
        assert_eq!(creds.header_value(), "Basic dGVzdHVzZXI6cGFzc3dvcmQ=");
    }

    #[test]
    fn test_debug_hides_password() {
        let creds = Credentials::new("testuser", "hunter2").unwrap();
        let rendered = format!("{:?}", creds);
        assert!(rendered.contains("testuser"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_middleware_header_is_sensitive() {
        let creds = Credentials::new("a", "b").unwrap();
        let middleware = BasicAuthMiddleware::new(&creds).unwrap();
        assert!(middleware.header.is_sensitive());
    }
}
