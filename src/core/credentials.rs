//! Local credential validation, run before a lease is attempted.

use crate::core::error::CredentialError;
use crate::core::record::AllocationRecord;

const MAX_SECRET_LEN: usize = 4096;

/// Check that a record's stored credentials are well formed.
///
/// This never contacts the platform. It rejects empty or oversized secrets,
/// secrets containing whitespace or control characters, auth-URL style
/// secrets (`scheme://...`) without a host part, and non-HTTPS login endpoints.
pub fn validate_credentials(record: &AllocationRecord) -> Result<(), CredentialError> {
    validate_secret(&record.credential_secret)?;
    validate_endpoint(&record.login_endpoint)
}

/// Validate a credential secret.
pub fn validate_secret(secret: &str) -> Result<(), CredentialError> {
    if secret.is_empty() {
        return Err(CredentialError::Empty);
    }
    if secret.len() > MAX_SECRET_LEN {
        return Err(CredentialError::Malformed("secret too long".into()));
    }
    if secret.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(CredentialError::Malformed(
            "secret contains whitespace or control characters".into(),
        ));
    }
    if let Some((_, rest)) = secret.split_once("://") {
        let host = rest.rsplit_once('@').map_or("", |(_, host)| host);
        if host.is_empty() {
            return Err(CredentialError::Malformed("auth url has no host".into()));
        }
    }
    Ok(())
}

/// Validate a login endpoint.
pub fn validate_endpoint(endpoint: &str) -> Result<(), CredentialError> {
    match endpoint.strip_prefix("https://") {
        Some(host) if !host.is_empty() && !host.contains(char::is_whitespace) => Ok(()),
        _ => Err(CredentialError::Malformed(format!(
            "login endpoint `{endpoint}` is not an https url"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_secret_ok() {
        assert!(validate_secret("tok_5f3a9c").is_ok());
    }

    #[test]
    fn test_auth_url_requires_host() {
        assert!(validate_secret("force://client:secret:refresh@login.example.com").is_ok());
        assert!(matches!(
            validate_secret("force://client:secret:refresh@"),
            Err(CredentialError::Malformed(_))
        ));
        assert!(matches!(
            validate_secret("force://client:secret:refresh"),
            Err(CredentialError::Malformed(_))
        ));
    }

    #[test]
    fn test_rejects_empty_and_whitespace() {
        assert_eq!(validate_secret(""), Err(CredentialError::Empty));
        assert!(validate_secret("abc def").is_err());
        assert!(validate_secret("abc\n").is_err());
        assert!(validate_secret(&"x".repeat(MAX_SECRET_LEN + 1)).is_err());
    }

    #[test]
    fn test_endpoint_must_be_https() {
        assert!(validate_endpoint("https://env-1.example.com").is_ok());
        assert!(validate_endpoint("http://env-1.example.com").is_err());
        assert!(validate_endpoint("https://").is_err());
    }
}
