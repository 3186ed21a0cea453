//! Bearer header construction shared by every provider.

use crate::ProviderError;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use tracing::warn;

/// Header naming the project billed for quota (user credentials only).
pub const QUOTA_PROJECT_HEADER: &str = "x-goog-user-project";

/// Write `Authorization: Bearer <token>` and the optional quota header.
pub fn apply_bearer(
    headers: &mut HeaderMap,
    token: &str,
    quota_project: Option<&str>,
) -> crate::Result<()> {
    let value = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|e| ProviderError::Internal(format!("invalid token value: {e}")))?;
    headers.insert(AUTHORIZATION, value);

    if let Some(project) = quota_project {
        match HeaderValue::from_str(project) {
            Ok(v) => {
                headers.insert(HeaderName::from_static(QUOTA_PROJECT_HEADER), v);
            }
            Err(e) => {
                warn!(project, error = %e, "skipping invalid quota project header");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injects_bearer_token() {
        let mut headers = HeaderMap::new();
        apply_bearer(&mut headers, "ya29.test", None).unwrap();

        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer ya29.test");
        assert!(headers.get(QUOTA_PROJECT_HEADER).is_none());
    }

    #[test]
    fn replaces_existing_authorization() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer stale"));
        apply_bearer(&mut headers, "fresh", None).unwrap();

        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer fresh");
        assert_eq!(headers.get_all(AUTHORIZATION).iter().count(), 1);
    }

    #[test]
    fn injects_quota_project() {
        let mut headers = HeaderMap::new();
        apply_bearer(&mut headers, "tok", Some("my-project")).unwrap();

        assert_eq!(headers.get(QUOTA_PROJECT_HEADER).unwrap(), "my-project");
    }

    #[test]
    fn invalid_quota_project_is_skipped() {
        let mut headers = HeaderMap::new();
        apply_bearer(&mut headers, "tok", Some("bad\nproject")).unwrap();

        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer tok");
        assert!(headers.get(QUOTA_PROJECT_HEADER).is_none());
    }

    #[test]
    fn rejects_token_with_control_characters() {
        let mut headers = HeaderMap::new();
        let result = apply_bearer(&mut headers, "bad\ntoken", None);
        assert!(matches!(result, Err(ProviderError::Internal(_))));
        assert!(headers.get(AUTHORIZATION).is_none());
    }
}
