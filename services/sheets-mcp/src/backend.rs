//! Spreadsheet backend
//!
//! `SheetsBackend` is the capability the tool dispatcher calls. The Google
//! implementation issues REST calls to Sheets v4 and Drive v3, attaching
//! authorization through a `Provider`. A 401 is reported to the provider and
//! the request is retried once with a fresh token; every other failure is
//! returned as-is.

use crate::error::{Error, Result};
use provider::{ErrorClassification, Provider, classify_status};
use reqwest::{Method, Url};
use serde_json::{Value, json};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, warn};

pub const SPREADSHEET_MIME_TYPE: &str = "application/vnd.google-apps.spreadsheet";

/// Value input mode for writes: values are parsed as if typed into the UI.
const VALUE_INPUT_OPTION: &str = "USER_ENTERED";

pub type BackendFuture<'a> = Pin<Box<dyn Future<Output = Result<Value>> + Send + 'a>>;

/// Spreadsheet operations used by the tools and resources.
///
/// Each method returns the API's JSON response body.
pub trait SheetsBackend: Send + Sync {
    /// Spreadsheets visible to the credential, optionally restricted to a folder.
    fn list_spreadsheets<'a>(&'a self, folder_id: Option<&'a str>) -> BackendFuture<'a>;

    /// Create a spreadsheet file, optionally inside a folder.
    fn create_spreadsheet<'a>(
        &'a self,
        title: &'a str,
        folder_id: Option<&'a str>,
    ) -> BackendFuture<'a>;

    /// Spreadsheet metadata, optionally limited to ranges and with cell data.
    fn get_spreadsheet<'a>(
        &'a self,
        spreadsheet_id: &'a str,
        ranges: &'a [String],
        include_grid_data: bool,
    ) -> BackendFuture<'a>;

    fn get_values<'a>(&'a self, spreadsheet_id: &'a str, range: &'a str) -> BackendFuture<'a>;

    fn update_values<'a>(
        &'a self,
        spreadsheet_id: &'a str,
        range: &'a str,
        values: &'a Value,
    ) -> BackendFuture<'a>;

    /// Write several ranges in one call. `data` holds `{range, values}` objects.
    fn batch_update_values<'a>(
        &'a self,
        spreadsheet_id: &'a str,
        data: &'a [Value],
    ) -> BackendFuture<'a>;

    fn add_sheet<'a>(&'a self, spreadsheet_id: &'a str, title: &'a str) -> BackendFuture<'a>;

    /// Grant `role` on a file to a user.
    fn create_permission<'a>(
        &'a self,
        file_id: &'a str,
        email_address: &'a str,
        role: &'a str,
        send_notification: bool,
    ) -> BackendFuture<'a>;
}

/// Drive query listing spreadsheets, scoped to a folder when one is given.
pub fn spreadsheet_query(folder_id: Option<&str>) -> String {
    let mut query = format!("mimeType='{SPREADSHEET_MIME_TYPE}'");
    if let Some(folder) = folder_id {
        let escaped = folder.replace('\\', "\\\\").replace('\'', "\\'");
        query.push_str(&format!(" and '{escaped}' in parents"));
    }
    query
}

/// Sheets v4 and Drive v3 over HTTPS.
pub struct GoogleSheetsBackend {
    http: reqwest::Client,
    provider: Arc<dyn Provider>,
    sheets_url: String,
    drive_url: String,
}

impl GoogleSheetsBackend {
    pub fn new(
        http: reqwest::Client,
        provider: Arc<dyn Provider>,
        sheets_url: impl Into<String>,
        drive_url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            provider,
            sheets_url: sheets_url.into(),
            drive_url: drive_url.into(),
        }
    }

    fn sheets(&self, segments: &[&str]) -> Result<Url> {
        build_url(&self.sheets_url, segments)
    }

    fn drive(&self, segments: &[&str]) -> Result<Url> {
        build_url(&self.drive_url, segments)
    }

    /// Send a request with authorization, retrying once after a 401.
    async fn send(
        &self,
        method: Method,
        url: Url,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let mut retried = false;
        loop {
            let mut headers = reqwest::header::HeaderMap::new();
            self.provider.prepare_request(&mut headers).await?;

            let mut request = self
                .http
                .request(method.clone(), url.clone())
                .headers(headers)
                .query(query);
            if let Some(body) = body {
                request = request.json(body);
            }

            debug!(method = %method, path = url.path(), "calling Google API");
            let response = request
                .send()
                .await
                .map_err(|e| Error::Http(e.to_string()))?;

            let status = response.status();
            if status.is_success() {
                let text = response
                    .text()
                    .await
                    .map_err(|e| Error::Http(format!("failed to read response body: {e}")))?;
                if text.trim().is_empty() {
                    return Ok(json!({}));
                }
                return serde_json::from_str(&text)
                    .map_err(|e| Error::Http(format!("invalid JSON from Google API: {e}")));
            }

            let classification = classify_status(status.as_u16());
            let message = error_message(&response.text().await.unwrap_or_default(), status);
            self.provider.report_error(classification.clone()).await;

            if classification == ErrorClassification::Unauthorized && !retried {
                warn!(
                    provider = self.provider.id(),
                    path = url.path(),
                    "request unauthorized, retrying with a fresh token"
                );
                retried = true;
                continue;
            }

            warn!(status = status.as_u16(), path = url.path(), error = %message, "Google API request failed");
            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }
    }
}

fn build_url(base: &str, segments: &[&str]) -> Result<Url> {
    let mut url =
        Url::parse(base).map_err(|e| Error::Internal(format!("invalid API base URL {base}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| Error::Internal(format!("API base URL cannot have a path: {base}")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Pull `error.message` out of a Google error body, falling back to the status.
fn error_message(body: &str, status: reqwest::StatusCode) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(String::from)
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .map(String::from)
                .unwrap_or_else(|| status.to_string())
        })
}

impl SheetsBackend for GoogleSheetsBackend {
    fn list_spreadsheets<'a>(&'a self, folder_id: Option<&'a str>) -> BackendFuture<'a> {
        Box::pin(async move {
            let url = self.drive(&["files"])?;
            let query = [
                ("q", spreadsheet_query(folder_id)),
                ("spaces", "drive".to_string()),
                ("includeItemsFromAllDrives", "true".to_string()),
                ("supportsAllDrives", "true".to_string()),
                ("fields", "files(id, name)".to_string()),
                ("orderBy", "modifiedTime desc".to_string()),
            ];
            self.send(Method::GET, url, &query, None).await
        })
    }

    fn create_spreadsheet<'a>(
        &'a self,
        title: &'a str,
        folder_id: Option<&'a str>,
    ) -> BackendFuture<'a> {
        Box::pin(async move {
            let url = self.drive(&["files"])?;
            let mut body = json!({ "name": title, "mimeType": SPREADSHEET_MIME_TYPE });
            if let Some(folder) = folder_id {
                body["parents"] = json!([folder]);
            }
            let query = [
                ("supportsAllDrives", "true".to_string()),
                ("fields", "id, name, parents".to_string()),
            ];
            self.send(Method::POST, url, &query, Some(&body)).await
        })
    }

    fn get_spreadsheet<'a>(
        &'a self,
        spreadsheet_id: &'a str,
        ranges: &'a [String],
        include_grid_data: bool,
    ) -> BackendFuture<'a> {
        Box::pin(async move {
            let url = self.sheets(&["spreadsheets", spreadsheet_id])?;
            let mut query: Vec<(&str, String)> =
                ranges.iter().map(|r| ("ranges", r.clone())).collect();
            if include_grid_data {
                query.push(("includeGridData", "true".to_string()));
            }
            self.send(Method::GET, url, &query, None).await
        })
    }

    fn get_values<'a>(&'a self, spreadsheet_id: &'a str, range: &'a str) -> BackendFuture<'a> {
        Box::pin(async move {
            let url = self.sheets(&["spreadsheets", spreadsheet_id, "values", range])?;
            self.send(Method::GET, url, &[], None).await
        })
    }

    fn update_values<'a>(
        &'a self,
        spreadsheet_id: &'a str,
        range: &'a str,
        values: &'a Value,
    ) -> BackendFuture<'a> {
        Box::pin(async move {
            let url = self.sheets(&["spreadsheets", spreadsheet_id, "values", range])?;
            let query = [("valueInputOption", VALUE_INPUT_OPTION.to_string())];
            let body = json!({ "values": values });
            self.send(Method::PUT, url, &query, Some(&body)).await
        })
    }

    fn batch_update_values<'a>(
        &'a self,
        spreadsheet_id: &'a str,
        data: &'a [Value],
    ) -> BackendFuture<'a> {
        Box::pin(async move {
            let url = self.sheets(&["spreadsheets", spreadsheet_id, "values:batchUpdate"])?;
            let body = json!({ "valueInputOption": VALUE_INPUT_OPTION, "data": data });
            self.send(Method::POST, url, &[], Some(&body)).await
        })
    }

    fn add_sheet<'a>(&'a self, spreadsheet_id: &'a str, title: &'a str) -> BackendFuture<'a> {
        Box::pin(async move {
            let segment = format!("{spreadsheet_id}:batchUpdate");
            let url = self.sheets(&["spreadsheets", &segment])?;
            let body = json!({
                "requests": [{ "addSheet": { "properties": { "title": title } } }]
            });
            self.send(Method::POST, url, &[], Some(&body)).await
        })
    }

    fn create_permission<'a>(
        &'a self,
        file_id: &'a str,
        email_address: &'a str,
        role: &'a str,
        send_notification: bool,
    ) -> BackendFuture<'a> {
        Box::pin(async move {
            let url = self.drive(&["files", file_id, "permissions"])?;
            let query = [
                ("sendNotificationEmail", send_notification.to_string()),
                ("supportsAllDrives", "true".to_string()),
                ("fields", "id".to_string()),
            ];
            let body = json!({ "type": "user", "role": role, "emailAddress": email_address });
            self.send(Method::POST, url, &query, Some(&body)).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone)]
    struct Captured {
        method: String,
        path: String,
        query: Vec<(String, String)>,
        authorization: Option<String>,
        body: Option<Value>,
    }

    /// Google API stand-in: records every request and replays canned
    /// responses in order, repeating the last one.
    struct MockApi {
        base: String,
        requests: Arc<Mutex<Vec<Captured>>>,
    }

    impl MockApi {
        async fn start(responses: Vec<(StatusCode, &'static str)>) -> Self {
            let requests = Arc::new(Mutex::new(Vec::new()));
            let queue = Arc::new(Mutex::new(VecDeque::from(responses)));
            let log = requests.clone();
            let app = axum::Router::new().fallback(move |req: axum::extract::Request| {
                let log = log.clone();
                let queue = queue.clone();
                async move {
                    let (parts, body) = req.into_parts();
                    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
                    let url = Url::parse(&format!("http://mock{}", parts.uri)).unwrap();
                    log.lock().unwrap().push(Captured {
                        method: parts.method.to_string(),
                        path: parts.uri.path().to_string(),
                        query: url.query_pairs().into_owned().collect(),
                        authorization: parts
                            .headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .map(String::from),
                        body: serde_json::from_slice(&bytes).ok(),
                    });
                    let mut queue = queue.lock().unwrap();
                    let (status, body) = if queue.len() > 1 {
                        queue.pop_front().unwrap()
                    } else {
                        *queue.front().unwrap()
                    };
                    (status, body.to_string())
                }
            });
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            Self {
                base: format!("http://{addr}"),
                requests,
            }
        }

        fn backend(&self, provider: Arc<dyn Provider>) -> GoogleSheetsBackend {
            GoogleSheetsBackend::new(
                reqwest::Client::new(),
                provider,
                format!("{}/v4", self.base),
                format!("{}/drive/v3", self.base),
            )
        }

        fn requests(&self) -> Vec<Captured> {
            self.requests.lock().unwrap().clone()
        }
    }

    fn param<'a>(captured: &'a Captured, key: &str) -> Option<&'a str> {
        captured
            .query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Sends the same token every time.
    struct FixedToken(&'static str);

    impl FixedToken {
        fn new(token: &'static str) -> Self {
            Self(token)
        }
    }

    impl Provider for FixedToken {
        fn id(&self) -> &str {
            "fixed"
        }

        fn prepare_request<'a>(
            &'a self,
            headers: &'a mut reqwest::header::HeaderMap,
        ) -> Pin<Box<dyn Future<Output = provider::Result<()>> + Send + 'a>> {
            Box::pin(async move { provider::apply_bearer(headers, self.0, None) })
        }

        fn report_error(
            &self,
            _classification: ErrorClassification,
        ) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
            Box::pin(async {})
        }
    }

    /// Provider that hands out `token_N`, bumping N after each 401.
    struct RotatingProvider {
        generation: AtomicUsize,
        unauthorized: AtomicUsize,
    }

    impl RotatingProvider {
        fn new() -> Self {
            Self {
                generation: AtomicUsize::new(1),
                unauthorized: AtomicUsize::new(0),
            }
        }
    }

    impl Provider for RotatingProvider {
        fn id(&self) -> &str {
            "rotating"
        }

        fn prepare_request<'a>(
            &'a self,
            headers: &'a mut reqwest::header::HeaderMap,
        ) -> Pin<Box<dyn Future<Output = provider::Result<()>> + Send + 'a>> {
            Box::pin(async move {
                let token = format!("token_{}", self.generation.load(Ordering::SeqCst));
                provider::apply_bearer(headers, &token, None)
            })
        }

        fn report_error(
            &self,
            classification: ErrorClassification,
        ) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
            Box::pin(async move {
                if classification == ErrorClassification::Unauthorized {
                    self.unauthorized.fetch_add(1, Ordering::SeqCst);
                    self.generation.fetch_add(1, Ordering::SeqCst);
                }
            })
        }
    }

    #[test]
    fn query_without_folder_lists_all_spreadsheets() {
        assert_eq!(
            spreadsheet_query(None),
            "mimeType='application/vnd.google-apps.spreadsheet'"
        );
    }

    #[test]
    fn query_with_folder_escapes_quotes() {
        assert_eq!(
            spreadsheet_query(Some("it's")),
            "mimeType='application/vnd.google-apps.spreadsheet' and 'it\\'s' in parents"
        );
    }

    #[test]
    fn error_message_prefers_google_message() {
        let body = r#"{"error":{"code":404,"message":"Requested entity was not found.","status":"NOT_FOUND"}}"#;
        assert_eq!(
            error_message(body, reqwest::StatusCode::NOT_FOUND),
            "Requested entity was not found."
        );
        assert_eq!(
            error_message("<html>", reqwest::StatusCode::BAD_GATEWAY),
            "Bad Gateway"
        );
    }

    #[tokio::test]
    async fn list_spreadsheets_sends_drive_query() {
        let api = MockApi::start(vec![(StatusCode::OK, r#"{"files":[]}"#)]).await;
        let backend = api.backend(Arc::new(FixedToken::new("tok")));

        backend.list_spreadsheets(Some("folder123")).await.unwrap();

        let requests = api.requests();
        assert_eq!(requests.len(), 1);
        let req = &requests[0];
        assert_eq!(req.method, "GET");
        assert_eq!(req.path, "/drive/v3/files");
        assert_eq!(req.authorization.as_deref(), Some("Bearer tok"));
        assert_eq!(
            param(req, "q"),
            Some("mimeType='application/vnd.google-apps.spreadsheet' and 'folder123' in parents")
        );
        assert_eq!(param(req, "orderBy"), Some("modifiedTime desc"));
        assert_eq!(param(req, "supportsAllDrives"), Some("true"));
    }

    #[tokio::test]
    async fn update_values_encodes_range_and_input_option() {
        let api = MockApi::start(vec![(StatusCode::OK, r#"{"updatedCells":2}"#)]).await;
        let backend = api.backend(Arc::new(FixedToken::new("tok")));

        let values = json!([["a", "b"]]);
        let result = backend
            .update_values("sheet-id", "Data Sheet!A1:B1", &values)
            .await
            .unwrap();
        assert_eq!(result["updatedCells"], 2);

        let req = &api.requests()[0];
        assert_eq!(req.method, "PUT");
        assert_eq!(req.path, "/v4/spreadsheets/sheet-id/values/Data%20Sheet!A1:B1");
        assert_eq!(param(req, "valueInputOption"), Some("USER_ENTERED"));
        assert_eq!(req.body.as_ref().unwrap()["values"], values);
    }

    #[tokio::test]
    async fn add_sheet_posts_batch_update() {
        let api = MockApi::start(vec![(StatusCode::OK, r#"{"replies":[]}"#)]).await;
        let backend = api.backend(Arc::new(FixedToken::new("tok")));

        backend.add_sheet("abc", "Q3").await.unwrap();

        let req = &api.requests()[0];
        assert_eq!(req.method, "POST");
        assert_eq!(req.path, "/v4/spreadsheets/abc:batchUpdate");
        assert_eq!(
            req.body.as_ref().unwrap()["requests"][0]["addSheet"]["properties"]["title"],
            "Q3"
        );
    }

    #[tokio::test]
    async fn create_permission_sets_notification_flag() {
        let api = MockApi::start(vec![(StatusCode::OK, r#"{"id":"perm1"}"#)]).await;
        let backend = api.backend(Arc::new(FixedToken::new("tok")));

        let result = backend
            .create_permission("file1", "a@example.com", "writer", false)
            .await
            .unwrap();
        assert_eq!(result["id"], "perm1");

        let req = &api.requests()[0];
        assert_eq!(req.path, "/drive/v3/files/file1/permissions");
        assert_eq!(param(req, "sendNotificationEmail"), Some("false"));
        let body = req.body.as_ref().unwrap();
        assert_eq!(body["type"], "user");
        assert_eq!(body["emailAddress"], "a@example.com");
        assert_eq!(body["role"], "writer");
    }

    #[tokio::test]
    async fn unauthorized_is_retried_once_with_new_token() {
        let api = MockApi::start(vec![
            (StatusCode::UNAUTHORIZED, r#"{"error":{"message":"expired"}}"#),
            (StatusCode::OK, r#"{"values":[["x"]]}"#),
        ])
        .await;
        let provider = Arc::new(RotatingProvider::new());
        let backend = api.backend(provider.clone());

        let result = backend.get_values("id", "Sheet1").await.unwrap();
        assert_eq!(result["values"][0][0], "x");

        let requests = api.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].authorization.as_deref(), Some("Bearer token_1"));
        assert_eq!(requests[1].authorization.as_deref(), Some("Bearer token_2"));
        assert_eq!(provider.unauthorized.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn repeated_unauthorized_gives_up_after_one_retry() {
        let api = MockApi::start(vec![(
            StatusCode::UNAUTHORIZED,
            r#"{"error":{"message":"Invalid Credentials"}}"#,
        )])
        .await;
        let backend = api.backend(Arc::new(FixedToken::new("revoked")));

        let err = backend.get_values("id", "Sheet1").await.unwrap_err();
        assert!(matches!(err, Error::Api { status: 401, .. }));
        assert!(err.to_string().contains("Invalid Credentials"));
        assert_eq!(api.requests().len(), 2);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let api = MockApi::start(vec![(
            StatusCode::FORBIDDEN,
            r#"{"error":{"message":"The caller does not have permission"}}"#,
        )])
        .await;
        let backend = api.backend(Arc::new(FixedToken::new("tok")));

        let err = backend.get_spreadsheet("id", &[], false).await.unwrap_err();
        assert!(matches!(err, Error::Api { status: 403, .. }));
        assert_eq!(api.requests().len(), 1);
    }
}
