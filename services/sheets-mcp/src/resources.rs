//! Spreadsheet resources
//!
//! One resource template, `spreadsheet://{spreadsheet_id}/info`, exposing a
//! spreadsheet's title and the properties of each sheet.

use crate::backend::SheetsBackend;
use crate::error::{Error, Result};
use serde_json::{Value, json};

const SCHEME: &str = "spreadsheet://";

/// The `resources/list` payload.
pub fn definitions() -> Value {
    json!([{
        "uri": "spreadsheet://info",
        "name": "Spreadsheet Info",
        "description": "Get basic information about a Google Spreadsheet",
        "mimeType": "application/json"
    }])
}

/// Extract the spreadsheet id from `spreadsheet://{id}/info`.
pub fn parse_uri(uri: &str) -> Result<&str> {
    uri.strip_prefix(SCHEME)
        .and_then(|rest| rest.strip_suffix("/info"))
        .filter(|id| !id.is_empty() && !id.contains('/'))
        .ok_or_else(|| Error::InvalidResource(uri.to_string()))
}

/// Read one resource.
pub async fn read(backend: &dyn SheetsBackend, uri: &str) -> Result<Value> {
    let spreadsheet_id = parse_uri(uri)?;

    let spreadsheet = backend
        .get_spreadsheet(spreadsheet_id, &[], false)
        .await
        .map_err(|e| Error::Internal(format!("Error reading resource: {e}")))?;

    let sheets: Vec<Value> = spreadsheet["sheets"]
        .as_array()
        .map(|sheets| {
            sheets
                .iter()
                .map(|sheet| {
                    let properties = &sheet["properties"];
                    json!({
                        "title": properties["title"],
                        "sheetId": properties["sheetId"],
                        "gridProperties": properties["gridProperties"],
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let info = json!({
        "title": spreadsheet["properties"]["title"].as_str().unwrap_or("Unknown"),
        "sheets": sheets,
    });
    let text = serde_json::to_string_pretty(&info)
        .map_err(|e| Error::Internal(format!("failed to serialize resource: {e}")))?;

    Ok(json!({
        "contents": [{ "uri": uri, "mimeType": "application/json", "text": text }]
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::tests::FakeBackend;

    #[test]
    fn parses_spreadsheet_id() {
        assert_eq!(parse_uri("spreadsheet://abc123/info").unwrap(), "abc123");
    }

    #[test]
    fn rejects_malformed_uris() {
        for uri in [
            "spreadsheet://info",
            "spreadsheet:///info",
            "spreadsheet://a/b/info",
            "sheets://abc/info",
            "spreadsheet://abc/data",
        ] {
            let err = parse_uri(uri).unwrap_err();
            assert_eq!(err.code(), -32600, "{uri} should be rejected");
        }
    }

    #[tokio::test]
    async fn read_returns_title_and_sheets() {
        let backend = FakeBackend::default();
        let result = read(&backend, "spreadsheet://sheet-1/info").await.unwrap();

        let content = &result["contents"][0];
        assert_eq!(content["uri"], "spreadsheet://sheet-1/info");
        assert_eq!(content["mimeType"], "application/json");

        let info: Value = serde_json::from_str(content["text"].as_str().unwrap()).unwrap();
        assert_eq!(info["title"], "Budget");
        assert_eq!(
            info["sheets"][1],
            json!({ "title": "Raw", "sheetId": 7,
                "gridProperties": { "rowCount": 1000, "columnCount": 10 } })
        );
    }

    #[tokio::test]
    async fn read_failure_is_internal_error() {
        let backend = FakeBackend::default();
        let err = read(&backend, "spreadsheet://missing/info").await.unwrap_err();
        assert_eq!(err.code(), -32603);
        assert!(err.to_string().starts_with("Error reading resource:"));
    }
}
