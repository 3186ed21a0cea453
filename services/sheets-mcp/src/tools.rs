//! Tool catalog and dispatch
//!
//! `definitions` is the `tools/list` payload. `call` deserializes the
//! arguments for one tool, runs it against the backend, and wraps the
//! output as a text content block.

use crate::backend::SheetsBackend;
use crate::error::{Error, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::{info, warn};

const VALID_ROLES: &[&str] = &["reader", "commenter", "writer"];

/// Tool descriptors with their JSON input schemas.
pub fn definitions() -> Value {
    json!([
        {
            "name": "list_spreadsheets",
            "description": "Lists spreadsheets in the configured Drive folder or accessible by the user",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "folder_id": {
                        "type": "string",
                        "description": "Optional Google Drive folder ID to search in"
                    }
                }
            }
        },
        {
            "name": "create_spreadsheet",
            "description": "Creates a new spreadsheet",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "title": {
                        "type": "string",
                        "description": "The desired title for the spreadsheet"
                    },
                    "folder_id": {
                        "type": "string",
                        "description": "Optional Google Drive folder ID where the spreadsheet should be created"
                    }
                },
                "required": ["title"]
            }
        },
        {
            "name": "get_sheet_data",
            "description": "Get data from a specific sheet in a Google Spreadsheet",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "spreadsheet_id": { "type": "string", "description": "The ID of the spreadsheet" },
                    "sheet": { "type": "string", "description": "The name of the sheet" },
                    "range": {
                        "type": "string",
                        "description": "Optional cell range in A1 notation (e.g., A1:C10)"
                    },
                    "include_grid_data": {
                        "type": "boolean",
                        "description": "If true, includes cell formatting and metadata",
                        "default": false
                    }
                },
                "required": ["spreadsheet_id", "sheet"]
            }
        },
        {
            "name": "update_cells",
            "description": "Update cells in a Google Spreadsheet",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "spreadsheet_id": { "type": "string", "description": "The ID of the spreadsheet" },
                    "sheet": { "type": "string", "description": "The name of the sheet" },
                    "range": { "type": "string", "description": "Cell range in A1 notation" },
                    "data": {
                        "type": "array",
                        "description": "2D array of values to update",
                        "items": { "type": "array" }
                    }
                },
                "required": ["spreadsheet_id", "sheet", "range", "data"]
            }
        },
        {
            "name": "list_sheets",
            "description": "List all sheets in a Google Spreadsheet",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "spreadsheet_id": { "type": "string", "description": "The ID of the spreadsheet" }
                },
                "required": ["spreadsheet_id"]
            }
        },
        {
            "name": "create_sheet",
            "description": "Create a new sheet tab in an existing Google Spreadsheet",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "spreadsheet_id": { "type": "string", "description": "The ID of the spreadsheet" },
                    "title": { "type": "string", "description": "The title for the new sheet" }
                },
                "required": ["spreadsheet_id", "title"]
            }
        },
        {
            "name": "share_spreadsheet",
            "description": "Share a Google Spreadsheet with multiple users via email",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "spreadsheet_id": {
                        "type": "string",
                        "description": "The ID of the spreadsheet to share"
                    },
                    "recipients": {
                        "type": "array",
                        "description": "List of recipients with email_address and role",
                        "items": {
                            "type": "object",
                            "properties": {
                                "email_address": { "type": "string" },
                                "role": { "type": "string", "enum": VALID_ROLES }
                            },
                            "required": ["email_address", "role"]
                        }
                    },
                    "send_notification": {
                        "type": "boolean",
                        "description": "Whether to send notification emails",
                        "default": true
                    }
                },
                "required": ["spreadsheet_id", "recipients"]
            }
        },
        {
            "name": "batch_update_cells",
            "description": "Update multiple ranges in a Google Spreadsheet in one call",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "spreadsheet_id": { "type": "string", "description": "The ID of the spreadsheet" },
                    "sheet": { "type": "string", "description": "The name of the sheet" },
                    "ranges": {
                        "type": "object",
                        "description": "Dictionary mapping range strings to 2D arrays of values"
                    }
                },
                "required": ["spreadsheet_id", "sheet", "ranges"]
            }
        }
    ])
}

#[derive(Deserialize)]
struct ListSpreadsheetsArgs {
    #[serde(default)]
    folder_id: Option<String>,
}

#[derive(Deserialize)]
struct CreateSpreadsheetArgs {
    title: String,
    #[serde(default)]
    folder_id: Option<String>,
}

#[derive(Deserialize)]
struct GetSheetDataArgs {
    spreadsheet_id: String,
    sheet: String,
    #[serde(default)]
    range: Option<String>,
    #[serde(default)]
    include_grid_data: bool,
}

#[derive(Deserialize)]
struct UpdateCellsArgs {
    spreadsheet_id: String,
    sheet: String,
    range: String,
    data: Vec<Vec<Value>>,
}

#[derive(Deserialize)]
struct BatchUpdateCellsArgs {
    spreadsheet_id: String,
    sheet: String,
    ranges: Map<String, Value>,
}

#[derive(Deserialize)]
struct SpreadsheetArgs {
    spreadsheet_id: String,
}

#[derive(Deserialize)]
struct CreateSheetArgs {
    spreadsheet_id: String,
    title: String,
}

#[derive(Deserialize)]
struct ShareSpreadsheetArgs {
    spreadsheet_id: String,
    recipients: Vec<Recipient>,
    #[serde(default = "default_true")]
    send_notification: bool,
}

/// Recipient fields are checked one by one so a bad entry fails alone.
#[derive(Deserialize)]
struct Recipient {
    #[serde(default)]
    email_address: Option<String>,
    #[serde(default)]
    role: Option<String>,
}

fn default_true() -> bool {
    true
}

fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T> {
    let args = if args.is_null() { json!({}) } else { args };
    serde_json::from_value(args).map_err(|e| Error::InvalidParams(e.to_string()))
}

/// Wrap a JSON value as MCP text content.
pub fn text_content(value: &Value) -> Result<Value> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| Error::Internal(format!("failed to serialize tool output: {e}")))?;
    Ok(json!({ "content": [{ "type": "text", "text": text }] }))
}

fn full_range(sheet: &str, range: Option<&str>) -> String {
    match range {
        Some(range) => format!("{sheet}!{range}"),
        None => sheet.to_string(),
    }
}

/// Run one tool call.
///
/// `folder_context` is the configured Drive folder, used when the call names
/// none. Unknown tools and bad arguments keep their own error kinds; any
/// other failure is reported as a failed tool execution.
pub async fn call(
    backend: &dyn SheetsBackend,
    folder_context: Option<&str>,
    name: &str,
    args: Value,
) -> Result<Value> {
    let output = match name {
        "list_spreadsheets" => list_spreadsheets(backend, folder_context, parse_args(args)?).await,
        "create_spreadsheet" => {
            create_spreadsheet(backend, folder_context, parse_args(args)?).await
        }
        "get_sheet_data" => get_sheet_data(backend, parse_args(args)?).await,
        "update_cells" => update_cells(backend, parse_args(args)?).await,
        "batch_update_cells" => batch_update_cells(backend, parse_args(args)?).await,
        "list_sheets" => list_sheets(backend, parse_args(args)?).await,
        "create_sheet" => create_sheet(backend, parse_args(args)?).await,
        "share_spreadsheet" => share_spreadsheet(backend, parse_args(args)?).await,
        other => return Err(Error::UnknownTool(other.to_string())),
    };

    match output {
        Ok(value) => text_content(&value),
        Err(e @ (Error::InvalidParams(_) | Error::UnknownTool(_))) => Err(e),
        Err(e) => {
            warn!(tool = name, error = %e, "tool execution failed");
            Err(Error::Internal(format!("Error executing tool {name}: {e}")))
        }
    }
}

/// Explicit folder argument wins over the configured context.
fn target_folder<'a>(explicit: Option<&'a str>, context: Option<&'a str>) -> Option<&'a str> {
    explicit.filter(|f| !f.is_empty()).or(context)
}

async fn list_spreadsheets(
    backend: &dyn SheetsBackend,
    folder_context: Option<&str>,
    args: ListSpreadsheetsArgs,
) -> Result<Value> {
    let folder = target_folder(args.folder_id.as_deref(), folder_context);
    match folder {
        Some(folder) => info!(folder, "searching for spreadsheets in folder"),
        None => info!("searching for spreadsheets in My Drive"),
    }

    let response = backend.list_spreadsheets(folder).await?;
    let files = response["files"].as_array().cloned().unwrap_or_default();
    let output: Vec<Value> = files
        .iter()
        .map(|file| json!({ "id": file["id"], "title": file["name"] }))
        .collect();
    Ok(Value::Array(output))
}

async fn create_spreadsheet(
    backend: &dyn SheetsBackend,
    folder_context: Option<&str>,
    args: CreateSpreadsheetArgs,
) -> Result<Value> {
    let folder = target_folder(args.folder_id.as_deref(), folder_context);
    let file = backend.create_spreadsheet(&args.title, folder).await?;

    info!(
        spreadsheet_id = file["id"].as_str().unwrap_or_default(),
        folder = folder.unwrap_or("root"),
        "spreadsheet created"
    );

    let title = file["name"]
        .as_str()
        .map(String::from)
        .unwrap_or(args.title);
    let parent = file["parents"][0].as_str().unwrap_or("root");
    Ok(json!({
        "spreadsheetId": file["id"],
        "title": title,
        "folder": parent,
    }))
}

async fn get_sheet_data(backend: &dyn SheetsBackend, args: GetSheetDataArgs) -> Result<Value> {
    let range = full_range(&args.sheet, args.range.as_deref());

    if args.include_grid_data {
        return backend
            .get_spreadsheet(&args.spreadsheet_id, &[range], true)
            .await;
    }

    let response = backend.get_values(&args.spreadsheet_id, &range).await?;
    let values = response
        .get("values")
        .cloned()
        .unwrap_or_else(|| json!([]));
    Ok(json!({
        "spreadsheetId": args.spreadsheet_id,
        "valueRanges": [{ "range": range, "values": values }],
    }))
}

async fn update_cells(backend: &dyn SheetsBackend, args: UpdateCellsArgs) -> Result<Value> {
    let range = full_range(&args.sheet, Some(&args.range));
    let values = json!(args.data);
    backend
        .update_values(&args.spreadsheet_id, &range, &values)
        .await
}

async fn batch_update_cells(
    backend: &dyn SheetsBackend,
    args: BatchUpdateCellsArgs,
) -> Result<Value> {
    let data: Vec<Value> = args
        .ranges
        .into_iter()
        .map(|(range, values)| {
            json!({ "range": full_range(&args.sheet, Some(&range)), "values": values })
        })
        .collect();
    backend
        .batch_update_values(&args.spreadsheet_id, &data)
        .await
}

async fn list_sheets(backend: &dyn SheetsBackend, args: SpreadsheetArgs) -> Result<Value> {
    let spreadsheet = backend
        .get_spreadsheet(&args.spreadsheet_id, &[], false)
        .await?;
    let names: Vec<Value> = spreadsheet["sheets"]
        .as_array()
        .map(|sheets| {
            sheets
                .iter()
                .map(|sheet| sheet["properties"]["title"].clone())
                .collect()
        })
        .unwrap_or_default();
    Ok(Value::Array(names))
}

async fn create_sheet(backend: &dyn SheetsBackend, args: CreateSheetArgs) -> Result<Value> {
    let response = backend.add_sheet(&args.spreadsheet_id, &args.title).await?;
    let properties = &response["replies"][0]["addSheet"]["properties"];
    Ok(json!({
        "sheetId": properties["sheetId"],
        "title": properties["title"],
        "index": properties["index"],
        "spreadsheetId": args.spreadsheet_id,
    }))
}

async fn share_spreadsheet(
    backend: &dyn SheetsBackend,
    args: ShareSpreadsheetArgs,
) -> Result<Value> {
    let mut successes = Vec::new();
    let mut failures = Vec::new();

    for recipient in args.recipients {
        let Some(email) = recipient.email_address.filter(|e| !e.is_empty()) else {
            failures.push(json!({
                "email_address": null,
                "error": "Missing email_address in recipient entry",
            }));
            continue;
        };

        let role = recipient.role.unwrap_or_default();
        if !VALID_ROLES.contains(&role.as_str()) {
            failures.push(json!({
                "email_address": email,
                "error": format!(
                    "Invalid role '{role}'. Must be 'reader', 'commenter', or 'writer'"
                ),
            }));
            continue;
        }

        match backend
            .create_permission(&args.spreadsheet_id, &email, &role, args.send_notification)
            .await
        {
            Ok(permission) => successes.push(json!({
                "email_address": email,
                "role": role,
                "permissionId": permission["id"],
            })),
            Err(e) => {
                warn!(email_address = %email, error = %e, "failed to share spreadsheet");
                failures.push(json!({
                    "email_address": email,
                    "error": format!("Failed to share: {e}"),
                }));
            }
        }
    }

    Ok(json!({ "successes": successes, "failures": failures }))
}
