//! Google Sheets capabilities: create, read, update, append row, search.

use async_trait::async_trait;

use crate::tools::google::client::{encode_segment, GoogleClient, SHEETS_API_BASE};
use crate::tools::google::docs::{drive_search, required_str};
use crate::tools::tool::{Tool, ToolContext, ToolError, ToolOutput};

/// Creates a new spreadsheet, optionally writing a header row.
pub struct CreateSheetTool {
    client: GoogleClient,
}

impl CreateSheetTool {
    pub fn new(client: GoogleClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for CreateSheetTool {
    fn name(&self) -> &str {
        "create_google_sheet"
    }

    fn description(&self) -> &str {
        "Creates a new Google Spreadsheet, optionally with column headers in the first row."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "title": {
                    "type": "string",
                    "description": "Title of the new spreadsheet"
                },
                "headers": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Column headers for the first sheet"
                }
            },
            "required": ["title"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let start = std::time::Instant::now();
        let title = required_str(&params, "title")?;

        let url = format!("{}/spreadsheets", SHEETS_API_BASE);
        let body = serde_json::json!({
            "properties": { "title": title },
            "sheets": [{ "properties": { "title": "Sheet1" } }],
        });
        let created = self.client.post(&url, &body, ctx).await?;

        let spreadsheet_id = created["spreadsheetId"]
            .as_str()
            .ok_or_else(|| {
                ToolError::ExternalService("create response missing spreadsheetId".to_string())
            })?
            .to_string();

        if let Some(headers) = params.get("headers").and_then(|v| v.as_array()) {
            if !headers.is_empty() {
                let update_url = format!(
                    "{}/spreadsheets/{}/values/{}?valueInputOption=RAW",
                    SHEETS_API_BASE,
                    encode_segment(&spreadsheet_id),
                    encode_segment("Sheet1!A1"),
                );
                self.client
                    .put(
                        &update_url,
                        &serde_json::json!({ "values": [headers] }),
                        ctx,
                    )
                    .await?;
            }
        }

        Ok(ToolOutput::success(
            serde_json::json!({
                "spreadsheet_id": spreadsheet_id,
                "title": title,
                "url": format!("https://docs.google.com/spreadsheets/d/{}/edit", spreadsheet_id),
            }),
            start.elapsed(),
        ))
    }
}

/// Reads a range of cells in A1 notation.
pub struct ReadSheetTool {
    client: GoogleClient,
}

impl ReadSheetTool {
    pub fn new(client: GoogleClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for ReadSheetTool {
    fn name(&self) -> &str {
        "read_google_sheet"
    }

    fn description(&self) -> &str {
        "Reads cell values from a Google Spreadsheet range in A1 notation, e.g. 'Sheet1!A1:D10'."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "spreadsheet_id": {
                    "type": "string",
                    "description": "ID of the spreadsheet to read"
                },
                "range": {
                    "type": "string",
                    "description": "Range to read in A1 notation"
                }
            },
            "required": ["spreadsheet_id", "range"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let start = std::time::Instant::now();
        let spreadsheet_id = required_str(&params, "spreadsheet_id")?;
        let range = required_str(&params, "range")?;

        let url = format!(
            "{}/spreadsheets/{}/values/{}",
            SHEETS_API_BASE,
            encode_segment(spreadsheet_id),
            encode_segment(range),
        );
        let response = self.client.get(&url, ctx).await?;

        Ok(ToolOutput::success(
            serde_json::json!({
                "spreadsheet_id": spreadsheet_id,
                "range": response["range"].as_str().unwrap_or(range),
                "values": response["values"].as_array().cloned().unwrap_or_default(),
            }),
            start.elapsed(),
        ))
    }
}

/// Overwrites a range of cells with a 2D array of values.
pub struct UpdateSheetTool {
    client: GoogleClient,
}

impl UpdateSheetTool {
    pub fn new(client: GoogleClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for UpdateSheetTool {
    fn name(&self) -> &str {
        "update_google_sheet"
    }

    fn description(&self) -> &str {
        "Updates cell values in a Google Spreadsheet range with a 2D array of values."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "spreadsheet_id": {
                    "type": "string",
                    "description": "ID of the spreadsheet to update"
                },
                "range": {
                    "type": "string",
                    "description": "Range to update in A1 notation, e.g. 'Sheet1!A1'"
                },
                "values": {
                    "type": "array",
                    "items": { "type": "array" },
                    "description": "Values to write, as rows of cells"
                }
            },
            "required": ["spreadsheet_id", "range", "values"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let start = std::time::Instant::now();
        let spreadsheet_id = required_str(&params, "spreadsheet_id")?;
        let range = required_str(&params, "range")?;
        let values = params
            .get("values")
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                ToolError::InvalidParameters("missing 'values' parameter".to_string())
            })?;

        let url = format!(
            "{}/spreadsheets/{}/values/{}?valueInputOption=USER_ENTERED",
            SHEETS_API_BASE,
            encode_segment(spreadsheet_id),
            encode_segment(range),
        );
        let response = self
            .client
            .put(&url, &serde_json::json!({ "values": values }), ctx)
            .await?;

        Ok(ToolOutput::success(
            serde_json::json!({
                "spreadsheet_id": spreadsheet_id,
                "updated_range": response["updatedRange"].as_str().unwrap_or(range),
                "updated_cells": response["updatedCells"].as_u64().unwrap_or(0),
            }),
            start.elapsed(),
        ))
    }
}

/// Appends one row after the last row with data in a sheet.
pub struct AddRowTool {
    client: GoogleClient,
}

impl AddRowTool {
    pub fn new(client: GoogleClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for AddRowTool {
    fn name(&self) -> &str {
        "add_sheet_row"
    }

    fn description(&self) -> &str {
        "Appends a row of values after the existing data in a sheet."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "spreadsheet_id": {
                    "type": "string",
                    "description": "ID of the spreadsheet to update"
                },
                "sheet_name": {
                    "type": "string",
                    "description": "Name of the sheet to append to (default 'Sheet1')"
                },
                "values": {
                    "type": "array",
                    "description": "Cell values for the new row"
                }
            },
            "required": ["spreadsheet_id", "values"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let start = std::time::Instant::now();
        let spreadsheet_id = required_str(&params, "spreadsheet_id")?;
        let sheet_name = params
            .get("sheet_name")
            .and_then(|v| v.as_str())
            .unwrap_or("Sheet1");
        let values = params
            .get("values")
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                ToolError::InvalidParameters("missing 'values' parameter".to_string())
            })?;

        let url = format!(
            "{}/spreadsheets/{}/values/{}:append?valueInputOption=USER_ENTERED&insertDataOption=INSERT_ROWS",
            SHEETS_API_BASE,
            encode_segment(spreadsheet_id),
            encode_segment(&format!("{}!A1", sheet_name)),
        );
        let response = self
            .client
            .post(&url, &serde_json::json!({ "values": [values] }), ctx)
            .await?;

        Ok(ToolOutput::success(
            serde_json::json!({
                "spreadsheet_id": spreadsheet_id,
                "updated_range": response["updates"]["updatedRange"].as_str().unwrap_or(""),
                "appended_cells": values.len(),
            }),
            start.elapsed(),
        ))
    }
}

/// Searches the user's Drive for spreadsheets by name.
pub struct SearchSheetsTool {
    client: GoogleClient,
}

impl SearchSheetsTool {
    pub fn new(client: GoogleClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for SearchSheetsTool {
    fn name(&self) -> &str {
        "search_google_sheets"
    }

    fn description(&self) -> &str {
        "Searches the user's Google Drive for spreadsheets whose name matches a query."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Text to match against spreadsheet names"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of results (default 10)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let start = std::time::Instant::now();
        let query = required_str(&params, "query")?;
        let max_results = params
            .get("max_results")
            .and_then(|v| v.as_u64())
            .unwrap_or(10)
            .min(50);

        let files = drive_search(
            &self.client,
            "application/vnd.google-apps.spreadsheet",
            query,
            max_results,
            ctx,
        )
        .await?;

        Ok(ToolOutput::success(
            serde_json::json!({ "spreadsheets": files }),
            start.elapsed(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_range_targets_named_sheet() {
        // The append endpoint takes the sheet's A1 anchor as its range.
        let range = format!("{}!A1", "Budget 2026");
        assert_eq!(encode_segment(&range), "Budget%202026%21A1");
    }

    #[test]
    fn test_sheet_tool_names_are_distinct() {
        let client = GoogleClient::new();
        let names = [
            CreateSheetTool::new(client.clone()).name().to_string(),
            ReadSheetTool::new(client.clone()).name().to_string(),
            UpdateSheetTool::new(client.clone()).name().to_string(),
            AddRowTool::new(client.clone()).name().to_string(),
            SearchSheetsTool::new(client).name().to_string(),
        ];
        let unique: std::collections::HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
    }
}
