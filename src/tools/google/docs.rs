//! Google Docs capabilities: create, read, append, comment, search.

use async_trait::async_trait;

use crate::tools::google::client::{
    encode_segment, GoogleClient, DOCS_API_BASE, DRIVE_API_BASE,
};
use crate::tools::tool::{Tool, ToolContext, ToolError, ToolOutput};

/// Creates a new Google Doc, optionally seeding it with body text.
pub struct CreateDocTool {
    client: GoogleClient,
}

impl CreateDocTool {
    pub fn new(client: GoogleClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for CreateDocTool {
    fn name(&self) -> &str {
        "create_google_doc"
    }

    fn description(&self) -> &str {
        "Creates a new Google Doc with the given title and optional initial content."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "title": {
                    "type": "string",
                    "description": "Title of the new document"
                },
                "content": {
                    "type": "string",
                    "description": "Initial body text for the document"
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

        let url = format!("{}/documents", DOCS_API_BASE);
        let created = self
            .client
            .post(&url, &serde_json::json!({ "title": title }), ctx)
            .await?;

        let document_id = created["documentId"]
            .as_str()
            .ok_or_else(|| {
                ToolError::ExternalService("create response missing documentId".to_string())
            })?
            .to_string();

        if let Some(content) = params.get("content").and_then(|v| v.as_str()) {
            if !content.is_empty() {
                insert_text_at_end(&self.client, &document_id, content, ctx).await?;
            }
        }

        Ok(ToolOutput::success(
            serde_json::json!({
                "document_id": document_id,
                "title": title,
                "url": format!("https://docs.google.com/document/d/{}/edit", document_id),
            }),
            start.elapsed(),
        ))
    }
}

/// Reads the text content of a Google Doc.
pub struct ReadDocTool {
    client: GoogleClient,
}

impl ReadDocTool {
    pub fn new(client: GoogleClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for ReadDocTool {
    fn name(&self) -> &str {
        "read_google_doc"
    }

    fn description(&self) -> &str {
        "Reads the full text content of an existing Google Doc by its document ID."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "document_id": {
                    "type": "string",
                    "description": "ID of the document to read"
                }
            },
            "required": ["document_id"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let start = std::time::Instant::now();
        let document_id = required_str(&params, "document_id")?;

        let url = format!("{}/documents/{}", DOCS_API_BASE, encode_segment(document_id));
        let doc = self.client.get(&url, ctx).await?;

        let mut text = String::new();
        if let Some(elements) = doc["body"]["content"].as_array() {
            extract_text(elements, &mut text);
        }

        Ok(ToolOutput::success(
            serde_json::json!({
                "document_id": document_id,
                "title": doc["title"].as_str().unwrap_or(""),
                "content": text,
            }),
            start.elapsed(),
        ))
    }
}

/// Appends text to the end of a Google Doc.
pub struct AppendDocTool {
    client: GoogleClient,
}

impl AppendDocTool {
    pub fn new(client: GoogleClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for AppendDocTool {
    fn name(&self) -> &str {
        "append_google_doc"
    }

    fn description(&self) -> &str {
        "Appends text to the end of an existing Google Doc."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "document_id": {
                    "type": "string",
                    "description": "ID of the document to update"
                },
                "text": {
                    "type": "string",
                    "description": "Text to append at the end of the document"
                }
            },
            "required": ["document_id", "text"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let start = std::time::Instant::now();
        let document_id = required_str(&params, "document_id")?;
        let text = required_str(&params, "text")?;

        insert_text_at_end(&self.client, document_id, text, ctx).await?;

        Ok(ToolOutput::success(
            serde_json::json!({
                "document_id": document_id,
                "appended_chars": text.len(),
            }),
            start.elapsed(),
        ))
    }
}

/// Adds a comment to a Google Doc via the Drive comments API.
pub struct CommentDocTool {
    client: GoogleClient,
}

impl CommentDocTool {
    pub fn new(client: GoogleClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for CommentDocTool {
    fn name(&self) -> &str {
        "comment_google_doc"
    }

    fn description(&self) -> &str {
        "Adds a comment to an existing Google Doc."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "document_id": {
                    "type": "string",
                    "description": "ID of the document to comment on"
                },
                "comment": {
                    "type": "string",
                    "description": "Comment text"
                }
            },
            "required": ["document_id", "comment"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let start = std::time::Instant::now();
        let document_id = required_str(&params, "document_id")?;
        let comment = required_str(&params, "comment")?;

        let url = format!(
            "{}/files/{}/comments?fields=id,content,createdTime",
            DRIVE_API_BASE,
            encode_segment(document_id)
        );
        let created = self
            .client
            .post(&url, &serde_json::json!({ "content": comment }), ctx)
            .await?;

        Ok(ToolOutput::success(
            serde_json::json!({
                "document_id": document_id,
                "comment_id": created["id"].as_str().unwrap_or(""),
            }),
            start.elapsed(),
        ))
    }
}

/// Searches the user's Drive for Google Docs by name.
pub struct SearchDocsTool {
    client: GoogleClient,
}

impl SearchDocsTool {
    pub fn new(client: GoogleClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for SearchDocsTool {
    fn name(&self) -> &str {
        "search_google_docs"
    }

    fn description(&self) -> &str {
        "Searches the user's Google Drive for documents whose name matches a query."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Text to match against document names"
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
            "application/vnd.google-apps.document",
            query,
            max_results,
            ctx,
        )
        .await?;

        Ok(ToolOutput::success(
            serde_json::json!({ "documents": files }),
            start.elapsed(),
        ))
    }
}

/// Insert text at the end of the document body via batchUpdate.
async fn insert_text_at_end(
    client: &GoogleClient,
    document_id: &str,
    text: &str,
    ctx: &ToolContext,
) -> Result<(), ToolError> {
    let url = format!(
        "{}/documents/{}:batchUpdate",
        DOCS_API_BASE,
        encode_segment(document_id)
    );
    let body = serde_json::json!({
        "requests": [{
            "insertText": {
                "endOfSegmentLocation": { "segmentId": "" },
                "text": text,
            }
        }]
    });
    client.post(&url, &body, ctx).await?;
    Ok(())
}

/// Walk structural elements and collect paragraph text runs.
fn extract_text(elements: &[serde_json::Value], out: &mut String) {
    for element in elements {
        if let Some(runs) = element["paragraph"]["elements"].as_array() {
            for run in runs {
                if let Some(content) = run["textRun"]["content"].as_str() {
                    out.push_str(content);
                }
            }
        }
        if let Some(rows) = element["table"]["tableRows"].as_array() {
            for row in rows {
                if let Some(cells) = row["tableCells"].as_array() {
                    for cell in cells {
                        if let Some(nested) = cell["content"].as_array() {
                            extract_text(nested, out);
                        }
                    }
                }
            }
        }
    }
}

/// Drive file search restricted to a mime type, name-matched and
/// non-trashed, newest first.
pub(super) async fn drive_search(
    client: &GoogleClient,
    mime_type: &str,
    query: &str,
    max_results: u64,
    ctx: &ToolContext,
) -> Result<Vec<serde_json::Value>, ToolError> {
    // Drive query strings escape single quotes with a backslash.
    let escaped = query.replace('\'', "\\'");
    let q = format!(
        "mimeType='{}' and name contains '{}' and trashed=false",
        mime_type, escaped
    );
    let url = format!(
        "{}/files?q={}&pageSize={}&orderBy=modifiedTime desc&fields=files(id,name,modifiedTime,webViewLink)",
        DRIVE_API_BASE,
        urlencoding::encode(&q),
        max_results,
    );

    let response = client.get(&url, ctx).await?;
    Ok(response["files"].as_array().cloned().unwrap_or_default())
}

pub(super) fn required_str<'a>(
    params: &'a serde_json::Value,
    field: &str,
) -> Result<&'a str, ToolError> {
    params
        .get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolError::InvalidParameters(format!("missing '{}' parameter", field)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_text_from_paragraphs_and_tables() {
        let elements = serde_json::json!([
            { "paragraph": { "elements": [
                { "textRun": { "content": "Meeting Notes\n" } }
            ]}},
            { "table": { "tableRows": [
                { "tableCells": [
                    { "content": [
                        { "paragraph": { "elements": [
                            { "textRun": { "content": "cell" } }
                        ]}}
                    ]}
                ]}
            ]}}
        ]);

        let mut out = String::new();
        extract_text(elements.as_array().unwrap(), &mut out);
        assert_eq!(out, "Meeting Notes\ncell");
    }

    #[test]
    fn test_required_str() {
        let params = serde_json::json!({"title": "Notes", "count": 3});
        assert_eq!(required_str(&params, "title").unwrap(), "Notes");
        assert!(required_str(&params, "count").is_err());
        assert!(required_str(&params, "missing").is_err());
    }

    #[test]
    fn test_schemas_declare_required_fields() {
        let client = GoogleClient::new();
        for (tool, field) in [
            (&CreateDocTool::new(client.clone()) as &dyn Tool, "title"),
            (&ReadDocTool::new(client.clone()), "document_id"),
            (&AppendDocTool::new(client.clone()), "text"),
            (&CommentDocTool::new(client.clone()), "comment"),
            (&SearchDocsTool::new(client.clone()), "query"),
        ] {
            let schema = tool.parameters_schema();
            let required: Vec<&str> = schema["required"]
                .as_array()
                .unwrap()
                .iter()
                .filter_map(|v| v.as_str())
                .collect();
            assert!(required.contains(&field), "{} missing {}", tool.name(), field);
        }
    }
}
