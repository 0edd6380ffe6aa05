//! Gmail capabilities: send and search.

use async_trait::async_trait;
use base64::Engine;

use crate::tools::google::client::{encode_segment, GoogleClient, GMAIL_API_BASE};
use crate::tools::google::docs::required_str;
use crate::tools::tool::{Tool, ToolContext, ToolError, ToolOutput};

/// Sends an email from the authorized account.
pub struct SendGmailTool {
    client: GoogleClient,
}

impl SendGmailTool {
    pub fn new(client: GoogleClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for SendGmailTool {
    fn name(&self) -> &str {
        "send_gmail"
    }

    fn description(&self) -> &str {
        "Sends an email from the user's Gmail account."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "to": {
                    "type": "string",
                    "description": "Recipient email address"
                },
                "subject": {
                    "type": "string",
                    "description": "Email subject line"
                },
                "body": {
                    "type": "string",
                    "description": "Plain-text email body"
                },
                "cc": {
                    "type": "string",
                    "description": "Optional CC address"
                }
            },
            "required": ["to", "subject", "body"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let start = std::time::Instant::now();
        let to = required_str(&params, "to")?;
        let subject = required_str(&params, "subject")?;
        let body = required_str(&params, "body")?;
        let cc = params.get("cc").and_then(|v| v.as_str());

        let raw = encode_message(to, cc, subject, body);
        let url = format!("{}/users/me/messages/send", GMAIL_API_BASE);
        let sent = self
            .client
            .post(&url, &serde_json::json!({ "raw": raw }), ctx)
            .await?;

        Ok(ToolOutput::success(
            serde_json::json!({
                "message_id": sent["id"].as_str().unwrap_or(""),
                "to": to,
                "subject": subject,
            }),
            start.elapsed(),
        ))
    }
}

/// Searches the mailbox with a Gmail query string.
pub struct SearchGmailTool {
    client: GoogleClient,
}

impl SearchGmailTool {
    pub fn new(client: GoogleClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for SearchGmailTool {
    fn name(&self) -> &str {
        "search_gmail"
    }

    fn description(&self) -> &str {
        "Searches the user's Gmail with a query like 'from:alice subject:invoice' and returns matching messages."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Gmail search query"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of messages (default 10)"
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
            .min(25);

        let list_url = format!(
            "{}/users/me/messages?q={}&maxResults={}",
            GMAIL_API_BASE,
            urlencoding::encode(query),
            max_results,
        );
        let listing = self.client.get(&list_url, ctx).await?;

        let ids: Vec<String> = listing["messages"]
            .as_array()
            .map(|msgs| {
                msgs.iter()
                    .filter_map(|m| m["id"].as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        let mut messages = Vec::with_capacity(ids.len());
        for id in &ids {
            let msg_url = format!(
                "{}/users/me/messages/{}?format=metadata&metadataHeaders=From&metadataHeaders=Subject&metadataHeaders=Date",
                GMAIL_API_BASE,
                encode_segment(id),
            );
            let msg = self.client.get(&msg_url, ctx).await?;
            messages.push(serde_json::json!({
                "id": id,
                "snippet": msg["snippet"].as_str().unwrap_or(""),
                "from": header_value(&msg, "From"),
                "subject": header_value(&msg, "Subject"),
                "date": header_value(&msg, "Date"),
            }));
        }

        Ok(ToolOutput::success(
            serde_json::json!({ "query": query, "messages": messages }),
            start.elapsed(),
        ))
    }
}

/// Build the base64url-encoded RFC 822 message Gmail expects in `raw`.
fn encode_message(to: &str, cc: Option<&str>, subject: &str, body: &str) -> String {
    let mut message = String::new();
    message.push_str(&format!("To: {}\r\n", strip_header_controls(to)));
    if let Some(cc) = cc {
        message.push_str(&format!("Cc: {}\r\n", strip_header_controls(cc)));
    }
    message.push_str(&format!("Subject: {}\r\n", strip_header_controls(subject)));
    message.push_str("Content-Type: text/plain; charset=\"UTF-8\"\r\n");
    message.push_str("\r\n");
    message.push_str(body);

    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(message)
}

/// Header values must stay on one line; CR/LF here would inject headers.
fn strip_header_controls(value: &str) -> String {
    value.chars().filter(|c| !c.is_control()).collect()
}

fn header_value(message: &serde_json::Value, name: &str) -> String {
    message["payload"]["headers"]
        .as_array()
        .and_then(|headers| {
            headers
                .iter()
                .find(|h| h["name"].as_str() == Some(name))
                .and_then(|h| h["value"].as_str())
        })
        .unwrap_or("")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_message_roundtrip() {
        let raw = encode_message("bob@example.com", None, "Hello", "Line one\nLine two");
        let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(raw)
            .unwrap();
        let text = String::from_utf8(decoded).unwrap();

        assert!(text.starts_with("To: bob@example.com\r\n"));
        assert!(text.contains("Subject: Hello\r\n"));
        assert!(text.ends_with("Line one\nLine two"));
        assert!(!text.contains("Cc:"));
    }

    #[test]
    fn test_encode_message_with_cc() {
        let raw = encode_message("bob@example.com", Some("carol@example.com"), "Hi", "x");
        let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(raw)
            .unwrap();
        assert!(String::from_utf8(decoded)
            .unwrap()
            .contains("Cc: carol@example.com\r\n"));
    }

    #[test]
    fn test_encode_message_neutralizes_header_injection() {
        let raw = encode_message(
            "bob@example.com\r\nBcc: evil@example.com",
            None,
            "Hi\r\nX-Spam: yes",
            "body",
        );
        let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(raw)
            .unwrap();
        let text = String::from_utf8(decoded).unwrap();

        // The injected text survives as inert content on the original
        // header line; no new header line is created.
        assert!(!text
            .lines()
            .any(|l| l.starts_with("Bcc:") || l.starts_with("X-Spam:")));
        assert!(text.starts_with("To: bob@example.comBcc: evil@example.com\r\n"));
    }

    #[test]
    fn test_header_value() {
        let msg = serde_json::json!({
            "payload": { "headers": [
                { "name": "From", "value": "alice@example.com" },
                { "name": "Subject", "value": "Invoice" }
            ]}
        });
        assert_eq!(header_value(&msg, "Subject"), "Invoice");
        assert_eq!(header_value(&msg, "Date"), "");
    }
}
