//! Google Workspace capability providers.
//!
//! Each operation the agent can perform against Docs, Sheets, Drive, and
//! Gmail is one `Tool` implementation over the shared REST client.

mod client;
mod docs;
mod gmail;
mod sheets;

use std::sync::Arc;

pub use client::GoogleClient;
pub use docs::{AppendDocTool, CommentDocTool, CreateDocTool, ReadDocTool, SearchDocsTool};
pub use gmail::{SearchGmailTool, SendGmailTool};
pub use sheets::{AddRowTool, CreateSheetTool, ReadSheetTool, SearchSheetsTool, UpdateSheetTool};

use crate::tools::tool::Tool;

/// The full capability set advertised to the model.
pub fn all_tools() -> Vec<Arc<dyn Tool>> {
    let client = GoogleClient::new();
    vec![
        Arc::new(CreateDocTool::new(client.clone())),
        Arc::new(ReadDocTool::new(client.clone())),
        Arc::new(AppendDocTool::new(client.clone())),
        Arc::new(CommentDocTool::new(client.clone())),
        Arc::new(SearchDocsTool::new(client.clone())),
        Arc::new(CreateSheetTool::new(client.clone())),
        Arc::new(ReadSheetTool::new(client.clone())),
        Arc::new(UpdateSheetTool::new(client.clone())),
        Arc::new(AddRowTool::new(client.clone())),
        Arc::new(SearchSheetsTool::new(client.clone())),
        Arc::new(SendGmailTool::new(client.clone())),
        Arc::new(SearchGmailTool::new(client)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::registry::ToolRegistry;

    #[test]
    fn test_all_tools_register_cleanly() {
        let registry = ToolRegistry::new(all_tools()).unwrap();
        assert_eq!(registry.len(), 12);
        assert!(registry.get("create_google_doc").is_some());
        assert!(registry.get("add_sheet_row").is_some());
        assert!(registry.get("send_gmail").is_some());
    }
}
