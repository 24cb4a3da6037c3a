use std::sync::Arc;

use anyhow::Result;
use rmcp::handler::server::tool::schema_for_type;
use rmcp::model::{
    CallToolRequestParams, CallToolResult, Content, ErrorCode, Implementation, JsonObject, ListToolsResult,
    PaginatedRequestParams, ProtocolVersion, ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::{RequestContext, RoleServer};
use rmcp::{ErrorData, ServerHandler, ServiceExt};

use crate::config::BridgeConfig;
use crate::dispatcher::{
    GetSupportedFormatsArgs, ListSupportedFilesArgs, ReadDocumentArgs, ReadExcelFileArgs, ReadWordDocumentArgs,
    ToolDispatcher, ToolName, ToolRequest,
};

/// MCP server exposing the document tools over stdio
#[derive(Clone)]
pub struct FileBridge {
    dispatcher: Arc<ToolDispatcher>,
}

impl FileBridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            dispatcher: Arc::new(ToolDispatcher::new(config)),
        }
    }

    fn input_schema(tool: ToolName) -> Arc<JsonObject> {
        match tool {
            ToolName::ReadDocument => schema_for_type::<ReadDocumentArgs>(),
            ToolName::ReadWordDocument => schema_for_type::<ReadWordDocumentArgs>(),
            ToolName::ReadExcelFile => schema_for_type::<ReadExcelFileArgs>(),
            ToolName::ListSupportedFiles => schema_for_type::<ListSupportedFilesArgs>(),
            ToolName::GetSupportedFormats => schema_for_type::<GetSupportedFormatsArgs>(),
        }
    }

    pub fn tools() -> Vec<Tool> {
        ToolName::ALL
            .into_iter()
            .map(|tool| Tool::new(tool.as_str(), tool.description(), Self::input_schema(tool)))
            .collect()
    }
}

impl ServerHandler for FileBridge {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").into(),
                title: Some("File Bridge".into()),
                version: env!("CARGO_PKG_VERSION").into(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Reads Word (.docx) and Excel (.xlsx, .xls, .xlsm) files into structured JSON. \
                 Every tool result is an envelope with success, file_path, content and error fields."
                    .to_string(),
            ),
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, ErrorData>> + Send + '_ {
        std::future::ready(Ok(ListToolsResult {
            tools: Self::tools(),
            next_cursor: None,
            meta: None,
        }))
    }

    #[allow(clippy::manual_async_fn)]
    fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, ErrorData>> + Send + '_ {
        async move {
            if ToolName::parse(&request.name).is_none() {
                log::warn!("Unknown tool requested: {}", request.name);
                return Err(ErrorData::new(
                    ErrorCode::METHOD_NOT_FOUND,
                    format!("Tool not found: {}", request.name),
                    None,
                ));
            }

            let tool_request = ToolRequest::new(request.name.to_string(), request.arguments);
            let dispatcher = Arc::clone(&self.dispatcher);
            // Extraction is blocking file and zip I/O
            let response = tokio::task::spawn_blocking(move || dispatcher.dispatch(&tool_request))
                .await
                .map_err(|e| ErrorData::internal_error(format!("Tool task failed: {}", e), None))?;

            let text = response.to_json_pretty();
            Ok(if response.success {
                CallToolResult::success(vec![Content::text(text)])
            } else {
                CallToolResult::error(vec![Content::text(text)])
            })
        }
    }
}

/// Serve the bridge on stdin/stdout until the client disconnects
pub async fn start_server(config: BridgeConfig) -> Result<()> {
    log::info!("Starting {} v{} on stdio", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let service = FileBridge::new(config).serve(rmcp::transport::stdio()).await?;
    let quit_reason = service.waiting().await?;

    log::info!("Server stopped: {:?}", quit_reason);
    Ok(())
}
