//! MCP server exposing `submit_review`.

use hunkwise_core::ingest::{IngestService, Validation};
use hunkwise_core::types::{Hunk, Review, Section};
use rmcp::{
    handler::server::{
        router::tool::ToolRouter,
        wrapper::{Json, Parameters},
    },
    model::{ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Clone)]
pub struct ReviewMcpServer {
    ingest: IngestService,
    tool_router: ToolRouter<Self>,
}

// ============================================================================
// Parameter Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReviewParams {
    #[schemars(description = "Absolute path of the repository the review is about")]
    #[serde(default)]
    pub working_directory: String,

    #[schemars(description = "Short title for the whole change")]
    #[serde(default)]
    pub title: String,

    #[schemars(description = "Sections in reading order, each a narrative plus its hunks")]
    #[serde(default)]
    pub sections: Vec<SectionInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SectionInput {
    #[schemars(description = "Section id, unique within the review")]
    pub id: String,

    #[schemars(description = "Prose explaining what this group of hunks does")]
    #[serde(default)]
    pub narrative: String,

    #[serde(default)]
    pub hunks: Vec<HunkInput>,

    #[schemars(description = "Optional chapter this section belongs to")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HunkInput {
    #[schemars(description = "Repository-relative path (post-change side)")]
    pub file: String,

    #[schemars(description = "1-based first line of the hunk on the post-change side")]
    pub start_line: u32,

    #[schemars(description = "Full unified-diff text of the hunk, starting with its @@ header")]
    pub diff: String,

    #[schemars(description = "One of: high, medium, low")]
    pub importance: String,
}

impl From<SubmitReviewParams> for Review {
    fn from(params: SubmitReviewParams) -> Self {
        Review {
            working_directory: params.working_directory,
            title: params.title,
            created_at: None,
            sections: params
                .sections
                .into_iter()
                .map(|s| Section {
                    id: s.id,
                    narrative: s.narrative,
                    chapter_id: s.chapter_id,
                    hunks: s
                        .hunks
                        .into_iter()
                        .map(|h| Hunk {
                            file: h.file,
                            start_line: h.start_line,
                            diff: h.diff,
                            importance: h.importance,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

/// `submit_review` result: `{success, filePath?, error?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReviewOutput {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Tool Router Implementation
// ============================================================================

#[tool_router]
impl ReviewMcpServer {
    pub fn new(ingest: IngestService) -> Self {
        Self { ingest, tool_router: Self::tool_router() }
    }

    #[tool(
        description = "Submit a narrated code review for a repository. Each section holds a narrative and the diff hunks it covers; every hunk needs an importance of high, medium or low. Returns {success, filePath?, error?}."
    )]
    async fn submit_review(
        &self,
        Parameters(params): Parameters<SubmitReviewParams>,
    ) -> Result<Json<SubmitReviewOutput>, McpError> {
        Ok(Json(self.submit(params).await))
    }
}

impl ReviewMcpServer {
    /// Runs strict ingest. Every ingest failure is reported in the payload.
    async fn submit(&self, params: SubmitReviewParams) -> SubmitReviewOutput {
        match self.ingest.submit(params.into(), Validation::Strict).await {
            Ok(result) => {
                info!(path = %result.file_path.display(), "review submitted over MCP");
                SubmitReviewOutput {
                    success: true,
                    file_path: Some(result.file_path.to_string_lossy().into_owned()),
                    error: None,
                }
            }
            Err(e) => {
                warn!(error = %e, producer = e.is_producer_error(), "MCP review rejected");
                SubmitReviewOutput { success: false, file_path: None, error: Some(e.to_string()) }
            }
        }
    }
}

#[tool_handler]
impl rmcp::ServerHandler for ReviewMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Stores a narrated code review for a working directory so the hunkwise \
                 terminal viewer can display it. Call submit_review with the repository \
                 path, a title and ordered sections of diff hunks."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use hunkwise_core::clock::SystemClock;
    use hunkwise_core::store::ReviewStore;
    use rmcp::handler::server::tool::IntoCallToolResult;

    use super::*;

    fn server(store_dir: &std::path::Path) -> ReviewMcpServer {
        ReviewMcpServer::new(IngestService::new(ReviewStore::new(store_dir), Arc::new(SystemClock)))
    }

    fn params(dir: &str, importance: &str) -> SubmitReviewParams {
        serde_json::from_value(serde_json::json!({
            "workingDirectory": dir,
            "title": "Demo",
            "sections": [{
                "id": "s1",
                "narrative": "Add greeting",
                "hunks": [{
                    "file": "main.x",
                    "startLine": 10,
                    "diff": "@@ -10,1 +10,2 @@\n line\n+hi",
                    "importance": importance
                }]
            }]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn successful_submit_reports_file_path() {
        let store_dir = tempfile::tempdir().unwrap();
        let server = server(store_dir.path());

        let output = server.submit(params("/tmp/hunkwise-mcp", "Important")).await;
        assert!(output.success, "{output:?}");
        let path = output.file_path.unwrap();
        assert!(std::path::Path::new(&path).exists());

        let stored = ReviewStore::new(store_dir.path()).read("/tmp/hunkwise-mcp").await.unwrap();
        assert_eq!(stored.sections[0].hunks[0].importance, "high");
    }

    #[tokio::test]
    async fn producer_errors_are_payloads_not_rpc_errors() {
        let store_dir = tempfile::tempdir().unwrap();
        let server = server(store_dir.path());

        let output = server.submit(params("", "low")).await;
        assert!(!output.success);
        assert_eq!(output.error.as_deref(), Some("workingDirectory is required"));

        let output = server.submit(params("/tmp/hunkwise-mcp", "")).await;
        assert!(!output.success);
        assert!(output.error.unwrap().contains("invalid importance"));

        let result = server.submit_review(Parameters(params("", "low"))).await;
        let Json(output) = result.expect("producer errors are not JSON-RPC errors");
        assert!(!output.success);
    }

    #[tokio::test]
    async fn tool_result_is_structured() {
        let store_dir = tempfile::tempdir().unwrap();
        let server = server(store_dir.path());
        let result = server.submit_review(Parameters(params("/tmp/hunkwise-mcp", "low"))).await;
        let result = result.into_call_tool_result().unwrap();
        assert_ne!(result.is_error, Some(true));

        let structured = result.structured_content.expect("structured content");
        assert_eq!(structured["success"], serde_json::json!(true));
        assert!(structured["filePath"].as_str().is_some_and(|p| p.ends_with(".json")));
        assert!(structured.get("error").is_none());
    }

    #[test]
    fn output_omits_absent_fields() {
        let output = SubmitReviewOutput { success: false, file_path: None, error: Some("x".into()) };
        assert_eq!(serde_json::to_value(&output).unwrap(), serde_json::json!({"success": false, "error": "x"}));
    }

    #[test]
    fn tool_is_listed() {
        let tools = ReviewMcpServer::tool_router().list_all();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_ref()).collect();
        assert_eq!(names, ["submit_review"]);

        let schema = tools[0].output_schema.as_ref().expect("output schema is advertised");
        let properties = schema.get("properties").and_then(|p| p.as_object()).unwrap();
        for key in ["success", "filePath", "error"] {
            assert!(properties.contains_key(key), "missing {key} in output schema");
        }
    }
}
