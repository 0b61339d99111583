//! ORBIT tools served over `/rpc`.
//!
//! | Tool                    | Mock mode only |
//! |-------------------------|----------------|
//! | `process_order`         |                |
//! | `workflow_health_check` |                |
//! | `get_workflow_context`  |                |
//! | `get_server_info`       |                |
//! | `ai_analyze_image`      | yes            |
//! | `embed_metadata`        | yes            |

use std::sync::Arc;

use orbit_config::AnalysisType;
use orbit_rpc::protocol::PROTOCOL_VERSION;
use orbit_rpc::{FieldType, InputSchema, RpcServer, ToolDefinition, ToolError, ToolOutput};
use orbit_workflow::rpc_backed::tools::{AI_ANALYZE_IMAGE, EMBED_METADATA};
use orbit_workflow::{Action, EmbedRequest, MockImageServices, Orchestrator, ProcessRequest, mock};
use serde::Deserialize;
use serde_json::json;

use crate::error::Result;

pub const PROCESS_ORDER: &str = "process_order";
pub const WORKFLOW_HEALTH_CHECK: &str = "workflow_health_check";
pub const GET_WORKFLOW_CONTEXT: &str = "get_workflow_context";
pub const GET_SERVER_INFO: &str = "get_server_info";

/// Name reported in `initialize` and `get_server_info`.
pub const SERVER_NAME: &str = "orbit-workflow";

#[derive(Debug, Deserialize)]
struct ProcessOrderArgs {
    order_id: String,
    #[serde(default)]
    action: Action,
    #[serde(default)]
    correlation_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnalyzeArgs {
    image_url: String,
    #[serde(default)]
    analysis_type: AnalysisType,
}

#[derive(Debug, Deserialize)]
struct NoArgs {}

/// Build the RPC server with every ORBIT tool registered.
pub fn build_rpc_server(orchestrator: Arc<Orchestrator>, mock_mode: bool) -> Result<RpcServer> {
    let mut server = RpcServer::new(SERVER_NAME, env!("CARGO_PKG_VERSION"));

    let orch = orchestrator.clone();
    server.register_tool(ToolDefinition::typed(
        PROCESS_ORDER,
        "Run the image-enrichment workflow for one order",
        InputSchema::new()
            .required("order_id", FieldType::String, "Order to process")
            .optional("action", FieldType::String, "process (default) or finalize")
            .one_of(&["process", "finalize"])
            .optional("correlation_id", FieldType::String, "Caller-supplied trace id"),
        move |args: ProcessOrderArgs| {
            let orch = orch.clone();
            async move {
                let mut request = ProcessRequest::new(args.order_id).with_action(args.action);
                request.correlation_id = args.correlation_id;
                let report = orch.run(request).await;
                ToolOutput::json(&report)
            }
        },
    ))?;

    let orch = orchestrator.clone();
    server.register_tool(ToolDefinition::typed(
        WORKFLOW_HEALTH_CHECK,
        "Probe the data store, blob store, and every pooled service",
        InputSchema::new(),
        move |_: NoArgs| {
            let orch = orch.clone();
            async move { ToolOutput::json(&orch.health_check().await) }
        },
    ))?;

    let orch = orchestrator.clone();
    server.register_tool(ToolDefinition::typed(
        GET_WORKFLOW_CONTEXT,
        "Count pending paid orders and check that storage is accessible",
        InputSchema::new(),
        move |_: NoArgs| {
            let orch = orch.clone();
            async move { ToolOutput::json(&orch.readiness().await) }
        },
    ))?;

    let mut tool_names = vec![
        PROCESS_ORDER,
        WORKFLOW_HEALTH_CHECK,
        GET_WORKFLOW_CONTEXT,
        GET_SERVER_INFO,
    ];
    if mock_mode {
        tool_names.extend([AI_ANALYZE_IMAGE, EMBED_METADATA]);
    }
    let info = json!({
        "name": SERVER_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "protocol_version": PROTOCOL_VERSION,
        "mock_mode": mock_mode,
        "tools": tool_names,
    });
    server.register_tool(ToolDefinition::typed(
        GET_SERVER_INFO,
        "Server identity, protocol version, and available tools",
        InputSchema::new(),
        move |_: NoArgs| {
            let info = info.clone();
            async move { Ok(ToolOutput::Json(info)) }
        },
    ))?;

    if mock_mode {
        register_mock_tools(&mut server, &orchestrator)?;
    }

    tracing::info!(tools = ?server.registry().names(), mock_mode, "RPC tools registered");
    Ok(server)
}

fn register_mock_tools(server: &mut RpcServer, orchestrator: &Orchestrator) -> Result<()> {
    server.register_tool(ToolDefinition::typed(
        AI_ANALYZE_IMAGE,
        "Deterministic image analysis (mock mode)",
        InputSchema::new()
            .required("image_url", FieldType::String, "URL of the image")
            .optional("analysis_type", FieldType::String, "lifestyle or product")
            .one_of(&["lifestyle", "product"]),
        |args: AnalyzeArgs| async move {
            Ok(ToolOutput::Json(mock::mock_analysis_payload(
                &args.image_url,
                args.analysis_type,
            )))
        },
    ))?;

    let services = Arc::new(MockImageServices::new(
        orchestrator.collaborators().blobs.clone(),
    ));
    server.register_tool(ToolDefinition::typed(
        EMBED_METADATA,
        "Copy the original to the output path and report embedded fields (mock mode)",
        InputSchema::new()
            .required("source_path", FieldType::String, "Blob path of the original")
            .required("output_path", FieldType::String, "Blob path for the artifact")
            .required("metadata", FieldType::Object, "Metadata to embed")
            .required("compression_quality", FieldType::Integer, "Output quality, 1-100"),
        move |request: EmbedRequest| {
            let services = services.clone();
            async move {
                services
                    .embed_payload(&request)
                    .await
                    .map(ToolOutput::Json)
                    .map_err(|e| ToolError::failed(e.to_string()))
            }
        },
    ))?;
    Ok(())
}
