//! MCP tool handlers for the result relay

use serde::{Deserialize, Serialize};
use summon_relay_core::{
    AttackResult, ExecutionId, RawResult, RelayError, Result, ResultType, error_codes,
};
use tracing::warn;

use crate::mcp::{RequestId, Response};
use crate::relay::ResultRelay;

const DEFAULT_LIST_LIMIT: usize = 20;

/// Tool definition for MCP tools/list
#[derive(Debug, Clone, Serialize)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

/// Get list of available tools
pub fn list_tools() -> Vec<ToolDef> {
    vec![
        ToolDef {
            name: "save_mcp_result".into(),
            description: "Queue a result for the game front-end. Replaces any result still waiting. Example: {\"result\": \"{\\\"comment\\\": \\\"Victory!\\\"}\"}".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "result": {
                        "type": ["string", "object"],
                        "description": "JSON text or object. Text that is not JSON is kept as-is under rawResult"
                    },
                    "process": {
                        "type": "boolean",
                        "description": "Also register creatures and extract models carried by the result",
                        "default": false
                    }
                },
                "required": ["result"]
            }),
        },
        ToolDef {
            name: "save_attack_result".into(),
            description: "Queue an attack. Negative damage hurts, positive heals. Example: {\"comment\": \"Tail swipe!\", \"attacker\": {\"damage\": 0}, \"defender\": {\"damage\": -40}}".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "comment": {
                        "type": "string",
                        "description": "Play-by-play line shown to the player"
                    },
                    "attacker": {
                        "type": "object",
                        "properties": { "damage": { "type": "integer" } },
                        "required": ["damage"]
                    },
                    "defender": {
                        "type": "object",
                        "properties": { "damage": { "type": "integer" } },
                        "required": ["damage"]
                    }
                },
                "required": ["comment", "attacker", "defender"]
            }),
        },
        ToolDef {
            name: "get_current_mcp_result".into(),
            description: "Take the queued result. It is removed once read.".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
        },
        ToolDef {
            name: "get_mcp_result".into(),
            description: "Take the result with a given execution id. It is removed once read.".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "executionId": {
                        "type": "string",
                        "description": "Id returned when the result was saved"
                    }
                },
                "required": ["executionId"]
            }),
        },
        ToolDef {
            name: "get_mcp_result_status".into(),
            description: "Check whether a result is queued without taking it".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
        },
        ToolDef {
            name: "delete_mcp_result".into(),
            description: "Discard a queued result without reading it".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "executionId": {
                        "type": "string"
                    }
                },
                "required": ["executionId"]
            }),
        },
        ToolDef {
            name: "list_mcp_results".into(),
            description: "Summaries of stored results, newest first. Does not consume them.".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "limit": {
                        "type": "integer",
                        "default": DEFAULT_LIST_LIMIT
                    },
                    "resultType": {
                        "type": "string",
                        "description": "Only results of this type, e.g. \"attack\" or \"creature_data\""
                    }
                }
            }),
        },
    ]
}

/// Parameters for save_mcp_result
#[derive(Debug, Deserialize)]
pub struct SaveResultParams {
    pub result: serde_json::Value,
    #[serde(default)]
    pub process: bool,
}

/// Parameters for tools addressing one execution
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionParams {
    pub execution_id: ExecutionId,
}

/// Parameters for list_mcp_results
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    #[serde(default = "default_limit")]
    pub limit: usize,
    pub result_type: Option<ResultType>,
}

fn default_limit() -> usize {
    DEFAULT_LIST_LIMIT
}

/// Handle a tools/call request
pub async fn handle_tool_call(
    name: &str,
    params: serde_json::Value,
    id: RequestId,
    relay: &ResultRelay,
) -> Response {
    let result = match name {
        "save_mcp_result" => handle_save(params, relay).await,
        "save_attack_result" => handle_save_attack(params, relay).await,
        "get_current_mcp_result" => handle_get_current(relay).await,
        "get_mcp_result" => handle_get(params, relay).await,
        "get_mcp_result_status" => handle_status(relay).await,
        "delete_mcp_result" => handle_delete(params, relay).await,
        "list_mcp_results" => handle_list(params, relay).await,
        _ => Err(RelayError::Protocol(format!("Unknown tool: {}", name))),
    };

    match result {
        Ok(value) => Response::success(
            id,
            serde_json::json!({ "content": [{ "type": "text", "text": value.to_string() }] }),
        ),
        Err(e) => {
            warn!("Tool {} failed: {}", name, e);
            Response::error(id, error_code(&e), e.to_string())
        }
    }
}

/// JSON-RPC code for a relay error
pub fn error_code(err: &RelayError) -> i32 {
    match err {
        RelayError::Storage(_) | RelayError::CorruptRecord(_) => error_codes::STORAGE_ERROR,
        RelayError::Validation { .. } => error_codes::VALIDATION_ERROR,
        RelayError::Timeout(_) => error_codes::TIMEOUT,
        RelayError::Serialization(_) => error_codes::INVALID_PARAMS,
        _ => error_codes::INTERNAL_ERROR,
    }
}

async fn handle_save(params: serde_json::Value, relay: &ResultRelay) -> Result<serde_json::Value> {
    let p: SaveResultParams = serde_json::from_value(params)?;
    let raw = RawResult::from(p.result);

    if p.process {
        let report = relay.submit_and_process(raw).await?;
        Ok(serde_json::to_value(report)?)
    } else {
        let receipt = relay.submit(raw).await?;
        Ok(serde_json::to_value(receipt)?)
    }
}

async fn handle_save_attack(
    params: serde_json::Value,
    relay: &ResultRelay,
) -> Result<serde_json::Value> {
    let attack: AttackResult = serde_json::from_value(params)?;
    let receipt = relay.submit_attack(attack).await?;
    Ok(serde_json::to_value(receipt)?)
}

async fn handle_get_current(relay: &ResultRelay) -> Result<serde_json::Value> {
    match relay.fetch_current().await? {
        Some(fetched) => Ok(serde_json::to_value(fetched)?),
        None => Ok(serde_json::json!({
            "status": "empty",
            "message": "No result is queued"
        })),
    }
}

async fn handle_get(params: serde_json::Value, relay: &ResultRelay) -> Result<serde_json::Value> {
    let p: ExecutionParams = serde_json::from_value(params)?;
    match relay.fetch(&p.execution_id).await? {
        Some(fetched) => Ok(serde_json::to_value(fetched)?),
        None => Ok(serde_json::json!({
            "status": "not_found",
            "executionId": p.execution_id,
            "message": format!("No result for execution {}", p.execution_id)
        })),
    }
}

async fn handle_status(relay: &ResultRelay) -> Result<serde_json::Value> {
    queue_status(relay).await
}

/// Non-consuming view of the queue, shared with the relay://queue resource
pub async fn queue_status(relay: &ResultRelay) -> Result<serde_json::Value> {
    let has_result = relay.has_result().await?;
    let message = if has_result {
        "A result is queued"
    } else {
        "The queue is empty"
    };
    Ok(serde_json::json!({ "hasResult": has_result, "message": message }))
}

async fn handle_delete(
    params: serde_json::Value,
    relay: &ResultRelay,
) -> Result<serde_json::Value> {
    let p: ExecutionParams = serde_json::from_value(params)?;
    let deleted = relay.delete(&p.execution_id).await?;
    Ok(serde_json::json!({ "executionId": p.execution_id, "deleted": deleted }))
}

async fn handle_list(params: serde_json::Value, relay: &ResultRelay) -> Result<serde_json::Value> {
    let p: ListParams = if params.is_null() {
        serde_json::from_value(serde_json::json!({}))?
    } else {
        serde_json::from_value(params)?
    };
    let summaries = relay.list(p.limit, p.result_type).await?;
    Ok(serde_json::json!({ "results": summaries }))
}
