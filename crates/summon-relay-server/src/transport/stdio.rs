//! stdio transport for MCP JSON-RPC
//!
//! One request per line in, one response per line out. Logging must not go
//! to stdout.

use crate::RelayServer;
use crate::mcp::{
    InitializeParams, InitializeResult, PROTOCOL_VERSION, Request, RequestId, ResourcesCapability,
    Response, ServerCapabilities, ServerInfo, ToolsCapability,
};
use crate::tools::{error_code, handle_tool_call, list_tools, queue_status};
use summon_relay_core::{RelayError, Result, error_codes};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error, info};

const QUEUE_URI: &str = "relay://queue";
const METHOD_NOT_FOUND: i32 = -32601;

/// Run the MCP server on stdio
pub async fn run(server: RelayServer) -> Result<()> {
    let reader = BufReader::new(tokio::io::stdin());
    serve(&server, reader, tokio::io::stdout()).await
}

/// Serve requests from `reader` until EOF, writing responses to `writer`
pub async fn serve<R, W>(server: &RelayServer, mut reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = String::new();
    info!("Summon relay MCP server starting");

    loop {
        line.clear();
        let bytes_read = reader
            .read_line(&mut line)
            .await
            .map_err(|e| RelayError::Protocol(format!("Failed to read stdin: {}", e)))?;

        if bytes_read == 0 {
            info!("Client disconnected (EOF)");
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        debug!("Received: {}", trimmed);

        let request: Request = match serde_json::from_str(trimmed) {
            Ok(r) => r,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                continue;
            }
        };

        let Some(response) = handle_request(&request, server).await else {
            debug!("Notification {} handled", request.method);
            continue;
        };
        let response_json = serde_json::to_string(&response)?;

        debug!("Sending: {}", response_json);

        writer
            .write_all(response_json.as_bytes())
            .await
            .map_err(|e| RelayError::Protocol(format!("Failed to write stdout: {}", e)))?;
        writer
            .write_all(b"\n")
            .await
            .map_err(|e| RelayError::Protocol(format!("Failed to write newline: {}", e)))?;
        writer
            .flush()
            .await
            .map_err(|e| RelayError::Protocol(format!("Failed to flush stdout: {}", e)))?;
    }

    Ok(())
}

async fn handle_request(request: &Request, server: &RelayServer) -> Option<Response> {
    let id = request.id.clone()?;

    let response = match request.method.as_str() {
        "initialize" => handle_initialize(id, request, server),
        "ping" => Response::success(id, serde_json::json!({})),
        "tools/list" => Response::success(id, serde_json::json!({ "tools": list_tools() })),
        "tools/call" => handle_tools_call(id, request, server).await,
        "resources/list" => handle_resources_list(id),
        "resources/read" => handle_resources_read(id, request, server).await,
        _ => Response::error(
            id,
            METHOD_NOT_FOUND,
            format!("Method not found: {}", request.method),
        ),
    };
    Some(response)
}

fn handle_initialize(id: RequestId, request: &Request, server: &RelayServer) -> Response {
    let params: InitializeParams = match serde_json::from_value(request.params.clone()) {
        Ok(p) => p,
        Err(e) => {
            return Response::error(
                id,
                error_codes::INVALID_PARAMS,
                format!("Invalid initialize params: {}", e),
            );
        }
    };
    info!(
        "Client {} {} connected (protocol {})",
        params.client_info.name, params.client_info.version, params.protocol_version
    );

    let result = InitializeResult {
        protocol_version: PROTOCOL_VERSION.to_string(),
        capabilities: ServerCapabilities {
            tools: ToolsCapability {
                list_changed: false,
            },
            resources: ResourcesCapability {
                subscribe: false,
                list_changed: false,
            },
        },
        server_info: ServerInfo {
            name: server.name().to_string(),
            version: server.version().to_string(),
        },
    };

    match serde_json::to_value(result) {
        Ok(value) => Response::success(id, value),
        Err(e) => Response::error(id, error_codes::INTERNAL_ERROR, e.to_string()),
    }
}

async fn handle_tools_call(id: RequestId, request: &Request, server: &RelayServer) -> Response {
    #[derive(serde::Deserialize)]
    struct ToolCallParams {
        name: String,
        #[serde(default)]
        arguments: serde_json::Value,
    }

    let params: ToolCallParams = match serde_json::from_value(request.params.clone()) {
        Ok(p) => p,
        Err(e) => {
            return Response::error(
                id,
                error_codes::INVALID_PARAMS,
                format!("Invalid tool call params: {}", e),
            );
        }
    };

    handle_tool_call(&params.name, params.arguments, id, server.relay()).await
}

fn handle_resources_list(id: RequestId) -> Response {
    let resources = vec![serde_json::json!({
        "uri": QUEUE_URI,
        "name": "Result Queue",
        "description": "Whether a result is waiting, without consuming it",
        "mimeType": "application/json"
    })];

    Response::success(id, serde_json::json!({ "resources": resources }))
}

async fn handle_resources_read(
    id: RequestId,
    request: &Request,
    server: &RelayServer,
) -> Response {
    #[derive(serde::Deserialize)]
    struct ReadParams {
        uri: String,
    }

    let params: ReadParams = match serde_json::from_value(request.params.clone()) {
        Ok(p) => p,
        Err(e) => {
            return Response::error(
                id,
                error_codes::INVALID_PARAMS,
                format!("Invalid read params: {}", e),
            );
        }
    };

    if params.uri != QUEUE_URI {
        return Response::error(
            id,
            error_codes::INVALID_PARAMS,
            format!("Unknown resource: {}", params.uri),
        );
    }

    let content = match queue_status(server.relay()).await {
        Ok(content) => content,
        Err(e) => return Response::error(id, error_code(&e), e.to_string()),
    };

    Response::success(
        id,
        serde_json::json!({
            "contents": [{
                "uri": params.uri,
                "mimeType": "application/json",
                "text": content.to_string()
            }]
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ResultRelay;
    use summon_relay_store::RelayConfig;
    use tempfile::tempdir;

    async fn exchange(server: &RelayServer, input: &str) -> Vec<serde_json::Value> {
        let mut out = Vec::new();
        serve(server, BufReader::new(input.as_bytes()), &mut out)
            .await
            .unwrap();
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    fn server(dir: &std::path::Path) -> RelayServer {
        RelayServer::new(ResultRelay::open(&RelayConfig::with_assets_dir(dir)).unwrap())
    }

    #[tokio::test]
    async fn test_initialize_and_notifications() {
        let dir = tempdir().unwrap();
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2025-11-25","capabilities":{},"clientInfo":{"name":"t","version":"0"}}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n\n",
            "not json\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            "\n",
        );

        let responses = exchange(&server(dir.path()), input).await;
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], 1);
        assert_eq!(responses[0]["result"]["serverInfo"]["name"], "summon-relay");
        assert_eq!(responses[1]["result"]["tools"].as_array().unwrap().len(), 7);
    }

    #[tokio::test]
    async fn test_queue_resource() {
        let dir = tempdir().unwrap();
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":"a","method":"resources/read","params":{"uri":"relay://queue"}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":"b","method":"resources/read","params":{"uri":"relay://other"}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":"c","method":"sampling/createMessage"}"#,
            "\n",
        );

        let responses = exchange(&server(dir.path()), input).await;
        let text = responses[0]["result"]["contents"][0]["text"].as_str().unwrap();
        let status: serde_json::Value = serde_json::from_str(text).unwrap();
        assert_eq!(status["hasResult"], false);
        assert_eq!(responses[1]["error"]["code"], error_codes::INVALID_PARAMS);
        assert_eq!(responses[2]["error"]["code"], METHOD_NOT_FOUND);
    }
}
