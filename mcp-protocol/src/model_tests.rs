//! Unit tests for protocol model types

#[cfg(test)]
mod tests {
    use super::super::model::*;
    use crate::Error;
    use serde_json::json;

    #[test]
    fn test_request_deserialization() {
        let request: Request = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/list"
        }))
        .unwrap();

        assert_eq!(request.jsonrpc, "2.0");
        assert_eq!(request.method, "tools/list");
        assert_eq!(request.id, Some(json!(1)));
        assert!(request.params.is_null());
        assert!(!request.is_notification());
    }

    #[test]
    fn test_null_id_is_not_a_notification() {
        let request: Request = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": null,
            "method": "ping"
        }))
        .unwrap();
        assert_eq!(request.id, Some(serde_json::Value::Null));
        assert!(!request.is_notification());
    }

    #[test]
    fn test_missing_id_is_a_notification() {
        let request: Request = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized"
        }))
        .unwrap();
        assert!(request.is_notification());
    }

    #[test]
    fn test_response_with_result() {
        let response = Response::success(json!(1), json!({"tools": []}));

        let serialized = serde_json::to_string(&response).unwrap();
        assert!(serialized.contains("\"result\""));
        assert!(!serialized.contains("\"error\""));
    }

    #[test]
    fn test_response_with_error() {
        let response = Response::error(json!("abc"), Error::method_not_found("unknown_method"));

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["id"], "abc");
        assert_eq!(value["error"]["code"], -32601);
        assert!(value.get("result").is_none());
    }

    #[test]
    fn test_tool_serializes_camel_case() {
        let tool = Tool {
            name: "list_jobs".to_string(),
            description: "List jobs".to_string(),
            input_schema: json!({"type": "object"}),
            annotations: Some(ToolAnnotations {
                read_only_hint: Some(true),
                ..Default::default()
            }),
        };

        let value = serde_json::to_value(&tool).unwrap();
        assert!(value.get("inputSchema").is_some());
        assert_eq!(value["annotations"]["readOnlyHint"], true);
        assert!(value["annotations"].get("destructiveHint").is_none());
    }

    #[test]
    fn test_tool_idempotency_from_annotations() {
        let mut tool = Tool {
            name: "trigger_build".to_string(),
            description: "Trigger".to_string(),
            input_schema: json!({"type": "object"}),
            annotations: None,
        };
        assert!(!tool.is_idempotent());

        tool.annotations = Some(ToolAnnotations {
            destructive_hint: Some(false),
            ..Default::default()
        });
        assert!(!tool.is_idempotent());

        tool.annotations = Some(ToolAnnotations {
            idempotent_hint: Some(true),
            ..Default::default()
        });
        assert!(tool.is_idempotent());
    }

    #[test]
    fn test_call_tool_params_without_arguments() {
        let params: CallToolRequestParam =
            serde_json::from_value(json!({"name": "list_jobs"})).unwrap();
        assert_eq!(params.name, "list_jobs");
        assert!(params.arguments.is_none());
    }

    #[test]
    fn test_structured_call_tool_result() {
        let result = CallToolResult::structured(json!({"jobs": ["a", "b"]}));
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["isError"], false);
        assert_eq!(value["structuredContent"]["jobs"][1], "b");
        assert_eq!(value["content"][0]["type"], "text");
        assert!(value["content"][0]["text"].as_str().unwrap().contains("\"jobs\""));
    }

    #[test]
    fn test_string_result_is_not_requoted() {
        let result = CallToolResult::structured(json!("Started by user"));
        assert_eq!(result.content, vec![Content::text("Started by user")]);
    }

    #[test]
    fn test_initialize_result_shape() {
        let result = InitializeResult {
            protocol_version: "2025-06-18".to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability::default()),
            },
            server_info: Implementation {
                name: "buildgate".to_string(),
                version: "0.1.0".to_string(),
            },
            instructions: None,
        };

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["protocolVersion"], "2025-06-18");
        assert_eq!(value["capabilities"]["tools"]["listChanged"], false);
        assert_eq!(value["serverInfo"]["name"], "buildgate");
    }
}
