//! Protocol layer tests — envelope serialization, error codes, event names.

#[cfg(test)]
mod tests {
    use serde_json::json;
    use spp_protocol::*;

    // ─────────────────────────────────────────────────────────────────────
    // RequestId
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn request_id_number_serialization() {
        let id = RequestId::Number(42);
        let json = serde_json::to_value(&id).unwrap();
        assert_eq!(json, json!(42));
    }

    #[test]
    fn request_id_string_serialization() {
        let id = RequestId::String("abc-123".into());
        let json = serde_json::to_value(&id).unwrap();
        assert_eq!(json, json!("abc-123"));
    }

    #[test]
    fn request_id_number_deserialization() {
        let id: RequestId = serde_json::from_value(json!(99)).unwrap();
        assert_eq!(id, RequestId::Number(99));
    }

    #[test]
    fn request_id_string_deserialization() {
        let id: RequestId = serde_json::from_value(json!("req-1")).unwrap();
        assert_eq!(id, RequestId::String("req-1".into()));
    }

    // ─────────────────────────────────────────────────────────────────────
    // SppRequest
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn request_roundtrip() {
        let req = SppRequest {
            jsonrpc: "2.0".into(),
            id: RequestId::Number(1),
            method: "ping".into(),
            params: Some(json!({"message": "hello"})),
        };
        let json_str = serde_json::to_string(&req).unwrap();
        let parsed: SppRequest = serde_json::from_str(&json_str).unwrap();
        assert_eq!(parsed.method, "ping");
        assert_eq!(parsed.id, RequestId::Number(1));
        assert!(parsed.is_valid());
    }

    #[test]
    fn request_without_params() {
        let json = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "ping"
        });
        let req: SppRequest = serde_json::from_value(json).unwrap();
        assert_eq!(req.method, "ping");
        assert!(req.params.is_none());
        assert!(req.is_valid());
    }

    #[test]
    fn request_version_defaults_when_absent() {
        // The POST endpoint accepts bare {id, method, params} envelopes
        let wire = r#"{"id":"r1","method":"ping","params":{"message":"hi"}}"#;
        let req: SppRequest = serde_json::from_str(wire).unwrap();
        assert_eq!(req.jsonrpc, "2.0");
        assert!(req.is_valid());
    }

    #[test]
    fn request_invalid_version() {
        let req = SppRequest {
            jsonrpc: "1.0".into(),
            id: RequestId::Number(1),
            method: "test".into(),
            params: None,
        };
        assert!(!req.is_valid());
    }

    #[test]
    fn request_empty_method_invalid() {
        let req = SppRequest {
            jsonrpc: "2.0".into(),
            id: RequestId::Number(1),
            method: "".into(),
            params: None,
        };
        assert!(!req.is_valid());
    }

    // ─────────────────────────────────────────────────────────────────────
    // SppResponse
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn success_response_serialization() {
        let resp = SppResponse::success(RequestId::Number(1), json!({"reply": "pong"}));
        assert!(resp.is_success());
        assert!(!resp.is_error());

        let json_str = serde_json::to_string(&resp).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json_str).unwrap();
        assert_eq!(parsed["jsonrpc"], "2.0");
        assert_eq!(parsed["id"], 1);
        assert_eq!(parsed["result"]["reply"], "pong");
        assert!(parsed.get("error").is_none());
    }

    #[test]
    fn error_response_serialization() {
        let resp = SppResponse::error(
            Some(RequestId::Number(5)),
            SppError::method_not_found("missing"),
        );
        assert!(resp.is_error());
        assert!(!resp.is_success());

        let json_str = serde_json::to_string(&resp).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json_str).unwrap();
        assert_eq!(parsed["id"], 5);
        assert_eq!(parsed["error"]["code"], -32601);
        assert!(parsed["error"]["message"].as_str().unwrap().contains("missing"));
    }

    #[test]
    fn error_response_null_id() {
        let resp = SppResponse::error(None, SppError::parse_error("bad json"));
        let json_str = serde_json::to_string(&resp).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json_str).unwrap();
        assert!(parsed["id"].is_null());
        assert_eq!(parsed["error"]["code"], -32700);
    }

    #[test]
    fn response_roundtrip_success() {
        let resp = SppResponse::success(RequestId::String("abc".into()), json!(42));
        let json_str = serde_json::to_string(&resp).unwrap();
        let parsed: SppResponse = serde_json::from_str(&json_str).unwrap();
        assert!(parsed.is_success());
    }

    // ─────────────────────────────────────────────────────────────────────
    // SppNotification
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn notification_serialization() {
        let note = SppNotification::new("server/tick", Some(json!({"seq": 1})));
        let json_str = serde_json::to_string(&note).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json_str).unwrap();
        assert_eq!(parsed["jsonrpc"], "2.0");
        assert_eq!(parsed["method"], "server/tick");
        assert!(parsed.get("id").is_none()); // Notifications have no id
    }

    #[test]
    fn notification_without_params() {
        let note = SppNotification::new("server/connected", None);
        let json_str = serde_json::to_string(&note).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json_str).unwrap();
        assert!(parsed.get("params").is_none());
    }

    // ─────────────────────────────────────────────────────────────────────
    // Error codes
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn error_code_values() {
        assert_eq!(SppErrorCode::ParseError.code(), -32700);
        assert_eq!(SppErrorCode::InvalidRequest.code(), -32600);
        assert_eq!(SppErrorCode::MethodNotFound.code(), -32601);
        assert_eq!(SppErrorCode::InvalidParams.code(), -32602);
        assert_eq!(SppErrorCode::InternalError.code(), -32603);
        assert_eq!(SppErrorCode::ServerError.code(), -32000);
        assert_eq!(SppErrorCode::ServerShuttingDown.code(), -32002);
        assert_eq!(SppErrorCode::SessionNotFound.code(), -32010);
        assert_eq!(SppErrorCode::RegistryFull.code(), -32011);
        assert_eq!(SppErrorCode::Custom(-42).code(), -42);
    }

    #[test]
    fn error_code_roundtrip() {
        assert_eq!(SppErrorCode::from_code(-32700), SppErrorCode::ParseError);
        assert_eq!(SppErrorCode::from_code(-32601), SppErrorCode::MethodNotFound);
        assert_eq!(SppErrorCode::from_code(-32010), SppErrorCode::SessionNotFound);
        assert_eq!(SppErrorCode::from_code(-32011), SppErrorCode::RegistryFull);
        assert_eq!(SppErrorCode::from_code(-99999), SppErrorCode::Custom(-99999));
    }

    #[test]
    fn error_constructors() {
        let e = SppError::parse_error("bad json");
        assert_eq!(e.code, -32700);
        assert_eq!(e.message, "bad json");

        let e = SppError::method_not_found("missing");
        assert_eq!(e.code, -32601);
        assert!(e.message.contains("missing"));

        let e = SppError::invalid_params("missing field");
        assert_eq!(e.code, -32602);

        let e = SppError::session_not_found("s-1");
        assert_eq!(e.code, -32010);
        assert!(e.message.contains("s-1"));

        let e = SppError::registry_full();
        assert_eq!(e.code, -32011);

        let e = SppError::shutting_down();
        assert_eq!(e.code, -32002);
    }

    #[test]
    fn error_with_data() {
        let e = SppError::server_error("detail")
            .with_data(json!({"sessionId": "s-1"}));
        assert!(e.data.is_some());
        assert_eq!(e.data.as_ref().unwrap()["sessionId"], "s-1");
    }

    #[test]
    fn error_display() {
        let e = SppError::parse_error("bad");
        let s = format!("{e}");
        assert!(s.contains("-32700"));
        assert!(s.contains("bad"));
    }

    #[test]
    fn error_serialization() {
        let e = SppError::server_error("oops");
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["code"], -32000);
        assert_eq!(json["message"], "oops");
        // data should be absent when None
        assert!(json.get("data").is_none());
    }

    // ─────────────────────────────────────────────────────────────────────
    // Event names
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn event_names() {
        assert_eq!(Events::SERVER_CONNECTED, "server/connected");
        assert_eq!(Events::SERVER_TICK, "server/tick");
        assert_eq!(Events::SERVER_SHUTTING_DOWN, "server/shuttingDown");
    }

    // ─────────────────────────────────────────────────────────────────────
    // Wire format compatibility (what a client sends/expects)
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn full_request_response_wire_format() {
        // Client POSTs this exact request
        let request_wire = r#"{"jsonrpc":"2.0","id":1,"method":"add","params":{"a":2,"b":3}}"#;
        let req: SppRequest = serde_json::from_str(request_wire).unwrap();
        assert_eq!(req.method, "add");

        // Server should respond with this shape
        let resp = SppResponse::success(req.id, json!({ "sum": 5.0 }));
        let resp_json = serde_json::to_string(&resp).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&resp_json).unwrap();
        assert_eq!(parsed["jsonrpc"], "2.0");
        assert_eq!(parsed["id"], 1);
        assert_eq!(parsed["result"]["sum"], 5.0);
    }

    #[test]
    fn connected_notification_wire_format() {
        // First event on the push channel
        let connected = SppNotification::new(
            Events::SERVER_CONNECTED,
            Some(json!({
                "sessionId": "sess-1",
                "endpoint": "/rpc?session=sess-1",
            })),
        );
        let wire = serde_json::to_string(&connected).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&wire).unwrap();
        assert_eq!(parsed["method"], "server/connected");
        assert_eq!(parsed["params"]["sessionId"], "sess-1");
        assert_eq!(parsed["params"]["endpoint"], "/rpc?session=sess-1");
    }
}
