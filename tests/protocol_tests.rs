//! Protocol loop tests over in-memory streams.

mod common;

use common::{call, server, InstantSleeper, ScriptedDriver};
use serde_json::{json, Value};
use sql_mcp_server::protocol::JsonRpcResponse;
use sql_mcp_server::transport::serve;
use tokio::io::BufReader;

/// Feed `input` through the serve loop and decode every output line.
async fn exchange(input: &str) -> Vec<JsonRpcResponse> {
    let driver = ScriptedDriver::default();
    let sleeper = InstantSleeper::default();
    let mut output = Vec::new();
    serve(&server(&driver, &sleeper), input.as_bytes(), &mut output)
        .await
        .unwrap();

    String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn test_exact_wire_format() {
    let mock = tokio_test::io::Builder::new()
        .read(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n")
        .write(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n")
        .read(b"[1,2,3]\n")
        .write(b"{\"jsonrpc\":\"2.0\",\"id\":null,\"error\":{\"code\":-32600,\"message\":\"Invalid request: request must be a JSON object\"}}\n")
        .read(b"{\"jsonrpc\":\"2.0\",\"id\":\"n\",\"method\":\"shutdown\"}\n")
        .write(b"{\"jsonrpc\":\"2.0\",\"id\":\"n\",\"error\":{\"code\":-32601,\"message\":\"Method not found: shutdown\"}}\n")
        .build();
    let (reader, writer) = tokio::io::split(mock);

    let driver = ScriptedDriver::default();
    let sleeper = InstantSleeper::default();
    serve(&server(&driver, &sleeper), BufReader::new(reader), writer)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_session_keeps_going_after_errors() {
    let input = [
        r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05"}}"#.to_string(),
        r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#.to_string(),
        "".to_string(),
        "{\"jsonrpc\": \"2.0\", \"id\": 2, \"method\"".to_string(),
        r#"{"jsonrpc":"2.0","id":3,"method":"tools/list"}"#.to_string(),
        call(4, "no_such_tool", json!({})),
        call(5, "list_databases", json!({})),
    ]
    .join("\n");

    let responses = exchange(&input).await;
    assert_eq!(responses.len(), 5);

    assert_eq!(
        responses[0].result.as_ref().unwrap()["protocolVersion"],
        "2024-11-05"
    );
    assert_eq!(responses[1].error_code(), Some(-32700));
    assert_eq!(responses[1].id, None);
    assert_eq!(
        responses[2].result.as_ref().unwrap()["tools"]
            .as_array()
            .unwrap()
            .len(),
        5
    );
    assert_eq!(responses[3].error_code(), Some(-32601));

    let listing = responses[4].result.as_ref().unwrap();
    let report: Value =
        serde_json::from_str(listing["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(report["defaultDatabase"], "sales");
    assert_eq!(report["availableDatabases"], json!(["sales", "hr"]));
}

#[tokio::test]
async fn test_responses_echo_request_ids() {
    let input = [
        r#"{"jsonrpc":"2.0","id":"alpha","method":"ping"}"#,
        r#"{"jsonrpc":"2.0","id":42,"method":"ping"}"#,
        r#"{"jsonrpc":"2.0","id":null,"method":"ping"}"#,
        r#"{"jsonrpc":"2.0","id":{"x":1},"method":"ping"}"#,
    ]
    .join("\n");

    let responses = exchange(&input).await;
    assert_eq!(responses.len(), 3);
    assert_eq!(serde_json::to_value(&responses[0].id).unwrap(), json!("alpha"));
    assert_eq!(serde_json::to_value(&responses[1].id).unwrap(), json!(42));
    assert_eq!(responses[2].id, None);
    assert_eq!(responses[2].error_code(), Some(-32600));
}

#[tokio::test]
async fn test_invalid_params() {
    let input = [
        call(1, "execute_sql", json!({})),
        call(2, "validate_sql", json!({"query": "SELECT 1", "sqlVersion": "70"})),
        r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"arguments":{}}}"#.to_string(),
        r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"parse_sql","arguments":"SELECT 1"}}"#.to_string(),
    ]
    .join("\n");

    let responses = exchange(&input).await;
    assert_eq!(responses.len(), 4);
    for response in &responses {
        assert_eq!(response.error_code(), Some(-32602), "{:?}", response);
    }
}

#[tokio::test]
async fn test_validate_sql_reports_errors() {
    let input = call(
        1,
        "validate_sql",
        json!({"query": "SELECT FROM WHERE", "sqlVersion": "130"}),
    );

    let responses = exchange(&input).await;
    let result = responses[0].result.as_ref().unwrap();
    let report: Value = serde_json::from_str(result["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(report["valid"], false);
    assert!(report["errorCount"].as_u64().unwrap() >= 1);
    assert_eq!(report["sqlVersion"], "130");
    assert_eq!(report["sqlVersionName"], "SQL Server 2016");
    assert_eq!(report["errors"][0]["line"], 1);
    assert!(report["summary"].as_str().unwrap().starts_with("Found"));
}

#[tokio::test]
async fn test_parse_sql_counts() {
    let input = call(
        1,
        "parse_sql",
        json!({"query": "SELECT a FROM dbo.T1; INSERT INTO dbo.T2 (a) VALUES (1)"}),
    );

    let responses = exchange(&input).await;
    let result = responses[0].result.as_ref().unwrap();
    let report: Value = serde_json::from_str(result["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(report["valid"], true);
    assert_eq!(report["statementCount"], 2);
    assert_eq!(report["statementTypes"], json!(["SELECT", "INSERT"]));
    assert!(report["astInfo"]
        .as_str()
        .unwrap()
        .starts_with("Statements: 2, Tables: "));
    assert!(report["tokenCount"].as_u64().unwrap() > 10);
}

#[tokio::test]
async fn test_document_sql() {
    let sql = "SELECT u.name, COUNT(*) FROM dbo.Users u \
               INNER JOIN dbo.Orders o ON o.user_id = u.id GROUP BY u.name";
    let input = [
        call(1, "document_sql", json!({"query": sql})),
        call(2, "document_sql", json!({"query": "SELEC nothing"})),
    ]
    .join("\n");

    let responses = exchange(&input).await;

    let doc = &responses[0].result.as_ref().unwrap()["content"][0]["text"];
    let doc = doc.as_str().unwrap();
    assert!(doc.contains("## Summary"));
    assert!(doc.contains("dbo.Users"));
    assert!(doc.contains("```sql"));

    let failed = responses[1].result.as_ref().unwrap();
    assert_eq!(failed["isError"], true);
    let report: Value = serde_json::from_str(failed["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(report["success"], false);
    assert!(report["errors"][0].as_str().unwrap().starts_with("Line 1"));
}
