use http_api_tester::{run_document, run_test_case, Config, Error, PassFail, TestCase};
use mockito::Matcher;
use serde_json::{json, Value};
use tokio::net::TcpListener;

fn case(doc: Value) -> TestCase {
    TestCase::from_slice(doc.to_string().as_bytes()).unwrap()
}

#[tokio::test]
async fn partial_match_against_live_server() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/posts/1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"userId": 1, "id": 1, "title": "hello", "body": "world"}"#)
        .create_async()
        .await;

    let config = Config::new(server.url());
    let case = case(json!({
        "test_info": {"id": "posts-1"},
        "request": {"verb": "GET", "url": "/posts/1"},
        "expect": {"parse_as": "partial_match", "http_code": 200, "body": {"id": 1, "title": "hello"}}
    }));

    let result = run_test_case(&config, &case).await.unwrap();
    mock.assert_async().await;

    assert_eq!(result.pass_fail, PassFail::Pass);
    assert_eq!(result.pass_fail_reason, None);
    assert_eq!(result.actual.http_code, 200);
    assert_eq!(result.actual.body["body"], "world");
    assert_eq!(result.actual.headers["content-type"], vec!["application/json"]);
    assert!(!result.actual.raw_body.is_empty());
    assert_eq!(result.request.url, format!("{}/posts/1", server.url()));
}

#[tokio::test]
async fn sends_query_headers_and_body() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/search")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("q".into(), "fish & chips".into()),
            Matcher::UrlEncoded("page".into(), "2".into()),
        ]))
        .match_header("x-api-key", "second")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(json!({"limit": 10})))
        .with_status(201)
        .with_body(r#"{"hits": 3}"#)
        .create_async()
        .await;

    let config = Config::new(server.url());
    let case = case(json!({
        "request": {
            "verb": "POST",
            "url": "/search",
            "payload": {
                "headers": [
                    {"header": "X-Api-Key", "value": "first"},
                    {"header": "x-api-key", "value": "second"}
                ],
                "parameters": [
                    {"key": "q", "value": ["fish &amp; chips", "ignored"]},
                    {"key": "page", "value": ["2"]}
                ],
                "body": {"limit": 10}
            }
        },
        "expect": {"parse_as": "exact_match", "http_code": 201, "body": {"hits": 3}}
    }));

    let result = run_test_case(&config, &case).await.unwrap();
    mock.assert_async().await;
    assert!(result.passed(), "{:?}", result.pass_fail_reason);
}

#[tokio::test]
async fn status_mismatch_is_a_failed_result() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/missing")
        .with_status(404)
        .with_body(r#"{"error": "not found"}"#)
        .create_async()
        .await;

    let case = case(json!({
        "request": {"verb": "GET", "url": "/missing"},
        "expect": {"parse_as": "exact_match", "http_code": 200}
    }));

    let result = run_test_case(&Config::new(server.url()), &case).await.unwrap();
    assert_eq!(result.pass_fail, PassFail::Fail);
    let reason = result.pass_fail_reason.unwrap();
    assert!(reason.contains("200") && reason.contains("404"), "{reason}");
}

#[tokio::test]
async fn undeclared_strategy_still_records_the_response() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/health")
        .with_body(r#"{"status": "up"}"#)
        .create_async()
        .await;

    let case = case(json!({"request": {"verb": "GET", "url": "/health"}}));
    let result = run_test_case(&Config::new(server.url()), &case).await.unwrap();

    assert_eq!(result.pass_fail, PassFail::Fail);
    assert_eq!(
        result.pass_fail_reason.as_deref(),
        Some("no verification strategy declared")
    );
    assert_eq!(result.actual.body, json!({"status": "up"}));
}

#[tokio::test]
async fn regex_strategy_against_live_server() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/users/7")
        .with_body(r#"{"name": "Alice", "id": 7, "score": 0.5}"#)
        .create_async()
        .await;

    let case = case(json!({
        "request": {"verb": "GET", "url": "/users/7"},
        "expect": {"parse_as": "regex", "body": {"name": "^A.*", "id": "^7$", "score": "^0\\.5"}}
    }));
    let result = run_test_case(&Config::new(server.url()), &case).await.unwrap();
    assert!(result.passed(), "{:?}", result.pass_fail_reason);
}

#[tokio::test]
async fn head_request_with_empty_body() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("HEAD", "/ping")
        .with_status(200)
        .create_async()
        .await;

    let case = case(json!({
        "request": {"verb": "HEAD", "url": "/ping"},
        "expect": {"parse_as": "partial_match", "http_code": 200}
    }));
    let result = run_test_case(&Config::new(server.url()), &case).await.unwrap();
    assert!(result.passed());
    assert_eq!(result.actual.body, Value::Null);
}

#[tokio::test]
async fn non_json_response_is_a_hard_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/page")
        .with_header("content-type", "text/html")
        .with_body("<html><body>hi</body></html>")
        .create_async()
        .await;

    let case = case(json!({
        "request": {"verb": "GET", "url": "/page"},
        "expect": {"parse_as": "partial_match"}
    }));
    let err = run_test_case(&Config::new(server.url()), &case).await.unwrap_err();
    assert!(matches!(err, Error::ResponseBody(_)), "{err}");
}

#[tokio::test]
async fn connection_refused_is_a_hard_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let case = case(json!({
        "request": {"verb": "GET", "url": "/"},
        "expect": {"parse_as": "partial_match"}
    }));
    let err = run_test_case(&Config::new(format!("http://127.0.0.1:{port}")), &case)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Connect { .. }), "{err}");
}

#[tokio::test]
async fn document_adapter_returns_pretty_json() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("DELETE", "/todos/3")
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let doc = json!({
        "test_info": {"id": "delete-3", "tags": ["todos"]},
        "request": {"verb": "DELETE", "url": "/todos/3"},
        "expect": {"parse_as": "exact_match", "http_code": 200, "body": {}}
    });

    let output = run_document(&Config::new(server.url()), doc.to_string().as_bytes())
        .await
        .unwrap();
    assert!(output.contains("\n  \"pass_fail\": \"pass\""), "{output}");

    let parsed: Value = serde_json::from_str(&output).unwrap();
    assert_eq!(parsed["test_info"]["tags"], json!(["todos"]));
    assert_eq!(parsed["actual"]["http_code"], 200);
    assert!(parsed["actual"]["latency_ms"].is_u64());
}
