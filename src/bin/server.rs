//! HTTP server for the NL→SQL engine
//! Simple HTTP/1.1 JSON API using tokio and basic request handling

use nlsql_engine::error::NlSqlError;
use nlsql_engine::report;
use nlsql_engine::service::DEFAULT_SAMPLE_SIZE;
use nlsql_engine::{logging, Config, NlSqlService};
use percent_encoding::percent_decode_str;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};

const MAX_BODY_BYTES: usize = 1024 * 1024;
const READ_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct QueryBody {
    query: String,
    #[serde(default = "default_true")]
    include_explanation: bool,
}

#[derive(Deserialize)]
struct SqlBody {
    sql: String,
}

#[derive(Deserialize)]
struct ModeBody {
    enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Parsed request line, headers and body.
struct Request {
    method: String,
    path: String,
    /// Percent-decoded path segments.
    segments: Vec<String>,
    query: HashMap<String, String>,
    body: Vec<u8>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    logging::init(&config.log_level);

    info!("🚀 Starting {}...", config.server_name);
    if config.has_api_key() {
        info!("✅ OpenAI API key found - natural language queries enabled");
    } else {
        warn!("⚠️  OpenAI API key not found - only direct SQL is available");
    }

    let bind_addr = config.bind_addr.clone();
    let service = Arc::new(NlSqlService::connect(config).await?);

    let listener = TcpListener::bind(&bind_addr).await?;
    info!("✅ Server listening on http://{}", bind_addr);

    loop {
        let (stream, addr) = listener.accept().await?;
        info!("📥 New connection from: {}", addr);
        tokio::spawn(handle_connection(stream, Arc::clone(&service)));
    }
}

async fn handle_connection(mut stream: TcpStream, service: Arc<NlSqlService>) {
    let response = match read_request_within(&mut stream, READ_TIMEOUT).await {
        Ok(Some(request)) => handle_request(&request, &service).await,
        Ok(None) => return,
        Err(ReadError::TimedOut) => {
            warn!("Request not received within {:?}", READ_TIMEOUT);
            create_response(
                408,
                "Request Timeout",
                &json!({ "success": false, "error": "Request timed out" }).to_string(),
            )
        }
        Err(ReadError::Malformed(e)) => {
            warn!("Failed to read request: {}", e);
            create_response(400, "Bad Request", &json!({ "success": false, "error": e }).to_string())
        }
    };

    if let Err(e) = stream.write_all(response.as_bytes()).await {
        error!("Failed to write response: {}", e);
    }
}

#[derive(Debug)]
enum ReadError {
    TimedOut,
    Malformed(String),
}

/// `read_request` bounded by `limit`, so an idle client cannot hold the task open.
async fn read_request_within(stream: &mut TcpStream, limit: Duration) -> Result<Option<Request>, ReadError> {
    match tokio::time::timeout(limit, read_request(stream)).await {
        Ok(result) => result.map_err(ReadError::Malformed),
        Err(_) => Err(ReadError::TimedOut),
    }
}

/// Read headers, then exactly `Content-Length` body bytes.
async fn read_request(stream: &mut TcpStream) -> Result<Option<Request>, String> {
    let mut buffer: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        if let Some(pos) = find_subslice(&buffer, b"\r\n\r\n") {
            break pos;
        }
        let n = stream.read(&mut chunk).await.map_err(|e| e.to_string())?;
        if n == 0 {
            if buffer.is_empty() {
                return Ok(None);
            }
            return Err("Connection closed before headers were complete".to_string());
        }
        buffer.extend_from_slice(&chunk[..n]);
        if buffer.len() > MAX_BODY_BYTES {
            return Err("Request headers too large".to_string());
        }
    };

    let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
    let mut lines = head.lines();
    let request_line = lines.next().ok_or("Empty request")?;
    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() < 2 {
        return Err("Malformed request line".to_string());
    }

    let mut headers = HashMap::new();
    for line in lines {
        if let Some((key, value)) = line.split_once(':') {
            headers.insert(key.trim().to_lowercase(), value.trim().to_string());
        }
    }

    let content_length: usize = headers
        .get("content-length")
        .map(|v| v.parse().map_err(|_| "Invalid Content-Length".to_string()))
        .transpose()?
        .unwrap_or(0);
    if content_length > MAX_BODY_BYTES {
        return Err("Request body too large".to_string());
    }

    let mut body = buffer[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut chunk).await.map_err(|e| e.to_string())?;
        if n == 0 {
            return Err("Connection closed before body was complete".to_string());
        }
        body.extend_from_slice(&chunk[..n]);
    }
    body.truncate(content_length);

    let (path, query) = split_target(parts[1]);
    let segments = path_segments(&path);
    Ok(Some(Request {
        method: parts[0].to_string(),
        path,
        segments,
        query,
        body,
    }))
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Split `/path?a=1&b=2`; trailing slashes are dropped except for root.
/// The path stays encoded; query keys and values are decoded.
fn split_target(target: &str) -> (String, HashMap<String, String>) {
    let (raw_path, raw_query) = target.split_once('?').unwrap_or((target, ""));

    let mut path = raw_path.trim_end_matches('/').to_string();
    if path.is_empty() {
        path = "/".to_string();
    }

    let query = raw_query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (decode_query_part(k), decode_query_part(v)),
            None => (decode_query_part(pair), String::new()),
        })
        .collect();

    (path, query)
}

/// Segments are split before decoding so `%2F` stays inside its segment.
fn path_segments(path: &str) -> Vec<String> {
    path.trim_start_matches('/')
        .split('/')
        .map(|segment| percent_decode_str(segment).decode_utf8_lossy().into_owned())
        .collect()
}

fn decode_query_part(raw: &str) -> String {
    percent_decode_str(&raw.replace('+', " "))
        .decode_utf8_lossy()
        .into_owned()
}

async fn handle_request(request: &Request, service: &NlSqlService) -> String {
    info!("🔍 Request: {} {}", request.method, request.path);

    let segments: Vec<&str> = request.segments.iter().map(String::as_str).collect();
    let schema = request.query.get("schema").map(String::as_str);

    let result: Result<Value, NlSqlError> = match (request.method.as_str(), segments.as_slice()) {
        ("OPTIONS", _) => return create_response(204, "No Content", ""),
        ("GET", ["api", "health"]) => {
            let database = service.executor().health_check().await.unwrap_or(false);
            Ok(json!({
                "status": "ok",
                "service": service.config().server_name,
                "database": database,
                "select_only_mode": service.get_mode().select_only_mode,
            }))
        }
        ("GET", ["api", "tables"]) => service.list_tables().await.map(|listing| {
            let report = report::render_table_list(&listing);
            json!({ "success": true, "tables": listing, "report": report })
        }),
        ("GET", ["api", "tables", name]) => service.table_info(name, schema).await.map(|details| {
            let report = report::render_table_info(&details);
            json!({ "success": true, "table": details, "report": report })
        }),
        ("GET", ["api", "tables", name, "sample"]) => {
            let size = request
                .query
                .get("size")
                .and_then(|s| s.parse::<i64>().ok())
                .unwrap_or(DEFAULT_SAMPLE_SIZE);
            service.sample_data(name, size, schema).await.map(|sample| {
                let report = report::render_sample(&sample);
                json!({ "success": true, "sample": sample, "report": report })
            })
        }
        ("POST", ["api", "query"]) => match parse_body::<QueryBody>(&request.body) {
            Ok(body) => service
                .ask(&body.query, body.include_explanation)
                .await
                .map(|response| {
                    let report = report::render_ask(&response, service.config().max_query_results);
                    json!({ "success": true, "result": response, "report": report })
                }),
            Err(e) => Err(e),
        },
        ("POST", ["api", "sql"]) => match parse_body::<SqlBody>(&request.body) {
            Ok(body) => service.execute_sql(&body.sql).await.map(|outcome| {
                let report = report::render_direct(body.sql.trim(), &outcome);
                json!({ "success": true, "result": outcome, "report": report })
            }),
            Err(e) => Err(e),
        },
        ("POST", ["api", "explain"]) => match parse_body::<SqlBody>(&request.body) {
            Ok(body) => service.explain_sql(&body.sql).await.map(|explanation| {
                json!({ "success": true, "sql": body.sql, "explanation": explanation })
            }),
            Err(e) => Err(e),
        },
        ("GET", ["api", "mode"]) => Ok(json!({ "success": true, "mode": service.get_mode() })),
        ("POST", ["api", "mode"]) => match parse_body::<ModeBody>(&request.body) {
            Ok(body) => service.set_mode(body.enabled).map(|change| {
                json!({
                    "success": true,
                    "message": change.message,
                    "previous_mode": change.previous_mode,
                    "current_mode": change.current_mode,
                })
            }),
            Err(e) => Err(e),
        },
        _ => {
            return create_response(
                404,
                "Not Found",
                &json!({ "success": false, "error": "Not found" }).to_string(),
            )
        }
    };

    match result {
        Ok(body) => create_response(200, "OK", &body.to_string()),
        Err(e) => {
            let (status, text) = status_for(&e);
            if status >= 500 {
                error!("{} {} failed: {}", request.method, request.path, e);
            }
            let body = json!({ "success": false, "error": e.to_string() });
            create_response(status, text, &body.to_string())
        }
    }
}

fn parse_body<T: for<'de> Deserialize<'de>>(body: &[u8]) -> Result<T, NlSqlError> {
    serde_json::from_slice(body).map_err(|e| NlSqlError::InvalidInput(format!("Invalid JSON body: {}", e)))
}

fn status_for(error: &NlSqlError) -> (u16, &'static str) {
    match error {
        NlSqlError::InvalidInput(_) => (400, "Bad Request"),
        NlSqlError::SafetyViolation(_) | NlSqlError::ModeToggleDisabled => (403, "Forbidden"),
        NlSqlError::Generation { .. } => (422, "Unprocessable Entity"),
        NlSqlError::Service(_) => (502, "Bad Gateway"),
        NlSqlError::Configuration(_) => (503, "Service Unavailable"),
        NlSqlError::Timeout { .. } => (504, "Gateway Timeout"),
        _ => (500, "Internal Server Error"),
    }
}

fn create_response(status: u16, status_text: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {} {}\r\n\
         Content-Type: application/json\r\n\
         Access-Control-Allow-Origin: *\r\n\
         Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n\
         Access-Control-Allow-Headers: Content-Type\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        status,
        status_text,
        body.len(),
        body
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_target() {
        let (path, query) = split_target("/api/tables/orders/sample/?size=3&schema=sales");
        assert_eq!(path, "/api/tables/orders/sample");
        assert_eq!(query.get("size").map(String::as_str), Some("3"));
        assert_eq!(query.get("schema").map(String::as_str), Some("sales"));
        assert_eq!(split_target("/").0, "/");
    }

    #[test]
    fn test_target_decoding() {
        let (path, query) = split_target("/api/tables/my%2Dtable?schema=a%5Fb&note=two+words");
        assert_eq!(path, "/api/tables/my%2Dtable");
        assert_eq!(path_segments(&path), vec!["api", "tables", "my-table"]);
        assert_eq!(query.get("schema").map(String::as_str), Some("a_b"));
        assert_eq!(query.get("note").map(String::as_str), Some("two words"));

        // an encoded slash does not create a new segment
        assert_eq!(path_segments("/api/tables/a%2Fb/sample"), vec!["api", "tables", "a/b", "sample"]);
    }

    #[tokio::test]
    async fn test_idle_client_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (mut server_side, _) = listener.accept().await.unwrap();

        let result = read_request_within(&mut server_side, Duration::from_millis(50)).await;
        assert!(matches!(result, Err(ReadError::TimedOut)));
        drop(client);
    }

    #[tokio::test]
    async fn test_complete_request_read_within_limit() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let mut client = TcpStream::connect(addr).await.unwrap();
        let (mut server_side, _) = listener.accept().await.unwrap();

        client
            .write_all(b"GET /api/tables/my%2Dtable?schema=a%5Fb HTTP/1.1\r\nHost: x\r\n\r\n")
            .await
            .unwrap();
        let request = read_request_within(&mut server_side, Duration::from_secs(5))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(request.method, "GET");
        assert_eq!(request.segments, vec!["api", "tables", "my-table"]);
        assert_eq!(request.query.get("schema").map(String::as_str), Some("a_b"));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&NlSqlError::SafetyViolation("x".into())).0, 403);
        assert_eq!(status_for(&NlSqlError::ModeToggleDisabled).0, 403);
        assert_eq!(
            status_for(&NlSqlError::Timeout { seconds: 30, detail: String::new() }).0,
            504
        );
    }

    #[test]
    fn test_parse_body_defaults_explanation() {
        let body: QueryBody = parse_body(br#"{"query":"show all customers"}"#).unwrap();
        assert!(body.include_explanation);
        assert!(parse_body::<SqlBody>(b"not json").is_err());
    }
}
