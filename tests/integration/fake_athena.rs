//! A minimal local stand-in for the Athena JSON endpoint.
//!
//! Answers one request per connection, scripted per operation, and records
//! every request it receives.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde_json::{json, Value as JsonValue};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// A scripted response: HTTP status plus JSON body.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub body: JsonValue,
}

impl Reply {
    pub fn ok(body: JsonValue) -> Self {
        Self { status: 200, body }
    }

    pub fn error(status: u16, error_type: &str, message: &str) -> Self {
        Self {
            status,
            body: json!({ "__type": error_type, "Message": message }),
        }
    }
}

/// A request as the fake saw it.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub target: String,
    pub body: JsonValue,
}

#[derive(Debug, Default)]
struct Script {
    start: VecDeque<Reply>,
    status: VecDeque<Reply>,
    results: VecDeque<Reply>,
}

impl Script {
    fn next(&mut self, target: &str) -> Reply {
        let queue = match target {
            "AmazonAthena.StartQueryExecution" => &mut self.start,
            "AmazonAthena.GetQueryExecution" => &mut self.status,
            "AmazonAthena.GetQueryResults" => &mut self.results,
            _ => return Reply::error(400, "UnknownOperationException", target),
        };
        // The last reply of a queue repeats once the rest are used up.
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue
                .front()
                .cloned()
                .unwrap_or_else(|| Reply::error(500, "InternalServerException", "no script"))
        }
    }
}

/// Handle to a running fake endpoint.
#[derive(Clone)]
pub struct FakeAthena {
    pub endpoint: String,
    script: Arc<Mutex<Script>>,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl FakeAthena {
    /// Binds to an ephemeral local port and starts serving.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        let fake = Self {
            endpoint,
            script: Arc::new(Mutex::new(Script::default())),
            seen: Arc::new(Mutex::new(Vec::new())),
        };

        let server = fake.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let server = server.clone();
                tokio::spawn(async move { server.handle(stream).await });
            }
        });

        fake
    }

    pub fn on_start(&self, reply: Reply) -> &Self {
        self.script.lock().unwrap().start.push_back(reply);
        self
    }

    pub fn on_status(&self, reply: Reply) -> &Self {
        self.script.lock().unwrap().status.push_back(reply);
        self
    }

    pub fn on_results(&self, reply: Reply) -> &Self {
        self.script.lock().unwrap().results.push_back(reply);
        self
    }

    pub fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn seen_targets(&self) -> Vec<String> {
        self.seen().into_iter().map(|r| r.target).collect()
    }

    async fn handle(&self, mut stream: TcpStream) {
        let Some((target, body)) = read_request(&mut stream).await else {
            return;
        };
        let reply = self.script.lock().unwrap().next(&target);
        self.seen
            .lock()
            .unwrap()
            .push(SeenRequest { target, body });

        let payload = reply.body.to_string();
        let response = format!(
            "HTTP/1.1 {} Fake\r\nContent-Type: application/x-amz-json-1.1\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            reply.status,
            payload.len(),
            payload
        );
        let _ = stream.write_all(response.as_bytes()).await;
        let _ = stream.shutdown().await;
    }
}

/// Reads one HTTP request, returning its X-Amz-Target and JSON body.
async fn read_request(stream: &mut TcpStream) -> Option<(String, JsonValue)> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buffer.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
    let header = |name: &str| {
        head.lines().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim().to_string())
        })
    };
    let target = header("x-amz-target").unwrap_or_default();
    let length: usize = header("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    while buffer.len() < header_end + length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);
    }

    let body = serde_json::from_slice(&buffer[header_end..]).unwrap_or(JsonValue::Null);
    Some((target, body))
}

/// Builds a GetQueryExecution reply.
pub fn status_reply(state: &str, reason: Option<&str>) -> Reply {
    let mut status = json!({ "State": state });
    if let Some(reason) = reason {
        status["StateChangeReason"] = json!(reason);
    }
    Reply::ok(json!({
        "QueryExecution": { "QueryExecutionId": "fake-exec-1", "Status": status }
    }))
}

/// Builds a GetQueryResults page. Metadata is attached to every page.
pub fn results_page(columns: &[&str], rows: &[Vec<Option<&str>>], next: Option<&str>) -> Reply {
    let rows: Vec<JsonValue> = rows
        .iter()
        .map(|row| {
            let data: Vec<JsonValue> = row
                .iter()
                .map(|cell| match cell {
                    Some(v) => json!({ "VarCharValue": v }),
                    None => json!({}),
                })
                .collect();
            json!({ "Data": data })
        })
        .collect();
    let info: Vec<JsonValue> = columns
        .iter()
        .map(|c| json!({ "Name": c, "Type": "varchar" }))
        .collect();

    let mut body = json!({
        "ResultSet": { "Rows": rows, "ResultSetMetadata": { "ColumnInfo": info } }
    });
    if let Some(token) = next {
        body["NextToken"] = json!(token);
    }
    Reply::ok(body)
}
