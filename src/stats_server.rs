// ═══════════════════════════════════════════════════════════════
// STATS SERVER - A whole HTTP endpoint in a couple hundred lines
// ═══════════════════════════════════════════════════════════════
//
// GET /?year=2015-2019&season=Indoor&event=60&agegroup=M50
//
//   200 {"stats":[{"year":2015,"quantiles":[...]}, ...]}
//   400 {"error":"missing required parameter 'event'"}
//
// Parameters may also arrive as a JSON object in the request body, e.g.
// POST / {"year":"2018","season":"Indoor","event":"60","agegroup":"M50"}.
// Body values override query-string values with the same key.
//
// Raw TCP, one request per connection, then close. Good enough for a chart
// on a static page, which is the only client. CORS is wide open for the
// same reason.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::stats::{run_query, SampleSource, StatsError, StatsQuery};

/// Request heads bigger than this are refused. A stats query is tiny.
const MAX_REQUEST_BYTES: usize = 8 * 1024;

/// Bodies are read up to this many bytes, whatever Content-Length says.
const MAX_BODY_BYTES: usize = 64 * 1024;

const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// The two parts of a request the endpoint looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpRequest {
    /// e.g. `GET /?year=2018&season=Indoor HTTP/1.1`
    pub request_line: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    fn json(status: u16, body: String) -> Self {
        Self { status, body }
    }

    fn error(status: u16, message: impl std::fmt::Display) -> Self {
        Self::json(status, json!({ "error": message.to_string() }).to_string())
    }

    fn reason(&self) -> &'static str {
        match self.status {
            200 => "OK",
            400 => "Bad Request",
            405 => "Method Not Allowed",
            _ => "Internal Server Error",
        }
    }

    pub fn to_http(&self) -> String {
        format!(
            "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nAccess-Control-Allow-Origin: *\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            self.status,
            self.reason(),
            self.body.len(),
            self.body,
        )
    }
}

/// Answer one request.
pub fn handle_request<S: SampleSource + ?Sized>(source: &S, request: &HttpRequest) -> HttpResponse {
    let mut parts = request.request_line.split_whitespace();
    let (Some(method), Some(target)) = (parts.next(), parts.next()) else {
        return HttpResponse::error(400, "malformed request line");
    };
    if method != "GET" && method != "POST" {
        return HttpResponse::error(405, format!("method {method} not allowed"));
    }

    let url = match Url::parse("http://localhost").and_then(|base| base.join(target)) {
        Ok(url) => url,
        Err(e) => return HttpResponse::error(400, format!("bad request target: {e}")),
    };
    let body = match body_pairs(&request.body) {
        Ok(pairs) => pairs,
        Err(message) => return HttpResponse::error(400, message),
    };

    // First value wins in from_pairs, so body pairs go first.
    let pairs = body.into_iter().chain(
        url.query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned())),
    );
    let query = match StatsQuery::from_pairs(pairs) {
        Ok(query) => query,
        Err(e) => return HttpResponse::error(400, e),
    };

    match run_query(source, &query) {
        Ok(response) => match serde_json::to_string(&response) {
            Ok(body) => HttpResponse::json(200, body),
            Err(e) => HttpResponse::error(500, e),
        },
        Err(StatsError::Store(e)) => {
            error!(error = %e, "stats query failed");
            HttpResponse::error(500, "stats query failed")
        }
        Err(e) => HttpResponse::error(400, e),
    }
}

/// Flatten a JSON object body into key/value pairs. Numbers are accepted so
/// `{"year": 2018}` works as well as `{"year": "2018"}`.
fn body_pairs(body: &str) -> Result<Vec<(String, String)>, String> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    let value: Value =
        serde_json::from_str(body).map_err(|e| format!("request body is not JSON: {e}"))?;
    let Value::Object(map) = value else {
        return Err("request body must be a JSON object".to_string());
    };

    map.into_iter()
        .map(|(key, value)| match value {
            Value::String(s) => Ok((key, s)),
            Value::Number(n) => Ok((key, n.to_string())),
            other => Err(format!("'{key}' must be a string or number, got {other}")),
        })
        .collect()
}

/// Serve stats until `shutdown` flips.
pub async fn run_stats_server<S>(
    listener: TcpListener,
    source: Arc<Mutex<S>>,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()>
where
    S: SampleSource + Send + 'static,
{
    let addr = listener.local_addr().context("stats listener has no address")?;
    info!("📊 Stats server listening on http://{addr}");

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer)) => {
                        let source = source.clone();
                        tokio::spawn(async move {
                            if let Err(e) = serve_connection(stream, source).await {
                                warn!(%peer, error = %e, "stats connection failed");
                            }
                        });
                    }
                    Err(e) => {
                        error!("Stats server accept error: {}", e);
                    }
                }
            }
            _ = shutdown.changed() => {
                info!("Stats server: shutting down");
                break;
            }
        }
    }

    Ok(())
}

async fn serve_connection<S>(mut stream: TcpStream, source: Arc<Mutex<S>>) -> anyhow::Result<()>
where
    S: SampleSource + Send + 'static,
{
    let request = tokio::time::timeout(READ_TIMEOUT, read_request(&mut stream))
        .await
        .context("timed out reading request")??;
    debug!(request = %request.request_line, body_bytes = request.body.len(), "stats request");

    let response = {
        let source = source.lock();
        handle_request(&*source, &request)
    };

    stream
        .write_all(response.to_http().as_bytes())
        .await
        .context("failed to write response")?;
    stream.shutdown().await.ok();
    Ok(())
}

/// Read the request head, then as much body as Content-Length announces.
async fn read_request(stream: &mut TcpStream) -> anyhow::Result<HttpRequest> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        if buf.len() >= MAX_REQUEST_BYTES {
            anyhow::bail!("request head exceeds {MAX_REQUEST_BYTES} bytes");
        }
        let n = stream.read(&mut chunk).await.context("failed to read request")?;
        if n == 0 {
            break buf.len();
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let wanted = content_length(&head).min(MAX_BODY_BYTES);
    let mut body = buf.get(head_end + 4..).map(<[u8]>::to_vec).unwrap_or_default();
    while body.len() < wanted {
        let n = stream.read(&mut chunk).await.context("failed to read request body")?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    body.truncate(wanted);

    Ok(HttpRequest {
        request_line: head.lines().next().unwrap_or_default().to_string(),
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

fn content_length(head: &str) -> usize {
    head.lines()
        .skip(1)
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            if !name.trim().eq_ignore_ascii_case("content-length") {
                return None;
            }
            value.trim().parse().ok()
        })
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    struct FixedSamples(Vec<(i32, f64)>);

    impl SampleSource for FixedSamples {
        fn samples(&self, query: &StatsQuery) -> Result<Vec<(i32, f64)>, StoreError> {
            Ok(self
                .0
                .iter()
                .copied()
                .filter(|(year, _)| (query.first_year..=query.last_year).contains(year))
                .collect())
        }
    }

    fn source() -> FixedSamples {
        FixedSamples(vec![(2017, 7.9), (2018, 7.5), (2018, 7.7), (2016, 8.0)])
    }

    fn get(request_line: &str) -> HttpRequest {
        HttpRequest {
            request_line: request_line.to_string(),
            body: String::new(),
        }
    }

    #[test]
    fn test_good_request_returns_stats_json() {
        let res = handle_request(
            &source(),
            &get("GET /?year=2017-2018&season=Indoor&event=60&agegroup=M50 HTTP/1.1"),
        );
        assert_eq!(res.status, 200);
        let body: serde_json::Value = serde_json::from_str(&res.body).unwrap();
        assert_eq!(body["stats"][0]["year"], 2017);
        assert_eq!(body["stats"][0]["quantiles"], json!([7.9, 7.9, 7.9, 7.9, 7.9]));
        assert_eq!(body["stats"][1]["year"], 2018);
        assert_eq!(body["stats"][1]["quantiles"], json!([7.5, 7.5, 7.7, 7.7, 7.7]));
    }

    #[test]
    fn test_missing_param_is_400() {
        let res = handle_request(&source(), &get("GET /stats?year=2018&season=Indoor HTTP/1.1"));
        assert_eq!(res.status, 400);
        assert!(res.body.contains("event"));
        assert!(res.to_http().contains("Access-Control-Allow-Origin: *"));
    }

    #[test]
    fn test_other_methods_are_405() {
        let res = handle_request(&source(), &get("DELETE / HTTP/1.1"));
        assert_eq!(res.status, 405);
    }

    #[test]
    fn test_json_body_supplies_and_overrides_params() {
        let request = HttpRequest {
            request_line: "POST /?year=2017&season=Indoor HTTP/1.1".to_string(),
            body: r#"{"year": 2016, "event": "100", "agegroup": "W40"}"#.to_string(),
        };
        let res = handle_request(&source(), &request);
        assert_eq!(res.status, 200);
        let body: serde_json::Value = serde_json::from_str(&res.body).unwrap();
        assert_eq!(body["stats"][0]["year"], 2016);
        assert_eq!(body["stats"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_bad_json_body_is_400() {
        for bad in ["not json", "[1, 2]", r#"{"year": [2018]}"#] {
            let request = HttpRequest {
                request_line: "POST / HTTP/1.1".to_string(),
                body: bad.to_string(),
            };
            assert_eq!(handle_request(&source(), &request).status, 400, "{bad}");
        }
    }

    #[test]
    fn test_content_length_header() {
        assert_eq!(content_length("POST / HTTP/1.1\r\ncontent-length: 42\r\nHost: x"), 42);
        assert_eq!(content_length("GET / HTTP/1.1\r\nHost: x"), 0);
    }

    #[tokio::test]
    async fn test_serves_over_tcp_and_shuts_down() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = watch::channel(false);
        let server = tokio::spawn(run_stats_server(listener, Arc::new(Mutex::new(source())), rx));

        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all(b"GET /?year=2016&season=Outdoor&event=100&agegroup=W40 HTTP/1.1\r\nHost: x\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.ends_with(r#"{"stats":[{"year":2016,"quantiles":[8.0,8.0,8.0,8.0,8.0]}]}"#));

        let body = r#"{"year":"2017","season":"Indoor","event":"60","agegroup":"M50"}"#;
        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all(format!("POST / HTTP/1.1\r\nContent-Length: {}\r\n\r\n{body}", body.len()).as_bytes())
            .await
            .unwrap();
        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();
        assert!(response.ends_with(r#"{"stats":[{"year":2017,"quantiles":[7.9,7.9,7.9,7.9,7.9]}]}"#));

        tx.send(true).unwrap();
        server.await.unwrap().unwrap();
    }
}
