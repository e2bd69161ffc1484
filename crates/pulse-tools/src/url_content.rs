//! URL content tool: fetch a web page for the model.
//!
//! Every hop is gated. The initial URL and each redirect target go through
//! [`check_url`], and every address a hostname resolves to is checked
//! against [`blocked_ip_reason`], both before the request and inside the
//! client's resolver so a rebinding answer between the two is still caught.

use std::error::Error as StdError;
use std::net::SocketAddr;
use std::sync::Arc;

use futures::StreamExt;
use pulse_core::{BlockedCode, ToolResult, args};
use pulse_safety::{SensitiveMatch, UrlVerdict, blocked_ip_reason, check_url};
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};
use url::{Host, Url};

use crate::PulseTool;
use crate::context::ToolContext;
use crate::error::ToolError;
use crate::guard;

const MAX_REDIRECTS: usize = 5;
const USER_AGENT: &str = "pulse-ai/1.0";

/// Built-in tool for fetching web content.
pub struct UrlContentTool;

#[async_trait::async_trait]
impl PulseTool for UrlContentTool {
    fn name(&self) -> &'static str {
        "pulse_get_url_content"
    }

    fn description(&self) -> &'static str {
        "Fetches a URL over HTTP or HTTPS and returns the status code, response headers, and \
         body (cut at 50 KiB). Loopback, link-local, and cloud metadata addresses are refused."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "Absolute http or https URL"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        fetch(&args, ctx).await.unwrap_or_else(Into::into)
    }
}

/// Resolver that refuses names pointing at blocked addresses.
#[derive(Debug, Clone, Copy)]
struct GuardedResolver {
    allow_loopback: bool,
}

impl Resolve for GuardedResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let allow_loopback = self.allow_loopback;
        Box::pin(async move {
            let addrs = resolve_checked(name.as_str(), allow_loopback)
                .await
                .map_err(|m| m.reason)?;
            Ok(Box::new(addrs.into_iter()) as Addrs)
        })
    }
}

/// Resolve `host` and refuse it if any address is blocked.
async fn resolve_checked(
    host: &str,
    allow_loopback: bool,
) -> Result<Vec<SocketAddr>, SensitiveMatch> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, 0))
        .await
        .map_err(|e| SensitiveMatch {
            code: BlockedCode::SensitivePath,
            reason: format!("could not resolve {host}: {e}"),
            matched: host.to_string(),
        })?
        .collect();
    for addr in &addrs {
        if let Some(reason) = blocked_ip_reason(addr.ip(), allow_loopback) {
            return Err(SensitiveMatch {
                code: BlockedCode::SensitivePath,
                reason: format!("{host} resolves to {}: {reason}", addr.ip()),
                matched: host.to_string(),
            });
        }
    }
    Ok(addrs)
}

fn client(ctx: &ToolContext) -> Result<reqwest::Client, ToolError> {
    let allow_loopback = ctx.settings.allow_loopback;
    let redirects = reqwest::redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error(format!("stopped after {MAX_REDIRECTS} redirects"));
        }
        match check_url(attempt.url().as_str(), allow_loopback) {
            UrlVerdict::Allowed(_) => attempt.follow(),
            UrlVerdict::Blocked(m) => {
                attempt.error(format!("redirect to {} refused: {}", m.matched, m.reason))
            },
            UrlVerdict::Invalid(reason) => attempt.error(format!("bad redirect: {reason}")),
        }
    });
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(ctx.settings.http_timeout)
        .redirect(redirects)
        .dns_resolver(Arc::new(GuardedResolver { allow_loopback }))
        .build()
        .map_err(|e| ToolError::Http(format!("failed to create HTTP client: {e}")))
}

/// The error and every cause, joined.
fn error_chain(err: &dyn StdError) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !parts.contains(&text) {
            parts.push(text);
        }
        source = cause.source();
    }
    parts.join(": ")
}

async fn fetch(call_args: &Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
    let raw = args::require_str(call_args, "url")?;
    let allow_loopback = ctx.settings.allow_loopback;
    let url: Url = match check_url(raw, allow_loopback) {
        UrlVerdict::Allowed(url) => url,
        UrlVerdict::Blocked(m) => return Err(guard::sensitive_block(m)),
        UrlVerdict::Invalid(reason) => return Err(ToolError::InvalidArguments(reason)),
    };
    if let Some(Host::Domain(host)) = url.host() {
        resolve_checked(host, allow_loopback)
            .await
            .map_err(guard::sensitive_block)?;
    }

    debug!(url = %url, "Fetching URL");
    let response = match client(ctx)?.get(url.clone()).send().await {
        Ok(response) => response,
        Err(e) => {
            let error = error_chain(&e);
            warn!(url = %url, error = %error, "URL fetch failed");
            return Ok(ToolResult::Json(json!({"url": url.as_str(), "error": error})));
        },
    };

    let status = response.status().as_u16();
    let final_url = response.url().to_string();
    let headers: Map<String, Value> = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), Value::String(v.to_string())))
        })
        .collect();

    let limit = ctx.settings.max_body_bytes;
    let mut body: Vec<u8> = Vec::with_capacity(limit.min(65_536));
    let mut truncated = false;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                let error = error_chain(&e);
                warn!(url = %url, error = %error, "URL body read failed");
                return Ok(ToolResult::Json(json!({"url": url.as_str(), "error": error})));
            },
        };
        let room = limit.saturating_sub(body.len());
        if chunk.len() > room {
            body.extend_from_slice(&chunk[..room]);
            truncated = true;
            break;
        }
        body.extend_from_slice(&chunk);
    }

    // Drop a multi-byte character cut in half at the limit.
    let cut = std::str::from_utf8(&body)
        .err()
        .filter(|e| truncated && e.error_len().is_none())
        .map(|e| e.valid_up_to());
    if let Some(cut) = cut {
        body.truncate(cut);
    }
    let text = String::from_utf8_lossy(&body).into_owned();
    debug!(url = %url, status, bytes = body.len(), truncated, "URL fetched");

    let mut result = json!({
        "url": url.as_str(),
        "status_code": status,
        "headers": headers,
        "body": text,
        "truncated": truncated,
    });
    if final_url != url.as_str() {
        result["final_url"] = json!(final_url);
    }
    Ok(ToolResult::Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecutorSettings;
    use pulse_core::ControlLevel;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve each canned response to one connection, in order.
    async fn serve(responses: Vec<String>) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            for response in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
            }
        });
        addr
    }

    fn ok_response(body: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\
             Connection: close\r\n\r\n{body}",
            body.len()
        )
    }

    fn loopback_ctx() -> ToolContext {
        ToolContext::new(ControlLevel::ReadOnly)
            .with_settings(ExecutorSettings::default().with_allow_loopback(true))
    }

    #[tokio::test]
    async fn test_fetch_local_server() {
        let addr = serve(vec![ok_response("hello")]).await;
        let result = UrlContentTool
            .execute(json!({"url": format!("http://{addr}/")}), &loopback_ctx())
            .await;
        let body = result.as_json().unwrap();
        assert_eq!(body["status_code"], 200);
        assert_eq!(body["body"], "hello");
        assert_eq!(body["truncated"], false);
        assert_eq!(body["headers"]["content-type"], "text/plain");
    }

    #[tokio::test]
    async fn test_body_is_capped() {
        let big = "x".repeat(2_000);
        let addr = serve(vec![ok_response(&big)]).await;
        let mut settings = ExecutorSettings::default().with_allow_loopback(true);
        settings.max_body_bytes = 100;
        let ctx = ToolContext::new(ControlLevel::ReadOnly).with_settings(settings);
        let result = UrlContentTool
            .execute(json!({"url": format!("http://{addr}/big")}), &ctx)
            .await;
        let body = result.as_json().unwrap();
        assert_eq!(body["truncated"], true);
        assert_eq!(body["body"].as_str().unwrap().len(), 100);
    }

    #[tokio::test]
    async fn test_loopback_refused_by_default() {
        let ctx = ToolContext::new(ControlLevel::Autonomous);
        for url in ["http://127.0.0.1:8080/", "http://localhost/", "http://[::1]/"] {
            let result = UrlContentTool.execute(json!({"url": url}), &ctx).await;
            assert_eq!(result.blocked_code(), Some(BlockedCode::SensitivePath), "{url}");
        }
    }

    #[tokio::test]
    async fn test_metadata_always_refused() {
        let result = UrlContentTool
            .execute(
                json!({"url": "http://169.254.169.254/latest/meta-data/"}),
                &loopback_ctx(),
            )
            .await;
        assert_eq!(result.blocked_code(), Some(BlockedCode::SensitivePath));
    }

    #[tokio::test]
    async fn test_redirect_to_metadata_is_refused() {
        let redirect = "HTTP/1.1 302 Found\r\nLocation: http://169.254.169.254/latest/\r\n\
                        Content-Length: 0\r\nConnection: close\r\n\r\n"
            .to_string();
        let addr = serve(vec![redirect]).await;
        let result = UrlContentTool
            .execute(json!({"url": format!("http://{addr}/")}), &loopback_ctx())
            .await;
        let body = result.as_json().unwrap();
        assert!(body.get("status_code").is_none());
        assert!(body["error"].as_str().unwrap().contains("refused"));
    }

    #[tokio::test]
    async fn test_invalid_urls_are_errors() {
        let ctx = loopback_ctx();
        for url in ["ftp://example.com/x", "not a url"] {
            let result = UrlContentTool.execute(json!({"url": url}), &ctx).await;
            assert!(result.is_error(), "{url}");
            assert!(result.blocked_code().is_none());
        }
        assert!(UrlContentTool.execute(json!({}), &ctx).await.is_error());
    }

    #[test]
    fn test_error_chain_dedupes() {
        let inner = std::io::Error::other("connection refused");
        assert_eq!(error_chain(&inner), "connection refused");
    }
}
