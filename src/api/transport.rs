use std::time::Duration;

use anyhow::Result;

/// HTTP verb used against the remote API. Only these two exist on its surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A single request to the remote API.
#[derive(Debug)]
pub struct HttpRequest<'a> {
    pub method: Method,
    pub url: String,
    pub bearer: &'a str,
    pub body: Option<serde_json::Value>,
}

/// Outcome of an HTTP exchange: status code plus raw body text.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// The HTTP edge of the client. Production uses blocking reqwest; tests
/// substitute canned responses so status-code mapping and "no network I/O"
/// properties can be checked directly.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &HttpRequest<'_>) -> Result<HttpResponse>;
}

pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: reqwest::blocking::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()?,
        })
    }
}

impl Transport for ReqwestTransport {
    fn execute(&self, request: &HttpRequest<'_>) -> Result<HttpResponse> {
        let builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        let mut builder = builder
            .header(reqwest::header::ACCEPT, "application/json")
            .bearer_auth(request.bearer);
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let resp = builder.send()?;
        let status = resp.status().as_u16();
        let body = resp.text().unwrap_or_default();
        Ok(HttpResponse { status, body })
    }
}
