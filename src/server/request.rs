use std::collections::HashMap;

use http::Method;
use may_minihttp::Request;
use serde_json::Value;
use tracing::debug;

/// One inbound request as the middleware and handlers see it.
///
/// Headers are keyed lowercase. Attributes are request-scoped values the
/// middleware publishes for the handler (the report page reads its data from
/// them); they never outlive the request.
#[derive(Debug)]
pub struct RequestContext {
    pub method: Method,
    /// Path with the query string stripped.
    pub path: String,
    pub headers: HashMap<String, String>,
    pub query_params: HashMap<String, String>,
    attributes: HashMap<String, Value>,
}

impl RequestContext {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HashMap::new(),
            query_params: HashMap::new(),
            attributes: HashMap::new(),
        }
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: Value) {
        self.attributes.insert(key.into(), value);
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn attributes(&self) -> &HashMap<String, Value> {
        &self.attributes
    }
}

/// Parse query string parameters from a URL path.
pub fn parse_query_params(path: &str) -> HashMap<String, String> {
    if let Some(pos) = path.find('?') {
        let query_str = &path[pos + 1..];
        url::form_urlencoded::parse(query_str.as_bytes())
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    } else {
        HashMap::new()
    }
}

/// Extract everything the middleware and handlers need from a raw
/// `may_minihttp` request.
pub fn parse_request(req: Request) -> RequestContext {
    let method: Method = req.method().parse().unwrap_or(Method::GET);
    let raw_path = req.path().to_string();
    let path = raw_path.split('?').next().unwrap_or("/").to_string();

    let headers: HashMap<String, String> = req
        .headers()
        .iter()
        .map(|h| {
            (
                h.name.to_ascii_lowercase(),
                String::from_utf8_lossy(h.value).to_string(),
            )
        })
        .collect();
    let query_params = parse_query_params(&raw_path);

    debug!(
        method = %method,
        path = %path,
        header_count = headers.len(),
        param_count = query_params.len(),
        "request parsed"
    );

    let mut ctx = RequestContext::new(method, path);
    ctx.headers = headers;
    ctx.query_params = query_params;
    ctx
}
