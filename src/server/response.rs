use may_minihttp::Response;
use serde_json::Value;

/// Status and headers for a response whose body was written through the
/// metered sink. Handlers return one of these; the adapter writes it out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u16,
    headers: Vec<(String, String)>,
}

impl ResponseHead {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(200)
    }

    /// 200 with an HTML content type, the common case for the demo pages and
    /// the report.
    pub fn html() -> Self {
        Self::ok().with_header("Content-Type", "text/html; charset=utf-8")
    }

    pub fn json() -> Self {
        Self::ok().with_header("Content-Type", "application/json")
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    /// Insert or replace; header names compare case-insensitively.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(existing) = self
            .headers
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(&name))
        {
            existing.1 = value;
        } else {
            self.headers.push((name, value));
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        _ => "OK",
    }
}

/// Commit a handled response: status, headers, then the measured body bytes.
pub fn write_response(res: &mut Response, head: &ResponseHead, body: Vec<u8>) {
    res.status_code(head.status as usize, status_reason(head.status));
    for (name, value) in head.headers() {
        // may_minihttp wants 'static header lines
        let line = format!("{name}: {value}").into_boxed_str();
        res.header(Box::leak(line));
    }
    res.body_vec(body);
}

pub fn write_json_error(res: &mut Response, status: u16, body: Value) {
    res.status_code(status as usize, status_reason(status));
    res.header("Content-Type: application/json");
    res.body_vec(body.to_string().into_bytes());
}
