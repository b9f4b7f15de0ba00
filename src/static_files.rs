use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use minijinja::Environment;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

/// Demo-site file loader confined to one base directory.
///
/// `load` returns a file verbatim with a content type derived from its
/// extension; `render` treats an HTML file as a minijinja template. URL
/// paths may not escape the base directory.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    base_dir: PathBuf,
}

impl StaticFiles {
    pub fn new<P: Into<PathBuf>>(base: P) -> Self {
        Self {
            base_dir: base.into(),
        }
    }

    /// Resolve a URL path to an existing file inside the base directory.
    /// Parent and absolute components are rejected, not normalized.
    fn resolve(&self, url_path: &str) -> io::Result<PathBuf> {
        let mut resolved = self.base_dir.clone();
        for comp in Path::new(url_path.trim_start_matches('/')).components() {
            match comp {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                _ => {
                    warn!(path = url_path, "rejected path escaping the static base directory");
                    return Err(io::Error::new(io::ErrorKind::NotFound, "invalid path"));
                }
            }
        }
        if resolved.is_file() {
            Ok(resolved)
        } else {
            Err(io::Error::new(io::ErrorKind::NotFound, "file not found"))
        }
    }

    pub fn load(&self, url_path: &str) -> io::Result<(Vec<u8>, &'static str)> {
        let path = self.resolve(url_path)?;
        let bytes = fs::read(&path)?;
        debug!(path = url_path, size = bytes.len(), "serving static file");
        Ok((bytes, content_type(&path)))
    }

    /// Render an HTML file as a template with the given context.
    pub fn render(&self, url_path: &str, ctx: &JsonValue) -> io::Result<String> {
        let path = self.resolve(url_path)?;
        let source = fs::read_to_string(&path)?;
        let mut env = Environment::new();
        env.add_template("page", &source).map_err(io::Error::other)?;
        let rendered = env
            .get_template("page")
            .and_then(|tmpl| tmpl.render(ctx))
            .map_err(io::Error::other)?;
        debug!(path = url_path, size = rendered.len(), "rendered static template");
        Ok(rendered)
    }
}

fn content_type(path: &Path) -> &'static str {
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
    match ext.to_ascii_lowercase().as_str() {
        "html" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "txt" => "text/plain",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        _ => "application/octet-stream",
    }
}
