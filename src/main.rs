use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use http::Method;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use tallyware::body::MeteredBody;
use tallyware::config::{MetricsConfig, RuntimeConfig};
use tallyware::ids::IdStrategy;
use tallyware::middleware::MetricsMiddleware;
use tallyware::report;
use tallyware::server::{AppService, HttpServer, RequestContext, RequestHandler, ResponseHead};
use tallyware::static_files::StaticFiles;

/// Demo service: a few measured pages plus the live metrics report.
#[derive(Parser)]
#[command(name = "tallyware", about = "Response metrics demo server", long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:8080")]
    addr: String,

    /// Optional YAML config file (overridden by TALLY_* env and flags)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path the report page is served from
    #[arg(long)]
    report_path: Option<String>,

    /// Response header carrying the response id
    #[arg(long)]
    id_header: Option<String>,

    /// Id allocation strategy: sequential or random
    #[arg(long)]
    id_strategy: Option<IdStrategy>,

    /// Directory the landing page is served from
    #[arg(long, default_value = "static_site")]
    static_dir: PathBuf,
}

/// The demo pages. Page 5 goes through the text writer and page 6 through
/// the binary stream, so both output APIs stay exercised; unknown paths fall
/// back to files under the static directory. Everything except the report
/// page is measured.
struct DemoApp {
    static_files: StaticFiles,
    report_path: String,
}

impl DemoApp {
    fn page_html(n: u32, api: &str) -> String {
        format!(
            "<!DOCTYPE html>\n<html>\n<head><title>Page {n}</title></head>\n\
             <body>\n<h1>Hello World!</h1>\n<p>Page {n}, written through the {api}.</p>\n\
             <p><a href=\"/\">back</a></p>\n</body>\n</html>\n"
        )
    }
}

impl RequestHandler for DemoApp {
    fn handle(
        &self,
        ctx: &RequestContext,
        body: &mut MeteredBody<Vec<u8>>,
    ) -> io::Result<ResponseHead> {
        if ctx.method != Method::GET {
            return Ok(ResponseHead::new(405));
        }
        match ctx.path.as_str() {
            p if p == self.report_path => {
                let html = report::render_report(ctx).map_err(io::Error::other)?;
                body.writer()?.write_str(&html)?;
                Ok(ResponseHead::html())
            }
            "/" | "/index.html" => {
                let page = self
                    .static_files
                    .render("index.html", &json!({ "report_path": self.report_path }))?;
                body.writer()?.write_str(&page)?;
                Ok(ResponseHead::html())
            }
            "/pages/5" => {
                let mut w = body.writer()?;
                w.write_str(&Self::page_html(5, "text writer"))?;
                Ok(ResponseHead::html())
            }
            "/pages/6" => {
                let page = Self::page_html(6, "binary stream");
                body.output_stream()?.write_all(page.as_bytes())?;
                Ok(ResponseHead::html())
            }
            p => match self.static_files.load(p) {
                Ok((bytes, content_type)) => {
                    body.output_stream()?.write_all(&bytes)?;
                    Ok(ResponseHead::ok().with_header("Content-Type", content_type))
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    body.writer()?.write_str("<h1>404 Not Found</h1>\n")?;
                    Ok(ResponseHead::new(404)
                        .with_header("Content-Type", "text/html; charset=utf-8"))
                }
                Err(e) => Err(e),
            },
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let runtime = RuntimeConfig::from_env();
    may::config().set_stack_size(runtime.stack_size);

    let mut config = match &args.config {
        Some(path) => MetricsConfig::from_yaml_file(path)?,
        None => MetricsConfig::default(),
    }
    .with_env_overrides();
    if let Some(report_path) = args.report_path {
        config.report_path = report_path;
    }
    if let Some(id_header) = args.id_header {
        config.id_header = id_header;
    }
    if let Some(id_strategy) = args.id_strategy {
        config.id_strategy = id_strategy;
    }

    let app = DemoApp {
        static_files: StaticFiles::new(args.static_dir),
        report_path: config.report_path.clone(),
    };
    let metrics = Arc::new(MetricsMiddleware::new(config));
    let service = AppService::new(metrics, Arc::new(app));

    println!("🚀 tallyware demo listening on {}", args.addr);
    let server = HttpServer(service).start(&args.addr)?;
    server
        .join()
        .map_err(|e| anyhow::anyhow!("server failed: {e:?}"))?;
    Ok(())
}
