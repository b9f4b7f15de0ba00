use minijinja::Environment;
use once_cell::sync::Lazy;

use crate::server::RequestContext;

const REPORT_TEMPLATE: &str = include_str!("../templates/metrics.html");

static REPORT_ENV: Lazy<Environment<'static>> = Lazy::new(|| {
    let mut env = Environment::new();
    // ships inside the binary; a parse failure cannot be handled at runtime
    env.add_template("metrics", REPORT_TEMPLATE)
        .expect("embedded metrics template must parse");
    env
});

/// Render the metrics report page from the attributes the middleware set on
/// the report request: the six aggregate scalars and the per-response table.
pub fn render_report(ctx: &RequestContext) -> Result<String, minijinja::Error> {
    let tmpl = REPORT_ENV.get_template("metrics")?;
    tmpl.render(ctx.attributes())
}
