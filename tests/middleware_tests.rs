use std::collections::HashSet;
use std::io::{self, Write};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use http::Method;
use serde_json::json;
use tallyware::config::MetricsConfig;
use tallyware::ids::{IdStrategy, ResponseId};
use tallyware::metrics::Metric;
use tallyware::middleware::{MetricsMiddleware, RESPONSE_METRICS_ATTR};
use tallyware::server::{RequestContext, ResponseHead};

use tracing_util::TestTracing;

fn middleware() -> MetricsMiddleware {
    MetricsMiddleware::new(MetricsConfig::default())
}

fn get(path: &str) -> RequestContext {
    RequestContext::new(Method::GET, path)
}

#[test]
fn test_measured_response_gets_id_header_and_metrics() {
    let _tracing = TestTracing::init();
    let mw = middleware();
    let mut ctx = get("/hello");
    let (bytes, head) = mw
        .handle(&mut ctx, Vec::new(), |_ctx, body| {
            thread::sleep(Duration::from_millis(2));
            body.writer()?.write_str("hello")?;
            Ok(ResponseHead::html())
        })
        .unwrap();

    assert_eq!(bytes, b"hello");
    assert_eq!(head.status, 200);
    assert_eq!(head.header("x-response-id"), Some("1"));

    let snap = mw.store().snapshot();
    assert_eq!(snap.len(), 1);
    let m = snap.metrics(&ResponseId::from("1")).unwrap();
    assert_eq!(m.size_bytes(), 5);
    assert!(m.elapsed() >= Duration::from_millis(2));
}

#[test]
fn test_concurrent_requests_get_distinct_ids() {
    let _tracing = TestTracing::init();
    for strategy in [IdStrategy::Sequential, IdStrategy::Random] {
        let config = MetricsConfig {
            id_strategy: strategy,
            ..MetricsConfig::default()
        };
        let mw = Arc::new(MetricsMiddleware::new(config));

        let mut handles = vec![];
        for _ in 0..8 {
            let mw = Arc::clone(&mw);
            handles.push(thread::spawn(move || {
                let mut ids = Vec::new();
                for _ in 0..25 {
                    let mut ctx = get("/work");
                    let (_, head) = mw
                        .handle(&mut ctx, Vec::new(), |_ctx, body| {
                            body.output_stream()?.write_all(b"ok")?;
                            Ok(ResponseHead::ok())
                        })
                        .unwrap();
                    ids.push(head.header("x-response-id").unwrap().to_string());
                }
                ids
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id under {:?}", strategy);
            }
        }
        assert_eq!(seen.len(), 200);
        assert_eq!(mw.store().len(), 200);
        assert_eq!(mw.store().finalized_len(), 200);
    }
}

#[test]
fn test_aggregates_mix_writer_and_stream_output() {
    let mw = middleware();
    for n in 1..=10usize {
        let mut ctx = get("/mixed");
        let payload = "x".repeat(n);
        mw.handle(&mut ctx, Vec::new(), |_ctx, body| {
            if n % 2 == 0 {
                body.output_stream()?.write_all(payload.as_bytes())?;
            } else {
                body.writer()?.write_str(&payload)?;
            }
            Ok(ResponseHead::ok())
        })
        .unwrap();
    }

    let snap = mw.store().snapshot();
    assert_eq!(snap.finalized_len(), 10);
    let sizes = snap.aggregate(Metric::ResponseSize);
    assert_eq!(sizes.min, 1);
    assert_eq!(sizes.max, 10);
    assert_eq!(sizes.average, 5.5);
}

#[test]
fn test_report_attributes_are_zero_without_traffic() {
    let mw = middleware();
    let mut ctx = get("/metrics");
    mw.handle(&mut ctx, Vec::new(), |ctx, body| {
        assert_eq!(ctx.attribute("minimumResponseSize"), Some(&json!(0)));
        assert_eq!(ctx.attribute("maximumResponseSize"), Some(&json!(0)));
        assert_eq!(ctx.attribute("averageResponseSize"), Some(&json!(0.0)));
        assert_eq!(ctx.attribute("minimumResponseTime"), Some(&json!(0)));
        assert_eq!(ctx.attribute("maximumResponseTime"), Some(&json!(0)));
        assert_eq!(ctx.attribute("averageResponseTime"), Some(&json!(0.0)));
        assert_eq!(ctx.attribute(RESPONSE_METRICS_ATTR), Some(&json!({})));
        body.writer()?.write_str("report")?;
        Ok(ResponseHead::html())
    })
    .unwrap();
    assert!(mw.store().is_empty());
}

#[test]
fn test_report_excludes_in_flight_responses() {
    let mw = middleware();
    for n in 1..=3usize {
        let mut ctx = get("/traffic");
        let payload = vec![b'x'; n];
        mw.handle(&mut ctx, Vec::new(), |_ctx, body| {
            body.output_stream()?.write_all(&payload)?;
            Ok(ResponseHead::ok())
        })
        .unwrap();
    }
    // A request that is still being handled.
    assert!(mw.store().reserve(ResponseId::from("999")));

    let mut ctx = get("/metrics");
    mw.handle(&mut ctx, Vec::new(), |ctx, body| {
        assert_eq!(ctx.attribute("minimumResponseSize"), Some(&json!(1)));
        assert_eq!(ctx.attribute("maximumResponseSize"), Some(&json!(3)));
        assert_eq!(ctx.attribute("averageResponseSize"), Some(&json!(2.0)));
        let table = ctx
            .attribute(RESPONSE_METRICS_ATTR)
            .and_then(|v| v.as_object())
            .unwrap();
        assert_eq!(table.len(), 3);
        assert!(table.get("999").is_none());
        assert_eq!(table["2"]["size_bytes"], json!(2));
        body.writer()?.write_str("report")?;
        Ok(ResponseHead::html())
    })
    .unwrap();
}

#[test]
fn test_handler_errors_leave_the_id_unfinalized() {
    let mw = middleware();
    let mut ctx = get("/boom");
    let err = mw
        .handle(&mut ctx, Vec::new(), |_ctx, body| {
            body.writer()?.write_str("partial")?;
            Err(io::Error::new(
                io::ErrorKind::ConnectionAborted,
                "client gone",
            ))
        })
        .unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::ConnectionAborted);

    let store = mw.store();
    assert_eq!(store.len(), 1);
    assert_eq!(store.finalized_len(), 0);

    // The failed response's id stays claimed; the next request moves on.
    let mut ctx = get("/ok");
    let (_, head) = mw
        .handle(&mut ctx, Vec::new(), |_ctx, body| {
            body.writer()?.write_str("ok")?;
            Ok(ResponseHead::ok())
        })
        .unwrap();
    assert_eq!(head.header("x-response-id"), Some("2"));
}

#[test]
fn test_report_is_not_measured_and_carries_no_id() {
    let mw = middleware();
    let mut ctx = get("/hello");
    mw.handle(&mut ctx, Vec::new(), |_ctx, body| {
        body.writer()?.write_str("hi")?;
        Ok(ResponseHead::ok())
    })
    .unwrap();

    let mut ctx = get("/metrics");
    let (bytes, head) = mw
        .handle(&mut ctx, Vec::new(), |_ctx, body| {
            body.writer()?.write_str("report page")?;
            Ok(ResponseHead::html())
        })
        .unwrap();

    assert_eq!(bytes, b"report page");
    assert!(head.header("x-response-id").is_none());
    assert_eq!(mw.store().len(), 1);
}

#[test]
fn test_custom_header_and_report_path() {
    let config = MetricsConfig {
        report_path: "/stats".to_string(),
        id_header: "x-trace".to_string(),
        id_strategy: IdStrategy::Sequential,
    };
    let mw = MetricsMiddleware::new(config);

    // With the report moved, /metrics is an ordinary measured path.
    let mut ctx = get("/metrics");
    let (_, head) = mw
        .handle(&mut ctx, Vec::new(), |_ctx, body| {
            body.writer()?.write_str("not the report")?;
            Ok(ResponseHead::ok())
        })
        .unwrap();
    assert_eq!(head.header("x-trace"), Some("1"));
    assert_eq!(mw.store().len(), 1);

    let mut ctx = get("/stats");
    let (_, head) = mw
        .handle(&mut ctx, Vec::new(), |ctx, body| {
            assert!(ctx.attribute(RESPONSE_METRICS_ATTR).is_some());
            body.writer()?.write_str("report")?;
            Ok(ResponseHead::html())
        })
        .unwrap();
    assert!(head.header("x-trace").is_none());
    assert_eq!(mw.store().len(), 1);
}

#[test]
fn test_reset_restarts_ids_and_drops_metrics() {
    let mw = middleware();
    for _ in 0..3 {
        let mut ctx = get("/traffic");
        mw.handle(&mut ctx, Vec::new(), |_ctx, body| {
            body.writer()?.write_str("x")?;
            Ok(ResponseHead::ok())
        })
        .unwrap();
    }
    assert_eq!(mw.store().len(), 3);

    mw.reset();
    assert!(mw.store().is_empty());

    let mut ctx = get("/traffic");
    let (_, head) = mw
        .handle(&mut ctx, Vec::new(), |_ctx, body| {
            body.writer()?.write_str("x")?;
            Ok(ResponseHead::ok())
        })
        .unwrap();
    assert_eq!(head.header("x-response-id"), Some("1"));
    assert_eq!(mw.store().len(), 1);
}
