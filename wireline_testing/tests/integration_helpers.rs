//! Integration coverage for `wireline_testing` helpers.

use serde_json::json;
use wireline::{config::ServerConfig, server::ShutdownOutcome};
use wireline_testing::{LineClient, MetricsCapture, TestResult, TestServer, echo_router};

#[tokio::test]
async fn line_client_round_trips_through_test_server() -> TestResult {
    let server = TestServer::start(ServerConfig::default(), echo_router())?;
    let mut client = LineClient::connect(server.addr()).await?;

    let reply = client.call("echo", json!({"greeting": "hi"})).await?;
    assert_eq!(reply, json!({"status": true, "data": {"greeting": "hi"}}));

    drop(client);
    assert_eq!(server.shutdown().await, ShutdownOutcome::Drained);
    Ok(())
}

#[tokio::test]
async fn read_reply_reports_closed_connection() -> TestResult {
    let server = TestServer::start(ServerConfig::default(), echo_router())?;
    let mut client = LineClient::connect(server.addr()).await?;

    server.shutdown().await;
    assert_eq!(client.read_reply().await?, None);
    Ok(())
}

#[test]
fn metrics_capture_sums_labelled_counters() {
    let capture = MetricsCapture::new();
    capture.record(|| {
        metrics::counter!("sample_total", "side" => "a").increment(2);
        metrics::counter!("sample_total", "side" => "b").increment(3);
        metrics::gauge!("sample_level").set(4.0);
    });

    assert_eq!(capture.counter("sample_total", &[]), 5);
    assert_eq!(capture.counter("sample_total", &[("side", "b")]), 3);
    assert_eq!(capture.gauge("sample_level"), Some(4.0));
    assert_eq!(capture.gauge("missing"), None);
}
