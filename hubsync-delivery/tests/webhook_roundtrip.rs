//! Reconciliation against a local webhook endpoint.

use std::io::Read;
use std::net::TcpListener;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use hubsync_core::{ChangeDescriptor, Channel, HubConfig, OwnerKey, StoreKind};
use hubsync_delivery::{
    upload_staged, verify, FailedIngestions, Payload, PayloadBody, ReconciliationLoop, RunStatus,
    SignedDeliveryClient, SIGNATURE_HEADER,
};
use hubsync_store::{open_store, Staging, TrackedStore};
use tempfile::TempDir;
use tiny_http::{Header, Response, Server};

const SECRET: &str = "hub-secret";
const JSON: &str = "application/json";

struct Received {
    url: String,
    signature: Option<String>,
    body: Vec<u8>,
}

/// Serve one canned `(status, content type, body)` per request, then stop.
fn spawn_endpoint(
    replies: Vec<(u16, &'static str, String)>,
) -> (String, mpsc::Receiver<Received>, thread::JoinHandle<()>) {
    let server = Server::http("127.0.0.1:0").expect("http server");
    let base = format!("http://{}/webhook", server.server_addr());
    let (tx, rx) = mpsc::channel();

    let handle = thread::spawn(move || {
        for (status, content_type, reply) in replies {
            let mut req = match server.recv_timeout(Duration::from_secs(5)) {
                Ok(Some(req)) => req,
                _ => break,
            };
            let mut body = Vec::new();
            req.as_reader().read_to_end(&mut body).expect("request body");
            let signature = req
                .headers()
                .iter()
                .find(|h| h.field.equiv(SIGNATURE_HEADER))
                .map(|h| h.value.as_str().to_owned());
            let _ = tx.send(Received {
                url: req.url().to_owned(),
                signature,
                body,
            });
            let header = Header::from_bytes("Content-Type", content_type).expect("content type");
            let _ = req.respond(
                Response::from_string(reply)
                    .with_status_code(status)
                    .with_header(header),
            );
        }
    });
    (base, rx, handle)
}

fn d(s: &str) -> ChangeDescriptor {
    ChangeDescriptor::from(s)
}

fn model_output_store(tmp: &TempDir) -> (Box<dyn TrackedStore>, Vec<(OwnerKey, ChangeDescriptor)>) {
    let cfg = HubConfig::with_hub_path(tmp.path());
    let store = open_store(&cfg, StoreKind::ModelOutput);
    store.init().expect("init");
    let owner = OwnerKey::team_model("teamA", "modelB");
    let entries: Vec<_> = [
        "model-output/teamA-modelB/2024-01-01-teamA-modelB.csv",
        "model-output/teamA-modelB/2024-01-08-teamA-modelB.csv",
        "model-output/teamA-modelB/2024-01-15-teamA-modelB.csv",
    ]
    .iter()
    .map(|p| (owner.clone(), d(p)))
    .collect();
    store.merge_entries(&entries).expect("merge");
    (store, entries)
}

#[test]
fn partial_failure_leaves_only_listed_descriptor() {
    let tmp = TempDir::new().expect("tempdir");
    let (store, entries) = model_output_store(&tmp);
    let failed = entries[1].1.clone();

    let (base, rx, handle) = spawn_endpoint(vec![(
        500,
        JSON,
        format!(
            r#"{{"status":"partial","message":"1 file failed","failed_ingestions":["{failed}"]}}"#
        ),
    )]);
    let client = SignedDeliveryClient::new(base, SECRET);

    let report = ReconciliationLoop::new(store.as_ref(), &client, Channel::Forecast, "flu")
        .run()
        .expect("cycle");
    handle.join().expect("server thread");

    assert_eq!(report.result.status, RunStatus::Error);
    assert_eq!(
        report.result.failed_ingestions,
        Some(FailedIngestions::Items(vec![failed.clone()]))
    );
    assert_eq!(
        store.pending().expect("pending"),
        vec![(OwnerKey::team_model("teamA", "modelB"), failed)]
    );

    let received = rx.recv().expect("one request");
    assert_eq!(received.url, "/webhook/forecast/");
    let signature = received.signature.expect("signature header");
    assert!(verify(&received.body, SECRET, &signature));

    let payload: Payload = serde_json::from_slice(&received.body).expect("payload json");
    assert_eq!(payload.disease, "flu");
    let records = match payload.body {
        PayloadBody::Forecasts(records) => records,
        other => panic!("expected forecasts, got {other:?}"),
    };
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].team, "teamA");
    assert_eq!(records[0].changes.len(), 3);
}

#[test]
fn accepted_batch_clears_store() {
    let tmp = TempDir::new().expect("tempdir");
    let (store, _) = model_output_store(&tmp);
    let (base, _rx, handle) = spawn_endpoint(vec![(
        200,
        "application/json; charset=utf-8",
        r#"{"status":"success","message":"Import completed"}"#.to_owned(),
    )]);
    let client = SignedDeliveryClient::new(base, SECRET);

    let report = ReconciliationLoop::new(store.as_ref(), &client, Channel::Forecast, "flu")
        .run()
        .expect("cycle");
    handle.join().expect("server thread");

    assert!(report.result.is_success());
    assert_eq!(report.result.message, "Import completed");
    assert!(store.pending().expect("pending").is_empty());
}

#[test]
fn rejected_signature_retains_whole_batch() {
    let tmp = TempDir::new().expect("tempdir");
    let (store, entries) = model_output_store(&tmp);
    let (base, _rx, handle) = spawn_endpoint(vec![(
        401,
        JSON,
        r#"{"status":"error","message":"Signature authentication failed"}"#.to_owned(),
    )]);
    let client = SignedDeliveryClient::new(base, "wrong-secret");

    let report = ReconciliationLoop::new(store.as_ref(), &client, Channel::Forecast, "flu")
        .run()
        .expect("cycle");
    handle.join().expect("server thread");

    assert_eq!(report.result.message, "Signature authentication failed");
    assert_eq!(report.result.failed_ingestions, Some(FailedIngestions::NotAvailable));
    assert_eq!(store.pending().expect("pending"), entries);
}

#[test]
fn html_error_page_retains_whole_batch() {
    let tmp = TempDir::new().expect("tempdir");
    let (store, entries) = model_output_store(&tmp);
    let (base, _rx, handle) = spawn_endpoint(vec![(
        502,
        "text/html",
        "<html>Bad Gateway</html>".to_owned(),
    )]);
    let client = SignedDeliveryClient::new(base, SECRET);

    let report = ReconciliationLoop::new(store.as_ref(), &client, Channel::Forecast, "flu")
        .run()
        .expect("cycle");
    handle.join().expect("server thread");

    assert_eq!(report.result.message, "Server Error");
    assert_eq!(store.pending().expect("pending"), entries);
}

#[test]
fn unreachable_endpoint_retains_whole_batch() {
    let tmp = TempDir::new().expect("tempdir");
    let (store, entries) = model_output_store(&tmp);

    // Bind and drop to get a port nobody listens on.
    let addr = TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .expect("free port");
    let client = SignedDeliveryClient::new(format!("http://{addr}"), SECRET);

    let report = ReconciliationLoop::new(store.as_ref(), &client, Channel::Forecast, "flu")
        .run()
        .expect("transport failures do not abort the cycle");
    assert_eq!(report.result.status, RunStatus::Error);
    assert_eq!(store.pending().expect("pending"), entries);
}

#[test]
fn staged_parts_are_posted_one_per_request() {
    let tmp = TempDir::new().expect("tempdir");
    let mut cfg = HubConfig::with_hub_path(tmp.path());
    cfg.staging.max_records = 2;
    let staging = Staging::from_config(&cfg);
    std::fs::write(
        tmp.path().join("scores.csv"),
        "model,score\nA,1\nB,2\nC,3\n",
    )
    .expect("write csv");
    let parts = staging.stage(&[d("scores.csv")]).expect("stage");
    assert_eq!(parts.len(), 2);

    let ok = r#"{"status":"success","message":"Import completed"}"#.to_owned();
    let (base, rx, handle) = spawn_endpoint(vec![(200, JSON, ok.clone()), (200, JSON, ok)]);
    let client = SignedDeliveryClient::new(base, SECRET);

    let report = upload_staged(&staging, &client, "respiratory").expect("upload");
    handle.join().expect("server thread");

    assert!(report.result.is_success());
    assert!(!staging.dir().exists());

    let received: Vec<Received> = rx.try_iter().collect();
    assert_eq!(received.len(), 2);
    for (req, part) in received.iter().zip(&parts) {
        assert_eq!(req.url, "/webhook/evaluation/");
        let payload: Payload = serde_json::from_slice(&req.body).expect("payload json");
        assert_eq!(payload.body, PayloadBody::Changes(vec![part.clone()]));
    }
}
