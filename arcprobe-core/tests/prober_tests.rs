// Tests for the sequential probers: metadata, null checks and domain counts

mod common;

use arcprobe_core::domains::{DOMAIN_QUEUE, DomainField, check_domains};
use arcprobe_core::fetcher::{METADATA_QUEUE, collect_metadata};
use arcprobe_core::fields::{AnchoredField, NULL_CHECK_QUEUE, check_for_nulls};
use arcprobe_core::model::indexed_fields_of;
use arcprobe_core::panel::{Anchor, ItemFlag, PanelKind};
use arcprobe_scanner::status::{StatusCallback, StatusSignal};
use arcprobe_scanner::ServiceLink;
use common::MockTransport;
use serde_json::json;
use std::sync::{Arc, Mutex};

const LAYER: &str = "https://gis.example.com/arcgis/rest/services/Parcels/MapServer/0";

fn link(index: usize, name: &str) -> ServiceLink {
    ServiceLink {
        index,
        url: format!("https://gis.example.com/arcgis/rest/services/{}/MapServer", name),
    }
}

fn recorder() -> (StatusCallback, Arc<Mutex<Vec<StatusSignal>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let callback: StatusCallback = Arc::new(move |signal| sink.lock().unwrap().push(signal));
    (callback, seen)
}

// ============================================================================
// Metadata queue
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_metadata_issues_one_request_per_link() {
    let transport = MockTransport::new()
        .route("/services/A/MapServer", json!({"description": "Alpha", "layers": []}))
        .route("/services/B/MapServer", json!({"description": "Beta"}))
        .route("/services/C/MapServer", json!({"description": "Gamma"}));
    let links = vec![link(3, "A"), link(5, "B"), link(8, "C")];

    let output = collect_metadata(&transport, links, true, &None).await;

    assert_eq!(
        transport.requests(),
        vec![
            "/arcgis/rest/services/A/MapServer",
            "/arcgis/rest/services/B/MapServer",
            "/arcgis/rest/services/C/MapServer",
        ]
    );
    assert_eq!(transport.max_in_flight(), 1);
    assert_eq!(output.queues.len(), 1);
    assert_eq!(output.queues[0].label, METADATA_QUEUE);
    assert_eq!(output.queues[0].processed, 3);
    assert!(!output.queues[0].is_errored());

    let metadata: Vec<_> = output
        .panels
        .iter()
        .filter(|panel| panel.kind == PanelKind::Metadata)
        .collect();
    assert_eq!(metadata.len(), 3);
    assert!(metadata[0].collapsed);
    assert_eq!(
        metadata[1].anchor,
        Anchor::Link {
            index: 5,
            url: link(5, "B").url
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_metadata_transport_failure_stops_queue() {
    let transport = MockTransport::new()
        .route("/services/A/MapServer", json!({"description": "Alpha"}))
        .route("/services/C/MapServer", json!({"description": "Gamma"}))
        .fail("/services/B/MapServer");
    let links = vec![link(0, "A"), link(1, "B"), link(2, "C")];

    let output = collect_metadata(&transport, links, false, &None).await;

    // A completes, B is dispatched and fails, C never goes out.
    assert_eq!(transport.request_count(), 2);
    assert!(
        !transport
            .requests()
            .iter()
            .any(|r| r.contains("/services/C/"))
    );

    let queue = &output.queues[0];
    assert!(queue.is_errored());
    assert_eq!(queue.processed, 1);
    assert_eq!(queue.remaining, 1);

    let failed = output
        .panels
        .iter()
        .find(|panel| matches!(panel.anchor, Anchor::Link { index: 1, .. }))
        .expect("failure panel for B");
    assert!(failed.has_errors());
    assert_eq!(failed.items[0].title, "Request failed");
}

#[tokio::test(start_paused = true)]
async fn test_metadata_application_error_does_not_stop_queue() {
    let transport = MockTransport::new()
        .route(
            "/services/A/MapServer",
            json!({"error": {"code": 499, "message": "Token Required"}}),
        )
        .route("/services/B/MapServer", json!({"description": "Beta"}));

    let output = collect_metadata(&transport, vec![link(0, "A"), link(1, "B")], false, &None).await;

    assert_eq!(transport.request_count(), 2);
    assert!(!output.queues[0].is_errored());
    assert!(output.panels[0].has_errors());
}

#[tokio::test(start_paused = true)]
async fn test_metadata_feature_counts() {
    let transport = MockTransport::new()
        .route("where=OBJECTID IS NOT NULL", json!({"count": 120}))
        .route("where=SHAPE IS NOT NULL", json!({"count": 0}))
        .route(
            "/services/A/MapServer",
            json!({
                "type": "Feature Layer",
                "fields": [
                    {"name": "OBJECTID", "type": "esriFieldTypeOID"},
                    {"name": "SHAPE", "type": "esriFieldTypeGeometry"}
                ]
            }),
        );

    let output = collect_metadata(&transport, vec![link(0, "A")], true, &None).await;

    assert_eq!(transport.request_count(), 3);
    let counts = output
        .panels
        .iter()
        .find(|panel| panel.kind == PanelKind::FeatureCounts)
        .expect("feature count panel");
    assert_eq!(counts.items[0].text(), "Number of features: 120");
    assert_eq!(counts.items[1].text(), "Features with shapes: 0");
    assert_eq!(counts.items[1].flag, ItemFlag::Empty);
}

#[tokio::test(start_paused = true)]
async fn test_metadata_emits_loading_signals() {
    let transport = MockTransport::new();
    let (callback, seen) = recorder();

    collect_metadata(&transport, vec![link(0, "A")], false, &Some(callback)).await;

    assert_eq!(
        *seen.lock().unwrap(),
        vec![StatusSignal::LoadingStart, StatusSignal::LoadingComplete]
    );
}

// ============================================================================
// Null checker
// ============================================================================

fn layer_fields() -> Vec<AnchoredField> {
    let doc = json!({"fields": [
        {"name": "OBJECTID", "type": "esriFieldTypeOID"},
        {"name": "NAME", "type": "esriFieldTypeString"},
        {"name": "AREA", "type": "esriFieldTypeDouble"},
        {"name": "OWNER", "type": "esriFieldTypeString"}
    ]});
    AnchoredField::pair(indexed_fields_of(&doc), None)
}

#[tokio::test(start_paused = true)]
async fn test_string_fields_cost_two_requests() {
    let transport = MockTransport::new().counts(7);

    let output = check_for_nulls(&transport, LAYER, layer_fields(), &None).await;

    // 2 non-string fields x 1 + 2 string fields x 2
    assert_eq!(transport.request_count(), 6);
    assert_eq!(transport.max_in_flight(), 1);
    assert_eq!(
        transport.requests()[1..3],
        [
            "/arcgis/rest/services/Parcels/MapServer/0/query where=NAME IS NOT NULL".to_string(),
            "/arcgis/rest/services/Parcels/MapServer/0/query where=NAME IS NOT NULL AND NAME <> ''"
                .to_string(),
        ]
    );

    assert_eq!(output.queues[0].label, NULL_CHECK_QUEUE);
    assert_eq!(output.panels.len(), 4);
    assert_eq!(output.panels[1].items.len(), 2);
    assert_eq!(
        output.panels[1].items[1].text(),
        "Features without empty values: 7"
    );
    assert_eq!(output.panels[2].items.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_oid_error_maps_to_known_message() {
    let transport = MockTransport::new()
        .route(
            "where=OBJECTID IS NOT NULL",
            json!({"error": {"code": 400, "message": "Unable to complete operation."}}),
        )
        .counts(1);

    let output = check_for_nulls(&transport, LAYER, layer_fields(), &None).await;

    assert_eq!(
        output.panels[0].items[0].title,
        "Service does not support checking for null ObjectID"
    );
    assert!(output.panels[0].has_errors());
    assert!(!output.queues[0].is_errored());
}

#[tokio::test(start_paused = true)]
async fn test_string_field_error_skips_empty_check() {
    let transport = MockTransport::new()
        .route(
            "where=NAME IS NOT NULL",
            json!({"error": {"code": 500, "message": "Invalid field"}}),
        )
        .counts(3);

    check_for_nulls(&transport, LAYER, layer_fields(), &None).await;

    assert_eq!(transport.request_count(), 5);
    assert!(!transport.requests().iter().any(|r| r.contains("NAME <> ''")));
}

#[tokio::test(start_paused = true)]
async fn test_null_check_stalls_on_transport_failure() {
    let transport = MockTransport::new()
        .fail("where=AREA IS NOT NULL")
        .counts(2);

    let output = check_for_nulls(&transport, LAYER, layer_fields(), &None).await;

    assert!(output.queues[0].is_errored());
    assert_eq!(output.queues[0].remaining, 1);
    assert!(!transport.requests().iter().any(|r| r.contains("OWNER")));
    assert_eq!(output.panels.len(), 3);
    assert!(output.panels[2].has_errors());
}

// ============================================================================
// Domain checker
// ============================================================================

fn domain_fields() -> Vec<DomainField> {
    let doc = json!({"fields": [
        {"name": "STATUS", "type": "esriFieldTypeString", "domain": {
            "type": "codedValue", "name": "Status", "codedValues": [
                {"code": "A", "name": "Active"},
                {"code": "R", "name": "Retired"},
                {"code": "P", "name": "Proposed"}
            ]}},
        {"name": "NAME", "type": "esriFieldTypeString"},
        {"name": "CLASS", "type": "esriFieldTypeSmallInteger", "domain": {
            "type": "codedValue", "name": "Class", "codedValues": [
                {"code": 1, "name": "Major"},
                {"code": 2, "name": "Minor"}
            ]}}
    ]});
    DomainField::from_fields(&AnchoredField::pair(indexed_fields_of(&doc), None))
}

#[tokio::test(start_paused = true)]
async fn test_domain_codes_queried_in_order() {
    let transport = MockTransport::new()
        .route("where=STATUS = 'R'", json!({"count": 0}))
        .counts(4);

    let output = check_domains(&transport, LAYER, domain_fields(), &None).await;

    let clauses: Vec<String> = transport
        .requests()
        .iter()
        .map(|r| r.split("where=").nth(1).unwrap_or_default().to_string())
        .collect();
    assert_eq!(
        clauses,
        vec!["STATUS = 'A'", "STATUS = 'R'", "STATUS = 'P'", "CLASS = 1", "CLASS = 2"]
    );
    assert_eq!(transport.max_in_flight(), 1);

    assert_eq!(output.queues[0].label, DOMAIN_QUEUE);
    assert_eq!(output.queues[0].processed, 2);
    assert_eq!(output.panels.len(), 2);
    assert_eq!(output.panels[0].items[0].text(), "Active: 4");
    assert_eq!(output.panels[0].items[1].flag, ItemFlag::Empty);
    assert_eq!(
        output.panels[1].anchor,
        Anchor::Field {
            name: "CLASS".to_string(),
            label: "CLASS".to_string()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_inner_failure_stops_outer_queue() {
    let transport = MockTransport::new()
        .fail("where=STATUS = 'R'")
        .counts(4);

    let output = check_domains(&transport, LAYER, domain_fields(), &None).await;

    assert_eq!(transport.request_count(), 2);
    assert!(output.queues[0].is_errored());
    assert_eq!(output.queues[0].remaining, 1);
    assert_eq!(output.panels.len(), 1);
    let last = output.panels[0].items.last().unwrap();
    assert_eq!(last.title, "Request failed");
}

#[tokio::test(start_paused = true)]
async fn test_no_domain_fields_sends_nothing() {
    let transport = MockTransport::new();
    let (callback, seen) = recorder();

    let output = check_domains(&transport, LAYER, Vec::new(), &Some(callback)).await;

    assert_eq!(transport.request_count(), 0);
    assert!(output.panels.is_empty());
    assert!(seen.lock().unwrap().is_empty());
}
