//! NerdGraph Gateway Tests
//!
//! Runs the HTTP gateway against a local mock NerdGraph server.

mod common;

use baseline_tuner::{
    build_catalog_query, load_catalog, resolve_detail_or_none, Account, AnalyticsGateway,
    Condition, ConditionId, GatewayError, NerdGraphGateway, TermPolicy,
};
use common::{catalog_payload, detail_payload};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn gateway_for(server: &MockServer) -> NerdGraphGateway {
    NerdGraphGateway::new(
        &format!("{}/graphql", server.uri()),
        "NRAK-TEST",
        Duration::from_secs(5),
    )
    .unwrap()
}

#[tokio::test]
async fn posts_query_with_api_key_and_returns_data() {
    let server = MockServer::start().await;
    let document = build_catalog_query(42);

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("api-key", "NRAK-TEST"))
        .and(body_partial_json(json!({ "query": document })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": catalog_payload(&[json!(7)]) })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let gw = gateway_for(&server).await;
    let data = gw.query(&document).await.unwrap();
    assert_eq!(
        data["actor"]["account"]["nrql"]["results"][0]["conditions"][0],
        7
    );
}

#[tokio::test]
async fn graphql_errors_are_gateway_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "errors": [{ "message": "Account not authorized" }]
        })))
        .mount(&server)
        .await;

    let gw = gateway_for(&server).await;
    match gw.query("{ actor { user { id } } }").await {
        Err(GatewayError::Query(msg)) => assert!(msg.contains("Account not authorized")),
        other => panic!("expected query error, got {other:?}"),
    }
}

#[tokio::test]
async fn non_success_status_is_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let gw = gateway_for(&server).await;
    assert!(matches!(
        gw.query("{}").await,
        Err(GatewayError::ServerError(status)) if status.as_u16() == 503
    ));
}

#[tokio::test]
async fn undecodable_body_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let gw = gateway_for(&server).await;
    assert!(matches!(gw.query("{}").await, Err(GatewayError::Malformed(_))));
}

#[tokio::test]
async fn null_data_is_no_data() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": null })))
        .mount(&server)
        .await;

    let gw = gateway_for(&server).await;
    assert!(matches!(gw.query("{}").await, Err(GatewayError::NoData)));
}

#[tokio::test]
async fn loaders_degrade_on_transport_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let gw = gateway_for(&server).await;
    let account = Account::new(42);
    assert!(load_catalog(&gw, &account).await.is_empty());

    let condition = Condition::new(ConditionId::parse("205").unwrap());
    assert!(resolve_detail_or_none(&gw, &account, &condition, TermPolicy::First)
        .await
        .is_none());
}

#[tokio::test]
async fn detail_round_trip_through_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": detail_payload("205", "SELECT average(duration) FROM Transaction", &[3.0])
        })))
        .mount(&server)
        .await;

    let gw = gateway_for(&server).await;
    let condition = Condition::new(ConditionId::parse("205").unwrap());
    let detail = resolve_detail_or_none(&gw, &Account::new(42), &condition, TermPolicy::First)
        .await
        .unwrap();
    assert_eq!(detail.query, "SELECT average(duration) FROM Transaction");
    assert!((detail.current_threshold - 3.0).abs() < f64::EPSILON);
}

#[test]
fn invalid_api_key_is_rejected() {
    let err = NerdGraphGateway::new("http://localhost/graphql", "bad\nkey", Duration::from_secs(1))
        .unwrap_err();
    assert!(matches!(err, GatewayError::InvalidApiKey));
}
