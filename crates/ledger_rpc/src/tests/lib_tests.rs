use super::*;

use axum::{
    extract::Path,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;
use tokio::net::TcpListener;

use shared::protocol::{
    parse_record, CallArg, ExecutionStatus, ObjectContent, RECORD_CONTENT_KIND,
};

async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("http://{addr}")
}

async fn object_handler(Path(id): Path<String>) -> impl IntoResponse {
    if id != "0xknown" {
        return StatusCode::NOT_FOUND.into_response();
    }
    Json(ObjectEnvelope {
        object_id: ObjectId(id),
        content: Some(ObjectContent {
            kind: RECORD_CONTENT_KIND.to_string(),
            fields: json!({ "bookmark_count": "7", "owner": "0xabc" }),
        }),
    })
    .into_response()
}

#[tokio::test]
async fn get_object_decodes_a_live_record() {
    let base = serve(Router::new().route("/objects/:id", get(object_handler))).await;
    let client = HttpLedgerClient::new(&base).expect("client");

    let envelope = client
        .get_object(&ObjectId::from("0xknown"))
        .await
        .expect("query")
        .expect("object exists");

    let record = parse_record(&envelope).expect("record");
    assert_eq!(record.bookmark_count, 7);
    assert_eq!(record.owner.as_str(), "0xabc");
}

#[tokio::test]
async fn get_object_maps_404_to_absent() {
    let base = serve(Router::new().route("/objects/:id", get(object_handler))).await;
    let client = HttpLedgerClient::new(&base).expect("client");

    let envelope = client
        .get_object(&ObjectId::from("0xmissing"))
        .await
        .expect("query");
    assert!(envelope.is_none());
}

#[tokio::test]
async fn undecodable_body_is_a_malformed_error() {
    let app = Router::new().route(
        "/objects/:id",
        get(|| async { Json(json!({ "unexpected": true })) }),
    );
    let base = serve(app).await;
    let client = HttpLedgerClient::new(&base).expect("client");

    let err = client
        .get_object(&ObjectId::from("0xknown"))
        .await
        .expect_err("body does not decode");
    assert!(matches!(err, QueryError::Malformed(_)));
}

#[tokio::test]
async fn server_error_is_a_transport_error() {
    let app = Router::new().route(
        "/objects/:id",
        get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    );
    let base = serve(app).await;
    let client = HttpLedgerClient::new(&base).expect("client");

    let err = client
        .get_object(&ObjectId::from("0xknown"))
        .await
        .expect_err("http 500");
    assert!(matches!(err, QueryError::Transport(_)));
}

async fn submit_handler(Json(call): Json<ProgrammableCall>) -> impl IntoResponse {
    assert_eq!(call.target, "0xpkg::contract::add_bookmark");
    assert_eq!(
        call.arguments,
        vec![CallArg::Object(ObjectId::from("0xknown"))]
    );
    Json(json!({ "digest": "digest-42" }))
}

async fn effects_handler(Path(digest): Path<String>) -> impl IntoResponse {
    assert_eq!(digest, "digest-42");
    Json(TransactionEffects {
        status: ExecutionStatus::Success,
        created: Vec::new(),
        timestamp: Utc::now(),
    })
}

#[tokio::test]
async fn submit_then_wait_round_trips_digest_and_effects() {
    let app = Router::new()
        .route("/transactions", post(submit_handler))
        .route("/transactions/:digest/effects", get(effects_handler));
    let base = serve(app).await;
    let client = HttpLedgerClient::new(&base).expect("client");

    let call = ProgrammableCall {
        target: "0xpkg::contract::add_bookmark".to_string(),
        arguments: vec![CallArg::Object(ObjectId::from("0xknown"))],
    };
    let digest = client.sign_and_execute(call).await.expect("submit");
    assert_eq!(digest, TxDigest::from("digest-42"));

    let effects = client.wait_for_transaction(&digest).await.expect("effects");
    assert_eq!(effects.status, ExecutionStatus::Success);
    assert!(effects.created_object_id().is_none());
}

#[tokio::test]
async fn base_urls_keep_their_path_prefix() {
    let client = HttpLedgerClient::new("http://127.0.0.1:1/gateway").expect("client");
    let url = client.endpoint("objects/0x1").expect("endpoint");
    assert_eq!(url.path(), "/gateway/objects/0x1");
}
