//! End-to-end Tests against a bound server
//!
//! Starts the demo server on an ephemeral port and talks to it over real
//! HTTP, the way an external client would.

use relcache::{api::create_router, AppState, Config};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_test::assert_ok;

async fn spawn_server() -> String {
    let app = create_router(AppState::from_config(&Config::default()).unwrap());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn create(client: &Client, base: &str, entity: &str, fields: Value) -> u64 {
    let response = assert_ok!(
        client
            .post(format!("{}/records/{}", base, entity))
            .json(&json!({ "fields": fields }))
            .send()
            .await
    );
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = assert_ok!(response.json().await);
    body["record"]["pk"].as_u64().unwrap()
}

#[tokio::test]
async fn test_health_over_http() {
    let base = spawn_server().await;

    let response = assert_ok!(reqwest::get(format!("{}/health", base)).await);
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = assert_ok!(response.json().await);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_collection_follows_writes_over_http() {
    let base = spawn_server().await;
    let client = Client::new();

    let author = create(&client, &base, "library.Person", json!({ "name": "Gaskell" })).await;
    let book = json!({ "title": "Cranford", "rank": 1, "author": author });
    let cranford = create(&client, &base, "library.Book", book).await;
    let book = json!({ "title": "North and South", "rank": 2, "author": author });
    create(&client, &base, "library.Book", book).await;

    let url = format!("{}/records/library.Person/{}/book_set", base, author);
    let body: Value = assert_ok!(assert_ok!(client.get(&url).send().await).json().await);
    assert_eq!(body["kind"], "many");
    assert_eq!(body["value"][0]["fields"]["title"], "North and South");

    let response = assert_ok!(
        client
            .delete(format!("{}/records/library.Book/{}", base, cranford))
            .send()
            .await
    );
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = assert_ok!(assert_ok!(client.get(&url).send().await).json().await);
    assert_eq!(body["value"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_missing_record_over_http() {
    let base = spawn_server().await;

    let url = format!("{}/records/library.Book/404", base);
    let response = assert_ok!(reqwest::get(url).await);
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body: Value = assert_ok!(response.json().await);
    assert!(body["error"].as_str().unwrap().contains("does not exist"));
}
