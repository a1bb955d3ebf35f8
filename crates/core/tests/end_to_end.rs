use std::sync::Arc;

use elbatui_core::{
    execute,
    models::PackageReq,
    Browser, Fetch, RegistryClient, RemoteData, Route, SessionState, SessionStore,
};
use httpmock::prelude::*;
use serde_json::json;

fn client_for(server: &MockServer) -> RegistryClient {
    RegistryClient::with_base_url(&server.url("/api/v1")).unwrap()
}

/// Run fetches to completion, feeding follow-ups back in until none remain.
async fn drive(browser: &mut Browser, client: &RegistryClient, mut pending: Vec<Fetch>) {
    while let Some(fetch) = pending.pop() {
        let fetched = execute(client, fetch).await;
        pending.extend(browser.apply(fetched));
    }
}

#[tokio::test]
async fn search_shows_results_in_server_order() {
    let server = MockServer::start_async().await;
    let search = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/v1/packages/search")
                .query_param("q", "lightyear");
            then.status(200).json_body(json!({
                "packages": [
                    {"group": "idris-community", "package": "lightyear"},
                    {"group": "acme", "package": "lightyear-extra"}
                ]
            }));
        })
        .await;

    let client = client_for(&server);
    let mut browser = Browser::new();
    let fetches = browser.navigate(Route::parse("/search?q=lightyear"));
    assert!(browser.search.results.state().is_loading());
    drive(&mut browser, &client, fetches).await;

    search.assert_async().await;
    assert_eq!(
        browser.search.results.state(),
        &RemoteData::Ready(vec![
            PackageReq::new("idris-community", "lightyear"),
            PackageReq::new("acme", "lightyear-extra"),
        ])
    );
}

#[tokio::test]
async fn package_page_follows_latest_version() {
    let server = MockServer::start_async().await;
    let version = json!({
        "group": "idris-community",
        "package": "lightyear",
        "version": "0.2.1",
        "yanked": false,
        "owners": [],
        "created_at": "2018-09-12T08:30:00"
    });
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/v1/packages/idris-community/lightyear/metadata");
            then.status(200).json_body(json!({"package": {
                "group": "idris-community",
                "package": "lightyear",
                "latest_version": version,
                "updated_at": "2018-09-12T08:30:00Z",
                "created_at": "2018-01-01T00:00:00Z"
            }}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/v1/packages/idris-community/lightyear/versions");
            then.status(200).json_body(json!({"versions": [
                {"group": "idris-community", "package": "lightyear", "version": "0.2.1"},
                {"group": "idris-community", "package": "lightyear", "version": "0.1.0"}
            ]}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/v1/packages/idris-community/lightyear/0.2.1/metadata");
            then.status(200).json_body(json!({"version": version}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/v1/packages/idris-community/lightyear/0.2.1/readme");
            then.status(200).body("# lightyear");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/v1/packages/idris-community/lightyear/0.2.1/download_stats");
            then.status(200)
                .json_body(json!({"download_stats": {"total": 120, "season": 7}}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/v1/packages/idris-community/lightyear/0.2.1/dependencies");
            then.status(400).json_body(
                json!({"error": "version_not_found", "description": "no dependencies recorded"}),
            );
        })
        .await;

    let client = client_for(&server);
    let mut browser = Browser::new();
    let fetches = browser.navigate(Route::parse("/package/idris-community/lightyear"));
    drive(&mut browser, &client, fetches).await;

    let page = &browser.package;
    assert_eq!(page.versions.ready().map(Vec::len), Some(2));
    assert_eq!(page.version.ready().map(|v| v.version.as_str()), Some("0.2.1"));
    assert_eq!(page.readme.ready().map(String::as_str), Some("# lightyear"));
    assert_eq!(page.stats.ready().map(|s| s.total), Some(120));
    assert_eq!(
        page.dependencies.state().error().and_then(|e| e.code()),
        Some("version_not_found")
    );
}

#[tokio::test]
async fn created_token_secret_is_shown_exactly_once() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v1/users/metadata");
            then.status(200)
                .json_body(json!({"user": {"id": 1, "name": "ziman"}}));
        })
        .await;
    let list = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v1/users/tokens");
            then.status(200).json_body(json!({"tokens": [{
                "id": 3,
                "token_partial": "ab...23",
                "created_at": "2024-03-01T12:00:00Z"
            }]}));
        })
        .await;
    let create = server
        .mock_async(|when, then| {
            when.method(PUT).path("/api/v1/users/tokens/create");
            then.status(200).json_body(json!({"token": {
                "id": 3,
                "token": "abc123",
                "token_partial": "ab...23",
                "created_at": "2024-03-01T12:00:00Z"
            }}));
        })
        .await;

    let client = client_for(&server);
    let session = SessionStore::new(Arc::new(client.clone()));
    let state = session.refresh().await;
    assert!(matches!(state, SessionState::Authenticated(ref u) if u.name == "ziman"));

    let mut browser = Browser::new();
    assert!(browser.navigate(Route::Profile).is_empty());
    let fetches = browser.set_session(&session.get());
    drive(&mut browser, &client, fetches).await;
    assert_eq!(browser.profile.tokens.tokens().ready().map(Vec::len), Some(1));

    let fetch = browser.create_token().expect("logged in");
    let fetched = execute(&client, fetch).await;
    let follow_up = browser.apply(fetched);
    assert_eq!(follow_up.len(), 1);

    let created = browser.profile.tokens.creating().ready().expect("created");
    assert_eq!(created.token_partial, "ab...23");
    assert_eq!(created.token, None);
    assert_eq!(browser.profile.tokens.take_revealed().as_deref(), Some("abc123"));
    assert_eq!(browser.profile.tokens.take_revealed(), None);

    drive(&mut browser, &client, follow_up).await;
    create.assert_async().await;
    list.assert_hits_async(2).await;
    let listed = browser.profile.tokens.tokens().ready().expect("list reloaded");
    assert!(listed.iter().all(|t| t.token.is_none()));
    assert_eq!(browser.profile.tokens.take_revealed(), None);
}
