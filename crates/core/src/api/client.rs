//! Registry HTTP client.
//!
//! Async reqwest client holding a cookie jar, so the session cookie set by
//! a login call is sent with every later request.

#![allow(missing_docs)]

use reqwest::Method;
use tracing::{debug, warn};
use url::Url;

use super::envelope::{classify, Body};
use crate::{
    config::AppConfig,
    error::{ApiError, ApiResult},
    models::{
        AccessTokenView, DependencyView, DownloadStatsView, GlobalStatsView, GroupReq, GroupView,
        PackageReq, PackageView, UserView, VersionReq, VersionView,
    },
};

/// Typed wrapper over the registry API.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    http: reqwest::Client,
    base: Url,
}

impl RegistryClient {
    /// Build a client from configuration.
    pub fn new(config: &AppConfig) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(format!("elbatui/{}", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout())
            .cookie_store(true)
            .build()?;
        Self::with_http(http, &config.api_base)
    }

    /// Build a client against an explicit base URL with default settings.
    pub fn with_base_url(api_base: &str) -> ApiResult<Self> {
        let config = AppConfig {
            api_base: api_base.to_string(),
            ..AppConfig::default()
        };
        Self::new(&config)
    }

    fn with_http(http: reqwest::Client, api_base: &str) -> ApiResult<Self> {
        let base = Url::parse(api_base.trim_end_matches('/'))
            .map_err(|err| ApiError::Decode(format!("invalid api base {api_base}: {err}")))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::Decode(format!("invalid api base {api_base}")));
        }
        Ok(Self { http, base })
    }

    /// Root URL all endpoints are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    // ── Users ───────────────────────────────────────────────────────

    /// The user owning the current session, or `None` when anonymous.
    pub async fn show_user_self(&self) -> ApiResult<Option<UserView>> {
        match self.get(&["users", "metadata"], &[]).await {
            Ok(body) => body.optional_field("user"),
            Err(err) if err.is_unauthenticated() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Public profile of another user.
    pub async fn show_user(&self, id: i64) -> ApiResult<UserView> {
        let id = id.to_string();
        self.get(&["users", id.as_str(), "metadata"], &[])
            .await?
            .field_or_bare("user")
    }

    /// Exchange a GitHub access token for a registry session.
    pub async fn login_by_access_token(&self, gh_name: &str, gh_access_token: &str) -> ApiResult<()> {
        self.get(
            &["users", "login"],
            &[("gh_name", gh_name), ("gh_access_token", gh_access_token)],
        )
        .await?;
        Ok(())
    }

    /// Entry point of the browser-based OAuth login.
    ///
    /// The flow runs in a browser; only the URL is produced here.
    pub fn oauth_login_url(&self) -> Url {
        self.endpoint(&["users", "login", "oauth"], &[])
    }

    /// End the current session.
    pub async fn logout(&self) -> ApiResult<()> {
        self.get(&["users", "logout"], &[]).await?;
        Ok(())
    }

    // ── Tokens ──────────────────────────────────────────────────────

    /// Tokens of the logged-in user. Secrets are never included.
    pub async fn list_tokens(&self) -> ApiResult<Vec<AccessTokenView>> {
        self.get(&["users", "tokens"], &[]).await?.field("tokens")
    }

    /// Create a token. The response is the only one carrying the secret.
    pub async fn create_token(&self) -> ApiResult<AccessTokenView> {
        self.send(Method::PUT, &["users", "tokens", "create"], &[])
            .await?
            .field("token")
    }

    /// Revoke a token.
    pub async fn remove_token(&self, token_id: i64) -> ApiResult<()> {
        let id = token_id.to_string();
        self.send(Method::DELETE, &["users", "tokens", id.as_str()], &[])
            .await?;
        Ok(())
    }

    // ── Packages ────────────────────────────────────────────────────

    /// Search packages; results keep the registry's order.
    pub async fn search(&self, query: &str) -> ApiResult<Vec<PackageReq>> {
        self.get(&["packages", "search"], &[("q", query)])
            .await?
            .field_or_bare("packages")
    }

    pub async fn global_stats(&self) -> ApiResult<GlobalStatsView> {
        self.get(&["packages", "global_stats"], &[])
            .await?
            .field_or_bare("global_stats")
    }

    pub async fn list_groups(&self) -> ApiResult<Vec<GroupReq>> {
        self.get(&["packages", "groups"], &[]).await?.field("groups")
    }

    pub async fn show_group(&self, group: &GroupReq) -> ApiResult<GroupView> {
        self.get(&["packages", group.group.as_str(), "metadata"], &[])
            .await?
            .field("group")
    }

    pub async fn list_packages(&self, group: &GroupReq) -> ApiResult<Vec<PackageReq>> {
        self.get(&["packages", group.group.as_str(), "packages"], &[])
            .await?
            .field("packages")
    }

    pub async fn show_package(&self, package: &PackageReq) -> ApiResult<PackageView> {
        self.get(&["packages", package.group.as_str(), package.package.as_str(), "metadata"], &[])
            .await?
            .field("package")
    }

    pub async fn list_versions(&self, package: &PackageReq) -> ApiResult<Vec<VersionReq>> {
        self.get(&["packages", package.group.as_str(), package.package.as_str(), "versions"], &[])
            .await?
            .field("versions")
    }

    pub async fn show_version(&self, version: &VersionReq) -> ApiResult<VersionView> {
        self.get(&version_path(version, "metadata"), &[])
            .await?
            .field("version")
    }

    /// Readme markdown of a version.
    pub async fn show_readme(&self, version: &VersionReq) -> ApiResult<String> {
        self.get(&version_path(version, "readme"), &[])
            .await?
            .text_or_field("readme")
    }

    pub async fn list_dependencies(&self, version: &VersionReq) -> ApiResult<Vec<DependencyView>> {
        self.get(&version_path(version, "dependencies"), &[])
            .await?
            .field("dependencies")
    }

    pub async fn download_stats(&self, version: &VersionReq) -> ApiResult<DownloadStatsView> {
        self.get(&version_path(version, "download_stats"), &[])
            .await?
            .field("download_stats")
    }

    // ── Internal helpers ────────────────────────────────────────────

    fn endpoint(&self, segments: &[&str], query: &[(&str, &str)]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        url
    }

    async fn get(&self, segments: &[&str], query: &[(&str, &str)]) -> ApiResult<Body> {
        self.send(Method::GET, segments, query).await
    }

    async fn send(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> ApiResult<Body> {
        let url = self.endpoint(segments, query);
        debug!(%method, path = url.path(), "registry request");
        let response = self.http.request(method.clone(), url.clone()).send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        classify(status, text).map_err(|err| {
            warn!(%method, path = url.path(), %err, "registry request failed");
            err
        })
    }
}

fn version_path<'a>(version: &'a VersionReq, leaf: &'a str) -> [&'a str; 5] {
    [
        "packages",
        version.group.as_str(),
        version.package.as_str(),
        version.version.as_str(),
        leaf,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    const API: &str = "/api/v1";

    fn client_for(server: &MockServer) -> RegistryClient {
        RegistryClient::with_base_url(&server.url(API)).unwrap()
    }

    fn version_json(group: &str, package: &str, version: &str) -> serde_json::Value {
        json!({
            "group": group,
            "package": package,
            "version": version,
            "yanked": false,
            "description": "Lightweight parser combinator library for Idris",
            "license": "MIT",
            "keywords": ["parser"],
            "owners": [{"id": 1, "name": "ziman", "email": null, "avatar": null}],
            "created_at": "2018-09-12T08:30:00Z"
        })
    }

    #[test]
    fn endpoints_encode_segments_and_queries() {
        let client = RegistryClient::with_base_url("http://registry.test/api/v1/").unwrap();
        let url = client.endpoint(&["packages", "a b", "c/d", "metadata"], &[("q", "x&y")]);
        assert_eq!(
            url.as_str(),
            "http://registry.test/api/v1/packages/a%20b/c%2Fd/metadata?q=x%26y"
        );
        assert_eq!(
            client.oauth_login_url().as_str(),
            "http://registry.test/api/v1/users/login/oauth"
        );
    }

    #[tokio::test]
    async fn search_keeps_server_order() {
        let server = MockServer::start_async().await;
        let mock = server
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

        let results = client_for(&server).search("lightyear").await.unwrap();
        mock.assert_async().await;
        assert_eq!(
            results,
            vec![
                PackageReq::new("idris-community", "lightyear"),
                PackageReq::new("acme", "lightyear-extra"),
            ]
        );
    }

    #[tokio::test]
    async fn search_accepts_a_bare_array() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/packages/search");
                then.status(200)
                    .json_body(json!([{"group": "acme", "package": "tomladder"}]));
            })
            .await;

        let results = client_for(&server).search("toml").await.unwrap();
        assert_eq!(results, vec![PackageReq::new("acme", "tomladder")]);
    }

    #[tokio::test]
    async fn error_envelope_with_ok_status_is_a_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/packages/groups");
                then.status(200)
                    .json_body(json!({"error": "invalid_request", "description": "nope"}));
            })
            .await;

        let err = client_for(&server).list_groups().await.unwrap_err();
        assert_eq!(err.code(), Some("invalid_request"));
    }

    #[tokio::test]
    async fn anonymous_session_maps_to_none() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/users/metadata");
                then.status(400).json_body(
                    json!({"error": "no_permission", "description": "please login first"}),
                );
            })
            .await;

        assert_eq!(client_for(&server).show_user_self().await.unwrap(), None);
    }

    #[tokio::test]
    async fn current_user_is_read_from_user_key() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/users/metadata");
                then.status(200).json_body(json!({
                    "user": {"id": 7, "name": "ziman", "email": "z@example.com", "avatar": null}
                }));
            })
            .await;

        let user = client_for(&server).show_user_self().await.unwrap().unwrap();
        assert_eq!(user.id, 7);
        assert_eq!(user.name, "ziman");
        assert_eq!(user.email.as_deref(), Some("z@example.com"));
    }

    #[tokio::test]
    async fn server_errors_surface_as_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/users/metadata");
                then.status(500).body("registry internal error");
            })
            .await;

        let err = client_for(&server).show_user_self().await.unwrap_err();
        assert_eq!(
            err,
            ApiError::Status {
                status: 500,
                body: "registry internal error".into()
            }
        );
    }

    #[tokio::test]
    async fn token_lifecycle_uses_put_and_delete() {
        let server = MockServer::start_async().await;
        let create = server
            .mock_async(|when, then| {
                when.method(PUT).path("/api/v1/users/tokens/create");
                then.status(200).json_body(json!({"token": {
                    "id": 3, "token": "abc123", "token_partial": "ab...23",
                    "created_at": "2018-09-12T08:30:00Z"
                }}));
            })
            .await;
        let remove = server
            .mock_async(|when, then| {
                when.method(DELETE).path("/api/v1/users/tokens/3");
                then.status(200);
            })
            .await;

        let client = client_for(&server);
        let token = client.create_token().await.unwrap();
        assert_eq!(token.token.as_deref(), Some("abc123"));
        client.remove_token(token.id).await.unwrap();
        create.assert_async().await;
        remove.assert_async().await;
    }

    #[tokio::test]
    async fn version_detail_endpoints() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/v1/packages/idris-community/lightyear/0.2.1/metadata");
                then.status(200)
                    .json_body(json!({"version": version_json("idris-community", "lightyear", "0.2.1")}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/v1/packages/idris-community/lightyear/0.2.1/readme");
                then.status(200).json_body(json!({"readme": "# lightyear"}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/v1/packages/idris-community/lightyear/0.2.1/download_stats");
                then.status(200)
                    .json_body(json!({"download_stats": {"total": 102, "season": 12}}));
            })
            .await;

        let client = client_for(&server);
        let req = PackageReq::new("idris-community", "lightyear").at("0.2.1");
        let version = client.show_version(&req).await.unwrap();
        assert_eq!(version.owners[0].name, "ziman");
        assert_eq!(client.show_readme(&req).await.unwrap(), "# lightyear");
        let stats = client.download_stats(&req).await.unwrap();
        assert_eq!((stats.total, stats.season), (102, 12));
    }

    #[tokio::test]
    async fn login_sends_credentials_as_query() {
        let server = MockServer::start_async().await;
        let login = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/v1/users/login")
                    .query_param("gh_name", "ziman")
                    .query_param("gh_access_token", "gh-secret");
                then.status(200);
            })
            .await;

        client_for(&server)
            .login_by_access_token("ziman", "gh-secret")
            .await
            .unwrap();
        login.assert_async().await;
    }

    #[tokio::test]
    async fn other_users_and_groups_by_path() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/users/42/metadata");
                then.status(200)
                    .json_body(json!({"id": 42, "name": "octocat", "avatar": "https://a/42.png"}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/packages/acme/metadata");
                then.status(200).json_body(
                    json!({"group": {"group": "acme", "created_at": "2018-09-12T08:30:00"}}),
                );
            })
            .await;

        let client = client_for(&server);
        let user = client.show_user(42).await.unwrap();
        assert_eq!(user.avatar.as_deref(), Some("https://a/42.png"));
        let group = client
            .show_group(&GroupReq {
                group: "acme".into(),
            })
            .await
            .unwrap();
        assert_eq!(group.group, "acme");
    }

    #[tokio::test]
    async fn transport_failures_are_reported() {
        let client = RegistryClient::with_base_url("http://127.0.0.1:9/api/v1").unwrap();
        let err = client.list_groups().await.unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
    }
}
