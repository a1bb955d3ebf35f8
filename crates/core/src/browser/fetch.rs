use tracing::debug;

use crate::{
    api::RegistryClient,
    error::ApiResult,
    models::{
        AccessTokenView, DependencyView, DownloadStatsView, GlobalStatsView, GroupReq, GroupView,
        PackageReq, PackageView, VersionReq, VersionView,
    },
    remote::Ticket,
};

/// One request a page wants made, tagged with the ticket of its slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetch {
    Groups(Ticket),
    GlobalStats(Ticket),
    Group(Ticket, GroupReq),
    GroupPackages(Ticket, GroupReq),
    Search(Ticket, String),
    Package(Ticket, PackageReq),
    Versions(Ticket, PackageReq),
    Version(Ticket, VersionReq),
    Readme(Ticket, VersionReq),
    DownloadStats(Ticket, VersionReq),
    Dependencies(Ticket, VersionReq),
    Tokens(Ticket),
    CreateToken(Ticket),
    DeleteToken(Ticket, i64),
}

/// Outcome of a [`Fetch`], carrying the same ticket back.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched {
    Groups(Ticket, ApiResult<Vec<GroupReq>>),
    GlobalStats(Ticket, ApiResult<GlobalStatsView>),
    Group(Ticket, ApiResult<GroupView>),
    GroupPackages(Ticket, ApiResult<Vec<PackageReq>>),
    Search(Ticket, ApiResult<Vec<PackageReq>>),
    Package(Ticket, ApiResult<PackageView>),
    Versions(Ticket, ApiResult<Vec<VersionReq>>),
    Version(Ticket, ApiResult<VersionView>),
    Readme(Ticket, ApiResult<String>),
    DownloadStats(Ticket, ApiResult<DownloadStatsView>),
    Dependencies(Ticket, ApiResult<Vec<DependencyView>>),
    Tokens(Ticket, ApiResult<Vec<AccessTokenView>>),
    TokenCreated(Ticket, ApiResult<AccessTokenView>),
    TokenDeleted(Ticket, ApiResult<()>),
}

impl Fetch {
    /// Short name used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            Fetch::Groups(_) => "groups",
            Fetch::GlobalStats(_) => "global_stats",
            Fetch::Group(..) => "group",
            Fetch::GroupPackages(..) => "group_packages",
            Fetch::Search(..) => "search",
            Fetch::Package(..) => "package",
            Fetch::Versions(..) => "versions",
            Fetch::Version(..) => "version",
            Fetch::Readme(..) => "readme",
            Fetch::DownloadStats(..) => "download_stats",
            Fetch::Dependencies(..) => "dependencies",
            Fetch::Tokens(_) => "tokens",
            Fetch::CreateToken(_) => "create_token",
            Fetch::DeleteToken(..) => "delete_token",
        }
    }
}

impl Fetched {
    /// Whether the request failed.
    pub fn is_err(&self) -> bool {
        match self {
            Fetched::Groups(_, r) => r.is_err(),
            Fetched::GlobalStats(_, r) => r.is_err(),
            Fetched::Group(_, r) => r.is_err(),
            Fetched::GroupPackages(_, r) | Fetched::Search(_, r) => r.is_err(),
            Fetched::Package(_, r) => r.is_err(),
            Fetched::Versions(_, r) => r.is_err(),
            Fetched::Version(_, r) => r.is_err(),
            Fetched::Readme(_, r) => r.is_err(),
            Fetched::DownloadStats(_, r) => r.is_err(),
            Fetched::Dependencies(_, r) => r.is_err(),
            Fetched::Tokens(_, r) => r.is_err(),
            Fetched::TokenCreated(_, r) => r.is_err(),
            Fetched::TokenDeleted(_, r) => r.is_err(),
        }
    }
}

/// Perform `fetch` against the registry.
///
/// Never fails on its own: request errors travel inside the returned
/// [`Fetched`] so they end up in the slot that asked.
pub async fn execute(client: &RegistryClient, fetch: Fetch) -> Fetched {
    debug!(fetch = fetch.label(), "executing fetch");
    match fetch {
        Fetch::Groups(t) => Fetched::Groups(t, client.list_groups().await),
        Fetch::GlobalStats(t) => Fetched::GlobalStats(t, client.global_stats().await),
        Fetch::Group(t, group) => Fetched::Group(t, client.show_group(&group).await),
        Fetch::GroupPackages(t, group) => {
            Fetched::GroupPackages(t, client.list_packages(&group).await)
        }
        Fetch::Search(t, query) => Fetched::Search(t, client.search(&query).await),
        Fetch::Package(t, package) => Fetched::Package(t, client.show_package(&package).await),
        Fetch::Versions(t, package) => Fetched::Versions(t, client.list_versions(&package).await),
        Fetch::Version(t, version) => Fetched::Version(t, client.show_version(&version).await),
        Fetch::Readme(t, version) => Fetched::Readme(t, client.show_readme(&version).await),
        Fetch::DownloadStats(t, version) => {
            Fetched::DownloadStats(t, client.download_stats(&version).await)
        }
        Fetch::Dependencies(t, version) => {
            Fetched::Dependencies(t, client.list_dependencies(&version).await)
        }
        Fetch::Tokens(t) => Fetched::Tokens(t, client.list_tokens().await),
        Fetch::CreateToken(t) => Fetched::TokenCreated(t, client.create_token().await),
        Fetch::DeleteToken(t, id) => Fetched::TokenDeleted(t, client.remove_token(id).await),
    }
}
