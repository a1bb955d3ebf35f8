#![allow(missing_docs)]

//! Page state for every route and the navigation that decides what loads.
//!
//! Nothing here performs I/O. Navigation returns [`Fetch`] descriptions;
//! the caller runs them with [`execute`] and feeds each [`Fetched`] back
//! through [`Browser::apply`]. Results may arrive in any order; each slot's
//! generation guard drops the ones that were superseded.

mod fetch;
mod tokens;

pub use fetch::{execute, Fetch, Fetched};
pub use tokens::TokenLedger;

use tracing::{debug, info};

use crate::{
    models::{
        DependencyView, DownloadStatsView, GlobalStatsView, GroupReq, GroupView, PackageReq,
        PackageView, VersionReq, VersionView,
    },
    remote::Remote,
    routes::Route,
    session::SessionState,
};

/// Routes kept for `back`; the oldest are dropped first.
const MAX_HISTORY: usize = 100;

#[derive(Debug, Default)]
pub struct HomePage {
    pub groups: Remote<Vec<GroupReq>>,
    pub stats: Remote<GlobalStatsView>,
    pub selected_group: Option<GroupReq>,
    pub group: Remote<GroupView>,
    pub group_packages: Remote<Vec<PackageReq>>,
}

#[derive(Debug, Default)]
pub struct SearchPage {
    /// Last submitted query, kept across navigation.
    pub query: String,
    pub results: Remote<Vec<PackageReq>>,
}

/// Everything shown for one package.
///
/// Version-scoped slots follow `resolved`: the pinned version, or the
/// package's latest version once its metadata arrived.
#[derive(Debug, Default)]
pub struct PackagePage {
    pub target: Option<(PackageReq, Option<String>)>,
    pub resolved: Option<VersionReq>,
    pub package: Remote<PackageView>,
    pub versions: Remote<Vec<VersionReq>>,
    pub version: Remote<VersionView>,
    pub readme: Remote<String>,
    pub stats: Remote<DownloadStatsView>,
    pub dependencies: Remote<Vec<DependencyView>>,
}

impl PackagePage {
    fn retarget(&mut self, package: &PackageReq, version: &Option<String>) -> bool {
        let target = (package.clone(), version.clone());
        if self.target.as_ref() == Some(&target) {
            return false;
        }
        *self = PackagePage {
            resolved: version.as_ref().map(|v| package.at(v.clone())),
            target: Some(target),
            ..PackagePage::default()
        };
        true
    }

    fn ensure_loaded(&mut self) -> Vec<Fetch> {
        let Some((package, _)) = self.target.clone() else {
            return Vec::new();
        };
        let mut fetches = Vec::new();
        if let Some(t) = self.package.ensure_started() {
            fetches.push(Fetch::Package(t, package.clone()));
        }
        if let Some(t) = self.versions.ensure_started() {
            fetches.push(Fetch::Versions(t, package));
        }
        fetches.extend(self.ensure_version_loaded());
        fetches
    }

    fn ensure_version_loaded(&mut self) -> Vec<Fetch> {
        let Some(version) = self.resolved.clone() else {
            return Vec::new();
        };
        let mut fetches = Vec::new();
        if let Some(t) = self.version.ensure_started() {
            fetches.push(Fetch::Version(t, version.clone()));
        }
        if let Some(t) = self.readme.ensure_started() {
            fetches.push(Fetch::Readme(t, version.clone()));
        }
        if let Some(t) = self.stats.ensure_started() {
            fetches.push(Fetch::DownloadStats(t, version.clone()));
        }
        if let Some(t) = self.dependencies.ensure_started() {
            fetches.push(Fetch::Dependencies(t, version));
        }
        fetches
    }

    fn reload(&mut self) -> Vec<Fetch> {
        let pinned = self.target.as_ref().and_then(|(_, v)| v.clone());
        self.package.reset();
        self.versions.reset();
        self.version.reset();
        self.readme.reset();
        self.stats.reset();
        self.dependencies.reset();
        if pinned.is_none() {
            self.resolved = None;
        }
        self.ensure_loaded()
    }
}

#[derive(Debug, Default)]
pub struct ProfilePage {
    pub tokens: TokenLedger,
}

/// Current route, history and the state of every page.
#[derive(Debug, Default)]
pub struct Browser {
    route: Route,
    history: Vec<Route>,
    user_id: Option<i64>,
    pub home: HomePage,
    pub search: SearchPage,
    pub package: PackagePage,
    pub profile: ProfilePage,
}

impl Browser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn can_go_back(&self) -> bool {
        !self.history.is_empty()
    }

    /// Show `route` and return the requests needed for data not yet asked.
    ///
    /// Navigating to the route already shown records no history and
    /// issues no duplicate requests. History holds at most
    /// [`MAX_HISTORY`] routes and never the same route twice in a row.
    pub fn navigate(&mut self, route: Route) -> Vec<Fetch> {
        if route != self.route {
            info!(from = %self.route, to = %route, "navigate");
            let previous = std::mem::replace(&mut self.route, route);
            if self.history.last() != Some(&previous) {
                self.history.push(previous);
            }
            if self.history.len() > MAX_HISTORY {
                self.history.remove(0);
            }
        }
        self.ensure_loaded()
    }

    /// Return to the previous route, if any.
    pub fn back(&mut self) -> Vec<Fetch> {
        match self.history.pop() {
            Some(previous) => {
                info!(to = %previous, "back");
                self.route = previous;
                self.ensure_loaded()
            }
            None => Vec::new(),
        }
    }

    /// Restart every load of the current page.
    pub fn reload(&mut self) -> Vec<Fetch> {
        debug!(route = %self.route, "reload");
        match &self.route {
            Route::Home => {
                self.home.groups.reset();
                self.home.stats.reset();
                self.home.group.reset();
                self.home.group_packages.reset();
                self.ensure_loaded()
            }
            Route::Search { .. } => {
                self.search.results.reset();
                self.ensure_loaded()
            }
            Route::Package { .. } => self.package.reload(),
            Route::Profile if self.user_id.is_some() => vec![self.profile.tokens.refresh()],
            Route::Profile => Vec::new(),
        }
    }

    /// Load the packages of `group` on the home page.
    pub fn select_group(&mut self, group: GroupReq) -> Vec<Fetch> {
        let home = &mut self.home;
        if home.selected_group.as_ref() == Some(&group) && !home.group_packages.state().is_not_asked() {
            return Vec::new();
        }
        home.selected_group = Some(group.clone());
        vec![
            Fetch::Group(home.group.start(), group.clone()),
            Fetch::GroupPackages(home.group_packages.start(), group),
        ]
    }

    /// Track the session; the profile page only loads for a logged-in user.
    ///
    /// Any change of user, including a switch between two accounts, drops
    /// the previous user's tokens and pending requests.
    pub fn set_session(&mut self, session: &SessionState) -> Vec<Fetch> {
        let user_id = session.user().map(|user| user.id);
        if user_id == self.user_id {
            return Vec::new();
        }
        info!(from = ?self.user_id, to = ?user_id, "session user changed");
        self.user_id = user_id;
        self.profile.tokens.reset();
        match (user_id, &self.route) {
            (Some(_), Route::Profile) => self.ensure_loaded(),
            _ => Vec::new(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    /// Create an access token for the logged-in user.
    pub fn create_token(&mut self) -> Option<Fetch> {
        self.is_authenticated().then(|| self.profile.tokens.create())
    }

    pub fn delete_token(&mut self, token_id: i64) -> Option<Fetch> {
        self.is_authenticated().then(|| self.profile.tokens.delete(token_id))
    }

    fn ensure_loaded(&mut self) -> Vec<Fetch> {
        let mut fetches = Vec::new();
        match &self.route {
            Route::Home => {
                if let Some(t) = self.home.groups.ensure_started() {
                    fetches.push(Fetch::Groups(t));
                }
                if let Some(t) = self.home.stats.ensure_started() {
                    fetches.push(Fetch::GlobalStats(t));
                }
                if let Some(group) = self.home.selected_group.clone() {
                    if let Some(t) = self.home.group.ensure_started() {
                        fetches.push(Fetch::Group(t, group.clone()));
                    }
                    if let Some(t) = self.home.group_packages.ensure_started() {
                        fetches.push(Fetch::GroupPackages(t, group));
                    }
                }
            }
            Route::Search { query } => {
                let query = query.trim().to_string();
                if query != self.search.query {
                    self.search.query = query.clone();
                    self.search.results.reset();
                }
                if !query.is_empty() {
                    if let Some(t) = self.search.results.ensure_started() {
                        fetches.push(Fetch::Search(t, query));
                    }
                }
            }
            Route::Package { package, version } => {
                let (package, version) = (package.clone(), version.clone());
                self.package.retarget(&package, &version);
                fetches.extend(self.package.ensure_loaded());
            }
            Route::Profile => {
                if self.user_id.is_some() {
                    fetches.extend(self.profile.tokens.ensure_loaded());
                }
            }
        }
        fetches
    }

    /// Feed a completed request back into its slot.
    ///
    /// Returns follow-up requests, such as the version-scoped loads once a
    /// package's latest version is known.
    pub fn apply(&mut self, fetched: Fetched) -> Vec<Fetch> {
        if fetched.is_err() {
            debug!(?fetched, "request failed");
        }
        match fetched {
            Fetched::Groups(t, r) => {
                self.home.groups.resolve(t, r);
            }
            Fetched::GlobalStats(t, r) => {
                self.home.stats.resolve(t, r);
            }
            Fetched::Group(t, r) => {
                self.home.group.resolve(t, r);
            }
            Fetched::GroupPackages(t, r) => {
                self.home.group_packages.resolve(t, r);
            }
            Fetched::Search(t, r) => {
                self.search.results.resolve(t, r);
            }
            Fetched::Package(t, r) => {
                let page = &mut self.package;
                if page.package.resolve(t, r) && page.resolved.is_none() {
                    if let Some(latest) = page.package.ready().map(|p| p.latest_version.version_req()) {
                        debug!(version = %latest, "resolved latest version");
                        page.resolved = Some(latest);
                        return page.ensure_version_loaded();
                    }
                }
            }
            Fetched::Versions(t, r) => {
                self.package.versions.resolve(t, r);
            }
            Fetched::Version(t, r) => {
                self.package.version.resolve(t, r);
            }
            Fetched::Readme(t, r) => {
                self.package.readme.resolve(t, r);
            }
            Fetched::DownloadStats(t, r) => {
                self.package.stats.resolve(t, r);
            }
            Fetched::Dependencies(t, r) => {
                self.package.dependencies.resolve(t, r);
            }
            Fetched::Tokens(t, r) => self.profile.tokens.apply_list(t, r),
            Fetched::TokenCreated(t, r) => return self.profile.tokens.apply_created(t, r),
            Fetched::TokenDeleted(t, r) => return self.profile.tokens.apply_deleted(t, r),
        }
        Vec::new()
    }
}
