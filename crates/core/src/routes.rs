//! Addressable screens.
//!
//! A route only decides which data a screen loads; it carries no view state.

use std::fmt;

use url::form_urlencoded;

use crate::models::{is_valid_name, PackageReq, VersionReq};

/// One screen of the browser.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    /// `/`
    Home,
    /// `/search?q=<query>`
    Search {
        /// Raw search text.
        query: String,
    },
    /// `/package/<group>/<package>[/<version>]`
    Package {
        /// Package being shown.
        package: PackageReq,
        /// Pinned version. `None` means the latest one.
        version: Option<String>,
    },
    /// `/profile`
    Profile,
}

impl Default for Route {
    fn default() -> Self {
        Route::Home
    }
}

impl Route {
    /// Search route for `query`.
    pub fn search(query: impl Into<String>) -> Self {
        Route::Search {
            query: query.into(),
        }
    }

    /// Package route at its latest version.
    pub fn package(package: PackageReq) -> Self {
        Route::Package {
            package,
            version: None,
        }
    }

    /// Package route pinned to a version.
    pub fn version(version: &VersionReq) -> Self {
        Route::Package {
            package: version.package_req(),
            version: Some(version.version.clone()),
        }
    }

    /// Parse a path. Anything unrecognised falls back to [`Route::Home`].
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        let (path, query) = match input.split_once('?') {
            Some((path, query)) => (path, query),
            None => (input, ""),
        };
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        match segments.as_slice() {
            [] => Route::Home,
            ["search"] => {
                let query = form_urlencoded::parse(query.as_bytes())
                    .find(|(key, _)| key == "q")
                    .map(|(_, value)| value.into_owned())
                    .unwrap_or_default();
                Route::Search { query }
            }
            ["package", group, package] if is_valid_name(group) && is_valid_name(package) => {
                Route::package(PackageReq::new(*group, *package))
            }
            ["package", group, package, version]
                if is_valid_name(group) && is_valid_name(package) && is_valid_name(version) =>
            {
                Route::Package {
                    package: PackageReq::new(*group, *package),
                    version: Some(version.to_string()),
                }
            }
            ["profile"] => Route::Profile,
            _ => Route::Home,
        }
    }

    /// Canonical path; `Route::parse(&r.to_path()) == r`.
    pub fn to_path(&self) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::Search { query } => {
                let encoded: String = form_urlencoded::Serializer::new(String::new())
                    .append_pair("q", query)
                    .finish();
                format!("/search?{encoded}")
            }
            Route::Package {
                package,
                version: None,
            } => format!("/package/{}/{}", package.group, package.package),
            Route::Package {
                package,
                version: Some(version),
            } => format!("/package/{}/{}/{version}", package.group, package.package),
            Route::Profile => "/profile".to_string(),
        }
    }

    /// Short title for the header line.
    pub fn title(&self) -> String {
        match self {
            Route::Home => "Home".to_string(),
            Route::Search { query } => format!("Search: {query}"),
            Route::Package {
                package,
                version: None,
            } => package.to_string(),
            Route::Package {
                package,
                version: Some(version),
            } => format!("{package}@{version}"),
            Route::Profile => "Profile".to_string(),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_path())
    }
}
