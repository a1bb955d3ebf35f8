//! Registry records as returned by the HTTP API.
//!
//! These mirror server responses one-to-one and are never mutated on the
//! client.

#![allow(missing_docs)]

mod timestamp;

use std::fmt;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Public profile of a registry user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserView {
    /// Registry user id.
    pub id: i64,
    /// Display name (the GitHub login).
    pub name: String,
    /// Contact address, when the user shared one.
    #[serde(default)]
    pub email: Option<String>,
    /// Avatar URL.
    #[serde(default)]
    pub avatar: Option<String>,
}

/// An access token belonging to the logged-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenView {
    /// Token id used for deletion.
    pub id: i64,
    /// Full secret. Only present in the response that created the token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Redacted form safe to show at any time.
    pub token_partial: String,
    /// Creation timestamp.
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl AccessTokenView {
    /// Copy of this entry with the one-time secret removed.
    pub fn redacted(mut self) -> Self {
        self.token = None;
        self
    }
}

/// Identifies a package group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupReq {
    pub group: String,
}

/// Group metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupView {
    pub group: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Identifies a package within a group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageReq {
    pub group: String,
    pub package: String,
}

/// Identifies one published version of a package.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionReq {
    pub group: String,
    pub package: String,
    pub version: String,
}

/// Package metadata with its latest version inlined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageView {
    pub group: String,
    pub package: String,
    pub latest_version: VersionView,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Metadata of a single version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionView {
    pub group: String,
    pub package: String,
    pub version: String,
    #[serde(default)]
    pub yanked: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
    #[serde(default)]
    pub repository: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub owners: Vec<UserView>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

/// A dependency declared by a version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyView {
    pub group: String,
    pub package: String,
    pub version_req: String,
}

/// Download counters for a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadStatsView {
    pub total: u64,
    /// Downloads during the current season (recent window).
    pub season: u64,
}

/// Registry-wide counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalStatsView {
    pub package_count: u64,
    pub download_count: u64,
}

const NAME_SEGMENT: &str = r"[A-Za-z0-9_.\-]+";

static PACKAGE_REF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^\s*({NAME_SEGMENT})/({NAME_SEGMENT})(?:@({NAME_SEGMENT}))?\s*$"
    ))
    .expect("failed to compile package reference regex")
});

static NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!("^{NAME_SEGMENT}$")).expect("failed to compile name regex")
});

/// Whether `segment` is a valid group, package or version name.
pub fn is_valid_name(segment: &str) -> bool {
    NAME_RE.is_match(segment)
}

impl PackageReq {
    pub fn new(group: impl Into<String>, package: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            package: package.into(),
        }
    }

    /// Parse `group/package`.
    pub fn parse(input: &str) -> Option<Self> {
        let caps = PACKAGE_REF_RE.captures(input)?;
        if caps.get(3).is_some() {
            return None;
        }
        Some(Self::new(&caps[1], &caps[2]))
    }

    /// The same package pinned at `version`.
    pub fn at(&self, version: impl Into<String>) -> VersionReq {
        VersionReq {
            group: self.group.clone(),
            package: self.package.clone(),
            version: version.into(),
        }
    }
}

impl fmt::Display for PackageReq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.package)
    }
}

impl VersionReq {
    /// Parse `group/package@version`.
    pub fn parse(input: &str) -> Option<Self> {
        let caps = PACKAGE_REF_RE.captures(input)?;
        let version = caps.get(3)?;
        Some(Self {
            group: caps[1].to_string(),
            package: caps[2].to_string(),
            version: version.as_str().to_string(),
        })
    }

    /// The package this version belongs to.
    pub fn package_req(&self) -> PackageReq {
        PackageReq::new(&self.group, &self.package)
    }
}

impl fmt::Display for VersionReq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.group, self.package, self.version)
    }
}

impl VersionView {
    pub fn version_req(&self) -> VersionReq {
        VersionReq {
            group: self.group.clone(),
            package: self.package.clone(),
            version: self.version.clone(),
        }
    }
}

const TIMEAGO_UNITS: [(&str, f64); 7] = [
    ("second", 60.0),
    ("minute", 60.0),
    ("hour", 24.0),
    ("day", 7.0),
    ("week", 4.35),
    ("month", 12.0),
    ("year", 10000.0),
];

/// Coarse relative age, e.g. `3 days` or `1 hour`.
pub fn timeago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let mut remaining = (now - then).num_seconds().max(0) as f64;
    for (unit, span) in TIMEAGO_UNITS {
        let count = (remaining % span).floor() as u64;
        remaining = (remaining / span).floor();
        if remaining == 0.0 {
            return if count == 1 {
                format!("{count} {unit}")
            } else {
                format!("{count} {unit}s")
            };
        }
    }
    "a long time".to_string()
}
