//! Version bump policy and release naming.
//!
//! A release version is a `(major, minor)` pair ordered lexicographically.
//! [`next_version`] is total: repositories with no prior release (or whose
//! version lookup failed) are seeded rather than incremented.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A two-component release version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

impl Version {
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Name of the release branch for this version, e.g. `release/2.1`.
    pub fn release_branch(&self) -> String {
        format!("release/{}.{}", self.major, self.minor)
    }

    /// Name of the annotated release tag for this version, e.g. `v2.1`.
    pub fn tag_name(&self) -> String {
        format!("v{}.{}", self.major, self.minor)
    }

    /// Parse a version out of a release-branch ref name.
    ///
    /// Accepts both short (`release/2.1`) and fully-qualified
    /// (`refs/heads/release/2.1`) forms. Returns `None` for anything that
    /// does not match `release/{major}.{minor}` exactly.
    pub fn from_release_branch(name: &str) -> Option<Self> {
        let name = name.strip_prefix("refs/heads/").unwrap_or(name);
        let rest = name.strip_prefix("release/")?;
        let (major, minor) = rest.split_once('.')?;
        let major: u32 = major.parse().ok()?;
        let minor: u32 = minor.parse().ok()?;
        Some(Self { major, minor })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Which version component a release increments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BumpKind {
    Major,
    Minor,
}

/// The version state of a repository going into a release.
///
/// `NoReleases` and `LookupFailed` are both sentinels: the bump policy
/// treats a failed version lookup exactly like a never-released repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurrentVersion {
    Released(Version),
    NoReleases,
    LookupFailed,
}

impl CurrentVersion {
    /// `true` when there is no prior release to diff against.
    pub fn is_sentinel(&self) -> bool {
        !matches!(self, CurrentVersion::Released(_))
    }
}

impl fmt::Display for CurrentVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurrentVersion::Released(v) => write!(f, "{v}"),
            CurrentVersion::NoReleases => write!(f, "no releases"),
            CurrentVersion::LookupFailed => write!(f, "error"),
        }
    }
}

/// Compute the version a release would create.
///
/// Real versions increment one component; sentinels are seeded to `1.0`
/// (major) or `0.1` (minor) regardless of why no version was found.
pub fn next_version(current: &CurrentVersion, bump: BumpKind) -> Version {
    match (current, bump) {
        (CurrentVersion::Released(v), BumpKind::Major) => Version::new(v.major + 1, 0),
        (CurrentVersion::Released(v), BumpKind::Minor) => Version::new(v.major, v.minor + 1),
        (_, BumpKind::Major) => Version::new(1, 0),
        (_, BumpKind::Minor) => Version::new(0, 1),
    }
}
