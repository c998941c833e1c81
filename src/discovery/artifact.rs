//! Artifact and behavior-kind types.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::RootConfig;

/// Matching semantics a rule provider applies to an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum BehaviorKind {
    #[serde(rename = "domain")]
    Domain,
    #[serde(rename = "ipcidr")]
    IpCidr,
}

impl BehaviorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BehaviorKind::Domain => "domain",
            BehaviorKind::IpCidr => "ipcidr",
        }
    }
}

impl fmt::Display for BehaviorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A compiled rule-set file under test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub path: PathBuf,
    pub behavior: BehaviorKind,
}

impl Artifact {
    pub fn new(path: impl Into<PathBuf>, behavior: BehaviorKind) -> Self {
        Self {
            path: path.into(),
            behavior,
        }
    }
}

/// A discovery root tagged with the behavior kind of everything beneath it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleRoot {
    pub path: PathBuf,
    pub behavior: BehaviorKind,
}

/// The set of configured roots, used to classify artifact paths.
#[derive(Debug, Clone, Default)]
pub struct RuleRoots {
    roots: Vec<RuleRoot>,
}

impl RuleRoots {
    pub fn new(roots: Vec<RuleRoot>) -> Self {
        Self { roots }
    }

    /// Build roots from config, resolving relative paths against `base`.
    pub fn from_config(configs: &[RootConfig], base: &Path) -> Self {
        Self::new(
            configs
                .iter()
                .map(|c| RuleRoot {
                    path: if c.path.is_absolute() {
                        c.path.clone()
                    } else {
                        base.join(&c.path)
                    },
                    behavior: c.behavior,
                })
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = &RuleRoot> {
        self.roots.iter()
    }

    /// Behavior kind of `path`, taken from the deepest root that contains it.
    ///
    /// Matching is component-wise, so `geo/geosite-extra` is not under `geo/geosite`.
    pub fn classify(&self, path: &Path) -> Option<BehaviorKind> {
        self.roots
            .iter()
            .filter(|root| path.starts_with(&root.path))
            .max_by_key(|root| root.path.components().count())
            .map(|root| root.behavior)
    }
}
