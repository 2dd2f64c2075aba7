//! kubesnap core: the document model, the sanitize pipeline and the
//! destination path policy. No kube or I/O dependencies live here.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

pub mod paths;
pub mod pipeline;

/// A served resource type, as reported by API discovery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TypeRef {
    pub group: String,
    pub version: String,
    pub kind: String,
    /// Plural resource name, e.g. "deployments". Doubles as the directory
    /// name in the exported tree.
    pub plural: String,
    pub namespaced: bool,
}

impl TypeRef {
    /// The `apiVersion` wire form: `v1` for the core group, `group/version`
    /// otherwise.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}
