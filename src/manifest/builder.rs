//! Offline manifest generation from remote build outputs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::defaults::REMOTE_ENTRY_FILE;
use crate::manifest::{ManifestEntry, RemoteDescriptor, RemoteManifest, VersionEntries};

/// Description of one remote's versioned builds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteBuild {
    /// Remote name, also used as its container scope
    pub name: String,
    /// Origin the versioned build directories are served from
    pub base_url: String,
    /// Built versions, oldest first; the last one becomes active
    pub versions: Vec<String>,
    /// Component name -> exposed module path
    pub exposes: BTreeMap<String, String>,
}

impl RemoteBuild {
    /// Remote entry location of one built version.
    pub fn entry_url(&self, version: &str) -> String {
        format!(
            "{}/v{}/{}",
            self.base_url.trim_end_matches('/'),
            version,
            REMOTE_ENTRY_FILE
        )
    }
}

/// Generate the manifest document for a set of remote builds.
///
/// Remotes without any built version are skipped.
pub fn build_manifest(builds: &[RemoteBuild]) -> RemoteManifest {
    let mut manifest = RemoteManifest::default();

    for build in builds {
        let Some(active) = build.versions.last() else {
            log::warn!("Remote '{}' has no built versions, skipping", build.name);
            continue;
        };

        let versions = build
            .versions
            .iter()
            .map(|version| {
                let url = build.entry_url(version);
                let entries: VersionEntries = build
                    .exposes
                    .iter()
                    .map(|(component, module_path)| {
                        let entry = ManifestEntry {
                            url: url.clone(),
                            scope: build.name.clone(),
                            module_path: module_path.clone(),
                            version: version.clone(),
                            integrity: None,
                        };
                        (component.clone(), entry)
                    })
                    .collect();
                (version.clone(), entries)
            })
            .collect();

        manifest.insert(
            build.name.clone(),
            RemoteDescriptor {
                active_version: active.clone(),
                versions,
            },
        );
    }

    manifest
}
