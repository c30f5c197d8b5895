//! Module package metadata.
//!
//! A [`ModuleManifest`] is the record shipped inside a module package
//! (`manifest.json`); a [`ModuleDescriptor`] is the runtime record kept for
//! an installed module (`meta.json`), which adds the enabled flag. How the
//! package itself is unpacked is out of scope — the packaging collaborator
//! hands these records over.

use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};

use super::{ModuleError, Result};

/// Version of the runtime library, compared against each manifest's
/// compatibility tag.
pub const RUNTIME_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Manifest as declared by the module package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleManifest {
    /// Identifier distinguishing this module from every other one.
    pub id: String,

    /// Module display name.
    pub name: String,

    /// The runtime library version this module was built against.
    #[serde(rename = "library_ver")]
    pub library_version: String,

    pub description: String,

    /// The version of this module.
    pub version: String,

    pub author: String,

    /// Entry-point reference resolved by the module source at load time.
    #[serde(rename = "classpath")]
    pub entry: String,

    /// Archive inside the package holding the module code.
    #[serde(rename = "jar")]
    pub archive: String,

    /// Other modules this one needs, each as `name:version`.
    #[serde(rename = "dependsOn", default)]
    pub dependencies: Vec<String>,

    /// Website link (if any).
    #[serde(default)]
    pub website: Option<String>,
}

impl ModuleManifest {
    /// Parse a manifest from its JSON form.
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ModuleError::InvalidManifest(e.to_string()))
    }

    /// Check the manifest's compatibility tag against this runtime.
    ///
    /// A module is compatible when the running library version satisfies a
    /// caret requirement on the version the module was built against.
    pub fn check_compatibility(&self) -> Result<()> {
        let required = VersionReq::parse(&format!("^{}", self.library_version))
            .map_err(|e| ModuleError::InvalidManifest(e.to_string()))?;
        let current = Version::parse(RUNTIME_VERSION)
            .map_err(|e| ModuleError::InvalidManifest(e.to_string()))?;

        if !required.matches(&current) {
            return Err(ModuleError::IncompatibleRuntime {
                required: self.library_version.clone(),
                current: RUNTIME_VERSION.to_string(),
            });
        }
        Ok(())
    }

    /// Produce the installed-module record.
    pub fn into_descriptor(self, enabled: bool) -> ModuleDescriptor {
        ModuleDescriptor {
            id: self.id,
            name: self.name,
            description: self.description,
            version: self.version,
            author: self.author,
            website: self.website,
            entry: self.entry,
            archive: self.archive,
            enabled,
            dependencies: self.dependencies,
        }
    }
}

/// Immutable record describing one installed module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub author: String,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(rename = "classpath")]
    pub entry: String,
    #[serde(rename = "jarPath")]
    pub archive: String,
    pub enabled: bool,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl ModuleDescriptor {
    /// The `name:version` key dependencies are matched by.
    pub fn key(&self) -> String {
        format!("{}:{}", self.name, self.version)
    }
}
