//! Manifest loading and kind classification.
//!
//! Each component ships as a directory of YAML files, one object per file.
//! Files are read in lexicographic path order, their `kind` is probed, and
//! recognized kinds are decoded into a typed [`Resource`] wrapped in an
//! [`Installer`]. Unknown kinds are skipped. Anything unreadable or
//! undecodable aborts the load.

use crate::error::ControllerError;
use crate::installer::Installer;
use crds::{SecurityContextConstraints, ServiceMonitor};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::{ConfigMap, Pod, Service, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding};
use k8s_openapi::api::scheduling::v1::PriorityClass;
use kube::core::{ApiResource, DynamicObject};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Components in installation order, as `(name, manifest directory)`
pub const COMPONENTS: &[(&str, &str)] = &[
    ("driver", "state-driver"),
    ("container-toolkit", "state-container-toolkit"),
    ("device-plugin", "state-device-plugin"),
    ("device-plugin-validation", "state-device-plugin-validation"),
    ("monitoring", "state-monitoring"),
    ("feature-discovery", "gpu-feature-discovery"),
];

/// Files whose path contains this marker only apply on OpenShift
const OPENSHIFT_MARKER: &str = "openshift";

/// A decoded operand object, tagged by kind
#[derive(Debug, Clone)]
pub enum Resource {
    ServiceAccount(ServiceAccount),
    Role(Role),
    RoleBinding(RoleBinding),
    ClusterRole(ClusterRole),
    ClusterRoleBinding(ClusterRoleBinding),
    ConfigMap(ConfigMap),
    DaemonSet(DaemonSet),
    Deployment(Deployment),
    Pod(Pod),
    Service(Service),
    ServiceMonitor(ServiceMonitor),
    SecurityContextConstraints(SecurityContextConstraints),
    PriorityClass(PriorityClass),
}

macro_rules! with_object {
    ($resource:expr, $obj:ident => $body:expr) => {
        match $resource {
            Resource::ServiceAccount($obj) => $body,
            Resource::Role($obj) => $body,
            Resource::RoleBinding($obj) => $body,
            Resource::ClusterRole($obj) => $body,
            Resource::ClusterRoleBinding($obj) => $body,
            Resource::ConfigMap($obj) => $body,
            Resource::DaemonSet($obj) => $body,
            Resource::Deployment($obj) => $body,
            Resource::Pod($obj) => $body,
            Resource::Service($obj) => $body,
            Resource::ServiceMonitor($obj) => $body,
            Resource::SecurityContextConstraints($obj) => $body,
            Resource::PriorityClass($obj) => $body,
        }
    };
}

impl Resource {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Resource::ServiceAccount(_) => "ServiceAccount",
            Resource::Role(_) => "Role",
            Resource::RoleBinding(_) => "RoleBinding",
            Resource::ClusterRole(_) => "ClusterRole",
            Resource::ClusterRoleBinding(_) => "ClusterRoleBinding",
            Resource::ConfigMap(_) => "ConfigMap",
            Resource::DaemonSet(_) => "DaemonSet",
            Resource::Deployment(_) => "Deployment",
            Resource::Pod(_) => "Pod",
            Resource::Service(_) => "Service",
            Resource::ServiceMonitor(_) => "ServiceMonitor",
            Resource::SecurityContextConstraints(_) => "SecurityContextConstraints",
            Resource::PriorityClass(_) => "PriorityClass",
        }
    }

    /// `metadata.name`, empty when the manifest omits it
    #[must_use]
    pub fn name(&self) -> &str {
        with_object!(self, o => o.metadata.name.as_deref().unwrap_or_default())
    }

    /// Namespace declared in the manifest itself
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        with_object!(self, o => o.metadata.namespace.as_deref())
    }

    #[must_use]
    pub fn is_namespaced(&self) -> bool {
        !matches!(
            self,
            Resource::ClusterRole(_)
                | Resource::ClusterRoleBinding(_)
                | Resource::SecurityContextConstraints(_)
                | Resource::PriorityClass(_)
        )
    }

    #[must_use]
    pub fn api_resource(&self) -> ApiResource {
        match self {
            Resource::ServiceAccount(_) => ApiResource::erase::<ServiceAccount>(&()),
            Resource::Role(_) => ApiResource::erase::<Role>(&()),
            Resource::RoleBinding(_) => ApiResource::erase::<RoleBinding>(&()),
            Resource::ClusterRole(_) => ApiResource::erase::<ClusterRole>(&()),
            Resource::ClusterRoleBinding(_) => ApiResource::erase::<ClusterRoleBinding>(&()),
            Resource::ConfigMap(_) => ApiResource::erase::<ConfigMap>(&()),
            Resource::DaemonSet(_) => ApiResource::erase::<DaemonSet>(&()),
            Resource::Deployment(_) => ApiResource::erase::<Deployment>(&()),
            Resource::Pod(_) => ApiResource::erase::<Pod>(&()),
            Resource::Service(_) => ApiResource::erase::<Service>(&()),
            Resource::ServiceMonitor(_) => ApiResource::erase::<ServiceMonitor>(&()),
            Resource::SecurityContextConstraints(_) => SecurityContextConstraints::api_resource(),
            Resource::PriorityClass(_) => ApiResource::erase::<PriorityClass>(&()),
        }
    }

    /// Untyped copy of the object, as sent with server-side apply
    pub fn to_dynamic(&self) -> Result<DynamicObject, serde_json::Error> {
        let value = with_object!(self, o => serde_json::to_value(o))?;
        serde_json::from_value(value)
    }
}

type Decoder = fn(&str) -> Result<Resource, serde_yaml::Error>;

/// Kind registry: maps a manifest's declared kind to its typed decoder
const DECODERS: &[(&str, Decoder)] = &[
    ("ServiceAccount", |s| serde_yaml::from_str(s).map(Resource::ServiceAccount)),
    ("Role", |s| serde_yaml::from_str(s).map(Resource::Role)),
    ("RoleBinding", |s| serde_yaml::from_str(s).map(Resource::RoleBinding)),
    ("ClusterRole", |s| serde_yaml::from_str(s).map(Resource::ClusterRole)),
    ("ClusterRoleBinding", |s| serde_yaml::from_str(s).map(Resource::ClusterRoleBinding)),
    ("ConfigMap", |s| serde_yaml::from_str(s).map(Resource::ConfigMap)),
    ("DaemonSet", |s| serde_yaml::from_str(s).map(Resource::DaemonSet)),
    ("Deployment", |s| serde_yaml::from_str(s).map(Resource::Deployment)),
    ("Pod", |s| serde_yaml::from_str(s).map(Resource::Pod)),
    ("Service", |s| serde_yaml::from_str(s).map(Resource::Service)),
    ("ServiceMonitor", |s| serde_yaml::from_str(s).map(Resource::ServiceMonitor)),
    ("SecurityContextConstraints", |s| serde_yaml::from_str(s).map(Resource::SecurityContextConstraints)),
    ("PriorityClass", |s| serde_yaml::from_str(s).map(Resource::PriorityClass)),
];

fn decoder_for(kind: &str) -> Option<Decoder> {
    DECODERS.iter().find(|(k, _)| *k == kind).map(|(_, decode)| *decode)
}

#[derive(Deserialize)]
struct KindProbe {
    #[serde(default)]
    kind: String,
}

/// One installation stage and the installers it runs, in order
#[derive(Debug, Clone)]
pub struct Component {
    pub name: String,
    installers: Vec<Installer>,
}

impl Component {
    #[must_use]
    pub fn new(name: impl Into<String>, installers: Vec<Installer>) -> Self {
        Self {
            name: name.into(),
            installers,
        }
    }

    /// Load a component from its manifest directory
    pub fn load(name: &str, dir: &Path, openshift: Option<&str>) -> Result<Self, ControllerError> {
        Ok(Self::new(name, load_component(dir, openshift)?))
    }

    #[must_use]
    pub fn installers(&self) -> &[Installer] {
        &self.installers
    }

    /// Decoded snapshot of every object in the component
    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.installers.iter().map(|i| &i.resource)
    }
}

/// Read every manifest under `dir` and build its installers.
///
/// `openshift` is the detected OpenShift version; without one, files whose
/// path mentions openshift are skipped.
pub fn load_component(dir: &Path, openshift: Option<&str>) -> Result<Vec<Installer>, ControllerError> {
    info!("Getting assets from {}", dir.display());

    let mut installers = Vec::new();
    for path in manifest_files(dir)? {
        if openshift.is_none() && path.to_string_lossy().contains(OPENSHIFT_MARKER) {
            debug!("Skipping {} (OpenShift only)", path.display());
            continue;
        }

        let content = fs::read_to_string(&path)
            .map_err(|e| ControllerError::Manifest(format!("failed to read {}: {}", path.display(), e)))?;
        if is_blank(&content) {
            debug!("Skipping empty manifest {}", path.display());
            continue;
        }

        let probe: KindProbe = serde_yaml::from_str(&content)
            .map_err(|e| ControllerError::Manifest(format!("{} is not a YAML object: {}", path.display(), e)))?;

        let Some(decode) = decoder_for(&probe.kind) else {
            warn!("Unknown resource kind {:?} in {}, skipping", probe.kind, path.display());
            continue;
        };

        let resource = decode(&content).map_err(|e| {
            ControllerError::Manifest(format!("failed to decode {} from {}: {}", probe.kind, path.display(), e))
        })?;
        debug!("Loaded {} {} from {}", resource.kind(), resource.name(), path.display());
        installers.push(Installer::new(path, resource));
    }

    Ok(installers)
}

/// Regular files under `dir`, recursively, sorted by full path
fn manifest_files(dir: &Path) -> Result<Vec<PathBuf>, ControllerError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry
            .map_err(|e| ControllerError::Manifest(format!("failed to walk {}: {}", dir.display(), e)))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    files.sort_by_cached_key(|p| p.to_string_lossy().into_owned());
    Ok(files)
}

fn is_blank(content: &str) -> bool {
    content
        .lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with('#') || line == "---")
}
