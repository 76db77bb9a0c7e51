//! Cluster API component catalogue
//!
//! Maps each component of the management stack to its release manifest URL
//! and the namespace its controllers land in. Pure string construction; no
//! network access happens here.

use std::fmt;
use std::time::Duration;

use crate::error::Error;
use crate::Result;

/// Pinned cert-manager release applied before any CAPI component
const CERT_MANAGER_MANIFEST_URL: &str =
    "https://github.com/jetstack/cert-manager/releases/download/v1.0.2/cert-manager.yaml";

/// Components of the management stack, in install order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    /// cert-manager, required by the CAPI webhook stack
    CertManager,
    /// Core Cluster API controllers
    CapiCore,
    /// kubeadm bootstrap provider
    BootstrapKubeadm,
    /// kubeadm control-plane provider
    ControlPlaneKubeadm,
    /// Optional infrastructure provider (aws, gcp, packet, vsphere, ...)
    Infrastructure,
}

impl Component {
    /// Namespace the component's controllers are deployed into
    ///
    /// Infrastructure providers choose their own namespace, so none is
    /// reported for them. Used for progress logging only.
    pub fn namespace(self) -> Option<&'static str> {
        match self {
            Component::CertManager => Some("cert-manager"),
            Component::CapiCore => Some("capi-system"),
            Component::BootstrapKubeadm => Some("capi-kubeadm-bootstrap-system"),
            Component::ControlPlaneKubeadm => Some("capi-kubeadm-control-plane-system"),
            Component::Infrastructure => None,
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::CertManager => write!(f, "cert-manager"),
            Component::CapiCore => write!(f, "cluster-api"),
            Component::BootstrapKubeadm => write!(f, "bootstrap-kubeadm"),
            Component::ControlPlaneKubeadm => write!(f, "control-plane-kubeadm"),
            Component::Infrastructure => write!(f, "infrastructure"),
        }
    }
}

/// One stage of the provisioning sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentSpec {
    /// Which component this stage installs
    pub component: Component,
    /// Release manifest applied to the cluster
    pub manifest_url: String,
    /// Fixed settle delay after a successful apply
    pub wait_after_apply: Duration,
}

/// Build the release manifest URL for a component.
///
/// cert-manager is pinned and ignores the version argument entirely. All
/// other components require a non-empty version; infrastructure additionally
/// requires the provider name.
pub fn manifest_url(component: Component, version: &str, provider: Option<&str>) -> Result<String> {
    match component {
        Component::CertManager => Ok(CERT_MANAGER_MANIFEST_URL.to_string()),
        Component::CapiCore => capi_release_url(component, version, "cluster-api-components"),
        Component::BootstrapKubeadm => capi_release_url(component, version, "bootstrap-components"),
        Component::ControlPlaneKubeadm => {
            capi_release_url(component, version, "control-plane-components")
        }
        Component::Infrastructure => {
            let provider = provider.filter(|p| !p.is_empty()).ok_or_else(|| {
                Error::invalid_component(component, "an infrastructure provider name is required")
            })?;
            if version.is_empty() {
                return Err(Error::invalid_component(component, "a provider version is required"));
            }
            Ok(format!(
                "https://github.com/kubernetes-sigs/cluster-api-provider-{provider}/releases/download/{version}/infrastructure-components.yaml"
            ))
        }
    }
}

/// Build a cluster-api release download URL for the given artifact
fn capi_release_url(component: Component, version: &str, artifact: &str) -> Result<String> {
    if version.is_empty() {
        return Err(Error::invalid_component(component, "a version is required"));
    }
    Ok(format!(
        "https://github.com/kubernetes-sigs/cluster-api/releases/download/{version}/{artifact}.yaml"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cert_manager_url_ignores_version() {
        let pinned = manifest_url(Component::CertManager, "", None).unwrap();
        let versioned = manifest_url(Component::CertManager, "v9.9.9", None).unwrap();
        assert_eq!(pinned, versioned);
        assert_eq!(pinned, CERT_MANAGER_MANIFEST_URL);
    }

    #[test]
    fn core_url_contains_version_and_artifact() {
        let url = manifest_url(Component::CapiCore, "v1.2.3", None).unwrap();
        assert!(url.contains("v1.2.3"));
        assert!(url.contains("cluster-api-components"));
    }

    #[test]
    fn kubeadm_provider_urls_use_their_artifacts() {
        let bootstrap = manifest_url(Component::BootstrapKubeadm, "v1.2.3", None).unwrap();
        let control_plane = manifest_url(Component::ControlPlaneKubeadm, "v1.2.3", None).unwrap();
        assert_eq!(
            bootstrap,
            "https://github.com/kubernetes-sigs/cluster-api/releases/download/v1.2.3/bootstrap-components.yaml"
        );
        assert_eq!(
            control_plane,
            "https://github.com/kubernetes-sigs/cluster-api/releases/download/v1.2.3/control-plane-components.yaml"
        );
    }

    #[test]
    fn infrastructure_url_embeds_provider_and_version() {
        let url = manifest_url(Component::Infrastructure, "v0.5.0", Some("aws")).unwrap();
        assert_eq!(
            url,
            "https://github.com/kubernetes-sigs/cluster-api-provider-aws/releases/download/v0.5.0/infrastructure-components.yaml"
        );
    }

    #[test]
    fn versioned_components_reject_empty_version() {
        for component in [
            Component::CapiCore,
            Component::BootstrapKubeadm,
            Component::ControlPlaneKubeadm,
        ] {
            let err = manifest_url(component, "", None).unwrap_err();
            assert_eq!(err.component(), Some(component));
        }

        let err = manifest_url(Component::Infrastructure, "", Some("aws")).unwrap_err();
        assert_eq!(err.component(), Some(Component::Infrastructure));
    }

    #[test]
    fn infrastructure_rejects_missing_provider() {
        assert!(manifest_url(Component::Infrastructure, "v0.5.0", None).is_err());
        assert!(manifest_url(Component::Infrastructure, "v0.5.0", Some("")).is_err());
    }

    #[test]
    fn namespaces_map_to_capi_conventions() {
        assert_eq!(Component::CapiCore.namespace(), Some("capi-system"));
        assert_eq!(
            Component::BootstrapKubeadm.namespace(),
            Some("capi-kubeadm-bootstrap-system")
        );
        assert_eq!(
            Component::ControlPlaneKubeadm.namespace(),
            Some("capi-kubeadm-control-plane-system")
        );
        assert_eq!(Component::Infrastructure.namespace(), None);
    }
}
