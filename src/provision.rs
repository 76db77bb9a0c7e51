//! Provisioning orchestrator
//!
//! Drives the fixed sequence cert-manager → CAPI core → bootstrap-kubeadm →
//! control-plane-kubeadm → optional infrastructure provider. Each stage
//! blocks until its apply completes, then sleeps a fixed settle delay before
//! the next stage begins. The delays are a deliberate policy, not readiness
//! checks: nothing polls the cluster for the component to actually come up.
//!
//! The first failure halts the run. Earlier stages remain applied on the
//! cluster; nothing is rolled back and nothing is retried.

use std::time::Duration;

use tracing::info;

use crate::apply::ManifestApplier;
use crate::component::{manifest_url, Component, ComponentSpec};
use crate::credentials::{substitutions_for, SubstitutionRule};
use crate::Result;

/// Settle delay after applying cert-manager (its webhooks must be up before
/// any CAPI component is applied)
const CERT_MANAGER_WAIT: Duration = Duration::from_secs(50);

/// Settle delay after applying each CAPI component
const COMPONENT_WAIT: Duration = Duration::from_secs(10);

/// Immutable input for a single provisioning run
#[derive(Debug, Clone, Default)]
pub struct ProvisionRequest {
    /// CAPI release applied for the core, bootstrap, and control-plane components
    pub capi_version: String,
    /// Infrastructure provider id (aws, gcp, packet, vsphere, ...)
    pub infra_provider: Option<String>,
    /// Infrastructure provider release; the provider stage runs only when
    /// both this and `infra_provider` are set
    pub infra_provider_version: Option<String>,
    /// Credential value substituted into the infrastructure manifest
    pub secret: Option<String>,
    /// vsphere username, used only when the provider is vsphere
    pub username: Option<String>,
    /// vsphere password, used only when the provider is vsphere
    pub password: Option<String>,
}

impl ProvisionRequest {
    /// Derive the ordered stage list for this request.
    ///
    /// Always four stages for the CAPI stack; an infrastructure stage is
    /// appended only when both the provider id and its version are present.
    pub fn stages(&self) -> Result<Vec<ComponentSpec>> {
        let version = &self.capi_version;

        let mut stages = vec![
            ComponentSpec {
                component: Component::CertManager,
                manifest_url: manifest_url(Component::CertManager, version, None)?,
                wait_after_apply: CERT_MANAGER_WAIT,
            },
            ComponentSpec {
                component: Component::CapiCore,
                manifest_url: manifest_url(Component::CapiCore, version, None)?,
                wait_after_apply: COMPONENT_WAIT,
            },
            ComponentSpec {
                component: Component::BootstrapKubeadm,
                manifest_url: manifest_url(Component::BootstrapKubeadm, version, None)?,
                wait_after_apply: COMPONENT_WAIT,
            },
            ComponentSpec {
                component: Component::ControlPlaneKubeadm,
                manifest_url: manifest_url(Component::ControlPlaneKubeadm, version, None)?,
                wait_after_apply: COMPONENT_WAIT,
            },
        ];

        if let (Some(provider), Some(provider_version)) =
            (self.provider(), self.provider_version())
        {
            stages.push(ComponentSpec {
                component: Component::Infrastructure,
                manifest_url: manifest_url(
                    Component::Infrastructure,
                    provider_version,
                    Some(provider),
                )?,
                wait_after_apply: Duration::ZERO,
            });
        }

        Ok(stages)
    }

    /// Substitution rules for the infrastructure stage of this request
    fn substitutions(&self) -> Vec<SubstitutionRule> {
        match self.provider() {
            Some(provider) => substitutions_for(
                provider,
                self.secret.as_deref(),
                self.username.as_deref(),
                self.password.as_deref(),
            ),
            None => Vec::new(),
        }
    }

    fn provider(&self) -> Option<&str> {
        self.infra_provider.as_deref().filter(|p| !p.is_empty())
    }

    fn provider_version(&self) -> Option<&str> {
        self.infra_provider_version
            .as_deref()
            .filter(|v| !v.is_empty())
    }
}

/// Sequences the component applies for one provisioning run
pub struct Provisioner<A> {
    applier: A,
}

impl<A: ManifestApplier> Provisioner<A> {
    /// Create a provisioner backed by the given applier
    pub fn new(applier: A) -> Self {
        Self { applier }
    }

    /// Run the provisioning sequence to completion or first failure.
    pub async fn run(&self, request: &ProvisionRequest) -> Result<()> {
        let stages = request.stages()?;

        for spec in &stages {
            let substitutions = if spec.component == Component::Infrastructure {
                request.substitutions()
            } else {
                Vec::new()
            };

            match spec.component.namespace() {
                Some(namespace) => info!(
                    component = %spec.component,
                    namespace,
                    url = %spec.manifest_url,
                    "Installing component"
                ),
                None => info!(
                    component = %spec.component,
                    url = %spec.manifest_url,
                    "Installing component"
                ),
            }

            self.applier.apply(spec, &substitutions).await?;

            if !spec.wait_after_apply.is_zero() {
                info!(
                    component = %spec.component,
                    wait_secs = spec.wait_after_apply.as_secs(),
                    "Waiting for component to become available"
                );
                tokio::time::sleep(spec.wait_after_apply).await;
            }
        }

        info!(stages = stages.len(), "Cluster API stack installed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::MockManifestApplier;
    use crate::error::Error;
    use mockall::Sequence;

    fn core_request() -> ProvisionRequest {
        ProvisionRequest {
            capi_version: "v1.2.3".to_string(),
            ..Default::default()
        }
    }

    fn aws_request() -> ProvisionRequest {
        ProvisionRequest {
            capi_version: "v1.2.3".to_string(),
            infra_provider: Some("aws".to_string()),
            infra_provider_version: Some("v0.5.0".to_string()),
            secret: Some("QUJD".to_string()),
            ..Default::default()
        }
    }

    // ==========================================================================
    // Stage planning
    // ==========================================================================

    #[test]
    fn plan_without_provider_has_four_stages() {
        let stages = core_request().stages().expect("plan should succeed");

        let components: Vec<Component> = stages.iter().map(|s| s.component).collect();
        assert_eq!(
            components,
            vec![
                Component::CertManager,
                Component::CapiCore,
                Component::BootstrapKubeadm,
                Component::ControlPlaneKubeadm,
            ]
        );

        let waits_ms: Vec<u128> = stages.iter().map(|s| s.wait_after_apply.as_millis()).collect();
        assert_eq!(waits_ms, vec![50000, 10000, 10000, 10000]);
    }

    #[test]
    fn plan_with_provider_appends_infrastructure_stage() {
        let stages = aws_request().stages().expect("plan should succeed");

        assert_eq!(stages.len(), 5);
        let infra = &stages[4];
        assert_eq!(infra.component, Component::Infrastructure);
        assert!(infra.manifest_url.contains("cluster-api-provider-aws"));
        assert!(infra.manifest_url.contains("v0.5.0"));
        assert!(infra.wait_after_apply.is_zero());
    }

    #[test]
    fn plan_skips_infrastructure_without_provider_version() {
        let mut request = aws_request();
        request.infra_provider_version = None;
        assert_eq!(request.stages().expect("plan should succeed").len(), 4);

        let mut request = aws_request();
        request.infra_provider = Some(String::new());
        assert_eq!(request.stages().expect("plan should succeed").len(), 4);
    }

    #[test]
    fn plan_rejects_empty_capi_version() {
        let request = ProvisionRequest::default();
        let err = request.stages().expect_err("empty version must not plan");
        assert_eq!(err.component(), Some(Component::CapiCore));
    }

    // ==========================================================================
    // Orchestration
    // ==========================================================================

    /// Story: a request without an infrastructure provider drives exactly the
    /// four CAPI stages, in order, with no substitutions anywhere.
    #[tokio::test(start_paused = true)]
    async fn run_applies_capi_stack_in_order() {
        let mut applier = MockManifestApplier::new();
        let mut seq = Sequence::new();

        for component in [
            Component::CertManager,
            Component::CapiCore,
            Component::BootstrapKubeadm,
            Component::ControlPlaneKubeadm,
        ] {
            applier
                .expect_apply()
                .withf(move |spec, subs| spec.component == component && subs.is_empty())
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_, _| Ok(()));
        }

        Provisioner::new(applier)
            .run(&core_request())
            .await
            .expect("run should succeed");
    }

    /// Story: an aws request adds an infrastructure stage whose manifest is
    /// rewritten with the documented credential placeholder before apply.
    #[tokio::test(start_paused = true)]
    async fn run_rewrites_infrastructure_manifest() {
        let mut applier = MockManifestApplier::new();
        let mut seq = Sequence::new();

        for component in [
            Component::CertManager,
            Component::CapiCore,
            Component::BootstrapKubeadm,
            Component::ControlPlaneKubeadm,
        ] {
            applier
                .expect_apply()
                .withf(move |spec, subs| spec.component == component && subs.is_empty())
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_, _| Ok(()));
        }

        applier
            .expect_apply()
            .withf(|spec, subs| {
                spec.component == Component::Infrastructure
                    && subs.len() == 1
                    && subs[0] == SubstitutionRule::new("${AWS_B64ENCODED_CREDENTIALS}", "QUJD")
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        Provisioner::new(applier)
            .run(&aws_request())
            .await
            .expect("run should succeed");
    }

    /// Story: a failing bootstrap-kubeadm apply halts the run. The
    /// control-plane and infrastructure stages are never invoked.
    #[tokio::test(start_paused = true)]
    async fn run_halts_at_first_failure() {
        let mut applier = MockManifestApplier::new();
        let mut seq = Sequence::new();

        for component in [Component::CertManager, Component::CapiCore] {
            applier
                .expect_apply()
                .withf(move |spec, _| spec.component == component)
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_, _| Ok(()));
        }

        applier
            .expect_apply()
            .withf(|spec, _| spec.component == Component::BootstrapKubeadm)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|spec, _| Err(Error::apply_failed(spec.component, "server unreachable")));

        // No expectations exist past the failing stage; a later apply would
        // panic the mock and fail this test.

        let err = Provisioner::new(applier)
            .run(&aws_request())
            .await
            .expect_err("run must halt on failure");
        assert_eq!(err.component(), Some(Component::BootstrapKubeadm));
        assert!(err.to_string().contains("server unreachable"));
    }

    /// Story: vsphere with only one of the two aux credentials applies the
    /// infrastructure manifest unmodified instead of erroring.
    #[tokio::test(start_paused = true)]
    async fn run_applies_vsphere_unmodified_on_partial_credentials() {
        let request = ProvisionRequest {
            capi_version: "v1.2.3".to_string(),
            infra_provider: Some("vsphere".to_string()),
            infra_provider_version: Some("v0.7.0".to_string()),
            secret: Some("secret".to_string()),
            username: Some("admin".to_string()),
            ..Default::default()
        };

        let mut applier = MockManifestApplier::new();
        applier
            .expect_apply()
            .withf(|spec, subs| spec.component != Component::Infrastructure || subs.is_empty())
            .times(5)
            .returning(|_, _| Ok(()));

        Provisioner::new(applier)
            .run(&request)
            .await
            .expect("run should succeed");
    }
}
