//! capi-init CLI
//!
//! Provisions a management cluster with the Cluster API stack: cert-manager,
//! the core CAPI controllers, the kubeadm bootstrap and control-plane
//! providers, and optionally an infrastructure provider with credentials
//! injected into its manifest.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use capi_init::apply::KubectlApplier;
use capi_init::provision::{ProvisionRequest, Provisioner};
use capi_init::Result;

/// Provision a Kubernetes management cluster with the Cluster API stack
#[derive(Parser, Debug)]
#[command(name = "capi-init")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Cluster API release to install (core, bootstrap, and control-plane components)
    #[arg(long = "capi-version")]
    capi_version: String,

    /// Infrastructure provider to install (aws, gcp, packet, vsphere, ...)
    #[arg(long = "capi-provider", requires = "capi_provider_version")]
    capi_provider: Option<String>,

    /// Infrastructure provider release
    #[arg(long = "capi-provider-version")]
    capi_provider_version: Option<String>,

    /// Credential value substituted into the infrastructure provider manifest
    #[arg(long, env = "CAPI_INIT_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// vSphere username (used only when the provider is vsphere)
    #[arg(long)]
    username: Option<String>,

    /// vSphere password (used only when the provider is vsphere)
    #[arg(long, env = "CAPI_INIT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Kubeconfig passed to every kubectl invocation
    #[arg(long)]
    kubeconfig: Option<PathBuf>,

    /// Kubectl context to switch to before provisioning
    #[arg(long)]
    context: Option<String>,

    /// Directory where rewritten manifests are staged
    #[arg(long, default_value_os_t = std::env::temp_dir())]
    work_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();

    let applier = KubectlApplier::new(cli.work_dir, cli.kubeconfig).await?;
    if let Some(ref context) = cli.context {
        applier.use_context(context).await?;
    }

    let request = ProvisionRequest {
        capi_version: cli.capi_version,
        infra_provider: cli.capi_provider,
        infra_provider_version: cli.capi_provider_version,
        secret: cli.secret,
        username: cli.username,
        password: cli.password,
    };

    Provisioner::new(applier).run(&request).await
}
