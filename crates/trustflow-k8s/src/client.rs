//! Kubernetes client for trustflow

use anyhow::{Context, Result, bail};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::Pod;
use kube::Api;
use kube::api::{ApiResource, DynamicObject, GroupVersionKind};
use kube::config::{KubeConfigOptions, Kubeconfig};
use serde_json::Value;
use tracing::debug;
use trustflow_types::{APPLICATION_KIND, ApplicationDescription, ResourceDescription};

/// Kubernetes client wrapper that builds host descriptions from live objects
pub struct KubeClient {
    client: kube::Client,
}

impl KubeClient {
    /// Create a new KubeClient for the given context (or the current one)
    pub async fn new(context: Option<&str>) -> Result<Self> {
        let kubeconfig =
            Kubeconfig::read().context("Failed to read kubeconfig. Is kubectl configured?")?;

        let context = context
            .map(str::to_string)
            .or_else(|| kubeconfig.current_context.clone());

        let config = kube::Config::from_custom_kubeconfig(
            kubeconfig,
            &KubeConfigOptions {
                context: context.clone(),
                ..Default::default()
            },
        )
        .await
        .context(format!(
            "Failed to create config for context: {}",
            context.as_deref().unwrap_or("<current>")
        ))?;

        let client = kube::Client::try_from(config).context(format!(
            "Failed to create client for context: {}",
            context.as_deref().unwrap_or("<current>")
        ))?;

        debug!(context = context.as_deref().unwrap_or("<current>"), "kube client ready");
        Ok(Self { client })
    }

    /// Fetch a single object and describe it the way the host would
    pub async fn describe_resource(
        &self,
        kind: &str,
        namespace: &str,
        name: &str,
    ) -> Result<ResourceDescription> {
        let Some(resource) = api_resource_for(kind) else {
            bail!("Unsupported resource kind: {}", kind);
        };

        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), namespace, &resource);
        let object = api.get(name).await.context(format!(
            "Failed to get {} '{}' in namespace '{}'",
            kind, name, namespace
        ))?;

        debug!(kind, namespace, name, "fetched live object");

        let live_state =
            serde_json::to_string(&object).context("Failed to encode live object")?;

        Ok(ResourceDescription {
            group: resource.group.clone(),
            kind: kind.to_string(),
            name: name.to_string(),
            namespace: namespace.to_string(),
            live_state: Some(live_state),
        })
    }

    /// Fetch an Argo CD application
    pub async fn describe_application(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ApplicationDescription> {
        let resource = self
            .describe_resource(APPLICATION_KIND, namespace, name)
            .await?;
        Ok(resource
            .live()
            .map(|live| ApplicationDescription::from_value(&live))
            .unwrap_or_default())
    }
}

/// Describe a manifest read from disk. The manifest itself becomes the live state.
pub fn describe_manifest(raw: &str) -> Result<ResourceDescription> {
    let manifest: Value = serde_json::from_str(raw).context("Manifest is not valid JSON")?;

    let field = |pointer: &str| {
        manifest
            .pointer(pointer)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    let kind = field("/kind");
    if kind.is_empty() {
        bail!("Manifest has no kind");
    }
    let group = field("/apiVersion")
        .rsplit_once('/')
        .map(|(group, _)| group.to_string())
        .unwrap_or_default();

    Ok(ResourceDescription {
        group,
        kind,
        name: field("/metadata/name"),
        namespace: field("/metadata/namespace"),
        live_state: Some(raw.to_string()),
    })
}

/// Map a kind to its API resource. Workload kinds come from k8s-openapi.
fn api_resource_for(kind: &str) -> Option<ApiResource> {
    let resource = match kind {
        "Deployment" => ApiResource::erase::<Deployment>(&()),
        "StatefulSet" => ApiResource::erase::<StatefulSet>(&()),
        "DaemonSet" => ApiResource::erase::<DaemonSet>(&()),
        "ReplicaSet" => ApiResource::erase::<ReplicaSet>(&()),
        "Job" => ApiResource::erase::<Job>(&()),
        "CronJob" => ApiResource::erase::<CronJob>(&()),
        "Pod" => ApiResource::erase::<Pod>(&()),
        APPLICATION_KIND => ApiResource::from_gvk(&GroupVersionKind::gvk(
            "argoproj.io",
            "v1alpha1",
            APPLICATION_KIND,
        )),
        _ => return None,
    };
    Some(resource)
}
