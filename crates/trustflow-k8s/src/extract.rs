//! Image and workload-target extraction from host resource descriptions

use std::collections::HashSet;

use serde_json::Value;
use trustflow_types::{
    ApplicationDescription, ResourceDescription, WorkloadTarget, is_workload_kind,
};

/// Collect the images a resource runs, deduplicated in first-seen order.
///
/// Applications read `status.summary.images` from their live state. Other
/// kinds read their pod spec. When the resource itself yields nothing, the
/// application's own image summary is used instead.
pub fn extract_images(
    resource: &ResourceDescription,
    application: Option<&ApplicationDescription>,
) -> Vec<String> {
    let live = resource.live();

    let mut images = match &live {
        Some(live) if resource.is_application() => application_images(live),
        Some(live) => workload_images(live, &resource.kind),
        None => Vec::new(),
    };

    if images.is_empty() {
        if let Some(app) = application {
            images = app.status.summary.images.clone();
        }
    }

    dedupe(images)
}

/// Images of every init, regular and ephemeral container, in that order
pub fn pod_spec_images(spec: &Value) -> Vec<String> {
    ["initContainers", "containers", "ephemeralContainers"]
        .iter()
        .filter_map(|key| spec.get(*key).and_then(Value::as_array))
        .flatten()
        .filter_map(|container| container.get("image").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

fn workload_images(live: &Value, fallback_kind: &str) -> Vec<String> {
    let kind = live
        .get("kind")
        .and_then(Value::as_str)
        .unwrap_or(fallback_kind);

    let spec = match kind {
        "Pod" => live.pointer("/spec"),
        "CronJob" => live.pointer("/spec/jobTemplate/spec/template/spec"),
        _ => live.pointer("/spec/template/spec"),
    };

    spec.map(pod_spec_images).unwrap_or_default()
}

fn application_images(live: &Value) -> Vec<String> {
    live.pointer("/status/summary/images")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn dedupe(images: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    images
        .into_iter()
        .filter(|image| !image.is_empty())
        .filter(|image| seen.insert(image.clone()))
        .collect()
}

/// Derive the workloads to query for vulnerabilities.
///
/// An application expands to its member resources of a workload kind. Any
/// other resource is a single target, with name and namespace taken from the
/// description or, when missing there, from the live state metadata.
pub fn workload_targets(
    resource: &ResourceDescription,
    application: Option<&ApplicationDescription>,
) -> Vec<WorkloadTarget> {
    let live = resource.live();
    let live_meta = |field: &str| -> Option<String> {
        live.as_ref()?
            .pointer(&format!("/metadata/{}", field))?
            .as_str()
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    if resource.is_application() {
        let members = match application {
            Some(app) if !app.status.resources.is_empty() => app.status.resources.clone(),
            _ => live
                .as_ref()
                .map(ApplicationDescription::from_value)
                .map(|app| app.status.resources)
                .unwrap_or_default(),
        };
        let app_namespace = application
            .and_then(|app| app.namespace().map(str::to_string))
            .or_else(|| live_meta("namespace"))
            .unwrap_or_default();

        return members
            .into_iter()
            .filter(|member| is_workload_kind(&member.kind))
            .map(|member| {
                let namespace = member
                    .namespace
                    .filter(|ns| !ns.is_empty())
                    .unwrap_or_else(|| app_namespace.clone());
                WorkloadTarget::new(member.kind, member.name, namespace)
            })
            .collect();
    }

    if resource.kind.is_empty() {
        return Vec::new();
    }

    let name = Some(resource.name.clone())
        .filter(|n| !n.is_empty())
        .or_else(|| live_meta("name"))
        .unwrap_or_default();
    let namespace = Some(resource.namespace.clone())
        .filter(|n| !n.is_empty())
        .or_else(|| live_meta("namespace"))
        .unwrap_or_default();

    vec![WorkloadTarget::new(resource.kind.clone(), name, namespace)]
}
