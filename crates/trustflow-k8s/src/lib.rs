//! Kubernetes integration for trustflow
//!
//! This crate extracts container images and scannable workload targets from
//! resource descriptions, and fetches those descriptions from a live cluster.

mod client;
mod extract;

pub use client::{KubeClient, describe_manifest};
pub use extract::{extract_images, pod_spec_images, workload_targets};

// Re-export types that are used in our public API
pub use trustflow_types::{
    APPLICATION_KIND, ApplicationDescription, ResourceDescription, WORKLOAD_KINDS, WorkloadTarget,
    has_digest,
};
