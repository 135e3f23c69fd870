use std::collections::HashMap;

use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, info};
use trustflow_types::{ImageVerification, has_digest};

use crate::headers::RequestHeaders;
use crate::transport::{HttpGet, fetch_json};
use crate::value;

pub const UNPINNED_MESSAGE: &str = "Image is not pinned by digest.";

/// Verification endpoint for one image, also used as its provenance link
pub fn verify_url(base_url: &str, image: &str) -> String {
    format!("{}/verify?image={}", base_url, urlencoding::encode(image))
}

/// Verify every image concurrently.
///
/// Resolves only once all images have settled; the returned map is meant to
/// replace the previous one wholesale.
pub async fn verify_images<T>(
    transport: &T,
    base_url: &str,
    headers: &RequestHeaders,
    images: &[String],
) -> HashMap<String, ImageVerification>
where
    T: HttpGet + ?Sized,
{
    let results = join_all(
        images
            .iter()
            .map(|image| verify_image(transport, base_url, headers, image)),
    )
    .await;

    info!(
        images = images.len(),
        signed = results.iter().filter(|r| r.signed).count(),
        "verification round settled"
    );

    images.iter().cloned().zip(results).collect()
}

async fn verify_image<T>(
    transport: &T,
    base_url: &str,
    headers: &RequestHeaders,
    image: &str,
) -> ImageVerification
where
    T: HttpGet + ?Sized,
{
    if !has_digest(image) {
        debug!(image, "skipping unpinned image");
        return ImageVerification::failed(UNPINNED_MESSAGE);
    }

    match fetch_json(transport, &verify_url(base_url, image), headers).await {
        Ok(data) => verification_from(&data),
        Err(e) => ImageVerification::failed(e.to_string()),
    }
}

fn verification_from(data: &Value) -> ImageVerification {
    ImageVerification {
        loading: false,
        signed: value::truthy(data.get("signed")),
        sbom: value::truthy(data.get("sbom")),
        errors: value::messages(data.get("errors")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTransport;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const BASE: &str = "http://backend/extensions/trustflow";

    fn pinned(name: &str) -> String {
        format!("{}@sha256:{}", name, "0123456789abcdef".repeat(4))
    }

    #[test]
    fn test_verify_url_encodes_image() {
        assert_eq!(
            verify_url(BASE, "ghcr.io/org/app@sha256:ab"),
            "http://backend/extensions/trustflow/verify?image=ghcr.io%2Forg%2Fapp%40sha256%3Aab"
        );
    }

    #[tokio::test]
    async fn test_unpinned_image_skips_network() {
        let transport = FakeTransport::new();
        let images = vec!["nginx:latest".to_string()];
        let results = verify_images(&transport, BASE, &RequestHeaders::default(), &images).await;

        assert_eq!(
            results["nginx:latest"],
            ImageVerification {
                loading: false,
                signed: false,
                sbom: false,
                errors: vec![UNPINNED_MESSAGE.to_string()],
            }
        );
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_mixed_round() {
        let good = pinned("registry/good");
        let partial = pinned("registry/partial");
        let broken = pinned("registry/broken");
        let transport = FakeTransport::new()
            .with_json(&verify_url(BASE, &good), 200, json!({"signed": true, "sbom": true}))
            .with_json(
                &verify_url(BASE, &partial),
                200,
                json!({"signed": 1, "sbom": null, "errors": ["no SBOM attestation"]}),
            )
            .with_json(&verify_url(BASE, &broken), 500, json!({"error": "cosign timed out"}));

        let images = vec![good.clone(), partial.clone(), broken.clone()];
        let results = verify_images(&transport, BASE, &RequestHeaders::default(), &images).await;

        assert_eq!(results.len(), 3);
        assert!(results[&good].signed && results[&good].sbom);
        assert!(results[&good].errors.is_empty());

        assert!(results[&partial].signed);
        assert!(!results[&partial].sbom);
        assert_eq!(results[&partial].errors, vec!["no SBOM attestation".to_string()]);

        assert_eq!(results[&broken], ImageVerification::failed("cosign timed out"));
        assert!(results.values().all(|r| !r.loading));
    }

    #[tokio::test]
    async fn test_malformed_errors_field_ignored() {
        let image = pinned("registry/app");
        let transport = FakeTransport::new().with_json(
            &verify_url(BASE, &image),
            200,
            json!({"signed": true, "sbom": true, "errors": "oops"}),
        );
        let results =
            verify_images(&transport, BASE, &RequestHeaders::default(), &[image.clone()]).await;
        assert!(results[&image].errors.is_empty());
    }
}
