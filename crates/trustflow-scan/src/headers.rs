use trustflow_types::ApplicationDescription;

pub const APPLICATION_HEADER: &str = "Argocd-Application-Name";
pub const PROJECT_HEADER: &str = "Argocd-Project-Name";

const DEFAULT_APP_NAMESPACE: &str = "argocd";
const DEFAULT_PROJECT: &str = "default";

/// Headers sent with every backend request.
///
/// The Argo CD proxy extension authorises requests against the application
/// and project named here, so they are only sent when an application is known.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestHeaders {
    application: Option<String>,
    project: Option<String>,
}

impl RequestHeaders {
    pub fn for_application(application: Option<&ApplicationDescription>) -> Self {
        let Some(app) = application else {
            return Self::default();
        };
        let Some(name) = app.name() else {
            return Self::default();
        };

        let namespace = app.namespace().unwrap_or(DEFAULT_APP_NAMESPACE);
        let project = app.project().unwrap_or(DEFAULT_PROJECT);

        Self {
            application: Some(format!("{}:{}", namespace, name)),
            project: Some(project.to_string()),
        }
    }

    /// `<namespace>:<name>` of the application, when known
    pub fn application(&self) -> Option<&str> {
        self.application.as_deref()
    }

    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("Accept", "application/json".to_string()),
            ("Content-Type", "application/json".to_string()),
        ];
        if let Some(application) = &self.application {
            pairs.push((APPLICATION_HEADER, application.clone()));
        }
        if let Some(project) = &self.project {
            pairs.push((PROJECT_HEADER, project.clone()));
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trustflow_types::{ApplicationMetadata, ApplicationSpec};

    fn app(name: Option<&str>, namespace: Option<&str>, project: Option<&str>) -> ApplicationDescription {
        ApplicationDescription {
            metadata: ApplicationMetadata {
                name: name.map(str::to_string),
                namespace: namespace.map(str::to_string),
            },
            spec: ApplicationSpec {
                project: project.map(str::to_string),
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_no_application_sends_json_headers_only() {
        let headers = RequestHeaders::for_application(None);
        assert_eq!(headers.pairs().len(), 2);

        let unnamed = RequestHeaders::for_application(Some(&app(None, Some("apps"), None)));
        assert!(unnamed.application().is_none());
    }

    #[test]
    fn test_application_defaults() {
        let headers = RequestHeaders::for_application(Some(&app(Some("shop"), None, None)));
        let pairs = headers.pairs();
        assert!(pairs.contains(&(APPLICATION_HEADER, "argocd:shop".to_string())));
        assert!(pairs.contains(&(PROJECT_HEADER, "default".to_string())));
    }

    #[test]
    fn test_application_explicit() {
        let headers = RequestHeaders::for_application(Some(&app(
            Some("shop"),
            Some("team-apps"),
            Some("payments"),
        )));
        assert_eq!(headers.application(), Some("team-apps:shop"));
        assert!(headers.pairs().contains(&(PROJECT_HEADER, "payments".to_string())));
    }
}
