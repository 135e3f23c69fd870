use thiserror::Error;

/// What a response body looked like when it could not be used
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Diagnosis {
    /// Body starts with the gzip magic number but carried no encoding header
    Gzip,
    /// Decoded text is mostly replacement or control characters
    Binary,
    /// Whitespace-collapsed, truncated excerpt of the body
    Snippet(String),
    /// Nothing readable in the body
    Empty,
}

/// Classified failure of a backend request
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Request failed: {0}")]
    Network(String),

    #[error("{message}")]
    Backend { status: u16, message: String },

    #[error("{}", status_message(.status, .diagnosis))]
    Status { status: u16, diagnosis: Diagnosis },

    #[error("{}", not_json_message(.status, .diagnosis))]
    NotJson { status: u16, diagnosis: Diagnosis },
}

fn status_message(status: &u16, diagnosis: &Diagnosis) -> String {
    match diagnosis {
        Diagnosis::Gzip => format!(
            "HTTP {}: backend returned gzip-compressed data without a Content-Encoding header; \
             a proxy may be stripping gzip encoding",
            status
        ),
        Diagnosis::Binary => format!("HTTP {}: response looks like binary data", status),
        Diagnosis::Snippet(snippet) => snippet.clone(),
        Diagnosis::Empty => format!("Request failed: {}", status),
    }
}

fn not_json_message(status: &u16, diagnosis: &Diagnosis) -> String {
    match diagnosis {
        Diagnosis::Gzip => format!(
            "Expected JSON but received gzip-compressed data (HTTP {}); \
             a proxy may be stripping the Content-Encoding header",
            status
        ),
        Diagnosis::Binary => format!("Expected JSON but received binary data (HTTP {})", status),
        Diagnosis::Snippet(snippet) => format!("Expected JSON but received: {}", snippet),
        Diagnosis::Empty => format!("Expected JSON but received an empty response (HTTP {})", status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_messages() {
        let gzip = FetchError::Status {
            status: 502,
            diagnosis: Diagnosis::Gzip,
        };
        assert!(gzip.to_string().contains("gzip"));
        assert!(gzip.to_string().contains("proxy"));

        let empty = FetchError::Status {
            status: 503,
            diagnosis: Diagnosis::Empty,
        };
        assert_eq!(empty.to_string(), "Request failed: 503");

        let snippet = FetchError::Status {
            status: 500,
            diagnosis: Diagnosis::Snippet("upstream timed out".to_string()),
        };
        assert_eq!(snippet.to_string(), "upstream timed out");
    }

    #[test]
    fn test_not_json_messages() {
        let binary = FetchError::NotJson {
            status: 200,
            diagnosis: Diagnosis::Binary,
        };
        assert_eq!(
            binary.to_string(),
            "Expected JSON but received binary data (HTTP 200)"
        );

        let snippet = FetchError::NotJson {
            status: 200,
            diagnosis: Diagnosis::Snippet("<html>".to_string()),
        };
        assert_eq!(snippet.to_string(), "Expected JSON but received: <html>");
    }
}
