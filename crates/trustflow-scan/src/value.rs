//! Loose coercions for backend JSON fields

use serde_json::Value;

/// JavaScript-style truthiness
pub(crate) fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Non-negative counter from a number or numeric string; anything else is zero
pub(crate) fn count(value: Option<&Value>) -> u64 {
    let number = match value {
        Some(Value::Number(n)) => {
            if let Some(n) = n.as_u64() {
                return n;
            }
            n.as_f64()
        }
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match number {
        Some(f) if f.is_finite() && f > 0.0 => f.floor() as u64,
        _ => 0,
    }
}

/// String entries of a list; other shapes yield nothing
pub(crate) fn messages(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(list)) => list.iter().map(message).collect(),
        _ => Vec::new(),
    }
}

pub(crate) fn message(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthy() {
        assert!(truthy(Some(&json!(true))));
        assert!(truthy(Some(&json!(1))));
        assert!(truthy(Some(&json!("yes"))));
        assert!(!truthy(Some(&json!(0))));
        assert!(!truthy(Some(&json!(""))));
        assert!(!truthy(Some(&Value::Null)));
        assert!(!truthy(None));
    }

    #[test]
    fn test_count() {
        assert_eq!(count(Some(&json!(4))), 4);
        assert_eq!(count(Some(&json!("7"))), 7);
        assert_eq!(count(Some(&json!(2.9))), 2);
        assert_eq!(count(Some(&json!(-3))), 0);
        assert_eq!(count(Some(&json!("many"))), 0);
        assert_eq!(count(Some(&json!(true))), 0);
        assert_eq!(count(None), 0);
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            messages(Some(&json!(["a", 2]))),
            vec!["a".to_string(), "2".to_string()]
        );
        assert!(messages(Some(&json!("not a list"))).is_empty());
    }
}
