//! Dot-delimited paths into JSON payloads.
use serde_json::Value;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("Empty path")]
    Empty,
    /// A key along the path does not exist.
    #[error("Path '{path}' not found: missing key '{key}'")]
    Missing { path: String, key: String },
    /// A non-object value was found before the end of the path.
    #[error("Path '{path}' not found: '{key}' is not an object")]
    NotAnObject { path: String, key: String },
}

/// Resolve `path` (for example `recipient.birthDate`) by descending through
/// nested objects.
pub fn resolve<'a>(root: &'a Value, path: &str) -> Result<&'a Value, PathError> {
    if path.is_empty() {
        return Err(PathError::Empty);
    }
    let mut current = root;
    let mut parent = "";
    for key in path.split('.') {
        let object = current.as_object().ok_or_else(|| PathError::NotAnObject {
            path: path.to_string(),
            key: parent.to_string(),
        })?;
        current = object.get(key).ok_or_else(|| PathError::Missing {
            path: path.to_string(),
            key: key.to_string(),
        })?;
        parent = key;
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_nested_value() {
        let subject = json!({ "recipient": { "birthDate": "1990-01-01" } });
        assert_eq!(
            resolve(&subject, "recipient.birthDate").unwrap(),
            &json!("1990-01-01")
        );
    }

    #[test]
    fn missing_intermediate_key() {
        let subject = json!({ "recipient": {} });
        assert_eq!(
            resolve(&subject, "patient.birthDate").unwrap_err(),
            PathError::Missing {
                path: "patient.birthDate".to_string(),
                key: "patient".to_string()
            }
        );
    }

    #[test]
    fn empty_path() {
        assert_eq!(resolve(&json!({}), "").unwrap_err(), PathError::Empty);
    }

    #[test]
    fn non_object_mid_path() {
        let subject = json!({ "recipient": "Jane" });
        assert_eq!(
            resolve(&subject, "recipient.birthDate").unwrap_err(),
            PathError::NotAnObject {
                path: "recipient.birthDate".to_string(),
                key: "recipient".to_string()
            }
        );
    }
}
