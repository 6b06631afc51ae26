//! Built-in pipeline definitions embedded in the binary
//!
//! Lets users run `--pipeline pipedrive` instead of pointing at a file.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Built-in pipeline YAML definitions
pub static BUILTIN_PIPELINES: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| {
        let mut m = HashMap::new();
        m.insert("pipedrive", include_str!("../connectors/pipedrive.yaml"));
        m
    });

/// Get a built-in pipeline YAML by name
pub fn get_builtin(name: &str) -> Option<&'static str> {
    BUILTIN_PIPELINES.get(name).copied()
}

/// List all built-in pipeline names, sorted
pub fn list_builtin() -> Vec<&'static str> {
    let mut names: Vec<_> = BUILTIN_PIPELINES.keys().copied().collect();
    names.sort_unstable();
    names
}

/// Check if a name refers to a built-in pipeline
pub fn is_builtin(name: &str) -> bool {
    BUILTIN_PIPELINES.contains_key(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_pipeline_from_str;

    #[test]
    fn test_pipedrive_is_builtin() {
        assert!(is_builtin("pipedrive"));
        assert!(!is_builtin("salesforce"));
        assert_eq!(list_builtin(), vec!["pipedrive"]);
    }

    #[test]
    fn test_builtin_pipelines_load() {
        for name in list_builtin() {
            let yaml = get_builtin(name).unwrap();
            let pipeline = load_pipeline_from_str(yaml)
                .unwrap_or_else(|e| panic!("built-in pipeline '{name}' failed to load: {e}"));
            assert_eq!(pipeline.name, name);
        }
    }
}
