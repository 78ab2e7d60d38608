//! Prompt definition and rendered prompt types.

use serde::{Deserialize, Serialize};

/// A prompt definition loaded from YAML.
///
/// ```yaml
/// id: bank.rag
/// title: Knowledge base answer
/// apiVersion: "1.0"
/// variables: [question, excerpts]
/// template: |
///   Customer question: {{question}}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Unique prompt identifier, also the file stem (e.g., "bank.route")
    pub id: String,

    pub title: String,

    /// Definition format version, "major.minor"
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Variables the caller must supply when rendering
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<String>,

    /// Handlebars system message, rendered with the same variables
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Handlebars user message
    pub template: String,
}

/// A rendered prompt, ready to send to a chat model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuiltPrompt {
    /// Id of the definition it was rendered from
    #[serde(rename = "promptId")]
    pub prompt_id: String,

    pub system: Option<String>,

    pub user: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definition_deserialization() {
        let yaml = r#"
id: bank.test
title: Test Prompt
apiVersion: "1.0"
description: Used in tests
variables: [query, history]
system: "You help {{bank}} customers"
template: "{{query}}"
"#;

        let def: PromptDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(def.id, "bank.test");
        assert_eq!(def.api_version, "1.0");
        assert_eq!(def.variables, vec!["query", "history"]);
        assert_eq!(def.system.as_deref(), Some("You help {{bank}} customers"));
    }

    #[test]
    fn test_optional_fields_default() {
        let yaml = "id: bank.minimal\ntitle: Minimal\napiVersion: \"1.0\"\ntemplate: Hi\n";

        let def: PromptDefinition = serde_yaml::from_str(yaml).unwrap();
        assert!(def.description.is_none());
        assert!(def.variables.is_empty());
        assert!(def.system.is_none());
    }
}
