//! Built-in bank prompts with file overrides.

use crate::loader::{list_prompts, load_prompt, parse_prompt};
use crate::types::PromptDefinition;
use std::collections::HashMap;
use std::path::Path;
use teller_core::{AppError, AppResult};

/// System persona used for every model call.
pub const SYSTEM: &str = "bank.system";
/// Tool routing prompt.
pub const ROUTE: &str = "bank.route";
/// Knowledge-base grounded answer prompt.
pub const RAG: &str = "bank.rag";
/// Final customer reply prompt.
pub const ANSWER: &str = "bank.answer";

const BUILTIN: &[(&str, &str)] = &[
    (SYSTEM, include_str!("../prompts/bank.system.yml")),
    (ROUTE, include_str!("../prompts/bank.route.yml")),
    (RAG, include_str!("../prompts/bank.rag.yml")),
    (ANSWER, include_str!("../prompts/bank.answer.yml")),
];

/// The set of prompts the agent renders.
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    prompts: HashMap<String, PromptDefinition>,
}

impl PromptLibrary {
    /// Library holding only the built-in prompts.
    pub fn builtin() -> AppResult<Self> {
        let mut prompts = HashMap::new();
        for (id, source) in BUILTIN {
            let definition = parse_prompt(source)
                .map_err(|e| AppError::Prompt(format!("Built-in prompt {}: {}", id, e)))?;
            prompts.insert((*id).to_string(), definition);
        }
        Ok(Self { prompts })
    }

    /// Built-in prompts, replaced by any same-id file in `prompts_dir`.
    ///
    /// Extra files with new ids are loaded too. A missing directory is fine.
    pub fn load(prompts_dir: &Path) -> AppResult<Self> {
        let mut library = Self::builtin()?;

        for id in list_prompts(prompts_dir)? {
            let definition = load_prompt(prompts_dir, &id)?;
            if library.prompts.contains_key(&id) {
                tracing::info!("Prompt {} overridden from {:?}", id, prompts_dir);
            }
            library.prompts.insert(id, definition);
        }

        Ok(library)
    }

    /// Look up a prompt by id.
    pub fn get(&self, id: &str) -> AppResult<&PromptDefinition> {
        self.prompts
            .get(id)
            .ok_or_else(|| AppError::Prompt(format!("Unknown prompt: {}", id)))
    }

    /// The system persona text.
    pub fn system_text(&self) -> AppResult<String> {
        Ok(self.get(SYSTEM)?.template.trim().to_string())
    }

    /// Sorted prompt ids.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.prompts.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::render;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_prompts_parse() {
        let library = PromptLibrary::builtin().unwrap();
        assert_eq!(library.ids(), vec![ANSWER, RAG, ROUTE, SYSTEM]);
        assert!(library.system_text().unwrap().contains("bank"));
    }

    #[test]
    fn test_route_prompt_lists_tools() {
        let library = PromptLibrary::builtin().unwrap();
        let built = render(
            library.get(ROUTE).unwrap(),
            &json!({
                "query": "What is today's USD rate?",
                "history": [{"role": "user", "content": "hello"}]
            }),
        )
        .unwrap();

        assert!(built.user.contains("Current query: What is today's USD rate?"));
        assert!(built.user.contains("user: hello"));
        for tool in ["RAG", "MODEL", "SEARCH"] {
            assert!(built.user.contains(tool));
        }
    }

    #[test]
    fn test_rag_prompt_includes_excerpts() {
        let library = PromptLibrary::builtin().unwrap();
        let built = render(
            library.get(RAG).unwrap(),
            &json!({"question": "fees?", "excerpts": "Excerpt 1:\nNo fees."}),
        )
        .unwrap();
        assert!(built.user.contains("Excerpt 1:\nNo fees."));
    }

    #[test]
    fn test_file_overrides_builtin() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("bank.system.yml"),
            "id: bank.system\ntitle: Custom\napiVersion: \"1.0\"\ntemplate: You are Teller.\n",
        )
        .unwrap();

        let library = PromptLibrary::load(temp.path()).unwrap();
        assert_eq!(library.system_text().unwrap(), "You are Teller.");
        assert!(library.get(ROUTE).is_ok());
    }

    #[test]
    fn test_missing_dir_uses_builtin() {
        let temp = TempDir::new().unwrap();
        let library = PromptLibrary::load(&temp.path().join("prompts")).unwrap();
        assert_eq!(library.ids().len(), 4);
    }

    #[test]
    fn test_unknown_prompt() {
        let library = PromptLibrary::builtin().unwrap();
        assert!(library.get("bank.nope").is_err());
    }
}
