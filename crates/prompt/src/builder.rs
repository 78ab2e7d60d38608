//! Rendering prompt definitions with Handlebars.

use crate::types::{BuiltPrompt, PromptDefinition};
use handlebars::Handlebars;
use serde::Serialize;
use teller_core::{AppError, AppResult};

/// Render a prompt definition with the given variables.
///
/// `variables` must serialize to a JSON object holding every variable the
/// definition declares. HTML escaping is disabled: prompts are plain text and
/// customer messages must reach the model unchanged.
///
/// # Example
/// ```no_run
/// use teller_prompt::{render, PromptLibrary};
/// use serde_json::json;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let library = PromptLibrary::builtin()?;
/// let route = library.get("bank.route")?;
/// let built = render(route, &json!({"query": "What is the loan rate?", "history": []}))?;
/// println!("User prompt: {}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn render<T: Serialize>(definition: &PromptDefinition, variables: &T) -> AppResult<BuiltPrompt> {
    tracing::debug!("Rendering prompt: {}", definition.id);

    let values = serde_json::to_value(variables)?;
    let object = values.as_object().ok_or_else(|| {
        AppError::Prompt(format!(
            "Variables for prompt {} must be an object",
            definition.id
        ))
    })?;

    let missing: Vec<&str> = definition
        .variables
        .iter()
        .map(String::as_str)
        .filter(|name| !object.contains_key(*name))
        .collect();
    if !missing.is_empty() {
        return Err(AppError::Prompt(format!(
            "Prompt {} is missing variables: {}",
            definition.id,
            missing.join(", ")
        )));
    }

    let mut handlebars = Handlebars::new();
    handlebars.register_escape_fn(handlebars::no_escape);

    let render_one = |template: &str| {
        handlebars
            .render_template(template, &values)
            .map_err(|e| AppError::Prompt(format!("Failed to render {}: {}", definition.id, e)))
    };

    let user = render_one(&definition.template)?;
    let system = definition.system.as_deref().map(render_one).transpose()?;

    Ok(BuiltPrompt {
        prompt_id: definition.id.clone(),
        system: system.map(|s| s.trim().to_string()),
        user: user.trim().to_string(),
    })
}
