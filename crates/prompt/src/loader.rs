//! Reading prompt definitions from disk.
//!
//! A prompts directory holds one `<id>.yml` per prompt. Only the top level
//! is scanned.

use crate::types::PromptDefinition;
use std::collections::HashSet;
use std::path::Path;
use teller_core::{AppError, AppResult};

/// Load the prompt `prompt_id` from `<prompts_dir>/<prompt_id>.yml`.
///
/// The `id` inside the file must match the file name.
///
/// # Example
/// ```no_run
/// use teller_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new("prompts"), "bank.route")?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(prompts_dir: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let path = prompts_dir.join(format!("{}.yml", prompt_id));
    tracing::debug!("Loading prompt {:?}", path);

    let contents = std::fs::read_to_string(&path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => AppError::Prompt(format!("Prompt file not found: {:?}", path)),
        _ => AppError::Prompt(format!("Failed to read prompt file {:?}: {}", path, e)),
    })?;

    let definition = parse_prompt(&contents)
        .map_err(|e| AppError::Prompt(format!("Invalid prompt file {:?}: {}", path, e)))?;

    if definition.id != prompt_id {
        return Err(AppError::Prompt(format!(
            "Prompt file {:?} declares id '{}'",
            path, definition.id
        )));
    }

    tracing::info!("Loaded prompt: {} ({})", definition.id, definition.title);
    Ok(definition)
}

/// Parse a prompt definition from YAML text and check it is usable.
pub fn parse_prompt(contents: &str) -> AppResult<PromptDefinition> {
    let definition: PromptDefinition = serde_yaml::from_str(contents)
        .map_err(|e| AppError::Prompt(format!("Failed to parse prompt YAML: {}", e)))?;

    check_definition(&definition)?;
    Ok(definition)
}

/// Sorted ids of the `.yml` files directly under `prompts_dir`.
///
/// A missing directory holds no prompts.
pub fn list_prompts(prompts_dir: &Path) -> AppResult<Vec<String>> {
    if !prompts_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut ids: Vec<String> = walkdir::WalkDir::new(prompts_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.path().extension().and_then(|s| s.to_str()) == Some("yml"))
        .filter_map(|entry| {
            entry
                .path()
                .file_stem()
                .and_then(|s| s.to_str())
                .map(str::to_string)
        })
        .collect();

    ids.sort();
    Ok(ids)
}

fn check_definition(def: &PromptDefinition) -> AppResult<()> {
    let blank = [
        ("id", def.id.as_str()),
        ("title", def.title.as_str()),
        ("template", def.template.as_str()),
    ]
    .into_iter()
    .find(|(_, value)| value.trim().is_empty());

    if let Some((field, _)) = blank {
        return Err(AppError::Prompt(format!("Prompt {} cannot be empty", field)));
    }

    let mut parts = def.api_version.split('.');
    let well_formed = matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some(major), Some(minor), None)
            if major.parse::<u32>().is_ok() && minor.parse::<u32>().is_ok()
    );
    if !well_formed {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion '{}', expected 'major.minor'",
            def.api_version
        )));
    }

    let mut seen = HashSet::new();
    if let Some(dup) = def.variables.iter().find(|v| !seen.insert(v.as_str())) {
        return Err(AppError::Prompt(format!("Variable '{}' declared twice", dup)));
    }

    Ok(())
}
