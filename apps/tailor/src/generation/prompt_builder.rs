//! Prompt Builder — turns a template and job description into the tailoring request.
//!
//! The template's character count is written into both texts as a hard budget.
//! Nothing here understands LaTeX; the only checks are for empty input, and they
//! run before any network cost is paid.

use crate::errors::PipelineError;
use crate::generation::prompts::{TAILOR_PROMPT_TEMPLATE, TAILOR_SYSTEM_TEMPLATE};
use crate::llm_client::prompts::{LATEX_ESCAPE_RULES, LATEX_ONLY_OUTPUT};
use crate::models::{DocumentKind, Template};

#[derive(Debug, Clone, PartialEq)]
pub struct PromptPair {
    pub prompt: String,
    pub system_prompt: String,
    /// Character budget the service was asked to stay under.
    pub char_limit: usize,
}

pub fn build(
    template: &Template,
    job_description: &str,
    kind: DocumentKind,
) -> Result<PromptPair, PipelineError> {
    if template.content.trim().is_empty() {
        return Err(PipelineError::MissingInput(format!(
            "No {} template selected.",
            kind.label()
        )));
    }
    if job_description.trim().is_empty() {
        return Err(PipelineError::MissingInput(
            "Job description is empty.".to_string(),
        ));
    }

    let char_limit = template.char_len();
    let limit = char_limit.to_string();

    let prompt = fill(
        TAILOR_PROMPT_TEMPLATE,
        &[
            ("kind", kind.label()),
            ("char_limit", limit.as_str()),
            ("escape_rules", LATEX_ESCAPE_RULES),
            ("output_rules", LATEX_ONLY_OUTPUT),
            ("job_description", job_description),
            ("template", template.content.as_str()),
        ],
    );
    let system_prompt = fill(
        TAILOR_SYSTEM_TEMPLATE,
        &[("kind", kind.label()), ("char_limit", limit.as_str())],
    );

    Ok(PromptPair {
        prompt,
        system_prompt,
        char_limit,
    })
}

/// Substitutes `{name}` placeholders in a single pass over `pattern`, so braces
/// inside the substituted values are never re-expanded.
fn fill(pattern: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut rest = pattern;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replaced = after.find('}').and_then(|close| {
            let name = &after[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });
        match replaced {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
