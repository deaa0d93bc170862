// All prompt constants for the Generation module.
// Reuses cross-cutting fragments from llm_client::prompts.

/// Tailoring prompt template.
/// Replace: {kind}, {job_description}, {char_limit}, {escape_rules}, {template}, {output_rules}
pub const TAILOR_PROMPT_TEMPLATE: &str = r#"You are to generate a tailored {kind} by modifying the LaTeX {kind} below to best match the following job description:

{job_description}

Guidelines:
1. Keep all LaTeX structure, commands, formatting, and packages EXACTLY as is. Do NOT add, remove, or rename sections, environments, or LaTeX syntax.
2. Modify the content (text only) within each section to highlight the most relevant experience, technologies, and achievements that match the job description.
3. Adjust wording to emphasize alignment with the role's keywords, responsibilities, and tools.
4. Preserve the document's professional tone, concise phrasing, and quantitative, results-oriented style.
5. **CRITICAL CHARACTER LIMIT:** The original template is {char_limit} characters. Your final output MUST be less than this. This is the most important rule. Edit existing content; do not add new content that increases length.
6. Retain the candidate's identity, layout, and formatting integrity. Only update text content for relevance.
7. Ensure that all output is syntactically valid LaTeX code.
8. {escape_rules}

LaTeX {kind} to modify:
{template}

{output_rules}"#;

/// Tailoring system prompt template.
/// Replace: {kind}, {char_limit}
pub const TAILOR_SYSTEM_TEMPLATE: &str = r#"You are a LaTeX and professional {kind} optimization expert.

Your role:
- Edit the provided LaTeX {kind} to tailor it perfectly to the job description.
- **CRITICAL CHARACTER LIMIT:** The ORIGINAL LaTeX template is {char_limit} characters long. Your FINAL output MUST NOT exceed this length. This is your #1 priority.
- Replace and refine text content only; do NOT modify LaTeX structure, section titles, commands, or spacing.
- Emphasize the most relevant skills, achievements, and technologies that match the job posting.
- Use concise, impact-driven phrasing with quantifiable results.
- Output ONLY valid LaTeX code. No markdown, no commentary, no extra text."#;

/// Keyword extraction prompt. Replace `{job_description}` before sending.
pub const KEYWORDS_PROMPT_TEMPLATE: &str =
    "Extract key skills and keywords from this job description:\n\n{job_description}";

pub const KEYWORDS_SYSTEM: &str =
    "You are a keyword extraction expert. Return only a comma-separated list of keywords.";
