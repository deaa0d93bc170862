// Shared prompt fragments.
// Each service that needs generation calls defines its own prompts.rs alongside it.
// This file contains cross-cutting fragments.

/// Escaping rules for LaTeX special characters in plain text.
pub const LATEX_ESCAPE_RULES: &str = "\
Escape LaTeX special characters when they appear in plain text:
   - \\#  → represents '#'
   - \\$  → represents '$'
   - \\%  → represents '%'
   - \\&  → represents 'and' (prefer writing 'and' instead)
   - \\_  → represents '_'
   - \\{  → represents '{'
   - \\}  → represents '}'
   - \\^{} → represents '^'
   - \\~{} → represents '~'
   - Backslashes (\\\\) are part of LaTeX commands and must not be added or removed except where required for proper escaping.";

/// Output contract appended to every LaTeX-producing prompt.
pub const LATEX_ONLY_OUTPUT: &str = "\
Output requirements:
- Return ONLY valid LaTeX code.
- Do NOT include markdown formatting, code blocks, explanations, or commentary.
- The result must compile successfully as a standalone LaTeX document.";
