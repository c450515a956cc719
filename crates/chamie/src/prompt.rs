//! System prompt assembly.
//!
//! The persona is fixed; when a grounding file rides along on the request
//! its content is embedded verbatim inside a delimited block, with an
//! instruction to answer only from that content.

/// Chamie's persona and formatting rules.
const PERSONA: &str = "You are Chamie, a friendly and capable AI assistant.\n\
Answer in the same language the user writes in.\n\
Be clear and complete, but do not pad your answers.\n\
Format responses in markdown. Put code in fenced code blocks with the \
language tag, and use lists and headings where they help.\n\
If you do not know something, say so instead of guessing.";

/// Delimiter around embedded file content.
const FILE_BLOCK_FENCE: &str = "----";

/// Build the system prompt, optionally grounded on uploaded file content.
pub fn build_system_prompt(file_context: Option<&str>) -> String {
    match file_context {
        None => PERSONA.to_string(),
        Some(content) => format!(
            "{PERSONA}\n\n\
            The user uploaded a file. Its content is between the {FILE_BLOCK_FENCE} markers:\n\
            {FILE_BLOCK_FENCE}\n\
            {content}\n\
            {FILE_BLOCK_FENCE}\n\
            Ground every answer in this content. If the answer is not in the \
            file, say that the file does not cover it; do not invent one."
        ),
    }
}
