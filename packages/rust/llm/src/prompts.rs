//! Prompt templates for the two model call shapes.

use sourcescout_shared::Industry;

/// Marker appended when page text is cut to fit the model context.
pub const TRUNCATION_MARKER: &str = "\n\n[... content truncated ...]";

/// Prompt asking for a short, industry-focused summary of one page.
pub fn summarize_prompt(industry: &Industry, url: &str, text: &str) -> String {
    let name = industry.display_name();
    format!(
        "You summarize web sources for an R&D research platform covering the \
         \"{name}\" industry.\n\n\
         Write a concise summary of the page below in 2-3 sentences. Cover:\n\
         1. Whether the source is relevant to the {name} industry.\n\
         2. Its key strengths or limitations as an information source.\n\
         3. The primary topics it covers, favouring industry insights, case \
         studies, and regulatory or research material.\n\n\
         Reply with the summary text only, without headings or preamble.\n\n\
         Source URL: {url}\n\
         Page content:\n\"\"\"\n{text}\n\"\"\"\n\n\
         SUMMARY:"
    )
}

/// Prompt asking for a keep/discard judgment on one summary, as a JSON object.
pub fn score_prompt(industry: &Industry, url: &str, summary: &str) -> String {
    let name = industry.display_name();
    format!(
        "Decide whether the source described below should be approved or rejected \
         for research on the \"{name}\" industry.\n\n\
         Approve sources that carry industry-focused insights, case studies, or \
         regulatory or research relevance. Reject sources that are off-topic, \
         promotional, thin, or unreliable, and say why.\n\n\
         Answer with exactly one JSON object and nothing else, in this shape:\n\
         {{\"url\": \"{url}\", \"reliable\": \"Yes\" or \"No\", \"reason\": \"1-2 sentences\"}}\n\n\
         Summary:\n\"\"\"\n{summary}\n\"\"\""
    )
}

/// Truncate `text` to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Truncate page text for a prompt, marking the cut.
pub fn truncate_content(text: &str, max_chars: usize) -> String {
    let cut = truncate_chars(text, max_chars);
    if cut.len() < text.len() {
        format!("{cut}{TRUNCATION_MARKER}")
    } else {
        text.to_string()
    }
}
