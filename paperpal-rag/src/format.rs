//! Chat context assembly.

use crate::document::RetrievalContext;

/// Rough characters-per-token ratio used for budgeting.
const CHARS_PER_TOKEN: usize = 4;

const TRUNCATION_MARKER: &str = "...";

/// Render a paper's metadata and cached chunks into one prompt-ready string.
///
/// Title and abstract are always included in full. Cached chunks follow in
/// ranked order as `[page N] content` until the budget of
/// `max_tokens * 4` characters (minus what the header used, joining newlines
/// included) runs out; the chunk that crosses the budget is cut and marked
/// with `...`, and nothing follows it. Without a processed PDF or cached
/// chunks the output is the title and abstract only, so callers can tell
/// abstract-only context apart.
pub fn render_context(context: &RetrievalContext, max_tokens: usize) -> String {
    let mut parts = vec![
        format!("Paper title: {}", context.paper_title),
        format!("Paper abstract: {}", context.paper_abstract),
    ];

    if context.is_pdf_processed && !context.retrieved_chunks.is_empty() {
        parts.push("\nRelevant PDF excerpts:".to_string());

        let used: usize =
            parts.iter().map(|part| part.chars().count()).sum::<usize>() + parts.len() - 1;
        let mut remaining = (max_tokens * CHARS_PER_TOKEN).saturating_sub(used);

        for chunk in &context.retrieved_chunks {
            if remaining == 0 {
                break;
            }
            let rendered = format!("\n[page {}] {}", chunk.page_number(), chunk.content());
            // plus the newline that joins it to the previous part
            let len = rendered.chars().count() + 1;

            if len > remaining {
                let mut truncated: String = rendered.chars().take(remaining - 1).collect();
                truncated.push_str(TRUNCATION_MARKER);
                parts.push(truncated);
                break;
            }

            parts.push(rendered);
            remaining -= len;
        }
    }

    parts.join("\n")
}
