// LLM prompt constants for article categorization.

/// Categorization prompt. Replace `{taxonomy}`, `{title}` and `{summary}` before sending.
pub const CATEGORIZE_PROMPT_TEMPLATE: &str = r#"ALLOWED CATEGORIES:
{taxonomy}

ARTICLE TITLE:
{title}

ARTICLE SUMMARY:
{summary}

Pick up to 3 categories from the allowed list that best describe this article for parents
of children with developmental needs. Use the category names exactly as listed.
Return a JSON object with this EXACT schema:
{"categories": ["..."]}"#;

/// Summaries longer than this are cut before prompting.
pub const MAX_SUMMARY_CHARS: usize = 1500;
