// Shared prompt fragments. Each service that needs LLM calls defines its own prompts.rs
// alongside it and pulls cross-cutting pieces from here.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Appended to every prompt that produces content a parent will act on.
pub const CHILD_SAFETY_INSTRUCTION: &str = "\
    Everything you suggest must be safe for a child to do with light adult supervision at home. \
    Never suggest medication, diagnosis, or anything that replaces a qualified professional.";
