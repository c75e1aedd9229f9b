// LLM prompt constants for activity top-up.

/// System prompt for generating one activity; enforces JSON-only output.
pub const ACTIVITY_SYSTEM: &str = "You are an expert child therapist who designs short, \
    playful developmental activities for parents to run at home. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Top-up prompt. Replace `{profile}`, `{samples}` and `{taken}` before sending.
pub const ACTIVITY_PROMPT_TEMPLATE: &str = r#"CHILD PROFILE:
{profile}

EXAMPLE ACTIVITIES (style reference):
{samples}

ACTIVITY NAMES ALREADY CHOSEN (do not repeat):
{taken}

Create ONE new activity for this child.
Return a JSON object with this EXACT schema:
{
  "Activity Name": "...",
  "Focus Area": "...",
  "Conditions": "...",
  "Keywords": "...",
  "Description": "...",
  "Delivery": "..."
}"#;
