/// System instruction for the chat assistant.
pub const ASSISTANT_SYSTEM: &str = "You are a helpful assistant for a Master's degree \
application tracker. You help the user manage their applications to universities in Germany \
and Switzerland. You can search, add, and update applications, track document preparation, \
and provide summaries. You also help track preparation for German language courses, GRE, and \
IELTS.

The user is targeting Fall 2027 intake, so they have time to research and prepare.

Be concise and helpful. When adding applications, confirm the details with the user. \
When showing data, format it nicely with bullet points or short summaries.";

/// System instruction for one-shot structured lookups such as auto-fill.
pub const JSON_ONLY_SYSTEM: &str = "You research university programs and answer with a \
single JSON object. No prose before or after it, no markdown fences.";

/// Returned when the model keeps requesting tools past the round limit
/// without producing any text.
pub const TOOL_LIMIT_FALLBACK: &str = "I ran into a limit while looking that up. \
Could you narrow the request down a little?";

/// Returned when the model answers with no text at all.
pub const EMPTY_REPLY_FALLBACK: &str = "I processed your request.";

/// Builds the prompt asking for program details to pre-fill a research entry.
pub fn autofill_prompt(university_name: &str, program_name: &str, country: Option<&str>) -> String {
    let location = country
        .map(|c| format!(" in {c}"))
        .unwrap_or_default();
    format!(
        "Provide details about the Master's program \"{program_name}\" at \"{university_name}\"{location}.

Return a JSON object with exactly these keys:
{{
  \"website\": \"official program page URL, or null if unknown\",
  \"ranking\": \"QS world ranking of the university as an integer, or null if unknown\",
  \"tuition_fees\": \"tuition per semester for non-EU students, as a short string\",
  \"requirements\": \"key admission requirements (degree, GPA, language tests), one short paragraph\",
  \"notes\": \"anything else worth knowing: deadlines, intake, program language\"
}}

Use null for anything you are not confident about. Do not invent URLs."
    )
}
