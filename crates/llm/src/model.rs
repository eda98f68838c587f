pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Provider identifiers understood by [`crate::create_backend`].
pub const GEMINI_PROVIDER_ID: &str = "gemini";
pub const OPENAI_PROVIDER_ID: &str = "openai";

/// Resolves the model used when settings leave the model blank.
pub fn default_model_for(provider_id: &str) -> &'static str {
    match provider_id.trim() {
        OPENAI_PROVIDER_ID | "rig-openai" => DEFAULT_OPENAI_MODEL,
        _ => DEFAULT_GEMINI_MODEL,
    }
}

/// Normalizes provider aliases into one of the supported identifiers.
///
/// Blank input resolves to Gemini. Unknown identifiers are returned trimmed so the
/// factory can report them.
pub fn canonical_provider_id(provider_id: &str) -> String {
    match provider_id.trim() {
        "" | GEMINI_PROVIDER_ID | "google" | "rig-gemini" => GEMINI_PROVIDER_ID.to_string(),
        OPENAI_PROVIDER_ID | "rig-openai" => OPENAI_PROVIDER_ID.to_string(),
        other => other.to_string(),
    }
}
