/// Emitted when the user sends the composer contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submit {
    pub content: String,
}

/// Emitted on every edit so the session draft mirrors the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftChanged {
    pub text: String,
}

/// Emitted when a welcome suggestion chip is picked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionPicked {
    pub prompt: String,
}

impl Submit {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}
