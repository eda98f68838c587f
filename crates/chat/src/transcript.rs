/// Stable identifier for one turn, unique within a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TurnId(pub u64);

impl TurnId {
    /// Creates a typed turn identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Chat speaker role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Assistant,
}

/// One message in the transcript. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    id: TurnId,
    role: Role,
    content: String,
}

impl Turn {
    pub(crate) fn new(id: TurnId, role: Role, content: impl Into<String>) -> Self {
        Self {
            id,
            role,
            content: content.into(),
        }
    }

    pub fn id(&self) -> TurnId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Ordered, append-only history of turns for the current session.
///
/// Only the session controller appends; everything else reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    turns: Vec<Turn>,
    next_turn_id: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn append(&mut self, role: Role, content: impl Into<String>) -> TurnId {
        let id = TurnId::new(self.next_turn_id);
        self.next_turn_id = self.next_turn_id.saturating_add(1);
        self.turns.push(Turn::new(id, role, content));
        id
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Turn> {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a Turn;
    type IntoIter = std::slice::Iter<'a, Turn>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_assigns_increasing_ids_in_creation_order() {
        let mut transcript = Transcript::new();
        let first = transcript.append(Role::User, "Hello");
        let second = transcript.append(Role::Assistant, "Hi there");
        let third = transcript.append(Role::User, "Hello");

        assert!(first < second && second < third);
        assert_eq!(transcript.len(), 3);

        // Identical content is kept as a separate turn.
        let contents = transcript
            .iter()
            .map(|turn| (turn.role(), turn.content()))
            .collect::<Vec<_>>();
        assert_eq!(
            contents,
            vec![
                (Role::User, "Hello"),
                (Role::Assistant, "Hi there"),
                (Role::User, "Hello"),
            ]
        );
    }

    #[test]
    fn empty_transcript_has_no_last_turn() {
        let transcript = Transcript::new();
        assert!(transcript.is_empty());
        assert!(transcript.last().is_none());
    }
}
