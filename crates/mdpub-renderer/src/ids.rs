//! Deterministic, collision-free element ids.

use std::collections::HashSet;

/// What the id is generated for; selects the fallback for empty input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdKind {
    Heading,
    Other,
}

/// Generates ids unique within one compile.
#[derive(Debug, Default)]
pub struct IdGenerator {
    used: HashSet<String>,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep ASCII alphanumerics and `/ _ .`, turn whitespace and `-` into
    /// `-`, drop everything else. Collisions get a `-N` suffix.
    pub fn generate(&mut self, value: &str, kind: IdKind) -> String {
        let mut id: String = value
            .trim()
            .chars()
            .filter_map(|c| match c {
                c if c.is_ascii_alphanumeric() || matches!(c, '/' | '_' | '.') => Some(c),
                c if c.is_ascii_whitespace() || c == '-' => Some('-'),
                _ => None,
            })
            .collect();

        if id.is_empty() {
            id = match kind {
                IdKind::Heading => "heading",
                IdKind::Other => "id",
            }
            .to_owned();
        }

        if self.used.insert(id.clone()) {
            return id;
        }
        let mut n = 1;
        loop {
            let candidate = format!("{id}-{n}");
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}
