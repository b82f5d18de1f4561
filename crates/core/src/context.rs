//! Conversation context passed into and returned from each query

use serde::{Deserialize, Serialize};

use crate::SchemeTag;

/// Immutable per-conversation state.
///
/// Never mutated in place: every query returns a new context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationContext {
    /// Last fund the user mentioned
    pub last_scheme: Option<SchemeTag>,
    /// Number of answered turns
    pub turns: u32,
}

impl ConversationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scheme for the current turn: the one named in the query, else the remembered one
    pub fn resolve_scheme(&self, from_query: Option<SchemeTag>) -> Option<SchemeTag> {
        from_query.or(self.last_scheme)
    }

    /// Context after answering a turn about `scheme`
    pub fn advance(&self, scheme: Option<SchemeTag>) -> Self {
        Self {
            last_scheme: scheme.or(self.last_scheme),
            turns: self.turns.saturating_add(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_follow_up_uses_remembered_scheme() {
        let ctx = ConversationContext::new();
        let after_first = ctx.advance(Some(SchemeTag::Elss));

        assert_eq!(ctx.last_scheme, None);
        assert_eq!(after_first.resolve_scheme(None), Some(SchemeTag::Elss));
        assert_eq!(
            after_first.resolve_scheme(Some(SchemeTag::Hybrid)),
            Some(SchemeTag::Hybrid)
        );

        let after_second = after_first.advance(None);
        assert_eq!(after_second.last_scheme, Some(SchemeTag::Elss));
        assert_eq!(after_second.turns, 2);
    }
}
