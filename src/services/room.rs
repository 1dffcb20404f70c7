//! Room token parsing.
//!
//! Client versions have written room identifiers in three shapes: a bare
//! numeric student id (`"32"`), a prefixed private room (`"private_32"`)
//! and a composite pair (`"31_32"`, lower id first). Tokens are parsed once
//! here and every lookup works off the parsed form, so the string heuristics
//! never leak into query call sites.

/// A room token, parsed at the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomToken {
    /// Bare numeric id, e.g. `"32"`.
    Numeric(i64),
    /// Non-numeric prefix followed by an id, e.g. `"private_32"`.
    Prefixed(i64),
    /// Two numeric segments, e.g. `"31_32"`.
    Composite(i64, i64),
    /// Anything that fits none of the known conventions.
    Opaque(String),
}

impl RoomToken {
    pub fn parse(token: &str) -> Self {
        match token.rsplit_once('_') {
            Some((head, tail)) => match (head.parse::<i64>(), tail.parse::<i64>()) {
                (Ok(a), Ok(b)) => RoomToken::Composite(a, b),
                (Err(_), Ok(id)) => RoomToken::Prefixed(id),
                _ => RoomToken::Opaque(token.to_string()),
            },
            None => match token.parse::<i64>() {
                Ok(id) => RoomToken::Numeric(id),
                Err(_) => RoomToken::Opaque(token.to_string()),
            },
        }
    }

    /// Probable "other side" of the conversation. For composite tokens the
    /// segment that is not `context_id` wins; with no context the last
    /// segment is taken, matching how tokens were historically built
    /// (`"<lowerId>_<higherId>"`). Heuristic only: `Opaque` tokens carry no
    /// usable id and yield `None`.
    pub fn counterpart(&self, context_id: Option<i64>) -> Option<i64> {
        match *self {
            RoomToken::Numeric(id) | RoomToken::Prefixed(id) => Some(id),
            RoomToken::Composite(a, b) => match context_id {
                Some(c) if c == a => Some(b),
                Some(c) if c == b => Some(a),
                _ => Some(b),
            },
            RoomToken::Opaque(_) => None,
        }
    }
}

/// The set of lookup keys that could legitimately refer to one conversation,
/// in match order: exact token, bare id, `id_%` prefix, `%_id` suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomCandidates {
    pub exact: String,
    pub participant: String,
    pub prefix_pattern: String,
    pub suffix_pattern: String,
    pub participant_id: Option<i64>,
}

pub fn candidates(token: &str, viewer_id: Option<i64>) -> RoomCandidates {
    let participant_id = RoomToken::parse(token).counterpart(viewer_id);
    // Unparsable tokens fall back to the raw token, so the exact-match arms
    // still work and the id arms match nothing.
    let participant = participant_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| token.to_string());

    RoomCandidates {
        exact: token.to_string(),
        prefix_pattern: format!("{}_%", participant),
        suffix_pattern: format!("%_{}", participant),
        participant,
        participant_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_numeric_token() {
        assert_eq!(RoomToken::parse("32"), RoomToken::Numeric(32));
    }

    #[test]
    fn parses_private_prefixed_token() {
        assert_eq!(RoomToken::parse("private_32"), RoomToken::Prefixed(32));
    }

    #[test]
    fn parses_composite_token() {
        assert_eq!(RoomToken::parse("31_32"), RoomToken::Composite(31, 32));
    }

    #[test]
    fn unknown_shapes_are_opaque() {
        assert_eq!(
            RoomToken::parse("class-7b"),
            RoomToken::Opaque("class-7b".to_string())
        );
        assert_eq!(
            RoomToken::parse("group_chat"),
            RoomToken::Opaque("group_chat".to_string())
        );
    }

    #[test]
    fn counterpart_prefers_segment_that_is_not_the_context() {
        let token = RoomToken::parse("31_32");
        assert_eq!(token.counterpart(Some(31)), Some(32));
        assert_eq!(token.counterpart(Some(32)), Some(31));
    }

    #[test]
    fn counterpart_without_context_takes_last_segment() {
        assert_eq!(RoomToken::parse("31_32").counterpart(None), Some(32));
    }

    #[test]
    fn opaque_token_has_no_counterpart() {
        assert_eq!(RoomToken::parse("class-7b").counterpart(Some(31)), None);
    }

    #[test]
    fn candidates_cover_all_historical_conventions() {
        let c = candidates("31_32", Some(31));
        assert_eq!(c.exact, "31_32");
        assert_eq!(c.participant, "32");
        assert_eq!(c.prefix_pattern, "32_%");
        assert_eq!(c.suffix_pattern, "%_32");
        assert_eq!(c.participant_id, Some(32));
    }

    #[test]
    fn candidates_for_opaque_token_fall_back_to_raw_token() {
        let c = candidates("class-7b", None);
        assert_eq!(c.exact, "class-7b");
        assert_eq!(c.participant, "class-7b");
        assert_eq!(c.participant_id, None);
    }
}
