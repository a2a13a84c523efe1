//! Session ordering and title derivation.

use std::collections::HashMap;

use crate::core::ids::SessionId;
use crate::core::models::{ChatSession, truncate_with_ellipsis};

/// Pinned sessions first, then most recent activity first.
///
/// Ties keep their position in `insertion_order`, so unpinning a session
/// puts it back into the slot it had before it was pinned. Sessions missing
/// from `insertion_order` sort after the others of their group.
pub fn sort_sessions(sessions: &mut [ChatSession], insertion_order: &[SessionId]) {
    let rank: HashMap<SessionId, usize> = insertion_order
        .iter()
        .enumerate()
        .map(|(index, id)| (*id, index))
        .collect();
    let rank_of = |session: &ChatSession| rank.get(&session.id).copied().unwrap_or(usize::MAX);

    sessions.sort_by(|a, b| {
        b.is_pinned
            .cmp(&a.is_pinned)
            .then_with(|| b.updated_at.cmp(&a.updated_at))
            .then_with(|| rank_of(a).cmp(&rank_of(b)))
    });
}

/// Most recently active session, ignoring pins. Ties go to the earlier entry.
#[must_use]
pub fn most_recent(sessions: &[ChatSession]) -> Option<SessionId> {
    sessions
        .iter()
        .rev()
        .max_by_key(|session| session.updated_at)
        .map(|session| session.id)
}

/// Title for a new session: the first message cut to `max_chars` with `...`,
/// or `default_title` when there is no message.
#[must_use]
pub fn derive_title(
    initial_message: Option<&str>,
    max_chars: usize,
    default_title: &str,
) -> String {
    match initial_message.map(str::trim).filter(|m| !m.is_empty()) {
        Some(message) => truncate_with_ellipsis(message, max_chars),
        None => default_title.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ids::{UserId, WorkspaceId};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn session(title: &str, pinned: bool, minutes: i64) -> ChatSession {
        ChatSession {
            id: SessionId::new(),
            title: title.to_string(),
            last_message: None,
            is_pinned: pinned,
            workspace_id: WorkspaceId::new(),
            owner_id: UserId::new(),
            updated_at: at(minutes),
            messages: Vec::new(),
        }
    }

    fn titles(sessions: &[ChatSession]) -> Vec<&str> {
        sessions.iter().map(|s| s.title.as_str()).collect()
    }

    fn ids(sessions: &[ChatSession]) -> Vec<SessionId> {
        sessions.iter().map(|s| s.id).collect()
    }

    #[test]
    fn test_pinned_first_then_recent() {
        let mut sessions = vec![
            session("old", false, 1),
            session("pinned-old", true, 0),
            session("new", false, 5),
            session("pinned-new", true, 3),
        ];
        let order = ids(&sessions);
        sort_sessions(&mut sessions, &order);
        assert_eq!(titles(&sessions), vec!["pinned-new", "pinned-old", "new", "old"]);
    }

    #[test]
    fn test_pin_toggle_restores_slot() {
        let mut sessions = vec![
            session("a", false, 1),
            session("b", false, 1),
            session("c", false, 1),
        ];
        let order = ids(&sessions);
        sort_sessions(&mut sessions, &order);
        assert_eq!(titles(&sessions), vec!["a", "b", "c"]);

        sessions[1].is_pinned = true;
        sort_sessions(&mut sessions, &order);
        assert_eq!(titles(&sessions), vec!["b", "a", "c"]);

        sessions[0].is_pinned = false;
        sort_sessions(&mut sessions, &order);
        assert_eq!(titles(&sessions), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_unknown_sessions_sort_last_among_ties() {
        let mut sessions = vec![session("unknown", false, 1), session("known", false, 1)];
        let order = vec![sessions[1].id];
        sort_sessions(&mut sessions, &order);
        assert_eq!(titles(&sessions), vec!["known", "unknown"]);
    }

    #[test]
    fn test_most_recent_ignores_pins() {
        let sessions = vec![session("pinned", true, 0), session("fresh", false, 9)];
        assert_eq!(most_recent(&sessions), Some(sessions[1].id));
        assert_eq!(most_recent(&[]), None);
    }

    #[test]
    fn test_derive_title() {
        let message = "Help me plan my vacation to Japan this summer";
        assert_eq!(
            derive_title(Some(message), 30, "New Chat"),
            "Help me plan my vacation to Ja..."
        );
        assert_eq!(derive_title(Some("Short one"), 30, "New Chat"), "Short one");
        assert_eq!(derive_title(Some("   "), 30, "New Chat"), "New Chat");
        assert_eq!(derive_title(None, 30, "New Chat"), "New Chat");
    }
}
