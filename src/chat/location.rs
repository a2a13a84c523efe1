//! Mirror of the active workspace in a navigable URL.

use url::Url;

use crate::core::ids::WorkspaceId;

/// Query parameter carrying the active workspace.
pub const WORKSPACE_PARAM: &str = "workspace";

/// `base` with its `workspace` parameter set to `workspace` (or removed).
///
/// Other query parameters are kept in order.
#[must_use]
pub fn with_workspace(base: &Url, workspace: Option<WorkspaceId>) -> Url {
    let mut url = base.clone();
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != WORKSPACE_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    url.set_query(None);
    if !kept.is_empty() || workspace.is_some() {
        let mut query = url.query_pairs_mut();
        query.extend_pairs(kept);
        if let Some(id) = workspace {
            query.append_pair(WORKSPACE_PARAM, &id.to_string());
        }
    }
    url
}

/// Workspace named by the `workspace` parameter, if it parses.
#[must_use]
pub fn workspace_from(url: &Url) -> Option<WorkspaceId> {
    url.query_pairs()
        .find(|(key, _)| key == WORKSPACE_PARAM)
        .and_then(|(_, value)| value.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_keeps_other_params() {
        let base = Url::parse("https://app.katagrafy.ai/chat?tab=files&workspace=old").unwrap();
        let id = WorkspaceId::new();
        let url = with_workspace(&base, Some(id));
        assert_eq!(
            url.as_str(),
            format!("https://app.katagrafy.ai/chat?tab=files&workspace={id}")
        );
        assert_eq!(workspace_from(&url), Some(id));
    }

    #[test]
    fn test_clearing_removes_query() {
        let base = Url::parse("https://app.katagrafy.ai/chat?workspace=x").unwrap();
        let url = with_workspace(&base, None);
        assert_eq!(url.as_str(), "https://app.katagrafy.ai/chat");
        assert_eq!(workspace_from(&url), None);
    }

    #[test]
    fn test_garbage_id_is_ignored() {
        let url = Url::parse("https://app.katagrafy.ai/?workspace=not-a-uuid").unwrap();
        assert_eq!(workspace_from(&url), None);
    }
}
