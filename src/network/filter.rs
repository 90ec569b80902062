// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Request selection for observers

use serde::{Deserialize, Serialize};

use super::event::{RequestDetails, ResourceType};

/// Matches every URL
pub const ALL_URLS: &str = "<all_urls>";

/// Selects which requests an observer sees
///
/// Plain membership tests. URLs are compared literally; only the
/// `<all_urls>` entry matches more than one URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestFilter {
    /// URLs to accept
    pub urls: Vec<String>,
    /// Resource types to accept, all when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub types: Option<Vec<ResourceType>>,
    /// Only requests of this tab
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<i64>,
    /// Only requests of this window
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_id: Option<i64>,
}

impl RequestFilter {
    /// Filter over a set of URLs
    pub fn new<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            urls: urls.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Filter accepting every request
    pub fn all() -> Self {
        Self::new([ALL_URLS])
    }

    /// Restrict to resource types
    pub fn types(mut self, types: Vec<ResourceType>) -> Self {
        self.types = Some(types);
        self
    }

    /// Restrict to a tab
    pub fn tab(mut self, tab_id: i64) -> Self {
        self.tab_id = Some(tab_id);
        self
    }

    /// Restrict to a window
    pub fn window(mut self, window_id: i64) -> Self {
        self.window_id = Some(window_id);
        self
    }

    /// Check if a request passes every criterion
    pub fn matches(&self, details: &RequestDetails) -> bool {
        let url_ok = self
            .urls
            .iter()
            .any(|u| u == ALL_URLS || *u == details.url);

        let type_ok = self
            .types
            .as_ref()
            .map(|types| types.contains(&details.resource_type))
            .unwrap_or(true);

        let tab_ok = self.tab_id.map(|t| t == details.tab_id).unwrap_or(true);

        let window_ok = self
            .window_id
            .map(|w| details.window_id == Some(w))
            .unwrap_or(true);

        url_ok && type_ok && tab_ok && window_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(url: &str, resource_type: ResourceType) -> RequestDetails {
        RequestDetails::new("1", url, "GET", resource_type).with_tab(5, Some(2))
    }

    #[test]
    fn test_all_urls() {
        let filter = RequestFilter::all();
        assert!(filter.matches(&details("https://a.example/", ResourceType::Image)));
    }

    #[test]
    fn test_exact_url_membership() {
        let filter = RequestFilter::new(["https://a.example/app.js"]);

        assert!(filter.matches(&details("https://a.example/app.js", ResourceType::Script)));
        assert!(!filter.matches(&details("https://a.example/other.js", ResourceType::Script)));
    }

    #[test]
    fn test_type_tab_window() {
        let filter = RequestFilter::all()
            .types(vec![ResourceType::MainFrame, ResourceType::Script])
            .tab(5)
            .window(2);

        assert!(filter.matches(&details("https://a.example/", ResourceType::MainFrame)));
        assert!(!filter.matches(&details("https://a.example/", ResourceType::Image)));
        assert!(!filter.clone().tab(6).matches(&details("https://a.example/", ResourceType::Script)));

        let no_window = RequestDetails::new("2", "https://a.example/", "GET", ResourceType::Script).with_tab(5, None);
        assert!(!filter.matches(&no_window));
    }

    #[test]
    fn test_empty_urls_match_nothing() {
        let filter = RequestFilter::default();
        assert!(!filter.matches(&details("https://a.example/", ResourceType::Other)));
    }
}
