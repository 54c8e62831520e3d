use crate::model::{ScanMode, TabId};
use serde::{Deserialize, Serialize};

pub const PARENT_MENU_ID: &str = "linkscan";
pub const QUICK_SCAN_ID: &str = "quick-scan";
pub const DEEP_SCAN_ID: &str = "deep-scan";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MenuContext {
    Link,
    Page,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuItem {
    pub id: &'static str,
    pub title: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<&'static str>,
    pub contexts: Vec<MenuContext>,
}

/// The parent entry followed by its two scan children.
pub fn menu_items() -> Vec<MenuItem> {
    let contexts = vec![MenuContext::Link, MenuContext::Page];
    vec![
        MenuItem {
            id: PARENT_MENU_ID,
            title: "Scan with LinkScanner",
            parent: None,
            contexts: contexts.clone(),
        },
        MenuItem {
            id: QUICK_SCAN_ID,
            title: "Quick Scan",
            parent: Some(PARENT_MENU_ID),
            contexts: contexts.clone(),
        },
        MenuItem {
            id: DEEP_SCAN_ID,
            title: "Deep Scan",
            parent: Some(PARENT_MENU_ID),
            contexts,
        },
    ]
}

pub fn mode_for_item(id: &str) -> Option<ScanMode> {
    match id {
        QUICK_SCAN_ID => Some(ScanMode::Quick),
        DEEP_SCAN_ID => Some(ScanMode::Enhanced),
        _ => None,
    }
}

/// A context-menu activation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MenuClick {
    pub menu_item_id: String,
    pub link_url: Option<String>,
    pub page_url: Option<String>,
}

impl MenuClick {
    pub fn new(menu_item_id: impl Into<String>) -> Self {
        Self {
            menu_item_id: menu_item_id.into(),
            ..Self::default()
        }
    }

    pub fn with_link(mut self, url: impl Into<String>) -> Self {
        self.link_url = Some(url.into());
        self
    }

    pub fn with_page(mut self, url: impl Into<String>) -> Self {
        self.page_url = Some(url.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabInfo {
    pub id: TabId,
    pub url: Option<String>,
}

/// Link URL, then page URL, then the tab's own URL. Blank values are skipped.
pub fn resolve_target<'a>(click: &'a MenuClick, tab: &'a TabInfo) -> Option<&'a str> {
    [&click.link_url, &click.page_url, &tab.url]
        .into_iter()
        .filter_map(|url| url.as_deref())
        .map(str::trim)
        .find(|url| !url.is_empty())
}
