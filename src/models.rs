use serde::{Deserialize, Serialize};

/// Language code used for every chapter on the site
pub const ENGLISH: &str = "gb";

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MangaStatus {
    Ongoing,
    Completed,
    Unknown,
    Abandoned,
    Hiatus,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Tag {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TagSection {
    pub id: String,
    pub label: String,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Manga {
    pub id: String,
    /// Primary title first, alternative titles after it
    pub titles: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub status: MangaStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    pub tags: Vec<TagSection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub views: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follows: Option<u64>,
    pub hentai: bool,
    pub related_ids: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub id: String,
    pub manga_id: String,
    pub chap_num: f64,
    pub lang_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChapterDetails {
    pub id: String,
    pub manga_id: String,
    pub pages: Vec<String>,
    pub long_strip: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct IconText {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl IconText {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            icon: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MangaTile {
    pub id: String,
    pub title: IconText,
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle_text: Option<IconText>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_text: Option<IconText>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_text: Option<IconText>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<u32>,
}

/// Continuation marker attached to a page of listing results
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageCursor {
    NextPage {
        page: u32,
    },
    #[default]
    Done,
}

impl PageCursor {
    /// Cursor for the page after `page`, unless `page` was the last one
    pub fn after(page: u32, is_last: bool) -> Self {
        if is_last {
            PageCursor::Done
        } else {
            PageCursor::NextPage { page: page + 1 }
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct PagedResults {
    pub results: Vec<MangaTile>,
    pub metadata: PageCursor,
}

impl PagedResults {
    pub fn empty() -> Self {
        Self::default()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HomeSection {
    pub id: String,
    pub title: String,
    pub items: Vec<MangaTile>,
    pub view_more: bool,
}

/// Matches collected from a single page of the latest releases listing
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpdatedManga {
    pub ids: Vec<String>,
    /// False once the page reached entries older than the cutoff
    pub load_more: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct MangaUpdates {
    pub ids: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub title: Option<String>,
    #[serde(default)]
    pub included_tags: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_cursor_shape() {
        let next = serde_json::to_value(PageCursor::after(1, false)).unwrap();
        assert_eq!(next, serde_json::json!({"kind": "next_page", "page": 2}));

        let done = serde_json::to_value(PageCursor::after(7, true)).unwrap();
        assert_eq!(done, serde_json::json!({"kind": "done"}));
    }

    #[test]
    fn test_status_serializes_by_name() {
        let value = serde_json::to_value(MangaStatus::Completed).unwrap();
        assert_eq!(value, serde_json::json!("COMPLETED"));
    }

    #[test]
    fn test_empty_results_body() {
        let body = serde_json::to_value(PagedResults::empty()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"results": [], "metadata": {"kind": "done"}})
        );
    }
}
