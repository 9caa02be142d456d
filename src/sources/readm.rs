use crate::document::Document;
use crate::error::{Result, ScrapeError};
use crate::models::{
    Chapter, ChapterDetails, HomeSection, Manga, MangaUpdates, PageCursor, PagedResults,
    SearchRequest, TagSection,
};
use crate::source_utils::{FetchRequest, Fetcher};
use crate::sources::readm_parser::{
    self, is_last_page, ListingLayout, LATEST_LAYOUT, POPULAR_LAYOUT,
};
use chrono::{DateTime, Utc};
use reqwest::Url;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub const BASE_URL: &str = "https://readm.org";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Sections that can be paged through with `get_view_more_items`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    PopularManga,
    LatestUpdates,
}

impl Section {
    pub fn id(&self) -> &'static str {
        match self {
            Section::PopularManga => "popular_manga",
            Section::LatestUpdates => "latest_updates",
        }
    }

    fn path(&self, page: u32) -> String {
        match self {
            Section::PopularManga => format!("/popular-manga/{}", page),
            Section::LatestUpdates => format!("/latest-releases/{}", page),
        }
    }

    fn layout(&self) -> &'static ListingLayout {
        match self {
            Section::PopularManga => &POPULAR_LAYOUT,
            Section::LatestUpdates => &LATEST_LAYOUT,
        }
    }
}

impl FromStr for Section {
    type Err = ScrapeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "popular_manga" => Ok(Section::PopularManga),
            "latest_updates" => Ok(Section::LatestUpdates),
            other => Err(ScrapeError::InvalidSection(other.to_string())),
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone)]
pub struct ReadmOptions {
    pub long_strip_threshold: usize,
    pub max_update_pages: u32,
}

impl Default for ReadmOptions {
    fn default() -> Self {
        Self {
            long_strip_threshold: 60,
            max_update_pages: 25,
        }
    }
}

/// Next move of the update walker after a page has been parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkStep {
    Request(u32),
    Done,
}

impl WalkStep {
    /// Continue to the next page unless the page said stop, was the last one,
    /// or the page ceiling is reached
    pub fn after(page: u32, load_more: bool, last_page: bool, max_pages: u32) -> Self {
        if !load_more || last_page || page >= max_pages {
            WalkStep::Done
        } else {
            WalkStep::Request(page + 1)
        }
    }
}

/// The Readm manga site
///
/// Each operation is one fetch (or, for the update walker, a bounded series of
/// fetches) followed by synchronous extraction. Parsed documents never live across
/// an await point.
pub struct Readm {
    fetcher: Arc<dyn Fetcher>,
    base_url: Url,
    options: ReadmOptions,
}

impl Readm {
    pub fn new(fetcher: Arc<dyn Fetcher>, base_url: Url, options: ReadmOptions) -> Self {
        Self {
            fetcher,
            base_url,
            options,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    async fn fetch(&self, request: FetchRequest) -> Result<String> {
        log::debug!("{} {}", request.method, request.url);
        Ok(self.fetcher.fetch(request).await?)
    }

    fn manga_path(manga_id: &str) -> String {
        format!("/manga/{}", urlencoding::encode(manga_id))
    }

    fn manga_page_request(&self, manga_id: &str) -> FetchRequest {
        FetchRequest::get(self.url(&Self::manga_path(manga_id)))
            .header("content-type", FORM_CONTENT_TYPE)
    }

    pub fn manga_share_url(&self, manga_id: &str) -> String {
        self.url(&Self::manga_path(manga_id))
    }

    pub async fn get_manga_details(&self, manga_id: &str) -> Result<Manga> {
        let raw = self.fetch(self.manga_page_request(manga_id)).await?;
        let doc = Document::parse(&raw, &self.base_url);
        readm_parser::parse_manga_details(&doc, manga_id)
    }

    pub async fn get_chapters(&self, manga_id: &str) -> Result<Vec<Chapter>> {
        let raw = self.fetch(self.manga_page_request(manga_id)).await?;
        let doc = Document::parse(&raw, &self.base_url);
        Ok(readm_parser::parse_chapters(&doc, manga_id))
    }

    pub async fn get_chapter_details(
        &self,
        manga_id: &str,
        chapter_id: &str,
    ) -> Result<ChapterDetails> {
        let url = self.url(&format!(
            "{}/{}/all-pages",
            Self::manga_path(manga_id),
            urlencoding::encode(chapter_id)
        ));
        let raw = self.fetch(FetchRequest::get(url)).await?;
        let doc = Document::parse(&raw, &self.base_url);
        readm_parser::parse_chapter_details(
            &doc,
            manga_id,
            chapter_id,
            self.options.long_strip_threshold,
        )
    }

    pub async fn get_tags(&self) -> Result<Vec<TagSection>> {
        let raw = self.fetch(FetchRequest::get(self.url("/"))).await?;
        let doc = Document::parse(&raw, &self.base_url);
        Ok(readm_parser::parse_tags(&doc))
    }

    pub async fn get_home_sections(&self) -> Result<Vec<HomeSection>> {
        let raw = self.fetch(FetchRequest::get(self.url("/"))).await?;
        let doc = Document::parse(&raw, &self.base_url);
        Ok(readm_parser::parse_home_sections(&doc))
    }

    pub async fn get_view_more_items(&self, section_id: &str, page: u32) -> Result<PagedResults> {
        let section: Section = section_id.parse()?;
        let page = validate_page(page)?;
        self.get_listing(&section.path(page), section.layout(), page)
            .await
    }

    /// Title search through the site's search API, or a genre listing when only a tag is given
    pub async fn get_search_results(
        &self,
        query: &SearchRequest,
        page: u32,
    ) -> Result<PagedResults> {
        let page = validate_page(page)?;

        if let Some(title) = query.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let body = format!("dataType=json&phrase={}", urlencoding::encode(title));
            let request = FetchRequest::post(self.url("/service/search"), body)
                .header("X-Requested-With", "XMLHttpRequest")
                .header("Content-type", FORM_CONTENT_TYPE)
                .header("accept", "application/json");
            let raw = self.fetch(request).await?;
            return Ok(PagedResults {
                results: readm_parser::parse_search_json(&raw, &self.base_url)?,
                metadata: PageCursor::Done,
            });
        }

        match query.included_tags.first().map(|tag| tag.trim()) {
            Some(tag) if !tag.is_empty() => {
                let path = format!("/category/{}/watch/{}", urlencoding::encode(tag), page);
                self.get_listing(&path, &POPULAR_LAYOUT, page).await
            }
            _ => Err(ScrapeError::InvalidRequest(
                "search needs a title or a genre tag".to_string(),
            )),
        }
    }

    async fn get_listing(
        &self,
        path: &str,
        layout: &ListingLayout,
        page: u32,
    ) -> Result<PagedResults> {
        let raw = self.fetch(FetchRequest::get(self.url(path))).await?;
        let doc = Document::parse(&raw, &self.base_url);
        Ok(PagedResults {
            results: readm_parser::parse_view_more(&doc, layout),
            metadata: PageCursor::after(page, is_last_page(&doc)),
        })
    }

    /// Walk the latest releases listing and report which of `ids` were updated since `cutoff`
    pub async fn filter_updated_manga(
        &self,
        cutoff: DateTime<Utc>,
        ids: &[String],
    ) -> Result<MangaUpdates> {
        let wanted: HashSet<String> = ids.iter().cloned().collect();
        let mut found = BTreeSet::new();
        let mut step = WalkStep::Request(1);

        while let WalkStep::Request(page) = step {
            let raw = self
                .fetch(FetchRequest::get(self.url(&format!("/latest-releases/{}", page))))
                .await?;

            let (batch, last_page) = {
                let doc = Document::parse(&raw, &self.base_url);
                let batch = readm_parser::parse_updated_manga(&doc, cutoff, &wanted, Utc::now());
                (batch, is_last_page(&doc))
            };

            log::debug!(
                "latest-releases page {}: {} matches, load_more={}, last_page={}",
                page,
                batch.ids.len(),
                batch.load_more,
                last_page
            );

            let max_pages = self.options.max_update_pages;
            if batch.load_more && !last_page && page >= max_pages {
                log::warn!(
                    "Stopped walking latest releases at the {} page ceiling",
                    max_pages
                );
            }

            found.extend(batch.ids);
            step = WalkStep::after(page, batch.load_more, last_page, max_pages);
        }

        Ok(MangaUpdates {
            ids: found.into_iter().collect(),
        })
    }
}

fn validate_page(page: u32) -> Result<u32> {
    if page == 0 {
        Err(ScrapeError::InvalidRequest(
            "page numbers start at 1".to_string(),
        ))
    } else {
        Ok(page)
    }
}
