//! Extraction functions for Readm pages.
//!
//! Every function here is synchronous and works on an already fetched body, so the
//! same code runs against live pages and test fixtures. Listing cards and search API
//! records both go through [`TileSource`], which owns the validation that turns a raw
//! entry into a [`MangaTile`].

use crate::document::{Document, Node};
use crate::error::{Result, ScrapeError};
use crate::helpers::{
    category_id_from_href, chapter_id_from_href, is_mature, manga_id_from_href, parse_chapter_name,
    parse_chapter_number, parse_count, parse_rating, parse_release_date, parse_status,
    parse_volume, split_alt_titles,
};
use crate::models::{
    Chapter, ChapterDetails, HomeSection, IconText, Manga, MangaStatus, MangaTile, Tag,
    TagSection, UpdatedManga, ENGLISH,
};
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde_json::Value;
use std::collections::HashSet;

/// Where the pieces of a listing card live
///
/// `title` selectors are tried in order; the card image's `alt` text is the last resort.
pub struct ListingLayout {
    pub card: &'static str,
    pub link: &'static str,
    pub title: &'static [&'static str],
    pub image: &'static str,
    pub subtitle: Option<&'static str>,
}

/// `/popular-manga/{page}` and `/category/{tag}/watch/{page}`
pub const POPULAR_LAYOUT: ListingLayout = ListingLayout {
    card: "ul.filter-results li.mb-lg",
    link: "div.subject-title a",
    title: &["div.subject-title a", "h2"],
    image: "img",
    subtitle: Some("div.genres"),
};

/// `/latest-releases/{page}` and the homepage latest updates block
pub const LATEST_LAYOUT: ListingLayout = ListingLayout {
    card: "ul.latest-updates div.poster.poster-xs",
    link: "a",
    title: &["h2", "div.poster-subject h2 a"],
    image: "img",
    subtitle: Some("ul.chapters li a"),
};

pub const HOT_LAYOUT: ListingLayout = ListingLayout {
    card: "div#manga-hot-updates div.item",
    link: "a",
    title: &["strong", "div.caption"],
    image: "img",
    subtitle: Some("span.chapter"),
};

pub const NEW_LAYOUT: ListingLayout = ListingLayout {
    card: "ul#latest_trailers li",
    link: "a",
    title: &["h6", "h2"],
    image: "img",
    subtitle: None,
};

const MANGA_TITLE: &str = "h1.page-title";
const ALT_TITLES: [&str; 2] = ["div.sub-title.pt-sm", "div.sub-title"];
const COVER: &str = "img.series-profile-thumb";
const STATUS: [&str; 2] = ["span.series-status", "div.series-status"];
const AUTHOR: &str = "#first_episode small";
const ARTIST: &str = "#last_episode small";
const DESCRIPTION: [&str; 2] = ["div.series-summary-wrapper p", "p span"];
const GENRES: &str = "div.series-summary-wrapper div.ui.list div.item a";
const RATING: [&str; 2] = ["div.color-imdb", "span.rating"];
const META_ROWS: &str = "div.media-meta tr";
const RELATED: &str = "div.related-manga a";

const CHAPTER_ROWS: [&str; 2] = ["div.season_start tr", "div.season_start"];
const CHAPTER_LINK: [&str; 2] = ["td h6 a", "a"];
const CHAPTER_DATE: &str = "td.episode-date";

const READER_CONTAINERS: [&str; 2] = ["div.ch-images", "center"];
const SCROLL_MARKERS: [&str; 3] = ["long-strip", "webtoon", "scroll"];

const PAGINATION: &str = "div.ui.pagination.menu";
const NEXT_LABELS: [&str; 3] = ["»", "›", "next"];

const TRENDING_GENRES: &str = "ul.trending-thisweek.categories li a";
const RELEASE_DATE: &str = "span.date";

/// Unvalidated listing entry, as found in a page or API payload
#[derive(Debug, Default, Clone)]
pub struct RawTile {
    pub href: Option<String>,
    pub title: Option<String>,
    pub image: Option<String>,
    pub subtitle: Option<String>,
}

/// Anything that yields listing entries
pub trait TileSource {
    /// Base url that relative image paths resolve against
    fn base(&self) -> &Url;

    fn raw_tiles(&self) -> Vec<RawTile>;

    /// Validated tiles in source order, first occurrence of each id kept
    fn tiles(&self) -> Vec<MangaTile> {
        let mut seen = HashSet::new();
        self.raw_tiles()
            .into_iter()
            .filter_map(|raw| build_tile(raw, self.base()))
            .filter(|tile| seen.insert(tile.id.clone()))
            .collect()
    }
}

fn build_tile(raw: RawTile, base: &Url) -> Option<MangaTile> {
    let id = raw.href.as_deref().and_then(manga_id_from_href);
    let title = raw.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());

    let (Some(id), Some(title)) = (id, title) else {
        log::warn!(
            "Skipping listing entry without id or title (href: {:?})",
            raw.href
        );
        return None;
    };

    let image = raw
        .image
        .as_deref()
        .and_then(|src| base.join(src.trim()).ok())
        .map(|url| url.to_string())
        .unwrap_or_default();

    Some(MangaTile {
        id,
        title: IconText::new(title),
        image,
        subtitle_text: raw.subtitle.filter(|s| !s.is_empty()).map(IconText::new),
        primary_text: None,
        secondary_text: None,
        badge: None,
    })
}

/// Cards of an HTML listing page
pub struct ListingPage<'a> {
    doc: &'a Document,
    layout: &'a ListingLayout,
}

impl<'a> ListingPage<'a> {
    pub fn new(doc: &'a Document, layout: &'a ListingLayout) -> Self {
        Self { doc, layout }
    }

    fn raw_tile(&self, card: Node<'_>) -> RawTile {
        let layout = self.layout;
        let href = card
            .select_first(layout.link)
            .and_then(|link| link.attr("href"))
            .map(str::to_string);
        let image_node = card.select_first(layout.image);
        let title = layout
            .title
            .iter()
            .filter_map(|query| card.select_first(query))
            .map(|node| node.text())
            .find(|text| !text.is_empty())
            .or_else(|| image_node.and_then(|img| img.attr("alt")).map(str::to_string));

        RawTile {
            href,
            title,
            image: image_node.and_then(|img| img.image_src()).map(str::to_string),
            subtitle: layout
                .subtitle
                .and_then(|query| card.select_first(query))
                .map(|node| node.text()),
        }
    }
}

impl TileSource for ListingPage<'_> {
    fn base(&self) -> &Url {
        self.doc.base()
    }

    fn raw_tiles(&self) -> Vec<RawTile> {
        self.doc
            .select(self.layout.card)
            .into_iter()
            .map(|card| self.raw_tile(card))
            .collect()
    }
}

/// Records returned by the `/service/search` endpoint
pub struct SearchApiPayload {
    entries: Vec<RawTile>,
    base: Url,
}

impl SearchApiPayload {
    /// Parse `{"manga": [{"url", "title", "image"}, ...]}`
    pub fn parse(raw: &str, base: &Url) -> Result<Self> {
        let value: Value = serde_json::from_str(raw).map_err(|e| {
            ScrapeError::UpstreamContract(format!("search response is not JSON: {}", e))
        })?;
        let records = value
            .get("manga")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                ScrapeError::UpstreamContract(
                    "search response is missing the manga property".to_string(),
                )
            })?;

        let field = |record: &Value, name: &str| {
            record
                .get(name)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let entries = records
            .iter()
            .map(|record| RawTile {
                href: field(record, "url"),
                title: field(record, "title"),
                image: field(record, "image"),
                subtitle: None,
            })
            .collect();

        Ok(Self {
            entries,
            base: base.clone(),
        })
    }
}

impl TileSource for SearchApiPayload {
    fn base(&self) -> &Url {
        &self.base
    }

    fn raw_tiles(&self) -> Vec<RawTile> {
        self.entries.clone()
    }
}

pub fn parse_search_json(raw: &str, base: &Url) -> Result<Vec<MangaTile>> {
    Ok(SearchApiPayload::parse(raw, base)?.tiles())
}

pub fn parse_view_more(doc: &Document, layout: &ListingLayout) -> Vec<MangaTile> {
    ListingPage::new(doc, layout).tiles()
}

pub fn parse_manga_details(doc: &Document, manga_id: &str) -> Result<Manga> {
    let title = doc.text_of(MANGA_TITLE).ok_or_else(|| {
        ScrapeError::MalformedDocument(format!("no title on manga page for '{}'", manga_id))
    })?;

    let mut titles = vec![title];
    if let Some(alt) = ALT_TITLES.iter().find_map(|query| doc.text_of(query)) {
        for alt_title in split_alt_titles(&alt) {
            if !titles.contains(&alt_title) {
                titles.push(alt_title);
            }
        }
    }

    let image = doc
        .select_first(COVER)
        .and_then(|img| img.image_src())
        .and_then(|src| doc.resolve_url(src))
        .map(|url| url.to_string());

    let status = STATUS
        .iter()
        .find_map(|query| doc.text_of(query))
        .map(|text| parse_status(&text))
        .unwrap_or(MangaStatus::Unknown);

    let desc = DESCRIPTION
        .iter()
        .map(|query| {
            doc.select(query)
                .into_iter()
                .map(|p| p.text())
                .filter(|text| !text.is_empty())
                .collect::<Vec<_>>()
        })
        .find(|paragraphs| !paragraphs.is_empty())
        .map(|paragraphs| paragraphs.join("\n"));

    let genres = parse_genre_links(doc.select(GENRES));

    let mut views = None;
    let mut follows = None;
    for row in doc.select(META_ROWS) {
        let cells = row.select("td");
        let (Some(label), Some(value)) = (cells.first(), cells.last()) else {
            continue;
        };
        let label = label.text().to_lowercase();
        if label.contains("view") {
            views = parse_count(&value.text());
        } else if label.contains("follow") || label.contains("subscri") {
            follows = parse_count(&value.text());
        }
    }

    let mut related_ids: Vec<String> = Vec::new();
    for link in doc.select(RELATED) {
        if let Some(id) = link.attr("href").and_then(manga_id_from_href) {
            if id != manga_id && !related_ids.contains(&id) {
                related_ids.push(id);
            }
        }
    }

    Ok(Manga {
        id: manga_id.to_string(),
        titles,
        image,
        status,
        rating: RATING
            .iter()
            .find_map(|query| doc.text_of(query))
            .and_then(|text| parse_rating(&text)),
        artist: doc.text_of(ARTIST),
        author: doc.text_of(AUTHOR),
        desc,
        hentai: is_mature(&genres),
        tags: vec![genre_section(genres)],
        views,
        follows,
        related_ids,
    })
}

pub fn parse_chapters(doc: &Document, manga_id: &str) -> Vec<Chapter> {
    let mut chapters = Vec::new();

    for row in doc.select_any(&CHAPTER_ROWS) {
        let Some(link) = CHAPTER_LINK.iter().find_map(|query| row.select_first(query)) else {
            continue;
        };
        let Some(id) = link
            .attr("href")
            .and_then(chapter_id_from_href)
            .filter(|id| id != manga_id)
        else {
            log::warn!("Skipping chapter row without a chapter link in '{}'", manga_id);
            continue;
        };

        let label = link.text();
        let Some(chap_num) = parse_chapter_number(&label) else {
            log::warn!("Skipping chapter '{}' of '{}': no number in '{}'", id, manga_id, label);
            continue;
        };

        chapters.push(Chapter {
            id,
            manga_id: manga_id.to_string(),
            chap_num,
            lang_code: row.attr("data-lang").unwrap_or(ENGLISH).to_string(),
            name: parse_chapter_name(&label),
            volume: parse_volume(&label),
            group: None,
            time: row
                .select_first(CHAPTER_DATE)
                .map(|node| node.text())
                .filter(|text| !text.is_empty()),
        });
    }

    chapters
}

pub fn parse_chapter_details(
    doc: &Document,
    manga_id: &str,
    chapter_id: &str,
    long_strip_threshold: usize,
) -> Result<ChapterDetails> {
    let containers = doc.select_any(&READER_CONTAINERS);

    let pages: Vec<String> = containers
        .iter()
        .flat_map(|container| container.select("img"))
        .filter_map(|img| img.image_src())
        .filter_map(|src| doc.resolve_url(src))
        .map(|url| url.to_string())
        .collect();

    if pages.is_empty() {
        return Err(ScrapeError::MalformedDocument(format!(
            "no pages found for chapter '{}' of '{}'",
            chapter_id, manga_id
        )));
    }

    let scroll_marked = containers.iter().any(|container| {
        SCROLL_MARKERS.iter().any(|marker| container.has_class(marker))
            || container
                .attr("data-reader-mode")
                .is_some_and(|mode| mode.eq_ignore_ascii_case("scroll"))
    });

    Ok(ChapterDetails {
        id: chapter_id.to_string(),
        manga_id: manga_id.to_string(),
        long_strip: scroll_marked || pages.len() > long_strip_threshold,
        pages,
    })
}

/// Matches on one page of the latest releases listing
///
/// Collects entries released at or after `cutoff` whose id is in `ids`. `load_more`
/// turns false once an entry older than the cutoff shows up, or the page is empty.
pub fn parse_updated_manga(
    doc: &Document,
    cutoff: DateTime<Utc>,
    ids: &HashSet<String>,
    now: DateTime<Utc>,
) -> UpdatedManga {
    let cards = doc.select(LATEST_LAYOUT.card);
    let mut updated = UpdatedManga {
        ids: Vec::new(),
        load_more: !cards.is_empty(),
    };

    for card in cards {
        let Some(id) = card
            .select_first(LATEST_LAYOUT.link)
            .and_then(|link| link.attr("href"))
            .and_then(manga_id_from_href)
        else {
            continue;
        };
        let Some(released) = card
            .select_first(RELEASE_DATE)
            .and_then(|date| parse_release_date(&date.text(), now))
        else {
            log::debug!("No release date for '{}' on latest releases", id);
            continue;
        };

        if released < cutoff {
            updated.load_more = false;
        } else if ids.contains(&id) && !updated.ids.contains(&id) {
            updated.ids.push(id);
        }
    }

    updated
}

/// True unless the pagination control offers an enabled "next" item
pub fn is_last_page(doc: &Document) -> bool {
    let Some(pagination) = doc.select_first(PAGINATION) else {
        return true;
    };

    let has_next = pagination.select("a, .item").into_iter().any(|item| {
        if item.has_class("disabled") {
            return false;
        }
        item.attr("rel").is_some_and(|rel| rel.eq_ignore_ascii_case("next"))
            || NEXT_LABELS.contains(&item.text().to_lowercase().as_str())
    });

    !has_next
}

pub fn parse_tags(doc: &Document) -> Vec<TagSection> {
    vec![genre_section(parse_genre_links(doc.select(TRENDING_GENRES)))]
}

pub fn parse_home_sections(doc: &Document) -> Vec<HomeSection> {
    let sections: [(&str, &str, &ListingLayout, bool); 3] = [
        ("hot_updates", "Hot Updates", &HOT_LAYOUT, false),
        ("latest_updates", "Latest Updates", &LATEST_LAYOUT, true),
        ("new_manga", "New Manga", &NEW_LAYOUT, false),
    ];

    sections
        .into_iter()
        .map(|(id, title, layout, view_more)| HomeSection {
            id: id.to_string(),
            title: title.to_string(),
            items: parse_view_more(doc, layout),
            view_more,
        })
        .collect()
}

fn parse_genre_links(links: Vec<Node<'_>>) -> Vec<Tag> {
    let mut tags: Vec<Tag> = Vec::new();
    for link in links {
        let label = link.text();
        if label.is_empty() {
            continue;
        }
        let id = link
            .attr("href")
            .and_then(category_id_from_href)
            .unwrap_or_else(|| label.to_lowercase().replace(' ', "-"));
        if !tags.iter().any(|tag| tag.id == id) {
            tags.push(Tag { id, label });
        }
    }
    tags
}

fn genre_section(tags: Vec<Tag>) -> TagSection {
    TagSection {
        id: "genres".to_string(),
        label: "Genres".to_string(),
        tags,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn doc(html: &str) -> Document {
        Document::parse(html, &Url::parse("https://readm.org").unwrap())
    }

    #[test]
    fn test_missing_title_is_malformed() {
        let d = doc("<div class='series-summary-wrapper'><p>desc</p></div>");
        let err = parse_manga_details(&d, "x").unwrap_err();
        assert!(matches!(err, ScrapeError::MalformedDocument(_)));
    }

    #[test]
    fn test_manga_details_minimal_page() {
        let d = doc("<h1 class='page-title'> Berserk </h1>");
        let manga = parse_manga_details(&d, "berserk").unwrap();
        assert_eq!(manga.titles, vec!["Berserk"]);
        assert_eq!(manga.status, MangaStatus::Unknown);
        assert!(manga.image.is_none());
        assert!(manga.author.is_none());
        assert!(!manga.hentai);
    }

    #[test]
    fn test_tiles_skip_entries_without_id_or_title() {
        let d = doc(
            r#"<ul class="filter-results">
                <li class="mb-lg"><div class="subject-title"><a href="/manga/a">A</a></div></li>
                <li class="mb-lg"><div class="subject-title"><a href="/manga/b"> </a></div></li>
                <li class="mb-lg"><div class="subject-title"><a>C</a></div></li>
                <li class="mb-lg"><div class="subject-title"><a href="/manga/a">A again</a></div></li>
            </ul>"#,
        );
        let tiles = parse_view_more(&d, &POPULAR_LAYOUT);
        assert_eq!(tiles.len(), 1);
        assert_eq!(tiles[0].id, "a");
        assert_eq!(tiles[0].image, "");
    }

    #[test]
    fn test_title_falls_back_to_image_alt() {
        let d = doc(
            r#"<ul id="latest_trailers"><li><a href="/manga/x"><img src="/x.jpg" alt="Title X"></a></li></ul>"#,
        );
        let tiles = parse_view_more(&d, &NEW_LAYOUT);
        assert_eq!(tiles[0].title.text, "Title X");
        assert_eq!(tiles[0].image, "https://readm.org/x.jpg");
    }

    #[test]
    fn test_search_json() {
        let base = Url::parse("https://readm.org").unwrap();
        let tiles = parse_search_json(
            r#"{"manga":[{"url":"/manga/one-piece","title":"One Piece","image":"/img/op.jpg"}]}"#,
            &base,
        )
        .unwrap();
        assert_eq!(tiles.len(), 1);
        assert_eq!(tiles[0].id, "one-piece");
        assert_eq!(tiles[0].title.text, "One Piece");
        assert_eq!(tiles[0].image, "https://readm.org/img/op.jpg");
    }

    #[test]
    fn test_search_json_contract() {
        let base = Url::parse("https://readm.org").unwrap();
        assert!(matches!(
            parse_search_json(r#"{"results":[]}"#, &base),
            Err(ScrapeError::UpstreamContract(_))
        ));
        assert!(matches!(
            parse_search_json("<html>", &base),
            Err(ScrapeError::UpstreamContract(_))
        ));
        let tiles = parse_search_json(r#"{"manga":[{"title":"No url"},{"url":"/manga/y"}]}"#, &base)
            .unwrap();
        assert!(tiles.is_empty());
    }

    #[test]
    fn test_is_last_page() {
        let with_next = doc(
            r#"<div class="ui pagination menu"><a class="active item">1</a><a class="item" href="/p/2">»</a></div>"#,
        );
        assert!(!is_last_page(&with_next));

        let without_next = doc(
            r#"<div class="ui pagination menu"><a class="item">1</a><a class="active item">2</a></div>"#,
        );
        assert!(is_last_page(&without_next));

        let disabled_next = doc(
            r#"<div class="ui pagination menu"><a class="active item">2</a><a class="disabled item">»</a></div>"#,
        );
        assert!(is_last_page(&disabled_next));

        assert!(is_last_page(&doc("<p>no pagination</p>")));
    }

    #[test]
    fn test_chapter_pages_and_scroll_marker() {
        let d = doc(
            r#"<div class="ch-images long-strip"><img src="/p/1.jpg"><img data-src="/p/2.jpg" src="/loading.gif"></div>"#,
        );
        let details = parse_chapter_details(&d, "m", "1", 60).unwrap();
        assert_eq!(
            details.pages,
            vec!["https://readm.org/p/1.jpg", "https://readm.org/p/2.jpg"]
        );
        assert!(details.long_strip);

        let empty = doc(r#"<div class="ch-images"></div>"#);
        assert!(matches!(
            parse_chapter_details(&empty, "m", "1", 60),
            Err(ScrapeError::MalformedDocument(_))
        ));
    }

    #[test]
    fn test_page_count_threshold() {
        let imgs: String = (1..=3).map(|i| format!("<img src='/p/{}.jpg'>", i)).collect();
        let d = doc(&format!("<center>{}</center>", imgs));
        assert!(parse_chapter_details(&d, "m", "1", 2).unwrap().long_strip);
        assert!(!parse_chapter_details(&d, "m", "1", 3).unwrap().long_strip);
    }

    #[test]
    fn test_updated_manga_stops_at_older_entry() {
        let now = Utc::now();
        let d = doc(
            r#"<ul class="clearfix latest-updates">
                <li><div class="poster poster-xs"><a href="/manga/a"></a><span class="date">1 hour ago</span></div></li>
                <li><div class="poster poster-xs"><a href="/manga/b"></a><span class="date">2 hours ago</span></div></li>
                <li><div class="poster poster-xs"><a href="/manga/c"></a><span class="date">3 days ago</span></div></li>
            </ul>"#,
        );
        let ids: HashSet<String> = ["b", "c"].iter().map(|s| s.to_string()).collect();
        let updated = parse_updated_manga(&d, now - Duration::days(1), &ids, now);
        assert_eq!(updated.ids, vec!["b"]);
        assert!(!updated.load_more);
    }

    #[test]
    fn test_updated_manga_skips_out_of_range_dates() {
        let now = Utc::now();
        let d = doc(
            r#"<ul class="clearfix latest-updates">
                <li><div class="poster poster-xs"><a href="/manga/a"></a><span class="date">999999999999999 days ago</span></div></li>
                <li><div class="poster poster-xs"><a href="/manga/b"></a><span class="date">1 hour ago</span></div></li>
            </ul>"#,
        );
        let ids: HashSet<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();
        let updated = parse_updated_manga(&d, now - Duration::days(1), &ids, now);
        assert_eq!(updated.ids, vec!["b"]);
        assert!(updated.load_more);
    }

    #[test]
    fn test_updated_manga_empty_page_stops() {
        let now = Utc::now();
        let updated = parse_updated_manga(&doc("<p></p>"), now, &HashSet::new(), now);
        assert!(updated.ids.is_empty());
        assert!(!updated.load_more);
    }
}
