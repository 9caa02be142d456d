//! HTTP endpoints of the gateway
//!
//! Handlers translate path and query parameters into [`Readm`] calls and return the
//! results as JSON. Failures are [`ScrapeError`]s, rendered by its `ResponseError`
//! impl; the front-page search is the one endpoint that swallows them.
//!
//! [`Readm`]: crate::sources::readm::Readm

use crate::app_state::AppState;
use crate::error::ScrapeError;
use crate::models::{Manga, PagedResults, SearchRequest};
use actix_web::{get, post, web, HttpResponse};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

type HandlerResult = Result<HttpResponse, ScrapeError>;

#[derive(Debug, Deserialize)]
pub struct FrontSearchQuery {
    pub manga: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub title: Option<String>,
    pub tag: Option<String>,
    pub page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
}

/// Cutoff for update checks, either RFC 3339 text or milliseconds since the epoch
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum UpdateTime {
    Rfc3339(DateTime<Utc>),
    EpochMillis(i64),
}

impl UpdateTime {
    pub fn to_datetime(&self) -> Result<DateTime<Utc>, ScrapeError> {
        match self {
            UpdateTime::Rfc3339(time) => Ok(*time),
            UpdateTime::EpochMillis(millis) => {
                Utc.timestamp_millis_opt(*millis).single().ok_or_else(|| {
                    ScrapeError::InvalidRequest(format!("timestamp {} is out of range", millis))
                })
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdatedMangaBody {
    pub ids: Vec<String>,
    pub time: UpdateTime,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MangaResponse {
    #[serde(flatten)]
    manga: Manga,
    share_url: String,
}

fn log_failure(endpoint: &str, err: &ScrapeError) {
    log::error!("{} failed: {}", endpoint, err);
}

/// Front-page search; any failure becomes an empty result set
#[get("/")]
async fn front_search(
    data: web::Data<AppState>,
    query: web::Query<FrontSearchQuery>,
) -> HttpResponse {
    let Some(title) = query.into_inner().manga.filter(|t| !t.trim().is_empty()) else {
        return HttpResponse::Ok().json(PagedResults::empty());
    };

    let request = SearchRequest {
        title: Some(title),
        included_tags: Vec::new(),
    };
    match data.source.get_search_results(&request, 1).await {
        Ok(results) => HttpResponse::Ok().json(results),
        Err(e) => {
            log::warn!("Front page search failed, answering with no results: {}", e);
            HttpResponse::Ok().json(PagedResults::empty())
        }
    }
}

#[get("/search")]
async fn search(data: web::Data<AppState>, query: web::Query<SearchQuery>) -> HandlerResult {
    let query = query.into_inner();
    let request = SearchRequest {
        title: query.title,
        included_tags: query.tag.into_iter().collect(),
    };
    let results = data
        .source
        .get_search_results(&request, query.page.unwrap_or(1))
        .await
        .inspect_err(|e| log_failure("search", e))?;
    Ok(HttpResponse::Ok().json(results))
}

#[get("/manga/{id}")]
async fn manga_details(data: web::Data<AppState>, id: web::Path<String>) -> HandlerResult {
    let id = id.into_inner();
    let manga = data
        .source
        .get_manga_details(&id)
        .await
        .inspect_err(|e| log_failure("manga details", e))?;
    Ok(HttpResponse::Ok().json(MangaResponse {
        share_url: data.source.manga_share_url(&id),
        manga,
    }))
}

#[get("/manga/{id}/chapters")]
async fn list_chapters(data: web::Data<AppState>, id: web::Path<String>) -> HandlerResult {
    let chapters = data
        .source
        .get_chapters(&id)
        .await
        .inspect_err(|e| log_failure("chapters", e))?;
    Ok(HttpResponse::Ok().json(chapters))
}

#[get("/manga/{id}/chapters/{chapter_id}")]
async fn chapter_details(
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> HandlerResult {
    let (manga_id, chapter_id) = path.into_inner();
    let details = data
        .source
        .get_chapter_details(&manga_id, &chapter_id)
        .await
        .inspect_err(|e| log_failure("chapter details", e))?;
    Ok(HttpResponse::Ok().json(details))
}

#[post("/updated-manga")]
async fn updated_manga(
    data: web::Data<AppState>,
    body: web::Json<UpdatedMangaBody>,
) -> HandlerResult {
    let body = body.into_inner();
    let cutoff = body.time.to_datetime()?;
    let updates = data
        .source
        .filter_updated_manga(cutoff, &body.ids)
        .await
        .inspect_err(|e| log_failure("updated manga", e))?;
    Ok(HttpResponse::Ok().json(updates))
}

#[get("/sections")]
async fn home_sections(data: web::Data<AppState>) -> HandlerResult {
    let sections = data
        .source
        .get_home_sections()
        .await
        .inspect_err(|e| log_failure("home sections", e))?;
    Ok(HttpResponse::Ok().json(sections))
}

#[get("/sections/{section_id}")]
async fn view_more(
    data: web::Data<AppState>,
    section_id: web::Path<String>,
    query: web::Query<PageQuery>,
) -> HandlerResult {
    let results = data
        .source
        .get_view_more_items(&section_id, query.page.unwrap_or(1))
        .await
        .inspect_err(|e| log_failure("view more", e))?;
    Ok(HttpResponse::Ok().json(results))
}

#[get("/tags")]
async fn list_tags(data: web::Data<AppState>) -> HandlerResult {
    let tags = data
        .source
        .get_tags()
        .await
        .inspect_err(|e| log_failure("tags", e))?;
    Ok(HttpResponse::Ok().json(tags))
}

#[get("/metrics")]
async fn fetch_metrics(data: web::Data<AppState>) -> HttpResponse {
    let all_metrics = data.metrics.get_all_metrics();

    let metrics_json: Vec<serde_json::Value> = all_metrics
        .iter()
        .map(|m| {
            serde_json::json!({
                "host": m.host,
                "success_rate": format!("{:.2}%", m.success_rate()),
                "total_requests": m.total_requests,
                "successful_requests": m.successful_requests,
                "failed_requests": m.failed_requests,
                "average_response_time_ms": format!("{:.2}", m.average_response_time_ms),
                "retry_count": m.retry_count,
                "rate_limit_hits": m.rate_limit_hits,
                "server_errors": m.server_errors,
                "timeout_count": m.timeout_count,
                "last_success": m.last_success,
                "last_failure": m.last_failure,
                "last_error": m.last_error,
            })
        })
        .collect();

    HttpResponse::Ok().json(serde_json::json!({
        "metrics": metrics_json,
        "total_hosts_tracked": all_metrics.len()
    }))
}

/// Register every endpoint, with JSON errors for unparseable queries and bodies
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::QueryConfig::default().error_handler(|err, _req| {
        ScrapeError::InvalidRequest(err.to_string()).into()
    }))
    .app_data(web::JsonConfig::default().error_handler(|err, _req| {
        ScrapeError::InvalidRequest(err.to_string()).into()
    }))
    .app_data(web::PathConfig::default().error_handler(|err, _req| {
        ScrapeError::InvalidRequest(err.to_string()).into()
    }))
    .service(front_search)
    .service(search)
    .service(manga_details)
    .service(list_chapters)
    .service(chapter_details)
    .service(updated_manga)
    .service(home_sections)
    .service(view_more)
    .service(list_tags)
    .service(fetch_metrics);
}
