use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::{NetworkConfig, TmdbConfig};
use crate::connectivity::{Connectivity, NetworkStatus};
use crate::error::{MarqueeError, Result};
use crate::retry::{Outcome, RetryPolicy};
use crate::source::MovieSource;
use crate::types::{CastMember, Movie, MovieBundle, MovieDetails, PagedResult, Rating, Review};

/// How many billed cast members the details bundle keeps.
const CAST_LIMIT: usize = 15;

pub struct Tmdb {
    client: Client,
    base_url: String,
    web_url: String,
    api_key: String,
    language: String,
    retry: RetryPolicy,
    connectivity: Connectivity,
    guest_session: Mutex<Option<String>>,
}

impl std::fmt::Debug for Tmdb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tmdb")
            .field("base_url", &self.base_url)
            .field("language", &self.language)
            .finish_non_exhaustive()
    }
}

impl Tmdb {
    pub fn new(
        api_key: String,
        tmdb: &TmdbConfig,
        network: &NetworkConfig,
        connectivity: Connectivity,
    ) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(MarqueeError::Config("TMDB API key is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(network.timeout())
            .user_agent(concat!("marquee/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MarqueeError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: tmdb.base_url.trim_end_matches('/').to_string(),
            web_url: tmdb.web_url.trim_end_matches('/').to_string(),
            api_key,
            language: tmdb.language.clone(),
            retry: network.retry_policy(),
            connectivity,
            guest_session: Mutex::new(None),
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let response = self
            .client
            .get(self.api_url(path))
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("language", self.language.as_str()),
            ])
            .query(query)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        self.connectivity.report(NetworkStatus::Online);

        read_json(response).await
    }

    /// GET with retries, abandoned as soon as `cancel` fires.
    async fn fetch<T: DeserializeOwned>(
        &self,
        cancel: &CancellationToken,
        path: &str,
        query: &[(&str, String)],
    ) -> Outcome<T> {
        tracing::debug!(path, "GET");
        self.retry
            .run(cancel, move || self.get_json(path, query))
            .await
    }

    fn transport_error(&self, err: reqwest::Error) -> MarqueeError {
        self.connectivity.report(NetworkStatus::Offline);
        MarqueeError::Transport(err.to_string())
    }

    async fn guest_session(&self) -> Result<String> {
        let mut session = self.guest_session.lock().await;
        if let Some(id) = session.as_ref() {
            return Ok(id.clone());
        }

        let created: TmGuestSession = self
            .get_json("/authentication/guest_session/new", &[])
            .await?;
        tracing::debug!("created guest session");
        *session = Some(created.guest_session_id.clone());
        Ok(created.guest_session_id)
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let message = response
            .json::<TmStatus>()
            .await
            .ok()
            .and_then(|s| s.status_message)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());
        return Err(MarqueeError::Status {
            status: status.as_u16(),
            message,
        });
    }

    response
        .json()
        .await
        .map_err(|e| MarqueeError::Decode(e.to_string()))
}

// TMDB API response types

#[derive(Deserialize)]
struct TmPage<T> {
    page: Option<u32>,
    total_pages: Option<u32>,
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

#[derive(Deserialize)]
struct TmMovie {
    id: u64,
    title: Option<String>,
    original_title: Option<String>,
    overview: Option<String>,
    release_date: Option<String>,
    vote_average: Option<f32>,
    vote_count: Option<u32>,
}

#[derive(Deserialize)]
struct TmGenre {
    name: String,
}

#[derive(Deserialize)]
struct TmDetails {
    id: u64,
    title: Option<String>,
    original_title: Option<String>,
    tagline: Option<String>,
    overview: Option<String>,
    release_date: Option<String>,
    runtime: Option<u32>,
    genres: Option<Vec<TmGenre>>,
    vote_average: Option<f32>,
    vote_count: Option<u32>,
    credits: Option<TmCredits>,
    reviews: Option<TmPage<TmReview>>,
}

#[derive(Deserialize)]
struct TmCredits {
    #[serde(default)]
    cast: Vec<TmCast>,
}

#[derive(Deserialize)]
struct TmCast {
    id: u64,
    name: String,
    character: Option<String>,
}

#[derive(Deserialize)]
struct TmReview {
    id: String,
    author: Option<String>,
    content: Option<String>,
    created_at: Option<String>,
    author_details: Option<TmAuthorDetails>,
}

#[derive(Deserialize)]
struct TmAuthorDetails {
    rating: Option<f32>,
}

#[derive(Deserialize)]
struct TmStatus {
    status_message: Option<String>,
}

#[derive(Deserialize)]
struct TmGuestSession {
    guest_session_id: String,
}

fn parse_date(s: Option<&str>) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s?, "%Y-%m-%d").ok()
}

fn parse_datetime(s: Option<&str>) -> Option<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(s?)
        .ok()
        .map(|d| d.with_timezone(&chrono::Utc))
}

fn pick_title(title: Option<String>, original: Option<String>) -> String {
    title
        .filter(|t| !t.is_empty())
        .or(original)
        .unwrap_or_else(|| "Untitled".to_string())
}

fn into_page<W, T>(page: TmPage<W>, requested: u32, convert: impl Fn(W) -> T) -> PagedResult<T> {
    PagedResult {
        page: page.page.unwrap_or(requested),
        total_pages: page.total_pages.unwrap_or(1).max(1),
        items: page.results.into_iter().map(convert).collect(),
    }
}

impl From<TmMovie> for Movie {
    fn from(m: TmMovie) -> Self {
        Movie {
            id: m.id,
            title: pick_title(m.title, m.original_title),
            overview: m.overview.unwrap_or_default(),
            release_date: parse_date(m.release_date.as_deref()),
            vote_average: m.vote_average.unwrap_or(0.0),
            vote_count: m.vote_count.unwrap_or(0),
        }
    }
}

impl From<TmReview> for Review {
    fn from(r: TmReview) -> Self {
        Review {
            id: r.id,
            author: r.author.unwrap_or_else(|| "anonymous".to_string()),
            rating: r.author_details.and_then(|d| d.rating),
            content: r.content.unwrap_or_default(),
            created_at: parse_datetime(r.created_at.as_deref()),
        }
    }
}

impl From<TmDetails> for MovieBundle {
    fn from(d: TmDetails) -> Self {
        let details = MovieDetails {
            id: d.id,
            title: pick_title(d.title, d.original_title),
            tagline: d.tagline.filter(|t| !t.is_empty()),
            overview: d.overview.unwrap_or_default(),
            release_date: parse_date(d.release_date.as_deref()),
            runtime: d.runtime,
            genres: d
                .genres
                .unwrap_or_default()
                .into_iter()
                .map(|g| g.name)
                .collect(),
            vote_average: d.vote_average.unwrap_or(0.0),
            vote_count: d.vote_count.unwrap_or(0),
        };

        let cast = d
            .credits
            .map(|c| c.cast)
            .unwrap_or_default()
            .into_iter()
            .take(CAST_LIMIT)
            .map(|c| CastMember {
                id: c.id,
                name: c.name,
                character: c.character.unwrap_or_default(),
            })
            .collect();

        let reviews = match d.reviews {
            Some(page) => into_page(page, 1, Review::from),
            None => PagedResult {
                page: 1,
                total_pages: 1,
                items: Vec::new(),
            },
        };

        MovieBundle {
            details,
            cast,
            reviews,
        }
    }
}

#[async_trait]
impl MovieSource for Tmdb {
    fn name(&self) -> &str {
        "TMDB"
    }

    fn web_url(&self, movie_id: u64) -> String {
        format!("{}/movie/{}", self.web_url, movie_id)
    }

    async fn popular(&self, page: u32, cancel: &CancellationToken) -> Outcome<PagedResult<Movie>> {
        let query = [("page", page.to_string())];
        self.fetch::<TmPage<TmMovie>>(cancel, "/movie/popular", &query)
            .await
            .map(|p| into_page(p, page, Movie::from))
    }

    async fn search(
        &self,
        query: &str,
        page: u32,
        cancel: &CancellationToken,
    ) -> Outcome<PagedResult<Movie>> {
        let params = [
            ("query", query.to_string()),
            ("page", page.to_string()),
            ("include_adult", "false".to_string()),
        ];
        self.fetch::<TmPage<TmMovie>>(cancel, "/search/movie", &params)
            .await
            .map(|p| into_page(p, page, Movie::from))
    }

    async fn movie_bundle(&self, movie_id: u64, cancel: &CancellationToken) -> Outcome<MovieBundle> {
        let path = format!("/movie/{}", movie_id);
        let query = [("append_to_response", "credits,reviews".to_string())];
        self.fetch::<TmDetails>(cancel, &path, &query)
            .await
            .map(MovieBundle::from)
    }

    async fn reviews(
        &self,
        movie_id: u64,
        page: u32,
        cancel: &CancellationToken,
    ) -> Outcome<PagedResult<Review>> {
        let path = format!("/movie/{}/reviews", movie_id);
        let query = [("page", page.to_string())];
        self.fetch::<TmPage<TmReview>>(cancel, &path, &query)
            .await
            .map(|p| into_page(p, page, Review::from))
    }

    async fn rate_movie(&self, movie_id: u64, rating: Rating) -> Result<()> {
        let session = self.guest_session().await?;
        let url = self.api_url(&format!("/movie/{}/rating", movie_id));
        let body = serde_json::json!({ "value": rating.as_api_value() });

        let response = self
            .client
            .post(&url)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("guest_session_id", session.as_str()),
            ])
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        self.connectivity.report(NetworkStatus::Online);

        let _: TmStatus = read_json(response).await?;
        tracing::info!(movie_id, rating = rating.value(), "rating submitted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DETAILS_JSON: &str = r#"{
        "id": 603,
        "title": "The Matrix",
        "original_title": "The Matrix",
        "tagline": "Welcome to the Real World.",
        "overview": "Set in the 22nd century...",
        "release_date": "1999-03-30",
        "runtime": 136,
        "genres": [{"id": 28, "name": "Action"}, {"id": 878, "name": "Science Fiction"}],
        "vote_average": 8.2,
        "vote_count": 24000,
        "credits": {
            "cast": [
                {"id": 6384, "name": "Keanu Reeves", "character": "Neo"},
                {"id": 2975, "name": "Laurence Fishburne", "character": null}
            ]
        },
        "reviews": {
            "page": 1,
            "total_pages": 3,
            "results": [
                {
                    "id": "5b4f",
                    "author": "tmdbfan",
                    "content": "Still holds up.",
                    "created_at": "2018-07-18T12:00:00.000Z",
                    "author_details": {"rating": 9.0}
                }
            ]
        }
    }"#;

    fn test_config() -> (TmdbConfig, NetworkConfig) {
        (TmdbConfig::default(), NetworkConfig::default())
    }

    #[test]
    fn details_bundle_from_json() {
        let details: TmDetails = serde_json::from_str(DETAILS_JSON).unwrap();
        let bundle = MovieBundle::from(details);

        assert_eq!(bundle.details.title, "The Matrix");
        assert_eq!(bundle.details.year(), Some(1999));
        assert_eq!(bundle.details.genres, vec!["Action", "Science Fiction"]);
        assert_eq!(bundle.details.runtime_label().as_deref(), Some("2h 16m"));
        assert_eq!(bundle.cast.len(), 2);
        assert_eq!(bundle.cast[0].character, "Neo");
        assert_eq!(bundle.cast[1].character, "");
        assert_eq!(bundle.reviews.total_pages, 3);
        assert_eq!(bundle.reviews.items[0].rating, Some(9.0));
        assert!(bundle.reviews.items[0].created_at.is_some());
    }

    #[test]
    fn bundle_without_appended_sections() {
        let details: TmDetails = serde_json::from_str(r#"{"id": 1, "title": ""}"#).unwrap();
        let bundle = MovieBundle::from(details);
        assert_eq!(bundle.details.title, "Untitled");
        assert!(bundle.cast.is_empty());
        assert_eq!(bundle.reviews.page, 1);
        assert!(bundle.reviews.items.is_empty());
    }

    #[test]
    fn movie_page_from_json() {
        let json = r#"{
            "page": 2,
            "total_pages": 500,
            "results": [
                {"id": 1, "title": "A", "release_date": "", "vote_average": 6.5},
                {"id": 2, "original_title": "B", "release_date": "2020-02-02"}
            ]
        }"#;
        let page: TmPage<TmMovie> = serde_json::from_str(json).unwrap();
        let page = into_page(page, 2, Movie::from);

        assert_eq!(page.page, 2);
        assert_eq!(page.total_pages, 500);
        assert_eq!(page.items[0].release_date, None);
        assert_eq!(page.items[1].title, "B");
        assert_eq!(page.items[1].year(), Some(2020));
        assert_eq!(page.items[1].vote_count, 0);
    }

    #[test]
    fn empty_search_result_has_one_page() {
        let json = r#"{"page": 1, "total_pages": 0, "results": []}"#;
        let page: TmPage<TmMovie> = serde_json::from_str(json).unwrap();
        let page = into_page(page, 1, Movie::from);
        assert_eq!(page.total_pages, 1);
        assert!(page.items.is_empty());
    }

    #[test]
    fn review_page_without_results_is_empty() {
        let json = r#"{"id": 603, "page": 3, "total_pages": 2}"#;
        let page: TmPage<TmReview> = serde_json::from_str(json).unwrap();
        let page = into_page(page, 3, Review::from);
        assert!(page.items.is_empty());
        assert_eq!(page.total_pages, 2);
    }

    #[test]
    fn empty_api_key_is_rejected() {
        let (tmdb, network) = test_config();
        let err = Tmdb::new("  ".into(), &tmdb, &network, Connectivity::new()).unwrap_err();
        assert!(matches!(err, MarqueeError::Config(_)));
    }

    #[test]
    fn web_url_points_at_movie_page() {
        let (tmdb, network) = test_config();
        let client = Tmdb::new("key".into(), &tmdb, &network, Connectivity::new()).unwrap();
        assert_eq!(client.web_url(603), "https://www.themoviedb.org/movie/603");
        assert!(!format!("{:?}", client).contains("api_key"));
    }

    #[tokio::test]
    async fn unreachable_host_reports_offline() {
        let (mut tmdb, mut network) = test_config();
        // Nothing listens on port 9 of the loopback interface.
        tmdb.base_url = "http://127.0.0.1:9".into();
        network.max_retries = 0;
        let connectivity = Connectivity::new();
        let client = Tmdb::new("key".into(), &tmdb, &network, connectivity.clone()).unwrap();

        let outcome = client.popular(1, &CancellationToken::new()).await;
        assert!(matches!(outcome, Outcome::Failed(MarqueeError::Transport(_))));
        assert_eq!(*connectivity.subscribe().borrow(), NetworkStatus::Offline);
    }
}
