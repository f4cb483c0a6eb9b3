use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::retry::Outcome;
use crate::types::{Movie, MovieBundle, PagedResult, Rating, Review};

/// The remote movie catalogue.
///
/// Reads take a cancellation token and resolve to an [`Outcome`], with
/// retries already applied.
#[async_trait]
pub trait MovieSource: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    /// Public web page for a movie.
    fn web_url(&self, movie_id: u64) -> String;

    async fn popular(&self, page: u32, cancel: &CancellationToken) -> Outcome<PagedResult<Movie>>;

    async fn search(
        &self,
        query: &str,
        page: u32,
        cancel: &CancellationToken,
    ) -> Outcome<PagedResult<Movie>>;

    /// Details, cast and the first page of reviews in one call.
    async fn movie_bundle(&self, movie_id: u64, cancel: &CancellationToken) -> Outcome<MovieBundle>;

    async fn reviews(
        &self,
        movie_id: u64,
        page: u32,
        cancel: &CancellationToken,
    ) -> Outcome<PagedResult<Review>>;

    async fn rate_movie(&self, movie_id: u64, rating: Rating) -> Result<()>;
}
