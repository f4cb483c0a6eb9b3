use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::pagination::Keyed;

/// One page of a paginated listing, as reported by the remote source.
#[derive(Debug, Clone)]
pub struct PagedResult<T> {
    pub page: u32,
    pub total_pages: u32,
    pub items: Vec<T>,
}

/// Movie summary (list views)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: u64,
    pub title: String,
    pub overview: String,
    pub release_date: Option<NaiveDate>,
    pub vote_average: f32,
    pub vote_count: u32,
}

impl Movie {
    pub fn year(&self) -> Option<i32> {
        use chrono::Datelike;
        self.release_date.map(|d| d.year())
    }
}

impl Keyed for Movie {
    type Key = u64;

    fn key(&self) -> u64 {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieDetails {
    pub id: u64,
    pub title: String,
    pub tagline: Option<String>,
    pub overview: String,
    pub release_date: Option<NaiveDate>,
    pub runtime: Option<u32>,
    pub genres: Vec<String>,
    pub vote_average: f32,
    pub vote_count: u32,
}

impl MovieDetails {
    pub fn year(&self) -> Option<i32> {
        use chrono::Datelike;
        self.release_date.map(|d| d.year())
    }

    /// "2h 16m" style runtime
    pub fn runtime_label(&self) -> Option<String> {
        let minutes = self.runtime.filter(|m| *m > 0)?;
        Some(match (minutes / 60, minutes % 60) {
            (0, m) => format!("{}m", m),
            (h, 0) => format!("{}h", h),
            (h, m) => format!("{}h {}m", h, m),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CastMember {
    pub id: u64,
    pub name: String,
    pub character: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    pub author: String,
    pub rating: Option<f32>,
    pub content: String,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Keyed for Review {
    type Key = String;

    fn key(&self) -> String {
        self.id.clone()
    }
}

/// Everything the details screen needs, fetched in one request.
#[derive(Debug, Clone)]
pub struct MovieBundle {
    pub details: MovieDetails,
    pub cast: Vec<CastMember>,
    pub reviews: PagedResult<Review>,
}

/// A review written in this session. Only the rating leaves the machine.
#[derive(Debug, Clone, PartialEq)]
pub struct UserReview {
    pub movie_id: u64,
    pub rating: Rating,
    pub text: String,
}

/// TMDB accepts ratings from 0.5 to 10.0 in half steps; the composer uses whole points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;

    pub fn new(value: u8) -> Self {
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    pub fn increment(self) -> Self {
        Self::new(self.0.saturating_add(1))
    }

    pub fn decrement(self) -> Self {
        Self::new(self.0.saturating_sub(1))
    }

    pub fn as_api_value(&self) -> f32 {
        f32::from(self.0)
    }
}

impl Default for Rating {
    fn default() -> Self {
        Self(7)
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/10", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(runtime: Option<u32>) -> MovieDetails {
        MovieDetails {
            id: 1,
            title: "Heat".into(),
            tagline: None,
            overview: String::new(),
            release_date: NaiveDate::from_ymd_opt(1995, 12, 15),
            runtime,
            genres: vec![],
            vote_average: 7.9,
            vote_count: 100,
        }
    }

    #[test]
    fn runtime_label_formats_hours_and_minutes() {
        assert_eq!(details(Some(170)).runtime_label().as_deref(), Some("2h 50m"));
        assert_eq!(details(Some(120)).runtime_label().as_deref(), Some("2h"));
        assert_eq!(details(Some(45)).runtime_label().as_deref(), Some("45m"));
        assert_eq!(details(Some(0)).runtime_label(), None);
        assert_eq!(details(None).runtime_label(), None);
    }

    #[test]
    fn year_from_release_date() {
        assert_eq!(details(None).year(), Some(1995));
    }

    #[test]
    fn rating_is_clamped() {
        assert_eq!(Rating::new(0).value(), 1);
        assert_eq!(Rating::new(42).value(), 10);
        assert_eq!(Rating::new(10).increment().value(), 10);
        assert_eq!(Rating::new(1).decrement().value(), 1);
        assert_eq!(Rating::default().increment().to_string(), "8/10");
    }
}
