use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{Ride, RideRequest, RideStatus};

pub const MAX_PAGE_SIZE: u32 = 100;

fn default_seats() -> i32 {
    1
}

fn default_page() -> u32 {
    1
}

fn default_search_limit() -> u32 {
    10
}

fn default_upcoming_limit() -> u32 {
    20
}

/// Passenger ride search: exact day, substring route match.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RideSearch {
    pub from: String,
    pub to: String,
    pub departure_date: NaiveDate,
    #[serde(default = "default_seats")]
    pub seats: i32,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_search_limit")]
    pub limit: u32,
}

impl RideSearch {
    pub fn window(&self) -> PageWindow {
        PageWindow::new(self.page, self.limit)
    }

    pub fn matches(&self, ride: &Ride, today: NaiveDate) -> bool {
        ride.status == RideStatus::Scheduled
            && ride.departure_date == self.departure_date
            && ride.departure_date >= today
            && ride.available_seats >= self.seats
            && contains_ci(&ride.origin, &self.from)
            && contains_ci(&ride.destination, &self.to)
    }
}

/// Public browse of future scheduled rides.
#[derive(Debug, Clone, Deserialize)]
pub struct UpcomingFilter {
    pub from: Option<String>,
    pub to: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_upcoming_limit")]
    pub limit: u32,
}

impl Default for UpcomingFilter {
    fn default() -> Self {
        Self {
            from: None,
            to: None,
            page: default_page(),
            limit: default_upcoming_limit(),
        }
    }
}

impl UpcomingFilter {
    pub fn window(&self) -> PageWindow {
        PageWindow::new(self.page, self.limit)
    }

    pub fn matches(&self, ride: &Ride, today: NaiveDate) -> bool {
        ride.status == RideStatus::Scheduled
            && ride.departure_date >= today
            && self.from.as_deref().map_or(true, |f| contains_ci(&ride.origin, f))
            && self.to.as_deref().map_or(true, |t| contains_ci(&ride.destination, t))
    }
}

/// Driver-side browse of open ride requests.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestFilter {
    pub from: Option<String>,
    pub to: Option<String>,
    pub date: Option<NaiveDate>,
}

impl RequestFilter {
    pub fn matches(&self, request: &RideRequest) -> bool {
        self.from.as_deref().map_or(true, |f| contains_ci(&request.origin, f))
            && self.to.as_deref().map_or(true, |t| contains_ci(&request.destination, t))
            && self.date.map_or(true, |d| request.earliest_date == d)
    }
}

/// Rides that could serve a ride request.
#[derive(Debug, Clone)]
pub struct MatchCriteria {
    pub from: String,
    pub to: String,
    pub date: NaiveDate,
    pub earliest: DateTime<Utc>,
    pub latest: DateTime<Utc>,
    pub seats: i32,
}

impl MatchCriteria {
    pub fn from_request(request: &RideRequest) -> Self {
        Self {
            from: request.origin.clone(),
            to: request.destination.clone(),
            date: request.earliest_date,
            earliest: request.earliest_time,
            latest: request.latest_time,
            seats: request.seats_needed,
        }
    }

    pub fn matches(&self, ride: &Ride) -> bool {
        let departs = ride.departs_at();
        ride.status == RideStatus::Scheduled
            && ride.departure_date == self.date
            && departs >= self.earliest
            && departs <= self.latest
            && ride.available_seats >= self.seats
            && contains_ci(&ride.origin, &self.from)
            && contains_ci(&ride.destination, &self.to)
    }
}

/// Offset/limit derived from a 1-based page number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u32,
    pub limit: u32,
}

impl PageWindow {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub total_pages: u64,
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, window: PageWindow) -> Self {
        let limit = u64::from(window.limit);
        let has_more = window.offset() + (items.len() as u64) < total;
        Self {
            items,
            total,
            page: window.page,
            total_pages: total.div_ceil(limit),
            has_more,
        }
    }

    /// Slice an already filtered and ordered list.
    pub fn slice(all: Vec<T>, window: PageWindow) -> Self {
        let total = all.len() as u64;
        let items = all
            .into_iter()
            .skip(window.offset() as usize)
            .take(window.limit as usize)
            .collect();
        Self::new(items, total, window)
    }
}

/// Case-insensitive substring match.
pub fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Escape `needle` for use in an `ILIKE '%...%'` pattern.
pub fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_math() {
        let window = PageWindow::new(2, 10);
        assert_eq!(window.offset(), 10);

        let page = Page::new(vec![1; 10], 25, window);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_more);

        let last = Page::new(vec![1; 5], 25, PageWindow::new(3, 10));
        assert!(!last.has_more);
    }

    #[test]
    fn test_window_is_clamped() {
        assert_eq!(PageWindow::new(0, 0), PageWindow { page: 1, limit: 1 });
        assert_eq!(PageWindow::new(1, 5000).limit, MAX_PAGE_SIZE);
    }

    #[test]
    fn test_slice_pages_through() {
        let page = Page::slice((1..=7).collect::<Vec<_>>(), PageWindow::new(2, 3));
        assert_eq!(page.items, vec![4, 5, 6]);
        assert_eq!(page.total, 7);
        assert!(page.has_more);
    }

    #[test]
    fn test_contains_ci() {
        assert!(contains_ci("Lahore Cantt", "lahore"));
        assert!(contains_ci("ISLAMABAD", "abad"));
        assert!(!contains_ci("Karachi", "Lahore"));
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("Lahore"), "%Lahore%");
    }

    #[test]
    fn test_search_query_defaults() {
        let search: RideSearch = serde_json::from_str(
            r#"{"from":"Lahore","to":"Islamabad","departureDate":"2026-03-01"}"#,
        )
        .unwrap();
        assert_eq!((search.seats, search.page, search.limit), (1, 1, 10));
    }
}
