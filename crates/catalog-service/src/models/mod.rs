//! Catalog models.
//!
//! Contains the stored car record and the request/response shapes of the
//! `/cars` API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Earliest accepted model year.
pub const MIN_CAR_YEAR: i32 = 1886;

/// Latest accepted model year.
pub const MAX_CAR_YEAR: i32 = 9999;

/// Maximum length of make, model and category names.
pub const MAX_NAME_LENGTH: usize = 100;

/// Default page size for list endpoints.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Largest page size a client may request.
pub const MAX_PAGE_SIZE: usize = 100;

/// A stored car.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Car {
    /// Private sequential identifier.
    pub id: u64,

    /// Public identifier used in URLs.
    pub object_id: String,

    pub make: String,

    pub model: String,

    /// Year of manufacture.
    pub year: i32,

    /// Category names, e.g. "Sedan".
    pub categories: Vec<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Public representation of a car.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarDto {
    pub object_id: String,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub categories: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Car> for CarDto {
    fn from(car: &Car) -> Self {
        Self {
            object_id: car.object_id.clone(),
            make: car.make.clone(),
            model: car.model.clone(),
            year: car.year,
            categories: car.categories.clone(),
            created_at: car.created_at,
            updated_at: car.updated_at,
        }
    }
}

/// Body of `POST /cars` and `PUT /cars/{object_id}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CarRequest {
    /// Optional on create (generated when absent); ignored on update.
    #[serde(default)]
    pub object_id: Option<String>,

    pub make: String,

    pub model: String,

    pub year: i32,

    #[serde(default)]
    pub categories: Vec<String>,
}

impl CarRequest {
    /// Validate the request.
    ///
    /// # Errors
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self) -> Result<(), &'static str> {
        if let Some(object_id) = &self.object_id {
            if object_id.trim().is_empty() {
                return Err("object_id must not be blank");
            }
            if object_id.len() > MAX_NAME_LENGTH {
                return Err("object_id is too long");
            }
        }

        for (value, blank, too_long) in [
            (&self.make, "make must not be blank", "make is too long"),
            (&self.model, "model must not be blank", "model is too long"),
        ] {
            if value.trim().is_empty() {
                return Err(blank);
            }
            if value.len() > MAX_NAME_LENGTH {
                return Err(too_long);
            }
        }

        if !(MIN_CAR_YEAR..=MAX_CAR_YEAR).contains(&self.year) {
            return Err("year is out of range");
        }

        if self
            .categories
            .iter()
            .any(|c| c.trim().is_empty() || c.len() > MAX_NAME_LENGTH)
        {
            return Err("categories must be non-blank names");
        }

        Ok(())
    }
}

/// Response for `POST /cars`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCarResponse {
    pub id: u64,
    pub object_id: String,
}

/// Query parameters for paginated endpoints.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    /// Zero-based page index.
    #[serde(default)]
    pub page: Option<usize>,

    #[serde(default)]
    pub size: Option<usize>,
}

impl PageParams {
    /// Page index and size with defaults applied and size clamped to
    /// `1..=MAX_PAGE_SIZE`.
    pub fn resolve(self) -> (usize, usize) {
        let size = self
            .size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        (self.page.unwrap_or(0), size)
    }
}

/// One page of results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page: usize,
    pub size: usize,
    pub total_elements: usize,
    pub total_pages: usize,
}

impl<T> Page<T> {
    /// Slice page `page` of `size` out of the full, already ordered result.
    pub fn from_items(items: Vec<T>, params: PageParams) -> Self {
        let (page, size) = params.resolve();
        let total_elements = items.len();
        let total_pages = total_elements.div_ceil(size);
        let content = items
            .into_iter()
            .skip(page.saturating_mul(size))
            .take(size)
            .collect();

        Self {
            content,
            page,
            size,
            total_elements,
            total_pages,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn request() -> CarRequest {
        CarRequest {
            object_id: Some("a1B2c3D4".to_string()),
            make: "Toyota".to_string(),
            model: "Camry".to_string(),
            year: 2022,
            categories: vec!["Sedan".to_string()],
        }
    }

    #[test]
    fn test_car_request_valid() {
        assert!(request().validate().is_ok());

        let mut without_id = request();
        without_id.object_id = None;
        assert!(without_id.validate().is_ok());
    }

    #[test]
    fn test_car_request_rejects_blank_fields() {
        let mut r = request();
        r.make = "  ".to_string();
        assert_eq!(r.validate(), Err("make must not be blank"));

        let mut r = request();
        r.model = String::new();
        assert_eq!(r.validate(), Err("model must not be blank"));

        let mut r = request();
        r.object_id = Some(" ".to_string());
        assert_eq!(r.validate(), Err("object_id must not be blank"));

        let mut r = request();
        r.categories = vec![String::new()];
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_car_request_year_range() {
        let mut r = request();
        r.year = MIN_CAR_YEAR - 1;
        assert_eq!(r.validate(), Err("year is out of range"));

        r.year = MIN_CAR_YEAR;
        assert!(r.validate().is_ok());
    }

    #[test]
    fn test_car_request_rejects_unknown_fields() {
        let json = r#"{"make":"Toyota","model":"Camry","year":2022,"color":"red"}"#;
        assert!(serde_json::from_str::<CarRequest>(json).is_err());
    }

    #[test]
    fn test_page_params_resolve() {
        assert_eq!(PageParams::default().resolve(), (0, DEFAULT_PAGE_SIZE));
        assert_eq!(
            PageParams {
                page: Some(2),
                size: Some(1000)
            }
            .resolve(),
            (2, MAX_PAGE_SIZE)
        );
        assert_eq!(
            PageParams {
                page: None,
                size: Some(0)
            }
            .resolve(),
            (0, 1)
        );
    }

    #[test]
    fn test_page_from_items() {
        let page = Page::from_items(
            (1..=5).collect::<Vec<_>>(),
            PageParams {
                page: Some(1),
                size: Some(2),
            },
        );

        assert_eq!(page.content, vec![3, 4]);
        assert_eq!(page.total_elements, 5);
        assert_eq!(page.total_pages, 3);

        let past_end = Page::from_items(
            vec![1, 2],
            PageParams {
                page: Some(9),
                size: Some(2),
            },
        );
        assert!(past_end.content.is_empty());
        assert_eq!(past_end.total_pages, 1);
    }
}
