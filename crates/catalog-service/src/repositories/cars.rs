//! In-memory car repository.
//!
//! Cars are keyed by a private sequential id and looked up by their public
//! `object_id`. Make and model comparisons are case-insensitive.

use crate::errors::CatalogError;
use crate::models::{Car, CarRequest};
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::instrument;
use uuid::Uuid;

/// Ordering applied to query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Make ascending, then id ascending.
    MakeAscending,
    /// Make descending, then id descending.
    MakeDescending,
}

/// Storage for the car catalog.
#[derive(Debug, Default)]
pub struct CarRepository {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    cars: BTreeMap<u64, Car>,
}

impl Inner {
    fn find_id(&self, object_id: &str) -> Option<u64> {
        self.cars
            .values()
            .find(|car| car.object_id == object_id)
            .map(|car| car.id)
    }
}

fn not_found() -> CatalogError {
    CatalogError::NotFound("Car not found".to_string())
}

impl CarRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new car.
    ///
    /// A missing `object_id` is generated.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Conflict` if the `object_id` is taken.
    #[instrument(skip_all)]
    pub async fn create(&self, request: CarRequest) -> Result<Car, CatalogError> {
        let mut inner = self.inner.write().await;

        let object_id = match request.object_id {
            Some(object_id) => object_id.trim().to_string(),
            None => Uuid::new_v4().simple().to_string(),
        };
        if inner.find_id(&object_id).is_some() {
            return Err(CatalogError::Conflict(
                "A car with this object_id already exists".to_string(),
            ));
        }

        inner.next_id += 1;
        let now = Utc::now();
        let car = Car {
            id: inner.next_id,
            object_id,
            make: request.make.trim().to_string(),
            model: request.model.trim().to_string(),
            year: request.year,
            categories: request.categories,
            created_at: now,
            updated_at: now,
        };
        inner.cars.insert(car.id, car.clone());

        tracing::info!(target: "catalog.repositories.cars", id = car.id, "Car created");
        Ok(car)
    }

    pub async fn get_by_object_id(&self, object_id: &str) -> Option<Car> {
        let inner = self.inner.read().await;
        inner
            .find_id(object_id)
            .and_then(|id| inner.cars.get(&id).cloned())
    }

    /// Replace the make, model, year and categories of a car.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if no car has `object_id`.
    #[instrument(skip_all)]
    pub async fn update(&self, object_id: &str, request: CarRequest) -> Result<Car, CatalogError> {
        let mut inner = self.inner.write().await;

        let id = inner.find_id(object_id).ok_or_else(not_found)?;
        let car = inner.cars.get_mut(&id).ok_or_else(not_found)?;

        car.make = request.make.trim().to_string();
        car.model = request.model.trim().to_string();
        car.year = request.year;
        car.categories = request.categories;
        car.updated_at = Utc::now();

        tracing::info!(target: "catalog.repositories.cars", id = car.id, "Car updated");
        Ok(car.clone())
    }

    /// Remove a car.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if no car has `object_id`.
    #[instrument(skip_all)]
    pub async fn delete_by_object_id(&self, object_id: &str) -> Result<(), CatalogError> {
        let mut inner = self.inner.write().await;

        let id = inner.find_id(object_id).ok_or_else(not_found)?;
        inner.cars.remove(&id);

        tracing::info!(target: "catalog.repositories.cars", id, "Car deleted");
        Ok(())
    }

    /// All cars matching `filter`, in `order`.
    pub async fn find<F>(&self, filter: F, order: SortOrder) -> Vec<Car>
    where
        F: Fn(&Car) -> bool,
    {
        let inner = self.inner.read().await;
        let mut cars: Vec<Car> = inner.cars.values().filter(|car| filter(car)).cloned().collect();

        cars.sort_by(|a, b| {
            let ascending = a
                .make
                .to_lowercase()
                .cmp(&b.make.to_lowercase())
                .then(a.id.cmp(&b.id));
            match order {
                SortOrder::MakeAscending => ascending,
                SortOrder::MakeDescending => ascending.reverse(),
            }
        });
        cars
    }

    pub async fn find_all(&self) -> Vec<Car> {
        self.find(|_| true, SortOrder::MakeDescending).await
    }

    pub async fn find_by_make(&self, make: &str) -> Vec<Car> {
        self.find(|car| car.make.eq_ignore_ascii_case(make), SortOrder::MakeAscending)
            .await
    }

    pub async fn find_by_make_and_model(&self, make: &str, model: &str) -> Vec<Car> {
        self.find(
            |car| car.make.eq_ignore_ascii_case(make) && car.model.eq_ignore_ascii_case(model),
            SortOrder::MakeAscending,
        )
        .await
    }

    /// Cars of a make and model built between `min_year` and `max_year` inclusive.
    pub async fn find_by_make_model_and_years(
        &self,
        make: &str,
        model: &str,
        min_year: i32,
        max_year: i32,
    ) -> Vec<Car> {
        self.find(
            |car| {
                car.make.eq_ignore_ascii_case(make)
                    && car.model.eq_ignore_ascii_case(model)
                    && (min_year..=max_year).contains(&car.year)
            },
            SortOrder::MakeAscending,
        )
        .await
    }
}
