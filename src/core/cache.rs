use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::debug;

use super::engine::EnergyModels;
use super::error::EngineError;
use super::types::{Commodity, EvolutionModel};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedModel {
    pub model: EvolutionModel,
    pub computed_on: NaiveDate,
}

pub trait ModelCache {
    fn get(&self, commodity: Commodity) -> Option<CachedModel>;
    fn put(&mut self, commodity: Commodity, model: EvolutionModel, computed_on: NaiveDate);
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryModelCache {
    entries: HashMap<Commodity, CachedModel>,
}

impl InMemoryModelCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ModelCache for InMemoryModelCache {
    fn get(&self, commodity: Commodity) -> Option<CachedModel> {
        self.entries.get(&commodity).copied()
    }

    fn put(&mut self, commodity: Commodity, model: EvolutionModel, computed_on: NaiveDate) {
        self.entries
            .insert(commodity, CachedModel { model, computed_on });
    }
}

/// A model computed in the same calendar month as `today` is fresh for a window of 1; each
/// extra month of window keeps it one month longer.
pub fn is_fresh(computed_on: NaiveDate, today: NaiveDate, window_months: u32) -> bool {
    let age = (today.year() - computed_on.year()) * 12 + today.month() as i32
        - computed_on.month() as i32;
    age >= 0 && age < window_months.max(1) as i32
}

pub fn get_or_compute<C, F>(
    cache: &mut C,
    commodity: Commodity,
    today: NaiveDate,
    window_months: u32,
    compute: F,
) -> Result<EvolutionModel, EngineError>
where
    C: ModelCache + ?Sized,
    F: FnOnce() -> Result<EvolutionModel, EngineError>,
{
    if let Some(cached) = cache.get(commodity) {
        if is_fresh(cached.computed_on, today, window_months) {
            debug!(%commodity, computed_on = %cached.computed_on, "evolution model cache hit");
            return Ok(cached.model);
        }
        debug!(%commodity, computed_on = %cached.computed_on, "evolution model is stale");
    } else {
        debug!(%commodity, "evolution model cache miss");
    }

    let model = compute()?;
    cache.put(commodity, model, today);
    Ok(model)
}

pub fn fresh_models<C>(
    cache: &C,
    commodities: &[Commodity],
    today: NaiveDate,
    window_months: u32,
) -> EnergyModels
where
    C: ModelCache + ?Sized,
{
    commodities
        .iter()
        .filter_map(|&commodity| {
            let cached = cache.get(commodity)?;
            is_fresh(cached.computed_on, today, window_months).then_some((commodity, cached.model))
        })
        .collect()
}
