use super::types::EvolutionModel;

/// Yearly rate in percent for year `year` (0-based): linear from `recent_rate` at year 0 to
/// `equilibrium_rate` at `transition_years`, flat afterwards.
pub fn rate_for_year(year: u32, model: &EvolutionModel) -> f64 {
    let transition = model.transition_years.max(1);
    if year < transition {
        let progress = year as f64 / transition as f64;
        model.recent_rate + (model.equilibrium_rate - model.recent_rate) * progress
    } else {
        model.equilibrium_rate
    }
}

pub fn cumulative_factor(year: u32, model: &EvolutionModel) -> f64 {
    (0..year).fold(1.0, |factor, k| factor * (1.0 + rate_for_year(k, model) / 100.0))
}

pub fn cumulative_factors(model: &EvolutionModel, years: u32) -> Vec<f64> {
    let mut factors = Vec::with_capacity(years as usize);
    let mut factor = 1.0;
    for year in 0..years {
        if year > 0 {
            factor *= 1.0 + rate_for_year(year - 1, model) / 100.0;
        }
        factors.push(factor);
    }
    factors
}

pub fn inflation_factors(rate_percent: f64, years: u32) -> Vec<f64> {
    let mut factors = Vec::with_capacity(years as usize);
    let mut factor = 1.0;
    for year in 0..years {
        if year > 0 {
            factor *= 1.0 + rate_percent / 100.0;
        }
        factors.push(factor);
    }
    factors
}
