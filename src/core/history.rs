use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::EngineError;
use super::types::{Commodity, EngineConfig, EvolutionModel};

const MONTHS_PER_YEAR: usize = 12;
const MIN_ANALYZABLE_MONTHS: usize = 24;
const TEN_YEAR_MONTHS: usize = 120;
const MIN_EMPIRICAL_OBSERVATIONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyPrice {
    pub month: NaiveDate,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawPrice {
    Number(f64),
    Text(String),
}

impl RawPrice {
    fn value(&self) -> Option<f64> {
        match self {
            RawPrice::Number(v) => Some(*v),
            RawPrice::Text(s) => s.trim().replace(',', ".").parse::<f64>().ok(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawPriceRow {
    pub month: String,
    pub price: RawPrice,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyPriceSeries {
    commodity: Commodity,
    points: Vec<MonthlyPrice>,
}

impl MonthlyPriceSeries {
    pub fn new(commodity: Commodity, points: Vec<MonthlyPrice>) -> Self {
        let mut points: Vec<MonthlyPrice> = points
            .into_iter()
            .filter(|p| p.price.is_finite() && p.price > 0.0)
            .collect();
        points.sort_by(|a, b| b.month.cmp(&a.month));
        points.dedup_by_key(|p| p.month);
        Self { commodity, points }
    }

    pub fn from_rows(commodity: Commodity, rows: &[RawPriceRow]) -> Self {
        let points = rows
            .iter()
            .filter_map(|row| {
                let month = parse_month(&row.month)?;
                let price = row.price.value()?;
                Some(MonthlyPrice { month, price })
            })
            .collect();
        Self::new(commodity, points)
    }

    pub fn commodity(&self) -> Commodity {
        self.commodity
    }

    pub fn points(&self) -> &[MonthlyPrice] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

fn parse_month(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&format!("{raw}-01"), "%Y-%m-%d"))
        .ok()?;
    date.with_day(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnualChange {
    pub year: i32,
    pub average_price: f64,
    pub change_percent: f64,
    pub crisis: bool,
    pub partial: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvolutionAnalysis {
    pub commodity: Commodity,
    pub model: EvolutionModel,
    pub months_of_data: usize,
    pub years_of_data: f64,
    pub recent_average_price: f64,
    pub oldest_average_price: f64,
    pub evolution_long_term: f64,
    pub evolution_ten_year: f64,
    pub annual_changes: Vec<AnnualChange>,
    pub crisis_years: Vec<i32>,
    pub empirical_mean_change: Option<f64>,
}

pub fn analyze_price_history(
    series: &MonthlyPriceSeries,
    config: &EngineConfig,
) -> Result<EvolutionAnalysis, EngineError> {
    let settings = &config.analyzer;
    let required = settings.min_months.max(MIN_ANALYZABLE_MONTHS);
    let months = series.len();
    if months < required {
        return Err(EngineError::InsufficientHistory {
            commodity: series.commodity,
            available: months,
            required,
        });
    }

    let prices: Vec<f64> = series.points.iter().map(|p| p.price).collect();
    let recent_avg = mean(&prices[..MONTHS_PER_YEAR]);
    let oldest_avg = mean(&prices[months - MONTHS_PER_YEAR..]);
    let years = months as f64 / MONTHS_PER_YEAR as f64;

    let evolution_long_term = percent_change(oldest_avg, recent_avg) / years;
    let evolution_ten_year = if months >= TEN_YEAR_MONTHS {
        let ten_years_ago = mean(&prices[TEN_YEAR_MONTHS - MONTHS_PER_YEAR..TEN_YEAR_MONTHS]);
        percent_change(ten_years_ago, recent_avg) / 10.0
    } else {
        evolution_long_term
    };
    let recent_rate = settings.long_term_weight * evolution_long_term
        + settings.ten_year_weight * evolution_ten_year;

    let annual_changes = annual_changes(&series.points, settings.crisis_threshold_percent);
    let crisis_years: Vec<i32> = annual_changes
        .iter()
        .filter(|c| c.crisis)
        .map(|c| c.year)
        .collect();
    let calm: Vec<f64> = annual_changes
        .iter()
        .filter(|c| !c.crisis && !c.partial)
        .map(|c| c.change_percent)
        .collect();

    let theoretical = series.commodity.theoretical_equilibrium_rate();
    let empirical_mean_change = (calm.len() >= MIN_EMPIRICAL_OBSERVATIONS).then(|| mean(&calm));
    let equilibrium_rate = match empirical_mean_change {
        Some(empirical) if empirical > 0.0 && empirical < 10.0 => {
            settings.theoretical_weight * theoretical
                + (1.0 - settings.theoretical_weight) * empirical
        }
        _ => theoretical,
    };

    let model = EvolutionModel::new(round1(recent_rate), round1(equilibrium_rate))
        .with_transition_years(config.transition_years);

    debug!(
        commodity = %series.commodity,
        months,
        recent_rate = model.recent_rate,
        equilibrium_rate = model.equilibrium_rate,
        crisis_years = ?crisis_years,
        "analyzed price history"
    );

    Ok(EvolutionAnalysis {
        commodity: series.commodity,
        model,
        months_of_data: months,
        years_of_data: years,
        recent_average_price: recent_avg,
        oldest_average_price: oldest_avg,
        evolution_long_term,
        evolution_ten_year,
        annual_changes,
        crisis_years,
        empirical_mean_change,
    })
}

/// Year-over-year changes between consecutive complete calendar years, oldest first. A
/// trailing partial year is compared year-to-date against the last complete year.
fn annual_changes(points: &[MonthlyPrice], crisis_threshold: f64) -> Vec<AnnualChange> {
    let mut by_year: BTreeMap<i32, (f64, usize)> = BTreeMap::new();
    for point in points {
        let entry = by_year.entry(point.month.year()).or_insert((0.0, 0));
        entry.0 += point.price;
        entry.1 += 1;
    }

    let averages: Vec<(i32, f64)> = by_year
        .iter()
        .filter(|(_, (_, count))| *count == MONTHS_PER_YEAR)
        .map(|(year, (sum, count))| (*year, sum / *count as f64))
        .collect();

    let change = |year: i32, previous: f64, average_price: f64, partial: bool| {
        let change_percent = percent_change(previous, average_price);
        AnnualChange {
            year,
            average_price,
            change_percent,
            crisis: change_percent.abs() > crisis_threshold,
            partial,
        }
    };

    let mut changes: Vec<AnnualChange> = averages
        .windows(2)
        .filter(|pair| pair[1].0 == pair[0].0 + 1)
        .map(|pair| change(pair[1].0, pair[0].1, pair[1].1, false))
        .collect();

    if let (Some((&year, &(sum, count))), Some(&(last_complete, previous))) =
        (by_year.last_key_value(), averages.last())
    {
        if count < MONTHS_PER_YEAR && year == last_complete + 1 {
            changes.push(change(year, previous, sum / count as f64, true));
        }
    }

    changes
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn percent_change(from: f64, to: f64) -> f64 {
    (to - from) / from * 100.0
}

pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn month(year: i32, month: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, 1).expect("valid month")
    }

    fn series_from_annual(commodity: Commodity, start_year: i32, yearly: &[f64]) -> MonthlyPriceSeries {
        let mut points = Vec::new();
        for (offset, price) in yearly.iter().enumerate() {
            for m in 1..=12 {
                points.push(MonthlyPrice {
                    month: month(start_year + offset as i32, m),
                    price: *price,
                });
            }
        }
        MonthlyPriceSeries::new(commodity, points)
    }

    #[test]
    fn rejects_series_shorter_than_two_years() {
        let mut series = series_from_annual(Commodity::Gas, 2022, &[1.0, 1.0]);
        series.points.pop();

        let err = analyze_price_history(&series, &EngineConfig::default())
            .expect_err("23 months must be rejected");
        assert_eq!(
            err,
            EngineError::InsufficientHistory {
                commodity: Commodity::Gas,
                available: 23,
                required: 24,
            }
        );
    }

    #[test]
    fn series_is_sorted_most_recent_first() {
        let series = series_from_annual(Commodity::Oil, 2020, &[1.0, 2.0]);
        assert_eq!(series.points()[0].month, month(2021, 12));
        assert_eq!(series.points()[23].month, month(2020, 1));
    }

    #[test]
    fn flat_prices_yield_zero_recent_rate_and_theoretical_equilibrium() {
        let series = series_from_annual(Commodity::Electricity, 2020, &[0.2; 4]);
        let analysis = analyze_price_history(&series, &EngineConfig::default()).expect("valid");

        assert_approx(analysis.model.recent_rate, 0.0);
        assert_approx(analysis.model.equilibrium_rate, 3.0);
        assert!(analysis.crisis_years.is_empty());
        assert_eq!(analysis.empirical_mean_change, None);
    }

    #[test]
    fn long_term_rate_is_annualized_over_history_length() {
        let series = series_from_annual(Commodity::Gas, 2022, &[1.0, 1.08]);
        let analysis = analyze_price_history(&series, &EngineConfig::default()).expect("valid");

        assert_approx(analysis.years_of_data, 2.0);
        assert_approx(analysis.evolution_long_term, 4.0);
        assert_approx(analysis.evolution_ten_year, analysis.evolution_long_term);
        assert_approx(analysis.model.recent_rate, 4.0);
        assert_eq!(analysis.model.transition_years, 5);
    }

    #[test]
    fn ten_year_window_is_blended_with_configured_weights() {
        // 12 years: flat at 1.0 for two years, then 2.0 for the last ten.
        let mut yearly = vec![1.0, 1.0];
        yearly.extend([2.0; 10]);
        let series = series_from_annual(Commodity::Oil, 2012, &yearly);
        let config = EngineConfig::default();
        let analysis = analyze_price_history(&series, &config).expect("valid");

        // Whole history: +100% over 12 years. Ten years back the price was already 2.0.
        assert_approx(analysis.evolution_long_term, 100.0 / 12.0);
        assert_approx(analysis.evolution_ten_year, 0.0);
        assert_approx(analysis.model.recent_rate, round1(0.3 * 100.0 / 12.0));

        let mut reweighted = config;
        reweighted.analyzer.long_term_weight = 0.7;
        reweighted.analyzer.ten_year_weight = 0.3;
        let analysis = analyze_price_history(&series, &reweighted).expect("valid");
        assert_approx(analysis.model.recent_rate, round1(0.7 * 100.0 / 12.0));
    }

    #[test]
    fn single_spike_year_is_flagged_as_crisis() {
        let series = series_from_annual(Commodity::Gas, 2021, &[1.0, 1.25, 1.275]);
        let analysis = analyze_price_history(&series, &EngineConfig::default()).expect("valid");

        assert_eq!(analysis.annual_changes.len(), 2);
        assert_eq!(analysis.crisis_years, vec![2022]);
        assert!(!analysis.annual_changes[1].crisis);
    }

    #[test]
    fn crisis_years_are_excluded_from_empirical_blend() {
        let mut yearly = vec![1.0];
        for year in 2017..=2023 {
            let previous = *yearly.last().expect("non-empty");
            let growth = if year == 2020 { 1.30 } else { 1.04 };
            yearly.push(previous * growth);
        }
        let series = series_from_annual(Commodity::Gas, 2016, &yearly);
        let analysis = analyze_price_history(&series, &EngineConfig::default()).expect("valid");

        assert_eq!(analysis.crisis_years, vec![2020]);
        let empirical = analysis.empirical_mean_change.expect("six calm observations");
        assert!((empirical - 4.0).abs() < 1e-6);
        assert_approx(analysis.model.equilibrium_rate, 3.6);
    }

    #[test]
    fn empirical_mean_outside_range_keeps_theoretical_rate() {
        let mut yearly = vec![1.0];
        for _ in 0..6 {
            let previous = *yearly.last().expect("non-empty");
            yearly.push(previous * 0.97);
        }
        let series = series_from_annual(Commodity::Pellets, 2010, &yearly);
        let analysis = analyze_price_history(&series, &EngineConfig::default()).expect("valid");

        assert!(analysis.empirical_mean_change.expect("present") < 0.0);
        assert_approx(analysis.model.equilibrium_rate, 2.5);
    }

    #[test]
    fn leading_partial_year_is_ignored() {
        let mut points = series_from_annual(Commodity::Wood, 2020, &[1.0, 1.0]).points;
        points.push(MonthlyPrice {
            month: month(2019, 12),
            price: 5.0,
        });
        let series = MonthlyPriceSeries::new(Commodity::Wood, points);
        let analysis = analyze_price_history(&series, &EngineConfig::default()).expect("valid");
        assert_eq!(analysis.annual_changes.len(), 1);
        assert_eq!(analysis.annual_changes[0].year, 2021);
    }

    #[test]
    fn price_shock_in_current_year_is_flagged_year_to_date() {
        let mut points = series_from_annual(Commodity::Gas, 2022, &[1.0, 1.0]).points;
        for m in 1..=3 {
            points.push(MonthlyPrice {
                month: month(2024, m),
                price: 1.3,
            });
        }
        let series = MonthlyPriceSeries::new(Commodity::Gas, points);
        let analysis = analyze_price_history(&series, &EngineConfig::default()).expect("valid");

        assert_eq!(analysis.annual_changes.len(), 2);
        let current = analysis.annual_changes[1];
        assert_eq!(current.year, 2024);
        assert!(current.partial);
        assert!(current.crisis);
        assert!((current.change_percent - 30.0).abs() < 1e-6);
        assert_eq!(analysis.crisis_years, vec![2024]);
    }

    #[test]
    fn calm_partial_year_stays_out_of_empirical_mean() {
        let mut yearly = vec![1.0];
        for _ in 0..5 {
            let previous = *yearly.last().expect("non-empty");
            yearly.push(previous * 1.04);
        }
        let last = *yearly.last().expect("non-empty");
        let mut points = series_from_annual(Commodity::Gas, 2018, &yearly).points;
        points.push(MonthlyPrice {
            month: month(2024, 1),
            price: last * 1.09,
        });
        let series = MonthlyPriceSeries::new(Commodity::Gas, points);
        let analysis = analyze_price_history(&series, &EngineConfig::default()).expect("valid");

        assert!(analysis.annual_changes.last().is_some_and(|c| c.partial && !c.crisis));
        let empirical = analysis.empirical_mean_change.expect("five calm observations");
        assert!((empirical - 4.0).abs() < 1e-6);
    }

    #[test]
    fn from_rows_drops_unparseable_and_non_positive_prices() {
        let json = r#"[
            {"month": "2024-03", "price": "0,25"},
            {"month": "2024-02-01", "price": 0.24},
            {"month": "2024-01", "price": "n/a"},
            {"month": "2023-12", "price": -1},
            {"month": "2023-11", "price": 0},
            {"month": "garbage", "price": 0.2}
        ]"#;
        let rows: Vec<RawPriceRow> = serde_json::from_str(json).expect("rows parse");
        let series = MonthlyPriceSeries::from_rows(Commodity::Electricity, &rows);

        assert_eq!(series.len(), 2);
        assert_eq!(series.points()[0].month, month(2024, 3));
        assert_approx(series.points()[0].price, 0.25);
        assert_approx(series.points()[1].price, 0.24);
    }
}
