use serde::Serialize;

use super::history::round1;
use super::types::YearlyCostRecord;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaybackSummary {
    pub payback_period: Option<f64>,
    pub payback_year: Option<i32>,
    pub total_current_cost: f64,
    pub total_heat_pump_cost: f64,
    pub total_savings: f64,
    pub average_annual_savings: f64,
    pub net_benefit: f64,
    pub annualized_rate_of_return: Option<f64>,
}

pub fn summarize(
    records: &[YearlyCostRecord],
    investment: f64,
    current_year: i32,
) -> PaybackSummary {
    let total_current_cost: f64 = records.iter().map(|r| r.current_system_cost).sum();
    let total_heat_pump_cost: f64 = records.iter().map(|r| r.heat_pump_cost).sum();
    let total_savings = total_savings(records);
    let average_annual_savings = if records.is_empty() {
        0.0
    } else {
        total_savings / records.len() as f64
    };
    let net_benefit = total_current_cost - (investment + total_heat_pump_cost);
    let payback_period = payback_period(records, investment);

    PaybackSummary {
        payback_period,
        payback_year: payback_calendar_year(payback_period, current_year),
        total_current_cost,
        total_heat_pump_cost,
        total_savings,
        average_annual_savings,
        net_benefit,
        annualized_rate_of_return: annualized_rate_of_return(
            investment,
            net_benefit,
            records.len() as u32,
        ),
    }
}

/// Years, to one decimal, until cumulative savings cover `investment`; `None` when the
/// horizon ends first.
pub fn payback_period(records: &[YearlyCostRecord], investment: f64) -> Option<f64> {
    let index = records
        .iter()
        .position(|r| r.cumulative_savings >= investment)?;
    if index == 0 {
        return Some(1.0);
    }

    let before = records[index - 1].cumulative_savings;
    let fraction = (investment - before) / records[index].savings;
    Some(round1(index as f64 + fraction))
}

pub fn payback_calendar_year(payback_period: Option<f64>, current_year: i32) -> Option<i32> {
    payback_period.map(|years| current_year.saturating_add(years.floor() as i32))
}

pub fn total_savings(records: &[YearlyCostRecord]) -> f64 {
    records.last().map_or(0.0, |r| r.cumulative_savings)
}

pub fn annualized_rate_of_return(investment: f64, net_benefit: f64, years: u32) -> Option<f64> {
    if investment <= 0.0 || years == 0 {
        return None;
    }
    let years = years as f64;
    let final_value = investment + net_benefit;
    if final_value > 0.0 {
        Some(((final_value / investment).powf(1.0 / years) - 1.0) * 100.0)
    } else {
        Some(net_benefit / investment / years * 100.0)
    }
}
