use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use super::credit::real_investment;
use super::error::EngineError;
use super::evolution::{cumulative_factors, inflation_factors};
use super::payback::summarize;
use super::types::{
    CalculationResults, Commodity, EngineConfig, EvolutionModel, HeatPumpSpec,
    HotWaterProduction, HotWaterSpec, ProjectInputs, YearlyCostRecord,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnergyModels {
    models: BTreeMap<Commodity, EvolutionModel>,
}

impl EnergyModels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, commodity: Commodity, model: EvolutionModel) -> Self {
        self.insert(commodity, model);
        self
    }

    pub fn insert(&mut self, commodity: Commodity, model: EvolutionModel) {
        self.models.insert(commodity, model);
    }

    pub fn get(&self, commodity: Commodity) -> Option<&EvolutionModel> {
        self.models.get(&commodity)
    }

    pub fn require(&self, commodity: Commodity) -> Result<&EvolutionModel, EngineError> {
        self.get(commodity)
            .ok_or(EngineError::MissingEnergyModel { commodity })
    }

    pub fn iter(&self) -> impl Iterator<Item = (Commodity, &EvolutionModel)> {
        self.models.iter().map(|(c, m)| (*c, m))
    }
}

impl FromIterator<(Commodity, EvolutionModel)> for EnergyModels {
    fn from_iter<I: IntoIterator<Item = (Commodity, EvolutionModel)>>(iter: I) -> Self {
        Self {
            models: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostBreakdown {
    pub energy: f64,
    pub subscription: f64,
    pub maintenance: f64,
    pub hot_water: f64,
}

impl CostBreakdown {
    pub fn total(&self) -> f64 {
        self.energy + self.subscription + self.maintenance + self.hot_water
    }

    fn at_year(&self, energy_factor: f64, inflation_factor: f64, electricity_factor: f64) -> f64 {
        self.energy * energy_factor
            + self.subscription * energy_factor
            + self.maintenance * inflation_factor
            + self.hot_water * electricity_factor
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearOneCosts {
    pub current: CostBreakdown,
    pub heat_pump: CostBreakdown,
}

pub fn year_one_costs(inputs: &ProjectInputs, config: &EngineConfig) -> YearOneCosts {
    let heat_pump = &inputs.heat_pump;
    let hot_water = inputs.hot_water.filter(|_| config.include_hot_water);

    let current = CostBreakdown {
        energy: inputs.heating.annual_energy_cost(),
        subscription: inputs.current_subscription,
        maintenance: inputs.current_maintenance,
        hot_water: hot_water.map_or(0.0, |dhw| hot_water_cost(&dhw, dhw.current, heat_pump)),
    };

    let heat_pump_energy = inputs.heating.heat_demand_kwh() / heat_pump.cop_adjusted
        * heat_pump.electricity_price_per_kwh;
    let future = CostBreakdown {
        energy: heat_pump_energy,
        subscription: heat_pump.subscription_delta,
        maintenance: heat_pump.annual_maintenance,
        hot_water: hot_water.map_or(0.0, |dhw| hot_water_cost(&dhw, dhw.future, heat_pump)),
    };

    YearOneCosts {
        current,
        heat_pump: future,
    }
}

fn hot_water_cost(
    dhw: &HotWaterSpec,
    production: HotWaterProduction,
    heat_pump: &HeatPumpSpec,
) -> f64 {
    let efficiency = match production {
        HotWaterProduction::ElectricTank => 1.0,
        HotWaterProduction::Thermodynamic { cop } => cop,
        HotWaterProduction::HeatPumpIntegrated => heat_pump.cop_adjusted,
    };
    dhw.annual_need_kwh / efficiency * heat_pump.electricity_price_per_kwh
}

pub fn project_costs(
    inputs: &ProjectInputs,
    models: &EnergyModels,
    config: &EngineConfig,
    start_year: i32,
) -> Result<Vec<YearlyCostRecord>, EngineError> {
    let years = inputs.heat_pump.lifespan_years;
    let current_model = models.require(inputs.heating.commodity())?;
    let electricity_model = models.require(Commodity::Electricity)?;

    let costs = year_one_costs(inputs, config);
    let current_factors = cumulative_factors(current_model, years);
    let electricity_factors = cumulative_factors(electricity_model, years);
    let inflation = inflation_factors(config.inflation_rate_percent, years);

    let mut records = Vec::with_capacity(years as usize);
    let mut cumulative_savings = 0.0;
    for i in 0..years as usize {
        let current_system_cost =
            costs
                .current
                .at_year(current_factors[i], inflation[i], electricity_factors[i]);
        let heat_pump_cost =
            costs
                .heat_pump
                .at_year(electricity_factors[i], inflation[i], electricity_factors[i]);
        let savings = current_system_cost - heat_pump_cost;
        cumulative_savings += savings;
        records.push(YearlyCostRecord {
            year: i as u32 + 1,
            calendar_year: start_year.saturating_add(i as i32 + 1),
            current_system_cost,
            heat_pump_cost,
            savings,
            cumulative_savings,
        });
    }

    Ok(records)
}

pub fn calculate_all_results(
    inputs: &ProjectInputs,
    models: &EnergyModels,
    config: &EngineConfig,
    current_year: i32,
) -> Result<CalculationResults, EngineError> {
    let net_investment = inputs.net_investment();
    let investment = real_investment(net_investment, &inputs.financing)?;
    let yearly = project_costs(inputs, models, config, current_year)?;
    let summary = summarize(&yearly, investment.amount, current_year);
    let year_one = year_one_costs(inputs, config);

    debug!(
        heating = %inputs.heating.commodity(),
        years = yearly.len(),
        real_investment = investment.amount,
        payback = ?summary.payback_period,
        net_benefit = summary.net_benefit,
        "projected scenario"
    );

    let (current_cost_year1, heat_pump_cost_year1, savings_year1) = match yearly.first() {
        Some(first) => (first.current_system_cost, first.heat_pump_cost, first.savings),
        None => {
            let current = year_one.current.total();
            let heat_pump = year_one.heat_pump.total();
            (current, heat_pump, current - heat_pump)
        }
    };

    Ok(CalculationResults {
        current_cost_year1,
        heat_pump_cost_year1,
        savings_year1,
        average_annual_savings: summary.average_annual_savings,
        net_investment,
        real_investment: investment.amount,
        payback_period: summary.payback_period,
        payback_year: summary.payback_year,
        total_current_cost_lifetime: summary.total_current_cost,
        total_heat_pump_cost_lifetime: summary.total_heat_pump_cost,
        total_savings_lifetime: summary.total_savings,
        net_benefit_lifetime: summary.net_benefit,
        annualized_rate_of_return: summary.annualized_rate_of_return,
        credit: investment.credit,
        yearly,
    })
}
