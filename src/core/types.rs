use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Commodity {
    Electricity,
    Gas,
    Oil,
    Lpg,
    Pellets,
    Wood,
}

impl Commodity {
    pub const ALL: [Commodity; 6] = [
        Commodity::Electricity,
        Commodity::Gas,
        Commodity::Oil,
        Commodity::Lpg,
        Commodity::Pellets,
        Commodity::Wood,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Commodity::Electricity => "electricity",
            Commodity::Gas => "gas",
            Commodity::Oil => "oil",
            Commodity::Lpg => "lpg",
            Commodity::Pellets => "pellets",
            Commodity::Wood => "wood",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(value.trim()))
    }

    /// Long-run yearly price drift in percent: general inflation plus structural demand
    /// growth minus efficiency gains. Policy constants, not derived from data.
    pub fn theoretical_equilibrium_rate(self) -> f64 {
        match self {
            Commodity::Electricity => 3.0,
            Commodity::Gas => 3.5,
            Commodity::Oil => 3.0,
            Commodity::Lpg => 3.0,
            Commodity::Pellets => 2.5,
            Commodity::Wood => 2.0,
        }
    }
}

impl fmt::Display for Commodity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const DEFAULT_TRANSITION_YEARS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvolutionModel {
    pub recent_rate: f64,
    pub equilibrium_rate: f64,
    #[serde(default = "default_transition_years")]
    pub transition_years: u32,
}

fn default_transition_years() -> u32 {
    DEFAULT_TRANSITION_YEARS
}

impl EvolutionModel {
    pub fn new(recent_rate: f64, equilibrium_rate: f64) -> Self {
        Self {
            recent_rate,
            equilibrium_rate,
            transition_years: DEFAULT_TRANSITION_YEARS,
        }
    }

    pub fn with_transition_years(mut self, years: u32) -> Self {
        self.transition_years = years.max(1);
        self
    }

    pub fn flat(rate: f64) -> Self {
        Self::new(rate, rate)
    }
}

pub const OIL_KWH_PER_LITRE: f64 = 10.0;
pub const LPG_KWH_PER_KG: f64 = 12.8;
pub const PELLETS_KWH_PER_KG: f64 = 4.8;
pub const WOOD_KWH_PER_STERE: f64 = 1800.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeatingSystem {
    Oil {
        litres_per_year: f64,
        price_per_litre: f64,
    },
    Gas {
        kwh_per_year: f64,
        price_per_kwh: f64,
    },
    Lpg {
        kg_per_year: f64,
        price_per_kg: f64,
    },
    Pellets {
        kg_per_year: f64,
        price_per_kg: f64,
    },
    Wood {
        steres_per_year: f64,
        price_per_stere: f64,
    },
    Electric {
        kwh_per_year: f64,
        price_per_kwh: f64,
    },
    HeatPump {
        kwh_per_year: f64,
        price_per_kwh: f64,
        cop: f64,
    },
}

impl HeatingSystem {
    pub fn commodity(&self) -> Commodity {
        match self {
            HeatingSystem::Oil { .. } => Commodity::Oil,
            HeatingSystem::Gas { .. } => Commodity::Gas,
            HeatingSystem::Lpg { .. } => Commodity::Lpg,
            HeatingSystem::Pellets { .. } => Commodity::Pellets,
            HeatingSystem::Wood { .. } => Commodity::Wood,
            HeatingSystem::Electric { .. } | HeatingSystem::HeatPump { .. } => {
                Commodity::Electricity
            }
        }
    }

    pub fn annual_energy_cost(&self) -> f64 {
        match *self {
            HeatingSystem::Oil {
                litres_per_year,
                price_per_litre,
            } => litres_per_year * price_per_litre,
            HeatingSystem::Gas {
                kwh_per_year,
                price_per_kwh,
            }
            | HeatingSystem::Electric {
                kwh_per_year,
                price_per_kwh,
            }
            | HeatingSystem::HeatPump {
                kwh_per_year,
                price_per_kwh,
                ..
            } => kwh_per_year * price_per_kwh,
            HeatingSystem::Lpg {
                kg_per_year,
                price_per_kg,
            }
            | HeatingSystem::Pellets {
                kg_per_year,
                price_per_kg,
            } => kg_per_year * price_per_kg,
            HeatingSystem::Wood {
                steres_per_year,
                price_per_stere,
            } => steres_per_year * price_per_stere,
        }
    }

    pub fn heat_demand_kwh(&self) -> f64 {
        match *self {
            HeatingSystem::Oil {
                litres_per_year, ..
            } => litres_per_year * OIL_KWH_PER_LITRE,
            HeatingSystem::Gas { kwh_per_year, .. }
            | HeatingSystem::Electric { kwh_per_year, .. } => kwh_per_year,
            HeatingSystem::Lpg { kg_per_year, .. } => kg_per_year * LPG_KWH_PER_KG,
            HeatingSystem::Pellets { kg_per_year, .. } => kg_per_year * PELLETS_KWH_PER_KG,
            HeatingSystem::Wood {
                steres_per_year, ..
            } => steres_per_year * WOOD_KWH_PER_STERE,
            HeatingSystem::HeatPump {
                kwh_per_year, cop, ..
            } => kwh_per_year * cop,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PumpType {
    AirWater,
    WaterWater,
    AirAir,
}

impl PumpType {
    pub fn label(self) -> &'static str {
        match self {
            PumpType::AirWater => "air/water",
            PumpType::WaterWater => "geothermal",
            PumpType::AirAir => "air/air",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatPumpSpec {
    pub pump_type: PumpType,
    pub power_kw: f64,
    pub cop_estimated: f64,
    /// COP corrected for the dwelling's climate zone; must be > 0.
    pub cop_adjusted: f64,
    pub lifespan_years: u32,
    pub electricity_price_per_kwh: f64,
    pub subscription_delta: f64,
    pub annual_maintenance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HotWaterProduction {
    ElectricTank,
    Thermodynamic { cop: f64 },
    HeatPumpIntegrated,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HotWaterSpec {
    pub annual_need_kwh: f64,
    pub current: HotWaterProduction,
    pub future: HotWaterProduction,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Financing {
    Cash,
    Credit {
        annual_rate_percent: f64,
        months: u32,
    },
    Mixed {
        down_payment: f64,
        annual_rate_percent: f64,
        months: u32,
    },
}

#[derive(Debug, Clone)]
pub struct ProjectInputs {
    pub heating: HeatingSystem,
    pub current_subscription: f64,
    pub current_maintenance: f64,
    pub heat_pump: HeatPumpSpec,
    pub hot_water: Option<HotWaterSpec>,
    pub installation_cost: f64,
    pub subsidy_amount: f64,
    pub financing: Financing,
}

impl ProjectInputs {
    pub fn net_investment(&self) -> f64 {
        (self.installation_cost - self.subsidy_amount).max(0.0)
    }

    pub fn required_commodities(&self) -> Vec<Commodity> {
        let mut out = vec![Commodity::Electricity];
        let current = self.heating.commodity();
        if current != Commodity::Electricity {
            out.push(current);
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearlyCostRecord {
    pub year: u32,
    pub calendar_year: i32,
    pub current_system_cost: f64,
    pub heat_pump_cost: f64,
    pub savings: f64,
    pub cumulative_savings: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditSummary {
    pub principal: f64,
    pub down_payment: f64,
    pub annual_rate_percent: f64,
    pub months: u32,
    pub monthly_payment: f64,
    pub total_cost: f64,
    pub interest_cost: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationResults {
    pub current_cost_year1: f64,
    pub heat_pump_cost_year1: f64,
    pub savings_year1: f64,
    pub average_annual_savings: f64,
    pub net_investment: f64,
    pub real_investment: f64,
    pub payback_period: Option<f64>,
    pub payback_year: Option<i32>,
    pub total_current_cost_lifetime: f64,
    pub total_heat_pump_cost_lifetime: f64,
    pub total_savings_lifetime: f64,
    pub net_benefit_lifetime: f64,
    pub annualized_rate_of_return: Option<f64>,
    pub credit: Option<CreditSummary>,
    pub yearly: Vec<YearlyCostRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalyzerConfig {
    pub long_term_weight: f64,
    pub ten_year_weight: f64,
    pub crisis_threshold_percent: f64,
    pub min_months: usize,
    pub theoretical_weight: f64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            long_term_weight: 0.3,
            ten_year_weight: 0.7,
            crisis_threshold_percent: 10.0,
            min_months: 24,
            theoretical_weight: 0.8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub analyzer: AnalyzerConfig,
    pub inflation_rate_percent: f64,
    pub transition_years: u32,
    pub include_hot_water: bool,
    pub refresh_window_months: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            analyzer: AnalyzerConfig::default(),
            inflation_rate_percent: 2.0,
            transition_years: DEFAULT_TRANSITION_YEARS,
            include_hot_water: true,
            refresh_window_months: 1,
        }
    }
}
