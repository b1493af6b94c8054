pub mod cache;
pub mod credit;
mod engine;
mod error;
pub mod evolution;
pub mod history;
pub mod payback;
pub mod subsidy;
mod types;

pub use engine::{
    CostBreakdown, EnergyModels, YearOneCosts, calculate_all_results, project_costs,
    year_one_costs,
};
pub use error::EngineError;
pub use types::{
    AnalyzerConfig, CalculationResults, Commodity, CreditSummary, DEFAULT_TRANSITION_YEARS,
    EngineConfig, EvolutionModel, Financing, HeatPumpSpec, HeatingSystem, HotWaterProduction,
    HotWaterSpec, ProjectInputs, PumpType, YearlyCostRecord,
};
