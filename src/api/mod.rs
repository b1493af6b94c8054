use std::collections::BTreeMap;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    Router,
    extract::{Json, Path as UrlPath, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{Datelike, Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::core::cache::{
    CachedModel, InMemoryModelCache, ModelCache, fresh_models, get_or_compute,
};
use crate::core::history::{
    EvolutionAnalysis, MonthlyPriceSeries, RawPriceRow, analyze_price_history,
};
use crate::core::subsidy::{SubsidyRequest, SubsidySummary, SubsidyTables, evaluate_subsidies};
use crate::core::{
    AnalyzerConfig, CalculationResults, Commodity, EnergyModels, EngineConfig, EngineError,
    EvolutionModel, Financing, HeatPumpSpec, HeatingSystem, HotWaterProduction, HotWaterSpec,
    ProjectInputs, PumpType, YearOneCosts, calculate_all_results, year_one_costs,
};

const DEFAULT_LIFESPAN_YEARS: u32 = 17;
const MAX_LIFESPAN_YEARS: u32 = 50;
const MIN_YEAR: i32 = 1800;
const MAX_YEAR: i32 = 9999;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliCommodity {
    Electricity,
    Gas,
    Oil,
    Lpg,
    Pellets,
    Wood,
}

impl From<CliCommodity> for Commodity {
    fn from(value: CliCommodity) -> Self {
        match value {
            CliCommodity::Electricity => Commodity::Electricity,
            CliCommodity::Gas => Commodity::Gas,
            CliCommodity::Oil => Commodity::Oil,
            CliCommodity::Lpg => Commodity::Lpg,
            CliCommodity::Pellets => Commodity::Pellets,
            CliCommodity::Wood => Commodity::Wood,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "heatpump-payback",
    about = "Heat pump payback, profitability and subsidy estimator"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
    #[arg(
        long,
        global = true,
        help = "JSON engine configuration file; replaces the individual tuning flags"
    )]
    config: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        default_value_t = 30.0,
        help = "Weight of the whole-history rate in the recent rate blend, in percent"
    )]
    long_term_weight: f64,
    #[arg(
        long,
        global = true,
        default_value_t = 70.0,
        help = "Weight of the ten-year rate in the recent rate blend, in percent"
    )]
    ten_year_weight: f64,
    #[arg(
        long,
        global = true,
        default_value_t = 10.0,
        help = "Year-over-year price change above which a year is a crisis year, in percent"
    )]
    crisis_threshold: f64,
    #[arg(
        long,
        global = true,
        default_value_t = 24,
        help = "Minimum monthly observations required to analyze a price history"
    )]
    min_months: usize,
    #[arg(
        long,
        global = true,
        default_value_t = 80.0,
        help = "Share of the theoretical equilibrium rate when blended with history, in percent"
    )]
    theoretical_weight: f64,
    #[arg(
        long,
        global = true,
        default_value_t = 2.0,
        help = "Yearly inflation applied to maintenance costs, in percent"
    )]
    inflation_rate: f64,
    #[arg(
        long,
        global = true,
        default_value_t = 5,
        help = "Years for energy price rates to settle at their equilibrium"
    )]
    transition_years: u32,
    #[arg(long, global = true, help = "Leave domestic hot water out of the projection")]
    exclude_hot_water: bool,
    #[arg(
        long,
        global = true,
        default_value_t = 1,
        help = "Calendar months a computed evolution model stays fresh"
    )]
    refresh_window_months: u32,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Run the HTTP API")]
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    #[command(about = "Project a scenario described in a JSON file")]
    Project {
        #[arg(long)]
        input: PathBuf,
    },
    #[command(about = "Evaluate both subsidies for a household described in a JSON file")]
    Subsidies {
        #[arg(long)]
        input: PathBuf,
    },
    #[command(about = "Derive an evolution model from a JSON file of monthly price rows")]
    Analyze {
        #[arg(long, value_enum)]
        commodity: CliCommodity,
        #[arg(long)]
        input: PathBuf,
    },
}

fn build_config(cli: &Cli) -> Result<EngineConfig, String> {
    if let Some(path) = &cli.config {
        let raw = read_file(path)?;
        let config = serde_json::from_str::<EngineConfig>(&raw)
            .map_err(|e| format!("Invalid --config file {}: {e}", path.display()))?;
        validate_config(&config)?;
        return Ok(config);
    }

    for (name, value) in [
        ("--long-term-weight", cli.long_term_weight),
        ("--ten-year-weight", cli.ten_year_weight),
        ("--theoretical-weight", cli.theoretical_weight),
    ] {
        if !(0.0..=100.0).contains(&value) {
            return Err(format!("{name} must be between 0 and 100"));
        }
    }

    let config = EngineConfig {
        analyzer: AnalyzerConfig {
            long_term_weight: cli.long_term_weight / 100.0,
            ten_year_weight: cli.ten_year_weight / 100.0,
            crisis_threshold_percent: cli.crisis_threshold,
            min_months: cli.min_months,
            theoretical_weight: cli.theoretical_weight / 100.0,
        },
        inflation_rate_percent: cli.inflation_rate,
        transition_years: cli.transition_years,
        include_hot_water: !cli.exclude_hot_water,
        refresh_window_months: cli.refresh_window_months,
    };
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &EngineConfig) -> Result<(), String> {
    let analyzer = &config.analyzer;
    for (name, value) in [
        ("--long-term-weight", analyzer.long_term_weight),
        ("--ten-year-weight", analyzer.ten_year_weight),
        ("--theoretical-weight", analyzer.theoretical_weight),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(format!("{name} must be between 0 and 100 percent"));
        }
    }

    if (analyzer.long_term_weight + analyzer.ten_year_weight - 1.0).abs() > 1e-9 {
        return Err("--long-term-weight and --ten-year-weight must add up to 100".to_string());
    }

    if !analyzer.crisis_threshold_percent.is_finite() || analyzer.crisis_threshold_percent <= 0.0
    {
        return Err("--crisis-threshold must be > 0".to_string());
    }

    if analyzer.min_months < 24 {
        return Err("--min-months must be >= 24".to_string());
    }

    if !config.inflation_rate_percent.is_finite() || config.inflation_rate_percent <= -100.0 {
        return Err("--inflation-rate must be > -100".to_string());
    }

    if config.transition_years == 0 {
        return Err("--transition-years must be > 0".to_string());
    }

    if config.refresh_window_months == 0 {
        return Err("--refresh-window-months must be > 0".to_string());
    }

    Ok(())
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiPumpType {
    #[serde(alias = "air-eau", alias = "airWater", alias = "air_water")]
    AirWater,
    #[serde(
        alias = "eau-eau",
        alias = "geothermal",
        alias = "waterWater",
        alias = "water_water"
    )]
    WaterWater,
    #[serde(alias = "airAir", alias = "air_air")]
    AirAir,
}

impl From<ApiPumpType> for PumpType {
    fn from(value: ApiPumpType) -> Self {
        match value {
            ApiPumpType::AirWater => PumpType::AirWater,
            ApiPumpType::WaterWater => PumpType::WaterWater,
            ApiPumpType::AirAir => PumpType::AirAir,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum HeatingPayload {
    #[serde(alias = "fioul", rename_all = "camelCase")]
    Oil {
        litres_per_year: f64,
        price_per_litre: f64,
    },
    #[serde(alias = "gaz", rename_all = "camelCase")]
    Gas {
        kwh_per_year: f64,
        price_per_kwh: f64,
    },
    #[serde(alias = "gpl", alias = "propane", rename_all = "camelCase")]
    Lpg {
        kg_per_year: f64,
        price_per_kg: f64,
    },
    #[serde(alias = "granules", rename_all = "camelCase")]
    Pellets {
        kg_per_year: f64,
        price_per_kg: f64,
    },
    #[serde(alias = "bois", rename_all = "camelCase")]
    Wood {
        steres_per_year: f64,
        price_per_stere: f64,
    },
    #[serde(alias = "electrique", rename_all = "camelCase")]
    Electric {
        kwh_per_year: f64,
        price_per_kwh: f64,
    },
    #[serde(alias = "pac", rename_all = "camelCase")]
    HeatPump {
        kwh_per_year: f64,
        price_per_kwh: f64,
        cop: f64,
    },
}

impl HeatingPayload {
    fn build(&self) -> Result<HeatingSystem, String> {
        let (system, quantity, price) = match *self {
            HeatingPayload::Oil {
                litres_per_year,
                price_per_litre,
            } => (
                HeatingSystem::Oil {
                    litres_per_year,
                    price_per_litre,
                },
                ("heating.litresPerYear", litres_per_year),
                ("heating.pricePerLitre", price_per_litre),
            ),
            HeatingPayload::Gas {
                kwh_per_year,
                price_per_kwh,
            } => (
                HeatingSystem::Gas {
                    kwh_per_year,
                    price_per_kwh,
                },
                ("heating.kwhPerYear", kwh_per_year),
                ("heating.pricePerKwh", price_per_kwh),
            ),
            HeatingPayload::Lpg {
                kg_per_year,
                price_per_kg,
            } => (
                HeatingSystem::Lpg {
                    kg_per_year,
                    price_per_kg,
                },
                ("heating.kgPerYear", kg_per_year),
                ("heating.pricePerKg", price_per_kg),
            ),
            HeatingPayload::Pellets {
                kg_per_year,
                price_per_kg,
            } => (
                HeatingSystem::Pellets {
                    kg_per_year,
                    price_per_kg,
                },
                ("heating.kgPerYear", kg_per_year),
                ("heating.pricePerKg", price_per_kg),
            ),
            HeatingPayload::Wood {
                steres_per_year,
                price_per_stere,
            } => (
                HeatingSystem::Wood {
                    steres_per_year,
                    price_per_stere,
                },
                ("heating.steresPerYear", steres_per_year),
                ("heating.pricePerStere", price_per_stere),
            ),
            HeatingPayload::Electric {
                kwh_per_year,
                price_per_kwh,
            } => (
                HeatingSystem::Electric {
                    kwh_per_year,
                    price_per_kwh,
                },
                ("heating.kwhPerYear", kwh_per_year),
                ("heating.pricePerKwh", price_per_kwh),
            ),
            HeatingPayload::HeatPump {
                kwh_per_year,
                price_per_kwh,
                cop,
            } => {
                if !cop.is_finite() || cop <= 0.0 {
                    return Err("heating.cop must be > 0".to_string());
                }
                (
                    HeatingSystem::HeatPump {
                        kwh_per_year,
                        price_per_kwh,
                        cop,
                    },
                    ("heating.kwhPerYear", kwh_per_year),
                    ("heating.pricePerKwh", price_per_kwh),
                )
            }
        };

        for (name, value) in [quantity, price] {
            non_negative(name, value)?;
        }
        Ok(system)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HeatPumpPayload {
    pump_type: ApiPumpType,
    #[serde(default)]
    power_kw: f64,
    cop_estimated: f64,
    cop_adjusted: Option<f64>,
    lifespan_years: Option<u32>,
    electricity_price_per_kwh: f64,
    #[serde(default)]
    subscription_delta: f64,
    #[serde(default)]
    annual_maintenance: f64,
}

#[derive(Copy, Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum HotWaterProductionPayload {
    #[serde(alias = "ballon-electrique")]
    ElectricTank,
    #[serde(alias = "thermodynamique")]
    Thermodynamic { cop: f64 },
    #[serde(alias = "pac")]
    HeatPump,
}

impl HotWaterProductionPayload {
    fn build(self, field: &str) -> Result<HotWaterProduction, String> {
        match self {
            HotWaterProductionPayload::ElectricTank => Ok(HotWaterProduction::ElectricTank),
            HotWaterProductionPayload::Thermodynamic { cop } => {
                if !cop.is_finite() || cop <= 0.0 {
                    return Err(format!("{field}.cop must be > 0"));
                }
                Ok(HotWaterProduction::Thermodynamic { cop })
            }
            HotWaterProductionPayload::HeatPump => Ok(HotWaterProduction::HeatPumpIntegrated),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HotWaterPayload {
    annual_need_kwh: f64,
    current: HotWaterProductionPayload,
    future: HotWaterProductionPayload,
}

#[derive(Copy, Clone, Debug, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
enum FinancingPayload {
    #[serde(alias = "comptant")]
    Cash,
    #[serde(rename_all = "camelCase")]
    Credit {
        annual_rate_percent: f64,
        months: u32,
    },
    #[serde(alias = "mixte", rename_all = "camelCase")]
    Mixed {
        down_payment: f64,
        annual_rate_percent: f64,
        months: u32,
    },
}

impl From<FinancingPayload> for Financing {
    fn from(value: FinancingPayload) -> Self {
        match value {
            FinancingPayload::Cash => Financing::Cash,
            FinancingPayload::Credit {
                annual_rate_percent,
                months,
            } => Financing::Credit {
                annual_rate_percent,
                months,
            },
            FinancingPayload::Mixed {
                down_payment,
                annual_rate_percent,
                months,
            } => Financing::Mixed {
                down_payment,
                annual_rate_percent,
                months,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HouseholdPayload {
    household_size: Option<u32>,
    reference_income: Option<f64>,
    postal_code: Option<String>,
    construction_year: Option<i32>,
    primary_residence: bool,
    full_replacement: bool,
}

impl HouseholdPayload {
    fn build(self, pump_type: PumpType, prefix: &str) -> Result<SubsidyRequest, String> {
        plausible_year(&format!("{prefix}constructionYear"), self.construction_year)?;
        Ok(SubsidyRequest {
            household_size: self.household_size.unwrap_or(0),
            reference_income: self.reference_income,
            postal_code: self.postal_code,
            construction_year: self.construction_year,
            primary_residence: self.primary_residence,
            full_replacement: self.full_replacement,
            pump_type,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubsidiesPayload {
    pump_type: ApiPumpType,
    #[serde(flatten)]
    household: HouseholdPayload,
    current_year: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectPayload {
    heating: HeatingPayload,
    #[serde(default)]
    current_subscription: f64,
    #[serde(default)]
    current_maintenance: f64,
    heat_pump: HeatPumpPayload,
    hot_water: Option<HotWaterPayload>,
    installation_cost: f64,
    #[serde(default)]
    subsidy_amount: f64,
    household: Option<HouseholdPayload>,
    financing: Option<FinancingPayload>,
    #[serde(default)]
    energy_models: BTreeMap<Commodity, EvolutionModel>,
    current_year: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EvolutionPayload {
    commodity: Commodity,
    rows: Vec<RawPriceRow>,
    #[serde(default)]
    refresh: bool,
}

#[derive(Debug)]
struct ProjectRequest {
    inputs: ProjectInputs,
    subsidy: Option<SubsidyRequest>,
    models: EnergyModels,
    current_year: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectResponse {
    #[serde(flatten)]
    results: CalculationResults,
    year_one_breakdown: YearOneCosts,
    subsidies: Option<SubsidySummary>,
    energy_models: BTreeMap<Commodity, EvolutionModel>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EvolutionResponse {
    commodity: Commodity,
    cached: CachedModel,
    analysis: Option<EvolutionAnalysis>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn plausible_year(name: &str, year: Option<i32>) -> Result<(), String> {
    match year {
        Some(year) if !(MIN_YEAR..=MAX_YEAR).contains(&year) => Err(format!(
            "{name} must be between {MIN_YEAR} and {MAX_YEAR}"
        )),
        _ => Ok(()),
    }
}

fn non_negative(name: &str, value: f64) -> Result<(), String> {
    if !value.is_finite() || value < 0.0 {
        return Err(format!("{name} must be >= 0"));
    }
    Ok(())
}

fn build_project(payload: ProjectPayload) -> Result<ProjectRequest, String> {
    let heating = payload.heating.build()?;
    plausible_year("currentYear", payload.current_year)?;

    non_negative("currentSubscription", payload.current_subscription)?;
    non_negative("currentMaintenance", payload.current_maintenance)?;
    non_negative("installationCost", payload.installation_cost)?;
    non_negative("subsidyAmount", payload.subsidy_amount)?;

    let hp = &payload.heat_pump;
    if !hp.cop_estimated.is_finite() || hp.cop_estimated <= 0.0 {
        return Err("heatPump.copEstimated must be > 0".to_string());
    }
    let cop_adjusted = hp.cop_adjusted.unwrap_or(hp.cop_estimated);
    if !cop_adjusted.is_finite() || cop_adjusted <= 0.0 {
        return Err("heatPump.copAdjusted must be > 0".to_string());
    }
    let lifespan_years = hp.lifespan_years.unwrap_or(DEFAULT_LIFESPAN_YEARS);
    if lifespan_years == 0 || lifespan_years > MAX_LIFESPAN_YEARS {
        return Err(format!(
            "heatPump.lifespanYears must be between 1 and {MAX_LIFESPAN_YEARS}"
        ));
    }
    non_negative("heatPump.powerKw", hp.power_kw)?;
    non_negative("heatPump.electricityPricePerKwh", hp.electricity_price_per_kwh)?;
    non_negative("heatPump.annualMaintenance", hp.annual_maintenance)?;
    if !hp.subscription_delta.is_finite() {
        return Err("heatPump.subscriptionDelta must be a number".to_string());
    }
    let pump_type = PumpType::from(hp.pump_type);
    let heat_pump = HeatPumpSpec {
        pump_type,
        power_kw: hp.power_kw,
        cop_estimated: hp.cop_estimated,
        cop_adjusted,
        lifespan_years,
        electricity_price_per_kwh: hp.electricity_price_per_kwh,
        subscription_delta: hp.subscription_delta,
        annual_maintenance: hp.annual_maintenance,
    };

    let hot_water = match payload.hot_water {
        Some(dhw) => {
            non_negative("hotWater.annualNeedKwh", dhw.annual_need_kwh)?;
            Some(HotWaterSpec {
                annual_need_kwh: dhw.annual_need_kwh,
                current: dhw.current.build("hotWater.current")?,
                future: dhw.future.build("hotWater.future")?,
            })
        }
        None => None,
    };

    let financing = payload.financing.map_or(Financing::Cash, Financing::from);
    match financing {
        Financing::Cash => {}
        Financing::Credit {
            annual_rate_percent,
            ..
        } => non_negative("financing.annualRatePercent", annual_rate_percent)?,
        Financing::Mixed {
            down_payment,
            annual_rate_percent,
            ..
        } => {
            non_negative("financing.downPayment", down_payment)?;
            non_negative("financing.annualRatePercent", annual_rate_percent)?;
        }
    }

    for (commodity, model) in &payload.energy_models {
        if !model.recent_rate.is_finite() || !model.equilibrium_rate.is_finite() {
            return Err(format!("energyModels.{commodity} rates must be numbers"));
        }
        if model.transition_years == 0 {
            return Err(format!("energyModels.{commodity}.transitionYears must be > 0"));
        }
    }

    Ok(ProjectRequest {
        inputs: ProjectInputs {
            heating,
            current_subscription: payload.current_subscription,
            current_maintenance: payload.current_maintenance,
            heat_pump,
            hot_water,
            installation_cost: payload.installation_cost,
            subsidy_amount: payload.subsidy_amount,
            financing,
        },
        subsidy: payload
            .household
            .map(|h| h.build(pump_type, "household."))
            .transpose()?,
        models: payload.energy_models.into_iter().collect(),
        current_year: payload.current_year,
    })
}

fn run_project<C: ModelCache + ?Sized>(
    request: ProjectRequest,
    config: &EngineConfig,
    tables: &SubsidyTables,
    cache: &C,
    today: NaiveDate,
) -> Result<ProjectResponse, EngineError> {
    let ProjectRequest {
        mut inputs,
        subsidy,
        models: explicit,
        current_year,
    } = request;
    let current_year = current_year.unwrap_or(today.year());

    let subsidies = match subsidy {
        Some(request) => {
            let summary = evaluate_subsidies(&request, tables, current_year)?;
            inputs.subsidy_amount = summary.total;
            Some(summary)
        }
        None => None,
    };

    let mut models = fresh_models(
        cache,
        &inputs.required_commodities(),
        today,
        config.refresh_window_months,
    );
    for (commodity, model) in explicit.iter() {
        models.insert(commodity, *model);
    }

    let results = calculate_all_results(&inputs, &models, config, current_year)?;
    Ok(ProjectResponse {
        results,
        year_one_breakdown: year_one_costs(&inputs, config),
        subsidies,
        energy_models: models.iter().map(|(c, m)| (c, *m)).collect(),
    })
}

#[derive(Debug)]
struct SubsidiesRequest {
    request: SubsidyRequest,
    current_year: Option<i32>,
}

fn build_subsidies(payload: SubsidiesPayload) -> Result<SubsidiesRequest, String> {
    plausible_year("currentYear", payload.current_year)?;
    Ok(SubsidiesRequest {
        request: payload.household.build(payload.pump_type.into(), "")?,
        current_year: payload.current_year,
    })
}

fn run_subsidies(
    request: SubsidiesRequest,
    tables: &SubsidyTables,
    today: NaiveDate,
) -> Result<SubsidySummary, EngineError> {
    let current_year = request.current_year.unwrap_or(today.year());
    evaluate_subsidies(&request.request, tables, current_year)
}

fn analyze_and_cache<C: ModelCache + ?Sized>(
    payload: EvolutionPayload,
    config: &EngineConfig,
    cache: &mut C,
    today: NaiveDate,
) -> Result<EvolutionResponse, EngineError> {
    let series = MonthlyPriceSeries::from_rows(payload.commodity, &payload.rows);
    let mut analysis = None;
    let mut analyze = || -> Result<EvolutionModel, EngineError> {
        let result = analyze_price_history(&series, config)?;
        let model = result.model;
        analysis = Some(result);
        Ok(model)
    };

    let model = if payload.refresh {
        let model = analyze()?;
        cache.put(payload.commodity, model, today);
        model
    } else {
        get_or_compute(
            &mut *cache,
            payload.commodity,
            today,
            config.refresh_window_months,
            analyze,
        )?
    };

    let cached = cache.get(payload.commodity).unwrap_or(CachedModel {
        model,
        computed_on: today,
    });
    Ok(EvolutionResponse {
        commodity: payload.commodity,
        cached,
        analysis,
    })
}

struct AppState {
    config: EngineConfig,
    tables: SubsidyTables,
    cache: Mutex<InMemoryModelCache>,
}

pub async fn run(cli: Cli) -> Result<(), String> {
    let config = build_config(&cli)?;
    let today = Local::now().date_naive();
    let tables = SubsidyTables::default();

    match cli.command {
        Command::Serve { port } => run_http_server(port, config)
            .await
            .map_err(|e| format!("Server error: {e}")),
        Command::Project { input } => {
            let payload = parse_file::<ProjectPayload>(&input)?;
            let request = build_project(payload)?;
            let cache = InMemoryModelCache::new();
            let response = run_project(request, &config, &tables, &cache, today)
                .map_err(|e| e.to_string())?;
            print_json(&response)
        }
        Command::Subsidies { input } => {
            let payload = parse_file::<SubsidiesPayload>(&input)?;
            let request = build_subsidies(payload)?;
            let summary = run_subsidies(request, &tables, today).map_err(|e| e.to_string())?;
            print_json(&summary)
        }
        Command::Analyze { commodity, input } => {
            let rows = parse_file::<Vec<RawPriceRow>>(&input)?;
            let series = MonthlyPriceSeries::from_rows(commodity.into(), &rows);
            let analysis = analyze_price_history(&series, &config).map_err(|e| e.to_string())?;
            print_json(&analysis)
        }
    }
}

fn read_file(path: &Path) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("Cannot read {}: {e}", path.display()))
}

fn parse_file<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, String> {
    let raw = read_file(path)?;
    serde_json::from_str(&raw).map_err(|e| format!("Invalid JSON in {}: {e}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    println!("{json}");
    Ok(())
}

pub async fn run_http_server(port: u16, config: EngineConfig) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let state = Arc::new(AppState {
        config,
        tables: SubsidyTables::default(),
        cache: Mutex::new(InMemoryModelCache::new()),
    });
    let app = Router::new()
        .route("/api/project", post(project_handler))
        .route("/api/subsidies", post(subsidies_handler))
        .route("/api/evolution", post(evolution_post_handler))
        .route("/api/evolution/:commodity", get(evolution_get_handler))
        .fallback(not_found_handler)
        .with_state(state);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "heat pump payback API listening");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn project_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ProjectPayload>,
) -> Response {
    let request = match build_project(payload) {
        Ok(request) => request,
        Err(msg) => {
            warn!(error = %msg, "rejected project payload");
            return error_response(StatusCode::BAD_REQUEST, &msg);
        }
    };

    let today = Local::now().date_naive();
    let cache = state.cache.lock().await;
    match run_project(request, &state.config, &state.tables, &*cache, today) {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(err) => engine_error_response(err),
    }
}

async fn subsidies_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SubsidiesPayload>,
) -> Response {
    let request = match build_subsidies(payload) {
        Ok(request) => request,
        Err(msg) => {
            warn!(error = %msg, "rejected subsidies payload");
            return error_response(StatusCode::BAD_REQUEST, &msg);
        }
    };

    let today = Local::now().date_naive();
    match run_subsidies(request, &state.tables, today) {
        Ok(summary) => json_response(StatusCode::OK, summary),
        Err(err) => engine_error_response(err),
    }
}

async fn evolution_post_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<EvolutionPayload>,
) -> Response {
    let today = Local::now().date_naive();
    let mut cache = state.cache.lock().await;
    match analyze_and_cache(payload, &state.config, &mut *cache, today) {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(err) => engine_error_response(err),
    }
}

async fn evolution_get_handler(
    State(state): State<Arc<AppState>>,
    UrlPath(commodity): UrlPath<String>,
) -> Response {
    let Some(commodity) = Commodity::parse(&commodity) else {
        return error_response(StatusCode::NOT_FOUND, "Unknown commodity");
    };
    let cache = state.cache.lock().await;
    match cache.get(commodity) {
        Some(cached) => json_response(StatusCode::OK, cached),
        None => error_response(
            StatusCode::NOT_FOUND,
            &format!("No evolution model cached for {commodity}"),
        ),
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

fn engine_error_response(err: EngineError) -> Response {
    warn!(error = %err, "engine rejected request");
    error_response(StatusCode::UNPROCESSABLE_ENTITY, &err.to_string())
}
