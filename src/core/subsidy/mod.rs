mod certificates;
mod renovation;

use std::fmt;

use serde::Serialize;

use super::error::EngineError;
use super::types::PumpType;

pub use certificates::{CertificateTier, evaluate_certificate_subsidy};
pub use renovation::{RenovationTier, evaluate_renovation_subsidy};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Region {
    IleDeFrance,
    RestOfFrance,
}

const ILE_DE_FRANCE_DEPARTMENTS: [&str; 8] = ["75", "77", "78", "91", "92", "93", "94", "95"];

impl Region {
    pub fn from_postal_code(postal_code: &str) -> Option<Self> {
        let code = postal_code.trim();
        if code.len() != 5 || !code.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        if ILE_DE_FRANCE_DEPARTMENTS.contains(&&code[..2]) {
            Some(Region::IleDeFrance)
        } else {
            Some(Region::RestOfFrance)
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::IleDeFrance => f.write_str("Île-de-France"),
            Region::RestOfFrance => f.write_str("rest of France"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdTable {
    pub base: [[f64; 3]; 5],
    pub per_extra_person: [f64; 3],
}

impl ThresholdTable {
    pub fn ceilings(&self, household_size: u32) -> [f64; 3] {
        let size = household_size.max(1);
        if size <= 5 {
            return self.base[size as usize - 1];
        }
        let extra = (size - 5) as f64;
        let mut ceilings = self.base[4];
        for (ceiling, increment) in ceilings.iter_mut().zip(self.per_extra_person) {
            *ceiling += increment * extra;
        }
        ceilings
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IncomeThresholds {
    pub ile_de_france: ThresholdTable,
    pub rest_of_france: ThresholdTable,
}

impl IncomeThresholds {
    pub fn for_region(&self, region: Region) -> &ThresholdTable {
        match region {
            Region::IleDeFrance => &self.ile_de_france,
            Region::RestOfFrance => &self.rest_of_france,
        }
    }

    /// Index of the first of the lowest `columns` ceilings the income fits under, or
    /// `columns` when it exceeds all of them.
    pub fn classify(&self, household: &Household, columns: usize) -> usize {
        let ceilings = self.for_region(household.region).ceilings(household.size);
        ceilings
            .iter()
            .take(columns)
            .position(|ceiling| household.income <= *ceiling)
            .unwrap_or(columns.min(ceilings.len()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PumpAmounts {
    pub air_water: f64,
    pub water_water: f64,
    pub air_air: f64,
}

impl PumpAmounts {
    pub fn for_pump(&self, pump_type: PumpType) -> f64 {
        match pump_type {
            PumpType::AirWater => self.air_water,
            PumpType::WaterWater => self.water_water,
            PumpType::AirAir => self.air_air,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubsidyTables {
    pub regulatory_year: i32,
    pub thresholds: IncomeThresholds,
    pub renovation_amounts: [PumpAmounts; 4],
    pub certificate_amounts: [PumpAmounts; 3],
}

pub const TABLES_2024: SubsidyTables = SubsidyTables {
    regulatory_year: 2024,
    thresholds: IncomeThresholds {
        ile_de_france: ThresholdTable {
            base: [
                [23_541.0, 28_657.0, 40_018.0],
                [34_551.0, 42_058.0, 58_827.0],
                [41_493.0, 50_513.0, 70_382.0],
                [48_447.0, 58_981.0, 82_839.0],
                [55_427.0, 67_473.0, 94_844.0],
            ],
            per_extra_person: [6_970.0, 8_486.0, 12_006.0],
        },
        rest_of_france: ThresholdTable {
            base: [
                [17_009.0, 21_805.0, 30_549.0],
                [24_875.0, 31_889.0, 44_907.0],
                [29_917.0, 38_349.0, 54_071.0],
                [34_948.0, 44_802.0, 63_235.0],
                [40_002.0, 51_281.0, 72_400.0],
            ],
            per_extra_person: [5_045.0, 6_462.0, 9_165.0],
        },
    },
    renovation_amounts: [
        PumpAmounts {
            air_water: 5_000.0,
            water_water: 11_000.0,
            air_air: 0.0,
        },
        PumpAmounts {
            air_water: 4_000.0,
            water_water: 9_000.0,
            air_air: 0.0,
        },
        PumpAmounts {
            air_water: 3_000.0,
            water_water: 6_000.0,
            air_air: 0.0,
        },
        PumpAmounts {
            air_water: 0.0,
            water_water: 0.0,
            air_air: 0.0,
        },
    ],
    certificate_amounts: [
        PumpAmounts {
            air_water: 5_000.0,
            water_water: 5_000.0,
            air_air: 900.0,
        },
        PumpAmounts {
            air_water: 5_000.0,
            water_water: 5_000.0,
            air_air: 700.0,
        },
        PumpAmounts {
            air_water: 4_000.0,
            water_water: 4_000.0,
            air_air: 0.0,
        },
    ],
};

impl Default for SubsidyTables {
    fn default() -> Self {
        TABLES_2024
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubsidyRequest {
    pub household_size: u32,
    pub reference_income: Option<f64>,
    pub postal_code: Option<String>,
    pub construction_year: Option<i32>,
    pub primary_residence: bool,
    pub full_replacement: bool,
    pub pump_type: PumpType,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Household {
    pub region: Region,
    pub size: u32,
    pub income: f64,
}

impl Household {
    pub fn from_request(request: &SubsidyRequest) -> Result<Self, EngineError> {
        if request.household_size == 0 {
            return Err(incomplete("household size"));
        }
        let income = request
            .reference_income
            .filter(|v| v.is_finite() && *v >= 0.0)
            .ok_or_else(|| incomplete("reference income"))?;
        let region = request
            .postal_code
            .as_deref()
            .and_then(Region::from_postal_code)
            .ok_or_else(|| incomplete("postal code"))?;
        Ok(Self {
            region,
            size: request.household_size,
            income,
        })
    }

    fn details(&self) -> Vec<String> {
        vec![
            format!("Zone: {}", self.region),
            format!("Household: {} person(s)", self.size),
            format!("Reference income: {:.0} €", self.income),
        ]
    }
}

pub(crate) fn dwelling_age(request: &SubsidyRequest, current_year: i32) -> Result<i32, EngineError> {
    request
        .construction_year
        .map(|year| current_year.saturating_sub(year))
        .ok_or_else(|| incomplete("construction year"))
}

fn incomplete(field: &'static str) -> EngineError {
    EngineError::SubsidyInputIncomplete { field }
}

pub(crate) const FULL_REPLACEMENT_REASON: &str =
    "The heat pump must fully replace the existing heating system";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubsidyEligibilityResult {
    pub eligible: bool,
    pub category: Option<String>,
    pub amount: f64,
    pub verdict: String,
    pub details: Vec<String>,
    pub failure_reasons: Vec<String>,
}

impl SubsidyEligibilityResult {
    pub(crate) fn rejected(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            eligible: false,
            category: None,
            amount: 0.0,
            verdict: format!("Not eligible: {reason}"),
            details: Vec::new(),
            failure_reasons: vec![reason],
        }
    }

    pub(crate) fn rejected_in_tier(
        tier: &str,
        household: &Household,
        reason: impl Into<String>,
    ) -> Self {
        let mut result = Self::rejected(reason);
        result.category = Some(tier.to_string());
        result.details = household.details();
        result
    }

    pub(crate) fn granted(
        tier: &str,
        household: &Household,
        amount: f64,
        pump_type: PumpType,
    ) -> Self {
        Self {
            eligible: true,
            category: Some(tier.to_string()),
            amount,
            verdict: format!(
                "Eligible: {tier} category, {amount:.0} € for a {} heat pump",
                pump_type.label()
            ),
            details: household.details(),
            failure_reasons: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubsidySummary {
    pub renovation: SubsidyEligibilityResult,
    pub certificates: SubsidyEligibilityResult,
    pub total: f64,
}

pub fn evaluate_subsidies(
    request: &SubsidyRequest,
    tables: &SubsidyTables,
    current_year: i32,
) -> Result<SubsidySummary, EngineError> {
    let renovation = evaluate_renovation_subsidy(request, tables, current_year)?;
    let certificates = evaluate_certificate_subsidy(request, tables, current_year)?;
    let total = renovation.amount + certificates.amount;
    Ok(SubsidySummary {
        renovation,
        certificates,
        total,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_request() -> SubsidyRequest {
        SubsidyRequest {
            household_size: 2,
            reference_income: Some(35_000.0),
            postal_code: Some("69003".to_string()),
            construction_year: Some(2000),
            primary_residence: true,
            full_replacement: true,
            pump_type: PumpType::AirWater,
        }
    }

    fn household(region: Region, size: u32, income: f64) -> Household {
        Household {
            region,
            size,
            income,
        }
    }

    #[test]
    fn postal_code_selects_region() {
        assert_eq!(Region::from_postal_code("75011"), Some(Region::IleDeFrance));
        assert_eq!(Region::from_postal_code(" 93100 "), Some(Region::IleDeFrance));
        assert_eq!(Region::from_postal_code("69003"), Some(Region::RestOfFrance));
        assert_eq!(Region::from_postal_code("7501"), None);
        assert_eq!(Region::from_postal_code("7501A"), None);
    }

    #[test]
    fn ceilings_grow_per_extra_person_past_five() {
        let table = &TABLES_2024.thresholds.rest_of_france;
        assert_eq!(table.ceilings(5), [40_002.0, 51_281.0, 72_400.0]);
        assert_eq!(
            table.ceilings(7),
            [
                40_002.0 + 2.0 * 5_045.0,
                51_281.0 + 2.0 * 6_462.0,
                72_400.0 + 2.0 * 9_165.0
            ]
        );
    }

    #[test]
    fn classification_uses_inclusive_ceilings() {
        let thresholds = &TABLES_2024.thresholds;
        assert_eq!(thresholds.classify(&household(Region::RestOfFrance, 1, 17_009.0), 3), 0);
        assert_eq!(thresholds.classify(&household(Region::RestOfFrance, 1, 17_010.0), 3), 1);
        assert_eq!(thresholds.classify(&household(Region::RestOfFrance, 1, 40_000.0), 3), 3);
        assert_eq!(thresholds.classify(&household(Region::RestOfFrance, 1, 25_000.0), 2), 2);
        assert_eq!(thresholds.classify(&household(Region::IleDeFrance, 1, 25_000.0), 3), 1);
    }

    #[test]
    fn missing_income_or_postal_code_is_incomplete() {
        let mut request = sample_request();
        request.reference_income = None;
        assert_eq!(
            Household::from_request(&request),
            Err(EngineError::SubsidyInputIncomplete {
                field: "reference income"
            })
        );

        let mut request = sample_request();
        request.postal_code = Some("abc".to_string());
        assert_eq!(
            Household::from_request(&request),
            Err(EngineError::SubsidyInputIncomplete {
                field: "postal code"
            })
        );
    }

    #[test]
    fn dwelling_age_does_not_overflow() {
        let mut request = sample_request();
        request.construction_year = Some(i32::MIN);
        assert_eq!(dwelling_age(&request, 2025), Ok(i32::MAX));

        request.construction_year = Some(i32::MAX);
        assert_eq!(dwelling_age(&request, -2), Ok(i32::MIN));
    }

    #[test]
    fn both_subsidies_add_up() {
        let summary = evaluate_subsidies(&sample_request(), &TABLES_2024, 2025).expect("valid");
        assert!(summary.renovation.eligible);
        assert!(summary.certificates.eligible);
        assert_eq!(
            summary.total,
            summary.renovation.amount + summary.certificates.amount
        );
    }

    #[test]
    fn partial_replacement_rejects_both_subsidies_with_specific_reason() {
        let mut request = sample_request();
        request.full_replacement = false;
        request.reference_income = Some(10_000.0);

        let summary = evaluate_subsidies(&request, &TABLES_2024, 2025).expect("valid");
        for result in [&summary.renovation, &summary.certificates] {
            assert!(!result.eligible);
            assert_eq!(result.amount, 0.0);
            assert_eq!(result.failure_reasons, vec![FULL_REPLACEMENT_REASON.to_string()]);
            assert!(result.verdict.contains("fully replace"));
        }
        assert_eq!(summary.total, 0.0);
    }
}
