use serde::Serialize;

use super::{
    FULL_REPLACEMENT_REASON, Household, SubsidyEligibilityResult, SubsidyRequest, SubsidyTables,
    dwelling_age,
};
use crate::core::error::EngineError;
use crate::core::types::PumpType;

const MIN_DWELLING_AGE: i32 = 15;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RenovationTier {
    VeryModest,
    Modest,
    Intermediate,
    Higher,
}

impl RenovationTier {
    const ALL: [RenovationTier; 4] = [
        RenovationTier::VeryModest,
        RenovationTier::Modest,
        RenovationTier::Intermediate,
        RenovationTier::Higher,
    ];

    pub fn classify(household: &Household, tables: &SubsidyTables) -> Self {
        Self::ALL[tables.thresholds.classify(household, 3)]
    }

    pub fn label(self) -> &'static str {
        match self {
            RenovationTier::VeryModest => "Bleu",
            RenovationTier::Modest => "Jaune",
            RenovationTier::Intermediate => "Violet",
            RenovationTier::Higher => "Rose",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

pub fn evaluate_renovation_subsidy(
    request: &SubsidyRequest,
    tables: &SubsidyTables,
    current_year: i32,
) -> Result<SubsidyEligibilityResult, EngineError> {
    if !request.full_replacement {
        return Ok(SubsidyEligibilityResult::rejected(FULL_REPLACEMENT_REASON));
    }
    let age = dwelling_age(request, current_year)?;
    if age < MIN_DWELLING_AGE {
        return Ok(SubsidyEligibilityResult::rejected(format!(
            "The dwelling must be at least {MIN_DWELLING_AGE} years old (currently {age})"
        )));
    }
    if !request.primary_residence {
        return Ok(SubsidyEligibilityResult::rejected(
            "The dwelling must be the household's primary residence",
        ));
    }
    if request.pump_type == PumpType::AirAir {
        return Ok(SubsidyEligibilityResult::rejected(
            "Air/air heat pumps are excluded from the national renovation subsidy",
        ));
    }

    let household = Household::from_request(request)?;
    let tier = RenovationTier::classify(&household, tables);
    if tier == RenovationTier::Higher {
        return Ok(SubsidyEligibilityResult::rejected_in_tier(
            tier.label(),
            &household,
            "Households above the intermediate income ceiling are not eligible for heat pumps",
        ));
    }

    let amount = tables.renovation_amounts[tier.index()].for_pump(request.pump_type);
    if amount <= 0.0 {
        return Ok(SubsidyEligibilityResult::rejected_in_tier(
            tier.label(),
            &household,
            format!(
                "No amount is granted for a {} heat pump in the {} category",
                request.pump_type.label(),
                tier.label()
            ),
        ));
    }

    Ok(SubsidyEligibilityResult::granted(
        tier.label(),
        &household,
        amount,
        request.pump_type,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::subsidy::TABLES_2024;
    use crate::core::subsidy::tests::sample_request;

    #[test]
    fn modest_province_household_gets_tabulated_air_water_amount() {
        let result = evaluate_renovation_subsidy(&sample_request(), &TABLES_2024, 2025)
            .expect("complete request");

        // 35 000 € for two persons outside Île-de-France: above 31 889, below 44 907.
        assert!(result.eligible);
        assert_eq!(result.category.as_deref(), Some("Violet"));
        assert_eq!(result.amount, 3_000.0);
        assert_eq!(
            result.details,
            vec![
                "Zone: rest of France".to_string(),
                "Household: 2 person(s)".to_string(),
                "Reference income: 35000 €".to_string(),
            ]
        );
        assert!(result.failure_reasons.is_empty());
    }

    #[test]
    fn geothermal_amount_depends_on_tier() {
        let mut request = sample_request();
        request.pump_type = PumpType::WaterWater;
        request.reference_income = Some(20_000.0);
        let result = evaluate_renovation_subsidy(&request, &TABLES_2024, 2025).expect("valid");
        assert_eq!(result.category.as_deref(), Some("Bleu"));
        assert_eq!(result.amount, 11_000.0);
    }

    #[test]
    fn ile_de_france_uses_its_own_table() {
        let mut request = sample_request();
        request.postal_code = Some("75011".to_string());
        let result = evaluate_renovation_subsidy(&request, &TABLES_2024, 2025).expect("valid");
        // 35 000 € for two persons in Île-de-France: above 34 551, below 42 058.
        assert_eq!(result.category.as_deref(), Some("Jaune"));
        assert_eq!(result.amount, 4_000.0);
    }

    #[test]
    fn partial_replacement_is_rejected_first() {
        let mut request = sample_request();
        request.full_replacement = false;
        request.reference_income = None;
        let result = evaluate_renovation_subsidy(&request, &TABLES_2024, 2025)
            .expect("no income needed to reject");
        assert!(!result.eligible);
        assert!(result.failure_reasons[0].contains("replace"));
    }

    #[test]
    fn recent_dwelling_is_rejected() {
        let mut request = sample_request();
        request.construction_year = Some(2015);
        let result = evaluate_renovation_subsidy(&request, &TABLES_2024, 2025).expect("valid");
        assert!(!result.eligible);
        assert!(result.failure_reasons[0].contains("15 years"));

        request.construction_year = Some(2010);
        let result = evaluate_renovation_subsidy(&request, &TABLES_2024, 2025).expect("valid");
        assert!(result.eligible);
    }

    #[test]
    fn secondary_residence_is_rejected() {
        let mut request = sample_request();
        request.primary_residence = false;
        let result = evaluate_renovation_subsidy(&request, &TABLES_2024, 2025).expect("valid");
        assert!(!result.eligible);
        assert!(result.failure_reasons[0].contains("primary residence"));
    }

    #[test]
    fn air_air_pump_is_excluded_regardless_of_income() {
        let mut request = sample_request();
        request.pump_type = PumpType::AirAir;
        request.reference_income = Some(5_000.0);
        let result = evaluate_renovation_subsidy(&request, &TABLES_2024, 2025).expect("valid");
        assert!(!result.eligible);
        assert_eq!(result.category, None);
        assert!(result.failure_reasons[0].contains("Air/air"));
    }

    #[test]
    fn highest_income_tier_is_rejected() {
        let mut request = sample_request();
        request.reference_income = Some(80_000.0);
        let result = evaluate_renovation_subsidy(&request, &TABLES_2024, 2025).expect("valid");
        assert!(!result.eligible);
        assert_eq!(result.category.as_deref(), Some("Rose"));
        assert_eq!(result.amount, 0.0);
        assert_eq!(result.details.len(), 3);
    }

    #[test]
    fn zero_table_entry_means_ineligible() {
        let mut tables = TABLES_2024;
        tables.renovation_amounts[2].air_water = 0.0;
        let result = evaluate_renovation_subsidy(&sample_request(), &tables, 2025).expect("valid");
        assert!(!result.eligible);
        assert_eq!(result.category.as_deref(), Some("Violet"));
    }

    #[test]
    fn missing_construction_year_is_incomplete() {
        let mut request = sample_request();
        request.construction_year = None;
        let err = evaluate_renovation_subsidy(&request, &TABLES_2024, 2025)
            .expect_err("construction year needed");
        assert_eq!(
            err,
            EngineError::SubsidyInputIncomplete {
                field: "construction year"
            }
        );
    }

    #[test]
    fn missing_income_is_incomplete_once_conditions_hold() {
        let mut request = sample_request();
        request.reference_income = None;
        let err = evaluate_renovation_subsidy(&request, &TABLES_2024, 2025)
            .expect_err("income needed");
        assert!(matches!(err, EngineError::SubsidyInputIncomplete { .. }));
    }
}
