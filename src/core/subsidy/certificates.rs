use serde::Serialize;

use super::{
    FULL_REPLACEMENT_REASON, Household, SubsidyEligibilityResult, SubsidyRequest, SubsidyTables,
    dwelling_age,
};
use crate::core::error::EngineError;

const MIN_DWELLING_AGE: i32 = 2;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CertificateTier {
    VeryPrecarious,
    Precarious,
    Classic,
}

impl CertificateTier {
    const ALL: [CertificateTier; 3] = [
        CertificateTier::VeryPrecarious,
        CertificateTier::Precarious,
        CertificateTier::Classic,
    ];

    pub fn classify(household: &Household, tables: &SubsidyTables) -> Self {
        Self::ALL[tables.thresholds.classify(household, 2)]
    }

    pub fn label(self) -> &'static str {
        match self {
            CertificateTier::VeryPrecarious => "Grand précaire",
            CertificateTier::Precarious => "Précaire",
            CertificateTier::Classic => "Classique",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

pub fn evaluate_certificate_subsidy(
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

    let household = Household::from_request(request)?;
    let tier = CertificateTier::classify(&household, tables);
    let amount = tables.certificate_amounts[tier.index()].for_pump(request.pump_type);
    if amount <= 0.0 {
        return Ok(SubsidyEligibilityResult::rejected_in_tier(
            tier.label(),
            &household,
            format!(
                "No certificate bonus for a {} heat pump in the {} category",
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
    use crate::core::types::PumpType;

    #[test]
    fn income_above_modest_ceiling_is_classic() {
        let result = evaluate_certificate_subsidy(&sample_request(), &TABLES_2024, 2025)
            .expect("complete request");
        assert!(result.eligible);
        assert_eq!(result.category.as_deref(), Some("Classique"));
        assert_eq!(result.amount, 4_000.0);
    }

    #[test]
    fn precarious_households_get_air_air_bonus() {
        let mut request = sample_request();
        request.pump_type = PumpType::AirAir;

        request.reference_income = Some(20_000.0);
        let result = evaluate_certificate_subsidy(&request, &TABLES_2024, 2025).expect("valid");
        assert_eq!(result.category.as_deref(), Some("Grand précaire"));
        assert_eq!(result.amount, 900.0);

        request.reference_income = Some(30_000.0);
        let result = evaluate_certificate_subsidy(&request, &TABLES_2024, 2025).expect("valid");
        assert_eq!(result.category.as_deref(), Some("Précaire"));
        assert_eq!(result.amount, 700.0);
    }

    #[test]
    fn classic_household_gets_nothing_for_air_air() {
        let mut request = sample_request();
        request.pump_type = PumpType::AirAir;
        let result = evaluate_certificate_subsidy(&request, &TABLES_2024, 2025).expect("valid");
        assert!(!result.eligible);
        assert_eq!(result.category.as_deref(), Some("Classique"));
        assert_eq!(result.amount, 0.0);
    }

    #[test]
    fn dwelling_younger_than_two_years_is_rejected() {
        let mut request = sample_request();
        request.construction_year = Some(2024);
        let result = evaluate_certificate_subsidy(&request, &TABLES_2024, 2025).expect("valid");
        assert!(!result.eligible);
        assert!(result.failure_reasons[0].contains("2 years"));
    }

    #[test]
    fn secondary_residence_is_accepted() {
        let mut request = sample_request();
        request.primary_residence = false;
        request.construction_year = Some(2020);
        let result = evaluate_certificate_subsidy(&request, &TABLES_2024, 2025).expect("valid");
        assert!(result.eligible);
    }

    #[test]
    fn partial_replacement_is_rejected_with_replacement_reason() {
        let mut request = sample_request();
        request.full_replacement = false;
        let result = evaluate_certificate_subsidy(&request, &TABLES_2024, 2025).expect("valid");
        assert!(!result.eligible);
        assert!(result.failure_reasons[0].contains("replace"));
    }
}
