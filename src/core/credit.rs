use super::error::EngineError;
use super::types::{CreditSummary, Financing};

pub fn monthly_payment(principal: f64, annual_rate_percent: f64, months: u32) -> f64 {
    if principal == 0.0 || months == 0 {
        return 0.0;
    }
    let r = annual_rate_percent / 100.0 / 12.0;
    if r == 0.0 {
        return principal / months as f64;
    }
    principal * r / (1.0 - (1.0 + r).powf(-(months as f64)))
}

pub fn total_credit_cost(principal: f64, annual_rate_percent: f64, months: u32) -> f64 {
    monthly_payment(principal, annual_rate_percent, months) * months as f64
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RealInvestment {
    pub amount: f64,
    pub credit: Option<CreditSummary>,
}

pub fn real_investment(net_cost: f64, financing: &Financing) -> Result<RealInvestment, EngineError> {
    if !net_cost.is_finite() || net_cost < 0.0 {
        return Err(invalid(format!("net cost must be >= 0, got {net_cost}")));
    }

    match *financing {
        Financing::Cash => Ok(RealInvestment {
            amount: net_cost,
            credit: None,
        }),
        Financing::Credit {
            annual_rate_percent,
            months,
        } => {
            let credit = credit_summary(net_cost, 0.0, annual_rate_percent, months)?;
            Ok(RealInvestment {
                amount: credit.total_cost,
                credit: Some(credit),
            })
        }
        Financing::Mixed {
            down_payment,
            annual_rate_percent,
            months,
        } => {
            if !down_payment.is_finite() || down_payment < 0.0 {
                return Err(invalid(format!(
                    "down payment must be >= 0, got {down_payment}"
                )));
            }
            if down_payment > net_cost {
                return Err(invalid(format!(
                    "down payment {down_payment} exceeds net cost {net_cost}"
                )));
            }
            let credit =
                credit_summary(net_cost - down_payment, down_payment, annual_rate_percent, months)?;
            Ok(RealInvestment {
                amount: down_payment + credit.total_cost,
                credit: Some(credit),
            })
        }
    }
}

fn credit_summary(
    principal: f64,
    down_payment: f64,
    annual_rate_percent: f64,
    months: u32,
) -> Result<CreditSummary, EngineError> {
    if !annual_rate_percent.is_finite() || annual_rate_percent < 0.0 {
        return Err(invalid(format!(
            "annual rate must be >= 0, got {annual_rate_percent}"
        )));
    }
    if principal > 0.0 && months == 0 {
        return Err(invalid(
            "credit duration must be > 0 months when an amount is financed".to_string(),
        ));
    }

    let monthly = monthly_payment(principal, annual_rate_percent, months);
    let total_cost = monthly * months as f64;
    Ok(CreditSummary {
        principal,
        down_payment,
        annual_rate_percent,
        months,
        monthly_payment: monthly,
        total_cost,
        interest_cost: total_cost - principal,
    })
}

fn invalid(reason: String) -> EngineError {
    EngineError::InvalidFinancingParameters { reason }
}
