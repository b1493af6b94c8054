use super::types::Commodity;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("insufficient price history for {commodity}: {available} months, need {required}")]
    InsufficientHistory {
        commodity: Commodity,
        available: usize,
        required: usize,
    },

    #[error("no evolution model supplied for {commodity}")]
    MissingEnergyModel { commodity: Commodity },

    #[error("invalid financing parameters: {reason}")]
    InvalidFinancingParameters { reason: String },

    #[error("subsidy input incomplete: missing or invalid {field}")]
    SubsidyInputIncomplete { field: &'static str },
}
