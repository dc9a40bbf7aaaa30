mod phones;
mod redemption_codes;

pub use phones::is_valid_mobile_number;
pub use redemption_codes::{RedemptionClaims, RedemptionCodeError, RedemptionCodes, SignedRedemptionCode};
