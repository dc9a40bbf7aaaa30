use thiserror::Error;

use crate::{
    helpers::RedemptionCodeError,
    traits::{GatewayError, PosDatabaseError},
};

#[derive(Debug, Error)]
pub enum OrderFlowError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] PosDatabaseError),
    #[error("An order must contain at least one item")]
    EmptyOrder,
    #[error("Quantity {quantity} for product #{product_id} is not a positive number of units")]
    InvalidQuantity { product_id: i64, quantity: i64 },
    #[error("Redemption code error: {0}")]
    RedemptionCode(#[from] RedemptionCodeError),
}

#[derive(Debug, Error)]
pub enum PaymentFlowError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] PosDatabaseError),
    #[error("Payment gateway error: {0}")]
    GatewayError(#[from] GatewayError),
    #[error("{0} is not a valid mobile money number")]
    InvalidPhoneNumber(String),
    #[error("Payment {0} has no gateway transaction id to verify")]
    MissingTransactionId(i64),
}
