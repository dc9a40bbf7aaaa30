use thiserror::Error;
use tuckshop_common::Cents;

use crate::db_types::SettlementStatus;

/// The engine's view of the external mobile-money provider.
///
/// Implementations talk to the real provider's API. Gateway calls happen *outside* database transactions: a charge
/// is initiated first, and only on success is the pending payment row written. The provider settles asynchronously,
/// so the verdict arrives through a later [`verify`](Self::verify) poll.
#[allow(async_fn_in_trait)]
pub trait MobileMoneyGateway {
    /// Asks the provider to charge the customer's phone. Returns the provider's transaction id, which the caller
    /// stores and later passes to [`verify`](Self::verify).
    async fn initiate(&self, request: ChargeRequest) -> Result<String, GatewayError>;

    /// Polls the provider for the settlement verdict on a previously initiated charge. `Pending` means the provider
    /// has not decided yet; poll again later.
    async fn verify(&self, txid: &str) -> Result<SettlementStatus, GatewayError>;
}

#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub amount: Cents,
    /// The customer's mobile number, already validated against the local numbering plan.
    pub phone: String,
    /// A merchant reference the provider echoes back on statements.
    pub reference: String,
}

impl ChargeRequest {
    pub fn new(amount: Cents, phone: String, reference: String) -> Self {
        Self { amount, phone, reference }
    }
}

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("The provider declined the charge: {0}")]
    Declined(String),
    #[error("The provider could not be reached: {0}")]
    Unreachable(String),
    #[error("The provider does not recognise transaction {0}")]
    UnknownTransaction(String),
}
