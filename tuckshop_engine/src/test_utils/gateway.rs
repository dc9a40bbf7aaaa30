//! A scriptable in-memory stand-in for the mobile money gateway.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use crate::{
    db_types::SettlementStatus,
    traits::{ChargeRequest, GatewayError, MobileMoneyGateway},
};

/// Test double for [`MobileMoneyGateway`].
///
/// By default every charge is accepted and verifies as `Completed`. Tests can script the next initiation to be
/// declined, or pin the verdict for a specific transaction, to drive the failure and still-pending paths.
#[derive(Clone, Default)]
pub struct TestGateway {
    state: Arc<Mutex<GatewayState>>,
}

#[derive(Default)]
struct GatewayState {
    charges: Vec<ChargeRequest>,
    verdicts: HashMap<String, SettlementStatus>,
    decline_next: Option<String>,
    counter: u64,
}

impl TestGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next call to [`MobileMoneyGateway::initiate`] will be declined with the given reason.
    pub fn decline_next<S: Into<String>>(&self, reason: S) {
        self.lock().decline_next = Some(reason.into());
    }

    /// Pins the verdict that [`MobileMoneyGateway::verify`] reports for `txid`.
    pub fn set_verdict(&self, txid: &str, verdict: SettlementStatus) {
        self.lock().verdicts.insert(txid.to_string(), verdict);
    }

    /// Every charge accepted so far, in order.
    pub fn charges(&self) -> Vec<ChargeRequest> {
        self.lock().charges.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, GatewayState> {
        self.state.lock().expect("test gateway mutex poisoned")
    }
}

impl MobileMoneyGateway for TestGateway {
    async fn initiate(&self, request: ChargeRequest) -> Result<String, GatewayError> {
        let mut state = self.lock();
        if let Some(reason) = state.decline_next.take() {
            return Err(GatewayError::Declined(reason));
        }
        state.counter += 1;
        let txid = format!("TEST-TX-{}", state.counter);
        state.charges.push(request);
        state.verdicts.insert(txid.clone(), SettlementStatus::Completed);
        Ok(txid)
    }

    async fn verify(&self, txid: &str) -> Result<SettlementStatus, GatewayError> {
        let state = self.lock();
        state.verdicts.get(txid).copied().ok_or_else(|| GatewayError::UnknownTransaction(txid.to_string()))
    }
}
