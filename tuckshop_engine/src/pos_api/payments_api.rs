use std::fmt::Debug;

use log::*;
use tuckshop_common::Cents;

use crate::{
    db_types::{Payment, PaymentMethod, PaymentStatus, Product},
    events::{EventProducers, LowStockEvent, PaymentResolvedEvent},
    helpers::is_valid_mobile_number,
    pos_api::errors::PaymentFlowError,
    traits::{ChargeRequest, MobileMoneyGateway, PosDatabase, PosDatabaseError, SettledPayment},
};

/// `PaymentsApi` settles payments against existing orders.
///
/// Mobile-money settlement is two-phase: [`Self::initiate_mobile_payment`] charges the customer's phone through the
/// gateway and records a pending payment, and [`Self::verify_mobile_payment`] asks the gateway for the outcome and
/// applies it. Cash settlement is single-phase, recorded when the money changes hands at the counter.
pub struct PaymentsApi<B, G> {
    db: B,
    gateway: G,
    low_stock_threshold: i64,
    producers: EventProducers,
}

impl<B, G> Debug for PaymentsApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentsApi")
    }
}

impl<B, G> PaymentsApi<B, G> {
    pub fn new(db: B, gateway: G, low_stock_threshold: i64, producers: EventProducers) -> Self {
        Self { db, gateway, low_stock_threshold, producers }
    }
}

impl<B, G> PaymentsApi<B, G>
where
    B: PosDatabase,
    G: MobileMoneyGateway,
{
    /// Push a mobile-money charge for the order to the customer's phone.
    ///
    /// The order is checked first so that a closed, settled or cash order never reaches the gateway. The gateway call
    /// itself happens outside any database transaction. Its transaction id is then recorded as a pending payment,
    /// to be resolved later by [`Self::verify_mobile_payment`].
    pub async fn initiate_mobile_payment(&self, order_id: i64, phone: &str) -> Result<Payment, PaymentFlowError> {
        if !is_valid_mobile_number(phone) {
            return Err(PaymentFlowError::InvalidPhoneNumber(phone.to_string()));
        }
        let order =
            self.db.fetch_order(order_id).await?.ok_or(PosDatabaseError::OrderNotFound(order_id))?;
        if order.payment_method != PaymentMethod::MobileMoney {
            return Err(PosDatabaseError::WrongPaymentMethod {
                order_id,
                actual: order.payment_method,
                attempted: PaymentMethod::MobileMoney,
            }
            .into());
        }
        if order.status.is_terminal() {
            return Err(PosDatabaseError::OrderClosed { order_id, status: order.status }.into());
        }
        if order.payment_status != PaymentStatus::Pending {
            return Err(PosDatabaseError::AlreadyProcessed(order_id).into());
        }
        let request = ChargeRequest::new(order.total_amount, phone.to_string(), format!("TUCK_{order_id}"));
        let txid = self.gateway.initiate(request).await?;
        trace!("🔄️💰️ Gateway accepted charge [{txid}] for order #{order_id}");
        let payment = self.db.insert_mobile_payment(order_id, txid, phone.to_string()).await?;
        debug!(
            "🔄️💰️ Mobile payment #{} of {} for order #{order_id} is awaiting the gateway",
            payment.id, payment.amount
        );
        Ok(payment)
    }

    /// Ask the gateway for the outcome of a pending mobile-money payment, and apply it.
    ///
    /// Returns `None` while the gateway still reports the charge as pending. Once a verdict comes back, the payment,
    /// the order and (on success) the stock reservations are settled together, and the result of that settlement is
    /// returned. Verifying an already-resolved payment is an error, not a retry.
    pub async fn verify_mobile_payment(&self, payment_id: i64) -> Result<Option<SettledPayment>, PaymentFlowError> {
        let payment =
            self.db.fetch_payment(payment_id).await?.ok_or(PosDatabaseError::PaymentNotFound(payment_id))?;
        let txid = payment.txid.as_deref().ok_or(PaymentFlowError::MissingTransactionId(payment_id))?;
        let verdict = self.gateway.verify(txid).await?;
        trace!("🔄️💰️ Gateway reports [{txid}] as {verdict}");
        let settled = self.db.settle_mobile_payment(payment_id, verdict).await?;
        match &settled {
            Some(settlement) => {
                debug!("🔄️💰️ {settlement}");
                self.call_payment_resolved_hook(settlement).await;
                self.call_low_stock_hook(&settlement.stock_after).await;
            },
            None => debug!("🔄️💰️ Payment #{payment_id} is still pending at the gateway"),
        }
        Ok(settled)
    }

    /// Record cash handed over at the counter for the order.
    ///
    /// `tendered` must cover the order total. Settlement of the payment, the order and the stock reservations is
    /// atomic, and the recorded payment notes the tendered amount and the change due.
    pub async fn process_cash_payment(
        &self,
        order_id: i64,
        tendered: Cents,
    ) -> Result<SettledPayment, PaymentFlowError> {
        let settled = self.db.process_cash_payment(order_id, tendered).await?;
        let change = tendered - settled.order.total_amount;
        debug!("🔄️💵️ Order #{order_id} paid in cash. {tendered} tendered, {change} change");
        self.call_payment_resolved_hook(&settled).await;
        self.call_low_stock_hook(&settled.stock_after).await;
        Ok(settled)
    }

    async fn call_payment_resolved_hook(&self, settled: &SettledPayment) {
        for emitter in &self.producers.payment_resolved_producer {
            debug!("🔄️💰️ Notifying payment resolved hook subscribers");
            let event = PaymentResolvedEvent::new(settled.order.clone(), settled.payment.clone());
            emitter.publish_event(event).await;
        }
    }

    async fn call_low_stock_hook(&self, stock_after: &[Product]) {
        for emitter in &self.producers.low_stock_producer {
            for product in stock_after.iter().filter(|p| p.is_low_stock(self.low_stock_threshold)) {
                debug!("🔄️📉️ Product #{} is low on stock ({} left)", product.id, product.stock_quantity);
                let event = LowStockEvent::new(product.clone(), self.low_stock_threshold);
                emitter.publish_event(event).await;
            }
        }
    }
}
