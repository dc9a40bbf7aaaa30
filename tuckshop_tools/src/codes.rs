use chrono::Utc;
use clap::Subcommand;
use tuckshop_engine::{db_types::PaymentMethod, helpers::RedemptionCodes, PosConfig};

use crate::formatting::qr_code_string;

#[derive(Debug, Subcommand)]
pub enum CodesCommand {
    /// Issue a fresh pickup code for an order, e.g. to replace one a customer lost
    Issue {
        #[arg(required = true, index = 1)]
        order_id: i64,
        /// The order's payment method (`cash` or `mobile`), which sets the validity window
        #[arg(short, long, default_value = "cash")]
        method: PaymentMethod,
    },
    /// Check a presented payload against the signing secret and the clock
    Verify {
        #[arg(required = true, index = 1)]
        payload: String,
    },
}

pub fn handle_codes_command(command: CodesCommand) {
    let codes = RedemptionCodes::from_config(&PosConfig::from_env_or_default());
    match command {
        CodesCommand::Issue { order_id, method } => issue_code(&codes, order_id, method),
        CodesCommand::Verify { payload } => verify_code(&codes, &payload),
    }
}

fn issue_code(codes: &RedemptionCodes, order_id: i64, method: PaymentMethod) {
    let code = codes.issue(order_id, method, Utc::now());
    let payload = code.as_json();
    println!("Pickup code for order #{order_id} ({method}), valid until {}:", code.expires_at());
    println!("{payload}");
    println!("{}", qr_code_string(&payload));
}

fn verify_code(codes: &RedemptionCodes, payload: &str) {
    match codes.verify(payload, Utc::now()) {
        Ok(claims) => {
            println!("The code is genuine.");
            println!("Order: #{}", claims.order_id);
            println!("Method: {}", claims.payment_method);
            println!("Valid until: {}", claims.expires_at);
        },
        Err(e) => println!("The code was rejected: {e}"),
    }
}
