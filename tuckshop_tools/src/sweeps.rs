use anyhow::Result;
use clap::Subcommand;
use tuckshop_engine::{
    events::EventProducers,
    sweepers::{run_expiry_sweep, run_reconciliation_sweep},
    PosConfig,
    SqliteDatabase,
};

#[derive(Debug, Subcommand)]
pub enum SweepCommand {
    /// Cancel every cash order whose redemption window has lapsed unpaid
    Expiry,
    /// Clamp negative counters, purge stale reservations and audit the counters against the ledger
    Reconcile,
}

pub async fn handle_sweep_command(command: SweepCommand) {
    match command {
        SweepCommand::Expiry => sweep_expiry().await,
        SweepCommand::Reconcile => sweep_reconcile().await,
    }
}

async fn sweep_expiry() {
    async fn run() -> Result<usize> {
        let db = SqliteDatabase::new(1).await?;
        let swept = run_expiry_sweep(&db, &EventProducers::default()).await?;
        Ok(swept)
    }
    match run().await {
        Ok(0) => println!("No orders had lapsed."),
        Ok(n) => println!("Cancelled {n} lapsed order(s)."),
        Err(e) => eprintln!("Error running the expiry sweep: {e}"),
    }
}

async fn sweep_reconcile() {
    async fn run() -> Result<String> {
        let config = PosConfig::from_env_or_default();
        let db = SqliteDatabase::new(1).await?;
        let report = run_reconciliation_sweep(&db, config.reservation_retention).await;
        let mut out = report.to_string();
        for mismatch in &report.mismatches {
            out.push('\n');
            out.push_str(&mismatch.to_string());
        }
        Ok(out)
    }
    match run().await {
        Ok(report) => println!("{report}"),
        Err(e) => eprintln!("Error running the reconciliation sweep: {e}"),
    }
}
