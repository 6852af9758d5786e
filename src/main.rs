// src/main.rs
use std::env;

use anyhow::{anyhow, Context};
use dotenvy::dotenv;
use household_budget::database::db::{connection, migrate};
use household_budget::util::{fmt_money, iso, parse_month};
use household_budget::Ledger;

const USAGE: &str = "usage: household-budget <migrate | summary HOUSEHOLD YYYY-MM | auto-assign HOUSEHOLD YYYY-MM>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = connection::DbConfig::from_env();
    let pool = connection::get_db_pool(&config)
        .await
        .with_context(|| format!("connecting to {}", config.database_url))?;
    migrate::run_migrations(&pool).await?;

    let args: Vec<String> = env::args().skip(1).collect();
    let ledger = Ledger::new(pool);

    match args.first().map(String::as_str) {
        Some("migrate") => println!("Migrations ran successfully!"),
        Some("summary") => {
            let (household_id, month) = household_and_month(&args)?;
            let summary = ledger.get_budget_summary(household_id, month).await?;
            println!("Budget for {}", iso(&summary.budget_month.month));
            for e in &summary.envelopes {
                println!(
                    "  {:<14} allocated {:>10}  assigned {:>10}  spent {:>10}  available {:>10}",
                    e.envelope.to_string(),
                    fmt_money(&e.allocated),
                    fmt_money(&e.assigned),
                    fmt_money(&e.spent),
                    fmt_money(&e.available),
                );
            }
            println!("To be assigned: {}", fmt_money(&summary.to_be_assigned.to_be_assigned));
        }
        Some("auto-assign") => {
            let (household_id, month) = household_and_month(&args)?;
            let outcome = ledger.auto_assign_all(household_id, month).await?;
            println!(
                "{:?}: assigned {} of {} needed across {} envelopes",
                outcome.plan.mode,
                fmt_money(&outcome.assignments.total_assigned),
                fmt_money(&outcome.plan.total_need),
                outcome.assignments.allocations.len(),
            );
        }
        _ => return Err(anyhow!(USAGE)),
    }
    Ok(())
}

fn household_and_month(args: &[String]) -> anyhow::Result<(i64, chrono::NaiveDate)> {
    let household_id = args
        .get(1)
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| anyhow!(USAGE))?;
    let month = args
        .get(2)
        .and_then(|s| parse_month(s))
        .ok_or_else(|| anyhow!(USAGE))?;
    Ok((household_id, month))
}
