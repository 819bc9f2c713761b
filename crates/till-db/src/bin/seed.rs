//! # Seed Data Generator
//!
//! Populates a database with a small, realistic back-office dataset for
//! development.
//!
//! ## Usage
//! ```bash
//! cargo run -p till-db --bin seed
//! cargo run -p till-db --bin seed -- --db ./data/till.db --tenant acme
//! ```
//!
//! ## Generated Data
//! - Two branches with two points of sale each
//! - One closed and one open cash session per point of sale, with sales
//!   across several payment methods
//! - Withdrawals (pending, confirmed, partial) and a deposit
//! - A few treasury movements
//! - Processed card-terminal orders left without a sale

use chrono::{Duration, Utc};
use std::env;
use till_core::commands::{
    CloseSession, ConfirmWithdrawal, OpenSession, RecordMovement, RecordSale,
    RecordTreasuryMovement, SalePayment,
};
use till_core::orphan::{OrphanPaymentOrder, ORDER_STATUS_PROCESSED};
use till_core::session::CashMovementType;
use till_core::treasury::{BalanceAnchor, TreasuryMovementDetails};
use till_core::{Money, PaymentMethod};
use till_db::{Database, DbConfig};
use uuid::Uuid;

const BRANCHES: &[(&str, &[&str])] = &[("Centro", &["C-01", "C-02"]), ("Norte", &["N-01", "N-02"])];

/// (method, cents) tenders rung up on each session.
const SALES: &[(PaymentMethod, i64)] = &[
    (PaymentMethod::Cash, 12_500),
    (PaymentMethod::Debit, 8_990),
    (PaymentMethod::Cash, 4_300),
    (PaymentMethod::MpPoint, 15_000),
    (PaymentMethod::Qr, 2_750),
    (PaymentMethod::Cash, 31_000),
    (PaymentMethod::Credit, 22_400),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./till_dev.db");
    let mut tenant = String::from("demo");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--tenant" | "-t" => {
                if i + 1 < args.len() {
                    tenant = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Till Back Office Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>      Database file path (default: ./till_dev.db)");
                println!("  -t, --tenant <ID>    Tenant to seed (default: demo)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Till Back Office Seed Data Generator");
    println!("=======================================");
    println!("Database: {}", db_path);
    println!("Tenant:   {}", tenant);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let scope = db.tenant(tenant.as_str());
    if !scope.locations().list_branches().await?.is_empty() {
        println!("⚠ Tenant already has branches");
        println!("  Skipping seed to avoid duplicates.");
        return Ok(());
    }

    let start = std::time::Instant::now();
    let mut sessions = 0;
    let mut withdrawals = 0;

    for (branch_name, codes) in BRANCHES {
        let branch = scope.locations().create_branch(branch_name).await?;

        for (pos_idx, code) in codes.iter().enumerate() {
            let pos = scope
                .locations()
                .create_point_of_sale(&branch.id, code, &format!("Caja {}", code))
                .await?;

            for shift in 0..2 {
                let session = scope
                    .cash_sessions()
                    .open(
                        &format!("cashier-{}", pos_idx + 1),
                        OpenSession {
                            point_of_sale_id: pos.id.clone(),
                            cashier_id: None,
                        },
                    )
                    .await?;
                sessions += 1;

                for (method, cents) in SALES.iter().skip(shift) {
                    scope
                        .cash_sessions()
                        .record_sale(
                            &session.id,
                            RecordSale {
                                payments: vec![SalePayment {
                                    method: *method,
                                    amount: Money::from_cents(*cents),
                                }],
                            },
                        )
                        .await?;
                }

                let recorded = scope
                    .cash_movements()
                    .record(
                        &session.id,
                        &session.cashier_id,
                        RecordMovement {
                            movement_type: CashMovementType::Withdrawal,
                            amount: Money::from_cents(20_000),
                            reason: "Drop to safe".to_string(),
                            authorized_by: Some("supervisor".to_string()),
                        },
                    )
                    .await?;
                withdrawals += 1;

                scope
                    .cash_movements()
                    .record(
                        &session.id,
                        &session.cashier_id,
                        RecordMovement {
                            movement_type: CashMovementType::Deposit,
                            amount: Money::from_cents(5_000),
                            reason: "Change float".to_string(),
                            authorized_by: None,
                        },
                    )
                    .await?;

                // First shift is reconciled and closed; second stays open.
                if shift == 0 {
                    if let Some(pending) = recorded.pending_withdrawal {
                        let received = if pos_idx == 0 { 20_000 } else { 19_500 };
                        scope
                            .treasury()
                            .confirm(
                                &pending.id,
                                "treasurer",
                                ConfirmWithdrawal {
                                    received: Money::from_cents(received),
                                    notes: None,
                                },
                            )
                            .await?;
                    }
                    scope
                        .cash_sessions()
                        .close(
                            &session.id,
                            &session.cashier_id,
                            CloseSession {
                                counted: None,
                                verified_by: None,
                                notes: Some("End of shift".to_string()),
                            },
                        )
                        .await?;
                }
            }
        }
        println!("  Seeded branch {}", branch_name);
    }

    let movements = [
        TreasuryMovementDetails::BankDeposit {
            bank_name: "Banco Nación".to_string(),
            account_number: Some("0011-2233".to_string()),
            deposit_slip: None,
        },
        TreasuryMovementDetails::SupplierPayment {
            supplier_name: "Distribuidora Sur".to_string(),
            invoice_number: Some("A-0001-00001234".to_string()),
        },
        TreasuryMovementDetails::Expense {
            category: "cleaning".to_string(),
        },
    ];
    for (idx, details) in movements.into_iter().enumerate() {
        scope
            .treasury_movements()
            .record(
                "treasurer",
                RecordTreasuryMovement {
                    amount: Money::from_cents(10_000 * (idx as i64 + 1)),
                    description: format!("Seeded movement {}", idx + 1),
                    reference: None,
                    details,
                },
                BalanceAnchor::AllTime,
            )
            .await?;
    }

    for (idx, cents) in [25_000_i64, 4_990, 13_250].into_iter().enumerate() {
        scope
            .orphan_orders()
            .register(&OrphanPaymentOrder {
                order_id: format!("MP-{}", Uuid::new_v4().simple()),
                tenant_id: tenant.clone(),
                status: ORDER_STATUS_PROCESSED.to_string(),
                amount_cents: cents,
                payment_id: format!("{}", 90_000_000 + idx),
                card_brand: Some("visa".to_string()),
                card_last_four: Some(format!("{:04}", 4242 + idx)),
                installments: 1,
                processed_at: Utc::now() - Duration::hours(idx as i64 + 1),
                sale_id: None,
            })
            .await?;
    }

    let balance = scope.treasury_movements().balance(BalanceAnchor::AllTime).await?;

    println!();
    println!("✓ Seeded {} sessions and {} withdrawals in {:?}", sessions, withdrawals, start.elapsed());
    println!("  Treasury balance: {}", balance.balance());
    println!("  Orphan orders: 3");
    for pos in scope.locations().list_points_of_sale().await? {
        println!("  Point of sale {} ({})", pos.code, pos.id);
    }
    println!();
    println!("✓ Seed complete!");

    Ok(())
}
