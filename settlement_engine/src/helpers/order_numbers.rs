use chrono::Utc;
use rand::Rng;

use crate::db_types::{OrderNo, TransactionType};

/// Generates a new system order number, e.g. `PO20240614093015482913`.
///
/// The prefix tells pay-ins and payouts apart at a glance. Uniqueness is ultimately enforced by the database.
pub fn new_order_no(kind: TransactionType) -> OrderNo {
    let prefix = match kind {
        TransactionType::Payin => "PI",
        TransactionType::Payout => "PO",
    };
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000);
    OrderNo(format!("{prefix}{}{suffix:06}", Utc::now().format("%Y%m%d%H%M%S%3f")))
}
