mod fees;
mod order_numbers;

pub use fees::compute_fee;
pub use order_numbers::new_order_no;
