pub mod amount;
pub mod constants;
