pub mod bar;
pub mod performance;
pub mod period;
pub mod symbol;
