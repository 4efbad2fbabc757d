pub mod lead_time;
pub mod models;
