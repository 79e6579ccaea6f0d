pub mod cache;
pub mod serving;
