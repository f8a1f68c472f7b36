mod utils;
pub use utils::test_db;

mod auth;
mod autosave;
mod transfer;
