pub mod roster;

pub use roster::{PlayerRecord, fetch_roster};
