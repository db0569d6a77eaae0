pub mod database;
pub mod error;
pub mod leases;

pub use database::{parse_database, read_database, LeaseDatabase, SkippedBlock};
pub use error::{ErrorKind, LeaseError};
pub use leases::{parse_lease, ParsePolicy};
