pub mod connection;
pub mod error;
pub mod identifier;
pub mod job_repository;
pub mod migrations;
pub mod models;
pub mod result_repository;
pub mod table;

pub use error::StoreError;
pub use identifier::SqlIdent;
pub use job_repository::JobRepository;
pub use models::{FieldValue, Fields, JobRow, JobStatus, ResultRow};
pub use result_repository::ResultRepository;
pub use table::Table;
