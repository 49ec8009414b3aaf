//! Postgres repositories. Queries are runtime-bound (no compile-time
//! macros) so the workspace builds without a live database; enum
//! columns are stored as text and parsed on the way out.

pub mod customers;
pub mod devices;
pub mod emergencies;

pub use customers::PostgresCustomerRepository;
pub use devices::PostgresDeviceRepository;
pub use emergencies::PostgresEmergencyRepository;

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

use crate::error::Result;
use crate::model::{
    Customer, CustomerEmergencyInfo, Emergency, EmergencyInput, EmergencyResponse, EmergencyStatus,
    Operator,
};

/// Store seam for the emergency lifecycle. The Postgres repository is
/// the production implementation; tests mock it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmergencyStore: Send + Sync {
    async fn insert(&self, input: &EmergencyInput) -> Result<Emergency>;
    async fn get(&self, id: Uuid) -> Result<Option<Emergency>>;
    async fn append_response(
        &self,
        emergency_id: Uuid,
        operator_id: Option<Uuid>,
        action: &str,
        response_time_seconds: Option<i32>,
        notes: &str,
    ) -> Result<()>;
    async fn list_responses(&self, emergency_id: Uuid) -> Result<Vec<EmergencyResponse>>;
    async fn claim_operator(&self, emergency_id: Uuid) -> Result<Operator>;
    async fn transition_to_terminal(&self, id: Uuid, target: EmergencyStatus) -> Result<Emergency>;
    async fn history(
        &self,
        customer_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Emergency>, i64)>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CustomerStore: Send + Sync {
    async fn get(&self, customer_id: Uuid) -> Result<Option<Customer>>;
    async fn emergency_info(&self, customer_id: Uuid) -> Result<Option<CustomerEmergencyInfo>>;
}

/// Decode a text column into a domain enum, surfacing parse failures
/// as column-decode errors.
pub(crate) fn parse_text_col<T>(row: &PgRow, col: &str) -> std::result::Result<T, sqlx::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.try_get(col)?;
    raw.parse().map_err(|e| sqlx::Error::ColumnDecode {
        index: col.to_string(),
        source: Box::new(e),
    })
}
