use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::CustomerStore;
use crate::error::Result;
use crate::model::{Customer, CustomerEmergencyInfo};

#[derive(Clone, Debug)]
pub struct PostgresCustomerRepository {
    pool: PgPool,
}

impl PostgresCustomerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CustomerStore for PostgresCustomerRepository {
    async fn get(&self, customer_id: Uuid) -> Result<Option<Customer>> {
        let row = sqlx::query(
            "SELECT id, name, phone, subscription_status FROM customers WHERE id = $1",
        )
        .bind(customer_id)
        .try_map(|row: PgRow| map_customer(&row))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// The customer details an operator needs during an emergency.
    async fn emergency_info(
        &self,
        customer_id: Uuid,
    ) -> Result<Option<CustomerEmergencyInfo>> {
        let row = sqlx::query(
            "SELECT name, phone, address, emergency_contacts, medical_alerts \
             FROM customers WHERE id = $1",
        )
        .bind(customer_id)
        .try_map(|row: PgRow| {
            Ok(CustomerEmergencyInfo {
                name: row.try_get("name")?,
                phone: row.try_get("phone")?,
                address: row.try_get("address")?,
                emergency_contacts: row.try_get("emergency_contacts")?,
                medical_alerts: row.try_get("medical_alerts")?,
            })
        })
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}

fn map_customer(row: &PgRow) -> std::result::Result<Customer, sqlx::Error> {
    Ok(Customer {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        phone: row.try_get("phone")?,
        subscription_status: row.try_get("subscription_status")?,
    })
}
