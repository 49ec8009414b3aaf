use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::Result;
use crate::model::Device;

#[derive(Clone, Debug)]
pub struct PostgresDeviceRepository {
    pool: PgPool,
}

impl PostgresDeviceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        customer_id: Uuid,
        kind: &str,
        location: Option<&str>,
        battery_level: Option<i32>,
    ) -> Result<Device> {
        let row = sqlx::query(
            r#"
            INSERT INTO devices (id, customer_id, type, location, status, battery_level)
            VALUES ($1, $2, $3, $4, 'online', COALESCE($5, 100))
            RETURNING id, customer_id, type, location, status, battery_level, last_heartbeat, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(customer_id)
        .bind(kind)
        .bind(location)
        .bind(battery_level)
        .try_map(|row: PgRow| map_device(&row))
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    /// Remove a device, returning the deleted row or None when it is
    /// not owned by the customer.
    pub async fn delete_owned(&self, device_id: Uuid, customer_id: Uuid) -> Result<Option<Device>> {
        let row = sqlx::query(
            "DELETE FROM devices WHERE id = $1 AND customer_id = $2 \
             RETURNING id, customer_id, type, location, status, battery_level, last_heartbeat, created_at",
        )
        .bind(device_id)
        .bind(customer_id)
        .try_map(|row: PgRow| map_device(&row))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn update_battery(
        &self,
        device_id: Uuid,
        customer_id: Uuid,
        battery_level: i32,
    ) -> Result<Option<Device>> {
        let row = sqlx::query(
            "UPDATE devices SET battery_level = $3, updated_at = NOW() \
             WHERE id = $1 AND customer_id = $2 \
             RETURNING id, customer_id, type, location, status, battery_level, last_heartbeat, created_at",
        )
        .bind(device_id)
        .bind(customer_id)
        .bind(battery_level)
        .try_map(|row: PgRow| map_device(&row))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn update_location(
        &self,
        device_id: Uuid,
        customer_id: Uuid,
        location: &str,
    ) -> Result<Option<Device>> {
        let row = sqlx::query(
            "UPDATE devices SET location = $3, updated_at = NOW() \
             WHERE id = $1 AND customer_id = $2 \
             RETURNING id, customer_id, type, location, status, battery_level, last_heartbeat, created_at",
        )
        .bind(device_id)
        .bind(customer_id)
        .bind(location)
        .try_map(|row: PgRow| map_device(&row))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Fetch a device only when it belongs to the given customer.
    /// Every device operation is scoped through this check.
    pub async fn get_owned(&self, device_id: Uuid, customer_id: Uuid) -> Result<Option<Device>> {
        let row = sqlx::query(
            "SELECT id, customer_id, type, location, status, battery_level, last_heartbeat, created_at \
             FROM devices WHERE id = $1 AND customer_id = $2",
        )
        .bind(device_id)
        .bind(customer_id)
        .try_map(|row: PgRow| map_device(&row))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn list_for_customer(&self, customer_id: Uuid) -> Result<Vec<Device>> {
        let rows = sqlx::query(
            "SELECT id, customer_id, type, location, status, battery_level, last_heartbeat, created_at \
             FROM devices WHERE customer_id = $1 ORDER BY created_at DESC",
        )
        .bind(customer_id)
        .try_map(|row: PgRow| map_device(&row))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Stamp the device's last_heartbeat without touching status or
    /// battery; used when a sensor trip proves the device is alive.
    pub async fn touch_heartbeat(&self, device_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE devices SET last_heartbeat = NOW() WHERE id = $1")
            .bind(device_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Record an explicit heartbeat, returning the updated device or
    /// None when it is not owned by the customer. A heartbeat without
    /// an explicit status resets the device to online; the heartbeat
    /// itself is proof of life.
    pub async fn record_heartbeat(
        &self,
        device_id: Uuid,
        customer_id: Uuid,
        status: Option<&str>,
        battery_level: Option<i32>,
    ) -> Result<Option<Device>> {
        let row = sqlx::query(
            r#"
            UPDATE devices
            SET status = COALESCE($3, 'online'),
                battery_level = COALESCE($4, battery_level),
                last_heartbeat = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND customer_id = $2
            RETURNING id, customer_id, type, location, status, battery_level, last_heartbeat, created_at
            "#,
        )
        .bind(device_id)
        .bind(customer_id)
        .bind(status)
        .bind(battery_level)
        .try_map(|row: PgRow| map_device(&row))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}

fn map_device(row: &PgRow) -> std::result::Result<Device, sqlx::Error> {
    Ok(Device {
        id: row.try_get("id")?,
        customer_id: row.try_get("customer_id")?,
        kind: row.try_get("type")?,
        location: row.try_get("location")?,
        status: row.try_get("status")?,
        battery_level: row.try_get("battery_level")?,
        last_heartbeat: row.try_get("last_heartbeat")?,
        created_at: row.try_get("created_at")?,
    })
}
