use std::str::FromStr;

use sqlx::{sqlite::SqliteRow, Row};

use fixquote_core::domain::price::PriceRange;
use fixquote_core::domain::request::{RequestId, RequestSource, ServiceRequest};
use fixquote_core::domain::user::UserId;

use super::{format_timestamp, parse_timestamp, RepositoryError, RequestRepository};
use crate::DbPool;

pub struct SqlRequestRepository {
    pool: DbPool,
}

impl SqlRequestRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl RequestRepository for SqlRequestRepository {
    async fn find_by_id(&self, id: &RequestId) -> Result<Option<ServiceRequest>, RepositoryError> {
        let row = sqlx::query(
            "SELECT
                id,
                user_id,
                issue,
                description,
                address,
                times_available,
                desired_price_range,
                source,
                source_text,
                image_url,
                created_at
             FROM requests
             WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(request_from_row).transpose()
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<ServiceRequest>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT
                id,
                user_id,
                issue,
                description,
                address,
                times_available,
                desired_price_range,
                source,
                source_text,
                image_url,
                created_at
             FROM requests
             WHERE user_id = ?
             ORDER BY created_at DESC",
        )
        .bind(&user_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(request_from_row).collect()
    }

    async fn insert(&self, request: ServiceRequest) -> Result<(), RepositoryError> {
        let times_available = serde_json::to_string(&request.times_available)
            .map_err(|error| RepositoryError::Decode(format!("times_available: {error}")))?;

        sqlx::query(
            "INSERT INTO requests (
                id,
                user_id,
                issue,
                description,
                address,
                times_available,
                desired_price_range,
                source,
                source_text,
                image_url,
                created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&request.id.0)
        .bind(&request.user_id.0)
        .bind(&request.issue)
        .bind(&request.description)
        .bind(&request.address)
        .bind(times_available)
        .bind(request.desired_price_range.map(|range| range.to_string()))
        .bind(request.source.as_str())
        .bind(request.source_text.as_deref())
        .bind(request.image_url.as_deref())
        .bind(format_timestamp(request.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn request_from_row(row: SqliteRow) -> Result<ServiceRequest, RepositoryError> {
    let source_raw = row.try_get::<String, _>("source")?;
    let source = RequestSource::parse(&source_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown request source `{source_raw}`")))?;

    let times_raw = row.try_get::<String, _>("times_available")?;
    let times_available = serde_json::from_str::<Vec<String>>(&times_raw).map_err(|error| {
        RepositoryError::Decode(format!("invalid times_available `{times_raw}` ({error})"))
    })?;

    let desired_price_range = row
        .try_get::<Option<String>, _>("desired_price_range")?
        .map(|value| {
            PriceRange::from_str(&value).map_err(|error| {
                RepositoryError::Decode(format!("invalid desired_price_range `{value}` ({error})"))
            })
        })
        .transpose()?;

    Ok(ServiceRequest {
        id: RequestId(row.try_get("id")?),
        user_id: UserId(row.try_get("user_id")?),
        issue: row.try_get("issue")?,
        description: row.try_get("description")?,
        address: row.try_get("address")?,
        times_available,
        desired_price_range,
        source,
        source_text: row.try_get("source_text")?,
        image_url: row.try_get("image_url")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}
