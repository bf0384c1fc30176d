use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, Row};

use fixquote_core::calls::CallStatus;
use fixquote_core::domain::provider::{ProviderId, ProviderSnapshot};
use fixquote_core::domain::quote::{CallId, CallTracking, Quote, QuoteDecision, QuoteId};
use fixquote_core::domain::request::RequestId;

use super::{format_timestamp, parse_timestamp, ExpectedCallState, QuoteRepository, RepositoryError};
use crate::DbPool;

const QUOTE_COLUMNS: &str = "
    id,
    request_id,
    provider_id,
    provider_name,
    provider_company,
    provider_phone,
    provider_rating,
    quote_price,
    estimated_price,
    available_time,
    duration,
    included_in_quote,
    call_id,
    call_status,
    call_summary,
    user_sentiment,
    call_successful,
    call_error,
    decision,
    created_at,
    updated_at";

pub struct SqlQuoteRepository {
    pool: DbPool,
}

impl SqlQuoteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl QuoteRepository for SqlQuoteRepository {
    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {QUOTE_COLUMNS} FROM quotes WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(quote_from_row).transpose()
    }

    async fn find_by_call_id(&self, call_id: &CallId) -> Result<Option<Quote>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {QUOTE_COLUMNS} FROM quotes WHERE call_id = ?"))
            .bind(&call_id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(quote_from_row).transpose()
    }

    async fn list_for_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<Quote>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {QUOTE_COLUMNS} FROM quotes
             WHERE request_id = ?
             ORDER BY created_at ASC, provider_id ASC"
        ))
        .bind(&request_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(quote_from_row).collect()
    }

    async fn insert(&self, quote: Quote) -> Result<(), RepositoryError> {
        sqlx::query(&format!(
            "INSERT INTO quotes ({QUOTE_COLUMNS})
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(&quote.id.0)
        .bind(&quote.request_id.0)
        .bind(&quote.provider.provider_id.0)
        .bind(&quote.provider.name)
        .bind(&quote.provider.company)
        .bind(&quote.provider.phone)
        .bind(f64::from(quote.provider.rating))
        .bind(quote.quote_price.as_deref())
        .bind(quote.estimated_price.map(|price| price.to_string()))
        .bind(quote.available_time.as_deref())
        .bind(quote.duration.as_deref())
        .bind(quote.included_in_quote.as_deref())
        .bind(quote.call.call_id.as_ref().map(|call_id| call_id.0.as_str()))
        .bind(quote.call.status.as_str())
        .bind(quote.call.summary.as_deref())
        .bind(quote.call.sentiment.as_deref())
        .bind(quote.call.successful)
        .bind(quote.call.error.as_deref())
        .bind(quote.decision.as_str())
        .bind(format_timestamp(quote.created_at))
        .bind(format_timestamp(quote.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_call_state(
        &self,
        quote: &Quote,
        expected: ExpectedCallState,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE quotes SET
                call_status = ?,
                call_summary = ?,
                user_sentiment = ?,
                call_successful = ?,
                call_error = ?,
                quote_price = ?,
                available_time = ?,
                updated_at = ?
             WHERE id = ? AND call_status = ? AND updated_at = ?",
        )
        .bind(quote.call.status.as_str())
        .bind(quote.call.summary.as_deref())
        .bind(quote.call.sentiment.as_deref())
        .bind(quote.call.successful)
        .bind(quote.call.error.as_deref())
        .bind(quote.quote_price.as_deref())
        .bind(quote.available_time.as_deref())
        .bind(format_timestamp(quote.updated_at))
        .bind(&quote.id.0)
        .bind(expected.status.as_str())
        .bind(format_timestamp(expected.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_decision(
        &self,
        id: &QuoteId,
        expected: QuoteDecision,
        decision: QuoteDecision,
        updated_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE quotes SET decision = ?, updated_at = ? WHERE id = ? AND decision = ?")
                .bind(decision.as_str())
                .bind(format_timestamp(updated_at))
                .bind(&id.0)
                .bind(expected.as_str())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Conflict(format!(
                "quote `{}` is no longer {}",
                id.0,
                expected.as_str()
            )));
        }
        Ok(())
    }
}

fn quote_from_row(row: SqliteRow) -> Result<Quote, RepositoryError> {
    let status_raw = row.try_get::<String, _>("call_status")?;
    let status = CallStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown call status `{status_raw}`")))?;

    let decision_raw = row.try_get::<String, _>("decision")?;
    let decision = QuoteDecision::parse(&decision_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown decision `{decision_raw}`")))?;

    let estimated_price = row
        .try_get::<Option<String>, _>("estimated_price")?
        .map(|value| {
            Decimal::from_str(&value).map_err(|error| {
                RepositoryError::Decode(format!("invalid estimated_price `{value}` ({error})"))
            })
        })
        .transpose()?;

    Ok(Quote {
        id: QuoteId(row.try_get("id")?),
        request_id: RequestId(row.try_get("request_id")?),
        provider: ProviderSnapshot {
            provider_id: ProviderId(row.try_get("provider_id")?),
            name: row.try_get("provider_name")?,
            company: row.try_get("provider_company")?,
            phone: row.try_get("provider_phone")?,
            rating: row.try_get::<f64, _>("provider_rating")? as f32,
        },
        quote_price: row.try_get("quote_price")?,
        estimated_price,
        available_time: row.try_get("available_time")?,
        duration: row.try_get("duration")?,
        included_in_quote: row.try_get("included_in_quote")?,
        call: CallTracking {
            call_id: row.try_get::<Option<String>, _>("call_id")?.map(CallId),
            status,
            summary: row.try_get("call_summary")?,
            sentiment: row.try_get("user_sentiment")?,
            successful: row.try_get("call_successful")?,
            error: row.try_get("call_error")?,
        },
        decision,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}
