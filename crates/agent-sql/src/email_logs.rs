use chrono::{DateTime, Utc};
use models::DeliveryStatus;
use sqlx::types::Uuid;

/// Row of the `email_logs` table. Rows are only ever inserted.
#[derive(Debug, sqlx::FromRow)]
pub struct Row {
    pub id: Uuid,
    pub alert_id: Uuid,
    pub user_id: Uuid,
    pub recipient_email: String,
    pub subject: String,
    pub body: String,
    pub status: DeliveryStatus,
    pub error_detail: Option<String>,
    pub provider_message_id: Option<String>,
    pub sent_at: DateTime<Utc>,
}

impl From<Row> for models::NotificationOutcome {
    fn from(row: Row) -> Self {
        let Row {
            id,
            alert_id,
            user_id,
            recipient_email,
            subject,
            body,
            status,
            error_detail,
            provider_message_id,
            sent_at,
        } = row;

        models::NotificationOutcome {
            id,
            alert_id,
            user_id,
            recipient_email,
            subject_line: subject,
            rendered_body: body,
            status,
            error_detail,
            provider_message_id,
            sent_at,
        }
    }
}

#[tracing::instrument(level = "debug", skip_all, fields(alert_id = %outcome.alert_id, status = %outcome.status))]
pub async fn insert_outcome(outcome: &models::NewOutcome, db: &sqlx::PgPool) -> sqlx::Result<Row> {
    sqlx::query_as::<_, Row>(
        r#"insert into email_logs (
            alert_id,
            user_id,
            recipient_email,
            subject,
            body,
            status,
            error_detail,
            provider_message_id,
            sent_at
        ) values ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        returning
            id,
            alert_id,
            user_id,
            recipient_email,
            subject,
            body,
            status,
            error_detail,
            provider_message_id,
            sent_at"#,
    )
    .bind(outcome.alert_id)
    .bind(outcome.user_id)
    .bind(&outcome.recipient_email)
    .bind(&outcome.subject_line)
    .bind(&outcome.rendered_body)
    .bind(outcome.status)
    .bind(outcome.error_detail.as_deref())
    .bind(outcome.provider_message_id.as_deref())
    .bind(outcome.sent_at)
    .fetch_one(db)
    .await
}

pub async fn fetch_outcomes_for_alert(alert_id: Uuid, db: &sqlx::PgPool) -> sqlx::Result<Vec<Row>> {
    sqlx::query_as::<_, Row>(
        r#"select
            id,
            alert_id,
            user_id,
            recipient_email,
            subject,
            body,
            status,
            error_detail,
            provider_message_id,
            sent_at
        from email_logs
        where alert_id = $1
        order by sent_at asc, id asc"#,
    )
    .bind(alert_id)
    .fetch_all(db)
    .await
}
