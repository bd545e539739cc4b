use chrono::{DateTime, Utc};
use models::AlertKind;
use sqlx::types::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct Row {
    pub id: Uuid,
    pub user_id: Uuid,
    pub alert_type: AlertKind,
    pub content: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub is_resolved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Row> for models::Alert {
    fn from(row: Row) -> Self {
        let Row {
            id,
            user_id,
            alert_type,
            content,
            latitude,
            longitude,
            is_resolved,
            created_at,
            updated_at,
        } = row;

        models::Alert {
            id,
            user_id,
            kind: alert_type,
            content,
            location: models::Location::from_parts(latitude, longitude),
            resolved: is_resolved,
            created_at,
            updated_at,
        }
    }
}

const RETURNING: &str = r#"returning
    id,
    user_id,
    alert_type,
    content,
    latitude,
    longitude,
    is_resolved,
    created_at,
    updated_at"#;

#[tracing::instrument(level = "debug", skip(db))]
pub async fn insert_alert(
    alert: &models::NewAlert,
    now: DateTime<Utc>,
    db: &sqlx::PgPool,
) -> sqlx::Result<Row> {
    let (latitude, longitude) = models::Location::into_parts(alert.location);

    sqlx::query_as::<_, Row>(&format!(
        r#"insert into alerts (user_id, alert_type, content, latitude, longitude, is_resolved, created_at, updated_at)
        values ($1, $2, $3, $4, $5, false, $6, $6)
        {RETURNING}"#
    ))
    .bind(alert.user_id)
    .bind(&alert.kind)
    .bind(alert.content.as_deref())
    .bind(latitude)
    .bind(longitude)
    .bind(now)
    .fetch_one(db)
    .await
}

pub async fn fetch_alert(id: Uuid, db: &sqlx::PgPool) -> sqlx::Result<Option<Row>> {
    sqlx::query_as::<_, Row>(
        r#"select
            id,
            user_id,
            alert_type,
            content,
            latitude,
            longitude,
            is_resolved,
            created_at,
            updated_at
        from alerts
        where id = $1"#,
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

/// Marks the alert as resolved. Resolving an already-resolved alert leaves
/// its `updated_at` untouched. Returns `None` if no such alert exists.
#[tracing::instrument(level = "debug", skip(db))]
pub async fn resolve_alert(
    id: Uuid,
    now: DateTime<Utc>,
    db: &sqlx::PgPool,
) -> sqlx::Result<Option<Row>> {
    sqlx::query_as::<_, Row>(&format!(
        r#"update alerts set
            is_resolved = true,
            updated_at = case when is_resolved then updated_at else $2 end
        where id = $1
        {RETURNING}"#
    ))
    .bind(id)
    .bind(now)
    .fetch_optional(db)
    .await
}

/// Returns the user's alerts, most recent first.
pub async fn fetch_alerts_for_user(user_id: Uuid, db: &sqlx::PgPool) -> sqlx::Result<Vec<Row>> {
    sqlx::query_as::<_, Row>(
        r#"select
            id,
            user_id,
            alert_type,
            content,
            latitude,
            longitude,
            is_resolved,
            created_at,
            updated_at
        from alerts
        where user_id = $1
        order by created_at desc, id"#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await
}

/// Deletes the alert, returning it, or `None` if no such alert exists.
/// Its notification log is left in place.
#[tracing::instrument(level = "debug", skip(db))]
pub async fn delete_alert(id: Uuid, db: &sqlx::PgPool) -> sqlx::Result<Option<Row>> {
    sqlx::query_as::<_, Row>(&format!(
        r#"delete from alerts
        where id = $1
        {RETURNING}"#
    ))
    .bind(id)
    .fetch_optional(db)
    .await
}
