use sqlx::types::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct Row {
    pub id: Uuid,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub emergency_contact_email: Option<String>,
}

impl From<Row> for models::UserProfile {
    fn from(row: Row) -> Self {
        let Row {
            id,
            email,
            full_name,
            emergency_contact_email,
        } = row;

        models::UserProfile {
            id,
            email,
            full_name,
            emergency_contact_email,
        }
    }
}

pub async fn fetch_user(id: Uuid, db: &sqlx::PgPool) -> sqlx::Result<Option<Row>> {
    sqlx::query_as::<_, Row>(
        r#"select id, email, full_name, emergency_contact_email
        from users
        where id = $1"#,
    )
    .bind(id)
    .fetch_optional(db)
    .await
}
