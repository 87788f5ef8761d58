//! Project (tenant) registry.

use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use billgate_shared::generate_api_key;

use crate::error::{BillingError, BillingResult};

/// A tenant of the gateway. Never hard-deleted; deactivation flips
/// `is_active` and the key stops resolving.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub webhook_url: Option<String>,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct ProjectService {
    pool: PgPool,
}

impl ProjectService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Register a new project and mint its API key. The key is returned
    /// exactly once; only this opaque value is stored.
    pub async fn create_project(
        &self,
        name: &str,
        webhook_url: Option<&str>,
    ) -> BillingResult<Project> {
        let api_key = generate_api_key();

        let project: Project = sqlx::query_as(
            r#"
            INSERT INTO projects (id, name, api_key, webhook_url)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, api_key, webhook_url, is_active, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(&api_key)
        .bind(webhook_url)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(project_id = %project.id, name = %project.name, "Project registered");

        Ok(project)
    }

    /// Resolve an API key to its project. Inactive projects do not resolve.
    pub async fn get_by_api_key(&self, api_key: &str) -> BillingResult<Option<Project>> {
        let project: Option<Project> = sqlx::query_as(
            r#"
            SELECT id, name, api_key, webhook_url, is_active, created_at, updated_at
            FROM projects
            WHERE api_key = $1 AND is_active = TRUE
            "#,
        )
        .bind(api_key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(project)
    }

    pub async fn get_by_id(&self, project_id: Uuid) -> BillingResult<Option<Project>> {
        let project: Option<Project> = sqlx::query_as(
            r#"
            SELECT id, name, api_key, webhook_url, is_active, created_at, updated_at
            FROM projects
            WHERE id = $1
            "#,
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(project)
    }

    /// Deactivate a project. Its key stops authenticating; rows remain.
    pub async fn deactivate(&self, project_id: Uuid) -> BillingResult<()> {
        let result = sqlx::query(
            "UPDATE projects SET is_active = FALSE, updated_at = NOW() WHERE id = $1",
        )
        .bind(project_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(BillingError::NotFound(format!("project {}", project_id)));
        }

        tracing::info!(project_id = %project_id, "Project deactivated");
        Ok(())
    }
}
