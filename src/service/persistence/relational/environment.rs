use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shipyard_core::{DeployableGroupId, EnvironmentId};
use sqlx::{Postgres, QueryBuilder};

use super::{map_db_error, RelationalStore};
use crate::models::{Environment, EnvironmentUpdate};
use crate::persistence::EnvironmentPersistence;

#[derive(sqlx::FromRow)]
struct EnvironmentRow {
    id: i64,
    deployable_group_id: i64,
    name: String,
    description: String,
    is_prod: bool,
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
}

impl From<EnvironmentRow> for Environment {
    fn from(row: EnvironmentRow) -> Self {
        Environment {
            id: EnvironmentId::from_value(row.id as u64),
            deployable_group_id: DeployableGroupId::from_value(row.deployable_group_id as u64),
            name: row.name,
            description: row.description,
            is_prod: row.is_prod,
            created: row.created,
            modified: row.modified,
        }
    }
}

#[async_trait]
impl EnvironmentPersistence for RelationalStore {
    #[tracing::instrument(name = "relational::environment::insert", skip_all)]
    async fn insert_environment(&self, environment: &Environment) -> anyhow::Result<EnvironmentId> {
        let mut conn = self.connection().await?;

        sqlx::query(
            // language=PostgreSQL
            r#"
            INSERT INTO environment
               (id, deployable_group_id, name, description, is_prod, created, modified)
            VALUES
               ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(environment.id.value() as i64)
        .bind(environment.deployable_group_id.value() as i64)
        .bind(&environment.name)
        .bind(&environment.description)
        .bind(environment.is_prod)
        .bind(environment.created)
        .bind(environment.modified)
        .execute(conn.get()?)
        .await
        .map_err(|err| map_db_error(err, "inserting environment"))?;

        Ok(environment.id)
    }

    #[tracing::instrument(name = "relational::environment::get", skip_all)]
    async fn environment(&self, id: EnvironmentId) -> anyhow::Result<Option<Environment>> {
        let mut conn = self.connection().await?;

        let row = sqlx::query_as::<_, EnvironmentRow>("SELECT * FROM environment WHERE id = $1")
            .bind(id.value() as i64)
            .fetch_optional(conn.get()?)
            .await?;

        Ok(row.map(Environment::from))
    }

    #[tracing::instrument(name = "relational::environment::get_by_name", skip_all)]
    async fn environment_for_name_and_group(
        &self,
        name: &str,
        group_id: DeployableGroupId,
    ) -> anyhow::Result<Option<Environment>> {
        let mut conn = self.connection().await?;

        let row = sqlx::query_as::<_, EnvironmentRow>(
            "SELECT * FROM environment WHERE name = $1 AND deployable_group_id = $2",
        )
        .bind(name)
        .bind(group_id.value() as i64)
        .fetch_optional(conn.get()?)
        .await?;

        Ok(row.map(Environment::from))
    }

    #[tracing::instrument(name = "relational::environment::list_for_group", skip_all)]
    async fn environments_for_deployable_group(
        &self,
        group_id: DeployableGroupId,
    ) -> anyhow::Result<Vec<Environment>> {
        let mut conn = self.connection().await?;

        let rows = sqlx::query_as::<_, EnvironmentRow>(
            "SELECT * FROM environment WHERE deployable_group_id = $1 ORDER BY id",
        )
        .bind(group_id.value() as i64)
        .fetch_all(conn.get()?)
        .await?;

        Ok(rows.into_iter().map(Environment::from).collect())
    }

    #[tracing::instrument(name = "relational::environment::update", skip_all)]
    async fn update_environment(&self, id: EnvironmentId, update: &EnvironmentUpdate) -> anyhow::Result<u64> {
        if update.is_empty() {
            return Ok(0);
        }

        let mut builder = QueryBuilder::<Postgres>::new("UPDATE environment SET ");
        let mut fields = builder.separated(", ");
        if let Some(name) = &update.name {
            fields.push("name = ").push_bind_unseparated(name.clone());
        }
        if let Some(description) = &update.description {
            fields
                .push("description = ")
                .push_bind_unseparated(description.clone());
        }
        if let Some(is_prod) = update.is_prod {
            fields.push("is_prod = ").push_bind_unseparated(is_prod);
        }
        fields.push("modified = now()");
        builder.push(" WHERE id = ").push_bind(id.value() as i64);

        let mut conn = self.connection().await?;
        let result = builder
            .build()
            .execute(conn.get()?)
            .await
            .map_err(|err| map_db_error(err, "updating environment"))?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(name = "relational::environment::delete", skip_all)]
    async fn delete_environment(&self, id: EnvironmentId) -> anyhow::Result<u64> {
        let mut conn = self.connection().await?;

        let result = sqlx::query("DELETE FROM environment WHERE id = $1")
            .bind(id.value() as i64)
            .execute(conn.get()?)
            .await
            .map_err(|err| map_db_error(err, "deleting environment"))?;

        Ok(result.rows_affected())
    }
}
