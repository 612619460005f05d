use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shipyard_core::{DeployableGroupId, DeployableId};
use sqlx::{Postgres, QueryBuilder};

use super::{map_db_error, RelationalStore};
use crate::models::{Deployable, DeployableUpdate};
use crate::persistence::DeployablePersistence;

#[derive(sqlx::FromRow)]
struct DeployableRow {
    id: i64,
    deployable_group_id: i64,
    name: String,
    description: String,
    git_url: String,
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
}

impl From<DeployableRow> for Deployable {
    fn from(row: DeployableRow) -> Self {
        Deployable {
            id: DeployableId::from_value(row.id as u64),
            deployable_group_id: DeployableGroupId::from_value(row.deployable_group_id as u64),
            name: row.name,
            description: row.description,
            git_url: row.git_url,
            created: row.created,
            modified: row.modified,
        }
    }
}

#[async_trait]
impl DeployablePersistence for RelationalStore {
    #[tracing::instrument(name = "relational::deployable::insert", skip_all)]
    async fn insert_deployable(&self, deployable: &Deployable) -> anyhow::Result<DeployableId> {
        let mut conn = self.connection().await?;

        sqlx::query(
            // language=PostgreSQL
            r#"
            INSERT INTO deployable
               (id, deployable_group_id, name, description, git_url, created, modified)
            VALUES
               ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(deployable.id.value() as i64)
        .bind(deployable.deployable_group_id.value() as i64)
        .bind(&deployable.name)
        .bind(&deployable.description)
        .bind(&deployable.git_url)
        .bind(deployable.created)
        .bind(deployable.modified)
        .execute(conn.get()?)
        .await
        .map_err(|err| map_db_error(err, "inserting deployable"))?;

        Ok(deployable.id)
    }

    #[tracing::instrument(name = "relational::deployable::get", skip_all)]
    async fn deployable(&self, id: DeployableId) -> anyhow::Result<Option<Deployable>> {
        let mut conn = self.connection().await?;

        let row = sqlx::query_as::<_, DeployableRow>("SELECT * FROM deployable WHERE id = $1")
            .bind(id.value() as i64)
            .fetch_optional(conn.get()?)
            .await?;

        Ok(row.map(Deployable::from))
    }

    #[tracing::instrument(name = "relational::deployable::get_by_name", skip_all)]
    async fn deployable_for_name_and_group(
        &self,
        name: &str,
        group_id: DeployableGroupId,
    ) -> anyhow::Result<Option<Deployable>> {
        let mut conn = self.connection().await?;

        let row = sqlx::query_as::<_, DeployableRow>(
            "SELECT * FROM deployable WHERE name = $1 AND deployable_group_id = $2",
        )
        .bind(name)
        .bind(group_id.value() as i64)
        .fetch_optional(conn.get()?)
        .await?;

        Ok(row.map(Deployable::from))
    }

    #[tracing::instrument(name = "relational::deployable::list_for_group", skip_all)]
    async fn deployables_for_deployable_group(
        &self,
        group_id: DeployableGroupId,
    ) -> anyhow::Result<Vec<Deployable>> {
        let mut conn = self.connection().await?;

        let rows = sqlx::query_as::<_, DeployableRow>(
            "SELECT * FROM deployable WHERE deployable_group_id = $1 ORDER BY id",
        )
        .bind(group_id.value() as i64)
        .fetch_all(conn.get()?)
        .await?;

        Ok(rows.into_iter().map(Deployable::from).collect())
    }

    #[tracing::instrument(name = "relational::deployable::update", skip_all)]
    async fn update_deployable(&self, id: DeployableId, update: &DeployableUpdate) -> anyhow::Result<u64> {
        if update.is_empty() {
            return Ok(0);
        }

        let mut builder = QueryBuilder::<Postgres>::new("UPDATE deployable SET ");
        let mut fields = builder.separated(", ");
        if let Some(name) = &update.name {
            fields.push("name = ").push_bind_unseparated(name.clone());
        }
        if let Some(description) = &update.description {
            fields
                .push("description = ")
                .push_bind_unseparated(description.clone());
        }
        if let Some(git_url) = &update.git_url {
            fields.push("git_url = ").push_bind_unseparated(git_url.clone());
        }
        fields.push("modified = now()");
        builder.push(" WHERE id = ").push_bind(id.value() as i64);

        let mut conn = self.connection().await?;
        let result = builder
            .build()
            .execute(conn.get()?)
            .await
            .map_err(|err| map_db_error(err, "updating deployable"))?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(name = "relational::deployable::delete", skip_all)]
    async fn delete_deployable(&self, id: DeployableId) -> anyhow::Result<u64> {
        let mut conn = self.connection().await?;

        let result = sqlx::query("DELETE FROM deployable WHERE id = $1")
            .bind(id.value() as i64)
            .execute(conn.get()?)
            .await
            .map_err(|err| map_db_error(err, "deleting deployable"))?;

        Ok(result.rows_affected())
    }
}
