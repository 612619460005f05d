use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shipyard_core::{DeployableId, DeployableVectorId, EnvironmentId};

use super::{map_db_error, RelationalStore};
use crate::models::{DeployableVector, VectorSourceType};
use crate::persistence::VectorPersistence;

#[derive(sqlx::FromRow)]
struct DeployableVectorRow {
    id: i64,
    deployable_id: i64,
    source_type: String,
    source_environment_id: Option<i64>,
    target_environment_id: i64,
    created: DateTime<Utc>,
}

impl TryFrom<DeployableVectorRow> for DeployableVector {
    type Error = anyhow::Error;

    fn try_from(row: DeployableVectorRow) -> anyhow::Result<Self> {
        Ok(DeployableVector {
            id: DeployableVectorId::from_value(row.id as u64),
            deployable_id: DeployableId::from_value(row.deployable_id as u64),
            source_type: row.source_type.parse()?,
            source_environment_id: row
                .source_environment_id
                .map(|id| EnvironmentId::from_value(id as u64)),
            target_environment_id: EnvironmentId::from_value(row.target_environment_id as u64),
            created: row.created,
        })
    }
}

#[async_trait]
impl VectorPersistence for RelationalStore {
    #[tracing::instrument(name = "relational::vector::insert", skip_all)]
    async fn insert_deployable_vector(&self, vector: &DeployableVector) -> anyhow::Result<DeployableVectorId> {
        let mut conn = self.connection().await?;

        sqlx::query(
            // language=PostgreSQL
            r#"
            INSERT INTO deployable_vector
               (id, deployable_id, source_type, source_environment_id, target_environment_id, created)
            VALUES
               ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(vector.id.value() as i64)
        .bind(vector.deployable_id.value() as i64)
        .bind(vector.source_type.as_str())
        .bind(vector.source_environment_id.map(|id| id.value() as i64))
        .bind(vector.target_environment_id.value() as i64)
        .bind(vector.created)
        .execute(conn.get()?)
        .await
        .map_err(|err| map_db_error(err, "inserting deployable vector"))?;

        Ok(vector.id)
    }

    #[tracing::instrument(name = "relational::vector::get", skip_all)]
    async fn deployable_vector(&self, id: DeployableVectorId) -> anyhow::Result<Option<DeployableVector>> {
        let mut conn = self.connection().await?;

        let row = sqlx::query_as::<_, DeployableVectorRow>("SELECT * FROM deployable_vector WHERE id = $1")
            .bind(id.value() as i64)
            .fetch_optional(conn.get()?)
            .await?;

        row.map(DeployableVector::try_from).transpose()
    }

    #[tracing::instrument(name = "relational::vector::list_for_deployable", skip_all)]
    async fn deployable_vectors_for_deployable(
        &self,
        deployable_id: DeployableId,
    ) -> anyhow::Result<Vec<DeployableVector>> {
        let mut conn = self.connection().await?;

        let rows = sqlx::query_as::<_, DeployableVectorRow>(
            "SELECT * FROM deployable_vector WHERE deployable_id = $1 ORDER BY id",
        )
        .bind(deployable_id.value() as i64)
        .fetch_all(conn.get()?)
        .await?;

        rows.into_iter().map(DeployableVector::try_from).collect()
    }

    #[tracing::instrument(name = "relational::vector::list_for_source", skip_all)]
    async fn deployable_vectors_for_deployable_and_source(
        &self,
        deployable_id: DeployableId,
        source_type: VectorSourceType,
    ) -> anyhow::Result<Vec<DeployableVector>> {
        let mut conn = self.connection().await?;

        let rows = sqlx::query_as::<_, DeployableVectorRow>(
            "SELECT * FROM deployable_vector WHERE deployable_id = $1 AND source_type = $2 ORDER BY id",
        )
        .bind(deployable_id.value() as i64)
        .bind(source_type.as_str())
        .fetch_all(conn.get()?)
        .await?;

        rows.into_iter().map(DeployableVector::try_from).collect()
    }

    #[tracing::instrument(name = "relational::vector::list_for_source_environment", skip_all)]
    async fn deployable_vectors_for_deployable_and_source_environment(
        &self,
        deployable_id: DeployableId,
        source_environment_id: EnvironmentId,
    ) -> anyhow::Result<Vec<DeployableVector>> {
        let mut conn = self.connection().await?;

        let rows = sqlx::query_as::<_, DeployableVectorRow>(
            // language=PostgreSQL
            r#"
            SELECT * FROM deployable_vector
            WHERE deployable_id = $1 AND source_type = $2 AND source_environment_id = $3
            ORDER BY id
            "#,
        )
        .bind(deployable_id.value() as i64)
        .bind(VectorSourceType::EnvironmentId.as_str())
        .bind(source_environment_id.value() as i64)
        .fetch_all(conn.get()?)
        .await?;

        rows.into_iter().map(DeployableVector::try_from).collect()
    }

    #[tracing::instrument(name = "relational::vector::get_for_source_target", skip_all)]
    async fn deployable_vector_for_deployable_source_target(
        &self,
        deployable_id: DeployableId,
        source_type: VectorSourceType,
        source_environment_id: Option<EnvironmentId>,
        target_environment_id: EnvironmentId,
    ) -> anyhow::Result<Option<DeployableVector>> {
        let mut conn = self.connection().await?;

        let row = sqlx::query_as::<_, DeployableVectorRow>(
            // language=PostgreSQL
            r#"
            SELECT * FROM deployable_vector
            WHERE deployable_id = $1
              AND source_type = $2
              AND source_environment_id IS NOT DISTINCT FROM $3
              AND target_environment_id = $4
            "#,
        )
        .bind(deployable_id.value() as i64)
        .bind(source_type.as_str())
        .bind(source_environment_id.map(|id| id.value() as i64))
        .bind(target_environment_id.value() as i64)
        .fetch_optional(conn.get()?)
        .await?;

        row.map(DeployableVector::try_from).transpose()
    }

    #[tracing::instrument(name = "relational::vector::delete", skip_all)]
    async fn delete_deployable_vector(&self, id: DeployableVectorId) -> anyhow::Result<u64> {
        let mut conn = self.connection().await?;

        let result = sqlx::query("DELETE FROM deployable_vector WHERE id = $1")
            .bind(id.value() as i64)
            .execute(conn.get()?)
            .await
            .map_err(|err| map_db_error(err, "deleting deployable vector"))?;

        Ok(result.rows_affected())
    }
}
