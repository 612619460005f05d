use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shipyard_core::{
    DeployableConfigId, DeployableGroupId, DeployableId, DeployableVectorId, DeploymentId,
    EnvironmentId,
};
use sqlx::types::Json;

use super::{map_db_error, RelationalStore};
use crate::models::{Deployment, DeploymentData, DeploymentStatus};
use crate::persistence::DeploymentPersistence;

#[derive(sqlx::FromRow)]
struct DeploymentRow {
    id: i64,
    deployment_number: i64,
    #[sqlx(rename = "type")]
    deployment_type: String,
    data: Json<DeploymentData>,
    status: String,
    build_number: String,
    git_hash: String,
    deployable_id: i64,
    environment_id: i64,
    deployable_config_id: i64,
    deployable_vector_id: i64,
    created: DateTime<Utc>,
}

impl TryFrom<DeploymentRow> for Deployment {
    type Error = anyhow::Error;

    fn try_from(row: DeploymentRow) -> anyhow::Result<Self> {
        let Json(data) = row.data;
        if data.deployment_type().as_str() != row.deployment_type {
            anyhow::bail!(
                "deployment {} has type {} but carries {} data",
                row.id,
                row.deployment_type,
                data.deployment_type()
            );
        }

        Ok(Deployment {
            id: DeploymentId::from_value(row.id as u64),
            deployment_number: row.deployment_number as u64,
            data,
            status: row.status.parse()?,
            build_number: row.build_number,
            git_hash: row.git_hash,
            deployable_id: DeployableId::from_value(row.deployable_id as u64),
            environment_id: EnvironmentId::from_value(row.environment_id as u64),
            deployable_config_id: DeployableConfigId::from_value(row.deployable_config_id as u64),
            deployable_vector_id: DeployableVectorId::from_value(row.deployable_vector_id as u64),
            created: row.created,
        })
    }
}

fn into_deployments(rows: Vec<DeploymentRow>) -> anyhow::Result<Vec<Deployment>> {
    rows.into_iter().map(Deployment::try_from).collect()
}

#[async_trait]
impl DeploymentPersistence for RelationalStore {
    #[tracing::instrument(name = "relational::deployment::insert", skip_all)]
    async fn insert_deployment(&self, deployment: &Deployment) -> anyhow::Result<DeploymentId> {
        let mut conn = self.connection().await?;

        sqlx::query(
            // language=PostgreSQL
            r#"
            INSERT INTO deployment
               (id, type, data, status, build_number, git_hash, deployable_id, environment_id,
                deployable_config_id, deployable_vector_id, created)
            VALUES
               ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(deployment.id.value() as i64)
        .bind(deployment.deployment_type().as_str())
        .bind(Json(&deployment.data))
        .bind(deployment.status.as_str())
        .bind(&deployment.build_number)
        .bind(&deployment.git_hash)
        .bind(deployment.deployable_id.value() as i64)
        .bind(deployment.environment_id.value() as i64)
        .bind(deployment.deployable_config_id.value() as i64)
        .bind(deployment.deployable_vector_id.value() as i64)
        .bind(deployment.created)
        .execute(conn.get()?)
        .await
        .map_err(|err| map_db_error(err, "inserting deployment"))?;

        Ok(deployment.id)
    }

    #[tracing::instrument(name = "relational::deployment::get", skip_all)]
    async fn deployment(&self, id: DeploymentId) -> anyhow::Result<Option<Deployment>> {
        let mut conn = self.connection().await?;

        let row = sqlx::query_as::<_, DeploymentRow>("SELECT * FROM deployment WHERE id = $1")
            .bind(id.value() as i64)
            .fetch_optional(conn.get()?)
            .await?;

        row.map(Deployment::try_from).transpose()
    }

    #[tracing::instrument(name = "relational::deployment::list_for_deployable", skip_all)]
    async fn deployments(&self, deployable_id: DeployableId) -> anyhow::Result<Vec<Deployment>> {
        let mut conn = self.connection().await?;

        let rows = sqlx::query_as::<_, DeploymentRow>(
            "SELECT * FROM deployment WHERE deployable_id = $1 ORDER BY deployment_number",
        )
        .bind(deployable_id.value() as i64)
        .fetch_all(conn.get()?)
        .await?;

        into_deployments(rows)
    }

    #[tracing::instrument(name = "relational::deployment::list_for_status", skip_all)]
    async fn deployments_for_status(
        &self,
        deployable_id: DeployableId,
        status: DeploymentStatus,
    ) -> anyhow::Result<Vec<Deployment>> {
        let mut conn = self.connection().await?;

        let rows = sqlx::query_as::<_, DeploymentRow>(
            "SELECT * FROM deployment WHERE deployable_id = $1 AND status = $2 ORDER BY deployment_number",
        )
        .bind(deployable_id.value() as i64)
        .bind(status.as_str())
        .fetch_all(conn.get()?)
        .await?;

        into_deployments(rows)
    }

    #[tracing::instrument(name = "relational::deployment::delete", skip_all)]
    async fn delete_deployment(&self, id: DeploymentId) -> anyhow::Result<u64> {
        let mut conn = self.connection().await?;

        let result = sqlx::query("DELETE FROM deployment WHERE id = $1")
            .bind(id.value() as i64)
            .execute(conn.get()?)
            .await
            .map_err(|err| map_db_error(err, "deleting deployment"))?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(name = "relational::deployment::list_for_group", skip_all)]
    async fn deployments_for_deployment_group(
        &self,
        group_id: DeployableGroupId,
        environment_id: EnvironmentId,
        build_number: &str,
    ) -> anyhow::Result<Vec<Deployment>> {
        let mut conn = self.connection().await?;

        let rows = sqlx::query_as::<_, DeploymentRow>(
            // language=PostgreSQL
            r#"
            SELECT DISTINCT ON (d.deployable_id) d.*
            FROM deployment d
            JOIN deployable ON deployable.id = d.deployable_id
            WHERE deployable.deployable_group_id = $1
              AND d.environment_id = $2
              AND d.build_number = $3
              AND d.status = 'COMPLETE'
            ORDER BY d.deployable_id, d.deployment_number DESC
            "#,
        )
        .bind(group_id.value() as i64)
        .bind(environment_id.value() as i64)
        .bind(build_number)
        .fetch_all(conn.get()?)
        .await?;

        let mut deployments = into_deployments(rows)?;
        deployments.sort_by_key(|deployment| deployment.deployment_number);

        Ok(deployments)
    }

    #[tracing::instrument(name = "relational::deployment::active", skip_all)]
    async fn active_deployment(
        &self,
        deployable_id: DeployableId,
        environment_id: EnvironmentId,
    ) -> anyhow::Result<Option<Deployment>> {
        let mut conn = self.connection().await?;

        let row = sqlx::query_as::<_, DeploymentRow>(
            // language=PostgreSQL
            r#"
            SELECT * FROM deployment
            WHERE deployable_id = $1 AND environment_id = $2 AND status = 'COMPLETE'
            ORDER BY deployment_number DESC
            LIMIT 1
            "#,
        )
        .bind(deployable_id.value() as i64)
        .bind(environment_id.value() as i64)
        .fetch_optional(conn.get()?)
        .await?;

        row.map(Deployment::try_from).transpose()
    }

    #[tracing::instrument(name = "relational::deployment::next_pending", skip_all)]
    async fn next_pending_deployment(&self) -> anyhow::Result<Option<Deployment>> {
        let mut conn = self.connection().await?;

        // Rows locked by another claimer are skipped. A target's later pending
        // rows stay ineligible while an earlier one is pending or in progress,
        // so each (deployable, environment) sees its deployments in order.
        let row = sqlx::query_as::<_, DeploymentRow>(
            // language=PostgreSQL
            r#"
            SELECT d.* FROM deployment d
            WHERE d.status = 'PENDING'
              AND NOT EXISTS (
                SELECT 1 FROM deployment busy
                WHERE busy.deployable_id = d.deployable_id
                  AND busy.environment_id = d.environment_id
                  AND busy.status = 'IN_PROGRESS'
              )
              AND NOT EXISTS (
                SELECT 1 FROM deployment earlier
                WHERE earlier.deployable_id = d.deployable_id
                  AND earlier.environment_id = d.environment_id
                  AND earlier.status = 'PENDING'
                  AND earlier.deployment_number < d.deployment_number
              )
            ORDER BY d.deployment_number
            LIMIT 1
            FOR UPDATE OF d SKIP LOCKED
            "#,
        )
        .fetch_optional(conn.get()?)
        .await?;

        row.map(Deployment::try_from).transpose()
    }

    #[tracing::instrument(name = "relational::deployment::set_status", skip_all)]
    async fn set_deployment_status(&self, id: DeploymentId, status: DeploymentStatus) -> anyhow::Result<u64> {
        let mut conn = self.connection().await?;

        let result = sqlx::query("UPDATE deployment SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(id.value() as i64)
            .execute(conn.get()?)
            .await
            .map_err(|err| map_db_error(err, "updating deployment status"))?;

        Ok(result.rows_affected())
    }
}
