use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shipyard_core::{DeployableConfigId, DeployableId, EnvironmentConfigId, EnvironmentId};
use sqlx::{Postgres, QueryBuilder};

use super::{map_db_error, RelationalStore};
use crate::models::{
    ConfigStatus, DeployableConfig, DeployableConfigUpdate, DeployableConfigValue,
    EnvironmentConfig, EnvironmentConfigUpdate, EnvironmentConfigValue,
};
use crate::persistence::ConfigPersistence;

#[derive(sqlx::FromRow)]
struct EnvironmentConfigRow {
    id: i64,
    environment_id: i64,
    status: String,
    created: DateTime<Utc>,
}

impl TryFrom<EnvironmentConfigRow> for EnvironmentConfig {
    type Error = anyhow::Error;

    fn try_from(row: EnvironmentConfigRow) -> anyhow::Result<Self> {
        Ok(EnvironmentConfig {
            id: EnvironmentConfigId::from_value(row.id as u64),
            environment_id: EnvironmentId::from_value(row.environment_id as u64),
            status: row.status.parse()?,
            created: row.created,
        })
    }
}

#[derive(sqlx::FromRow)]
struct EnvironmentConfigValueRow {
    environment_config_id: i64,
    name: String,
    value: String,
    created: DateTime<Utc>,
}

impl From<EnvironmentConfigValueRow> for EnvironmentConfigValue {
    fn from(row: EnvironmentConfigValueRow) -> Self {
        EnvironmentConfigValue {
            environment_config_id: EnvironmentConfigId::from_value(row.environment_config_id as u64),
            name: row.name,
            value: row.value,
            created: row.created,
        }
    }
}

#[derive(sqlx::FromRow)]
struct DeployableConfigRow {
    id: i64,
    deployable_id: i64,
    environment_id: i64,
    status: String,
    created: DateTime<Utc>,
}

impl TryFrom<DeployableConfigRow> for DeployableConfig {
    type Error = anyhow::Error;

    fn try_from(row: DeployableConfigRow) -> anyhow::Result<Self> {
        Ok(DeployableConfig {
            id: DeployableConfigId::from_value(row.id as u64),
            deployable_id: DeployableId::from_value(row.deployable_id as u64),
            environment_id: EnvironmentId::from_value(row.environment_id as u64),
            status: row.status.parse()?,
            created: row.created,
        })
    }
}

#[derive(sqlx::FromRow)]
struct DeployableConfigValueRow {
    deployable_config_id: i64,
    name: String,
    value: String,
    created: DateTime<Utc>,
}

impl From<DeployableConfigValueRow> for DeployableConfigValue {
    fn from(row: DeployableConfigValueRow) -> Self {
        DeployableConfigValue {
            deployable_config_id: DeployableConfigId::from_value(row.deployable_config_id as u64),
            name: row.name,
            value: row.value,
            created: row.created,
        }
    }
}

#[async_trait]
impl ConfigPersistence for RelationalStore {
    #[tracing::instrument(name = "relational::environment_config::insert", skip_all)]
    async fn insert_environment_config(&self, config: &EnvironmentConfig) -> anyhow::Result<EnvironmentConfigId> {
        let mut conn = self.connection().await?;

        sqlx::query(
            // language=PostgreSQL
            r#"
            INSERT INTO environment_config
               (id, environment_id, status, created)
            VALUES
               ($1, $2, $3, $4)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(config.id.value() as i64)
        .bind(config.environment_id.value() as i64)
        .bind(config.status.as_str())
        .bind(config.created)
        .execute(conn.get()?)
        .await
        .map_err(|err| map_db_error(err, "inserting environment config"))?;

        Ok(config.id)
    }

    #[tracing::instrument(name = "relational::environment_config::get", skip_all)]
    async fn environment_config(&self, id: EnvironmentConfigId) -> anyhow::Result<Option<EnvironmentConfig>> {
        let mut conn = self.connection().await?;

        let row = sqlx::query_as::<_, EnvironmentConfigRow>("SELECT * FROM environment_config WHERE id = $1")
            .bind(id.value() as i64)
            .fetch_optional(conn.get()?)
            .await?;

        row.map(EnvironmentConfig::try_from).transpose()
    }

    #[tracing::instrument(name = "relational::environment_config::list_for_status", skip_all)]
    async fn environment_configs_for_status(
        &self,
        environment_id: EnvironmentId,
        status: ConfigStatus,
    ) -> anyhow::Result<Vec<EnvironmentConfig>> {
        let mut conn = self.connection().await?;

        let rows = sqlx::query_as::<_, EnvironmentConfigRow>(
            "SELECT * FROM environment_config WHERE environment_id = $1 AND status = $2 ORDER BY id",
        )
        .bind(environment_id.value() as i64)
        .bind(status.as_str())
        .fetch_all(conn.get()?)
        .await?;

        rows.into_iter().map(EnvironmentConfig::try_from).collect()
    }

    #[tracing::instrument(name = "relational::environment_config::deprecate_active", skip_all)]
    async fn deprecate_active_environment_config(&self, environment_id: EnvironmentId) -> anyhow::Result<u64> {
        let mut conn = self.connection().await?;

        // Concurrent creates for one environment queue on its row lock, so each
        // one sees the ACTIVE config committed by the previous holder.
        sqlx::query("SELECT id FROM environment WHERE id = $1 FOR UPDATE")
            .bind(environment_id.value() as i64)
            .fetch_optional(conn.get()?)
            .await
            .map_err(|err| map_db_error(err, "locking environment for config"))?;

        let result = sqlx::query(
            "UPDATE environment_config SET status = 'DEPRECATED' WHERE environment_id = $1 AND status = 'ACTIVE'",
        )
        .bind(environment_id.value() as i64)
        .execute(conn.get()?)
        .await
        .map_err(|err| map_db_error(err, "deprecating environment config"))?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(name = "relational::environment_config::update", skip_all)]
    async fn update_environment_config(
        &self,
        id: EnvironmentConfigId,
        update: &EnvironmentConfigUpdate,
    ) -> anyhow::Result<u64> {
        if update.is_empty() {
            return Ok(0);
        }

        let mut builder = QueryBuilder::<Postgres>::new("UPDATE environment_config SET ");
        let mut fields = builder.separated(", ");
        if let Some(status) = update.status {
            fields.push("status = ").push_bind_unseparated(status.as_str());
        }
        builder.push(" WHERE id = ").push_bind(id.value() as i64);

        let mut conn = self.connection().await?;
        let result = builder
            .build()
            .execute(conn.get()?)
            .await
            .map_err(|err| map_db_error(err, "updating environment config"))?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(name = "relational::environment_config::delete", skip_all)]
    async fn delete_environment_config(&self, id: EnvironmentConfigId) -> anyhow::Result<u64> {
        let mut conn = self.connection().await?;

        let result = sqlx::query("DELETE FROM environment_config WHERE id = $1")
            .bind(id.value() as i64)
            .execute(conn.get()?)
            .await
            .map_err(|err| map_db_error(err, "deleting environment config"))?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(name = "relational::environment_config_value::insert", skip_all)]
    async fn insert_environment_config_value(&self, value: &EnvironmentConfigValue) -> anyhow::Result<()> {
        self.insert_environment_config_values(std::slice::from_ref(value))
            .await
    }

    #[tracing::instrument(name = "relational::environment_config_value::insert_many", skip_all)]
    async fn insert_environment_config_values(&self, values: &[EnvironmentConfigValue]) -> anyhow::Result<()> {
        if values.is_empty() {
            return Ok(());
        }

        let mut builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO environment_config_value (environment_config_id, name, value, created) ",
        );
        builder.push_values(values, |mut row, value| {
            row.push_bind(value.environment_config_id.value() as i64)
                .push_bind(value.name.clone())
                .push_bind(value.value.clone())
                .push_bind(value.created);
        });

        let mut conn = self.connection().await?;
        builder
            .build()
            .execute(conn.get()?)
            .await
            .map_err(|err| map_db_error(err, "inserting environment config values"))?;

        Ok(())
    }

    #[tracing::instrument(name = "relational::environment_config_value::list", skip_all)]
    async fn environment_config_values(
        &self,
        id: EnvironmentConfigId,
    ) -> anyhow::Result<Vec<EnvironmentConfigValue>> {
        let mut conn = self.connection().await?;

        let rows = sqlx::query_as::<_, EnvironmentConfigValueRow>(
            "SELECT * FROM environment_config_value WHERE environment_config_id = $1 ORDER BY name",
        )
        .bind(id.value() as i64)
        .fetch_all(conn.get()?)
        .await?;

        Ok(rows.into_iter().map(EnvironmentConfigValue::from).collect())
    }

    #[tracing::instrument(name = "relational::deployable_config::insert", skip_all)]
    async fn insert_deployable_config(&self, config: &DeployableConfig) -> anyhow::Result<DeployableConfigId> {
        let mut conn = self.connection().await?;

        sqlx::query(
            // language=PostgreSQL
            r#"
            INSERT INTO deployable_config
               (id, deployable_id, environment_id, status, created)
            VALUES
               ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(config.id.value() as i64)
        .bind(config.deployable_id.value() as i64)
        .bind(config.environment_id.value() as i64)
        .bind(config.status.as_str())
        .bind(config.created)
        .execute(conn.get()?)
        .await
        .map_err(|err| map_db_error(err, "inserting deployable config"))?;

        Ok(config.id)
    }

    #[tracing::instrument(name = "relational::deployable_config::get", skip_all)]
    async fn deployable_config(&self, id: DeployableConfigId) -> anyhow::Result<Option<DeployableConfig>> {
        let mut conn = self.connection().await?;

        let row = sqlx::query_as::<_, DeployableConfigRow>("SELECT * FROM deployable_config WHERE id = $1")
            .bind(id.value() as i64)
            .fetch_optional(conn.get()?)
            .await?;

        row.map(DeployableConfig::try_from).transpose()
    }

    #[tracing::instrument(name = "relational::deployable_config::list_for_status", skip_all)]
    async fn deployable_configs_for_status(
        &self,
        deployable_id: DeployableId,
        environment_id: EnvironmentId,
        status: ConfigStatus,
    ) -> anyhow::Result<Vec<DeployableConfig>> {
        let mut conn = self.connection().await?;

        let rows = sqlx::query_as::<_, DeployableConfigRow>(
            // language=PostgreSQL
            r#"
            SELECT * FROM deployable_config
            WHERE deployable_id = $1 AND environment_id = $2 AND status = $3
            ORDER BY id
            "#,
        )
        .bind(deployable_id.value() as i64)
        .bind(environment_id.value() as i64)
        .bind(status.as_str())
        .fetch_all(conn.get()?)
        .await?;

        rows.into_iter().map(DeployableConfig::try_from).collect()
    }

    #[tracing::instrument(name = "relational::deployable_config::deprecate_active", skip_all)]
    async fn deprecate_active_deployable_config(
        &self,
        deployable_id: DeployableId,
        environment_id: EnvironmentId,
    ) -> anyhow::Result<u64> {
        let mut conn = self.connection().await?;

        sqlx::query("SELECT id FROM deployable WHERE id = $1 FOR UPDATE")
            .bind(deployable_id.value() as i64)
            .fetch_optional(conn.get()?)
            .await
            .map_err(|err| map_db_error(err, "locking deployable for config"))?;

        let result = sqlx::query(
            // language=PostgreSQL
            r#"
            UPDATE deployable_config SET status = 'DEPRECATED'
            WHERE deployable_id = $1 AND environment_id = $2 AND status = 'ACTIVE'
            "#,
        )
        .bind(deployable_id.value() as i64)
        .bind(environment_id.value() as i64)
        .execute(conn.get()?)
        .await
        .map_err(|err| map_db_error(err, "deprecating deployable config"))?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(name = "relational::deployable_config::update", skip_all)]
    async fn update_deployable_config(
        &self,
        id: DeployableConfigId,
        update: &DeployableConfigUpdate,
    ) -> anyhow::Result<u64> {
        if update.is_empty() {
            return Ok(0);
        }

        let mut builder = QueryBuilder::<Postgres>::new("UPDATE deployable_config SET ");
        let mut fields = builder.separated(", ");
        if let Some(status) = update.status {
            fields.push("status = ").push_bind_unseparated(status.as_str());
        }
        builder.push(" WHERE id = ").push_bind(id.value() as i64);

        let mut conn = self.connection().await?;
        let result = builder
            .build()
            .execute(conn.get()?)
            .await
            .map_err(|err| map_db_error(err, "updating deployable config"))?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(name = "relational::deployable_config::delete", skip_all)]
    async fn delete_deployable_config(&self, id: DeployableConfigId) -> anyhow::Result<u64> {
        let mut conn = self.connection().await?;

        let result = sqlx::query("DELETE FROM deployable_config WHERE id = $1")
            .bind(id.value() as i64)
            .execute(conn.get()?)
            .await
            .map_err(|err| map_db_error(err, "deleting deployable config"))?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(name = "relational::deployable_config_value::insert", skip_all)]
    async fn insert_deployable_config_value(&self, value: &DeployableConfigValue) -> anyhow::Result<()> {
        self.insert_deployable_config_values(std::slice::from_ref(value))
            .await
    }

    #[tracing::instrument(name = "relational::deployable_config_value::insert_many", skip_all)]
    async fn insert_deployable_config_values(&self, values: &[DeployableConfigValue]) -> anyhow::Result<()> {
        if values.is_empty() {
            return Ok(());
        }

        let mut builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO deployable_config_value (deployable_config_id, name, value, created) ",
        );
        builder.push_values(values, |mut row, value| {
            row.push_bind(value.deployable_config_id.value() as i64)
                .push_bind(value.name.clone())
                .push_bind(value.value.clone())
                .push_bind(value.created);
        });

        let mut conn = self.connection().await?;
        builder
            .build()
            .execute(conn.get()?)
            .await
            .map_err(|err| map_db_error(err, "inserting deployable config values"))?;

        Ok(())
    }

    #[tracing::instrument(name = "relational::deployable_config_value::list", skip_all)]
    async fn deployable_config_values(
        &self,
        id: DeployableConfigId,
    ) -> anyhow::Result<Vec<DeployableConfigValue>> {
        let mut conn = self.connection().await?;

        let rows = sqlx::query_as::<_, DeployableConfigValueRow>(
            "SELECT * FROM deployable_config_value WHERE deployable_config_id = $1 ORDER BY name",
        )
        .bind(id.value() as i64)
        .fetch_all(conn.get()?)
        .await?;

        Ok(rows.into_iter().map(DeployableConfigValue::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::is_validation;
    use crate::persistence::relational::tests::{seed_deployable, test_store};

    #[tokio::test]
    #[ignore = "needs a postgres database"]
    async fn test_second_active_deployable_config_is_rejected() {
        let store = test_store().await;
        let (_, deployable, environments) = seed_deployable(&store, &["dev"]).await;
        let dev = &environments[0];

        let first = DeployableConfig::new_active(deployable.id, dev.id);
        store.insert_deployable_config(&first).await.unwrap();

        let second = DeployableConfig::new_active(deployable.id, dev.id);
        let err = store.insert_deployable_config(&second).await.unwrap_err();
        assert!(is_validation(&err));

        assert_eq!(store.deprecate_active_deployable_config(deployable.id, dev.id).await.unwrap(), 1);
        assert_eq!(store.deprecate_active_deployable_config(deployable.id, dev.id).await.unwrap(), 0);
        store.insert_deployable_config(&second).await.unwrap();

        let active = store
            .deployable_configs_for_status(deployable.id, dev.id, ConfigStatus::Active)
            .await
            .unwrap();
        assert_eq!(active.iter().map(|config| config.id).collect::<Vec<_>>(), vec![second.id]);
    }

    #[tokio::test]
    #[ignore = "needs a postgres database"]
    async fn test_second_active_environment_config_is_rejected() {
        let store = test_store().await;
        let (_, _, environments) = seed_deployable(&store, &["dev"]).await;
        let dev = &environments[0];

        store.insert_environment_config(&EnvironmentConfig::new_active(dev.id)).await.unwrap();

        let err = store
            .insert_environment_config(&EnvironmentConfig::new_active(dev.id))
            .await
            .unwrap_err();
        assert!(is_validation(&err));
    }

    #[tokio::test]
    #[ignore = "needs a postgres database"]
    async fn test_reinserting_config_is_a_no_op() {
        let store = test_store().await;
        let (_, deployable, environments) = seed_deployable(&store, &["dev"]).await;
        let dev = &environments[0];

        let config = DeployableConfig::new_active(deployable.id, dev.id);
        store.insert_deployable_config(&config).await.unwrap();
        store
            .insert_deployable_config_values(&[DeployableConfigValue::new(config.id, "ECS_CONFIG_CPU", "256")])
            .await
            .unwrap();

        let mut replayed = config.clone();
        replayed.status = ConfigStatus::Deprecated;
        assert_eq!(store.insert_deployable_config(&replayed).await.unwrap(), config.id);

        let fetched = store.deployable_config(config.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, ConfigStatus::Active);

        let values = store.deployable_config_values(config.id).await.unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].value, "256");
    }
}
