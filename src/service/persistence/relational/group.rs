use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shipyard_core::DeployableGroupId;
use sqlx::{Postgres, QueryBuilder};

use super::{map_db_error, RelationalStore};
use crate::models::{DeployableGroup, DeployableGroupUpdate};
use crate::persistence::DeployableGroupPersistence;

#[derive(sqlx::FromRow)]
struct DeployableGroupRow {
    id: i64,
    name: String,
    description: String,
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
}

impl From<DeployableGroupRow> for DeployableGroup {
    fn from(row: DeployableGroupRow) -> Self {
        DeployableGroup {
            id: DeployableGroupId::from_value(row.id as u64),
            name: row.name,
            description: row.description,
            created: row.created,
            modified: row.modified,
        }
    }
}

#[async_trait]
impl DeployableGroupPersistence for RelationalStore {
    #[tracing::instrument(name = "relational::group::insert", skip_all)]
    async fn insert_deployable_group(&self, group: &DeployableGroup) -> anyhow::Result<DeployableGroupId> {
        let mut conn = self.connection().await?;

        sqlx::query(
            // language=PostgreSQL
            r#"
            INSERT INTO deployable_group
               (id, name, description, created, modified)
            VALUES
               ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(group.id.value() as i64)
        .bind(&group.name)
        .bind(&group.description)
        .bind(group.created)
        .bind(group.modified)
        .execute(conn.get()?)
        .await
        .map_err(|err| map_db_error(err, "inserting deployable group"))?;

        Ok(group.id)
    }

    #[tracing::instrument(name = "relational::group::get", skip_all)]
    async fn deployable_group(&self, id: DeployableGroupId) -> anyhow::Result<Option<DeployableGroup>> {
        let mut conn = self.connection().await?;

        let row = sqlx::query_as::<_, DeployableGroupRow>("SELECT * FROM deployable_group WHERE id = $1")
            .bind(id.value() as i64)
            .fetch_optional(conn.get()?)
            .await?;

        Ok(row.map(DeployableGroup::from))
    }

    #[tracing::instrument(name = "relational::group::get_by_name", skip_all)]
    async fn deployable_group_for_name(&self, name: &str) -> anyhow::Result<Option<DeployableGroup>> {
        let mut conn = self.connection().await?;

        let row = sqlx::query_as::<_, DeployableGroupRow>("SELECT * FROM deployable_group WHERE name = $1")
            .bind(name)
            .fetch_optional(conn.get()?)
            .await?;

        Ok(row.map(DeployableGroup::from))
    }

    #[tracing::instrument(name = "relational::group::list", skip_all)]
    async fn deployable_groups(&self) -> anyhow::Result<Vec<DeployableGroup>> {
        let mut conn = self.connection().await?;

        let rows = sqlx::query_as::<_, DeployableGroupRow>("SELECT * FROM deployable_group ORDER BY id")
            .fetch_all(conn.get()?)
            .await?;

        Ok(rows.into_iter().map(DeployableGroup::from).collect())
    }

    #[tracing::instrument(name = "relational::group::update", skip_all)]
    async fn update_deployable_group(
        &self,
        id: DeployableGroupId,
        update: &DeployableGroupUpdate,
    ) -> anyhow::Result<u64> {
        if update.is_empty() {
            return Ok(0);
        }

        let mut builder = QueryBuilder::<Postgres>::new("UPDATE deployable_group SET ");
        let mut fields = builder.separated(", ");
        if let Some(name) = &update.name {
            fields.push("name = ").push_bind_unseparated(name.clone());
        }
        if let Some(description) = &update.description {
            fields
                .push("description = ")
                .push_bind_unseparated(description.clone());
        }
        fields.push("modified = now()");
        builder.push(" WHERE id = ").push_bind(id.value() as i64);

        let mut conn = self.connection().await?;
        let result = builder
            .build()
            .execute(conn.get()?)
            .await
            .map_err(|err| map_db_error(err, "updating deployable group"))?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(name = "relational::group::delete", skip_all)]
    async fn delete_deployable_group(&self, id: DeployableGroupId) -> anyhow::Result<u64> {
        let mut conn = self.connection().await?;

        let result = sqlx::query("DELETE FROM deployable_group WHERE id = $1")
            .bind(id.value() as i64)
            .execute(conn.get()?)
            .await
            .map_err(|err| map_db_error(err, "deleting deployable group"))?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::relational::tests::test_store;

    #[tokio::test]
    #[ignore = "needs a postgres database"]
    async fn test_create_get_update_delete() {
        let store = test_store().await;

        let group = DeployableGroup::new(format!("group-{}", DeployableGroupId::new()), "fixture");
        store.insert_deployable_group(&group).await.unwrap();

        let fetched = store.deployable_group(group.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, group.name);

        let by_name = store.deployable_group_for_name(&group.name).await.unwrap();
        assert_eq!(by_name.map(|group| group.id), Some(group.id));

        let update = DeployableGroupUpdate {
            description: Some("updated".to_string()),
            ..Default::default()
        };
        assert_eq!(store.update_deployable_group(group.id, &update).await.unwrap(), 1);
        assert_eq!(
            store
                .update_deployable_group(group.id, &DeployableGroupUpdate::default())
                .await
                .unwrap(),
            0
        );

        let fetched = store.deployable_group(group.id).await.unwrap().unwrap();
        assert_eq!(fetched.description, "updated");

        assert_eq!(store.delete_deployable_group(group.id).await.unwrap(), 1);
        assert!(store.deployable_group(group.id).await.unwrap().is_none());
    }
}
