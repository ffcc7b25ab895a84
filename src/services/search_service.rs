use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::auth::Capability;
use crate::database::dynamic::{row_key, DynamicRepository};
use crate::database::identifier::display_name_for;
use crate::database::models::User;
use crate::filter::FilterWhere;

use super::metadata_service::{default_description, METADATA_TABLE};
use super::{AccessService, MetadataService, ServiceResult};

/// Rows returned per table in a global search
pub const MAX_HITS_PER_TABLE: i64 = 5;

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: Value,
    pub all_data: Map<String, Value>,
    pub matched_columns: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableSearchResult {
    pub table_name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub count: usize,
    pub results: Vec<SearchHit>,
}

/// Which tables a global search may visit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    /// Tables the caller can view
    Accessible,
    /// Every table in the shared-data database
    All,
}

fn searchable_table(name: &str) -> bool {
    name != METADATA_TABLE && !name.starts_with('_')
}

pub struct SearchService {
    repository: DynamicRepository,
    metadata: MetadataService,
    access: AccessService,
}

impl SearchService {
    pub fn new(repository: DynamicRepository, metadata: MetadataService, access: AccessService) -> Self {
        Self { repository, metadata, access }
    }

    async fn candidate_tables(&self, user: &User, scope: SearchScope) -> ServiceResult<Vec<String>> {
        let all = self.repository.introspector().list_all_tables().await?;
        if scope == SearchScope::All || user.is_admin() {
            return Ok(all);
        }
        let granted = self.access.granted_tables(user, Capability::View).await?;
        Ok(all.into_iter().filter(|t| granted.contains(t)).collect())
    }

    /// Up to five matching rows from each candidate table; tables without
    /// matches are left out and per-table failures are skipped.
    pub async fn search(&self, user: &User, term: &str, scope: SearchScope) -> ServiceResult<Vec<TableSearchResult>> {
        let term = term.trim();
        if term.is_empty() {
            return Ok(vec![]);
        }

        let mut results = Vec::new();
        for table in self.candidate_tables(user, scope).await? {
            if !searchable_table(&table) {
                continue;
            }

            let (columns, rows) = match self.repository.search_rows(&table, term, MAX_HITS_PER_TABLE).await {
                Ok(Some(found)) => found,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Search in {} failed: {}", table, e);
                    continue;
                }
            };
            if rows.is_empty() {
                continue;
            }

            let needle = term.to_lowercase();
            let searchable = FilterWhere::searchable_columns(&columns);
            let hits: Vec<SearchHit> = rows
                .into_iter()
                .map(|row| {
                    let matched_columns = searchable
                        .iter()
                        .filter(|c| cell_matches(row.get(&c.name), &needle))
                        .map(|c| c.name.clone())
                        .collect();
                    SearchHit {
                        id: row_key(&columns, &row),
                        all_data: row,
                        matched_columns,
                    }
                })
                .collect();

            let (display_name, description) = match self.metadata.find(&table).await? {
                Some(m) => (m.display_name, m.description),
                None => {
                    let display = display_name_for(&table);
                    let description = default_description(&display);
                    (display, Some(description))
                }
            };

            debug!("Search matched {} rows in {}", hits.len(), table);
            results.push(TableSearchResult {
                table_name: table,
                display_name,
                description,
                count: hits.len(),
                results: hits,
            });
        }
        Ok(results)
    }
}

fn cell_matches(value: Option<&Value>, needle: &str) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => s.to_lowercase().contains(needle),
        Some(other) => other.to_string().to_lowercase().contains(needle),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::GrantRequest;
    use crate::testing::TestContext;

    async fn seeded() -> TestContext {
        let ctx = TestContext::new().await.unwrap();
        ctx.create_table("CREATE TABLE cities (id INTEGER PRIMARY KEY, name TEXT, country TEXT)").await.unwrap();
        ctx.create_table("CREATE TABLE _private (id INTEGER PRIMARY KEY, note TEXT)").await.unwrap();
        ctx.create_table("CREATE TABLE keys_only (id INTEGER PRIMARY KEY)").await.unwrap();
        let pool = ctx.state.db.datashare_pool();
        for i in 0..8 {
            sqlx::query("INSERT INTO cities (name, country) VALUES (?, 'Norway')")
                .bind(format!("Oslo {}", i))
                .execute(pool)
                .await
                .unwrap();
        }
        sqlx::query("INSERT INTO _private (note) VALUES ('oslo secret')").execute(pool).await.unwrap();
        ctx
    }

    #[tokio::test]
    async fn caps_hits_and_skips_private_tables() {
        let ctx = seeded().await;
        let admin = ctx.admin().await.unwrap();

        let results = ctx.state.search().search(&admin, "oslo", SearchScope::All).await.unwrap();
        assert_eq!(results.len(), 1);
        let cities = &results[0];
        assert_eq!(cities.table_name, "cities");
        assert_eq!(cities.display_name, "Cities");
        assert_eq!(cities.results.len(), MAX_HITS_PER_TABLE as usize);
        assert_eq!(cities.results[0].matched_columns, vec!["name"]);
        assert!(cities.results[0].all_data.contains_key("country"));

        assert!(ctx.state.search().search(&admin, "  ", SearchScope::All).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn accessible_scope_follows_view_grants() {
        let ctx = seeded().await;
        let member = ctx.create_user("member", "user").await.unwrap();
        let search = ctx.state.search();

        assert!(search.search(&member, "oslo", SearchScope::Accessible).await.unwrap().is_empty());

        ctx.state
            .access()
            .grant(&GrantRequest {
                user_id: Some(member.id),
                table_name: Some("cities".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        let results = search.search(&member, "norway", SearchScope::Accessible).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].results[0].matched_columns, vec!["country"]);
    }
}
