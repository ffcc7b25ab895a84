//! Table-level operations behind the data routes: listing, describing,
//! paging, export, import, drop and single-row edits. Every entry point
//! goes through the access gate before touching the shared-data database.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::info;

use crate::auth::Capability;
use crate::database::dynamic::DynamicRepository;
use crate::database::identifier::{display_name_for, sanitize_table_name};
use crate::database::models::{primary_key_columns, ColumnInfo, TableMetadata, User};
use crate::database::pagination::{Page, PageRequest};
use crate::transfer::{self, ExportFile, ExportFormat, ImportFormat};

use super::metadata_service::{default_description, MetadataService, MetadataUpdate};
use super::{AccessService, ServiceError, ServiceResult};

#[derive(Debug, Serialize)]
pub struct TableDescription {
    pub metadata: TableMetadata,
    pub columns: Vec<ColumnInfo>,
    pub primary_key: Option<String>,
    pub can_edit: bool,
    pub can_export: bool,
}

/// A physical table as seen by administrators
#[derive(Debug, Serialize)]
pub struct DatabaseTable {
    pub table_name: String,
    pub display_name: String,
    pub registered: bool,
    pub is_active: bool,
}

#[derive(Debug, Serialize)]
pub struct ImportOutcome {
    pub table_name: String,
    pub rows_imported: usize,
    pub columns: Vec<String>,
    pub injected_key: bool,
    pub metadata: TableMetadata,
}

#[derive(Debug, Serialize)]
pub struct DropOutcome {
    pub table_name: String,
    pub metadata_removed: u64,
    pub grants_removed: u64,
}

pub struct TableService {
    repository: DynamicRepository,
    metadata: MetadataService,
    access: AccessService,
}

impl TableService {
    pub fn new(repository: DynamicRepository, metadata: MetadataService, access: AccessService) -> Self {
        Self { repository, metadata, access }
    }

    /// Admins see every active table; others the active tables they can view
    pub async fn list_for(&self, user: &User) -> ServiceResult<Vec<TableMetadata>> {
        if user.is_admin() {
            self.metadata.list_active().await
        } else {
            self.metadata.list_viewable(user.id).await
        }
    }

    pub async fn describe(&self, user: &User, table: &str) -> ServiceResult<TableDescription> {
        self.access.require(user, table, Capability::View).await?;
        let table = self.repository.introspector().resolve_table(table).await?;

        let metadata = self.metadata.ensure(&table).await?;
        let columns = self.repository.introspector().get_columns(&table).await?;
        let primary_key = primary_key_columns(&columns).first().map(|k| k.to_string());

        Ok(TableDescription {
            can_edit: self.access.authorize(user, &table, Capability::Edit).await?,
            can_export: self.access.authorize(user, &table, Capability::Export).await?,
            metadata,
            columns: columns.as_ref().clone(),
            primary_key,
        })
    }

    pub async fn fetch_data(&self, user: &User, table: &str, request: &PageRequest) -> ServiceResult<Page> {
        self.access.require(user, table, Capability::View).await?;
        Ok(self.repository.fetch_page(table, request).await?)
    }

    pub async fn export(&self, user: &User, table: &str, format: &str) -> ServiceResult<ExportFile> {
        let format = ExportFormat::parse(format)?;
        self.access.require(user, table, Capability::Export).await?;

        let table = sanitize_table_name(table);
        let dump = self.repository.fetch_all(&table).await?;
        let headers: Vec<String> = dump.columns.iter().map(|c| c.name.clone()).collect();

        let file = transfer::render(format, &table, &headers, &dump.rows)?;
        info!("Exported {} rows from {} as {}", dump.rows.len(), table, file.filename);
        Ok(file)
    }

    /// Every physical table with its registration state
    pub async fn database_tables(&self) -> ServiceResult<Vec<DatabaseTable>> {
        let registered = self.metadata.list_all().await?;
        let tables = self.repository.introspector().list_all_tables().await?;

        Ok(tables
            .into_iter()
            .map(|table_name| match registered.iter().find(|m| m.table_name == table_name) {
                Some(m) => DatabaseTable {
                    display_name: m.display_name.clone(),
                    registered: true,
                    is_active: m.is_active,
                    table_name,
                },
                None => DatabaseTable {
                    display_name: display_name_for(&table_name),
                    registered: false,
                    is_active: false,
                    table_name,
                },
            })
            .collect())
    }

    pub async fn list_metadata(&self) -> ServiceResult<Vec<TableMetadata>> {
        self.metadata.list_all().await
    }

    /// Create metadata for an existing physical table, or merge into the stored row
    pub async fn register(&self, input: &MetadataUpdate) -> ServiceResult<TableMetadata> {
        let table = input
            .table_name
            .as_deref()
            .map(sanitize_table_name)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ServiceError::BadRequest("table_name is required".to_string()))?;

        if !self.repository.introspector().table_exists(&table).await? {
            return Err(ServiceError::BadRequest(format!("Table '{}' does not exist in the database", table)));
        }

        // Re-registering keeps stored values for fields the request leaves out
        if self.metadata.find(&table).await?.is_some() {
            return self.metadata.update(&table, input).await;
        }

        let display_name = input
            .display_name
            .clone()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| display_name_for(&table));
        let description = input.description.clone().unwrap_or_else(|| default_description(&display_name));

        let metadata = self.metadata.upsert(&table, &display_name, Some(&description)).await?;
        match input.is_active {
            Some(is_active) if is_active != metadata.is_active => self.metadata.update(&table, input).await,
            _ => Ok(metadata),
        }
    }

    pub async fn update_metadata(&self, table: &str, input: &MetadataUpdate) -> ServiceResult<TableMetadata> {
        self.metadata.update(&sanitize_table_name(table), input).await
    }

    /// Drop the physical table, its metadata and every grant naming it
    pub async fn drop_table(&self, table: &str) -> ServiceResult<DropOutcome> {
        let table = self.repository.drop_table(table).await?;
        let metadata_removed = self.metadata.delete(&table).await?;
        let grants_removed = self.access.delete_for_table(&table).await?;

        info!("Dropped {} ({} grants removed)", table, grants_removed);
        Ok(DropOutcome { table_name: table, metadata_removed, grants_removed })
    }

    /// Load a CSV or spreadsheet into a new table
    pub async fn import_file(&self, table_name: &str, filename: &str, bytes: Vec<u8>) -> ServiceResult<ImportOutcome> {
        let table = sanitize_table_name(table_name);
        if table.is_empty() {
            return Err(ServiceError::BadRequest("table_name is required".to_string()));
        }
        if self.repository.introspector().table_exists(&table).await? {
            return Err(ServiceError::BadRequest(format!("Table '{}' already exists", table)));
        }

        let data = ImportFormat::from_filename(filename)?.parse(bytes)?;
        let rows_imported = self.repository.create_and_load(&table, &data.headers, &data.rows).await?;

        let display_name = display_name_for(&table);
        let description = format!("Imported from file: {}", filename);
        let metadata = self.metadata.upsert(&table, &display_name, Some(&description)).await?;

        Ok(ImportOutcome {
            table_name: table,
            rows_imported,
            columns: data.headers,
            injected_key: true,
            metadata,
        })
    }

    /// Run a single CREATE TABLE statement and register default metadata
    pub async fn import_sql(&self, statement: &str) -> ServiceResult<ImportOutcome> {
        if statement.trim().is_empty() {
            return Err(ServiceError::BadRequest("sql_statement is required".to_string()));
        }
        let parsed = crate::database::query_builder::create_table_from_sql(statement)?;
        if self.repository.introspector().table_exists(&parsed.table_name).await? {
            return Err(ServiceError::BadRequest(format!("Table '{}' already exists", parsed.table_name)));
        }

        let created = self.repository.create_table_from_sql(statement).await?;
        let metadata = self.metadata.ensure(&created.table_name).await?;
        let columns = self
            .repository
            .introspector()
            .get_columns(&created.table_name)
            .await?
            .iter()
            .map(|c| c.name.clone())
            .collect();

        Ok(ImportOutcome {
            table_name: created.table_name,
            rows_imported: 0,
            columns,
            injected_key: created.injected_key,
            metadata,
        })
    }

    pub async fn insert_row(&self, user: &User, table: &str, payload: &Map<String, Value>) -> ServiceResult<i64> {
        self.access.require(user, table, Capability::Edit).await?;
        require_payload(payload)?;
        Ok(self.repository.insert_row(table, payload).await?)
    }

    pub async fn update_row(
        &self,
        user: &User,
        table: &str,
        primary_key: &str,
        row_id: &str,
        payload: &Map<String, Value>,
    ) -> ServiceResult<u64> {
        self.access.require(user, table, Capability::Edit).await?;
        require_payload(payload)?;
        match self.repository.update_row(table, primary_key, row_id, payload).await? {
            0 => Err(ServiceError::NotFound(format!("Row {} not found", row_id))),
            n => Ok(n),
        }
    }

    pub async fn delete_row(&self, user: &User, table: &str, primary_key: &str, row_id: &str) -> ServiceResult<u64> {
        self.access.require(user, table, Capability::Edit).await?;
        match self.repository.delete_row(table, primary_key, row_id).await? {
            0 => Err(ServiceError::NotFound(format!("Row {} not found", row_id))),
            n => Ok(n),
        }
    }
}

fn require_payload(payload: &Map<String, Value>) -> ServiceResult<()> {
    if payload.is_empty() {
        Err(ServiceError::BadRequest("Request body must contain column values".to_string()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::manager::DatabaseError;
    use crate::services::GrantRequest;
    use crate::testing::TestContext;
    use serde_json::json;

    const PEOPLE_CSV: &[u8] = b"name,age\nAnn,31\nBob,\nCid,7\n";

    #[tokio::test]
    async fn csv_import_then_export_round_trips() {
        let ctx = TestContext::new().await.unwrap();
        let admin = ctx.admin().await.unwrap();
        let tables = ctx.state.tables();

        let outcome = tables.import_file("people", "people.csv", PEOPLE_CSV.to_vec()).await.unwrap();
        assert_eq!(outcome.rows_imported, 3);
        assert_eq!(outcome.metadata.description.as_deref(), Some("Imported from file: people.csv"));

        let columns = ctx.state.introspector().get_columns("people").await.unwrap();
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "age"]);

        let bob: Option<String> = sqlx::query_scalar("SELECT age FROM people WHERE id = 2")
            .fetch_one(ctx.state.db.datashare_pool())
            .await
            .unwrap();
        assert!(bob.is_none());

        let file = tables.export(&admin, "people", "csv").await.unwrap();
        let text = String::from_utf8(file.bytes[3..].to_vec()).unwrap();
        assert_eq!(text, "id,name,age\n1,Ann,31\n2,Bob,\n3,Cid,7\n");
        assert!(file.filename.starts_with("people_") && file.filename.ends_with(".csv"));
    }

    #[tokio::test]
    async fn import_keeps_blank_rows_as_nulls() {
        let ctx = TestContext::new().await.unwrap();
        let outcome = ctx
            .state
            .tables()
            .import_file("sparse", "sparse.csv", b"name,age\n,\nAnn,3\n".to_vec())
            .await
            .unwrap();
        assert_eq!(outcome.rows_imported, 2);

        let blank: (Option<String>, Option<String>) = sqlx::query_as("SELECT name, age FROM sparse WHERE id = 1")
            .fetch_one(ctx.state.db.datashare_pool())
            .await
            .unwrap();
        assert_eq!(blank, (None, None));
    }

    #[tokio::test]
    async fn import_rejects_existing_table_and_bad_type() {
        let ctx = TestContext::new().await.unwrap();
        let tables = ctx.state.tables();
        tables.import_file("people", "people.csv", PEOPLE_CSV.to_vec()).await.unwrap();

        assert!(matches!(
            tables.import_file("people", "people.csv", PEOPLE_CSV.to_vec()).await,
            Err(ServiceError::BadRequest(_))
        ));
        assert!(matches!(
            tables.import_file("other", "people.txt", PEOPLE_CSV.to_vec()).await,
            Err(ServiceError::Transfer(_))
        ));
    }

    #[tokio::test]
    async fn sql_import_injects_key() {
        let ctx = TestContext::new().await.unwrap();
        let tables = ctx.state.tables();
        let outcome = tables.import_sql("CREATE TABLE notes (body TEXT, author TEXT);").await.unwrap();
        assert!(outcome.injected_key);
        assert_eq!(outcome.columns, vec!["id", "body", "author"]);
        assert_eq!(outcome.metadata.display_name, "Notes");

        assert!(matches!(
            tables.import_sql("CREATE TABLE notes (x TEXT)").await,
            Err(ServiceError::BadRequest(_))
        ));
        assert!(matches!(
            tables.import_sql("DROP TABLE notes").await,
            Err(ServiceError::Database(DatabaseError::InvalidRequest(_)))
        ));
    }

    #[tokio::test]
    async fn view_grant_reads_but_cannot_edit() {
        let ctx = TestContext::new().await.unwrap();
        ctx.create_table("CREATE TABLE orders (id INTEGER PRIMARY KEY AUTOINCREMENT, item TEXT)").await.unwrap();
        let member = ctx.create_user("member", "user").await.unwrap();
        ctx.state
            .access()
            .grant(&GrantRequest {
                user_id: Some(member.id),
                table_name: Some("orders".to_string()),
                can_view: Some(true),
                can_edit: Some(false),
                can_export: Some(false),
                ..Default::default()
            })
            .await
            .unwrap();

        let tables = ctx.state.tables();
        let request = PageRequest::new(None, None, 10, 100);
        assert!(tables.fetch_data(&member, "orders", &request).await.is_ok());

        let description = tables.describe(&member, "orders").await.unwrap();
        assert!(!description.can_edit);
        assert_eq!(description.primary_key.as_deref(), Some("id"));

        let payload = json!({"item": "pen"}).as_object().cloned().unwrap();
        assert!(matches!(tables.insert_row(&member, "orders", &payload).await, Err(ServiceError::Forbidden(_))));
        assert!(matches!(
            tables.update_row(&member, "orders", "id", "1", &payload).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(tables.delete_row(&member, "orders", "id", "1").await, Err(ServiceError::Forbidden(_))));
        assert!(matches!(tables.export(&member, "orders", "csv").await, Err(ServiceError::Forbidden(_))));
    }

    #[tokio::test]
    async fn row_edits_report_missing_rows() {
        let ctx = TestContext::new().await.unwrap();
        ctx.create_table("CREATE TABLE orders (id INTEGER PRIMARY KEY AUTOINCREMENT, item TEXT)").await.unwrap();
        let admin = ctx.admin().await.unwrap();
        let tables = ctx.state.tables();

        let payload = json!({"item": "pen"}).as_object().cloned().unwrap();
        let id = tables.insert_row(&admin, "orders", &payload).await.unwrap();
        assert_eq!(id, 1);

        assert!(matches!(
            tables.update_row(&admin, "orders", "id", "42", &payload).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            tables.insert_row(&admin, "orders", &Map::new()).await,
            Err(ServiceError::BadRequest(_))
        ));
        tables.delete_row(&admin, "orders", "id", "1").await.unwrap();
        assert!(matches!(
            tables.delete_row(&admin, "orders", "id", "1").await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn drop_removes_metadata_and_grants() {
        let ctx = TestContext::new().await.unwrap();
        ctx.create_table("CREATE TABLE orders (id INTEGER PRIMARY KEY, item TEXT)").await.unwrap();
        let member = ctx.create_user("member", "user").await.unwrap();
        ctx.state
            .access()
            .grant(&GrantRequest {
                user_id: Some(member.id),
                table_name: Some("orders".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        ctx.state.metadata().ensure("orders").await.unwrap();

        let outcome = ctx.state.tables().drop_table("orders").await.unwrap();
        assert_eq!(outcome.metadata_removed, 1);
        assert_eq!(outcome.grants_removed, 1);
        assert!(ctx.state.metadata().find("orders").await.unwrap().is_none());
        assert!(ctx.state.access().list().await.unwrap().is_empty());
        assert!(!ctx.state.introspector().table_exists("orders").await.unwrap());
    }

    #[tokio::test]
    async fn register_again_keeps_custom_fields_and_reactivates() {
        let ctx = TestContext::new().await.unwrap();
        ctx.create_table("CREATE TABLE orders (id INTEGER PRIMARY KEY, item TEXT)").await.unwrap();
        let tables = ctx.state.tables();

        let first = tables
            .register(&MetadataUpdate {
                table_name: Some("orders".to_string()),
                display_name: Some("Sales Orders".to_string()),
                description: Some("Custom".to_string()),
                is_active: Some(false),
            })
            .await
            .unwrap();
        assert!(!first.is_active);
        assert_eq!(first.display_name, "Sales Orders");

        let again = tables
            .register(&MetadataUpdate {
                table_name: Some("orders".to_string()),
                is_active: Some(true),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(again.display_name, "Sales Orders");
        assert_eq!(again.description.as_deref(), Some("Custom"));
        assert!(again.is_active);
    }

    #[tokio::test]
    async fn listing_follows_the_oldest_duplicate_grant() {
        let ctx = TestContext::new().await.unwrap();
        ctx.create_table("CREATE TABLE orders (id INTEGER PRIMARY KEY, item TEXT)").await.unwrap();
        ctx.state.metadata().ensure("orders").await.unwrap();
        let member = ctx.create_user("member", "user").await.unwrap();

        for can_view in [false, true] {
            sqlx::query("INSERT INTO table_access (user_id, table_name, can_view, can_edit, can_export) VALUES (?, 'orders', ?, 0, 0)")
                .bind(member.id)
                .bind(can_view)
                .execute(ctx.state.db.main_pool())
                .await
                .unwrap();
        }

        let tables = ctx.state.tables();
        assert!(tables.list_for(&member).await.unwrap().is_empty());
        let request = PageRequest::new(None, None, 10, 100);
        assert!(matches!(
            tables.fetch_data(&member, "orders", &request).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(ctx
            .state
            .access()
            .granted_tables(&member, Capability::View)
            .await
            .unwrap()
            .is_empty());
    }
}
