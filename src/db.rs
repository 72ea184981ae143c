// 🗄️ Store - generic select / insert / update / delete over named tables
//
// The console only needs four operations from its data store. `Store` names
// them; `SqliteStore` implements them over a single rusqlite connection with
// WAL journaling. Rows travel as JSON objects so every entity shares one path.

use crate::error::StoreError;
use crate::lifecycle::SortOrder;
use chrono::{DateTime, Utc};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params, params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// One record: column name -> value.
pub type Row = Map<String, Value>;

// ============================================================================
// SCHEMA
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Real,
    Text,
    Boolean,
    /// Calendar date stored as `YYYY-MM-DD` text
    Date,
}

impl ColumnKind {
    fn sql_type(&self) -> &'static str {
        match self {
            ColumnKind::Integer | ColumnKind::Boolean => "INTEGER",
            ColumnKind::Real => "REAL",
            ColumnKind::Text | ColumnKind::Date => "TEXT",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub required: bool,
    /// Parent table; deleting the parent deletes this row.
    pub references: Option<&'static str>,
}

const fn req(name: &'static str, kind: ColumnKind) -> Column {
    Column {
        name,
        kind,
        required: true,
        references: None,
    }
}

const fn opt(name: &'static str, kind: ColumnKind) -> Column {
    Column {
        name,
        kind,
        required: false,
        references: None,
    }
}

const fn parent(name: &'static str, table: &'static str) -> Column {
    Column {
        name,
        kind: ColumnKind::Integer,
        required: true,
        references: Some(table),
    }
}

#[derive(Debug)]
pub struct TableSchema {
    pub name: &'static str,
    pub columns: &'static [Column],
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    fn create_sql(&self) -> String {
        let mut defs = vec!["\"id\" INTEGER PRIMARY KEY AUTOINCREMENT".to_string()];
        for col in self.columns {
            let mut def = format!("\"{}\" {}", col.name, col.kind.sql_type());
            if col.required {
                def.push_str(" NOT NULL");
            }
            if let Some(table) = col.references {
                def.push_str(&format!(" REFERENCES \"{}\"(\"id\") ON DELETE CASCADE", table));
            }
            defs.push(def);
        }
        format!("CREATE TABLE IF NOT EXISTS \"{}\" (\n    {}\n)", self.name, defs.join(",\n    "))
    }
}

use ColumnKind::{Boolean, Date, Integer, Real, Text};

/// Every table the console reads or writes (the audit table is separate).
pub static TABLES: &[TableSchema] = &[
    TableSchema {
        name: "employer_groups",
        columns: &[
            req("name", Text),
            opt("group_number", Text),
            opt("effective_date", Date),
            req("status", Text),
            opt("contact_email", Text),
        ],
    },
    TableSchema {
        name: "benefit_plans",
        columns: &[
            parent("group_id", "employer_groups"),
            req("name", Text),
            req("plan_type", Text),
            opt("carrier", Text),
            req("number_of_classes", Integer),
            opt("class1_contribution", Real),
            opt("class2_contribution", Real),
            opt("class3_contribution", Real),
            opt("class4_contribution", Real),
            opt("effective_date", Date),
            opt("termination_date", Date),
        ],
    },
    TableSchema {
        name: "plan_options",
        columns: &[parent("plan_id", "benefit_plans"), req("label", Text)],
    },
    TableSchema {
        name: "medicare_plans",
        columns: &[req("name", Text), opt("carrier", Text), opt("plan_code", Text)],
    },
    TableSchema {
        name: "rates",
        columns: &[
            req("owner", Text),
            req("owner_id", Integer),
            req("rate", Real),
            req("start_date", Date),
            opt("end_date", Date),
        ],
    },
    TableSchema {
        name: "participants",
        columns: &[
            parent("group_id", "employer_groups"),
            req("first_name", Text),
            req("last_name", Text),
            opt("birth_date", Date),
            opt("email", Text),
            opt("hire_date", Date),
        ],
    },
    TableSchema {
        name: "dependents",
        columns: &[
            parent("participant_id", "participants"),
            req("first_name", Text),
            req("last_name", Text),
            req("relationship", Text),
            opt("birth_date", Date),
        ],
    },
    TableSchema {
        name: "providers",
        columns: &[
            req("name", Text),
            opt("npi", Text),
            opt("specialty", Text),
            opt("phone", Text),
        ],
    },
    TableSchema {
        name: "programs",
        columns: &[
            req("name", Text),
            opt("description", Text),
            opt("start_date", Date),
            opt("end_date", Date),
        ],
    },
    TableSchema {
        name: "users",
        columns: &[
            req("email", Text),
            req("display_name", Text),
            req("role", Text),
            req("active", Boolean),
        ],
    },
];

pub fn table_schema(name: &str) -> Result<&'static TableSchema, StoreError> {
    TABLES
        .iter()
        .find(|t| t.name == name)
        .ok_or_else(|| StoreError::UnknownTable(name.to_string()))
}

// ============================================================================
// FILTER
// ============================================================================

/// Equality predicates plus an optional ordering.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub conditions: Vec<(String, Value)>,
    pub order_by: Option<(String, SortOrder)>,
}

impl Filter {
    pub fn all() -> Self {
        Filter::default()
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.conditions.push((column.to_string(), value.into()));
        self
    }

    pub fn order_by(mut self, column: &str, order: SortOrder) -> Self {
        self.order_by = Some((column.to_string(), order));
        self
    }
}

// ============================================================================
// AUDIT EVENTS
// ============================================================================

/// Event for the audit trail: every mutation and every import leaves one.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: Value,
    pub actor: String,
}

impl Event {
    pub fn new(event_type: &str, entity_type: &str, entity_id: &str, data: Value, actor: &str) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

// ============================================================================
// STORE
// ============================================================================

/// The four operations the console needs, plus the audit trail.
///
/// Errors are opaque: callers surface the message, they do not interpret it.
pub trait Store: Send + Sync {
    fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Row>, StoreError>;

    /// Insert rows, returning their new ids in input order. All or nothing.
    fn insert(&self, table: &str, rows: &[Row]) -> Result<Vec<i64>, StoreError>;

    fn update(&self, table: &str, id: i64, values: &Row) -> Result<(), StoreError>;

    fn delete(&self, table: &str, id: i64) -> Result<(), StoreError>;

    fn record_event(&self, event: &Event) -> Result<(), StoreError>;

    fn events_for(&self, entity_type: &str, entity_id: &str) -> Result<Vec<Event>, StoreError>;
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file and make sure every table exists.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        setup_database(&conn)?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Backend("database connection lock poisoned".to_string()))
    }
}

pub fn setup_database(conn: &Connection) -> Result<(), StoreError> {
    // WAL for crash recovery; in-memory databases report "memory" and keep going
    let _mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    for table in TABLES {
        conn.execute(&table.create_sql(), [])?;
    }

    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // rates.owner_id points at one of two tables, so no foreign key can cascade
    for (table, owner) in [("plan_options", "plan_option"), ("medicare_plans", "medicare_plan")] {
        conn.execute(
            &format!(
                "CREATE TRIGGER IF NOT EXISTS \"{table}_rates_cleanup\" AFTER DELETE ON \"{table}\"
                 BEGIN DELETE FROM rates WHERE owner = '{owner}' AND owner_id = OLD.id; END",
            ),
            [],
        )?;
    }

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_rates_owner ON rates(owner, owner_id, start_date)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

impl Store for SqliteStore {
    fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Row>, StoreError> {
        let schema = table_schema(table)?;

        let mut sql = format!("SELECT * FROM \"{}\"", schema.name);
        let mut values = Vec::new();
        let mut clauses = Vec::new();

        for (column, value) in &filter.conditions {
            let col = column_of(schema, column)?;
            if value.is_null() {
                clauses.push(format!("\"{}\" IS NULL", col));
            } else {
                values.push(to_sql(value));
                clauses.push(format!("\"{}\" = ?{}", col, values.len()));
            }
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        match &filter.order_by {
            Some((column, order)) => {
                let col = column_of(schema, column)?;
                let dir = match order {
                    SortOrder::Ascending => "ASC",
                    SortOrder::Descending => "DESC",
                };
                sql.push_str(&format!(" ORDER BY \"{}\" {}, \"id\" {}", col, dir, dir));
            }
            None => sql.push_str(" ORDER BY \"id\" ASC"),
        }

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let rows = stmt
            .query_map(params_from_iter(values), |row| {
                let mut out = Row::new();
                for (idx, name) in names.iter().enumerate() {
                    let kind = schema.column(name).map(|c| c.kind).unwrap_or(ColumnKind::Integer);
                    out.insert(name.clone(), from_sql(row.get_ref(idx)?, kind));
                }
                Ok(out)
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    fn insert(&self, table: &str, rows: &[Row]) -> Result<Vec<i64>, StoreError> {
        let schema = table_schema(table)?;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut ids = Vec::with_capacity(rows.len());

        for row in rows {
            let (columns, values) = assignments(schema, row)?;
            let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{}", i)).collect();
            let sql = if columns.is_empty() {
                format!("INSERT INTO \"{}\" DEFAULT VALUES", schema.name)
            } else {
                format!(
                    "INSERT INTO \"{}\" ({}) VALUES ({})",
                    schema.name,
                    columns.iter().map(|c| format!("\"{}\"", c)).collect::<Vec<_>>().join(", "),
                    placeholders.join(", ")
                )
            };
            tx.execute(&sql, params_from_iter(values))?;
            ids.push(tx.last_insert_rowid());
        }

        tx.commit()?;
        tracing::debug!(table, count = ids.len(), "inserted rows");
        Ok(ids)
    }

    fn update(&self, table: &str, id: i64, values: &Row) -> Result<(), StoreError> {
        let schema = table_schema(table)?;
        let (columns, mut params) = assignments(schema, values)?;
        if columns.is_empty() {
            return Ok(());
        }

        let sets: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, c)| format!("\"{}\" = ?{}", c, i + 1))
            .collect();
        params.push(SqlValue::Integer(id));
        let sql = format!(
            "UPDATE \"{}\" SET {} WHERE \"id\" = ?{}",
            schema.name,
            sets.join(", "),
            params.len()
        );

        let conn = self.lock()?;
        let changed = conn.execute(&sql, params_from_iter(params))?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                table: table.to_string(),
                id,
            });
        }
        tracing::debug!(table, id, "updated row");
        Ok(())
    }

    fn delete(&self, table: &str, id: i64) -> Result<(), StoreError> {
        let schema = table_schema(table)?;
        let conn = self.lock()?;
        let changed = conn.execute(&format!("DELETE FROM \"{}\" WHERE \"id\" = ?1", schema.name), [id])?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                table: table.to_string(),
                id,
            });
        }
        tracing::debug!(table, id, "deleted row");
        Ok(())
    }

    fn record_event(&self, event: &Event) -> Result<(), StoreError> {
        let data_json = serde_json::to_string(&event.data).map_err(|e| StoreError::Backend(e.to_string()))?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO events (
                event_id, timestamp, event_type, entity_type, entity_id, data, actor
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                event.event_id,
                event.timestamp.to_rfc3339(),
                event.event_type,
                event.entity_type,
                event.entity_id,
                data_json,
                event.actor,
            ],
        )?;
        Ok(())
    }

    fn events_for(&self, entity_type: &str, entity_id: &str) -> Result<Vec<Event>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
             FROM events
             WHERE entity_type = ?1 AND entity_id = ?2
             ORDER BY timestamp DESC, id DESC",
        )?;

        let raw = stmt
            .query_map(params![entity_type, entity_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(event_id, timestamp, event_type, entity_type, entity_id, data, actor)| {
                let decode = |detail: String| StoreError::Decode {
                    table: "events".to_string(),
                    detail,
                };
                Ok(Event {
                    event_id,
                    timestamp: DateTime::parse_from_rfc3339(&timestamp)
                        .map_err(|e| decode(e.to_string()))?
                        .with_timezone(&Utc),
                    event_type,
                    entity_type,
                    entity_id,
                    data: serde_json::from_str(&data).map_err(|e| decode(e.to_string()))?,
                    actor,
                })
            })
            .collect()
    }
}

// ============================================================================
// VALUE CONVERSION
// ============================================================================

fn column_of<'a>(schema: &'a TableSchema, column: &str) -> Result<&'a str, StoreError> {
    if column == "id" {
        return Ok("id");
    }
    schema
        .column(column)
        .map(|c| c.name)
        .ok_or_else(|| StoreError::UnknownColumn {
            table: schema.name.to_string(),
            column: column.to_string(),
        })
}

/// Validated column names and values for an insert/update. `id` is never written.
fn assignments(schema: &TableSchema, row: &Row) -> Result<(Vec<&'static str>, Vec<SqlValue>), StoreError> {
    let mut columns = Vec::new();
    let mut values = Vec::new();
    for (key, value) in row {
        if key == "id" {
            continue;
        }
        let col = schema.column(key).ok_or_else(|| StoreError::UnknownColumn {
            table: schema.name.to_string(),
            column: key.clone(),
        })?;
        columns.push(col.name);
        values.push(to_sql(value));
    }
    Ok((columns, values))
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or(0.0)),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn from_sql(value: ValueRef<'_>, kind: ColumnKind) -> Value {
    match (value, kind) {
        (ValueRef::Null, _) => Value::Null,
        (ValueRef::Integer(i), ColumnKind::Boolean) => Value::Bool(i != 0),
        (ValueRef::Integer(i), ColumnKind::Real) => Number::from_f64(i as f64).map(Value::Number).unwrap_or(Value::Null),
        (ValueRef::Integer(i), _) => Value::Number(i.into()),
        (ValueRef::Real(f), _) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        (ValueRef::Text(t), _) | (ValueRef::Blob(t), _) => Value::String(String::from_utf8_lossy(t).into_owned()),
    }
}

// ============================================================================
// TESTS
// ============================================================================
