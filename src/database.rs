//! MySQL connector: schema introspection and raw query execution.
//!
//! Everything here is a thin pass-through to sqlx. Generated SQL is executed
//! exactly as received and any driver error propagates to the caller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Column, Row, TypeInfo};
use thiserror::Error;
use tracing::{debug, info};

/// Number of example rows appended to each table in [`Database::table_info`].
const SAMPLE_ROWS: usize = 3;
/// Per-value cap on sample rows in the schema description.
const SAMPLE_VALUE_CHARS: usize = 100;
/// Per-value cap on query results handed to the model.
const RESULT_VALUE_CHARS: usize = 300;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("invalid port '{0}'")]
    InvalidPort(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// The five connection fields from the settings sidebar.
///
/// `port` stays textual until [`ConnectionSettings::connect_options`] so that
/// a typo is reported as a bad request rather than rejected by the JSON layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    pub host: String,
    pub port: String,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl ConnectionSettings {
    pub fn connect_options(&self) -> Result<MySqlConnectOptions, DatabaseError> {
        let port: u16 = self
            .port
            .trim()
            .parse()
            .map_err(|_| DatabaseError::InvalidPort(self.port.clone()))?;

        Ok(MySqlConnectOptions::new()
            .host(self.host.trim())
            .port(port)
            .username(&self.user)
            .password(&self.password)
            .database(self.database.trim()))
    }
}

/// A handle able to describe its schema and run arbitrary SQL.
#[async_trait]
pub trait Database: Send + Sync {
    /// DDL plus a few sample rows for every table in the connected schema.
    async fn table_info(&self) -> Result<String, DatabaseError>;

    /// Execute `sql` verbatim and render the result set as text.
    async fn run(&self, sql: &str) -> Result<String, DatabaseError>;
}

pub struct MySqlDatabase {
    db: MySqlPool,
}

impl MySqlDatabase {
    pub async fn connect(settings: &ConnectionSettings) -> Result<Self, DatabaseError> {
        let options = settings.connect_options()?;
        let pool = MySqlPoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        info!(
            host = %settings.host,
            port = %settings.port,
            database = %settings.database,
            "connected to MySQL"
        );

        Ok(MySqlDatabase { db: pool })
    }

    async fn table_names(&self) -> Result<Vec<String>, DatabaseError> {
        let rows = sqlx::raw_sql("SHOW TABLES").fetch_all(&self.db).await?;

        let mut names = Vec::with_capacity(rows.len());
        for row in rows {
            names.push(row.try_get_unchecked::<String, _>(0)?);
        }
        names.sort();

        Ok(names)
    }

    async fn column_names(&self, table_name: &str) -> Result<Vec<String>, DatabaseError> {
        let columns_query = "SELECT column_name FROM information_schema.columns \
             WHERE table_schema = DATABASE() AND table_name = ? \
             ORDER BY ordinal_position";
        let rows = sqlx::query(columns_query)
            .bind(table_name)
            .fetch_all(&self.db)
            .await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            columns.push(row.try_get_unchecked::<String, _>(0)?);
        }

        Ok(columns)
    }

    async fn describe_table(&self, table_name: &str) -> Result<String, DatabaseError> {
        let ident = quote_ident(table_name);

        let create_query = format!("SHOW CREATE TABLE {ident}");
        let create_row = sqlx::raw_sql(&create_query).fetch_one(&self.db).await?;
        let ddl: String = create_row.try_get_unchecked(1)?;

        let columns = self.column_names(table_name).await?;

        let sample_query = format!("SELECT * FROM {ident} LIMIT {SAMPLE_ROWS}");
        let samples = sqlx::raw_sql(&sample_query).fetch_all(&self.db).await?;
        let samples = samples.iter().map(row_cells).collect::<Result<Vec<_>, _>>()?;

        Ok(format!(
            "{ddl}\n\n{}",
            sample_block(table_name, &columns, &samples)
        ))
    }
}

#[async_trait]
impl Database for MySqlDatabase {
    async fn table_info(&self) -> Result<String, DatabaseError> {
        let mut tables_info = Vec::new();

        for table_name in self.table_names().await? {
            tables_info.push(self.describe_table(&table_name).await?);
        }

        Ok(tables_info.join("\n\n"))
    }

    async fn run(&self, sql: &str) -> Result<String, DatabaseError> {
        debug!(sql, "executing generated query");

        // raw_sql goes over the text protocol, so every column decodes as text.
        let rows = sqlx::raw_sql(sql).fetch_all(&self.db).await?;
        let rows = rows.iter().map(row_cells).collect::<Result<Vec<_>, _>>()?;

        Ok(render_rows(&rows))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Cell {
    Null,
    Number(String),
    Text(String),
}

impl Cell {
    /// Classify a raw text-protocol value by its column type.
    fn decode(type_name: &str, raw: Option<&[u8]>) -> Cell {
        match raw {
            None => Cell::Null,
            Some(bytes) => {
                let text = String::from_utf8_lossy(bytes).into_owned();
                if is_numeric(type_name) {
                    Cell::Number(text)
                } else {
                    Cell::Text(text)
                }
            }
        }
    }

    fn truncated(&self, max_chars: usize, suffix: &str) -> Cell {
        match self {
            Cell::Null => Cell::Null,
            Cell::Number(v) => Cell::Number(truncate(v, max_chars, suffix)),
            Cell::Text(v) => Cell::Text(truncate(v, max_chars, suffix)),
        }
    }
}

fn row_cells(row: &MySqlRow) -> Result<Vec<Cell>, DatabaseError> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(index, column)| -> Result<Cell, DatabaseError> {
            // A decode error here means the driver could not hand back raw bytes,
            // which is distinct from a SQL NULL.
            let raw = row.try_get_unchecked::<Option<Vec<u8>>, _>(index)?;
            Ok(Cell::decode(column.type_info().name(), raw.as_deref()))
        })
        .collect()
}

/// Render a result set as a list of tuples, e.g. `[(1, 'Alice'), (2, None)]`.
///
/// Values longer than [`RESULT_VALUE_CHARS`] are cut at a word boundary and
/// suffixed with `...`. An empty result set renders as the empty string.
pub(crate) fn render_rows(rows: &[Vec<Cell>]) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let tuples: Vec<String> = rows
        .iter()
        .map(|row| {
            let values: Vec<Cell> = row
                .iter()
                .map(|c| c.truncated(RESULT_VALUE_CHARS, "..."))
                .collect();
            render_tuple(&values)
        })
        .collect();

    format!("[{}]", tuples.join(", "))
}

/// The comment block appended to each table's DDL. The column header is
/// always present, even for an empty table.
pub(crate) fn sample_block(table_name: &str, columns: &[String], rows: &[Vec<Cell>]) -> String {
    let mut out = format!(
        "/*\n{SAMPLE_ROWS} rows from {table_name} table:\n{}\n",
        columns.join("\t")
    );

    for row in rows {
        let line = row
            .iter()
            .map(|c| match c.truncated(SAMPLE_VALUE_CHARS, "") {
                Cell::Null => "None".to_owned(),
                Cell::Number(v) | Cell::Text(v) => v,
            })
            .collect::<Vec<_>>()
            .join("\t");
        out.push_str(&line);
        out.push('\n');
    }

    out.push_str("*/");
    out
}

pub(crate) fn render_tuple(values: &[Cell]) -> String {
    let rendered: Vec<String> = values
        .iter()
        .map(|v| match v {
            Cell::Null => "None".to_owned(),
            Cell::Number(n) => n.clone(),
            Cell::Text(t) => format!("'{}'", t.replace('\\', "\\\\").replace('\'', "\\'")),
        })
        .collect();

    if rendered.len() == 1 {
        format!("({},)", rendered[0])
    } else {
        format!("({})", rendered.join(", "))
    }
}

/// Cut `value` to at most `max_chars` characters. With a suffix, the cut
/// backs off to the last space so words stay whole.
fn truncate(value: &str, max_chars: usize, suffix: &str) -> String {
    if value.chars().count() <= max_chars {
        return value.to_owned();
    }
    if suffix.is_empty() {
        return value.chars().take(max_chars).collect();
    }

    let keep = max_chars.saturating_sub(suffix.chars().count());
    let head: String = value.chars().take(keep).collect();
    let head = match head.rfind(' ') {
        Some(space) => &head[..space],
        None => head.as_str(),
    };
    format!("{head}{suffix}")
}

fn is_numeric(type_name: &str) -> bool {
    const NUMERIC: [&str; 11] = [
        "TINYINT", "SMALLINT", "MEDIUMINT", "INT", "BIGINT", "FLOAT", "DOUBLE", "DECIMAL",
        "BOOLEAN", "YEAR", "BIT",
    ];
    let base = type_name.split_whitespace().next().unwrap_or_default();
    NUMERIC.contains(&base)
}

fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}
