use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use export_config::shared::{EXPORT_SOURCE_OPTIONS, IntoConnectOptions, SourceConnectionConfig};
use futures::{Stream, stream};
use serde_json::Value;
use sqlx::mysql::{MySqlArguments, MySqlColumn, MySqlPoolOptions, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, Decode, MySql, MySqlPool, Row as _, Type, TypeInfo};
use tracing::{debug, info};

use crate::conversions::hex::encode_hex;
use crate::conversions::temporal::raw_temporal_value;
use crate::error::ExportResult;
use crate::source::{QueryParam, Source, SourceQuery, quote_identifier};
use crate::types::Row;

/// Format used for `DATETIME` columns, which carry no time zone.
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format used for `DATE` columns.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// [`Source`] backed by a MySQL connection pool.
#[derive(Debug, Clone)]
pub struct MySqlSource {
    pool: MySqlPool,
}

impl MySqlSource {
    /// Connects to the configured database.
    ///
    /// The pool size bounds how many table loads run at the same time.
    pub async fn connect(config: &SourceConnectionConfig) -> ExportResult<Self> {
        let options = config.with_db(Some(&EXPORT_SOURCE_OPTIONS));

        let pool = MySqlPoolOptions::new()
            .min_connections(1)
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        info!(
            host = %config.host,
            database = %config.name,
            max_connections = config.max_connections,
            "connected to source database"
        );

        Ok(Self { pool })
    }

    /// Wraps an existing pool.
    pub fn from_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Closes every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl Source for MySqlSource {
    async fn query(&self, query: &SourceQuery) -> ExportResult<Vec<Row>> {
        if let SourceQuery::ScopedRows { entity_ids, .. } = query
            && entity_ids.is_empty()
        {
            return Ok(vec![]);
        }

        let sql = query.sql();
        let params = query.params();

        let rows = bind_params(sqlx::query(&sql), &params)
            .fetch_all(&self.pool)
            .await?;

        debug!(
            table = query.table_name(),
            rows = rows.len(),
            "source query completed"
        );

        rows.iter().map(row_to_json).collect()
    }

    fn scan_table(
        &self,
        table: &'static str,
        batch_size: usize,
    ) -> impl Stream<Item = ExportResult<Vec<Row>>> + Send + '_ {
        let sql = format!(
            "SELECT * FROM {} ORDER BY 1 LIMIT ? OFFSET ?",
            quote_identifier(table)
        );
        let batch_size = batch_size.max(1);

        stream::try_unfold(ScanState::default(), move |state| {
            fetch_page(self.pool.clone(), table, sql.clone(), batch_size, state)
        })
    }
}

/// Fetches the page starting at `state.offset`, returning [`None`] once the table is exhausted.
async fn fetch_page(
    pool: MySqlPool,
    table: &'static str,
    sql: String,
    batch_size: usize,
    state: ScanState,
) -> ExportResult<Option<(Vec<Row>, ScanState)>> {
    if state.exhausted {
        return Ok(None);
    }

    let rows = sqlx::query(&sql)
        .bind(batch_size as u64)
        .bind(state.offset)
        .fetch_all(&pool)
        .await?;

    if rows.is_empty() {
        return Ok(None);
    }

    debug!(
        table,
        offset = state.offset,
        rows = rows.len(),
        "scanned source page"
    );

    let next = ScanState {
        offset: state.offset + rows.len() as u64,
        exhausted: rows.len() < batch_size,
    };
    let page = rows
        .iter()
        .map(row_to_json)
        .collect::<ExportResult<Vec<_>>>()?;

    Ok(Some((page, next)))
}

#[derive(Debug, Clone, Copy, Default)]
struct ScanState {
    offset: u64,
    exhausted: bool,
}

fn bind_params<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    params: &[QueryParam],
) -> Query<'q, MySql, MySqlArguments> {
    for param in params {
        query = match param {
            QueryParam::UInt(value) => query.bind(*value),
            QueryParam::Text(value) => query.bind(value.clone()),
        };
    }

    query
}

/// Converts a MySQL row into a JSON object keyed by column name.
fn row_to_json(row: &MySqlRow) -> ExportResult<Row> {
    let mut json = Row::with_capacity(row.columns().len());
    for column in row.columns() {
        json.insert(column.name().to_string(), decode_column(row, column)?);
    }

    Ok(json)
}

/// Decodes one column according to its MySQL type.
///
/// Decimals are rendered as strings to keep their precision, binary columns as `\x` hex and
/// unknown types as text when possible.
fn decode_column(row: &MySqlRow, column: &MySqlColumn) -> ExportResult<Value> {
    let index = column.ordinal();
    let type_name = column.type_info().name();

    let value = match type_name {
        "NULL" => None,
        "BOOLEAN" => row.try_get::<Option<bool>, _>(index)?.map(Value::from),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            row.try_get::<Option<i64>, _>(index)?.map(Value::from)
        }
        name if name.ends_with("UNSIGNED") => {
            row.try_get::<Option<u64>, _>(index)?.map(Value::from)
        }
        "YEAR" => row.try_get::<Option<u16>, _>(index)?.map(Value::from),
        "FLOAT" => row
            .try_get::<Option<f32>, _>(index)?
            .map(|value| Value::from(f64::from(value))),
        "DOUBLE" => row.try_get::<Option<f64>, _>(index)?.map(Value::from),
        "DECIMAL" => row
            .try_get::<Option<BigDecimal>, _>(index)?
            .map(|value| Value::String(value.to_string())),
        "DATE" => decode_temporal(row, column, |value: NaiveDate| {
            value.format(DATE_FORMAT).to_string()
        }),
        "TIME" => decode_temporal(row, column, |value: NaiveTime| value.to_string()),
        "DATETIME" => decode_temporal(row, column, |value: NaiveDateTime| {
            value.format(DATETIME_FORMAT).to_string()
        }),
        "TIMESTAMP" => decode_temporal(row, column, |value: DateTime<Utc>| value.to_rfc3339()),
        "JSON" => row.try_get::<Option<Value>, _>(index)?,
        "BINARY" | "VARBINARY" | "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT" => row
            .try_get::<Option<Vec<u8>>, _>(index)?
            .map(|value| Value::String(encode_hex(&value))),
        _ => match row.try_get::<Option<String>, _>(index) {
            Ok(value) => value.map(Value::String),
            Err(_) => row
                .try_get::<Option<Vec<u8>>, _>(index)
                .ok()
                .flatten()
                .map(|value| Value::String(encode_hex(&value))),
        },
    };

    Ok(value.unwrap_or(Value::Null))
}

/// Decodes a date or time column, keeping the raw value when it has no calendar form.
///
/// A single undecodable cell, typically a zero date, must not fail the whole row.
fn decode_temporal<'r, T>(
    row: &'r MySqlRow,
    column: &MySqlColumn,
    render: impl FnOnce(T) -> String,
) -> Option<Value>
where
    T: Decode<'r, MySql> + Type<MySql>,
{
    let index = column.ordinal();
    match row.try_get::<Option<T>, _>(index) {
        Ok(value) => value.map(|value| Value::String(render(value))),
        Err(err) => {
            debug!(
                column = column.name(),
                error = %err,
                "temporal value could not be decoded, keeping raw value"
            );
            let raw = row
                .try_get_unchecked::<Option<&[u8]>, _>(index)
                .ok()
                .flatten();

            Some(raw_temporal_value(raw))
        }
    }
}
