//! Metadata introspection: connection info, table description, object
//! listing, completions and plan statements.

use arrow_array::cast::AsArray;
use arrow_array::Array;
use serde_derive::Serialize;
use sqlgate_xdbc::options::{InfoCode, ObjectDepth};
use sqlgate_xdbc::{Backend, Connection};

use crate::errors::{AdapterError, AdapterResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnInfo {
    pub vendor_name: String,
    pub vendor_version: String,
    pub driver_name: String,
    pub driver_version: String,
}

/// Driver/server identity for the conninfo endpoint.
pub fn conninfo(conn: &mut dyn Connection) -> AdapterResult<ConnInfo> {
    Ok(ConnInfo {
        vendor_name: conn.get_info(InfoCode::VendorName)?,
        vendor_version: conn.get_info(InfoCode::VendorVersion)?,
        driver_name: conn.get_info(InfoCode::DriverName)?,
        driver_version: conn.get_info(InfoCode::DriverVersion)?,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DescribeDetail {
    #[default]
    Basic,
    Full,
}

impl DescribeDetail {
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("full") {
            DescribeDetail::Full
        } else {
            DescribeDetail::Basic
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub type_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
}

/// Column list for `schema.table` or bare `table` names.
pub fn describe(
    conn: &mut dyn Connection,
    name: &str,
    detail: DescribeDetail,
) -> AdapterResult<Vec<ColumnInfo>> {
    let (schema_name, table_name) = match name.split_once('.') {
        Some((schema, table)) => (Some(schema), table),
        None => (None, name),
    };
    let table_schema = conn.get_table_schema(None, schema_name, table_name)?;
    let columns = table_schema
        .fields()
        .iter()
        .map(|field| ColumnInfo {
            name: field.name().clone(),
            type_name: field.data_type().to_string(),
            nullable: match detail {
                DescribeDetail::Basic => None,
                DescribeDetail::Full => Some(field.is_nullable()),
            },
        })
        .collect();
    Ok(columns)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_name: Option<String>,
    pub name: String,
    pub object_type: String,
}

/// List tables/views, optionally filtered by object kind and schema.
pub fn list_objects(
    conn: &mut dyn Connection,
    kind: Option<&str>,
    schema: Option<&str>,
) -> AdapterResult<Vec<ObjectInfo>> {
    let reader = conn.get_objects(ObjectDepth::Tables, None, schema, None, None, None)?;
    let mut objects = Vec::new();
    for batch in reader {
        let batch = batch.map_err(AdapterError::from)?;
        let names = batch
            .column_by_name("object_name")
            .map(|col| col.as_string::<i32>());
        let types = batch
            .column_by_name("object_type")
            .map(|col| col.as_string::<i32>());
        let schemas = batch
            .column_by_name("schema_name")
            .map(|col| col.as_string::<i32>());
        let (Some(names), Some(types)) = (names, types) else {
            continue;
        };
        for row in 0..batch.num_rows() {
            let object_type = types.value(row).to_string();
            if let Some(kind) = kind {
                if !object_type.eq_ignore_ascii_case(kind) {
                    continue;
                }
            }
            objects.push(ObjectInfo {
                schema_name: schemas.and_then(|s| {
                    if s.is_null(row) {
                        None
                    } else {
                        Some(s.value(row).to_string())
                    }
                }),
                name: names.value(row).to_string(),
                object_type,
            });
        }
    }
    Ok(objects)
}

/// Object-name completion hints: names starting with `prefix`,
/// case-insensitively.
pub fn completions(
    conn: &mut dyn Connection,
    schema: Option<&str>,
    prefix: &str,
) -> AdapterResult<Vec<String>> {
    let prefix = prefix.to_ascii_lowercase();
    let names = list_objects(conn, None, schema)?
        .into_iter()
        .map(|object| object.name)
        .filter(|name| name.to_ascii_lowercase().starts_with(&prefix))
        .collect();
    Ok(names)
}

/// The plan statement for the given dialect. Oracle spools plans into
/// `PLAN_TABLE`, everything else answers `EXPLAIN` directly.
pub fn explain_sql(backend: Backend, sql: &str, analyze: bool) -> String {
    match backend {
        Backend::Oracle => format!("EXPLAIN PLAN FOR {sql}"),
        Backend::Postgres if analyze => format!("EXPLAIN ANALYZE {sql}"),
        Backend::Mysql if analyze => format!("EXPLAIN ANALYZE {sql}"),
        _ => format!("EXPLAIN {sql}"),
    }
}
