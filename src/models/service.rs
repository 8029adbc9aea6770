use serde::{Deserialize, Serialize};

use crate::error::DataServiceError;

/// A data service: a named virtual table whose rows are produced by
/// executing a pipeline rather than reading a stored table.
///
/// Registered at configuration load time and immutable for the lifetime
/// of any query that references it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataService {
    /// Unique service name; this is the virtual table name in client SQL.
    pub name: String,
    /// Name of the backing pipeline definition.
    pub pipeline: String,
    /// Step whose produced rows constitute the virtual table.
    pub output_step: String,
    /// Push-down optimizations attached to this service, in configuration order.
    #[serde(default)]
    pub optimizations: Vec<OptimizationInstance>,
}

/// One configured push-down optimization attached to a data service.
///
/// Configured once at service registration; reused across query executions.
/// Per-execution activation state lives on the execution context, never here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationInstance {
    pub name: String,
    /// Registry key selecting the strategy implementation.
    pub strategy_id: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Strategy-specific configuration, validated by the strategy's init.
    #[serde(default)]
    pub config: serde_json::Value,
}

fn default_enabled() -> bool {
    true
}

/// Output schema of a data service: the service name plus the ordered
/// field layout of its designated output step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInformation {
    pub service_name: String,
    pub fields: Vec<FieldInfo>,
}

impl ServiceInformation {
    pub fn new(service_name: impl Into<String>, fields: Vec<FieldInfo>) -> Self {
        Self {
            service_name: service_name.into(),
            fields,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub name: String,
    pub field_type: FieldType,
}

impl FieldInfo {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }
}

/// Field types a pipeline step can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Number,
    Decimal,
    Date,
    Timestamp,
    Boolean,
    Binary,
}

impl FieldType {
    pub fn from_str(s: &str) -> Result<Self, DataServiceError> {
        match s.to_lowercase().as_str() {
            "string" | "text" | "varchar" => Ok(FieldType::String),
            "integer" | "int" | "bigint" => Ok(FieldType::Integer),
            "number" | "float" | "double" => Ok(FieldType::Number),
            "decimal" | "numeric" => Ok(FieldType::Decimal),
            "date" => Ok(FieldType::Date),
            "timestamp" | "datetime" => Ok(FieldType::Timestamp),
            "boolean" | "bool" => Ok(FieldType::Boolean),
            "binary" | "bytes" => Ok(FieldType::Binary),
            _ => Err(DataServiceError::Boundary(format!(
                "Unsupported field type: {}",
                s
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Number => "number",
            FieldType::Decimal => "decimal",
            FieldType::Date => "date",
            FieldType::Timestamp => "timestamp",
            FieldType::Boolean => "boolean",
            FieldType::Binary => "binary",
        }
    }
}
