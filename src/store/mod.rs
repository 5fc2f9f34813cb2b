//! Store Module
//!
//! The backing item store: a generic key-value API over tables of items,
//! implemented for DynamoDB and in memory.

mod dynamo;
mod memory;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::codec::Item;
use crate::error::{CacheError, Result};

pub use dynamo::{DynamoClientFactory, DynamoStore};
pub use memory::{MemoryClientFactory, MemoryStore};

/// Shared handle to a live store client.
pub type StoreHandle = Arc<dyn ItemStore>;

// == Return Values ==
/// Which item image a write returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnValues {
    #[default]
    None,
    AllOld,
    UpdatedOld,
    AllNew,
    UpdatedNew,
}

impl ReturnValues {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnValues::None => "NONE",
            ReturnValues::AllOld => "ALL_OLD",
            ReturnValues::UpdatedOld => "UPDATED_OLD",
            ReturnValues::AllNew => "ALL_NEW",
            ReturnValues::UpdatedNew => "UPDATED_NEW",
        }
    }
}

impl std::str::FromStr for ReturnValues {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NONE" => Ok(ReturnValues::None),
            "ALL_OLD" => Ok(ReturnValues::AllOld),
            "UPDATED_OLD" => Ok(ReturnValues::UpdatedOld),
            "ALL_NEW" => Ok(ReturnValues::AllNew),
            "UPDATED_NEW" => Ok(ReturnValues::UpdatedNew),
            other => Err(CacheError::InvalidRequest(format!(
                "unsupported ReturnValues [{}]",
                other
            ))),
        }
    }
}

// == Item Update ==
/// How an update modifies an item.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemUpdate {
    /// Overwrite `set`; write `set_if_absent` only where the attribute is missing.
    Assign { set: Item, set_if_absent: Item },
    /// A raw update expression, passed through verbatim.
    Expression {
        expression: String,
        names: HashMap<String, String>,
        values: Item,
    },
}

// == Scan / Query Requests ==
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanRequest {
    /// Continuation cursor from the previous page
    pub exclusive_start_key: Option<Item>,
    pub filter_expression: Option<String>,
    pub expression_attribute_names: HashMap<String, String>,
    pub expression_attribute_values: Item,
    pub index_name: Option<String>,
    pub limit: Option<i32>,
}

impl ScanRequest {
    /// A full-table scan resuming at the given cursor.
    pub fn starting_at(cursor: Option<Item>) -> Self {
        Self {
            exclusive_start_key: cursor,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRequest {
    pub key_condition_expression: Option<String>,
    pub filter_expression: Option<String>,
    pub expression_attribute_names: HashMap<String, String>,
    pub expression_attribute_values: Item,
    pub index_name: Option<String>,
    pub limit: Option<i32>,
    pub exclusive_start_key: Option<Item>,
}

// == Item Page ==
/// One bounded page of scan or query results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemPage {
    pub items: Vec<Item>,
    pub last_evaluated_key: Option<Item>,
}

impl ItemPage {
    /// The cursor for the next page; `None` once the enumeration is exhausted.
    pub fn next_cursor(&self) -> Option<&Item> {
        self.last_evaluated_key.as_ref().filter(|key| !key.is_empty())
    }
}

// == Table Metadata ==
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableStatus {
    Creating,
    Active,
    Updating,
    Deleting,
    Other(String),
}

impl TableStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TableStatus::Creating => "CREATING",
            TableStatus::Active => "ACTIVE",
            TableStatus::Updating => "UPDATING",
            TableStatus::Deleting => "DELETING",
            TableStatus::Other(s) => s,
        }
    }
}

impl From<&str> for TableStatus {
    fn from(s: &str) -> Self {
        match s {
            "CREATING" => TableStatus::Creating,
            "ACTIVE" => TableStatus::Active,
            "UPDATING" => TableStatus::Updating,
            "DELETING" => TableStatus::Deleting,
            other => TableStatus::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchemaElement {
    pub attribute_name: String,
    /// `HASH` or `RANGE`
    pub key_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescription {
    pub name: Option<String>,
    pub status: Option<String>,
    pub item_count: Option<i64>,
    pub size_bytes: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescription {
    pub status: TableStatus,
    pub key_schema: Vec<KeySchemaElement>,
    pub item_count: Option<i64>,
    pub size_bytes: Option<i64>,
    /// Epoch milliseconds
    pub created_at: Option<i64>,
    pub billing_mode: Option<String>,
    /// (read, write) capacity units
    pub provisioned_throughput: Option<(i64, i64)>,
    pub global_secondary_indexes: Vec<IndexDescription>,
}

impl TableDescription {
    /// Name of the table's HASH key attribute.
    pub fn hash_key(&self) -> Option<&str> {
        self.key_schema
            .iter()
            .find(|k| k.key_type == "HASH")
            .map(|k| k.attribute_name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeToLiveDescription {
    pub status: String,
    pub attribute_name: Option<String>,
}

// == Item Store Trait ==
/// The generic item-store API the cache is built on.
///
/// Every method is one network round trip; failures surface as
/// [`CacheError::Transport`] and are never retried here.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Fetches an item, optionally projecting to the named attributes.
    async fn get_item(&self, table: &str, key: Item, projection: Option<&[&str]>) -> Result<Option<Item>>;

    async fn put_item(&self, table: &str, item: Item, return_values: ReturnValues) -> Result<Option<Item>>;

    async fn update_item(
        &self,
        table: &str,
        key: Item,
        update: ItemUpdate,
        return_values: ReturnValues,
    ) -> Result<Option<Item>>;

    async fn delete_item(&self, table: &str, key: Item, return_values: ReturnValues) -> Result<Option<Item>>;

    async fn scan(&self, table: &str, request: ScanRequest) -> Result<ItemPage>;

    async fn query(&self, table: &str, request: QueryRequest) -> Result<ItemPage>;

    /// Describes a table; `None` when it does not exist.
    async fn describe_table(&self, table: &str) -> Result<Option<TableDescription>>;

    /// Creates an on-demand table with a single string hash key.
    async fn create_table(&self, table: &str, key_attribute: &str) -> Result<()>;

    async fn describe_time_to_live(&self, table: &str) -> Result<Option<TimeToLiveDescription>>;

    async fn enable_time_to_live(&self, table: &str, attribute: &str) -> Result<()>;
}
