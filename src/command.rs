//! Command Module
//!
//! Raw item operations against the cache table, for callers that need the
//! store's own expression language. Arguments and results pass through the
//! value codec.

use std::collections::HashMap;
use std::str::FromStr;

use tracing::debug;

use crate::codec::{decode_item, encode_item, HostMap, HostValue, Item};
use crate::error::{CacheError, Result};
use crate::store::{ItemStore, ItemUpdate, QueryRequest, ReturnValues, ScanRequest};

const RETURN_VALUES: &str = "ReturnValues";

// == Action ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    GetItem,
    PutItem,
    UpdateItem,
    DeleteItem,
    Query,
    Scan,
}

impl FromStr for Action {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "getitem" => Ok(Action::GetItem),
            "putitem" => Ok(Action::PutItem),
            "updateitem" => Ok(Action::UpdateItem),
            "deleteitem" => Ok(Action::DeleteItem),
            "query" => Ok(Action::Query),
            "scan" => Ok(Action::Scan),
            _ => Err(CacheError::InvalidRequest(format!(
                "action [{}] is not supported",
                s
            ))),
        }
    }
}

// == Execute ==
/// Runs one raw action against `table`.
///
/// `args` must be a map. Field names are matched case-insensitively:
/// - `getItem`, `deleteItem`: the key attributes, plus `ReturnValues` for deletes
/// - `putItem`: the full item, plus `ReturnValues`
/// - `updateItem`: `key`, `UpdateExpression`, `ExpressionAttributeNames`,
///   `ExpressionAttributeValues`, `ReturnValues`
/// - `query`, `scan`: `KeyConditionExpression` (query only), `FilterExpression`,
///   `ExpressionAttributeNames`, `ExpressionAttributeValues`, `IndexName`, `Limit`
///
/// Single-item actions return the item as a map, or null when there is none.
/// `query` and `scan` return one page of items as a list.
pub async fn execute(store: &dyn ItemStore, table: &str, action: &str, args: &HostValue) -> Result<HostValue> {
    let action: Action = action.parse()?;
    let data = args.as_map().ok_or_else(|| {
        CacheError::InvalidRequest(format!("for action [{:?}] a map argument is required", action))
    })?;
    debug!("Executing {:?} on table '{}'", action, table);

    match action {
        Action::GetItem => {
            let item = store.get_item(table, item_without(data, &[RETURN_VALUES]), None).await?;
            Ok(from_item(item))
        }
        Action::PutItem => {
            let item = item_without(data, &[RETURN_VALUES]);
            let old = store.put_item(table, item, return_values(data)?).await?;
            Ok(from_item(old))
        }
        Action::DeleteItem => {
            let key = item_without(data, &[RETURN_VALUES]);
            let old = store.delete_item(table, key, return_values(data)?).await?;
            Ok(from_item(old))
        }
        Action::UpdateItem => {
            let expression = text(field(data, "UpdateExpression")).ok_or_else(|| {
                CacheError::InvalidRequest("updateItem requires an UpdateExpression".to_string())
            })?;
            let update = ItemUpdate::Expression {
                expression,
                names: names(field(data, "ExpressionAttributeNames")),
                values: to_item(field(data, "ExpressionAttributeValues")),
            };
            let key = to_item(field(data, "key"));
            let item = store.update_item(table, key, update, return_values(data)?).await?;
            Ok(from_item(item))
        }
        Action::Query => {
            let request = QueryRequest {
                key_condition_expression: text(field(data, "KeyConditionExpression")),
                filter_expression: text(field(data, "FilterExpression")),
                expression_attribute_names: names(field(data, "ExpressionAttributeNames")),
                expression_attribute_values: to_item(field(data, "ExpressionAttributeValues")),
                index_name: text(field(data, "IndexName")),
                limit: limit(field(data, "Limit"))?,
                exclusive_start_key: None,
            };
            let page = store.query(table, request).await?;
            Ok(from_items(page.items))
        }
        Action::Scan => {
            let request = ScanRequest {
                exclusive_start_key: None,
                filter_expression: text(field(data, "FilterExpression")),
                expression_attribute_names: names(field(data, "ExpressionAttributeNames")),
                expression_attribute_values: to_item(field(data, "ExpressionAttributeValues")),
                index_name: text(field(data, "IndexName")),
                limit: limit(field(data, "Limit"))?,
            };
            let page = store.scan(table, request).await?;
            Ok(from_items(page.items))
        }
    }
}

// == Argument Helpers ==
fn field<'a>(data: &'a HostMap, name: &str) -> Option<&'a HostValue> {
    data.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v)
}

fn item_without(data: &HostMap, excluded: &[&str]) -> Item {
    let kept: HostMap = data
        .iter()
        .filter(|(k, _)| !excluded.iter().any(|e| k.eq_ignore_ascii_case(e)))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    encode_item(&kept)
}

fn to_item(value: Option<&HostValue>) -> Item {
    value.and_then(HostValue::as_map).map(encode_item).unwrap_or_default()
}

fn text(value: Option<&HostValue>) -> Option<String> {
    match value? {
        HostValue::String(s) => Some(s.clone()),
        HostValue::Number(n) => Some(n.to_decimal_string()),
        HostValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn names(value: Option<&HostValue>) -> HashMap<String, String> {
    value
        .and_then(HostValue::as_map)
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| text(Some(v)).map(|v| (k.clone(), v)))
                .collect()
        })
        .unwrap_or_default()
}

fn limit(value: Option<&HostValue>) -> Result<Option<i32>> {
    let Some(value) = value else {
        return Ok(None);
    };
    let parsed = match value {
        HostValue::Number(n) => n.as_i64(),
        HostValue::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed
        .and_then(|n| i32::try_from(n).ok())
        .map(Some)
        .ok_or_else(|| CacheError::InvalidRequest("Limit must be an integer".to_string()))
}

fn return_values(data: &HostMap) -> Result<ReturnValues> {
    match text(field(data, RETURN_VALUES)) {
        Some(s) => s.parse(),
        None => Ok(ReturnValues::None),
    }
}

// == Result Helpers ==
fn from_item(item: Option<Item>) -> HostValue {
    match item {
        Some(item) if !item.is_empty() => HostValue::Map(decode_item(&item)),
        _ => HostValue::Null,
    }
}

fn from_items(items: Vec<Item>) -> HostValue {
    HostValue::List(items.iter().map(|item| HostValue::Map(decode_item(item))).collect())
}
