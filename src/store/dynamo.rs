//! DynamoDB item store.
//!
//! Translates the generic item API onto `aws-sdk-dynamodb`. Every SDK
//! failure is reported as [`CacheError::Transport`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use aws_config::environment::EnvironmentVariableCredentialsProvider;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_dynamodb::config::{Builder as DynamoConfigBuilder, Region};
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue as SdkValue, BillingMode, KeySchemaElement as SdkKeyElement,
    KeyType, ReturnValue, ScalarAttributeType, TimeToLiveSpecification,
};
use aws_sdk_dynamodb::Client;
use tracing::debug;

use crate::codec::{AttributeValue, Item};
use crate::error::{CacheError, Result};
use crate::pool::{ClientFactory, ClientSettings};
use crate::store::{
    IndexDescription, ItemPage, ItemStore, ItemUpdate, KeySchemaElement, QueryRequest,
    ReturnValues, ScanRequest, StoreHandle, TableDescription, TableStatus, TimeToLiveDescription,
};

/// Provider name attached to static credentials.
const CREDENTIALS_PROVIDER: &str = "dynamo-cache";

type SdkItem = HashMap<String, SdkValue>;

// == Dynamo Store ==
#[derive(Debug, Clone)]
pub struct DynamoStore {
    client: Client,
}

impl DynamoStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a client from pool settings.
    ///
    /// Static credentials are used when both halves are configured, the
    /// environment otherwise.
    pub fn from_settings(settings: &ClientSettings) -> Self {
        let mut config = DynamoConfigBuilder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(settings.effective_region()));

        config = match (&settings.access_key_id, &settings.secret_key) {
            (Some(access_key), Some(secret_key)) => config.credentials_provider(Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                CREDENTIALS_PROVIDER,
            )),
            _ => config.credentials_provider(EnvironmentVariableCredentialsProvider::new()),
        };

        if let Some(endpoint) = settings.endpoint_override() {
            debug!("Using custom DynamoDB endpoint: {}", endpoint);
            config = config.endpoint_url(endpoint);
        }

        Self::new(Client::from_conf(config.build()))
    }
}

fn transport(operation: &str, err: impl std::error::Error) -> CacheError {
    CacheError::Transport(format!("DynamoDB {} failed: {}", operation, DisplayErrorContext(err)))
}

// == Attribute Translation ==
fn to_sdk(value: AttributeValue) -> SdkValue {
    match value {
        AttributeValue::Null => SdkValue::Null(true),
        AttributeValue::S(s) => SdkValue::S(s),
        AttributeValue::Bool(b) => SdkValue::Bool(b),
        AttributeValue::N(n) => SdkValue::N(n),
        AttributeValue::B(bytes) => SdkValue::B(Blob::new(bytes)),
        AttributeValue::L(list) => SdkValue::L(list.into_iter().map(to_sdk).collect()),
        AttributeValue::M(map) => SdkValue::M(to_sdk_item(map)),
    }
}

fn to_sdk_item(item: Item) -> SdkItem {
    item.into_iter().map(|(k, v)| (k, to_sdk(v))).collect()
}

/// Set types have no counterpart in the cache model and read back as lists.
fn from_sdk(value: &SdkValue) -> AttributeValue {
    match value {
        SdkValue::Null(_) => AttributeValue::Null,
        SdkValue::S(s) => AttributeValue::S(s.clone()),
        SdkValue::Bool(b) => AttributeValue::Bool(*b),
        SdkValue::N(n) => AttributeValue::N(n.clone()),
        SdkValue::B(blob) => AttributeValue::B(blob.as_ref().to_vec()),
        SdkValue::L(list) => AttributeValue::L(list.iter().map(from_sdk).collect()),
        SdkValue::M(map) => AttributeValue::M(from_sdk_item(map)),
        SdkValue::Ss(set) => AttributeValue::L(set.iter().cloned().map(AttributeValue::S).collect()),
        SdkValue::Ns(set) => AttributeValue::L(set.iter().cloned().map(AttributeValue::N).collect()),
        SdkValue::Bs(set) => AttributeValue::L(
            set.iter()
                .map(|blob| AttributeValue::B(blob.as_ref().to_vec()))
                .collect(),
        ),
        _ => AttributeValue::Null,
    }
}

fn from_sdk_item(item: &SdkItem) -> Item {
    item.iter().map(|(k, v)| (k.clone(), from_sdk(v))).collect()
}

fn non_empty<K, V>(map: HashMap<K, V>) -> Option<HashMap<K, V>> {
    if map.is_empty() {
        None
    } else {
        Some(map)
    }
}

fn return_value(return_values: ReturnValues) -> ReturnValue {
    ReturnValue::from(return_values.as_str())
}

/// Builds `SET` clauses with placeholder names for an assignment update.
fn assignment_expression(
    set: Item,
    set_if_absent: Item,
) -> (String, HashMap<String, String>, SdkItem) {
    let mut clauses = Vec::with_capacity(set.len() + set_if_absent.len());
    let mut names = HashMap::new();
    let mut values = SdkItem::new();

    let mut set: Vec<_> = set.into_iter().collect();
    set.sort_by(|a, b| a.0.cmp(&b.0));
    for (i, (name, value)) in set.into_iter().enumerate() {
        clauses.push(format!("#a{i} = :a{i}"));
        names.insert(format!("#a{i}"), name);
        values.insert(format!(":a{i}"), to_sdk(value));
    }

    let mut set_if_absent: Vec<_> = set_if_absent.into_iter().collect();
    set_if_absent.sort_by(|a, b| a.0.cmp(&b.0));
    for (i, (name, value)) in set_if_absent.into_iter().enumerate() {
        clauses.push(format!("#b{i} = if_not_exists(#b{i}, :b{i})"));
        names.insert(format!("#b{i}"), name);
        values.insert(format!(":b{i}"), to_sdk(value));
    }

    (format!("SET {}", clauses.join(", ")), names, values)
}

fn page(items: &[SdkItem], last_evaluated_key: Option<&SdkItem>) -> ItemPage {
    ItemPage {
        items: items.iter().map(from_sdk_item).collect(),
        last_evaluated_key: last_evaluated_key.map(from_sdk_item),
    }
}

#[async_trait]
impl ItemStore for DynamoStore {
    async fn get_item(&self, table: &str, key: Item, projection: Option<&[&str]>) -> Result<Option<Item>> {
        let mut request = self.client.get_item().table_name(table).set_key(Some(to_sdk_item(key)));

        if let Some(attributes) = projection {
            let mut placeholders = Vec::with_capacity(attributes.len());
            for (i, name) in attributes.iter().enumerate() {
                let placeholder = format!("#p{}", i);
                request = request.expression_attribute_names(&placeholder, *name);
                placeholders.push(placeholder);
            }
            request = request.projection_expression(placeholders.join(", "));
        }

        let output = request.send().await.map_err(|e| transport("GetItem", e))?;
        Ok(output.item().map(from_sdk_item))
    }

    async fn put_item(&self, table: &str, item: Item, return_values: ReturnValues) -> Result<Option<Item>> {
        let output = self
            .client
            .put_item()
            .table_name(table)
            .set_item(Some(to_sdk_item(item)))
            .return_values(return_value(return_values))
            .send()
            .await
            .map_err(|e| transport("PutItem", e))?;
        Ok(output.attributes().map(from_sdk_item))
    }

    async fn update_item(
        &self,
        table: &str,
        key: Item,
        update: ItemUpdate,
        return_values: ReturnValues,
    ) -> Result<Option<Item>> {
        let (expression, names, values) = match update {
            ItemUpdate::Assign { set, set_if_absent } => assignment_expression(set, set_if_absent),
            ItemUpdate::Expression {
                expression,
                names,
                values,
            } => (expression, names, to_sdk_item(values)),
        };

        let output = self
            .client
            .update_item()
            .table_name(table)
            .set_key(Some(to_sdk_item(key)))
            .update_expression(expression)
            .set_expression_attribute_names(non_empty(names))
            .set_expression_attribute_values(non_empty(values))
            .return_values(return_value(return_values))
            .send()
            .await
            .map_err(|e| transport("UpdateItem", e))?;
        Ok(output.attributes().map(from_sdk_item))
    }

    async fn delete_item(&self, table: &str, key: Item, return_values: ReturnValues) -> Result<Option<Item>> {
        let output = self
            .client
            .delete_item()
            .table_name(table)
            .set_key(Some(to_sdk_item(key)))
            .return_values(return_value(return_values))
            .send()
            .await
            .map_err(|e| transport("DeleteItem", e))?;
        Ok(output.attributes().map(from_sdk_item))
    }

    async fn scan(&self, table: &str, request: ScanRequest) -> Result<ItemPage> {
        let output = self
            .client
            .scan()
            .table_name(table)
            .set_exclusive_start_key(request.exclusive_start_key.map(to_sdk_item))
            .set_filter_expression(request.filter_expression)
            .set_expression_attribute_names(non_empty(request.expression_attribute_names))
            .set_expression_attribute_values(non_empty(to_sdk_item(request.expression_attribute_values)))
            .set_index_name(request.index_name)
            .set_limit(request.limit)
            .send()
            .await
            .map_err(|e| transport("Scan", e))?;
        Ok(page(output.items(), output.last_evaluated_key()))
    }

    async fn query(&self, table: &str, request: QueryRequest) -> Result<ItemPage> {
        let output = self
            .client
            .query()
            .table_name(table)
            .set_key_condition_expression(request.key_condition_expression)
            .set_filter_expression(request.filter_expression)
            .set_expression_attribute_names(non_empty(request.expression_attribute_names))
            .set_expression_attribute_values(non_empty(to_sdk_item(request.expression_attribute_values)))
            .set_index_name(request.index_name)
            .set_limit(request.limit)
            .set_exclusive_start_key(request.exclusive_start_key.map(to_sdk_item))
            .send()
            .await
            .map_err(|e| transport("Query", e))?;
        Ok(page(output.items(), output.last_evaluated_key()))
    }

    async fn describe_table(&self, table: &str) -> Result<Option<TableDescription>> {
        let output = match self.client.describe_table().table_name(table).send().await {
            Ok(output) => output,
            Err(e) => {
                let missing = e
                    .as_service_error()
                    .map(|se| se.is_resource_not_found_exception())
                    .unwrap_or(false);
                if missing {
                    return Ok(None);
                }
                return Err(transport("DescribeTable", e));
            }
        };

        let Some(desc) = output.table() else {
            return Ok(None);
        };

        Ok(Some(TableDescription {
            status: desc
                .table_status()
                .map_or(TableStatus::Other("UNKNOWN".to_string()), |s| TableStatus::from(s.as_str())),
            key_schema: desc
                .key_schema()
                .iter()
                .map(|k| KeySchemaElement {
                    attribute_name: k.attribute_name().to_string(),
                    key_type: k.key_type().as_str().to_string(),
                })
                .collect(),
            item_count: desc.item_count(),
            size_bytes: desc.table_size_bytes(),
            created_at: desc.creation_date_time().and_then(|t| t.to_millis().ok()),
            billing_mode: desc
                .billing_mode_summary()
                .and_then(|b| b.billing_mode())
                .map(|m| m.as_str().to_string()),
            provisioned_throughput: desc.provisioned_throughput().map(|p| {
                (
                    p.read_capacity_units().unwrap_or(0),
                    p.write_capacity_units().unwrap_or(0),
                )
            }),
            global_secondary_indexes: desc
                .global_secondary_indexes()
                .iter()
                .map(|gsi| IndexDescription {
                    name: gsi.index_name().map(str::to_string),
                    status: gsi.index_status().map(|s| s.as_str().to_string()),
                    item_count: gsi.item_count(),
                    size_bytes: gsi.index_size_bytes(),
                })
                .collect(),
        }))
    }

    async fn create_table(&self, table: &str, key_attribute: &str) -> Result<()> {
        let definition = AttributeDefinition::builder()
            .attribute_name(key_attribute)
            .attribute_type(ScalarAttributeType::S)
            .build()
            .map_err(|e| transport("CreateTable", e))?;
        let key = SdkKeyElement::builder()
            .attribute_name(key_attribute)
            .key_type(KeyType::Hash)
            .build()
            .map_err(|e| transport("CreateTable", e))?;

        self.client
            .create_table()
            .table_name(table)
            .attribute_definitions(definition)
            .key_schema(key)
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await
            .map_err(|e| transport("CreateTable", e))?;
        Ok(())
    }

    async fn describe_time_to_live(&self, table: &str) -> Result<Option<TimeToLiveDescription>> {
        let output = self
            .client
            .describe_time_to_live()
            .table_name(table)
            .send()
            .await
            .map_err(|e| transport("DescribeTimeToLive", e))?;

        Ok(output.time_to_live_description().map(|ttl| TimeToLiveDescription {
            status: ttl
                .time_to_live_status()
                .map_or_else(|| "UNKNOWN".to_string(), |s| s.as_str().to_string()),
            attribute_name: ttl.attribute_name().map(str::to_string),
        }))
    }

    async fn enable_time_to_live(&self, table: &str, attribute: &str) -> Result<()> {
        let specification = TimeToLiveSpecification::builder()
            .attribute_name(attribute)
            .enabled(true)
            .build()
            .map_err(|e| transport("UpdateTimeToLive", e))?;

        self.client
            .update_time_to_live()
            .table_name(table)
            .time_to_live_specification(specification)
            .send()
            .await
            .map_err(|e| transport("UpdateTimeToLive", e))?;
        Ok(())
    }
}

// == Dynamo Client Factory ==
/// Builds one DynamoDB client per pool key.
#[derive(Debug, Clone, Copy, Default)]
pub struct DynamoClientFactory;

impl ClientFactory for DynamoClientFactory {
    fn create(&self, settings: &ClientSettings) -> Result<StoreHandle> {
        Ok(Arc::new(DynamoStore::from_settings(settings)))
    }
}
