//! [`TableStore`] over the DynamoDB SDK client

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_dynamodb::error::{BuildError, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;
use aws_sdk_dynamodb::types::{AttributeValue, ConditionCheck, Delete, Put, TransactWriteItem};
use aws_sdk_dynamodb::Client;
use aws_smithy_types::error::display::DisplayErrorContext;
use aws_smithy_types::timeout::TimeoutConfig;
use tracing::{debug, info, warn};

use clubhouse_config::TableConfig;
use clubhouse_core::keys::{PK_ATTR, SK_ATTR};
use clubhouse_core::table::{
    ContinuationKey, Item, ItemKey, Page, PartitionQuery, ScanRequest, TableError, TableResult,
    TableStore, WriteOp,
};

use crate::convert::{from_attributes, key_attributes, to_attributes};
use crate::expression::{render_condition, RenderedExpression};

/// Most items DynamoDB accepts in one `TransactWriteItems` call
pub const MAX_TRANSACT_ITEMS: usize = 100;

/// Cancellation reason codes that mean "someone else got there first"
const CONFLICT_CODES: [&str; 2] = ["ConditionalCheckFailed", "TransactionConflict"];

/// DynamoDB-backed single table
#[derive(Clone)]
pub struct DynamoTable {
    client: Client,
    table_name: String,
    timeout_ms: u64,
}

impl std::fmt::Debug for DynamoTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamoTable")
            .field("table_name", &self.table_name)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl DynamoTable {
    /// Load the ambient AWS configuration and connect to `config.name`
    pub async fn connect(config: &TableConfig) -> Self {
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .load()
            .await;
        Self::from_sdk_config(&sdk_config, config)
    }

    /// Build a client from an existing SDK configuration
    ///
    /// Region and endpoint from `config` override the SDK defaults; the
    /// timeout bounds every operation including retries.
    pub fn from_sdk_config(sdk_config: &aws_config::SdkConfig, config: &TableConfig) -> Self {
        let mut builder = aws_sdk_dynamodb::config::Builder::from(sdk_config);

        if let Some(region) = &config.region {
            builder = builder.region(aws_sdk_dynamodb::config::Region::new(region.clone()));
        }
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        let timeout_config = TimeoutConfig::builder()
            .operation_timeout(Duration::from_millis(config.timeout_ms))
            .build();
        builder = builder.timeout_config(timeout_config);

        info!(
            table = %config.name,
            region = ?config.region,
            endpoint = ?config.endpoint,
            "DynamoDB table client configured"
        );

        Self {
            client: Client::from_conf(builder.build()),
            table_name: config.name.clone(),
            timeout_ms: config.timeout_ms,
        }
    }

    /// Wrap a pre-built client
    pub fn from_client(client: Client, table_name: impl Into<String>, timeout_ms: u64) -> Self {
        Self {
            client,
            table_name: table_name.into(),
            timeout_ms,
        }
    }

    /// Table this client reads and writes
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    fn transact_item(&self, op: WriteOp) -> TableResult<TransactWriteItem> {
        let rendered = op.condition().map(render_condition);
        let (expression, names, values) = match &rendered {
            Some(r) => (Some(r.expression.clone()), r.names(), r.values()),
            None => (None, None, None),
        };

        let item = match op {
            WriteOp::Put { item, .. } => TransactWriteItem::builder()
                .put(
                    Put::builder()
                        .table_name(&self.table_name)
                        .set_item(Some(to_attributes(&item)))
                        .set_condition_expression(expression)
                        .set_expression_attribute_names(names)
                        .set_expression_attribute_values(values)
                        .build()
                        .map_err(build_error)?,
                )
                .build(),
            WriteOp::Delete { key, .. } => TransactWriteItem::builder()
                .delete(
                    Delete::builder()
                        .table_name(&self.table_name)
                        .set_key(Some(key_attributes(&key)))
                        .set_condition_expression(expression)
                        .set_expression_attribute_names(names)
                        .set_expression_attribute_values(values)
                        .build()
                        .map_err(build_error)?,
                )
                .build(),
            WriteOp::Check { key, .. } => TransactWriteItem::builder()
                .condition_check(
                    ConditionCheck::builder()
                        .table_name(&self.table_name)
                        .set_key(Some(key_attributes(&key)))
                        .set_condition_expression(expression)
                        .set_expression_attribute_names(names)
                        .set_expression_attribute_values(values)
                        .build()
                        .map_err(build_error)?,
                )
                .build(),
        };
        Ok(item)
    }
}

fn build_error(err: BuildError) -> TableError {
    TableError::InvalidRequest(err.to_string())
}

/// Map an SDK failure onto the table error taxonomy
fn classify<E, R>(operation: &str, err: SdkError<E, R>, timeout_ms: u64) -> TableError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match &err {
        SdkError::TimeoutError(_) => return TableError::Timeout { duration_ms: timeout_ms },
        SdkError::DispatchFailure(failure) if failure.is_timeout() => {
            return TableError::Timeout { duration_ms: timeout_ms }
        }
        _ => {}
    }

    if let Some(service) = err.as_service_error() {
        let message = service.message().unwrap_or("no message").to_string();
        match service.code() {
            Some("ConditionalCheckFailedException") => {
                return TableError::ConditionFailed(message)
            }
            Some("ValidationException") => return TableError::InvalidRequest(message),
            _ => {}
        }
    }

    TableError::Unavailable(format!(
        "DynamoDB {} failed: {}",
        operation,
        DisplayErrorContext(&err)
    ))
}

fn continuation(item: Option<&Item>) -> Option<ContinuationKey> {
    item.and_then(ItemKey::of).map(|key| key.to_continuation())
}

fn last_key(raw: Option<&HashMap<String, AttributeValue>>) -> TableResult<Option<ContinuationKey>> {
    match raw {
        Some(key) if !key.is_empty() => Ok(Some(from_attributes(key)?)),
        _ => Ok(None),
    }
}

#[async_trait]
impl TableStore for DynamoTable {
    async fn get_item(&self, key: &ItemKey) -> TableResult<Option<Item>> {
        let response = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(key_attributes(key)))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| classify("GetItem", e, self.timeout_ms))?;

        response.item().map(from_attributes).transpose()
    }

    async fn query_partition(&self, query: PartitionQuery) -> TableResult<Page> {
        let mut request = self
            .client
            .query()
            .table_name(&self.table_name)
            .consistent_read(true)
            .expression_attribute_names("#pk", PK_ATTR)
            .expression_attribute_values(":pk", AttributeValue::S(query.pk.clone()));

        let key_condition = match &query.sk_prefix {
            Some(prefix) => {
                request = request
                    .expression_attribute_names("#sk", SK_ATTR)
                    .expression_attribute_values(":sk_prefix", AttributeValue::S(prefix.clone()));
                "#pk = :pk AND begins_with(#sk, :sk_prefix)"
            }
            None => "#pk = :pk",
        };
        request = request.key_condition_expression(key_condition);

        if let Some(limit) = query.limit {
            request = request.limit(i32::try_from(limit).unwrap_or(i32::MAX));
        }
        if let Some(start) = &query.start_key {
            request = request.set_exclusive_start_key(Some(to_attributes(start)));
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify("Query", e, self.timeout_ms))?;

        let items = response
            .items()
            .iter()
            .map(from_attributes)
            .collect::<TableResult<Vec<_>>>()?;
        debug!(pk = %query.pk, count = items.len(), "partition query");

        Ok(Page {
            items,
            last_key: last_key(response.last_evaluated_key())?,
        })
    }

    async fn scan(&self, request: ScanRequest) -> TableResult<Page> {
        if request.limit == 0 {
            return Ok(Page::default());
        }
        let filter = RenderedExpression::from(request.filter.compile());
        let mut start = request.start_key.as_ref().map(to_attributes);
        let mut items: Vec<Item> = Vec::new();
        let mut scanned = 0i64;

        // DynamoDB's Limit bounds items evaluated, not matches, so pages are
        // read unbounded and trimmed; the key of the last kept item resumes
        // exactly after it.
        loop {
            let mut call = self
                .client
                .scan()
                .table_name(&self.table_name)
                .consistent_read(true)
                .set_exclusive_start_key(start.take());
            if !filter.expression.is_empty() {
                call = call
                    .filter_expression(&filter.expression)
                    .set_expression_attribute_names(filter.names())
                    .set_expression_attribute_values(filter.values());
            }

            let response = call
                .send()
                .await
                .map_err(|e| classify("Scan", e, self.timeout_ms))?;
            scanned += i64::from(response.scanned_count());

            let page_items = response.items();
            let more_in_table = matches!(response.last_evaluated_key(), Some(k) if !k.is_empty());
            for (i, raw) in page_items.iter().enumerate() {
                items.push(from_attributes(raw)?);
                if items.len() == request.limit {
                    let more = i + 1 < page_items.len() || more_in_table;
                    debug!(scanned, matched = items.len(), "scan page filled");
                    return Ok(Page {
                        last_key: if more { continuation(items.last()) } else { None },
                        items,
                    });
                }
            }

            match response.last_evaluated_key() {
                Some(key) if !key.is_empty() => start = Some(key.clone()),
                _ => break,
            }
        }

        debug!(scanned, matched = items.len(), "scan reached end of table");
        Ok(Page {
            items,
            last_key: None,
        })
    }

    async fn write(&self, op: WriteOp) -> TableResult<()> {
        let key = op.key()?;
        match op {
            WriteOp::Put { item, condition } => {
                let mut call = self
                    .client
                    .put_item()
                    .table_name(&self.table_name)
                    .set_item(Some(to_attributes(&item)));
                if let Some(condition) = condition {
                    let rendered = render_condition(&condition);
                    call = call
                        .condition_expression(rendered.expression.clone())
                        .set_expression_attribute_names(rendered.names())
                        .set_expression_attribute_values(rendered.values());
                }
                call.send()
                    .await
                    .map_err(|e| classify("PutItem", e, self.timeout_ms))?;
            }
            WriteOp::Delete { condition, .. } => {
                let mut call = self
                    .client
                    .delete_item()
                    .table_name(&self.table_name)
                    .set_key(Some(key_attributes(&key)));
                if let Some(condition) = condition {
                    let rendered = render_condition(&condition);
                    call = call
                        .condition_expression(rendered.expression.clone())
                        .set_expression_attribute_names(rendered.names())
                        .set_expression_attribute_values(rendered.values());
                }
                call.send()
                    .await
                    .map_err(|e| classify("DeleteItem", e, self.timeout_ms))?;
            }
            check @ WriteOp::Check { .. } => return self.transact(vec![check]).await,
        }
        debug!(pk = %key.pk, sk = %key.sk, "write applied");
        Ok(())
    }

    async fn transact(&self, ops: Vec<WriteOp>) -> TableResult<()> {
        if ops.is_empty() {
            return Ok(());
        }
        if ops.len() > MAX_TRANSACT_ITEMS {
            return Err(TableError::InvalidRequest(format!(
                "transaction of {} writes exceeds the limit of {}",
                ops.len(),
                MAX_TRANSACT_ITEMS
            )));
        }

        let count = ops.len();
        let items = ops
            .into_iter()
            .map(|op| self.transact_item(op))
            .collect::<TableResult<Vec<_>>>()?;

        let result = self
            .client
            .transact_write_items()
            .set_transact_items(Some(items))
            .send()
            .await;

        match result {
            Ok(_) => {
                debug!(count, "transaction committed");
                Ok(())
            }
            Err(err) => {
                if let Some(TransactWriteItemsError::TransactionCanceledException(cancelled)) =
                    err.as_service_error()
                {
                    let codes: Vec<&str> = cancelled
                        .cancellation_reasons()
                        .iter()
                        .filter_map(|reason| reason.code())
                        .collect();
                    if codes.iter().any(|code| CONFLICT_CODES.contains(code)) {
                        return Err(TableError::ConditionFailed(format!(
                            "transaction cancelled: {}",
                            codes.join(", ")
                        )));
                    }
                    warn!(reasons = ?codes, "transaction cancelled for a non-condition reason");
                }
                Err(classify("TransactWriteItems", err, self.timeout_ms))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_dynamodb::config::{BehaviorVersion, Credentials, Region};
    use clubhouse_core::table::Condition;
    use serde_json::{json, Map};

    fn offline_table() -> DynamoTable {
        let config = aws_sdk_dynamodb::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(Credentials::new("test", "test", None, None, "static"))
            .endpoint_url("http://127.0.0.1:1")
            .build();
        DynamoTable::from_client(Client::from_conf(config), "clubhouse-test", 500)
    }

    fn item() -> Item {
        json!({"PK": "TASK#t1", "SK": "META", "title": "Calls"})
            .as_object()
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_debug_hides_client() {
        let debug = format!("{:?}", offline_table());
        assert!(debug.contains("clubhouse-test"));
        assert!(!debug.contains("credentials"));
    }

    #[test]
    fn test_transact_items_carry_conditions() {
        let table = offline_table();
        let put = table
            .transact_item(WriteOp::put_if_absent(item()))
            .unwrap();
        let put = put.put().unwrap();
        assert_eq!(put.table_name(), "clubhouse-test");
        assert_eq!(put.condition_expression(), Some("attribute_not_exists(#pk)"));

        let check = table
            .transact_item(WriteOp::check(
                ItemKey::new("TASK#t1", "ASSIGNMENT#a@b.c"),
                Condition::NotExists,
            ))
            .unwrap();
        assert!(check.condition_check().is_some());
        assert!(check.put().is_none());

        let delete = table
            .transact_item(WriteOp::delete(ItemKey::new("TASK#t1", "META")))
            .unwrap();
        assert_eq!(delete.delete().unwrap().condition_expression(), None);
    }

    #[tokio::test]
    async fn test_oversized_and_empty_transactions() {
        let table = offline_table();
        assert!(table.transact(Vec::new()).await.is_ok());

        let ops = (0..=MAX_TRANSACT_ITEMS)
            .map(|i| WriteOp::delete(ItemKey::new(format!("TASK#{}", i), "META")))
            .collect();
        assert!(matches!(
            table.transact(ops).await,
            Err(TableError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_put_without_key_is_rejected_locally() {
        let table = offline_table();
        let result = table.write(WriteOp::put(Map::new())).await;
        assert!(matches!(result, Err(TableError::InvalidRequest(_))));
    }
}
