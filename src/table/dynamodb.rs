use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::config::{Credentials, Region};
use aws_sdk_dynamodb::error::{DisplayErrorContext, SdkError};
use aws_sdk_dynamodb::operation::create_table::CreateTableError;
use aws_sdk_dynamodb::operation::describe_table::DescribeTableError;
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, KeySchemaElement, KeyType, ProvisionedThroughput,
    ScalarAttributeType,
};
use aws_sdk_dynamodb::Client;
use async_trait::async_trait;

use crate::config::{ClientConfig, TableOptions};
use crate::constants::{EXPIRES_ATTRIBUTE, SESSION_ATTRIBUTE, UPDATED_FIELD};
use crate::entity::attribute::{self, Item};
use crate::entity::session::SessionItem;
use crate::error::TableError;

use super::{TableDescription, TableService};

const PROVIDER_NAME: &str = "tower-sessions-dynamodb-store";

/// [`TableService`] backed by Amazon DynamoDB.
#[derive(Clone)]
pub struct DynamoDbTable {
    client: Client,
}

impl std::fmt::Debug for DynamoDbTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamoDbTable").finish_non_exhaustive()
    }
}

impl DynamoDbTable {
    /// Wraps an existing client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a client from resolved configuration.
    ///
    /// Unset fields use the SDK's default provider chains.
    pub async fn connect(config: &ClientConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());

        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        if let Some(credentials) = &config.credentials {
            loader = loader.credentials_provider(Credentials::new(
                credentials.access_key_id.clone(),
                credentials.secret_access_key.clone(),
                credentials.session_token.clone(),
                None,
                PROVIDER_NAME,
            ));
        }
        if let Some(max_attempts) = config.max_attempts {
            loader = loader.retry_config(RetryConfig::standard().with_max_attempts(max_attempts));
        }
        if let Some(timeout) = config.timeout {
            loader = loader.timeout_config(TimeoutConfig::builder().operation_timeout(timeout).build());
        }

        Self::new(Client::new(&loader.load().await))
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

fn service_error<E, R>(err: SdkError<E, R>) -> TableError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    TableError::Service(DisplayErrorContext(&err).to_string())
}

fn key(table: &TableOptions, key: &str) -> (String, AttributeValue) {
    (table.hash_key.clone(), AttributeValue::S(key.to_string()))
}

#[async_trait]
impl TableService for DynamoDbTable {
    async fn describe_table(&self, table: &TableOptions) -> Result<TableDescription, TableError> {
        let output = self
            .client
            .describe_table()
            .table_name(&table.name)
            .send()
            .await
            .map_err(|err| {
                if matches!(
                    err.as_service_error(),
                    Some(DescribeTableError::ResourceNotFoundException(_))
                ) {
                    TableError::TableNotFound(table.name.clone())
                } else {
                    service_error(err)
                }
            })?;

        Ok(TableDescription {
            name: table.name.clone(),
            status: output
                .table
                .and_then(|t| t.table_status)
                .map(|status| status.as_str().to_string()),
        })
    }

    async fn create_table(&self, table: &TableOptions) -> Result<(), TableError> {
        let build_error = |e: aws_sdk_dynamodb::error::BuildError| TableError::Service(e.to_string());

        let key_schema = KeySchemaElement::builder()
            .attribute_name(&table.hash_key)
            .key_type(KeyType::Hash)
            .build()
            .map_err(build_error)?;
        let attribute_definition = AttributeDefinition::builder()
            .attribute_name(&table.hash_key)
            .attribute_type(ScalarAttributeType::S)
            .build()
            .map_err(build_error)?;
        let throughput = ProvisionedThroughput::builder()
            .read_capacity_units(table.read_capacity_units)
            .write_capacity_units(table.write_capacity_units)
            .build()
            .map_err(build_error)?;

        self.client
            .create_table()
            .table_name(&table.name)
            .key_schema(key_schema)
            .attribute_definitions(attribute_definition)
            .provisioned_throughput(throughput)
            .send()
            .await
            .map_err(|err| {
                if matches!(
                    err.as_service_error(),
                    Some(CreateTableError::ResourceInUseException(_))
                ) {
                    TableError::TableExists(table.name.clone())
                } else {
                    service_error(err)
                }
            })?;

        Ok(())
    }

    async fn get_item(&self, table: &TableOptions, key_value: &str) -> Result<Option<SessionItem>, TableError> {
        let (name, value) = key(table, key_value);
        let output = self
            .client
            .get_item()
            .table_name(&table.name)
            .key(name, value)
            .consistent_read(true)
            .send()
            .await
            .map_err(service_error)?;

        output
            .item
            .map(|item| attribute::from_item(&table.hash_key, item))
            .transpose()
    }

    async fn put_item(&self, table: &TableOptions, item: SessionItem) -> Result<(), TableError> {
        self.client
            .put_item()
            .table_name(&table.name)
            .set_item(Some(attribute::to_item(&table.hash_key, item)))
            .send()
            .await
            .map_err(service_error)?;

        Ok(())
    }

    async fn update_expiry(
        &self,
        table: &TableOptions,
        key_value: &str,
        expires: i64,
        updated: i64,
    ) -> Result<bool, TableError> {
        let (name, value) = key(table, key_value);
        let result = self
            .client
            .update_item()
            .table_name(&table.name)
            .key(name, value)
            .update_expression("SET #e = :e, #s.#up = :n")
            .condition_expression("attribute_exists(#k)")
            .expression_attribute_names("#k", &table.hash_key)
            .expression_attribute_names("#e", EXPIRES_ATTRIBUTE)
            .expression_attribute_names("#s", SESSION_ATTRIBUTE)
            .expression_attribute_names("#up", UPDATED_FIELD)
            .expression_attribute_values(":e", AttributeValue::N(expires.to_string()))
            .expression_attribute_values(":n", AttributeValue::N(updated.to_string()))
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(err)
                if matches!(
                    err.as_service_error(),
                    Some(UpdateItemError::ConditionalCheckFailedException(_))
                ) =>
            {
                Ok(false)
            }
            Err(err) => Err(service_error(err)),
        }
    }

    async fn delete_item(&self, table: &TableOptions, key_value: &str) -> Result<(), TableError> {
        let (name, value) = key(table, key_value);
        self.client
            .delete_item()
            .table_name(&table.name)
            .key(name, value)
            .send()
            .await
            .map_err(service_error)?;

        Ok(())
    }

    async fn scan_expired(&self, table: &TableOptions, now: i64) -> Result<Vec<String>, TableError> {
        let mut filter = String::from("(attribute_not_exists(#e) OR #e <= :now)");
        if !table.hash_prefix.is_empty() {
            filter.push_str(" AND begins_with(#k, :prefix)");
        }

        let mut keys = Vec::new();
        let mut start_key: Option<Item> = None;
        loop {
            let mut request = self
                .client
                .scan()
                .table_name(&table.name)
                .projection_expression("#k")
                .filter_expression(filter.as_str())
                .expression_attribute_names("#k", &table.hash_key)
                .expression_attribute_names("#e", EXPIRES_ATTRIBUTE)
                .expression_attribute_values(":now", AttributeValue::N(now.to_string()))
                .set_exclusive_start_key(start_key.take());
            if !table.hash_prefix.is_empty() {
                request = request
                    .expression_attribute_values(":prefix", AttributeValue::S(table.hash_prefix.clone()));
            }

            let output = request.send().await.map_err(service_error)?;
            for mut item in output.items.unwrap_or_default() {
                if let Some(AttributeValue::S(key)) = item.remove(&table.hash_key) {
                    keys.push(key);
                }
            }

            match output.last_evaluated_key {
                Some(last) if !last.is_empty() => start_key = Some(last),
                _ => break,
            }
        }

        Ok(keys)
    }
}
