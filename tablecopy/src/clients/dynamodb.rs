//! DynamoDB-backed table service.
//!
//! Maps the crate's value model onto the SDK's at the boundary and classifies
//! SDK errors into [`ErrorKind`]s so the retry loop can trust them. Parallel
//! scans use the service's native `Segment`/`TotalSegments` partitioning, and
//! batch writes surface `UnprocessedItems` as the pending subset.

use std::collections::HashMap;
use std::error;
use std::fmt;

use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::{
    AttributeValue as SdkAttributeValue, PutRequest, WriteRequest as SdkWriteRequest,
};
use tracing::debug;

use crate::clients::{ScanPage, TableDestination, TableSource};
use crate::copy_error;
use crate::error::{CopyError, CopyResult, ErrorKind};
use crate::types::{AttributeValue, Item, SegmentDescriptor, WriteEnvelope, WriteRequest};

/// Table service client backed by DynamoDB.
#[derive(Debug, Clone)]
pub struct DynamoDbTableClient {
    client: Client,
}

impl DynamoDbTableClient {
    /// Wraps an already-configured SDK client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl TableSource for DynamoDbTableClient {
    async fn scan_page(
        &self,
        table: &str,
        segment: &SegmentDescriptor,
    ) -> CopyResult<ScanPage> {
        let exclusive_start_key = segment
            .cursor()
            .map(|cursor| to_sdk_item(cursor.clone()));

        let output = self
            .client
            .scan()
            .table_name(table)
            .segment(segment.index() as i32)
            .total_segments(segment.total_segments() as i32)
            .set_exclusive_start_key(exclusive_start_key)
            .send()
            .await
            .map_err(|err| classify_sdk_error("scan", ErrorKind::SourceScanFailed, err))?;

        let mut items = Vec::new();
        for sdk_item in output.items.unwrap_or_default() {
            items.push(from_sdk_item(sdk_item)?);
        }

        let cursor = match output.last_evaluated_key {
            Some(key) => Some(from_sdk_item(key)?),
            None => None,
        };

        debug!(
            table,
            segment = segment.index(),
            items = items.len(),
            has_cursor = cursor.is_some(),
            "fetched scan page"
        );

        Ok(ScanPage { items, cursor })
    }
}

impl TableDestination for DynamoDbTableClient {
    async fn write_batch(&self, envelope: WriteEnvelope) -> CopyResult<Vec<WriteRequest>> {
        let table = envelope.table().to_string();

        let mut sdk_requests = Vec::with_capacity(envelope.len());
        for request in envelope.into_requests() {
            let put = PutRequest::builder()
                .set_item(Some(to_sdk_item(request.into_item())))
                .build()
                .map_err(|err| {
                    copy_error!(
                        ErrorKind::ValidationError,
                        "Put request is missing its item payload",
                        source: err
                    )
                })?;
            sdk_requests.push(SdkWriteRequest::builder().put_request(put).build());
        }

        let output = self
            .client
            .batch_write_item()
            .request_items(&table, sdk_requests)
            .send()
            .await
            .map_err(|err| {
                classify_sdk_error("batch_write_item", ErrorKind::DestinationWriteFailed, err)
            })?;

        let pending = output
            .unprocessed_items
            .unwrap_or_default()
            .remove(&table)
            .unwrap_or_default();

        let mut unprocessed = Vec::with_capacity(pending.len());
        for sdk_request in pending {
            let Some(put) = sdk_request.put_request else {
                // The service only ever echoes back what was submitted, and
                // this client submits put requests exclusively.
                return Err(copy_error!(
                    ErrorKind::ConversionError,
                    "Unprocessed entry is not a put request"
                ));
            };
            unprocessed.push(WriteRequest::put(from_sdk_item(put.item)?));
        }

        Ok(unprocessed)
    }
}

/// Classifies a DynamoDB error code into an [`ErrorKind`] and description.
///
/// Transient capacity and availability conditions become retryable kinds;
/// everything else aborts the pipeline. Unrecognized codes fall back to the
/// operation's default kind.
fn kind_for_code(code: &str, default: ErrorKind) -> (ErrorKind, &'static str) {
    match code {
        "ProvisionedThroughputExceededException"
        | "ThrottlingException"
        | "RequestLimitExceeded"
        | "LimitExceededException" => (ErrorKind::Throttled, "Service throttled the request"),
        "InternalServerError" | "ServiceUnavailable" | "TransactionInProgressException" => (
            ErrorKind::ServiceUnavailable,
            "Service temporarily unavailable",
        ),
        "ResourceNotFoundException" => match default {
            ErrorKind::SourceScanFailed => {
                (ErrorKind::SourceTableMissing, "Source table does not exist")
            }
            _ => (
                ErrorKind::DestinationTableMissing,
                "Target table does not exist",
            ),
        },
        "UnrecognizedClientException"
        | "MissingAuthenticationToken"
        | "InvalidSignatureException"
        | "ExpiredTokenException" => (
            ErrorKind::AuthenticationError,
            "Service rejected the credentials",
        ),
        "AccessDeniedException" => (ErrorKind::PermissionDenied, "Access denied by the service"),
        "ValidationException" | "ItemCollectionSizeLimitExceededException" => {
            (ErrorKind::ValidationError, "Service rejected the request")
        }
        _ => (default, "Service call failed"),
    }
}

/// Converts an SDK error into a [`CopyError`], classifying service error codes
/// and treating transport-level failures as transient.
fn classify_sdk_error<E, R>(
    operation: &'static str,
    default: ErrorKind,
    err: SdkError<E, R>,
) -> CopyError
where
    E: ProvideErrorMetadata + error::Error + Send + Sync + 'static,
    R: fmt::Debug + Send + Sync + 'static,
{
    let (kind, description) = match &err {
        SdkError::ServiceError(context) => {
            let code = context.err().code().unwrap_or("");
            kind_for_code(code, default)
        }
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => (
            ErrorKind::ServiceUnavailable,
            "Service connection failed",
        ),
        _ => (default, "Service call failed"),
    };

    let detail = match err.as_service_error() {
        Some(service_err) => format!(
            "{operation}: {} ({})",
            service_err.message().unwrap_or("no message"),
            service_err.code().unwrap_or("no code")
        ),
        None => format!("{operation}: {err}"),
    };

    CopyError::from((kind, description, detail)).with_source(err)
}

fn to_sdk_value(value: AttributeValue) -> SdkAttributeValue {
    match value {
        AttributeValue::S(value) => SdkAttributeValue::S(value),
        AttributeValue::N(value) => SdkAttributeValue::N(value),
        AttributeValue::B(bytes) => SdkAttributeValue::B(Blob::new(bytes)),
        AttributeValue::Bool(value) => SdkAttributeValue::Bool(value),
        AttributeValue::Null(value) => SdkAttributeValue::Null(value),
        AttributeValue::L(values) => {
            SdkAttributeValue::L(values.into_iter().map(to_sdk_value).collect())
        }
        AttributeValue::M(map) => SdkAttributeValue::M(
            map.into_iter()
                .map(|(name, value)| (name, to_sdk_value(value)))
                .collect(),
        ),
        AttributeValue::StringSet(values) => SdkAttributeValue::Ss(values),
        AttributeValue::NumberSet(values) => SdkAttributeValue::Ns(values),
        AttributeValue::BinarySet(values) => {
            SdkAttributeValue::Bs(values.into_iter().map(Blob::new).collect())
        }
    }
}

fn from_sdk_value(value: SdkAttributeValue) -> CopyResult<AttributeValue> {
    let value = match value {
        SdkAttributeValue::S(value) => AttributeValue::S(value),
        SdkAttributeValue::N(value) => AttributeValue::N(value),
        SdkAttributeValue::B(blob) => AttributeValue::B(blob.into_inner()),
        SdkAttributeValue::Bool(value) => AttributeValue::Bool(value),
        SdkAttributeValue::Null(value) => AttributeValue::Null(value),
        SdkAttributeValue::L(values) => AttributeValue::L(
            values
                .into_iter()
                .map(from_sdk_value)
                .collect::<CopyResult<Vec<_>>>()?,
        ),
        SdkAttributeValue::M(map) => AttributeValue::M(
            map.into_iter()
                .map(|(name, value)| Ok((name, from_sdk_value(value)?)))
                .collect::<CopyResult<HashMap<_, _>>>()?,
        ),
        SdkAttributeValue::Ss(values) => AttributeValue::StringSet(values),
        SdkAttributeValue::Ns(values) => AttributeValue::NumberSet(values),
        SdkAttributeValue::Bs(values) => {
            AttributeValue::BinarySet(values.into_iter().map(Blob::into_inner).collect())
        }
        other => {
            return Err(copy_error!(
                ErrorKind::ConversionError,
                "Unsupported attribute value type",
                format!("{other:?}")
            ));
        }
    };

    Ok(value)
}

fn to_sdk_item(item: Item) -> HashMap<String, SdkAttributeValue> {
    item.into_attributes()
        .into_iter()
        .map(|(name, value)| (name, to_sdk_value(value)))
        .collect()
}

fn from_sdk_item(item: HashMap<String, SdkAttributeValue>) -> CopyResult<Item> {
    let attributes = item
        .into_iter()
        .map(|(name, value)| Ok((name, from_sdk_value(value)?)))
        .collect::<CopyResult<HashMap<_, _>>>()?;

    Ok(Item::from_attributes(attributes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throughput_and_availability_codes_are_retryable() {
        for code in [
            "ProvisionedThroughputExceededException",
            "ThrottlingException",
            "InternalServerError",
            "ServiceUnavailable",
        ] {
            let (kind, _) = kind_for_code(code, ErrorKind::DestinationWriteFailed);
            assert!(kind.is_retryable(), "{code} should be retryable");
        }
    }

    #[test]
    fn permanent_codes_abort_the_copy() {
        for code in [
            "ValidationException",
            "AccessDeniedException",
            "UnrecognizedClientException",
            "SomeFutureException",
        ] {
            let (kind, _) = kind_for_code(code, ErrorKind::DestinationWriteFailed);
            assert!(!kind.is_retryable(), "{code} should not be retryable");
        }
    }

    #[test]
    fn missing_table_maps_per_operation_side() {
        let (kind, _) = kind_for_code("ResourceNotFoundException", ErrorKind::SourceScanFailed);
        assert_eq!(kind, ErrorKind::SourceTableMissing);

        let (kind, _) =
            kind_for_code("ResourceNotFoundException", ErrorKind::DestinationWriteFailed);
        assert_eq!(kind, ErrorKind::DestinationTableMissing);
    }

    #[test]
    fn value_conversion_round_trips() {
        let value = AttributeValue::M(HashMap::from([
            ("name".to_string(), AttributeValue::string("a")),
            ("count".to_string(), AttributeValue::number("3")),
            (
                "tags".to_string(),
                AttributeValue::L(vec![
                    AttributeValue::Bool(true),
                    AttributeValue::B(vec![1, 2, 3]),
                ]),
            ),
        ]));

        let round_tripped = from_sdk_value(to_sdk_value(value.clone())).unwrap();
        assert_eq!(round_tripped, value);
    }
}
