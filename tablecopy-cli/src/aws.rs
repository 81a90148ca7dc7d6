//! DynamoDB client construction with optional cross-account role assumption.

use aws_config::sts::AssumeRoleProvider;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_sdk_dynamodb::Client;
use tracing::info;

/// Session name visible in the audit trail of assumed-role calls.
const SESSION_NAME: &str = "tablecopy";

async fn load_base_config(region: Option<String>) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = region {
        loader = loader.region(Region::new(region));
    }

    loader.load().await
}

/// Builds a DynamoDB client for one side of the copy.
///
/// Without a role ARN the ambient credential chain is used as-is; with one,
/// the role is assumed on top of the ambient credentials. The region defaults
/// to the environment's.
pub async fn dynamodb_client(region: Option<String>, role_arn: Option<String>) -> Client {
    let base = load_base_config(region).await;

    let Some(role_arn) = role_arn else {
        return Client::new(&base);
    };

    info!(role_arn = %role_arn, "assuming role for table access");

    let provider = AssumeRoleProvider::builder(role_arn)
        .session_name(SESSION_NAME)
        .configure(&base)
        .build()
        .await;
    let config = base
        .to_builder()
        .credentials_provider(SharedCredentialsProvider::new(provider))
        .build();

    Client::new(&config)
}
