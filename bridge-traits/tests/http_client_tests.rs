//! Contract tests for the default `HttpClient` methods.

use bridge_traits::error::{BridgeError, Result};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use bytes::Bytes;
use mockall::mock;
use std::collections::HashMap;

mock! {
    pub Client {}

    #[async_trait::async_trait]
    impl HttpClient for Client {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
    }
}

#[tokio::test]
async fn execute_with_retry_defaults_to_single_execute() {
    let mut client = MockClient::new();
    client
        .expect_execute()
        .withf(|req| req.url == "http://localhost/audio/a.wav" && req.method == HttpMethod::Get)
        .times(1)
        .returning(|_| {
            Ok(HttpResponse {
                status: 200,
                headers: HashMap::new(),
                body: Bytes::from_static(b"RIFF"),
            })
        });

    let response = client
        .execute_with_retry(
            HttpRequest::new(HttpMethod::Get, "http://localhost/audio/a.wav"),
            RetryPolicy::default(),
        )
        .await
        .unwrap();

    assert!(response.is_success());
    assert_eq!(response.body, Bytes::from_static(b"RIFF"));
}

#[tokio::test]
async fn execute_with_retry_propagates_transport_errors() {
    let mut client = MockClient::new();
    client.expect_execute().times(1).returning(|_| {
        Err(BridgeError::OperationFailed("connection refused".to_string()))
    });

    let result = client
        .execute_with_retry(
            HttpRequest::new(HttpMethod::Get, "http://localhost/audio/a.wav"),
            RetryPolicy::default(),
        )
        .await;

    assert!(matches!(result, Err(BridgeError::OperationFailed(_))));
}
