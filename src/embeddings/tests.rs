use std::time::Duration;

use super::*;
use crate::config::EmbeddingConfig;

#[test]
fn client_configuration() {
    let config = EmbeddingConfig {
        endpoint: "http://test-host:1234/api/embed".to_string(),
        model: "test-model".to_string(),
        batch_size: 128,
        timeout_seconds: 30,
    };
    let client = HttpEmbeddingClient::new(&config).expect("Failed to create client");

    assert_eq!(client.model, "test-model");
    assert_eq!(client.batch_size, 128);
    assert_eq!(client.endpoint.host_str(), Some("test-host"));
    assert_eq!(client.endpoint.port(), Some(1234));
    assert_eq!(client.retry_attempts, DEFAULT_RETRY_ATTEMPTS);
}

#[test]
fn client_builder_methods() {
    let config = EmbeddingConfig::default();
    let client = HttpEmbeddingClient::new(&config)
        .expect("Failed to create client")
        .with_timeout(Duration::from_secs(60))
        .with_retry_attempts(5);

    assert_eq!(client.retry_attempts, 5);
}

#[test]
fn invalid_endpoint_is_rejected() {
    let config = EmbeddingConfig {
        endpoint: "not a url".to_string(),
        ..EmbeddingConfig::default()
    };
    assert!(HttpEmbeddingClient::new(&config).is_err());
}

#[test]
fn probe_dimension_uses_single_embedding() {
    let stub = StubEmbedder::default();
    let dimension = stub.probe_dimension().expect("probe should succeed");

    assert_eq!(dimension, StubEmbedder::DIMENSION);
    assert_eq!(stub.call_count(), 1);
}

#[test]
fn stub_embedder_is_deterministic() {
    let stub = StubEmbedder::default();
    let texts = vec!["cement price".to_string(), "delivery options".to_string()];

    let first = stub.embed(&texts).expect("embed should succeed");
    let second = stub.embed(&texts).expect("embed should succeed");

    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
    assert!(first.iter().all(|v| v.len() == StubEmbedder::DIMENSION));
}

#[test]
fn stub_embedder_surfaces_failures() {
    let stub = StubEmbedder::default();
    stub.fail_next.store(true, std::sync::atomic::Ordering::SeqCst);

    let result = stub.embed(&["anything".to_string()]);
    assert!(matches!(
        result,
        Err(SupportError::ExternalService {
            capability: Capability::Embedding,
            ..
        })
    ));
}
