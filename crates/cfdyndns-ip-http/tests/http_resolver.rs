//! HTTP-level tests against a mock lookup service

use cfdyndns_core::Error;
use cfdyndns_core::traits::{AddressResolver, IpVersion};
use cfdyndns_ip_http::HttpAddressResolver;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn service(status: u16, body: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .expect(1)
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn plain_text_ipv4_is_resolved() {
    let server = service(200, "203.0.113.7\n").await;
    let resolver = HttpAddressResolver::new(server.uri()).unwrap();

    let address = resolver.resolve().await.unwrap();
    assert_eq!(address.to_string(), "203.0.113.7");
    assert_eq!(address.version(), IpVersion::V4);
}

#[tokio::test]
async fn plain_text_ipv6_is_resolved() {
    let server = service(200, "2001:db8::1").await;
    let resolver = HttpAddressResolver::new(server.uri()).unwrap();

    let address = resolver.resolve().await.unwrap();
    assert_eq!(address.version(), IpVersion::V6);
}

#[tokio::test]
async fn non_success_status_is_a_resolution_error() {
    let server = service(503, "try later").await;
    let resolver = HttpAddressResolver::new(server.uri()).unwrap();

    let err = resolver.resolve().await.unwrap_err();
    assert!(matches!(err, Error::Resolution(_)));
}

#[tokio::test]
async fn garbage_body_is_a_resolution_error() {
    let server = service(200, "<html>hello</html>").await;
    let resolver = HttpAddressResolver::new(server.uri()).unwrap();

    let err = resolver.resolve().await.unwrap_err();
    assert!(matches!(err, Error::Resolution(_)));
}

#[tokio::test]
async fn required_family_is_enforced() {
    let server = service(200, "203.0.113.7").await;
    let resolver = HttpAddressResolver::new(server.uri())
        .unwrap()
        .require(IpVersion::V6);

    let err = resolver.resolve().await.unwrap_err();
    assert!(matches!(err, Error::Resolution(_)));
}
