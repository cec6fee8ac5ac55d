use mockito::Matcher;
use panopto_util::{
    arguments, error::Error, Client, HttpRequest, Reply, ReqwestTransport, Scalar, Transport,
};
use std::{sync::Arc, time::Duration};
use url::Url;

const USAGE_REPORTING: &str = include_str!("../../wsdl/tests/fixtures/UsageReporting.wsdl");

#[test]
fn test_post_returns_status_headers_and_body() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/Auth.svc")
        .match_header("content-type", "text/xml; charset=utf-8")
        .match_body("<request/>")
        .with_status(500)
        .with_header("Set-Cookie", ".ASPXAUTH=token; path=/")
        .with_body("failure")
        .create();

    let transport = ReqwestTransport::new();
    let response = transport
        .post(HttpRequest {
            url: Url::parse(&format!("{}/Auth.svc", server.url())).unwrap(),
            headers: vec![(
                "Content-Type".to_owned(),
                "text/xml; charset=utf-8".to_owned(),
            )],
            body: b"<request/>".to_vec(),
        })
        .unwrap();

    mock.assert();
    assert_eq!(response.status, 500);
    assert!(!response.is_success());
    assert_eq!(response.header("set-cookie"), Some(".ASPXAUTH=token; path=/"));
    assert_eq!(&response.body[..], b"failure");
}

#[test]
fn test_client_round_trip_over_http() {
    let mut server = mockito::Server::new();

    let wsdl = server
        .mock("GET", Matcher::Regex(r"^/UsageReporting\.svc".to_owned()))
        .with_body(USAGE_REPORTING)
        .create();

    let call = server
        .mock("POST", "/UsageReporting.svc")
        .match_header("soapaction", "\"http://tempuri.org/IUsageReporting/Ping\"")
        .match_header("cookie", "session=1")
        .with_status(200)
        .with_body(
            r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><PingResponse xmlns="http://tempuri.org/"><PingResult>pong</PingResult></PingResponse></s:Body></s:Envelope>"#,
        )
        .create();

    let transport = Arc::new(ReqwestTransport::with_timeout(Duration::from_secs(10)).unwrap());
    let mut client = Client::from_url_with(
        &format!("{}/UsageReporting.svc?singleWsdl", server.url()),
        transport,
    )
    .unwrap();

    client
        .set_address(&format!("{}/UsageReporting.svc", server.url()))
        .unwrap();
    client.set_header("Cookie", "session=1");

    let reply = client.call("Ping", &arguments! {}).unwrap();

    wsdl.assert();
    call.assert();
    assert_eq!(reply, Reply::Scalar(Scalar::String("pong".into())));
}

#[test]
fn test_failed_description_fetch_is_reported() {
    let mut server = mockito::Server::new();
    let _missing = server
        .mock("GET", Matcher::Any)
        .with_status(404)
        .create();

    let result = Client::from_url_with(
        &format!("{}/Missing.svc?singleWsdl", server.url()),
        Arc::new(ReqwestTransport::new()),
    );

    assert!(matches!(result, Err(Error::Wsdl(_))));
}
