use weft::http::encoding::{GZIP_THRESHOLD, compress_response, decode_body, gunzip, gzip};
use weft::http::message::Message;
use weft::http::request::{Method, RequestBuilder};
use weft::http::response::{Response, ResponseBuilder, StatusCode};
use weft::http::writer::serialize;

#[test]
fn test_status_code_as_u16() {
    assert_eq!(StatusCode::Ok.as_u16(), 200);
    assert_eq!(StatusCode::NoContent.as_u16(), 204);
    assert_eq!(StatusCode::BadRequest.as_u16(), 400);
    assert_eq!(StatusCode::NotFound.as_u16(), 404);
    assert_eq!(StatusCode::InternalServerError.as_u16(), 500);
    assert_eq!(StatusCode::Other(418).as_u16(), 418);
}

#[test]
fn test_status_code_from_u16() {
    assert_eq!(StatusCode::from_u16(200), StatusCode::Ok);
    assert_eq!(StatusCode::from_u16(503), StatusCode::ServiceUnavailable);
    assert_eq!(StatusCode::from_u16(299), StatusCode::Other(299));
    assert!(StatusCode::from_u16(299).is_success());
    assert!(!StatusCode::NotFound.is_success());
}

#[test]
fn test_status_code_reason_phrase() {
    assert_eq!(StatusCode::Ok.reason_phrase(), "OK");
    assert_eq!(StatusCode::NotModified.reason_phrase(), "Not Modified");
    assert_eq!(
        StatusCode::InternalServerError.reason_phrase(),
        "Internal Server Error"
    );
}

#[test]
fn test_response_builder_with_headers() {
    let response = ResponseBuilder::new(StatusCode::Created)
        .header("Content-Type", "text/plain")
        .header("X-Custom", "value")
        .body(b"test".to_vec())
        .build();

    assert_eq!(response.status, StatusCode::Created);
    assert_eq!(response.reason, "Created");
    assert_eq!(response.version, "HTTP/1.1");
    assert_eq!(response.headers.get("Content-Type"), Some("text/plain"));
    assert_eq!(response.headers.get("X-Custom"), Some("value"));
    assert_eq!(response.headers.get("Content-Length"), Some("4"));
    assert_eq!(response.content_length, Some(4));
}

#[test]
fn test_response_helpers() {
    assert_eq!(Response::ok("fine").text(), "fine");
    assert_eq!(Response::not_found().status, StatusCode::NotFound);
    assert_eq!(Response::bad_request().status, StatusCode::BadRequest);
    assert_eq!(
        Response::internal_error().status,
        StatusCode::InternalServerError
    );
    assert_eq!(Response::status(StatusCode::NoContent).body.len(), 0);
}

#[test]
fn test_serialize_response() {
    let response = ResponseBuilder::new(StatusCode::Ok)
        .header("Content-Type", "text/plain")
        .body("hi")
        .build();

    let wire = String::from_utf8(serialize(&response)).unwrap();
    assert_eq!(
        wire,
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 2\r\n\r\nhi"
    );
}

#[test]
fn test_bodiless_statuses() {
    assert!(!Response::status(StatusCode::NoContent).may_have_body());
    assert!(!Response::status(StatusCode::NotModified).may_have_body());
    assert!(!Response::status(StatusCode::Other(101)).may_have_body());
    assert!(Response::ok("x").may_have_body());
}

fn request_accepting(encoding: Option<&str>) -> weft::Request {
    let mut builder = RequestBuilder::new().method(Method::GET).target("/");
    if let Some(encoding) = encoding {
        builder = builder.header("Accept-Encoding", encoding);
    }
    builder.build().unwrap()
}

#[test]
fn test_large_body_is_gzipped_when_accepted() {
    let body = "weft ".repeat(GZIP_THRESHOLD);
    let mut response = Response::ok(body.clone());

    compress_response(&request_accepting(Some("gzip, deflate")), &mut response);

    assert_eq!(response.headers.get("Content-Encoding"), Some("gzip"));
    assert!(response.body.len() < body.len());
    assert_eq!(
        response.headers.get("Content-Length"),
        Some(response.body.len().to_string().as_str())
    );
    assert_eq!(gunzip(&response.body).unwrap(), body.into_bytes());
}

#[test]
fn test_small_or_unaccepted_bodies_stay_plain() {
    let mut small = Response::ok("x".repeat(GZIP_THRESHOLD));
    compress_response(&request_accepting(Some("gzip")), &mut small);
    assert!(small.headers.get("Content-Encoding").is_none());

    let mut large = Response::ok("x".repeat(GZIP_THRESHOLD * 2));
    compress_response(&request_accepting(None), &mut large);
    assert!(large.headers.get("Content-Encoding").is_none());
    assert_eq!(large.body.len(), GZIP_THRESHOLD * 2);
}

#[test]
fn test_decode_gzip_body() {
    let mut response = ResponseBuilder::new(StatusCode::Ok)
        .header("Content-Encoding", "gzip")
        .body(gzip(b"compressed payload").unwrap())
        .build();

    decode_body(&mut response).unwrap();

    assert_eq!(response.text(), "compressed payload");
    assert!(response.headers.get("Content-Encoding").is_none());
    assert_eq!(response.content_length, Some(18));
}

#[test]
fn test_decode_corrupt_body_fails() {
    let mut response = ResponseBuilder::new(StatusCode::Ok)
        .header("Content-Encoding", "gzip")
        .body(b"definitely not gzip".to_vec())
        .build();

    assert!(matches!(
        decode_body(&mut response),
        Err(weft::Error::Decompress { .. })
    ));
}
