use weft::http::request::{Method, Request, RequestBuilder};
use weft::http::response::Response;
use weft::{Error, ServiceRouter};

fn get(target: &str) -> Request {
    RequestBuilder::new()
        .method(Method::GET)
        .target(target)
        .build()
        .unwrap()
}

fn label(name: &'static str) -> impl Fn(&Request, &[String]) -> Response + Send + Sync {
    move |_: &Request, args: &[String]| Response::ok(format!("{name}:{}", args.join(",")))
}

fn dispatch(router: &ServiceRouter, path: &str) -> Option<String> {
    router
        .resolve(path)
        .map(|(service, args)| service.handle(&get(path), &args).text())
}

#[test]
fn test_literal_route_matches_exactly() {
    let mut router = ServiceRouter::new();
    router.add("/health", false, label("health")).unwrap();

    assert_eq!(dispatch(&router, "/health").as_deref(), Some("health:"));
    assert_eq!(dispatch(&router, "/health/extra"), None);
    assert_eq!(dispatch(&router, "/"), None);
}

#[test]
fn test_literal_route_must_start_with_slash() {
    let mut router = ServiceRouter::new();
    let result = router.add("health", false, label("health"));
    assert!(matches!(result, Err(Error::RoutePattern { .. })));
    assert!(router.is_empty());
}

#[test]
fn test_regex_route_captures() {
    let mut router = ServiceRouter::new();
    router
        .add(r"/books/(\d+)/pages/(\d+)", true, label("page"))
        .unwrap();

    assert_eq!(
        dispatch(&router, "/books/12/pages/7").as_deref(),
        Some("page:12,7")
    );
    assert_eq!(dispatch(&router, "/books/x/pages/7"), None);
    // The whole path has to match.
    assert_eq!(dispatch(&router, "/books/12/pages/7/notes"), None);
}

#[test]
fn test_regex_route_ignores_case() {
    let mut router = ServiceRouter::new();
    router.add("/items/([a-z]+)", true, label("item")).unwrap();

    assert_eq!(dispatch(&router, "/ITEMS/Abc").as_deref(), Some("item:Abc"));
}

#[test]
fn test_optional_group_yields_empty_argument() {
    let mut router = ServiceRouter::new();
    router.add("/files(/(.*))?", true, label("files")).unwrap();

    assert_eq!(dispatch(&router, "/files").as_deref(), Some("files:,"));
    assert_eq!(
        dispatch(&router, "/files/a.txt").as_deref(),
        Some("files:/a.txt,a.txt")
    );
}

#[test]
fn test_first_registered_route_wins() {
    let mut router = ServiceRouter::new();
    router.add("/users/me", false, label("me")).unwrap();
    router.add("/users/(.+)", true, label("user")).unwrap();
    router.add("/users/me", false, label("shadowed")).unwrap();

    assert_eq!(router.len(), 3);
    assert_eq!(dispatch(&router, "/users/me").as_deref(), Some("me:"));
    assert_eq!(dispatch(&router, "/users/ann").as_deref(), Some("user:ann"));
}

#[test]
fn test_invalid_regex_is_rejected() {
    let mut router = ServiceRouter::new();
    let result = router.add("/broken/(", true, label("broken"));
    assert!(matches!(result, Err(Error::RoutePattern { .. })));
}

#[test]
fn test_item_id_capture() {
    let mut router = ServiceRouter::new();
    router.add(r"/items/(\d+)", true, label("item")).unwrap();

    let (_, args) = router.resolve("/items/42").unwrap();
    assert_eq!(args, vec!["42".to_string()]);
    assert!(router.resolve("/items/abc").is_none());
}

#[test]
fn test_overlapping_regexes_resolve_to_first() {
    let mut router = ServiceRouter::new();
    router.add(r"/x/(\d+)", true, label("a")).unwrap();
    router.add(r"/x/(.*)", true, label("b")).unwrap();

    for _ in 0..10 {
        assert_eq!(dispatch(&router, "/x/1").as_deref(), Some("a:1"));
    }
}
