use super::{RequestDispatcher, RequestView, Route, abbreviate, not_found, not_found_response};
use crate::http::{Response, Session};
use bytes::Bytes;
use http::{Method, StatusCode, Version};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn session(method: Method, uri: &str) -> Session {
    let query = uri
        .split_once('?')
        .map(|(_, q)| crate::http::QueryParams::parse(q))
        .unwrap_or_default();
    Session {
        method,
        uri: uri.to_string(),
        version: Version::HTTP_11,
        headers: [("Host", "localhost"), ("X-Api-Key", "secret")].into_iter().collect(),
        query,
        body: Bytes::new(),
        remote_addr: None,
    }
}

fn text(body: &'static str) -> Response {
    Response::text(StatusCode::OK, body)
}

#[test]
fn test_first_accepting_route_wins() {
    let dispatcher = RequestDispatcher::with_routes([
        Route::new(|_| false, |_| Some(text("A"))),
        Route::new(|_| true, |_| Some(text("B"))),
        Route::new(|_| true, |_| Some(text("C"))),
    ]);

    let session = session(Method::GET, "/");
    let response = dispatcher.handle(&RequestView::new(&session));

    assert_eq!(response.body().as_ref(), b"B");
    assert_eq!(dispatcher.heard_count(), 1);
    assert_eq!(dispatcher.matched_count(), 1);
}

#[test]
fn test_later_routes_are_not_evaluated_after_a_match() {
    let evaluated = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&evaluated);
    let dispatcher = RequestDispatcher::with_routes([
        Route::new(|_| true, |_| Some(text("first"))),
        Route::new(
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            },
            |_| Some(text("second")),
        ),
    ]);

    let session = session(Method::GET, "/");
    dispatcher.handle(&RequestView::new(&session));
    assert_eq!(evaluated.load(Ordering::SeqCst), 0);
}

#[test]
fn test_unmatched_request_gets_default_without_counting_a_match() {
    let dispatcher = RequestDispatcher::with_routes([Route::new(
        |request| request.path() == "/hello",
        |_| Some(text("hello")),
    )]);

    let session = session(Method::GET, "/missing?x=1");
    let response = dispatcher.handle(&RequestView::new(&session));

    assert_eq!(response, not_found_response());
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(dispatcher.heard_count(), 1);
    assert_eq!(dispatcher.matched_count(), 0);
}

#[test]
fn test_responder_declining_lets_the_walk_continue() {
    let dispatcher = RequestDispatcher::with_routes([
        Route::responder(|request| (request.method() == Method::POST).then(|| text("post"))),
        Route::responder(|_| Some(text("fallthrough"))),
    ]);

    let get = session(Method::GET, "/");
    assert_eq!(dispatcher.handle(&RequestView::new(&get)).body().as_ref(), b"fallthrough");

    let post = session(Method::POST, "/");
    assert_eq!(dispatcher.handle(&RequestView::new(&post)).body().as_ref(), b"post");

    assert_eq!(dispatcher.heard_count(), 2);
    assert_eq!(dispatcher.matched_count(), 2);
}

#[test]
fn test_custom_default_responder() {
    let dispatcher = RequestDispatcher::new(
        Vec::new(),
        Arc::new(|request: &RequestView<'_>| {
            Response::text(StatusCode::IM_A_TEAPOT, format!("no {}", request.path()))
        }),
    );

    let session = session(Method::GET, "/tea");
    let response = dispatcher.handle(&RequestView::new(&session));
    assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
    assert_eq!(response.body().as_ref(), b"no /tea");
    assert_eq!(dispatcher.matched_count(), 0);
}

#[test]
fn test_default_response_is_stable() {
    let default = not_found();
    let session = session(Method::GET, "/nothing");
    let first = default(&RequestView::new(&session));
    for _ in 0..100 {
        assert_eq!(default(&RequestView::new(&session)), first);
    }
    assert_eq!(first.body().as_ref(), b"404 Not Found");
    assert_eq!(first.mime_type(), "text/plain; charset=us-ascii");
}

#[test]
fn test_request_view_accessors() {
    let session = session(Method::GET, "/search?tag=a&tag=b&page=2");
    let view = RequestView::from(&session);

    assert_eq!(view.method(), Method::GET);
    assert_eq!(view.path(), "/search");
    assert_eq!(view.query().get_all("tag"), ["a", "b"]);
    assert_eq!(view.query().get("page"), Some("2"));
    assert_eq!(view.header("X-Api-Key"), Some("secret"));
    assert_eq!(view.header("x-api-key"), Some("secret"));
    assert_eq!(view.header("x-missing"), None);
    assert_eq!(view.uri(), "/search?tag=a&tag=b&page=2");
}

#[test]
fn test_counters_under_concurrency() {
    let dispatcher = Arc::new(RequestDispatcher::with_routes([Route::new(
        |request| request.path() == "/hit",
        |_| Some(text("hit")),
    )]));

    let threads: Vec<_> = (0..8)
        .map(|i| {
            let dispatcher = Arc::clone(&dispatcher);
            std::thread::spawn(move || {
                let path = if i % 2 == 0 { "/hit" } else { "/miss" };
                let session = session(Method::GET, path);
                for _ in 0..250 {
                    dispatcher.handle(&RequestView::new(&session));
                }
            })
        })
        .collect();
    for thread in threads {
        thread.join().unwrap();
    }

    assert_eq!(dispatcher.heard_count(), 2000);
    assert_eq!(dispatcher.matched_count(), 1000);
}

#[test]
fn test_abbreviate() {
    assert_eq!(abbreviate("short", 128), "short");
    let long = "x".repeat(200);
    let cut = abbreviate(&long, 128);
    assert_eq!(cut.chars().count(), 128);
    assert!(cut.ends_with("..."));
}
