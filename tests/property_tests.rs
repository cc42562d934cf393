use fixturesrv::http::{QueryParams, Response};
use fixturesrv::{CompletionBarrier, RequestDispatcher, RequestView, Route, any_content_encoding_specified};
use fixturesrv::http::Session;
use http::{Method, StatusCode, Version};
use proptest::prelude::*;
use std::time::Duration;

fn session(path: &str) -> Session {
    Session {
        method: Method::GET,
        uri: path.to_string(),
        version: Version::HTTP_11,
        headers: Default::default(),
        query: QueryParams::default(),
        body: Default::default(),
        remote_addr: None,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: values for one key come back in the order they were sent
    #[test]
    fn query_values_keep_their_order(values in prop::collection::vec("[a-z0-9]{1,8}", 1..10)) {
        let query = values
            .iter()
            .map(|value| format!("key={value}&other=x"))
            .collect::<Vec<_>>()
            .join("&");
        let params = QueryParams::parse(&query);

        prop_assert_eq!(params.get_all("key"), values.as_slice());
        prop_assert_eq!(params.get_all("other").len(), values.len());
        prop_assert_eq!(params.keys().collect::<Vec<_>>(), vec!["key", "other"]);
    }

    /// Property: a flush returns once every ticket opened before it is closed
    #[test]
    fn flush_completes_after_all_tickets_close(count in 0usize..40) {
        tokio_test::block_on(async {
            let barrier = CompletionBarrier::new();
            let tickets: Vec<_> = (0..count).map(|_| barrier.open()).collect();
            prop_assert_eq!(barrier.outstanding(), count);

            let closer = tokio::spawn(async move {
                for ticket in tickets {
                    tokio::task::yield_now().await;
                    ticket.close();
                }
            });

            tokio::time::timeout(Duration::from_secs(5), barrier.flush())
                .await
                .map_err(|_| TestCaseError::fail("flush never completed"))?;
            prop_assert_eq!(barrier.outstanding(), 0);
            closer.await.map_err(|e| TestCaseError::fail(e.to_string()))?;
            Ok(())
        })?;
    }

    /// Property: a declared encoding is any list holding at least one real token
    #[test]
    fn content_encoding_specified_iff_some_token_present(
        entries in prop::collection::vec(
            prop_oneof![
                "[ ]{0,3}".prop_map(|blank| (blank, false)),
                "[a-z]{1,8}".prop_map(|token| (format!(" {token} "), true)),
            ],
            0..5,
        )
    ) {
        let value = entries.iter().map(|(text, _)| text.as_str()).collect::<Vec<_>>().join(",");
        let has_token = entries.iter().any(|(_, is_token)| *is_token);

        let response = Response::text(StatusCode::OK, "x").with_header("Content-Encoding", value);
        prop_assert_eq!(any_content_encoding_specified(&response), has_token);
    }

    /// Property: the counters never report more matches than requests
    #[test]
    fn matched_never_exceeds_heard(paths in prop::collection::vec("/[ab]{0,3}", 0..30)) {
        let dispatcher = RequestDispatcher::with_routes([Route::new(
            |request| request.path().starts_with("/a"),
            |_| Some(Response::text(StatusCode::OK, "a")),
        )]);

        for path in &paths {
            let session = session(path);
            dispatcher.handle(&RequestView::new(&session));
        }

        let expected_matches = paths.iter().filter(|path| path.starts_with("/a")).count() as u64;
        prop_assert_eq!(dispatcher.heard_count(), paths.len() as u64);
        prop_assert_eq!(dispatcher.matched_count(), expected_matches);
        prop_assert!(dispatcher.matched_count() <= dispatcher.heard_count());
    }
}
