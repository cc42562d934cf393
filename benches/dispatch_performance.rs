use bytes::Bytes;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use fixturesrv::http::{FixtureClient, Response, Session};
use fixturesrv::{CompletionBarrier, FixtureServer, RequestDispatcher, RequestView, Route};
use http::{Method, StatusCode, Version};
use std::net::SocketAddr;
use tokio::runtime::Runtime;

fn session(path: &str) -> Session {
    Session {
        method: Method::GET,
        uri: path.to_string(),
        version: Version::HTTP_11,
        headers: [("Host", "localhost"), ("Accept", "*/*")].into_iter().collect(),
        query: Default::default(),
        body: Bytes::new(),
        remote_addr: None,
    }
}

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");

    for routes in [1usize, 10, 100] {
        let dispatcher = RequestDispatcher::with_routes((0..routes).map(|i| {
            let path = format!("/route/{i}");
            Route::new(
                move |request| request.path() == path,
                |_| Some(Response::text(StatusCode::OK, "ok")),
            )
        }));
        let last = session(&format!("/route/{}", routes - 1));
        let miss = session("/missing");

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("last_route", routes), &last, |b, session| {
            b.iter(|| dispatcher.handle(black_box(&RequestView::new(session))))
        });
        group.bench_with_input(BenchmarkId::new("default", routes), &miss, |b, session| {
            b.iter(|| dispatcher.handle(black_box(&RequestView::new(session))))
        });
    }

    group.finish();
}

fn bench_barrier(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("barrier");

    let barrier = CompletionBarrier::new();
    group.bench_function("open_close", |b| {
        b.iter(|| barrier.open().close())
    });

    for tickets in [1usize, 25, 100] {
        group.bench_with_input(BenchmarkId::new("flush_after_close", tickets), &tickets, |b, &tickets| {
            b.to_async(&rt).iter(|| async {
                let barrier = CompletionBarrier::new();
                let open: Vec<_> = (0..tickets).map(|_| barrier.open()).collect();
                let closer = tokio::spawn(async move { drop(open) });
                barrier.flush().await;
                closer.await.unwrap();
            })
        });
    }

    group.finish();
}

fn bench_round_trip(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("round_trip");

    let server = FixtureServer::builder()
        .get_path("/hello", |_| Response::text(StatusCode::OK, "Hello, world!"))
        .build();
    let control = rt.block_on(server.start_server()).unwrap();
    let addr = SocketAddr::from(([127, 0, 0, 1], control.listening_port().unwrap()));
    let mut client = rt.block_on(FixtureClient::connect(addr)).unwrap();

    group.bench_function("keep_alive_get", |b| {
        b.iter(|| {
            let response = rt.block_on(client.get("/hello")).unwrap();
            assert_eq!(response.status, StatusCode::OK);
        })
    });
    group.bench_function("get_then_flush", |b| {
        b.iter(|| {
            rt.block_on(async {
                client.get("/hello").await.unwrap();
                control.flush().await.unwrap();
            })
        })
    });

    group.finish();
    drop(client);
    let mut control = control;
    rt.block_on(control.stop());
}

criterion_group!(benches, bench_dispatch, bench_barrier, bench_round_trip);
criterion_main!(benches);
