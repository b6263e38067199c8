use bencher::{API_PATHS, API_PATTERNS, RouteCase, USERS_PATHS, USERS_PATTERNS};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use http::Method;
use micro_dispatch::handler_sync;
use micro_dispatch::router::{PathPattern, Router, get};
use std::hint::black_box;

fn create_route_cases() -> Vec<RouteCase> {
    vec![RouteCase::small("users", USERS_PATTERNS, USERS_PATHS), RouteCase::large("api", API_PATTERNS, API_PATHS)]
}

fn router_for(case: &RouteCase) -> Router {
    let mut router = Router::new();
    for pattern in case.patterns() {
        router.route(*pattern, get(handler_sync(|_ctx| {}))).expect("fixture patterns should be valid");
    }
    router
}

fn benchmark_match_path(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("match_path");

    for case in create_route_cases() {
        let patterns = case.patterns().iter().map(|pattern| PathPattern::new(*pattern)).collect::<Vec<_>>();
        group.throughput(Throughput::Elements((patterns.len() * case.paths().len()) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(case.name()), &case, |b, case| {
            b.iter(|| {
                for path in case.paths() {
                    for pattern in &patterns {
                        black_box(pattern.match_path(black_box(path)));
                    }
                }
            });
        });
    }

    group.finish();
}

fn benchmark_lookup(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("route_lookup");

    for case in create_route_cases() {
        let router = router_for(&case);
        group.throughput(Throughput::Elements(case.paths().len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(case.name()), &case, |b, case| {
            b.iter(|| {
                for path in case.paths() {
                    black_box(router.lookup(&Method::GET, black_box(path)).map(|matched| matched.into_bindings()));
                }
            });
        });
    }

    group.finish();
}

criterion_group!(router, benchmark_match_path, benchmark_lookup);
criterion_main!(router);
