use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mockwire::mapping::{MappingBuilder, MappingRegistry, MatchOptions};
use mockwire::matchers::MatcherDefinition;
use mockwire::request::{RequestBuilder, RequestMessage};
use mockwire::response::ResponseBuilder;
use mockwire::scenario::ScenarioTable;
use mockwire::TieBreak;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;

fn wildcard_registry(count: usize) -> MappingRegistry {
    let mut registry = MappingRegistry::new();
    for i in 0..count {
        registry
            .register(
                MappingBuilder::given(
                    RequestBuilder::new()
                        .with_path(format!("/api/v1/endpoint{i}/*"))
                        .using_get()
                        .with_header("Accept", "application/*"),
                )
                .respond_with(ResponseBuilder::new().with_status_code(200)),
            )
            .unwrap();
    }
    registry
}

fn regex_registry(count: usize) -> MappingRegistry {
    let mut registry = MappingRegistry::new();
    for i in 0..count {
        registry
            .register(
                MappingBuilder::given(
                    RequestBuilder::new()
                        .with_path_matcher(MatcherDefinition::regex(format!(
                            r"^/api/v\d+/endpoint{i}/\d+$"
                        )))
                        .using_get(),
                )
                .respond_with(ResponseBuilder::new().with_status_code(200)),
            )
            .unwrap();
    }
    registry
}

fn options(allow_partial: bool) -> MatchOptions {
    MatchOptions {
        allow_partial,
        tie_break: TieBreak::LastRegistered,
    }
}

fn bench_mapping_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("mapping_selection");
    let scenarios = ScenarioTable::new();
    let mut rng = StdRng::seed_from_u64(42);

    for count in [10, 100, 1000].iter() {
        let wildcard = wildcard_registry(*count);
        let regex = regex_registry(*count);
        let hit = RequestMessage::new("GET", "/api/v1/endpoint0/42")
            .with_header("Accept", "application/json");
        let miss = RequestMessage::new("GET", "/nothing/here");

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("wildcard_hit", count), count, |b, _| {
            b.iter(|| {
                wildcard.find_best_match(
                    black_box(&hit),
                    &scenarios,
                    options(false),
                    &mut rng,
                )
            })
        });
        group.bench_with_input(BenchmarkId::new("regex_hit", count), count, |b, _| {
            b.iter(|| regex.find_best_match(black_box(&hit), &scenarios, options(false), &mut rng))
        });
        group.bench_with_input(BenchmarkId::new("partial_miss", count), count, |b, _| {
            b.iter(|| {
                wildcard.find_best_match(black_box(&miss), &scenarios, options(true), &mut rng)
            })
        });
    }

    group.finish();
}

fn bench_json_body(c: &mut Criterion) {
    let mut registry = MappingRegistry::new();
    registry
        .register(
            MappingBuilder::given(
                RequestBuilder::new()
                    .with_path("/orders")
                    .using_post()
                    .with_body_matcher(MatcherDefinition::json_partial(
                        json!({"customer": {"tier": "gold"}}),
                    )),
            )
            .respond_with(ResponseBuilder::new().with_status_code(201)),
        )
        .unwrap();
    let request = RequestMessage::new("POST", "/orders").with_body(
        json!({"id": 7, "customer": {"name": "a", "tier": "gold"}, "items": [1, 2, 3]})
            .to_string(),
    );
    let scenarios = ScenarioTable::new();
    let mut rng = StdRng::seed_from_u64(42);

    c.bench_function("json_partial_body", |b| {
        b.iter(|| registry.find_best_match(black_box(&request), &scenarios, options(false), &mut rng))
    });
}

criterion_group!(benches, bench_mapping_selection, bench_json_body);
criterion_main!(benches);
