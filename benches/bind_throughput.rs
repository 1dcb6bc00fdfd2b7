use criterion::{criterion_group, criterion_main, Criterion};
use http::Method;
use serde::Deserialize;
use std::hint::black_box;
use std::sync::Arc;
use typedhandler::{
    created_instances, plan_for, reset_created_instances, InstancePool, Parser, RawRequest,
    RequestSchema,
};

#[derive(Debug, Default, Deserialize, RequestSchema)]
#[serde(default)]
pub struct SearchRequest {
    #[request(json)]
    pub terms: Vec<String>,
    #[request(query = "page")]
    pub page: u32,
    #[request(query = "size")]
    pub size: u16,
    #[request(query = "exact")]
    pub exact: bool,
    #[request(path = "index")]
    pub index: String,
    #[request(header = "X-Tenant")]
    pub tenant: String,
}

fn search_request() -> RawRequest {
    RawRequest::new(Method::POST, "/indexes/books/search?page=3&size=50&exact=true")
        .with_path_param("index", "books")
        .with_header("X-Tenant", "acme")
        .with_body(r#"{"terms":["rust","pool","binding"]}"#)
}

fn parser(pooling: bool) -> Parser<SearchRequest> {
    let pool = InstancePool::with_pooling(plan_for::<SearchRequest>(), pooling);
    Parser::with_pool(Arc::new(pool))
}

fn bench_bind(c: &mut Criterion) {
    let request = search_request();

    for (name, pooling) in [("bind_pooled", true), ("bind_unpooled", false)] {
        let parser = parser(pooling);
        reset_created_instances();
        c.bench_function(name, |b| {
            b.iter(|| {
                let bound = parser.parse(black_box(&request));
                black_box(&bound);
            })
        });
        println!("{name}: {} instances allocated", created_instances());
    }
}

fn bench_plan_lookup(c: &mut Criterion) {
    let _ = plan_for::<SearchRequest>();
    c.bench_function("plan_lookup", |b| {
        b.iter(|| black_box(plan_for::<SearchRequest>()))
    });
}

criterion_group!(benches, bench_bind, bench_plan_lookup);
criterion_main!(benches);
