use std::collections::HashSet;
use std::hint::black_box;

use config::FileFormat;
use criterion::{criterion_group, criterion_main, Criterion};
use youqu_admin::auth::jwt::TokenIssuer;
use youqu_admin::auth::password::sha256_hex;
use youqu_admin::auth::permissions::{evaluate, perm};
use youqu_admin::comm::config::{ConfigManager, ConfigSource};
use youqu_admin::comm::pagination::{PageQuery, Paginated};
use youqu_admin::modules::images::service::{
    parse_created_by, parse_date_param, parse_tags, presign_photos, strip_cdn_prefix,
};
use youqu_admin::storage::ObjectStorage;

fn held_permissions(count: usize) -> HashSet<(String, String)> {
    (0..count)
        .map(|i| ("GET".to_string(), format!("/resource{}", i)))
        .collect()
}

fn benchmark_permission_evaluation(c: &mut Criterion) {
    let required = [
        perm("GET", "/users"),
        perm("POST", "/users"),
        perm("GET", "/roles"),
        perm("DELETE", "/roles"),
    ];

    for held_count in [10, 100, 1000].iter() {
        let mut held = held_permissions(*held_count);
        held.insert(("GET".to_string(), "/users".to_string()));
        held.insert(("POST".to_string(), "/users".to_string()));
        held.insert(("GET".to_string(), "/roles".to_string()));
        held.insert(("DELETE".to_string(), "/roles".to_string()));

        c.bench_function(&format!("evaluate_granted_{}_held", held_count), |b| {
            b.iter(|| evaluate(black_box(false), black_box(&required), black_box(&held)))
        });
    }

    let empty = held_permissions(0);
    c.bench_function("evaluate_admin_bypass", |b| {
        b.iter(|| evaluate(black_box(true), black_box(&required), black_box(&empty)))
    });
    c.bench_function("evaluate_denied", |b| {
        b.iter(|| evaluate(black_box(false), black_box(&required), black_box(&empty)))
    });
}

fn benchmark_token_operations(c: &mut Criterion) {
    let issuer = TokenIssuer::new("bench-access-secret", "bench-refresh-secret", 900, 604800);

    c.bench_function("issue_token_pair", |b| {
        b.iter(|| issuer.issue_pair(black_box(42)).unwrap())
    });

    let pair = issuer.issue_pair(42).unwrap();
    c.bench_function("verify_access_token", |b| {
        b.iter(|| issuer.verify_access(black_box(&pair.access_token)).unwrap())
    });

    c.bench_function("sha256_hex", |b| {
        b.iter(|| sha256_hex(black_box("0c3a9f2b-verification-payload")))
    });
}

fn storage_for_bench() -> ObjectStorage {
    let toml = r#"
        [storage]
        endpoint = "127.0.0.1"
        port = 9000
        use_ssl = false
        bucket = "images"
        access_key = "minioadmin"
        secret_key = "minioadmin"
        region = "us-east-1"
        cdn_url = ""
    "#;
    let mgr = ConfigManager::with_sources(vec![ConfigSource::String {
        content: toml.to_string(),
        format: FileFormat::Toml,
    }])
    .unwrap();
    ObjectStorage::from_config(&mgr)
}

fn benchmark_presigned_urls(c: &mut Criterion) {
    let storage = storage_for_bench();

    c.bench_function("object_key", |b| {
        b.iter(|| ObjectStorage::object_key(black_box("桥面铺装-现场.jpg")))
    });

    // SigV4 推导链每次请求都要算一遍
    c.bench_function("presigned_get_url", |b| {
        b.iter(|| storage.presigned_get_url(black_box("1714986000000-site.jpg")))
    });

    let photos: Vec<String> = (0..10).map(|i| format!("{}-photo.jpg", i)).collect();
    c.bench_function("presign_photos_10", |b| {
        b.iter(|| presign_photos(black_box(&storage), black_box(photos.clone())))
    });
}

fn benchmark_photo_filters(c: &mut Criterion) {
    c.bench_function("parse_tags", |b| {
        b.iter(|| parse_tags(black_box(Some("桥梁, 隧道, 路基, , 涵洞"))))
    });

    c.bench_function("parse_created_by", |b| {
        b.iter(|| parse_created_by(black_box(Some(r#"{"username":"张工"}"#))))
    });

    c.bench_function("parse_date_param_rfc3339", |b| {
        b.iter(|| parse_date_param(black_box(Some("2025-08-01T08:30:00+08:00"))))
    });
    c.bench_function("parse_date_param_date_only", |b| {
        b.iter(|| parse_date_param(black_box(Some("2025-08-01"))))
    });

    c.bench_function("strip_cdn_prefix", |b| {
        b.iter(|| {
            strip_cdn_prefix(
                black_box("https://cdn.example.com/1714986000000-site.jpg"),
                black_box("https://cdn.example.com"),
            )
        })
    });
}

fn benchmark_pagination(c: &mut Criterion) {
    let query = PageQuery {
        current: 3,
        page_size: 20,
    };

    c.bench_function("paginated_new_100_rows", |b| {
        b.iter(|| {
            let rows: Vec<i64> = (0..100).collect();
            Paginated::new(black_box(rows), black_box(&query), black_box(1357))
        })
    });

    c.bench_function("page_query_offset_limit", |b| {
        b.iter(|| (black_box(&query).offset(), black_box(&query).limit()))
    });
}

criterion_group!(
    benches,
    benchmark_permission_evaluation,
    benchmark_token_operations,
    benchmark_presigned_urls,
    benchmark_photo_filters,
    benchmark_pagination
);
criterion_main!(benches);
