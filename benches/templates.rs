use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};

use serde_derive::Serialize;

use tmplet::{Context, Delimiters, Template, Tmplet};

#[derive(Serialize)]
struct Row {
    name: String,
    value: usize,
}

static TABLE_TEMPLATE: &str = "\
<table><% for (var i = 0; i < rows.length; i++) { %>\
<tr><td><%= rows[i].name %></td><td><%= rows[i].value %></td></tr>\
<% } %></table>";

static PAGE_TEMPLATE: &str = "\
<h1><%= title %></h1>\
<% if (subtitle) { %><h2><%= subtitle %></h2><% } %>\
<ul><% for (var i = 0; i < items.length; i++) { %>\
<li><%= items[i] %> (<%= i + 1 %> of <%= items.length %>)</li>\
<% } %></ul>";

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("compile", |b| {
        b.iter(|| {
            let res = Template::new("table", TABLE_TEMPLATE, Delimiters::default());
            black_box(res).unwrap();
        })
    });

    c.bench_function("table", |b| {
        let rows: Vec<Row> = (0..100)
            .map(|i| Row {
                name: format!("row-{i}"),
                value: i,
            })
            .collect();
        let mut ctx = Context::new();
        ctx.insert("rows", &rows);
        let tpl = Template::new("table", TABLE_TEMPLATE, Delimiters::default()).unwrap();

        b.iter(|| {
            let res = tpl.render(&ctx);
            black_box(res).unwrap();
        })
    });

    c.bench_function("page", |b| {
        let items = vec!["Hello world"; 20];
        let mut ctx = Context::new();
        ctx.insert("title", "A page");
        ctx.insert("subtitle", "with a subtitle");
        ctx.insert("items", &items);
        let tpl = Template::new("page", PAGE_TEMPLATE, Delimiters::default()).unwrap();

        b.iter(|| {
            let res = tpl.render(&ctx);
            black_box(res).unwrap();
        })
    });

    c.bench_function("one-off", |b| {
        let engine = Tmplet::new();
        let payload = r#"{"name": "World", "count": 3}"#;

        b.iter(|| {
            let res = engine.render(
                "Hello <%= name %><% for (var i = 0; i < count; i++) { print('!'); } %>",
                payload,
            );
            black_box(res).unwrap();
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
