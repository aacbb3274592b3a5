use std::hint::black_box;

use bson::{Bson, doc};
use criterion::{Criterion, criterion_group, criterion_main};
use slate_query::DeclaredFunction;
use slate_vm::{CancellationToken, FunctionRunner, LuaRunner, ScriptArg, ScriptKey};

fn bench_run(c: &mut Criterion) {
    let key = ScriptKey::new(&[DeclaredFunction::script(
        "output",
        "function output(d) return { Name = d.Name, Total = d.Lines * 2 } end",
    )]);
    let token = CancellationToken::new();
    let mut runner = LuaRunner::new();
    let args = [
        ScriptArg::Value(Bson::Document(doc! { "Name": "Arek", "Lines": 4 })),
        ScriptArg::Value(Bson::Null),
    ];

    c.bench_function("lua_run_cached_key", |b| {
        b.iter(|| {
            runner
                .run(black_box(&key), "output", black_box(&args), &token)
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_run);
criterion_main!(benches);
