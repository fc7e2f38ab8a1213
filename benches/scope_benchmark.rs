use criterion::{Criterion, criterion_group, criterion_main};
use octofhir_template_context::{
    AttributeTable, ContextConfig, ContextValue, JournaledVariables, ScopedVariables, TemplateData,
    TemplateMode, VariableScope,
};
use std::hint::black_box;
use std::sync::Arc;

fn template() -> Arc<TemplateData> {
    TemplateData::new("bench", TemplateMode::Html).shared()
}

/// One iteration body: enter, bind the loop variable and its status, read both, exit
fn iteration_cycle<V: VariableScope>(vars: &mut V, item: &ContextValue) {
    vars.enter_scope();
    vars.bind("item", item.clone()).ok();
    vars.bind("itemStat", ContextValue::from(1)).ok();
    black_box(vars.lookup("item"));
    black_box(vars.lookup("user"));
    vars.exit_scope();
}

fn benchmark_standalone(c: &mut Criterion) {
    let mut group = c.benchmark_group("standalone");
    let item = ContextValue::from("row");

    group.bench_function("iteration_cycle", |b| {
        let mut vars = ScopedVariables::new(template());
        vars.bind("user", "ana".into()).ok();
        b.iter(|| iteration_cycle(&mut vars, black_box(&item)))
    });

    group.bench_function("empty_levels", |b| {
        let mut vars = ScopedVariables::with_config(&ContextConfig::default(), template());
        b.iter(|| {
            for _ in 0..10 {
                vars.enter_scope();
            }
            black_box(vars.lookup("missing"));
            for _ in 0..10 {
                vars.exit_scope();
            }
        })
    });

    group.finish();
}

fn benchmark_journaled(c: &mut Criterion) {
    let mut group = c.benchmark_group("journaled");
    let item = ContextValue::from("row");

    group.bench_function("iteration_cycle", |b| {
        let table = AttributeTable::new();
        let mut vars = JournaledVariables::new(&table, template());
        vars.bind("user", "ana".into()).ok();
        b.iter(|| iteration_cycle(&mut vars, black_box(&item)))
    });

    group.finish();
}

criterion_group!(benches, benchmark_standalone, benchmark_journaled);
criterion_main!(benches);
