//! Performance benchmarks for tote-engine

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tote_engine::{
    decode_items, encode_items, CartItem, IdentityChange, ItemList, ListState, LoginPolicy,
    ProductSnapshot, RemoteSnapshot,
};

fn cart_item(index: usize) -> CartItem {
    CartItem::new(
        ProductSnapshot::new(
            format!("product_{index}"),
            format!("Product {index}"),
            9.99,
            format!("/img/{index}.jpg"),
        ),
        "M",
        1,
    )
}

fn filled_list(size: usize) -> ItemList<CartItem> {
    ItemList::from_items((0..size).map(cart_item))
}

fn bench_list_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("list_operations");

    for size in [10usize, 50, 200] {
        group.bench_with_input(BenchmarkId::new("add_existing", size), &size, |b, &size| {
            let list = filled_list(size);
            b.iter(|| {
                let mut list = list.clone();
                list.add(black_box(cart_item(size / 2)))
            })
        });

        group.bench_with_input(BenchmarkId::new("set_quantity", size), &size, |b, &size| {
            let list = filled_list(size);
            let id = format!("product_{}-M", size / 2);
            b.iter(|| {
                let mut list = list.clone();
                list.set_quantity(black_box(&id), black_box(7))
            })
        });

        group.bench_with_input(BenchmarkId::new("contains", size), &size, |b, &size| {
            let list = filled_list(size);
            b.iter(|| list.contains(black_box("product_missing")))
        });
    }

    group.finish();
}

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");

    let list = filled_list(100);
    let raw = encode_items(list.items()).unwrap();

    group.bench_function("encode_100", |b| {
        b.iter(|| encode_items(black_box(list.items())))
    });
    group.bench_function("decode_100", |b| {
        b.iter(|| decode_items::<CartItem>(black_box(&raw)))
    });

    group.finish();
}

fn bench_state_machine(c: &mut Criterion) {
    let mut group = c.benchmark_group("state_machine");

    group.bench_function("mutate_and_flush", |b| {
        let mut state: ListState<CartItem> = ListState::new(LoginPolicy::Discard);
        state.bootstrap(None);
        let IdentityChange::Bound { epoch } = state.bind_identity("user_1") else {
            unreachable!()
        };
        state.apply_snapshot(epoch, RemoteSnapshot::new(Vec::new(), 0));
        let mut revision = 0;

        b.iter(|| {
            revision += 1;
            state.add(cart_item(revision as usize % 20));
            if let Some(request) = state.begin_flush(Utc::now()) {
                state.complete_flush(request.ticket, Some(revision));
            }
        })
    });

    group.bench_function("merge_on_login_100", |b| {
        let anonymous = filled_list(100);
        let remote: Vec<_> = (50..150).map(cart_item).collect();
        b.iter(|| tote_engine::merge_lists(black_box(&remote), black_box(anonymous.items())))
    });

    group.finish();
}

criterion_group!(benches, bench_list_operations, bench_codec, bench_state_machine);
criterion_main!(benches);
