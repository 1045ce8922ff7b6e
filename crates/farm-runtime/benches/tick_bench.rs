use criterion::{black_box, criterion_group, criterion_main, Criterion};
use farm_core::{FarmConfig, GameState};
use farm_runtime::{ManualClock, Session};
use persistence::MemoryStorage;
use std::sync::Arc;

fn full_farm(clock: &ManualClock) -> Session {
    let mut state = GameState::default();
    state.player.coins = 1_000_000;
    state.player.level = 10;
    state.player.plots = 24;
    state.player.barn_capacity = 20;
    let mut session = Session::new(
        state,
        Box::new(MemoryStorage::new()),
        Arc::new(clock.clone()),
        FarmConfig::default(),
    );
    for plot in 0..24 {
        session.plant_crop("wheat", plot);
    }
    for _ in 0..20 {
        session.buy_animal("chicken");
    }
    session
}

fn bench_tick(c: &mut Criterion) {
    let clock = ManualClock::new(1_700_000_000_000);
    let mut session = full_farm(&clock);
    c.bench_function("tick full farm", |b| {
        b.iter(|| {
            clock.advance_ms(250);
            black_box(session.tick());
        })
    });
}

fn bench_cycle(c: &mut Criterion) {
    let clock = ManualClock::new(1_700_000_000_000);
    let mut session = full_farm(&clock);
    c.bench_function("plant and harvest one plot", |b| {
        b.iter(|| {
            clock.advance_ms(30_000);
            let id = session
                .state()
                .crop_on_plot(0)
                .map(|c| c.id.clone())
                .unwrap_or_default();
            session.harvest_crop(&id);
            black_box(session.plant_crop("wheat", 0));
        })
    });
}

criterion_group!(benches, bench_tick, bench_cycle);
criterion_main!(benches);
