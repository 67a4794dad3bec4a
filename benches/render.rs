use criterion::{Criterion, black_box, criterion_group, criterion_main};
use bedrock_ui::logging::{LogEvent, LogSink};
use bedrock_ui::{
    BoundaryRegistry, BuildOptions, Component, FiberRegistry, FormResponse, Logger,
    LoggingResult, Player, Props, ScriptStep, Serializer, Session, SessionConfig, SimulatedHost,
    SuspenseProps, build, button, callback, panel, run_scripted, suspense, text,
};

#[derive(Clone, Default)]
struct NullSink;

impl LogSink for NullSink {
    fn log(&self, _event: &LogEvent) -> LoggingResult<()> {
        Ok(())
    }
}

const ROWS: usize = 24;

fn build_and_serialize(c: &mut Criterion) {
    let app = inventory_app();
    let player = Player::new("bench-player", "Bench");
    c.bench_function("build_and_serialize_inventory", |b| {
        let mut registry = FiberRegistry::new();
        let mut boundaries = BoundaryRegistry::new();
        let options = BuildOptions::new(player.clone());
        let serializer = Serializer::new();
        b.iter(|| {
            let output = build(
                &mut registry,
                &mut boundaries,
                &options,
                black_box(app.call().into()),
            )
            .expect("build");
            serializer.serialize(&output.root).expect("serialize")
        });
    });
}

fn session_script(c: &mut Criterion) {
    let app = inventory_app();
    let mut script = Vec::with_capacity(ROWS * 2 + 1);
    for row in 0..ROWS {
        script.push(ScriptStep::Respond(FormResponse::selected(row)));
        script.push(ScriptStep::Tick);
    }
    script.push(ScriptStep::Ticks(8));

    c.bench_function("session_inventory_script", |b| {
        b.iter(|| {
            let mut config = SessionConfig::default()
                .with_logger(Logger::new(NullSink))
                .with_metrics_interval(4);
            config.enable_metrics();
            let mut host = SimulatedHost::new();
            let mut session = Session::new(Player::new("bench-player", "Bench"), app.call(), config);
            run_scripted(&mut session, &mut host, black_box(script.clone())).expect("scripted run");
            host.shown().len()
        });
    });
}

/// A list of counters under a boundary that resolves on its second poll.
fn inventory_app() -> Component {
    let row = Component::new("Row", |cx, props| {
        let label = props.string("label")?.unwrap_or("item").to_string();
        let (count, set_count) = cx.use_state(0u32)?;
        let press = callback(move || {
            set_count.update(|n| n + 1);
            Ok(())
        });
        Ok(panel()
            .size(300.0, 24.0)
            .relative()
            .child(text(format!("{label}: {count}")).at(4.0, 2.0))
            .child(button("+", press).at(260.0, 0.0))
            .into())
    });
    let stock = Component::new("Stock", |cx, _| {
        let (loaded, set_loaded) = cx.use_state(false)?;
        let polls = cx.use_ref(0u32)?;
        cx.use_effect(None, move || {
            if polls.with_mut(|n| {
                *n += 1;
                *n
            }) >= 2
            {
                set_loaded.set(true);
            }
            Ok(None)
        })?;
        Ok(text(if loaded { "stock loaded" } else { "loading stock" }).into())
    });
    Component::new("Inventory", move |_, _| {
        let rows: Vec<_> = (0..ROWS)
            .map(|i| {
                row.element(Props::new().with("label", format!("slot {i}")))
                    .key(format!("slot-{i}"))
            })
            .collect();
        Ok(panel()
            .children(rows)
            .child(suspense(SuspenseProps::new("stock").timeout_ticks(40), vec![stock.call()]))
            .into())
    })
}

criterion_group!(benches, build_and_serialize, session_script);
criterion_main!(benches);
