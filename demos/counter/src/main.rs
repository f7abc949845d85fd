use blocks_core::prelude::*;
use blocks_core::{encode_fallback, encode_patch};
use blocks_ui::*;

fn counter(cx: &Scope, _props: &Props) -> ComponentResult {
    let count = cx.use_state(0i64)?;
    let ticker = {
        let count = count.clone();
        cx.use_interval(1000, move || count.update(|c| *c += 10))?
    };

    Ok(Some(
        VStack(vec![
            Text(format!("Count: {}", count.get())).size(TextSize::XLarge),
            HStack(vec![
                Button("Increment", {
                    let count = count.clone();
                    move || count.update(|c| *c += 1)
                })
                .appearance(ButtonAppearance::Primary),
                Button("Decrement", {
                    let count = count.clone();
                    move || count.update(|c| *c -= 1)
                }),
                Button("Auto", {
                    let ticker = ticker.clone();
                    move || {
                        if ticker.is_running() {
                            ticker.stop()
                        } else {
                            ticker.start()
                        }
                    }
                }),
            ])
            .gap(Padding::Small),
        ])
        .padding(Padding::Medium),
    ))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let registry = PostRegistry::builder()
        .register(
            PostType::new("counter", Component::new("Counter", counter))
                .description("A counter with an auto-increment timer"),
        )
        .build()?;
    let engine = Engine::new(EngineConfig::from_env()).with_registry(registry);
    let ctx = RenderContext::new("t3_demo").with_user("t2_demo");

    let mut current = pollster::block_on(engine.render_post("counter", &ctx, None, None))?;
    println!("{}", encode_fallback(&current.tree).plain);

    let increment = HandlerRef::from("Counter/1/0#onPress");
    let auto = HandlerRef::from("Counter/1/2#onPress");
    let mut events: Vec<EventRecord> = (0..3)
        .map(|_| EventRecord::new(increment.clone(), Value::Null))
        .collect();
    events.push(EventRecord::new(auto, Value::Null));

    for event in events {
        current = pollster::block_on(engine.handle_post_event(
            "counter",
            &ctx,
            &event,
            &current.tree,
            &current.ledgers,
        ))?;
        if let Some(patch) = current.patch() {
            println!("{} -> {}", event.handler, String::from_utf8_lossy(&encode_patch(patch)?));
        }
    }

    // Stand in for the external poller.
    for tick in due_ticks(&current.intervals) {
        current = pollster::block_on(engine.handle_post_event(
            "counter",
            &ctx,
            &tick,
            &current.tree,
            &current.ledgers,
        ))?;
        log::info!("tick {} -> {} op(s)", tick.handler, current.patch().map_or(0, Patch::len));
    }

    let fallback = encode_fallback(&current.tree);
    println!("{}\n\n{}", fallback.plain, fallback.rich);
    Ok(())
}
