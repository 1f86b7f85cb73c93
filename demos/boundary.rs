//! Boundary Example - Render failures caught by Try
//!
//! This example demonstrates error boundaries:
//! - A widget failing after a store update
//! - The nearest `try_catch` switching to its fallback
//! - A failure with no boundary above it surfacing as an error
//!
//! Run with: RUST_LOG=spark_reconciler=debug cargo run --example boundary

use std::cell::RefCell;
use std::rc::Rc;

use spark_reconciler::{
    mount, try_catch, ComponentType, DriverHandle, Element, MemoryDriver, Store,
};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== spark-reconciler Boundary Example ===\n");

    let temperature = Store::new(Some(21));
    let source = temperature.clone();
    let gauge = ComponentType::from_fn("Gauge", move |_props, scope| {
        scope.subscribe(&source);
        let Some(value) = source.get() else {
            anyhow::bail!("sensor offline");
        };
        Ok(Element::host("meter")
            .prop("value", value)
            .child(Element::text(format!("{value}°C"))))
    });

    let inner = gauge.clone();
    let app = Element::host("main").with_children([
        Element::host("h1").child(Element::text("Greenhouse")),
        try_catch(
            move || Ok(Element::component(&inner)),
            || Ok(Element::host("p").child(Element::text("reading unavailable"))),
        ),
    ]);

    let driver = Rc::new(RefCell::new(MemoryDriver::new()));
    let container = driver.borrow_mut().create_container();
    let renderer = mount(DriverHandle::from_shared(driver.clone()), container, app)?;
    println!("Healthy:  {}", driver.borrow().serialize(container));

    temperature.set(None);
    println!("Failed:   {}", driver.borrow().serialize(container));
    println!("  error escaped the boundary: {}", renderer.take_error().is_some());

    // Without a boundary the failure reaches the caller.
    let mut bare = MemoryDriver::new();
    let bare_container = bare.create_container();
    let unguarded = mount(
        DriverHandle::new(bare),
        bare_container,
        Element::component(&gauge),
    );
    match unguarded {
        Ok(_) => println!("Unguarded mount succeeded"),
        Err(err) => println!("Unguarded: {err}"),
    }

    println!("\n=== Example Complete ===");
    Ok(())
}
