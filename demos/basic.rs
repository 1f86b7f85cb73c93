//! Basic Example - Keyed list driven by a store
//!
//! This example demonstrates the core loop of spark-reconciler:
//! - Mounting a component into an in-memory container
//! - Re-rendering it through a store notification
//! - Reordering keyed children without remounting them
//!
//! Run with: RUST_LOG=spark_reconciler=trace cargo run --example basic

use std::cell::RefCell;
use std::rc::Rc;

use spark_reconciler::{mount, ComponentType, DriverHandle, Element, MemoryDriver, Store};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== spark-reconciler Basic Example ===\n");

    let todos = Store::new(vec!["write docs", "fix bug", "ship"]);
    let source = todos.clone();
    let list = ComponentType::from_fn("TodoList", move |_props, scope| {
        scope.subscribe(&source);
        let items = source.get();
        Ok(Element::host("ul").with_children(
            items
                .into_iter()
                .map(|item| Element::host("li").key(item).child(Element::text(item))),
        ))
    });

    let driver = Rc::new(RefCell::new(MemoryDriver::new()));
    let container = driver.borrow_mut().create_container();
    let renderer = mount(
        DriverHandle::from_shared(driver.clone()),
        container,
        Element::component(&list),
    )?;
    println!("Mounted:   {}", driver.borrow().serialize(container));
    driver.borrow_mut().clear_ops();

    // Rotate the list: every item moves, nothing is recreated.
    todos.update(|items| items.rotate_right(1));
    println!("Rotated:   {}", driver.borrow().serialize(container));
    println!("  moves: {}", driver.borrow().moves());
    driver.borrow_mut().clear_ops();

    // Drop one entry and add another.
    todos.set(vec!["ship", "celebrate", "write docs"]);
    println!("Replaced:  {}", driver.borrow().serialize(container));
    println!("  driver calls:");
    for op in driver.borrow().ops() {
        println!("    {op:?}");
    }

    if let Some(err) = renderer.take_error() {
        println!("update failed: {err}");
    }
    renderer.unmount()?;
    println!("\nUnmounted: {:?}", driver.borrow().serialize(container));

    println!("\n=== Example Complete ===");
    Ok(())
}
