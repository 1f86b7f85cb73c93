//! Test helpers: a renderer mounted over a [`MemoryDriver`].

use std::cell::RefCell;
use std::rc::Rc;

use crate::driver::{DriverHandle, DriverOp, MemoryDriver};
use crate::element::Element;
use crate::engine::InstanceId;
use crate::pipeline::{mount, Renderer};
use crate::types::HostNode;

pub(crate) struct Harness {
    pub(crate) driver: Rc<RefCell<MemoryDriver>>,
    pub(crate) container: HostNode,
    pub(crate) renderer: Renderer,
}

impl Harness {
    /// Fresh driver and a connected container, without mounting anything.
    pub(crate) fn driver() -> (DriverHandle, HostNode) {
        let driver = Rc::new(RefCell::new(MemoryDriver::new()));
        let container = driver.borrow_mut().create_container();
        (DriverHandle::from_shared(driver), container)
    }

    pub(crate) fn mount(element: Element) -> Self {
        let driver = Rc::new(RefCell::new(MemoryDriver::new()));
        let container = driver.borrow_mut().create_container();
        let renderer = mount(DriverHandle::from_shared(driver.clone()), container, element)
            .unwrap_or_else(|err| panic!("mount failed: {err}"));
        Self {
            driver,
            container,
            renderer,
        }
    }

    pub(crate) fn render(&self, element: Element) {
        self.renderer
            .render(element)
            .unwrap_or_else(|err| panic!("render failed: {err}"));
    }

    /// The top-level instance.
    pub(crate) fn top(&self) -> InstanceId {
        self.renderer
            .top()
            .unwrap_or_else(|| panic!("nothing is mounted"))
    }

    pub(crate) fn html(&self) -> String {
        self.driver.borrow().serialize(self.container)
    }

    pub(crate) fn ops(&self) -> Vec<DriverOp> {
        self.driver.borrow().ops().to_vec()
    }

    pub(crate) fn clear_ops(&self) {
        self.driver.borrow_mut().clear_ops();
    }

    pub(crate) fn moves(&self) -> usize {
        self.driver.borrow().moves()
    }

    pub(crate) fn fire(&self, node: HostNode, name: &str, value: Option<&str>) {
        MemoryDriver::fire(&self.driver, node, name, value);
    }

    pub(crate) fn find_all(&self, tag: &str) -> Vec<HostNode> {
        self.driver.borrow().find_all(self.container, tag)
    }
}
