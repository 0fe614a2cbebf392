//! In-memory accessibility tree for engine tests.
//!
//! Nodes are plain ids into a shared table, so tests can mutate the tree
//! (add, remove, move windows) between ticks while the engine holds its
//! own handles, exactly like the real tree changing under the poller.
//! Failure injection and call counters let tests script platform behavior.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::bridge::{ElementBridge, ElementError, ElementResult};
use crate::geometry::{Point, Size};

pub(crate) type NodeId = u64;

const ROOT: NodeId = 0;

#[derive(Default)]
struct NodeData {
    children: Vec<NodeId>,
    size: Size,
    position: Point,
    subrole: Option<String>,
    identifier: Option<String>,
    window_id: Option<u32>,
    writable: bool,
}

#[derive(Default)]
struct TreeState {
    nodes: HashMap<NodeId, NodeData>,
    next_id: NodeId,
    root_error: Option<ElementError>,
    root_calls: usize,
    writes: Vec<(NodeId, Point)>,
    writable_checks: HashMap<NodeId, usize>,
    set_position_failures: HashMap<NodeId, VecDeque<ElementError>>,
}

#[derive(Clone)]
pub(crate) struct MockBridge {
    state: Arc<Mutex<TreeState>>,
}

impl MockBridge {
    pub fn new() -> Self {
        let mut state = TreeState::default();
        state.nodes.insert(ROOT, NodeData::default());
        state.next_id = 1;
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn insert(&self, parent: NodeId, data: NodeData) -> NodeId {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id;
        state.next_id += 1;
        state.nodes.insert(id, data);
        if let Some(parent) = state.nodes.get_mut(&parent) {
            parent.children.push(id);
        }
        id
    }

    /// Adds a writable, banner-shaped window directly under the root.
    pub fn add_window(&self, window_id: u32, size: Size, position: Point) -> NodeId {
        self.add_window_under(ROOT, window_id, size, position)
    }

    pub fn add_window_under(
        &self,
        parent: NodeId,
        window_id: u32,
        size: Size,
        position: Point,
    ) -> NodeId {
        self.insert(
            parent,
            NodeData {
                size,
                position,
                window_id: Some(window_id),
                writable: true,
                ..NodeData::default()
            },
        )
    }

    /// Adds a widget panel (identifier-matched) under the root.
    pub fn add_widget(
        &self,
        window_id: u32,
        identifier: &str,
        size: Size,
        position: Point,
    ) -> NodeId {
        self.insert(
            ROOT,
            NodeData {
                size,
                position,
                identifier: Some(identifier.to_string()),
                window_id: Some(window_id),
                writable: true,
                ..NodeData::default()
            },
        )
    }

    /// Adds a chain of `depth` featureless container nodes below the root
    /// and returns the deepest one.
    pub fn add_container_chain(&self, depth: usize) -> NodeId {
        let mut parent = ROOT;
        for _ in 0..depth {
            parent = self.insert(parent, NodeData::default());
        }
        parent
    }

    pub fn remove_window(&self, node: NodeId) {
        let mut state = self.state.lock().unwrap();
        state.nodes.remove(&node);
        for data in state.nodes.values_mut() {
            data.children.retain(|&c| c != node);
        }
    }

    pub fn move_window(&self, node: NodeId, position: Point) {
        let mut state = self.state.lock().unwrap();
        if let Some(data) = state.nodes.get_mut(&node) {
            data.position = position;
        }
    }

    pub fn set_writable(&self, node: NodeId, writable: bool) {
        let mut state = self.state.lock().unwrap();
        if let Some(data) = state.nodes.get_mut(&node) {
            data.writable = writable;
        }
    }

    pub fn clear_window_id(&self, node: NodeId) {
        let mut state = self.state.lock().unwrap();
        if let Some(data) = state.nodes.get_mut(&node) {
            data.window_id = None;
        }
    }

    pub fn set_root_error(&self, error: Option<ElementError>) {
        self.state.lock().unwrap().root_error = error;
    }

    pub fn fail_next_set_position(&self, node: NodeId, error: ElementError) {
        self.state
            .lock()
            .unwrap()
            .set_position_failures
            .entry(node)
            .or_default()
            .push_back(error);
    }

    pub fn position_of(&self, node: NodeId) -> Point {
        self.state.lock().unwrap().nodes[&node].position
    }

    /// Every successful `set_position`, in order.
    pub fn writes(&self) -> Vec<(NodeId, Point)> {
        self.state.lock().unwrap().writes.clone()
    }

    /// How many times the poller asked for the overlay root — the proxy for
    /// "is the engine still polling".
    pub fn root_calls(&self) -> usize {
        self.state.lock().unwrap().root_calls
    }

    pub fn writable_checks(&self, node: NodeId) -> usize {
        self.state
            .lock()
            .unwrap()
            .writable_checks
            .get(&node)
            .copied()
            .unwrap_or(0)
    }

    fn with_node<T>(
        &self,
        node: &NodeId,
        f: impl FnOnce(&NodeData) -> T,
    ) -> ElementResult<T> {
        let state = self.state.lock().unwrap();
        state
            .nodes
            .get(node)
            .map(f)
            .ok_or(ElementError::Invalid(-25202))
    }
}

impl ElementBridge for MockBridge {
    type Node = NodeId;

    fn overlay_root(&self) -> ElementResult<NodeId> {
        let mut state = self.state.lock().unwrap();
        state.root_calls += 1;
        match state.root_error {
            Some(err) => Err(err),
            None => Ok(ROOT),
        }
    }

    fn children(&self, node: &NodeId) -> ElementResult<Vec<NodeId>> {
        self.with_node(node, |data| data.children.clone())
    }

    fn size(&self, node: &NodeId) -> ElementResult<Size> {
        self.with_node(node, |data| data.size)
    }

    fn position(&self, node: &NodeId) -> ElementResult<Point> {
        self.with_node(node, |data| data.position)
    }

    fn identifier(&self, node: &NodeId) -> ElementResult<Option<String>> {
        self.with_node(node, |data| data.identifier.clone())
    }

    fn subrole(&self, node: &NodeId) -> ElementResult<Option<String>> {
        self.with_node(node, |data| data.subrole.clone())
    }

    fn window_id(&self, node: &NodeId) -> ElementResult<u32> {
        self.with_node(node, |data| data.window_id)?
            .ok_or(ElementError::Unsupported(-25205))
    }

    fn is_position_writable(&self, node: &NodeId) -> ElementResult<bool> {
        let mut state = self.state.lock().unwrap();
        *state.writable_checks.entry(*node).or_insert(0) += 1;
        state
            .nodes
            .get(node)
            .map(|data| data.writable)
            .ok_or(ElementError::Invalid(-25202))
    }

    fn set_position(&self, node: &NodeId, point: Point) -> ElementResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(queue) = state.set_position_failures.get_mut(node) {
            if let Some(err) = queue.pop_front() {
                return Err(err);
            }
        }
        let Some(data) = state.nodes.get_mut(node) else {
            return Err(ElementError::Invalid(-25202));
        };
        if !data.writable {
            return Err(ElementError::Unsupported(-25205));
        }
        data.position = point;
        state.writes.push((*node, point));
        Ok(())
    }
}
