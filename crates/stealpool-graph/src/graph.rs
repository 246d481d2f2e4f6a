//! The task graph: an arena of nodes owned by the graph, with edges stored
//! as successor indices. Indices instead of references keep the structure
//! free of smart-pointer cycles, and handing the whole arena to the
//! scheduler by value makes the graph immutable after launch by ownership
//! alone.

use std::cell::UnsafeCell;
use std::fmt;
use std::sync::atomic::AtomicUsize;

type Work = Box<dyn FnOnce() + Send + 'static>;

/// Handle identifying a node for dependency wiring.
///
/// Only meaningful for the graph that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

pub(crate) struct Node {
    /// The node's closure, taken exactly once at its readiness transition.
    pub(crate) work: UnsafeCell<Option<Work>>,
    /// Remaining predecessor count; equals the in-degree at launch and is
    /// decremented once per completed predecessor.
    pub(crate) pending: AtomicUsize,
    /// Successor indices.
    pub(crate) dependents: Vec<usize>,
}

// Safety: `work` is the only field without interior synchronization. It is
// written during single-threaded graph construction and taken exactly once
// afterwards: either by the seeding scan (in-degree 0, nothing ever
// decrements it) or by the unique thread that moves `pending` to zero via an
// AcqRel RMW. No two threads can reach the cell at the same time.
unsafe impl Sync for Node {}

/// A dependency graph of tasks, built up front and consumed by
/// [`Scheduler::execute`](crate::Scheduler::execute).
///
/// Construction is exclusive (`&mut self`), so dependency wiring needs no
/// atomics; the `pending` counters only go concurrent once the graph has
/// been handed to the scheduler. The edge set must form a DAG; the graph
/// does not detect cycles, and a cyclic graph never finishes.
#[derive(Default)]
pub struct TaskGraph {
    nodes: Vec<Node>,
}

impl TaskGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a task with no dependencies yet and returns its handle.
    pub fn add_task(&mut self, work: impl FnOnce() + Send + 'static) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            work: UnsafeCell::new(Some(Box::new(work))),
            pending: AtomicUsize::new(0),
            dependents: Vec::new(),
        });
        id
    }

    /// Declares that `before` must complete before `after` may start.
    ///
    /// # Panics
    ///
    /// Panics if either handle does not belong to this graph or if both name
    /// the same node.
    pub fn add_dependency(&mut self, before: NodeId, after: NodeId) {
        assert!(
            before.0 < self.nodes.len() && after.0 < self.nodes.len(),
            "node handle from a different graph"
        );
        assert!(before.0 != after.0, "a task cannot depend on itself");

        *self.nodes[after.0].pending.get_mut() += 1;
        self.nodes[before.0].dependents.push(after.0);
    }

    /// Returns the number of tasks in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the graph holds no tasks.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn into_nodes(self) -> Box<[Node]> {
        self.nodes.into_boxed_slice()
    }
}

impl fmt::Debug for TaskGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let edges: usize = self.nodes.iter().map(|node| node.dependents.len()).sum();
        f.debug_struct("TaskGraph")
            .field("nodes", &self.nodes.len())
            .field("edges", &edges)
            .finish()
    }
}
