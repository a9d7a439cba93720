//! Depth-first traversal of document trees.
//!
//! A traversal walks a tree left to right, depth first, visiting object
//! members in tree order. It reports:
//!
//! - `ObjectBegin`/`ObjectEnd` and `ArrayBegin`/`ArrayEnd` around containers,
//! - `ElementBegin`/`ElementEnd` around each object member and array item,
//! - one typed value event per scalar leaf.
//!
//! Every node receives a synthetic identifier, numbered from 1 in visit
//! order. Events carry the identifier of their node and of the enclosing
//! container (0 for the root), so a consumer can rebuild parent links
//! without holding references into the tree.
//!
//! ```
//! use jsondb_codec::Value;
//! use jsondb_core::traverse::{traverse, Event, TraverseKinds};
//!
//! let doc = Value::from_json_str(r#"{"a": [1, "x"]}"#).unwrap();
//! let mut paths = Vec::new();
//! traverse(&doc, TraverseKinds::VALUE, &mut |event: &Event<'_>| {
//!     paths.push(event.path.to_string());
//! });
//! assert_eq!(paths, ["a.0", "a.1"]);
//! ```

use crate::path::{Path, Segment};
use bitflags::bitflags;
use jsondb_codec::{Object, Value};

bitflags! {
    /// Selects which events a traversal reports.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TraverseKinds: u32 {
        /// Start of an object.
        const OBJECT_BEGIN = 1 << 1;
        /// End of an object.
        const OBJECT_END = 1 << 2;
        /// Start of an array.
        const ARRAY_BEGIN = 1 << 3;
        /// End of an array.
        const ARRAY_END = 1 << 4;
        /// Start of an object member or array item.
        const ELEMENT_BEGIN = 1 << 5;
        /// End of an object member or array item.
        const ELEMENT_END = 1 << 6;
        /// A null leaf.
        const VALUE_NULL = 1 << 7;
        /// A boolean leaf.
        const VALUE_BOOLEAN = 1 << 8;
        /// A number leaf.
        const VALUE_NUMBER = 1 << 9;
        /// A string leaf.
        const VALUE_STRING = 1 << 10;

        /// Both object events.
        const OBJECT = Self::OBJECT_BEGIN.bits() | Self::OBJECT_END.bits();
        /// Both array events.
        const ARRAY = Self::ARRAY_BEGIN.bits() | Self::ARRAY_END.bits();
        /// Container starts.
        const CONTAINER_BEGIN = Self::OBJECT_BEGIN.bits() | Self::ARRAY_BEGIN.bits();
        /// Container ends.
        const CONTAINER_END = Self::OBJECT_END.bits() | Self::ARRAY_END.bits();
        /// All container events.
        const CONTAINER = Self::OBJECT.bits() | Self::ARRAY.bits();
        /// Both element events.
        const ELEMENT = Self::ELEMENT_BEGIN.bits() | Self::ELEMENT_END.bits();
        /// All leaf events.
        const VALUE = Self::VALUE_NULL.bits()
            | Self::VALUE_BOOLEAN.bits()
            | Self::VALUE_NUMBER.bits()
            | Self::VALUE_STRING.bits();
        /// Every event.
        const ALL = Self::CONTAINER.bits() | Self::ELEMENT.bits() | Self::VALUE.bits();
    }
}

/// Kind of a single traversal event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Start of an object.
    ObjectBegin,
    /// End of an object.
    ObjectEnd,
    /// Start of an array.
    ArrayBegin,
    /// End of an array.
    ArrayEnd,
    /// Start of an object member or array item.
    ElementBegin,
    /// End of an object member or array item.
    ElementEnd,
    /// A null leaf.
    Null,
    /// A boolean leaf.
    Boolean,
    /// A number leaf.
    Number,
    /// A string leaf.
    String,
}

impl NodeKind {
    /// Returns the selection flag for this kind.
    #[must_use]
    pub const fn flag(self) -> TraverseKinds {
        match self {
            Self::ObjectBegin => TraverseKinds::OBJECT_BEGIN,
            Self::ObjectEnd => TraverseKinds::OBJECT_END,
            Self::ArrayBegin => TraverseKinds::ARRAY_BEGIN,
            Self::ArrayEnd => TraverseKinds::ARRAY_END,
            Self::ElementBegin => TraverseKinds::ELEMENT_BEGIN,
            Self::ElementEnd => TraverseKinds::ELEMENT_END,
            Self::Null => TraverseKinds::VALUE_NULL,
            Self::Boolean => TraverseKinds::VALUE_BOOLEAN,
            Self::Number => TraverseKinds::VALUE_NUMBER,
            Self::String => TraverseKinds::VALUE_STRING,
        }
    }

    /// Returns true for leaf kinds.
    #[must_use]
    pub const fn is_value(self) -> bool {
        matches!(self, Self::Null | Self::Boolean | Self::Number | Self::String)
    }

    fn of_leaf(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Boolean,
            Value::Number(_) => Self::Number,
            // Containers never reach here; strings and anything else map to String.
            _ => Self::String,
        }
    }
}

/// One traversal event.
#[derive(Debug, Clone, PartialEq)]
pub struct Event<'a> {
    /// Synthetic identifier of the node this event describes.
    pub id: u64,
    /// Synthetic identifier of the enclosing container, 0 for the root.
    pub parent_id: u64,
    /// What happened.
    pub kind: NodeKind,
    /// Key stack from the root to the node.
    pub path: Path,
    /// The node itself.
    pub value: &'a Value,
}

impl Event<'_> {
    /// Returns the member name when the node is an object member.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match self.path.last() {
            Some(Segment::Key(key)) => Some(key),
            _ => None,
        }
    }

    /// Returns the position when the node is an array item.
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        match self.path.last() {
            Some(Segment::Index(index)) => Some(*index),
            _ => None,
        }
    }
}

/// Consumer of traversal events.
pub trait Visitor {
    /// Handles one event.
    fn visit(&mut self, event: &Event<'_>);
}

impl<F> Visitor for F
where
    F: FnMut(&Event<'_>),
{
    fn visit(&mut self, event: &Event<'_>) {
        self(event);
    }
}

/// Walks `root`, passing every event selected by `kinds` to `visitor`.
pub fn traverse<V: Visitor + ?Sized>(root: &Value, kinds: TraverseKinds, visitor: &mut V) {
    for event in Traversal::new(root, kinds) {
        visitor.visit(&event);
    }
}

enum Step<'a> {
    Node {
        value: &'a Value,
        id: u64,
        parent: u64,
        element: bool,
    },
    Members {
        object: &'a Object,
        next: usize,
        id: u64,
    },
    Items {
        items: &'a [Value],
        next: usize,
        id: u64,
    },
    ElementEnd {
        value: &'a Value,
        id: u64,
        parent: u64,
    },
    ContainerEnd {
        value: &'a Value,
        id: u64,
        parent: u64,
        kind: NodeKind,
    },
}

/// Lazy iterator over traversal events.
///
/// Holds an explicit stack, so arbitrarily deep documents do not grow the
/// call stack.
pub struct Traversal<'a> {
    kinds: TraverseKinds,
    stack: Vec<Step<'a>>,
    path: Path,
    last_id: u64,
}

impl<'a> Traversal<'a> {
    /// Starts a traversal of `root` reporting the events in `kinds`.
    #[must_use]
    pub fn new(root: &'a Value, kinds: TraverseKinds) -> Self {
        Self {
            kinds,
            stack: vec![Step::Node {
                value: root,
                id: 1,
                parent: 0,
                element: false,
            }],
            path: Path::root(),
            last_id: 1,
        }
    }

    fn next_id(&mut self) -> u64 {
        self.last_id += 1;
        self.last_id
    }

    fn emit(&self, kind: NodeKind, id: u64, parent_id: u64, value: &'a Value) -> Option<Event<'a>> {
        self.kinds.contains(kind.flag()).then(|| Event {
            id,
            parent_id,
            kind,
            path: self.path.clone(),
            value,
        })
    }

    fn step(&mut self, step: Step<'a>) -> Option<Event<'a>> {
        match step {
            Step::Node {
                value,
                id,
                parent,
                element: true,
            } => {
                self.stack.push(Step::ElementEnd { value, id, parent });
                self.stack.push(Step::Node {
                    value,
                    id,
                    parent,
                    element: false,
                });
                self.emit(NodeKind::ElementBegin, id, parent, value)
            }
            Step::Node {
                value, id, parent, ..
            } => match value {
                Value::Object(object) => {
                    self.stack.push(Step::ContainerEnd {
                        value,
                        id,
                        parent,
                        kind: NodeKind::ObjectEnd,
                    });
                    self.stack.push(Step::Members {
                        object,
                        next: 0,
                        id,
                    });
                    self.emit(NodeKind::ObjectBegin, id, parent, value)
                }
                Value::Array(items) => {
                    self.stack.push(Step::ContainerEnd {
                        value,
                        id,
                        parent,
                        kind: NodeKind::ArrayEnd,
                    });
                    self.stack.push(Step::Items {
                        items,
                        next: 0,
                        id,
                    });
                    self.emit(NodeKind::ArrayBegin, id, parent, value)
                }
                leaf => self.emit(NodeKind::of_leaf(leaf), id, parent, leaf),
            },
            Step::Members { object, next, id } => {
                if let Some((key, child)) = object.get_index(next) {
                    self.stack.push(Step::Members {
                        object,
                        next: next + 1,
                        id,
                    });
                    self.path.push(Segment::Key(key.clone()));
                    let child_id = self.next_id();
                    self.stack.push(Step::Node {
                        value: child,
                        id: child_id,
                        parent: id,
                        element: true,
                    });
                }
                None
            }
            Step::Items { items, next, id } => {
                if let Some(child) = items.get(next) {
                    self.stack.push(Step::Items {
                        items,
                        next: next + 1,
                        id,
                    });
                    self.path.push(Segment::Index(next));
                    let child_id = self.next_id();
                    self.stack.push(Step::Node {
                        value: child,
                        id: child_id,
                        parent: id,
                        element: true,
                    });
                }
                None
            }
            Step::ElementEnd { value, id, parent } => {
                let event = self.emit(NodeKind::ElementEnd, id, parent, value);
                self.path.pop();
                event
            }
            Step::ContainerEnd {
                value,
                id,
                parent,
                kind,
            } => self.emit(kind, id, parent, value),
        }
    }
}

impl<'a> Iterator for Traversal<'a> {
    type Item = Event<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(step) = self.stack.pop() {
            if let Some(event) = self.step(step) {
                return Some(event);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> Value {
        Value::from_json_str(text).unwrap()
    }

    fn kinds_of(root: &Value, kinds: TraverseKinds) -> Vec<NodeKind> {
        Traversal::new(root, kinds).map(|e| e.kind).collect()
    }

    #[test]
    fn full_event_order() {
        let root = doc(r#"{"a": [true, null], "b": "x"}"#);
        use NodeKind::*;
        assert_eq!(
            kinds_of(&root, TraverseKinds::ALL),
            vec![
                ObjectBegin,
                ElementBegin,
                ArrayBegin,
                ElementBegin,
                Boolean,
                ElementEnd,
                ElementBegin,
                Null,
                ElementEnd,
                ArrayEnd,
                ElementEnd,
                ElementBegin,
                String,
                ElementEnd,
                ObjectEnd,
            ]
        );
    }

    #[test]
    fn mask_selects_events() {
        let root = doc(r#"{"a": [1, {"b": 2}], "c": {}}"#);
        assert_eq!(
            kinds_of(&root, TraverseKinds::CONTAINER_BEGIN),
            vec![
                NodeKind::ObjectBegin,
                NodeKind::ArrayBegin,
                NodeKind::ObjectBegin,
                NodeKind::ObjectBegin,
            ]
        );
        assert_eq!(
            kinds_of(&root, TraverseKinds::VALUE_NUMBER),
            vec![NodeKind::Number, NodeKind::Number]
        );
        assert!(kinds_of(&root, TraverseKinds::empty()).is_empty());
    }

    #[test]
    fn paths_keys_and_indices() {
        let root = doc(r#"{"tags": ["x", "y"], "nested": {"deep": [[7]]}}"#);
        let events: Vec<Event<'_>> = Traversal::new(&root, TraverseKinds::VALUE).collect();
        let paths: Vec<String> = events.iter().map(|e| e.path.to_string()).collect();
        assert_eq!(paths, ["tags.0", "tags.1", "nested.deep.0.0"]);
        assert_eq!(events[1].index(), Some(1));
        assert_eq!(events[1].key(), None);
        assert_eq!(events[1].value, &Value::from("y"));

        let members: Vec<Option<String>> = Traversal::new(&root, TraverseKinds::ELEMENT_BEGIN)
            .map(|e| e.key().map(str::to_string))
            .collect();
        assert_eq!(
            members,
            vec![
                Some("tags".to_string()),
                None,
                None,
                Some("nested".to_string()),
                Some("deep".to_string()),
                None,
                None,
            ]
        );
    }

    #[test]
    fn parent_ids_link_children_to_containers() {
        let root = doc(r#"{"a": {"b": 1}, "c": 2}"#);
        let events: Vec<Event<'_>> = Traversal::new(&root, TraverseKinds::ALL).collect();
        let object_a = events
            .iter()
            .find(|e| e.kind == NodeKind::ObjectBegin && e.path.to_string() == "a")
            .unwrap();
        let leaf_b = events.iter().find(|e| e.kind == NodeKind::Number).unwrap();
        assert_eq!(leaf_b.parent_id, object_a.id);
        assert_eq!(object_a.parent_id, 1);
        assert_eq!(events[0].parent_id, 0);
        assert_eq!(events[0].id, 1);

        let ends: Vec<&Event<'_>> = events
            .iter()
            .filter(|e| e.kind == NodeKind::ObjectEnd)
            .collect();
        assert_eq!(ends[0].id, object_a.id);
    }

    #[test]
    fn scalar_root_yields_one_event() {
        let root = Value::from(3);
        let events: Vec<Event<'_>> = Traversal::new(&root, TraverseKinds::ALL).collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, NodeKind::Number);
        assert!(events[0].path.is_root());
    }

    #[test]
    fn visitor_accumulates() {
        struct Counter(usize);
        impl Visitor for Counter {
            fn visit(&mut self, event: &Event<'_>) {
                if event.kind.is_value() {
                    self.0 += 1;
                }
            }
        }

        let root = doc(r#"[1, [2, 3], {"x": null}]"#);
        let mut counter = Counter(0);
        traverse(&root, TraverseKinds::ALL, &mut counter);
        assert_eq!(counter.0, 4);
    }

    #[test]
    fn deep_documents_do_not_recurse() {
        let mut root = Value::from(1);
        for _ in 0..10_000 {
            root = Value::Array(vec![root]);
        }
        let leaves = Traversal::new(&root, TraverseKinds::VALUE).count();
        assert_eq!(leaves, 1);
        // Drop iteratively; the recursive Drop of Vec would overflow the stack.
        let mut node = root;
        while let Value::Array(mut items) = node {
            node = items.pop().unwrap_or(Value::Null);
        }
    }
}
