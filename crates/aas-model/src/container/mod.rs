//! The element tree: an arena of submodel elements addressed by path.
//!
//! Nodes live in a slot vector and refer to each other through generational
//! [`NodeId`]s, so parent links never dangle and freed slots are reused
//! safely. Keyed containers (Collection, Entity, AnnotatedRelationshipElement)
//! index children by idShort; Lists keep a plain ordered vector whose
//! positions are the children's addresses. Removing a List child shifts its
//! later siblings down immediately.

mod event;
mod iter;
mod path;
mod reference;

use std::fmt;

use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::error::{ContainerError, ValueError};
use crate::model::{
    ChildLayout, ElementMeta, ElementVariant, ModelType, Submodel, SubmodelElement, ValueScope,
    ValueSource,
};
use crate::model::scope::ChildScopes;
use crate::validate::{validate_element, validate_keyed_children, validate_list_member};

pub use event::{ChangeEvent, ChangeKind, ChangeListener, ListenerId};
pub use iter::Flatten;
pub use path::{ElementPath, PathSegment};

/// Generational handle to a node in an [`ElementTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

// =============================================================================
// ARENA STORAGE
// =============================================================================

struct Slot {
    generation: u32,
    node: Option<Node>,
}

struct Node {
    /// Payload with container children detached.
    element: SubmodelElement,
    parent: Option<NodeId>,
    children: Option<Children>,
    source: Option<Box<dyn ValueSource>>,
}

#[derive(Debug, Clone, Default)]
struct KeyedChildren {
    order: Vec<NodeId>,
    by_key: FxHashMap<String, NodeId>,
}

#[derive(Debug, Clone)]
enum Children {
    Keyed(KeyedChildren),
    Ordered(Vec<NodeId>),
}

impl Children {
    fn for_layout(layout: ChildLayout) -> Self {
        match layout {
            ChildLayout::Keyed => Children::Keyed(KeyedChildren::default()),
            ChildLayout::Ordered => Children::Ordered(Vec::new()),
        }
    }

    fn layout(&self) -> ChildLayout {
        match self {
            Children::Keyed(_) => ChildLayout::Keyed,
            Children::Ordered(_) => ChildLayout::Ordered,
        }
    }

    fn ids(&self) -> &[NodeId] {
        match self {
            Children::Keyed(k) => &k.order,
            Children::Ordered(v) => v,
        }
    }

    fn position(&self, id: NodeId) -> Option<usize> {
        self.ids().iter().position(|c| *c == id)
    }

    fn push(&mut self, key: Option<&str>, id: NodeId) {
        match self {
            Children::Keyed(k) => {
                if let Some(key) = key {
                    k.by_key.insert(key.to_string(), id);
                }
                k.order.push(id);
            }
            Children::Ordered(v) => v.push(id),
        }
    }

    fn replace(&mut self, old: NodeId, old_key: Option<&str>, new: NodeId, new_key: Option<&str>) {
        match self {
            Children::Keyed(k) => {
                if let Some(old_key) = old_key {
                    k.by_key.remove(old_key);
                }
                if let Some(new_key) = new_key {
                    k.by_key.insert(new_key.to_string(), new);
                }
                if let Some(slot) = k.order.iter_mut().find(|c| **c == old) {
                    *slot = new;
                }
            }
            Children::Ordered(v) => {
                if let Some(slot) = v.iter_mut().find(|c| **c == old) {
                    *slot = new;
                }
            }
        }
    }

    fn remove(&mut self, id: NodeId, key: Option<&str>) {
        match self {
            Children::Keyed(k) => {
                if let Some(key) = key {
                    k.by_key.remove(key);
                }
                k.order.retain(|c| *c != id);
            }
            Children::Ordered(v) => v.retain(|c| *c != id),
        }
    }
}

/// What a value write replaced, kept until the whole write succeeds.
enum Undo {
    Payload(SubmodelElement),
    Source(ValueScope),
}

// =============================================================================
// TREE
// =============================================================================

/// A mutable tree of submodel elements.
pub struct ElementTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: Children,
    submodel_id: Option<String>,
    submodel_meta: ElementMeta,
    listeners: Vec<(ListenerId, Box<dyn ChangeListener>)>,
    next_listener: u64,
}

impl Default for ElementTree {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ElementTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementTree")
            .field("submodel_id", &self.submodel_id)
            .field("nodes", &self.len())
            .field("root", &self.root.ids().len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl ElementTree {
    /// Creates an empty tree whose top level is keyed by idShort.
    pub fn new() -> Self {
        Self::with_root(ChildLayout::Keyed)
    }

    /// Creates an empty tree whose top level is ordered, like a List.
    pub fn ordered() -> Self {
        Self::with_root(ChildLayout::Ordered)
    }

    fn with_root(layout: ChildLayout) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: Children::for_layout(layout),
            submodel_id: None,
            submodel_meta: ElementMeta::default(),
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    /// Builds a keyed tree from top-level elements.
    pub fn from_elements(
        elements: impl IntoIterator<Item = SubmodelElement>,
    ) -> Result<Self, ContainerError> {
        Self::from_elements_with_layout(ChildLayout::Keyed, elements)
    }

    /// Builds a tree with the given top-level layout.
    pub fn from_elements_with_layout(
        layout: ChildLayout,
        elements: impl IntoIterator<Item = SubmodelElement>,
    ) -> Result<Self, ContainerError> {
        let mut tree = Self::with_root(layout);
        for element in elements {
            tree.create(element)?;
        }
        Ok(tree)
    }

    /// Builds a tree from a submodel, remembering its id and metadata.
    pub fn from_submodel(submodel: Submodel) -> Result<Self, ContainerError> {
        let mut tree = Self::from_elements(submodel.submodel_elements)?;
        tree.submodel_id = Some(submodel.id);
        tree.submodel_meta = submodel.meta;
        Ok(tree)
    }

    /// Snapshots the top-level elements.
    pub fn to_elements(&self) -> Vec<SubmodelElement> {
        self.root.ids().iter().map(|id| self.snapshot(*id)).collect()
    }

    /// Snapshots the tree as a submodel.
    pub fn to_submodel(&self) -> Submodel {
        Submodel {
            id: self.submodel_id.clone().unwrap_or_default(),
            meta: self.submodel_meta.clone(),
            submodel_elements: self.to_elements(),
        }
    }

    pub fn submodel_id(&self) -> Option<&str> {
        self.submodel_id.as_deref()
    }

    /// Layout of the top level.
    pub fn root_layout(&self) -> ChildLayout {
        self.root.layout()
    }

    /// Number of nodes in the tree.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.node.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.root.ids().is_empty()
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    fn get(&self, id: NodeId) -> Option<&Node> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_ref()
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_mut()
    }

    /// Returns a view of the node, if the handle is still live.
    pub fn node(&self, id: NodeId) -> Option<NodeRef<'_>> {
        self.get(id).map(|node| NodeRef {
            tree: self,
            id,
            node,
        })
    }

    /// Top-level nodes in order.
    pub fn roots(&self) -> impl Iterator<Item = NodeRef<'_>> {
        self.root.ids().iter().filter_map(|id| self.node(*id))
    }

    fn children_of(&self, parent: Option<NodeId>) -> Option<&Children> {
        match parent {
            None => Some(&self.root),
            Some(id) => self.get(id)?.children.as_ref(),
        }
    }

    fn children_of_mut(&mut self, parent: Option<NodeId>) -> Option<&mut Children> {
        match parent {
            None => Some(&mut self.root),
            Some(id) => self.get_mut(id)?.children.as_mut(),
        }
    }

    fn find_child(&self, children: &Children, segment: &PathSegment) -> Option<NodeId> {
        match (children, segment) {
            (Children::Keyed(k), PathSegment::Key(key)) => k.by_key.get(key).copied(),
            (Children::Ordered(v), PathSegment::Index(i)) => v.get(*i).copied(),
            // Lists also accept an explicit child idShort
            (Children::Ordered(v), PathSegment::Key(key)) => v
                .iter()
                .copied()
                .find(|id| self.get(*id).and_then(|n| n.element.id_short()) == Some(key.as_str())),
            (Children::Keyed(_), PathSegment::Index(_)) => None,
        }
    }

    fn resolve(&self, path: &ElementPath) -> Option<NodeId> {
        let mut current = None;
        for segment in path.segments() {
            let children = self.children_of(current)?;
            current = Some(self.find_child(children, segment)?);
        }
        current
    }

    fn parse_path(path: &str) -> Result<ElementPath, ContainerError> {
        ElementPath::parse(path).map_err(|source| ContainerError::InvalidPath {
            path: path.to_string(),
            source,
        })
    }

    fn resolve_str(&self, path: &str) -> Result<NodeId, ContainerError> {
        let parsed = Self::parse_path(path)?;
        self.resolve(&parsed).ok_or_else(|| ContainerError::NotFound {
            path: path.to_string(),
        })
    }

    /// Returns the node at `path`.
    pub fn retrieve(&self, path: &str) -> Result<NodeRef<'_>, ContainerError> {
        let id = self.resolve_str(path)?;
        self.node(id).ok_or_else(|| ContainerError::NotFound {
            path: path.to_string(),
        })
    }

    /// Returns a typed snapshot of the payload at `path`.
    pub fn retrieve_as<T: ElementVariant>(&self, path: &str) -> Result<T, ContainerError> {
        let element = self.retrieve(path)?.to_element();
        T::from_kind_owned(element.kind).map_err(|kind| ContainerError::VariantNotFound {
            path: path.to_string(),
            expected: T::MODEL_TYPE,
            found: kind.model_type(),
        })
    }

    /// Snapshots the top-level elements accepted by `predicate`.
    pub fn retrieve_all<P>(&self, predicate: P) -> Vec<SubmodelElement>
    where
        P: Fn(&NodeRef<'_>) -> bool,
    {
        self.roots()
            .filter(|n| predicate(n))
            .map(|n| n.to_element())
            .collect()
    }

    /// Snapshots the top-level elements of variant `T`.
    pub fn retrieve_all_of<T: ElementVariant>(&self) -> Vec<SubmodelElement> {
        self.retrieve_all(|n| n.model_type() == T::MODEL_TYPE)
    }

    /// Returns the node at `path`, or None when absent or malformed.
    pub fn get_child(&self, path: &str) -> Option<NodeRef<'_>> {
        let parsed = ElementPath::parse(path).ok()?;
        self.node(self.resolve(&parsed)?)
    }

    pub fn has_child_path(&self, path: &str) -> bool {
        self.get_child(path).is_some()
    }

    /// Computes the current path of a node from its ancestry.
    pub fn path_of(&self, id: NodeId) -> Option<String> {
        self.element_path(id).map(|p| p.to_string())
    }

    fn element_path(&self, id: NodeId) -> Option<ElementPath> {
        let mut segments = Vec::new();
        let mut current = id;
        loop {
            let node = self.get(current)?;
            let siblings = self.children_of(node.parent)?;
            let segment = match siblings {
                Children::Ordered(v) => PathSegment::Index(v.iter().position(|c| *c == current)?),
                Children::Keyed(_) => PathSegment::Key(node.element.id_short()?.to_string()),
            };
            segments.push(segment);
            match node.parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        segments.reverse();
        Some(ElementPath::from_segments(segments))
    }

    /// idShort of a node, or `[i]` for an unnamed List child.
    fn key_of(&self, id: NodeId) -> String {
        let Some(node) = self.get(id) else {
            return String::new();
        };
        if let Some(id_short) = node.element.id_short() {
            return id_short.to_string();
        }
        self.children_of(node.parent)
            .and_then(|c| c.position(id))
            .map(|i| format!("[{}]", i))
            .unwrap_or_default()
    }

    fn scope_name(&self, parent: Option<NodeId>) -> String {
        parent.and_then(|p| self.path_of(p)).unwrap_or_default()
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Inserts a top-level element.
    pub fn create(&mut self, element: SubmodelElement) -> Result<NodeId, ContainerError> {
        self.create_in(None, element)
    }

    /// Inserts `element` into the container at `path`.
    pub fn create_at(
        &mut self,
        path: &str,
        element: SubmodelElement,
    ) -> Result<NodeId, ContainerError> {
        let parent = self.resolve_str(path)?;
        self.create_in(Some(parent), element)
    }

    fn create_in(
        &mut self,
        parent: Option<NodeId>,
        element: SubmodelElement,
    ) -> Result<NodeId, ContainerError> {
        self.check_insertable(parent, &element, None)?;
        let key = element.id_short().map(str::to_string);
        let id = self.build_subtree(parent, element);
        if let Some(children) = self.children_of_mut(parent) {
            children.push(key.as_deref(), id);
        }
        let path = self.path_of(id).unwrap_or_default();
        let key = self.key_of(id);
        debug!(path = %path, id_short = %key, "created element");
        self.emit(ChangeEvent::structural(ChangeKind::Created, key, path));
        Ok(id)
    }

    /// Replaces the element at `path`, keeping its position.
    ///
    /// The replacement gets fresh nodes; a value source bound to the old
    /// node is dropped.
    pub fn update(&mut self, path: &str, element: SubmodelElement) -> Result<NodeId, ContainerError> {
        let old = self.resolve_str(path)?;
        self.replace_node(old, element)
    }

    fn replace_node(
        &mut self,
        old: NodeId,
        element: SubmodelElement,
    ) -> Result<NodeId, ContainerError> {
        let (parent, old_key) = match self.get(old) {
            Some(node) => (node.parent, node.element.id_short().map(str::to_string)),
            None => {
                return Err(ContainerError::InvalidArgument(
                    "stale node handle".to_string(),
                ));
            }
        };
        self.check_insertable(parent, &element, Some(old))?;
        let new_key = element.id_short().map(str::to_string);
        let new = self.build_subtree(parent, element);
        if let Some(children) = self.children_of_mut(parent) {
            children.replace(old, old_key.as_deref(), new, new_key.as_deref());
        }
        self.free_subtree(old);
        let path = self.path_of(new).unwrap_or_default();
        let key = self.key_of(new);
        debug!(path = %path, id_short = %key, "updated element");
        self.emit(ChangeEvent::structural(ChangeKind::Updated, key, path));
        Ok(new)
    }

    /// Updates the element at `path` if present, otherwise creates it there.
    ///
    /// The empty path behaves as [`ElementTree::create`]. When creating under
    /// a key, a missing idShort is taken from the last path segment; under an
    /// index, the index must equal the List length (append).
    pub fn create_or_update(
        &mut self,
        path: &str,
        mut element: SubmodelElement,
    ) -> Result<NodeId, ContainerError> {
        if path.is_empty() {
            return self.create(element);
        }
        let parsed = Self::parse_path(path)?;
        if let Some(existing) = self.resolve(&parsed) {
            return self.replace_node(existing, element);
        }
        let not_found = || ContainerError::NotFound {
            path: path.to_string(),
        };
        let Some((parent_path, last)) = parsed.split_last() else {
            return self.create(element);
        };
        let parent = if parent_path.is_root() {
            None
        } else {
            Some(self.resolve(&parent_path).ok_or_else(not_found)?)
        };
        match last {
            PathSegment::Key(key) => match element.meta.id_short.clone() {
                None => element.meta.id_short = Some(key.clone()),
                Some(id_short) if id_short == *key => {}
                Some(id_short) => {
                    return Err(ContainerError::InvalidArgument(format!(
                        "idShort {:?} does not match path segment {:?}",
                        id_short, key
                    )));
                }
            },
            PathSegment::Index(index) => match self.children_of(parent) {
                Some(Children::Ordered(v)) if v.len() == *index => {}
                _ => return Err(not_found()),
            },
        }
        self.create_in(parent, element)
    }

    /// Removes the element at `path` and its whole subtree.
    pub fn delete(&mut self, path: &str) -> Result<SubmodelElement, ContainerError> {
        let id = self.resolve_str(path)?;
        let removed = self.snapshot(id);
        let key = self.key_of(id);
        let resolved_path = self.path_of(id).unwrap_or_default();
        let parent = self.get(id).and_then(|n| n.parent);
        if let Some(children) = self.children_of_mut(parent) {
            children.remove(id, removed.id_short());
        }
        self.free_subtree(id);
        debug!(path = %resolved_path, id_short = %key, "deleted element");
        self.emit(ChangeEvent::structural(
            ChangeKind::Deleted,
            key,
            resolved_path,
        ));
        Ok(removed)
    }

    fn check_insertable(
        &self,
        parent: Option<NodeId>,
        element: &SubmodelElement,
        replacing: Option<NodeId>,
    ) -> Result<(), ContainerError> {
        let scope = self.scope_name(parent);
        let children = match self.children_of(parent) {
            Some(children) => children,
            None => {
                let found = parent
                    .and_then(|p| self.get(p))
                    .map(|n| n.element.model_type())
                    .unwrap_or(ModelType::Capability);
                return Err(ContainerError::NotAContainer { path: scope, found });
            }
        };
        match children {
            Children::Keyed(k) => {
                validate_keyed_children(&scope, std::slice::from_ref(element))?;
                if let Some(id_short) = element.id_short() {
                    if let Some(existing) = k.by_key.get(id_short) {
                        if Some(*existing) != replacing {
                            return Err(ContainerError::Conflict {
                                scope,
                                id_short: id_short.to_string(),
                            });
                        }
                    }
                }
            }
            Children::Ordered(_) => {
                if let Some(list) = parent
                    .and_then(|p| self.get(p))
                    .and_then(|n| n.element.as_variant::<crate::model::SubmodelElementList>())
                {
                    validate_list_member(&scope, list, element)?;
                }
            }
        }
        validate_element(element)?;
        Ok(())
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeId {
                    index,
                    generation: 0,
                }
            }
        }
    }

    /// Allocates nodes for `element` and its descendants, unattached.
    fn build_subtree(&mut self, parent: Option<NodeId>, mut element: SubmodelElement) -> NodeId {
        let inline = element.kind.take_children();
        let children = element.kind.child_layout().map(Children::for_layout);
        let id = self.alloc(Node {
            element,
            parent,
            children,
            source: None,
        });
        for child in inline.into_iter().flatten() {
            let key = child.id_short().map(str::to_string);
            let child_id = self.build_subtree(Some(id), child);
            if let Some(children) = self.get_mut(id).and_then(|n| n.children.as_mut()) {
                children.push(key.as_deref(), child_id);
            }
        }
        id
    }

    fn free_subtree(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(slot) = self.slots.get_mut(current.index as usize) else {
                continue;
            };
            if slot.generation != current.generation {
                continue;
            }
            if let Some(node) = slot.node.take() {
                if let Some(children) = &node.children {
                    stack.extend_from_slice(children.ids());
                }
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(current.index);
            }
        }
    }

    // =========================================================================
    // Snapshots and values
    // =========================================================================

    /// Rebuilds a detached element, reading bound sources.
    fn snapshot(&self, id: NodeId) -> SubmodelElement {
        let Some(node) = self.get(id) else {
            return SubmodelElement::unnamed(crate::model::Capability);
        };
        let mut element = node.element.clone();
        if let Some(source) = &node.source {
            match source.read() {
                Ok(scope) => {
                    if let Err(e) = element.apply_value_scope(scope) {
                        warn!(id_short = ?element.id_short(), error = %e, "value source returned an ill-typed scope");
                    }
                }
                Err(e) => {
                    warn!(id_short = ?element.id_short(), error = %e, "value source read failed");
                }
            }
        }
        if let (Some(children), Some(slot)) = (&node.children, element.kind.children_mut()) {
            slot.extend(children.ids().iter().map(|c| self.snapshot(*c)));
        }
        element
    }

    fn read_scope(&self, id: NodeId) -> Result<Option<ValueScope>, ContainerError> {
        let Some(node) = self.get(id) else {
            return Ok(None);
        };
        if let Some(source) = &node.source {
            return source.read().map(Some).map_err(|e| {
                let path = self.path_of(id).unwrap_or_default();
                warn!(path = %path, error = %e, "value source read failed");
                ContainerError::Value { path, source: e }
            });
        }
        let children = match &node.children {
            None => ChildScopes::None,
            Some(Children::Keyed(k)) => {
                let mut members = Vec::with_capacity(k.order.len());
                for child in &k.order {
                    if let Some(scope) = self.read_scope(*child)? {
                        members.push((self.key_of(*child), scope));
                    }
                }
                ChildScopes::Keyed(members)
            }
            Some(Children::Ordered(v)) => {
                let mut items = Vec::with_capacity(v.len());
                for child in v {
                    if let Some(scope) = self.read_scope(*child)? {
                        items.push(scope);
                    }
                }
                ChildScopes::Ordered(items)
            }
        };
        Ok(node.element.compose_value_scope(children))
    }

    /// Reads the value scope at `path`, going through bound sources.
    pub fn get_value(&self, path: &str) -> Result<ValueScope, ContainerError> {
        let id = self.resolve_str(path)?;
        let model_type = self.get(id).map(|n| n.element.model_type());
        self.read_scope(id)?.ok_or_else(|| ContainerError::Value {
            path: path.to_string(),
            source: ValueError::NoValue {
                model_type: model_type.unwrap_or(ModelType::Capability),
            },
        })
    }

    /// Writes a value scope at `path`.
    ///
    /// The whole scope is checked against the element before anything is
    /// written. If a bound source then rejects its write, nodes already
    /// written are restored. Raises one `ValueChanged` event on success.
    pub fn set_value(&mut self, path: &str, scope: ValueScope) -> Result<(), ContainerError> {
        let id = self.resolve_str(path)?;
        let value_error = |source| ContainerError::Value {
            path: path.to_string(),
            source,
        };
        self.snapshot(id)
            .check_value_scope(&scope)
            .map_err(value_error)?;
        let mut undo = Vec::new();
        if let Err(e) = self.write_scope(id, scope.clone(), &mut undo) {
            warn!(path = %path, error = %e, "value write failed, restoring");
            self.undo_writes(undo);
            return Err(value_error(e));
        }
        let resolved_path = self.path_of(id).unwrap_or_default();
        let key = self.key_of(id);
        debug!(path = %resolved_path, id_short = %key, "value changed");
        self.emit(ChangeEvent {
            kind: ChangeKind::ValueChanged,
            id_short: key,
            path: resolved_path,
            value: Some(scope),
        });
        Ok(())
    }

    fn write_scope(
        &mut self,
        id: NodeId,
        scope: ValueScope,
        undo: &mut Vec<(NodeId, Undo)>,
    ) -> Result<(), ValueError> {
        let (child_scopes, children) = {
            let Some(node) = self.get_mut(id) else {
                return Ok(());
            };
            if let Some(source) = node.source.as_mut() {
                let previous = source.read().ok();
                source.write(&scope)?;
                if let Some(previous) = previous {
                    undo.push((id, Undo::Source(previous)));
                }
                return Ok(());
            }
            undo.push((id, Undo::Payload(node.element.clone())));
            let child_scopes = node.element.apply_local_scope(scope)?;
            (child_scopes, node.children.clone())
        };
        let targets: Vec<(NodeId, ValueScope)> = match (child_scopes, children) {
            (ChildScopes::Keyed(members), Some(Children::Keyed(k))) => members
                .into_iter()
                .map(|(key, scope)| {
                    k.by_key
                        .get(&key)
                        .map(|child| (*child, scope))
                        .ok_or(ValueError::UnknownMember { key })
                })
                .collect::<Result<_, _>>()?,
            (ChildScopes::Ordered(items), Some(Children::Ordered(v))) => {
                let valued: Vec<NodeId> = v
                    .into_iter()
                    .filter(|c| self.get(*c).is_some_and(|n| n.element.has_value()))
                    .collect();
                valued.into_iter().zip(items).collect()
            }
            _ => Vec::new(),
        };
        for (child, scope) in targets {
            self.write_scope(child, scope, undo)?;
        }
        Ok(())
    }

    /// Puts back what `write_scope` overwrote, newest first.
    fn undo_writes(&mut self, undo: Vec<(NodeId, Undo)>) {
        for (id, entry) in undo.into_iter().rev() {
            let Some(node) = self.get_mut(id) else {
                continue;
            };
            match entry {
                Undo::Payload(element) => node.element = element,
                Undo::Source(previous) => {
                    if let Some(source) = node.source.as_mut() {
                        if let Err(e) = source.write(&previous) {
                            warn!(error = %e, "value source restore failed");
                        }
                    }
                }
            }
        }
    }

    /// Binds a live value source to the leaf element at `path`.
    pub fn bind_source(
        &mut self,
        path: &str,
        source: Box<dyn ValueSource>,
    ) -> Result<(), ContainerError> {
        let id = self.resolve_str(path)?;
        let node = self.get_mut(id).ok_or_else(|| ContainerError::NotFound {
            path: path.to_string(),
        })?;
        if node.children.is_some() || !node.element.has_value() {
            return Err(ContainerError::InvalidArgument(format!(
                "cannot bind a value source to {} at {:?}",
                node.element.model_type(),
                path
            )));
        }
        node.source = Some(source);
        debug!(path = %path, "bound value source");
        Ok(())
    }

    /// Removes and returns the source bound at `path`.
    pub fn unbind_source(
        &mut self,
        path: &str,
    ) -> Result<Option<Box<dyn ValueSource>>, ContainerError> {
        let id = self.resolve_str(path)?;
        Ok(self.get_mut(id).and_then(|n| n.source.take()))
    }

    // =========================================================================
    // Traversal and listeners
    // =========================================================================

    /// Visits every node depth-first, pre-order.
    pub fn traverse<F>(&self, mut visitor: F)
    where
        F: FnMut(NodeRef<'_>),
    {
        for node in self.flatten() {
            visitor(node);
        }
    }

    /// Lazily yields every node depth-first, pre-order.
    pub fn flatten(&self) -> Flatten<'_> {
        Flatten::new(self, self.root.ids())
    }

    /// Registers a listener for change events.
    pub fn subscribe(&mut self, listener: impl ChangeListener + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Removes a listener. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(l, _)| *l != id);
        self.listeners.len() != before
    }

    fn emit(&mut self, event: ChangeEvent) {
        for (_, listener) in &mut self.listeners {
            listener.on_change(&event);
        }
    }
}

// =============================================================================
// NODE VIEW
// =============================================================================

/// Read-only view of one node.
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    tree: &'a ElementTree,
    id: NodeId,
    node: &'a Node,
}

impl<'a> NodeRef<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn id_short(&self) -> Option<&'a str> {
        self.node.element.id_short()
    }

    /// idShort, or `[i]` for an unnamed List child.
    pub fn key(&self) -> String {
        self.tree.key_of(self.id)
    }

    pub fn model_type(&self) -> ModelType {
        self.node.element.model_type()
    }

    /// Metadata of the element.
    pub fn meta(&self) -> &'a ElementMeta {
        &self.node.element.meta
    }

    /// Payload with container children detached.
    pub fn payload(&self) -> &'a SubmodelElement {
        &self.node.element
    }

    pub fn path(&self) -> String {
        self.tree.path_of(self.id).unwrap_or_default()
    }

    pub fn parent(&self) -> Option<NodeRef<'a>> {
        self.tree.node(self.node.parent?)
    }

    /// Layout of this node's children, None for leaves.
    pub fn layout(&self) -> Option<ChildLayout> {
        self.node.children.as_ref().map(Children::layout)
    }

    pub fn children(&self) -> impl Iterator<Item = NodeRef<'a>> + use<'a> {
        let tree = self.tree;
        let ids: &'a [NodeId] = self.node.children.as_ref().map(Children::ids).unwrap_or(&[]);
        ids.iter().filter_map(move |id| tree.node(*id))
    }

    pub fn child_count(&self) -> usize {
        self.node.children.as_ref().map_or(0, |c| c.ids().len())
    }

    /// Returns true if a value source is bound to this node.
    pub fn is_bound(&self) -> bool {
        self.node.source.is_some()
    }

    /// Snapshots this node and its subtree as a detached element.
    pub fn to_element(&self) -> SubmodelElement {
        self.tree.snapshot(self.id)
    }

    /// Reads the value scope, going through bound sources.
    pub fn value(&self) -> Result<Option<ValueScope>, ContainerError> {
        self.tree.read_scope(self.id)
    }

    /// Visits this node and its descendants depth-first, pre-order.
    pub fn traverse<F>(&self, mut visitor: F)
    where
        F: FnMut(NodeRef<'a>),
    {
        for node in self.flatten() {
            visitor(node);
        }
    }

    /// Lazily yields this node and its descendants depth-first, pre-order.
    pub fn flatten(&self) -> Flatten<'a> {
        Flatten::new(self.tree, std::slice::from_ref(&self.id))
    }
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.id == other.id
    }
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("path", &self.path())
            .field("model_type", &self.model_type())
            .finish()
    }
}
