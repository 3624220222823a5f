//! Path-only projection: the element's own path followed by the paths of
//! its descendants, in container order.

use crate::codec::Depth;
use crate::container::{ElementPath, ElementTree, NodeRef, PathSegment};
use crate::model::{ChildLayout, Submodel, SubmodelElement};

/// Paths of a detached element, relative to the element itself.
///
/// An unnamed root has no path of its own, so only its descendants are
/// listed (`[0]`, `[1]`, ...).
pub fn element_paths(element: &SubmodelElement, depth: Depth) -> Vec<String> {
    let mut out = Vec::new();
    let root = match element.id_short() {
        Some(id_short) => {
            let path = ElementPath::from_segments(vec![PathSegment::Key(id_short.to_string())]);
            out.push(path.to_string());
            path
        }
        None => ElementPath::root(),
    };
    collect(element, &root, depth.levels(), &mut out);
    out
}

/// Paths of the top-level elements and, at `Depth::Deep`, everything below.
pub fn submodel_paths(submodel: &Submodel, depth: Depth) -> Vec<String> {
    let mut out = Vec::new();
    let root = ElementPath::root();
    for element in &submodel.submodel_elements {
        let Some(id_short) = element.id_short() else {
            continue;
        };
        let path = root.join(PathSegment::Key(id_short.to_string()));
        out.push(path.to_string());
        if depth == Depth::Deep {
            collect(element, &path, usize::MAX, &mut out);
        }
    }
    out
}

/// Absolute paths of a node and its descendants.
pub fn node_paths(node: NodeRef<'_>, depth: Depth) -> Vec<String> {
    match depth {
        Depth::Core => std::iter::once(node.path())
            .chain(node.children().map(|c| c.path()))
            .collect(),
        Depth::Deep => node.flatten().map(|n| n.path()).collect(),
    }
}

/// Absolute paths of a whole tree.
pub fn tree_paths(tree: &ElementTree, depth: Depth) -> Vec<String> {
    match depth {
        Depth::Core => tree.roots().map(|n| n.path()).collect(),
        Depth::Deep => tree.flatten().map(|n| n.path()).collect(),
    }
}

fn collect(element: &SubmodelElement, path: &ElementPath, levels: usize, out: &mut Vec<String>) {
    if levels == 0 {
        return;
    }
    let (Some(layout), Some(children)) = (element.kind.child_layout(), element.children()) else {
        return;
    };
    for (i, child) in children.iter().enumerate() {
        let segment = match layout {
            ChildLayout::Keyed => PathSegment::Key(child.id_short().unwrap_or_default().to_string()),
            ChildLayout::Ordered => PathSegment::Index(i),
        };
        let child_path = path.join(segment);
        out.push(child_path.to_string());
        collect(child, &child_path, levels - 1, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn motor() -> SubmodelElement {
        SubmodelElement::collection("Motor", |c| {
            c.property("Speed", 1500_i32)
                .list("Phases", |l| l.value(1.0).value(2.0).value(3.0))
        })
    }

    #[test]
    fn test_deep_paths() {
        assert_eq!(
            element_paths(&motor(), Depth::Deep),
            vec![
                "Motor",
                "Motor.Speed",
                "Motor.Phases",
                "Motor.Phases[0]",
                "Motor.Phases[1]",
                "Motor.Phases[2]",
            ]
        );
    }

    #[test]
    fn test_core_paths() {
        assert_eq!(
            element_paths(&motor(), Depth::Core),
            vec!["Motor", "Motor.Speed", "Motor.Phases"]
        );
    }

    #[test]
    fn test_unnamed_list_children() {
        let list = SubmodelElement::list("L", |l| l.value(1_i32).value(2_i32).value(3_i32));
        let mut unnamed = list.clone();
        unnamed.meta.id_short = None;
        assert_eq!(element_paths(&unnamed, Depth::Deep), vec!["[0]", "[1]", "[2]"]);
    }

    #[test]
    fn test_tree_and_node_paths() {
        let mut tree = ElementTree::new();
        tree.create(motor()).unwrap();
        tree.create(SubmodelElement::property("Serial", "S-1")).unwrap();
        assert_eq!(tree_paths(&tree, Depth::Core), vec!["Motor", "Serial"]);
        assert_eq!(tree_paths(&tree, Depth::Deep).len(), 7);

        let phases = tree.retrieve("Motor.Phases").unwrap();
        assert_eq!(
            node_paths(phases, Depth::Core),
            vec!["Motor.Phases", "Motor.Phases[0]", "Motor.Phases[1]", "Motor.Phases[2]"]
        );
    }

    #[test]
    fn test_submodel_paths() {
        let submodel = Submodel::new("urn:sm").with_element(motor());
        assert_eq!(submodel_paths(&submodel, Depth::Core), vec!["Motor"]);
        assert_eq!(submodel_paths(&submodel, Depth::Deep).len(), 6);
    }
}
