use super::new_record_id;
use super::patch::{Edit, Patch, Record};
use crate::error::ValidationError;
use crate::model::{Dependency, RoadmapState};

/// Checks that `to` may start depending on `from`.
pub fn validate_dependency(state: &RoadmapState, from: &str, to: &str) -> Result<(), ValidationError> {
    if from == to {
        return Err(ValidationError::SelfDependency(from.to_string()));
    }
    for id in [from, to] {
        if state.node(id).is_none() {
            return Err(ValidationError::UnknownNode(id.to_string()));
        }
    }
    if state.dependencies.iter().any(|dep| dep.connects(from, to)) {
        return Err(ValidationError::DuplicateDependency {
            from: from.to_string(),
            to: to.to_string(),
        });
    }
    Ok(())
}

/// New edge drawn from `from` (depended-upon) to `to` (dependent), appended
/// after the existing edges.
pub fn add_dependency(state: &RoadmapState, from: &str, to: &str) -> Result<Patch, ValidationError> {
    validate_dependency(state, from, to)?;
    let dep = Dependency {
        id: new_record_id(),
        node_id: to.to_string(),
        depends_on_node_id: from.to_string(),
    };
    let mut patch = Patch::new("add dependency");
    patch.push(Edit::Insert {
        index: state.dependencies.len(),
        record: Record::Dependency(dep),
    });
    Ok(patch)
}

pub fn remove_dependency(state: &RoadmapState, dependency_id: &str) -> Result<Patch, ValidationError> {
    let index = state
        .dependencies
        .iter()
        .position(|dep| dep.id == dependency_id)
        .ok_or_else(|| ValidationError::UnknownDependency(dependency_id.to_string()))?;
    let mut patch = Patch::new("remove dependency");
    patch.push(Edit::Remove {
        index,
        record: Record::Dependency(state.dependencies[index].clone()),
    });
    Ok(patch)
}

/// Removals for every edge touching one of `node_ids`, indexed for sequential
/// application from the current list.
pub(crate) fn remove_edges_touching(state: &RoadmapState, node_ids: &[&str], patch: &mut Patch) {
    let mut removed = 0;
    for (index, dep) in state.dependencies.iter().enumerate() {
        if node_ids.iter().any(|id| dep.touches(id)) {
            patch.push(Edit::Remove {
                index: index - removed,
                record: Record::Dependency(dep.clone()),
            });
            removed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Node, NodeStatus, Roadmap};

    fn state() -> RoadmapState {
        let mut state = RoadmapState::new(Roadmap {
            id: "r1".to_string(),
            title: "Roadmap".to_string(),
            description: None,
            pinned_column_id: None,
        });
        for id in ["a", "b", "c"] {
            state.nodes.push(Node {
                id: id.to_string(),
                roadmap_id: "r1".to_string(),
                title: id.to_string(),
                description: None,
                status: NodeStatus::Planned,
                position_x: 254.0,
                position_y: 76.0,
            });
        }
        state.dependencies.push(Dependency {
            id: "d1".to_string(),
            node_id: "b".to_string(),
            depends_on_node_id: "a".to_string(),
        });
        state
    }

    #[test]
    fn self_loops_are_rejected() {
        let err = add_dependency(&state(), "a", "a").unwrap_err();
        assert_eq!(err, ValidationError::SelfDependency("a".to_string()));
    }

    #[test]
    fn duplicates_are_rejected_in_either_direction() {
        let state = state();
        assert!(matches!(
            add_dependency(&state, "a", "b"),
            Err(ValidationError::DuplicateDependency { .. })
        ));
        assert!(matches!(
            add_dependency(&state, "b", "a"),
            Err(ValidationError::DuplicateDependency { .. })
        ));
    }

    #[test]
    fn unknown_endpoint_is_rejected() {
        assert_eq!(
            add_dependency(&state(), "a", "zz").unwrap_err(),
            ValidationError::UnknownNode("zz".to_string())
        );
    }

    #[test]
    fn new_edge_points_from_source_to_dependent() {
        let mut state = state();
        let patch = add_dependency(&state, "b", "c").unwrap();
        patch.apply(&mut state);
        let dep = state.dependencies.last().unwrap();
        assert_eq!(dep.depends_on_node_id, "b");
        assert_eq!(dep.node_id, "c");
        assert_eq!(state.dependencies.len(), 2);
    }

    #[test]
    fn remove_then_inverse_keeps_edge_order() {
        let mut state = state();
        add_dependency(&state, "b", "c").unwrap().apply(&mut state);
        let before = state.clone();
        let patch = remove_dependency(&state, "d1").unwrap();
        patch.apply(&mut state);
        assert_eq!(state.dependencies.len(), 1);
        patch.inverse().apply(&mut state);
        assert_eq!(state, before);
        assert!(remove_dependency(&state, "nope").is_err());
    }
}
