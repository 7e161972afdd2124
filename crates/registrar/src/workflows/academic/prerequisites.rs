use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use super::domain::CourseId;
use crate::store::Store;
use crate::workflows::WorkflowError;

/// Directed course → prerequisite edges, kept acyclic.
///
/// Edge additions run under the write lock, so the cycle check and the insert
/// see the same graph.
pub struct PrerequisiteGraph {
    store: Arc<Store>,
    edges: RwLock<HashMap<CourseId, BTreeSet<CourseId>>>,
}

impl PrerequisiteGraph {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            edges: RwLock::new(HashMap::new()),
        }
    }

    /// Records that `course` requires `prerequisite`.
    pub fn add_edge(
        &self,
        course: &CourseId,
        prerequisite: &CourseId,
    ) -> Result<(), WorkflowError> {
        if course == prerequisite {
            return Err(WorkflowError::bad_request(format!(
                "course {course} cannot be its own prerequisite"
            )));
        }
        let course_row = self.store.courses.require(course)?;
        let prerequisite_row = self.store.courses.require(prerequisite)?;

        let mut edges = self.edges.write();
        if edges
            .get(course)
            .is_some_and(|existing| existing.contains(prerequisite))
        {
            return Err(WorkflowError::conflict(format!(
                "{} already requires {}",
                course_row.code, prerequisite_row.code
            )));
        }
        if reaches(&edges, prerequisite, course) {
            return Err(WorkflowError::bad_request(format!(
                "making {} a prerequisite of {} would create a cycle",
                prerequisite_row.code, course_row.code
            )));
        }

        edges
            .entry(course.clone())
            .or_default()
            .insert(prerequisite.clone());
        info!(course = %course_row.code, prerequisite = %prerequisite_row.code, "prerequisite added");
        Ok(())
    }

    /// Removes the edge if present. Existing registrations are untouched.
    pub fn remove_edge(&self, course: &CourseId, prerequisite: &CourseId) {
        let mut edges = self.edges.write();
        let removed = match edges.get_mut(course) {
            Some(required) => {
                let removed = required.remove(prerequisite);
                if required.is_empty() {
                    edges.remove(course);
                }
                removed
            }
            None => false,
        };
        if removed {
            info!(course = %course, prerequisite = %prerequisite, "prerequisite removed");
        }
    }

    /// Direct prerequisites of `course`, ordered by id.
    pub fn prerequisites_of(&self, course: &CourseId) -> Vec<CourseId> {
        self.edges
            .read()
            .get(course)
            .map(|required| required.iter().cloned().collect())
            .unwrap_or_default()
    }
}

/// Iterative depth-first search along prerequisite edges from `start`,
/// reporting whether `target` is reachable. The visited set is local to the
/// call and bounds the walk to each node once.
fn reaches(
    edges: &HashMap<CourseId, BTreeSet<CourseId>>,
    start: &CourseId,
    target: &CourseId,
) -> bool {
    let mut visited: HashSet<&CourseId> = HashSet::new();
    let mut stack = vec![start];

    while let Some(node) = stack.pop() {
        if node == target {
            return true;
        }
        if !visited.insert(node) {
            continue;
        }
        if let Some(next) = edges.get(node) {
            stack.extend(next.iter().filter(|candidate| !visited.contains(candidate)));
        }
    }
    false
}
