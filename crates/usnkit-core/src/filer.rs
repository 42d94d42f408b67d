//! Lookup of file table entries by id.

use std::collections::HashSet;

use crate::error::{Result, UsnError};
use crate::fileref::FileRef;
use crate::record::Record;

/// Deepest ancestor chain followed before giving up
pub const MAX_PATH_DEPTH: usize = 1024;

/// Anything that can return the record for a file reference.
///
/// A miss is reported as [`UsnError::NotFound`]; path resolution treats it
/// as the end of the chain rather than a failure.
pub trait Filer {
    fn file(&self, id: FileRef) -> Result<Record>;
}

impl<F> Filer for F
where
    F: Fn(FileRef) -> Result<Record>,
{
    fn file(&self, id: FileRef) -> Result<Record> {
        self(id)
    }
}

/// Ancestors of `record`, nearest first.
///
/// The walk stops at a zero parent, a self-parented entry, a repeated id, a
/// miss, or after [`MAX_PATH_DEPTH`] steps. Lookup errors other than a
/// miss are returned.
pub fn parents<F: Filer + ?Sized>(filer: &F, record: &Record) -> Result<Vec<Record>> {
    let mut chain = Vec::new();
    let mut visited = HashSet::from([record.id]);
    let mut current = record.id;
    let mut parent = record.parent;

    while chain.len() < MAX_PATH_DEPTH {
        if parent.is_zero() || parent == current || visited.contains(&parent) {
            break;
        }
        let next = match filer.file(parent) {
            Ok(next) => next,
            Err(UsnError::NotFound(_)) => break,
            Err(e) => return Err(e),
        };
        visited.insert(parent);
        current = next.id;
        parent = next.parent;
        chain.push(next);
    }
    Ok(chain)
}

/// Join `record`'s name under its ancestors with `\`, root first.
///
/// The self-parented root directory does not contribute a component.
pub fn resolve<F: Filer + ?Sized>(filer: &F, record: &Record) -> Result<String> {
    let ancestors = parents(filer, record)?;
    let mut components: Vec<&str> = ancestors
        .iter()
        .filter(|a| a.parent != a.id)
        .map(|a| a.file_name.as_str())
        .collect();
    components.reverse();
    components.push(&record.file_name);
    Ok(components.join("\\"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{dir, file};
    use std::collections::HashMap;

    fn lookup(records: Vec<Record>) -> impl Fn(FileRef) -> Result<Record> {
        let map: HashMap<FileRef, Record> = records.into_iter().map(|r| (r.id, r)).collect();
        move |id| map.get(&id).cloned().ok_or(UsnError::NotFound(id))
    }

    #[test]
    fn test_chain_ends_at_zero_parent() {
        let filer = lookup(vec![dir(2, 3, "B"), dir(3, 0, "C")]);
        let a = file(1, 2, "A");
        let names: Vec<_> = parents(&filer, &a)
            .unwrap()
            .into_iter()
            .map(|r| r.file_name)
            .collect();
        assert_eq!(names, vec!["B", "C"]);
        assert_eq!(resolve(&filer, &a).unwrap(), "C\\B\\A");
    }

    #[test]
    fn test_cycle_terminates() {
        let filer = lookup(vec![dir(1, 2, "A"), dir(2, 1, "B")]);
        let a = dir(1, 2, "A");
        assert_eq!(resolve(&filer, &a).unwrap(), "B\\A");
    }

    #[test]
    fn test_root_is_excluded() {
        let root = FileRef::ROOT_RECORD_NUMBER;
        let filer = lookup(vec![dir(root, root, "."), dir(40, root, "docs")]);
        assert_eq!(resolve(&filer, &file(41, 40, "a.txt")).unwrap(), "docs\\a.txt");
    }

    #[test]
    fn test_miss_truncates_other_errors_propagate() {
        let filer = lookup(vec![dir(2, 99, "B")]);
        assert_eq!(resolve(&filer, &file(1, 2, "A")).unwrap(), "B\\A");

        let failing = |_id: FileRef| -> Result<Record> { Err(UsnError::Cancelled) };
        assert!(matches!(
            parents(&failing, &file(1, 2, "A")),
            Err(UsnError::Cancelled)
        ));
    }

    #[test]
    fn test_depth_is_bounded() {
        // Every id n has parent n + 1: an unbounded chain
        let endless = |id: FileRef| -> Result<Record> {
            let n = id.as_u64().unwrap_or(0);
            Ok(dir(n, n + 1, "d"))
        };
        let chain = parents(&endless, &file(1, 2, "leaf")).unwrap();
        assert_eq!(chain.len(), MAX_PATH_DEPTH);
    }
}
