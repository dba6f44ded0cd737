use crate::fields::{FieldId, Scope};
use crate::views::{ViewHandle, ViewOrchestrator};

/// One selectable row of the canvas.
#[derive(Clone)]
pub struct FlatRow {
    pub id: FieldId,
    pub depth: usize,
    pub scope: Scope,
    pub view: ViewHandle,
    /// The orchestrator tracking this row's view.
    pub owner: ViewOrchestrator,
}

/// Canvas rows in display order: each fieldset is followed by its children.
pub fn flatten_rows(canvas: &ViewOrchestrator) -> Vec<FlatRow> {
    fn append(out: &mut Vec<FlatRow>, owner: &ViewOrchestrator, depth: usize) {
        for (id, view) in owner.entries() {
            let nested = view.borrow().as_fieldset().map(|fs| fs.children().clone());
            out.push(FlatRow {
                id,
                depth,
                scope: owner.scope(),
                view,
                owner: owner.clone(),
            });
            if let Some(children) = nested {
                append(out, &children, depth + 1);
            }
        }
    }

    let mut out = Vec::new();
    append(&mut out, canvas, 0);
    out
}

/// Nearest fieldset at or above `index` on the top level.
pub fn fieldset_above(rows: &[FlatRow], index: usize) -> Option<FieldId> {
    rows.iter()
        .take(index + 1)
        .rev()
        .find(|r| r.depth == 0 && r.view.borrow().as_fieldset().is_some())
        .map(|r| r.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::views::test_support::deps;

    #[test]
    fn flattens_fieldset_children_after_their_parent() {
        let d = deps();
        let canvas = ViewOrchestrator::new(Scope::Canvas, d.clone());
        let a = d.collection.add_type("Text", Scope::Canvas).unwrap();
        let fs = d.collection.add_type("Fieldset", Scope::Canvas).unwrap();
        let x = d.collection.add_type("Checkbox", Scope::Fieldset(fs)).unwrap();
        let b = d.collection.add_type("Numeric", Scope::Canvas).unwrap();
        d.jobs.pump();

        let rows = flatten_rows(&canvas);
        let ids: Vec<(FieldId, usize)> = rows.iter().map(|r| (r.id, r.depth)).collect();
        assert_eq!(ids, vec![(a, 0), (fs, 0), (x, 1), (b, 0)]);
        assert_eq!(rows[2].scope, Scope::Fieldset(fs));

        assert_eq!(fieldset_above(&rows, 3), Some(fs));
        assert_eq!(fieldset_above(&rows, 0), None);
    }
}
