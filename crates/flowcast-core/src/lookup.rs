use flowcast_types::{StatusMetadata, WorkflowMapping};

/// Resolve status metadata for an event endpoint, ID-first with a
/// case-insensitive name fallback (§9 "ID-first, name-fallback lookups").
///
/// Every mapping consumer in the engine must go through this helper rather
/// than indexing `WorkflowMapping` directly — centralising the discipline
/// here avoids the "works with IDs but not names" class of bug that any
/// status-keyed lookup is otherwise prone to.
pub fn lookup_status<'a>(
    mapping: &'a WorkflowMapping,
    id: Option<&str>,
    name: Option<&str>,
) -> Option<&'a StatusMetadata> {
    if let Some(id) = id {
        if let Some(found) = mapping.by_id.get(id) {
            return Some(found);
        }
    }
    let name = name?;
    mapping.by_name.get(&name.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowcast_types::{Role, Tier};

    fn meta(name: &str) -> StatusMetadata {
        StatusMetadata {
            tier: Tier::Downstream,
            role: Role::Active,
            outcome: Default::default(),
            name: name.to_string(),
        }
    }

    #[test]
    fn prefers_id_over_name() {
        let mut mapping = WorkflowMapping::default();
        mapping.insert(Some("10001"), "In Progress", meta("In Progress"));
        mapping.insert(Some("99999"), "in progress", meta("stale duplicate"));

        let found = lookup_status(&mapping, Some("10001"), Some("In Progress")).unwrap();
        assert_eq!(found.name, "In Progress");
    }

    #[test]
    fn falls_back_to_case_insensitive_name_when_id_absent_or_unknown() {
        let mut mapping = WorkflowMapping::default();
        mapping.insert(None, "In Progress", meta("In Progress"));

        assert!(lookup_status(&mapping, None, Some("IN PROGRESS")).is_some());
        assert!(lookup_status(&mapping, Some("unknown-id"), Some("in progress")).is_some());
        assert!(lookup_status(&mapping, Some("unknown-id"), Some("nope")).is_none());
    }
}
