//! Catalog search filter

use crate::types::Condition;

/// Conditions whose name contains `search`, in catalog order.
///
/// Case-sensitive plain substring match; an empty search keeps everything.
pub fn filter_conditions<'a>(catalog: &'a [Condition], search: &str) -> Vec<&'a Condition> {
    if search.is_empty() {
        return catalog.iter().collect();
    }
    catalog.iter().filter(|c| c.name.contains(search)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConditionId;

    fn catalog(ids: &[&str]) -> Vec<Condition> {
        ids.iter()
            .map(|id| Condition::new(ConditionId::parse(id).unwrap()))
            .collect()
    }

    fn names<'a>(filtered: &[&'a Condition]) -> Vec<&'a str> {
        filtered.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn test_empty_search_is_identity() {
        let cat = catalog(&["100", "205", "300"]);
        let filtered = filter_conditions(&cat, "");
        assert_eq!(filtered.len(), cat.len());
        assert!(filtered.iter().zip(&cat).all(|(a, b)| *a == b));
    }

    #[test]
    fn test_substring_match() {
        let cat = catalog(&["100", "205", "300"]);
        assert_eq!(names(&filter_conditions(&cat, "20")), ["205"]);
        assert_eq!(names(&filter_conditions(&cat, "0")), ["100", "205", "300"]);
        assert!(filter_conditions(&cat, "9").is_empty());
    }

    #[test]
    fn test_case_sensitive() {
        let cat = catalog(&["abc", "ABC"]);
        assert_eq!(names(&filter_conditions(&cat, "ab")), ["abc"]);
    }

    #[test]
    fn test_empty_catalog() {
        assert!(filter_conditions(&[], "").is_empty());
        assert!(filter_conditions(&[], "x").is_empty());
    }
}
