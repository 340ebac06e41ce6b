//! Matching a printed child name against the user's roster

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Child {
    pub id: Uuid,
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildMatch {
    Found { id: Uuid, first_name: String },
    NotFound,
    /// Several roster entries contain the name; never resolved to one of them
    Ambiguous { candidates: Vec<String> },
}

/// Resolve `child_name_raw` among the children of `user_id`.
///
/// Exact, case-sensitive first-name equality first. Only when that finds
/// nobody, a case-insensitive substring pass: the printed name contained in
/// a first name. Two or more hits in either pass are ambiguous.
pub fn resolve_child(child_name_raw: &str, user_id: Uuid, roster: &[Child]) -> ChildMatch {
    let name = child_name_raw.trim();
    if name.is_empty() {
        return ChildMatch::NotFound;
    }

    let own: Vec<&Child> = roster.iter().filter(|c| c.user_id == user_id).collect();

    let exact: Vec<&Child> = own.iter().copied().filter(|c| c.first_name == name).collect();
    if !exact.is_empty() {
        return single_or_ambiguous(exact);
    }

    let needle = name.to_lowercase();
    let partial: Vec<&Child> = own
        .iter()
        .copied()
        .filter(|c| c.first_name.to_lowercase().contains(&needle))
        .collect();

    if partial.is_empty() {
        ChildMatch::NotFound
    } else {
        single_or_ambiguous(partial)
    }
}

fn single_or_ambiguous(matches: Vec<&Child>) -> ChildMatch {
    match matches.as_slice() {
        [only] => ChildMatch::Found {
            id: only.id,
            first_name: only.first_name.clone(),
        },
        many => ChildMatch::Ambiguous {
            candidates: many.iter().map(|c| c.first_name.clone()).collect(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn child(user_id: Uuid, first_name: &str) -> Child {
        Child {
            id: Uuid::new_v4(),
            user_id,
            first_name: first_name.to_string(),
            last_name: None,
        }
    }

    #[test]
    fn test_exact_match_beats_longer_names() {
        let user = Uuid::new_v4();
        let emma = child(user, "Emma");
        let roster = vec![emma.clone(), child(user, "Emmanuel")];

        assert_eq!(
            resolve_child("Emma", user, &roster),
            ChildMatch::Found { id: emma.id, first_name: "Emma".into() }
        );
    }

    #[test]
    fn test_partial_match_with_two_hits_is_ambiguous() {
        let user = Uuid::new_v4();
        let roster = vec![child(user, "Emma"), child(user, "Emmanuel")];

        assert_eq!(
            resolve_child("Em", user, &roster),
            ChildMatch::Ambiguous { candidates: vec!["Emma".into(), "Emmanuel".into()] }
        );
    }

    #[test]
    fn test_partial_match_is_case_insensitive() {
        let user = Uuid::new_v4();
        let olivia = child(user, "Olivia");
        let roster = vec![olivia.clone(), child(user, "Noah")];

        assert!(matches!(resolve_child("OLIV", user, &roster), ChildMatch::Found { id, .. } if id == olivia.id));
        // exact pass is case-sensitive, partial pass still finds her
        assert!(matches!(resolve_child("olivia", user, &roster), ChildMatch::Found { id, .. } if id == olivia.id));
    }

    #[test]
    fn test_other_users_children_are_invisible() {
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();
        let roster = vec![child(other, "Emma")];

        assert_eq!(resolve_child("Emma", user, &roster), ChildMatch::NotFound);
    }

    #[test]
    fn test_no_match_and_empty_roster() {
        let user = Uuid::new_v4();
        assert_eq!(resolve_child("Zoe", user, &[]), ChildMatch::NotFound);
        assert_eq!(resolve_child("Zoe", user, &[child(user, "Emma")]), ChildMatch::NotFound);
        assert_eq!(resolve_child("  ", user, &[child(user, "Emma")]), ChildMatch::NotFound);
    }
}
