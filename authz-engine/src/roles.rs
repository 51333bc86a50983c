//! Effective role-id computation (§4.7 step 3).

use std::collections::HashMap;

use authz_core::AppError;

/// If `role_names` is given, resolves each against the realm's role map and
/// intersects with `principal_role_ids`; an empty intersection fails closed
/// (returns an empty set, not an error — the caller still has principal- and
/// public-scoped grants available). Passing a name the realm doesn't know at
/// all is an [`AppError::UnknownEntity`].
pub fn effective_role_ids(
    role_names: Option<&[String]>,
    realm_roles: &HashMap<String, i64>,
    principal_role_ids: &[i64],
) -> Result<Vec<i64>, AppError> {
    let Some(names) = role_names else {
        return Ok(principal_role_ids.to_vec());
    };

    let mut requested = Vec::with_capacity(names.len());
    for name in names {
        let id = realm_roles
            .get(name)
            .copied()
            .ok_or_else(|| AppError::UnknownEntity(format!("role '{name}'")))?;
        requested.push(id);
    }

    Ok(principal_role_ids
        .iter()
        .copied()
        .filter(|id| requested.contains(id))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles() -> HashMap<String, i64> {
        HashMap::from([("viewer".to_string(), 1), ("editor".to_string(), 2), ("admin".to_string(), 3)])
    }

    #[test]
    fn no_filter_returns_all_principal_roles() {
        let result = effective_role_ids(None, &roles(), &[1, 2]).unwrap();
        assert_eq!(result, vec![1, 2]);
    }

    #[test]
    fn filter_intersects_with_principal_roles() {
        let result = effective_role_ids(Some(&["viewer".to_string()]), &roles(), &[1, 2]).unwrap();
        assert_eq!(result, vec![1]);
    }

    #[test]
    fn unowned_role_in_filter_yields_empty_intersection() {
        let result = effective_role_ids(Some(&["admin".to_string()]), &roles(), &[1, 2]).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn unknown_role_name_is_unknown_entity() {
        let err = effective_role_ids(Some(&["nope".to_string()]), &roles(), &[1]).unwrap_err();
        assert!(matches!(err, AppError::UnknownEntity(_)));
    }
}
