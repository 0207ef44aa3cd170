use crate::types::{AttributePath, Diagnostic, Dynamic};
use std::fmt;

#[derive(Debug, Clone)]
pub struct PlanModifyRequest {
    pub state: Dynamic,
    pub plan: Dynamic,
    pub config: Dynamic,
    pub attribute_path: AttributePath,
}

#[derive(Debug, Clone)]
pub struct PlanModifyResponse {
    pub plan_value: Dynamic,
    pub requires_replace: bool,
    pub diagnostics: Vec<Diagnostic>,
}

/// Trait for modifying terraform plan behavior
///
/// Plan modifiers run after computed attributes have been marked unknown and can:
/// - Modify the planned value
/// - Mark an attribute as requiring replacement
/// - Add warnings or errors to the plan
///
/// They only run when the resource already exists.
pub trait PlanModifier: fmt::Debug + Send + Sync {
    fn modify_plan(&self, request: PlanModifyRequest) -> PlanModifyResponse;
}

/// Marks an attribute as requiring replacement when it changes
#[derive(Debug)]
pub struct RequiresReplace;

impl PlanModifier for RequiresReplace {
    fn modify_plan(&self, request: PlanModifyRequest) -> PlanModifyResponse {
        let requires_replace = !matches!(
            (&request.state, &request.plan),
            (Dynamic::Null, Dynamic::Null) | (Dynamic::Unknown, _) | (_, Dynamic::Unknown)
        ) && !values_equal(&request.state, &request.plan);

        PlanModifyResponse {
            plan_value: request.plan,
            requires_replace,
            diagnostics: Vec::new(),
        }
    }
}

/// Keeps the prior state value for a computed attribute that would otherwise be unknown
#[derive(Debug)]
pub struct UseStateForUnknown;

impl PlanModifier for UseStateForUnknown {
    fn modify_plan(&self, request: PlanModifyRequest) -> PlanModifyResponse {
        let plan_value = match (&request.plan, &request.state) {
            (Dynamic::Unknown, Dynamic::Null) => request.plan,
            (Dynamic::Unknown, state) => state.clone(),
            _ => request.plan,
        };

        PlanModifyResponse {
            plan_value,
            requires_replace: false,
            diagnostics: Vec::new(),
        }
    }
}

/// Structural equality with a tolerance for float noise
pub fn values_equal(a: &Dynamic, b: &Dynamic) -> bool {
    match (a, b) {
        (Dynamic::Null, Dynamic::Null) => true,
        (Dynamic::Unknown, Dynamic::Unknown) => true,
        (Dynamic::Bool(a), Dynamic::Bool(b)) => a == b,
        (Dynamic::Number(a), Dynamic::Number(b)) => (a - b).abs() < f64::EPSILON,
        (Dynamic::String(a), Dynamic::String(b)) => a == b,
        (Dynamic::List(a), Dynamic::List(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| values_equal(x, y))
        }
        (Dynamic::Map(a), Dynamic::Map(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).is_some_and(|v2| values_equal(v, v2)))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn request(state: Dynamic, plan: Dynamic) -> PlanModifyRequest {
        PlanModifyRequest {
            config: plan.clone(),
            state,
            plan,
            attribute_path: AttributePath::new("size"),
        }
    }

    #[test]
    fn requires_replace_does_not_trigger_on_same_value() {
        let response = RequiresReplace.modify_plan(request(
            Dynamic::Number(1000.0),
            Dynamic::Number(1000.0),
        ));

        assert!(!response.requires_replace);
        assert!(response.diagnostics.is_empty());
    }

    #[test]
    fn requires_replace_triggers_on_different_value() {
        let response = RequiresReplace.modify_plan(request(
            Dynamic::Number(1000.0),
            Dynamic::Number(10000.0),
        ));

        assert!(response.requires_replace);
        assert_eq!(response.plan_value, Dynamic::Number(10000.0));
    }

    #[test]
    fn requires_replace_triggers_when_value_added() {
        let response =
            RequiresReplace.modify_plan(request(Dynamic::Null, Dynamic::String("red".into())));
        assert!(response.requires_replace);
    }

    #[test]
    fn requires_replace_ignores_null_and_unknown() {
        assert!(
            !RequiresReplace
                .modify_plan(request(Dynamic::Null, Dynamic::Null))
                .requires_replace
        );
        assert!(
            !RequiresReplace
                .modify_plan(request(Dynamic::Number(1.0), Dynamic::Unknown))
                .requires_replace
        );
        assert!(
            !RequiresReplace
                .modify_plan(request(Dynamic::Unknown, Dynamic::Number(1.0)))
                .requires_replace
        );
    }

    #[test]
    fn use_state_for_unknown_preserves_state_when_unknown() {
        let response = UseStateForUnknown.modify_plan(request(
            Dynamic::String("existing-uid".to_string()),
            Dynamic::Unknown,
        ));

        assert_eq!(
            response.plan_value,
            Dynamic::String("existing-uid".to_string())
        );
        assert!(!response.requires_replace);
    }

    #[test]
    fn use_state_for_unknown_keeps_unknown_without_state() {
        let response = UseStateForUnknown.modify_plan(request(Dynamic::Null, Dynamic::Unknown));
        assert_eq!(response.plan_value, Dynamic::Unknown);
    }

    #[test]
    fn use_state_for_unknown_uses_plan_when_known() {
        let response = UseStateForUnknown.modify_plan(request(
            Dynamic::String("old".to_string()),
            Dynamic::String("new".to_string()),
        ));

        assert_eq!(response.plan_value, Dynamic::String("new".to_string()));
    }

    #[test]
    fn values_equal_handles_all_types() {
        assert!(values_equal(&Dynamic::Number(42.0), &Dynamic::Number(42.0)));
        assert!(!values_equal(&Dynamic::Number(42.0), &Dynamic::Number(43.0)));
        assert!(values_equal(&Dynamic::Bool(true), &Dynamic::Bool(true)));
        assert!(!values_equal(&Dynamic::Null, &Dynamic::Bool(false)));

        let list1 = Dynamic::List(vec![Dynamic::String("a".to_string()), Dynamic::Number(1.0)]);
        let list2 = Dynamic::List(vec![Dynamic::String("a".to_string()), Dynamic::Number(1.0)]);
        let list3 = Dynamic::List(vec![Dynamic::String("b".to_string()), Dynamic::Number(1.0)]);
        assert!(values_equal(&list1, &list2));
        assert!(!values_equal(&list1, &list3));

        let map1 = HashMap::from([("key".to_string(), Dynamic::String("value".to_string()))]);
        let map2 = HashMap::from([("key".to_string(), Dynamic::String("other".to_string()))]);
        assert!(values_equal(
            &Dynamic::Map(map1.clone()),
            &Dynamic::Map(map1.clone())
        ));
        assert!(!values_equal(&Dynamic::Map(map1), &Dynamic::Map(map2)));
    }
}
