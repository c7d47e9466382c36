//! Rate-limit compiler: effective rate-limit policy → flat descriptors.
//!
//! ```text
//! ns/rlp  limits: { l1: rates [ {1, 3, minute} ] }
//!   → { namespace: "ns/rlp", maxValue: 1, seconds: 180,
//!       conditions: ["limit.l1__<hash> == \"1\""], variables: [], name: "ns/rlp" }
//! ```
//!
//! Compilation is total: out-of-range input is clamped, never rejected.
//! Validation belongs to admission, upstream of this crate.

use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::model::{EnforcementDescriptor, NamespacedName, Node, Rate, RateLimitSpec};

/// Seconds per recognized time unit.
pub fn unit_seconds(unit: &str) -> Option<u64> {
    match unit {
        "second" => Some(1),
        "minute" => Some(60),
        "hour" => Some(60 * 60),
        "day" => Some(60 * 60 * 24),
        _ => None,
    }
}

/// `(max_value, window_seconds)` for one rate.
///
/// A negative count becomes 0. The window is 0 unless the duration is
/// positive and the unit is recognized.
pub fn rate_to_seconds(rate: &Rate) -> (u64, u64) {
    let max_value = u64::try_from(rate.limit).unwrap_or(0);
    let window = match (u64::try_from(rate.duration), unit_seconds(&rate.unit)) {
        (Ok(duration), Some(unit)) if duration > 0 => duration.saturating_mul(unit),
        _ => 0,
    };
    (max_value, window)
}

/// Stable namespace shared by every descriptor of a policy.
pub fn limits_namespace(policy: &NamespacedName) -> String {
    format!("{}/{}", policy.namespace, policy.name)
}

/// Identifier of one limit, unique across policies and limits.
///
/// The readable part is the sanitized limit name; the hash suffix keeps two
/// names that sanitize alike (or the same name in two policies) apart.
pub fn limit_identifier(policy: &NamespacedName, limit: &str) -> String {
    let sanitized: String = limit
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    let digest = Sha256::digest(format!("{}/{}/{}", policy.namespace, policy.name, limit).as_bytes());
    format!("limit.{}__{}", sanitized, hex::encode(&digest[..4]))
}

/// Read the rules block of an effective rate-limit policy.
pub fn parse_rules(rules: &serde_json::Value) -> Result<RateLimitSpec, serde_json::Error> {
    if rules.is_null() {
        return Ok(RateLimitSpec::default());
    }
    RateLimitSpec::deserialize(rules)
}

/// One descriptor per (limit, rate), limits in name order, rates in
/// declaration order.
pub fn compile(policy: &NamespacedName, spec: &RateLimitSpec) -> Vec<EnforcementDescriptor> {
    let namespace = limits_namespace(policy);
    let mut descriptors = Vec::new();
    for (limit_name, limit) in &spec.limits {
        let identifier = limit_identifier(policy, limit_name);
        let variables = limit.counter_names();
        for rate in &limit.rates {
            let (max_value, window_seconds) = rate_to_seconds(rate);
            descriptors.push(EnforcementDescriptor {
                namespace: namespace.clone(),
                identifier: identifier.clone(),
                max_value,
                window_seconds,
                conditions: vec![format!("{identifier} == \"1\"")],
                variables: variables.clone(),
                name: namespace.clone(),
            });
        }
    }
    descriptors
}

/// A limit as the Limitador object declares it. The numeric fields stay raw
/// so that values never produced here (negative, fractional) read as a
/// mismatch rather than an unreadable list.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeclaredLimit {
    #[serde(default)]
    namespace: String,
    #[serde(default)]
    max_value: serde_json::Value,
    #[serde(default)]
    seconds: serde_json::Value,
    #[serde(default)]
    conditions: Vec<String>,
    #[serde(default)]
    variables: Vec<String>,
}

impl DeclaredLimit {
    /// The identifier is not kept by the rate-limiting service, so it takes
    /// no part in the comparison.
    fn matches(&self, wanted: &EnforcementDescriptor) -> bool {
        self.namespace == wanted.namespace
            && self.max_value.as_u64() == Some(wanted.max_value)
            && self.seconds.as_u64() == Some(wanted.window_seconds)
            && self.conditions == wanted.conditions
            && self.variables == wanted.variables
    }
}

/// Whether the Limitador instance already declares every descriptor.
///
/// `Err` carries a description of an unreadable `spec.limits`.
pub fn is_synced(limitador: &Node, descriptors: &[EnforcementDescriptor]) -> Result<bool, String> {
    let declared: Vec<DeclaredLimit> = match limitador.spec_field("/limits") {
        None | Some(serde_json::Value::Null) => Vec::new(),
        Some(raw) => Vec::<DeclaredLimit>::deserialize(raw)
            .map_err(|e| format!("unreadable limits on {}: {e}", limitador.key))?,
    };
    Ok(descriptors
        .iter()
        .all(|wanted| declared.iter().any(|have| have.matches(wanted))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{kinds, Limit, Object};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn rlp1() -> NamespacedName {
        NamespacedName::new("ns", "rlp1")
    }

    #[test]
    fn test_rlp1_scenario() {
        let mut spec = RateLimitSpec::default();
        spec.limits.insert("l1".into(), Limit { rates: vec![Rate::new(1, 3, "minute")], counters: vec![] });

        let descriptors = compile(&rlp1(), &spec);
        let id = limit_identifier(&rlp1(), "l1");
        assert_eq!(
            descriptors,
            vec![EnforcementDescriptor {
                namespace: "ns/rlp1".into(),
                identifier: id.clone(),
                max_value: 1,
                window_seconds: 180,
                conditions: vec![format!("{id} == \"1\"")],
                variables: vec![],
                name: "ns/rlp1".into(),
            }]
        );
    }

    #[test]
    fn test_identifiers() {
        let a = limit_identifier(&rlp1(), "per-user");
        assert!(a.starts_with("limit.per_user__"));
        assert_eq!(a.len(), "limit.per_user__".len() + 8);
        // stable
        assert_eq!(a, limit_identifier(&rlp1(), "per-user"));
        // sanitizes alike, hashes apart
        assert_ne!(a, limit_identifier(&rlp1(), "per_user"));
        // same limit name, different policy
        assert_ne!(a, limit_identifier(&NamespacedName::new("ns", "rlp2"), "per-user"));
    }

    #[test]
    fn test_rates_and_limits_fan_out() {
        let spec = parse_rules(&json!({
            "limits": {
                "b": {"rates": [{"limit": 10, "duration": 1, "unit": "second"}, {"limit": 100, "duration": 1, "unit": "hour"}]},
                "a": {"rates": [{"limit": 5, "duration": 2, "unit": "day"}], "counters": ["auth.identity.user"]}
            }
        }))
        .unwrap();
        let descriptors = compile(&rlp1(), &spec);
        let windows: Vec<u64> = descriptors.iter().map(|d| d.window_seconds).collect();
        assert_eq!(windows, vec![172_800, 1, 3600]);
        assert_eq!(descriptors[0].variables, vec!["auth.identity.user"]);
        assert!(descriptors.iter().all(|d| d.name == "ns/rlp1"));
    }

    #[test]
    fn test_null_rules_compile_to_nothing() {
        assert!(compile(&rlp1(), &parse_rules(&serde_json::Value::Null).unwrap()).is_empty());
    }

    #[test]
    fn test_is_synced() {
        let mut spec = RateLimitSpec::default();
        spec.limits.insert("l1".into(), Limit { rates: vec![Rate::new(1, 3, "minute")], counters: vec![] });
        let descriptors = compile(&rlp1(), &spec);

        let empty = Node::from_object(Object::new(kinds::LIMITADOR, "k", "limitador"));
        assert_eq!(is_synced(&empty, &descriptors), Ok(false));
        assert_eq!(is_synced(&empty, &[]), Ok(true));

        let synced = Node::from_object(
            Object::new(kinds::LIMITADOR, "k", "limitador")
                .with_spec(json!({"limits": serde_json::to_value(&descriptors).unwrap()})),
        );
        assert_eq!(is_synced(&synced, &descriptors), Ok(true));

        let broken = Node::from_object(
            Object::new(kinds::LIMITADOR, "k", "limitador").with_spec(json!({"limits": "nope"})),
        );
        assert!(is_synced(&broken, &descriptors).is_err());
    }

    #[test]
    fn test_out_of_range_declared_values_are_a_mismatch() {
        let mut spec = RateLimitSpec::default();
        spec.limits.insert("l1".into(), Limit { rates: vec![Rate::new(1, 3, "minute")], counters: vec![] });
        let descriptors = compile(&rlp1(), &spec);

        let mut declared = serde_json::to_value(&descriptors).unwrap();
        declared[0]["maxValue"] = json!(-1);
        declared[0]["seconds"] = json!(180.5);
        let drifted = Node::from_object(
            Object::new(kinds::LIMITADOR, "k", "limitador").with_spec(json!({"limits": declared})),
        );
        assert_eq!(is_synced(&drifted, &descriptors), Ok(false));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn any_unit() -> impl Strategy<Value = String> {
            prop_oneof![
                Just("second".to_string()),
                Just("minute".to_string()),
                Just("hour".to_string()),
                Just("day".to_string()),
                "[a-z]{0,8}",
            ]
        }

        proptest! {
            #[test]
            fn window_is_zero_for_non_positive_duration(
                limit in any::<i64>(),
                duration in i64::MIN..=0,
                unit in any_unit(),
            ) {
                let (_, window) = rate_to_seconds(&Rate::new(limit, duration, unit));
                prop_assert_eq!(window, 0);
            }

            #[test]
            fn window_is_zero_for_unknown_unit(
                duration in any::<i64>(),
                unit in "[a-z]{0,8}".prop_filter("known unit", |u| unit_seconds(u).is_none()),
            ) {
                let (_, window) = rate_to_seconds(&Rate::new(1, duration, unit));
                prop_assert_eq!(window, 0);
            }

            #[test]
            fn max_value_is_clamped_count(limit in any::<i64>()) {
                let (max_value, _) = rate_to_seconds(&Rate::new(limit, 1, "second"));
                if limit < 0 {
                    prop_assert_eq!(max_value, 0);
                } else {
                    prop_assert_eq!(max_value, limit as u64);
                }
            }

            #[test]
            fn window_is_duration_times_unit(duration in 1i64..1_000_000, unit in any_unit()) {
                let (_, window) = rate_to_seconds(&Rate::new(1, duration, unit.clone()));
                let expected = unit_seconds(&unit).map(|s| s * duration as u64).unwrap_or(0);
                prop_assert_eq!(window, expected);
            }
        }
    }
}
