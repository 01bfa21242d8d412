// Path: crates/scheduler/src/eligibility.rs
//! Whether an application may run on this node at all: the owner's node
//! allow-list and geolocation rules.
//!
//! Geolocation rules are strings of the form `ac<PATH>` (allow) and
//! `a!c<PATH>` (deny), where `<PATH>` is `CONTINENT[_COUNTRY[_REGION]]`. A
//! trailing `_ALL` segment means any value at that level.

use fleet_types::app::{NodeGeo, PlacementCandidate};

const ALLOW_PREFIX: &str = "ac";
const DENY_PREFIX: &str = "a!c";
const WILDCARD: &str = "ALL";

/// Why a candidate cannot run here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ineligibility {
    /// The allow-list names other nodes.
    NotTargeted,
    /// The geolocation rules exclude this node.
    Geolocation,
}

impl Ineligibility {
    /// A stable label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::NotTargeted => "not_targeted",
            Self::Geolocation => "geolocation",
        }
    }
}

fn segments(path: &str) -> Vec<&str> {
    let mut parts: Vec<&str> = path.split('_').filter(|s| !s.is_empty()).collect();
    while parts.last() == Some(&WILDCARD) {
        parts.pop();
    }
    parts
}

/// True if `rule_path` covers `node_path` segment by segment.
fn covers(rule_path: &str, node_path: &str) -> bool {
    let rule = segments(rule_path);
    let node = segments(node_path);
    !rule.is_empty()
        && rule.len() <= node.len()
        && rule
            .iter()
            .zip(node.iter())
            .all(|(r, n)| r.eq_ignore_ascii_case(n))
}

/// Applies `rules` to a node at `geo`.
///
/// Any matching deny rule excludes the node. If allow rules exist, at least
/// one must match. A node with unknown location only passes an empty rule set.
pub fn geolocation_allows(rules: &[String], geo: Option<&NodeGeo>) -> bool {
    if rules.is_empty() {
        return true;
    }
    let Some(geo) = geo else {
        return false;
    };
    let path = geo.path();
    let mut has_allow = false;
    let mut allowed = false;
    for rule in rules {
        if let Some(deny) = rule.strip_prefix(DENY_PREFIX) {
            if covers(deny, &path) {
                return false;
            }
        } else if let Some(allow) = rule.strip_prefix(ALLOW_PREFIX) {
            has_allow = true;
            allowed |= covers(allow, &path);
        }
    }
    !has_allow || allowed
}

/// True if the candidate's allow-list lets it run on `address`.
///
/// Enterprise apps are exempt from node scoping.
pub fn allowed_on_node(candidate: &PlacementCandidate, address: &str) -> bool {
    candidate.node_allow_list.is_empty()
        || candidate.enterprise
        || targets(candidate, address)
}

/// True if the candidate's allow-list names `address`.
pub fn targets(candidate: &PlacementCandidate, address: &str) -> bool {
    candidate
        .node_allow_list
        .iter()
        .any(|n| fleet_types::app::same_host(n, address))
}

/// Checks both the allow-list and the geolocation rules.
pub fn check(
    candidate: &PlacementCandidate,
    address: &str,
    geo: Option<&NodeGeo>,
) -> Result<(), Ineligibility> {
    if !allowed_on_node(candidate, address) {
        return Err(Ineligibility::NotTargeted);
    }
    if !geolocation_allows(&candidate.geolocation, geo) {
        return Err(Ineligibility::Geolocation);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geo(continent: &str, country: &str, region: Option<&str>) -> NodeGeo {
        NodeGeo {
            continent: continent.into(),
            country: country.into(),
            region: region.map(str::to_string),
        }
    }

    fn rules(r: &[&str]) -> Vec<String> {
        r.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn allow_rules_match_by_prefix_segments() {
        let prague = geo("EU", "CZ", Some("PRG"));
        assert!(geolocation_allows(&rules(&["acEU"]), Some(&prague)));
        assert!(geolocation_allows(&rules(&["acEU_CZ"]), Some(&prague)));
        assert!(geolocation_allows(&rules(&["acEU_ALL"]), Some(&prague)));
        assert!(!geolocation_allows(&rules(&["acEU_DE"]), Some(&prague)));
        assert!(!geolocation_allows(&rules(&["acNA"]), Some(&prague)));
        assert!(!geolocation_allows(&rules(&["acE"]), Some(&prague)));
        assert!(!geolocation_allows(&rules(&["acEU_CZ_BRN"]), Some(&geo("EU", "CZ", None))));
    }

    #[test]
    fn deny_rules_win_over_allow_rules() {
        let berlin = geo("EU", "DE", None);
        assert!(!geolocation_allows(&rules(&["acEU", "a!cEU_DE"]), Some(&berlin)));
        assert!(geolocation_allows(&rules(&["a!cNA"]), Some(&berlin)));
        assert!(!geolocation_allows(&rules(&["a!cEU_ALL"]), Some(&berlin)));
    }

    #[test]
    fn unknown_location_only_passes_without_rules() {
        assert!(geolocation_allows(&[], None));
        assert!(!geolocation_allows(&rules(&["a!cNA"]), None));
    }

    #[test]
    fn allow_list_scoping() {
        let mut c = PlacementCandidate {
            name: "web".into(),
            hash: "h".into(),
            actual_replicas: 0,
            required_replicas: 3,
            node_allow_list: Vec::new(),
            geolocation: Vec::new(),
            enterprise: false,
            data_replicating: false,
        };
        assert!(allowed_on_node(&c, "10.0.0.1:16127"));

        c.node_allow_list = vec!["10.0.0.2".into()];
        assert!(!allowed_on_node(&c, "10.0.0.1:16127"));
        assert_eq!(check(&c, "10.0.0.1", None), Err(Ineligibility::NotTargeted));

        c.node_allow_list.push("10.0.0.1:16137".into());
        assert!(targets(&c, "10.0.0.1:16127"));

        c.node_allow_list = vec!["10.0.0.9".into()];
        c.enterprise = true;
        assert!(allowed_on_node(&c, "10.0.0.1"));
    }
}
