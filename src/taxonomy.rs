//! Request taxonomy and team routing.
//!
//! `RequestTaxonomy` is the fixed set of allowed request-type / sub-type
//! pairs; `TaxonomyRouter` maps a validated request type to its owning team.
//! Both are immutable process-wide configuration, loaded once at startup —
//! from a JSON file when one is configured, otherwise the built-in defaults.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;

/// Team that receives requests whose type has no explicit assignment.
pub const DEFAULT_TEAM: &str = "General Support Team";

// ── Request taxonomy ────────────────────────────────────────────────

/// Fixed mapping from request type to its allowed sub-request types.
///
/// An empty sub-type list means the type carries no sub-categorization and
/// any (including empty) sub-type is accepted from the classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestTaxonomy {
    types: BTreeMap<String, Vec<String>>,
}

impl RequestTaxonomy {
    pub fn new(types: BTreeMap<String, Vec<String>>) -> Self {
        Self { types }
    }

    /// Whether `request_type` is a known taxonomy key.
    pub fn contains(&self, request_type: &str) -> bool {
        self.types.contains_key(request_type)
    }

    /// Allowed sub-types for a request type, if the type is known.
    pub fn sub_types(&self, request_type: &str) -> Option<&[String]> {
        self.types.get(request_type).map(Vec::as_slice)
    }

    /// Whether the pair satisfies taxonomy membership: the type must be a
    /// key, and if it maps to a non-empty sub-type list the sub-type must
    /// be a member.
    pub fn is_valid_pair(&self, request_type: &str, sub_request_type: &str) -> bool {
        match self.types.get(request_type) {
            None => false,
            Some(subs) if subs.is_empty() => true,
            Some(subs) => subs.iter().any(|s| s == sub_request_type),
        }
    }

    /// Iterate over request types and their sub-type lists.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.types.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Default for RequestTaxonomy {
    /// The loan-servicing request taxonomy this service ships with.
    fn default() -> Self {
        let mut types = BTreeMap::new();
        types.insert(
            "Adjustment".to_string(),
            vec![
                "Reallocation Fees".to_string(),
                "Amendment Fees".to_string(),
                "Reallocation Principal".to_string(),
            ],
        );
        types.insert("AU Transfer".to_string(), vec![]);
        types.insert(
            "Closing Notice".to_string(),
            vec![
                "Cashless Roll".to_string(),
                "Decrease".to_string(),
                "Increase".to_string(),
            ],
        );
        types.insert("Commitment Change".to_string(), vec![]);
        types.insert(
            "Fee Payment".to_string(),
            vec![
                "Ongoing Fee".to_string(),
                "Letter of Credit Fee".to_string(),
                "Principal".to_string(),
                "Interest".to_string(),
                "Principal + Interest".to_string(),
                "Principal+Interest+Fee".to_string(),
            ],
        );
        types.insert("Money Movement-Inbound".to_string(), vec![]);
        types.insert(
            "Money Movement - Outbound".to_string(),
            vec!["Timebound".to_string(), "Foreign Currency".to_string()],
        );
        Self { types }
    }
}

// ── Team routing ────────────────────────────────────────────────────

/// Maps a validated request type to its owning team.
///
/// `route` is total: unmapped types fall back to the configured default
/// team, never an error.
#[derive(Debug, Clone)]
pub struct TaxonomyRouter {
    teams: BTreeMap<String, String>,
    default_team: String,
}

impl TaxonomyRouter {
    pub fn new(teams: BTreeMap<String, String>, default_team: impl Into<String>) -> Self {
        Self {
            teams,
            default_team: default_team.into(),
        }
    }

    /// Look up the owning team for a request type.
    pub fn route(&self, request_type: &str) -> &str {
        self.teams
            .get(request_type)
            .map(String::as_str)
            .unwrap_or(&self.default_team)
    }

    pub fn default_team(&self) -> &str {
        &self.default_team
    }

    /// Startup consistency check: every taxonomy key should have a team
    /// assignment. A gap is a configuration smell, not a runtime failure —
    /// affected types route to the default team.
    pub fn check_consistency(&self, taxonomy: &RequestTaxonomy) -> Vec<String> {
        let unmapped: Vec<String> = taxonomy
            .entries()
            .filter(|(rt, _)| !self.teams.contains_key(*rt))
            .map(|(rt, _)| rt.to_string())
            .collect();
        for rt in &unmapped {
            warn!(
                request_type = %rt,
                default_team = %self.default_team,
                "Request type has no team assignment, will route to default team"
            );
        }
        unmapped
    }
}

impl Default for TaxonomyRouter {
    fn default() -> Self {
        let mut teams = BTreeMap::new();
        teams.insert("Adjustment".to_string(), "Finance Team".to_string());
        teams.insert("AU Transfer".to_string(), "Finance Team".to_string());
        teams.insert("Closing Notice".to_string(), "Legal Team".to_string());
        teams.insert("Commitment Change".to_string(), "Finance Team".to_string());
        teams.insert("Fee Payment".to_string(), "Finance Team".to_string());
        teams.insert("Money Movement-Inbound".to_string(), "Accounts Team".to_string());
        teams.insert("Money Movement - Outbound".to_string(), "Accounts Team".to_string());
        Self {
            teams,
            default_team: DEFAULT_TEAM.to_string(),
        }
    }
}

// ── File loading ────────────────────────────────────────────────────

/// On-disk shape of the taxonomy configuration file.
#[derive(Debug, Deserialize)]
struct TaxonomyFile {
    request_types: BTreeMap<String, Vec<String>>,
    teams: BTreeMap<String, String>,
    #[serde(default = "default_team_name")]
    default_team: String,
}

fn default_team_name() -> String {
    DEFAULT_TEAM.to_string()
}

/// Load taxonomy and router from a JSON config file.
pub fn load_from_file(path: &Path) -> Result<(RequestTaxonomy, TaxonomyRouter), ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    let file: TaxonomyFile = serde_json::from_str(&raw)
        .map_err(|e| ConfigError::ParseError(format!("{}: {e}", path.display())))?;
    if file.request_types.is_empty() {
        return Err(ConfigError::InvalidValue {
            key: "request_types".to_string(),
            message: "taxonomy must define at least one request type".to_string(),
        });
    }
    Ok((
        RequestTaxonomy::new(file.request_types),
        TaxonomyRouter::new(file.teams, file.default_team),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_taxonomy_has_expected_types() {
        let taxonomy = RequestTaxonomy::default();
        assert_eq!(taxonomy.len(), 7);
        assert!(taxonomy.contains("Fee Payment"));
        assert!(taxonomy.contains("Money Movement - Outbound"));
        assert!(!taxonomy.contains("Unknown Type"));
    }

    #[test]
    fn valid_pair_requires_subtype_membership() {
        let taxonomy = RequestTaxonomy::default();
        assert!(taxonomy.is_valid_pair("Fee Payment", "Ongoing Fee"));
        assert!(!taxonomy.is_valid_pair("Fee Payment", "Made Up Fee"));
    }

    #[test]
    fn valid_pair_empty_subtype_list_accepts_anything() {
        let taxonomy = RequestTaxonomy::default();
        assert!(taxonomy.is_valid_pair("AU Transfer", ""));
        assert!(taxonomy.is_valid_pair("AU Transfer", "whatever"));
    }

    #[test]
    fn valid_pair_unknown_type_rejected() {
        let taxonomy = RequestTaxonomy::default();
        assert!(!taxonomy.is_valid_pair("Nope", ""));
    }

    #[test]
    fn route_known_type() {
        let router = TaxonomyRouter::default();
        assert_eq!(router.route("Fee Payment"), "Finance Team");
        assert_eq!(router.route("Closing Notice"), "Legal Team");
        assert_eq!(router.route("Money Movement-Inbound"), "Accounts Team");
    }

    #[test]
    fn route_unmapped_type_falls_back_to_default() {
        let router = TaxonomyRouter::default();
        assert_eq!(router.route("Unknown Type"), DEFAULT_TEAM);
    }

    #[test]
    fn route_is_deterministic() {
        let router = TaxonomyRouter::default();
        assert_eq!(router.route("Adjustment"), router.route("Adjustment"));
    }

    #[test]
    fn consistency_check_flags_unmapped_types() {
        let mut types = BTreeMap::new();
        types.insert("Fee Payment".to_string(), vec![]);
        types.insert("New Product".to_string(), vec![]);
        let taxonomy = RequestTaxonomy::new(types);

        let router = TaxonomyRouter::default();
        let unmapped = router.check_consistency(&taxonomy);
        assert_eq!(unmapped, vec!["New Product".to_string()]);
    }

    #[test]
    fn consistency_check_clean_on_defaults() {
        let router = TaxonomyRouter::default();
        assert!(router.check_consistency(&RequestTaxonomy::default()).is_empty());
    }

    #[test]
    fn load_from_file_parses_taxonomy_and_teams() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "request_types": {{"Fee Payment": ["Ongoing Fee"], "AU Transfer": []}},
                "teams": {{"Fee Payment": "Finance Team"}},
                "default_team": "Ops Team"
            }}"#
        )
        .unwrap();

        let (taxonomy, router) = load_from_file(file.path()).unwrap();
        assert!(taxonomy.contains("Fee Payment"));
        assert_eq!(router.route("Fee Payment"), "Finance Team");
        assert_eq!(router.route("AU Transfer"), "Ops Team");
        assert_eq!(router.check_consistency(&taxonomy), vec!["AU Transfer".to_string()]);
    }

    #[test]
    fn load_from_file_rejects_empty_taxonomy() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"request_types": {{}}, "teams": {{}}}}"#).unwrap();
        assert!(load_from_file(file.path()).is_err());
    }

    #[test]
    fn load_from_file_missing_file_is_io_error() {
        let result = load_from_file(Path::new("/nonexistent/taxonomy.json"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
