//! Route patterns and the static route table.
//!
//! The table is configuration, not runtime state: it is built once at
//! startup and only read afterwards. Classification is the first step of
//! every access decision.

use campusgate_auth::{Permission, Role};

pub const LOGIN_ROUTE: &str = "/login";
pub const TENANT_SELECTION_ROUTE: &str = "/select-school";
pub const DEPENDENT_SELECTION_ROUTE: &str = "/select-child";
pub const ONBOARDING_ROUTE: &str = "/onboarding";
pub const MAINTENANCE_ROUTE: &str = "/maintenance";

// ─────────────────────────────────────────────────────────────────────────────
// Patterns
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A path pattern of literal and `:param` segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    pub fn new(pattern: &str) -> Self {
        let segments = pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match s.strip_prefix(':') {
                Some(name) => Segment::Param(name.to_string()),
                None => Segment::Literal(s.to_string()),
            })
            .collect();
        Self {
            raw: pattern.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Segment-for-segment match; a param segment matches any one non-empty
    /// path segment. No prefix matching.
    pub fn matches(&self, path: &str) -> bool {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        parts.len() == self.segments.len()
            && self
                .segments
                .iter()
                .zip(parts)
                .all(|(segment, part)| match segment {
                    Segment::Literal(lit) => lit == part,
                    Segment::Param(_) => true,
                })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Rules & classification
// ─────────────────────────────────────────────────────────────────────────────

/// Access requirements for one protected pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRule {
    pub pattern: RoutePattern,
    pub allowed_roles: Vec<Role>,
    pub requires_tenant: bool,
    pub requires_dependent: bool,
    pub requires_onboarding: bool,
    pub required_permission: Option<Permission>,
}

impl RouteRule {
    /// A tenant-scoped rule with no further requirements. Most routes are
    /// this; the builders below add the rest.
    pub fn new(pattern: &str, allowed_roles: impl Into<Vec<Role>>) -> Self {
        Self {
            pattern: RoutePattern::new(pattern),
            allowed_roles: allowed_roles.into(),
            requires_tenant: true,
            requires_dependent: false,
            requires_onboarding: false,
            required_permission: None,
        }
    }

    /// Reachable without an active tenant (platform pages, own profile).
    #[must_use]
    pub fn tenant_free(mut self) -> Self {
        self.requires_tenant = false;
        self
    }

    #[must_use]
    pub fn needs_dependent(mut self) -> Self {
        self.requires_dependent = true;
        self
    }

    #[must_use]
    pub fn needs_onboarding(mut self) -> Self {
        self.requires_onboarding = true;
        self
    }

    #[must_use]
    pub fn needs_permission(mut self, permission: impl Into<Permission>) -> Self {
        self.required_permission = Some(permission.into());
        self
    }
}

/// The selection flow a route belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionStep {
    School,
    Child,
    Onboarding,
}

/// How a path relates to the access model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteClass {
    /// Reachable with no credential at all.
    Public,
    /// One of the interstitial pages of the selection flow.
    Selection(SelectionStep),
    /// Requires a verified token and a resolved context.
    Protected(RouteRule),
    /// No pattern covers the path.
    Unknown,
}

/// The full static route configuration.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    public: Vec<RoutePattern>,
    selection: Vec<(RoutePattern, SelectionStep)>,
    rules: Vec<RouteRule>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_public(&mut self, pattern: &str) {
        self.public.push(RoutePattern::new(pattern));
    }

    pub fn add_selection(&mut self, pattern: &str, step: SelectionStep) {
        self.selection.push((RoutePattern::new(pattern), step));
    }

    pub fn add_rule(&mut self, rule: RouteRule) {
        self.rules.push(rule);
    }

    /// Classify a request path. Query string and fragment are not part of
    /// the route identity and are stripped before matching.
    pub fn classify(&self, path: &str) -> RouteClass {
        let path = path.split(['?', '#']).next().unwrap_or(path);

        if self.public.iter().any(|p| p.matches(path)) {
            return RouteClass::Public;
        }
        if let Some((_, step)) = self.selection.iter().find(|(p, _)| p.matches(path)) {
            return RouteClass::Selection(*step);
        }
        if let Some(rule) = self.rules.iter().find(|r| r.pattern.matches(path)) {
            return RouteClass::Protected(rule.clone());
        }
        RouteClass::Unknown
    }

    /// The stock table for the school platform.
    pub fn default_platform() -> Self {
        use Role::*;

        let mut table = Self::new();

        table.add_public("/");
        table.add_public(LOGIN_ROUTE);
        table.add_public("/forgot-password");
        table.add_public(MAINTENANCE_ROUTE);
        table.add_public("/support");
        table.add_public("/help");
        table.add_public("/terms");

        table.add_selection(TENANT_SELECTION_ROUTE, SelectionStep::School);
        table.add_selection(DEPENDENT_SELECTION_ROUTE, SelectionStep::Child);
        table.add_selection(ONBOARDING_ROUTE, SelectionStep::Onboarding);

        // Platform operations.
        table.add_rule(RouteRule::new("/platform", [SuperAdmin]).tenant_free());
        table.add_rule(RouteRule::new("/platform/schools", [SuperAdmin]).tenant_free());

        // School administration.
        table.add_rule(RouteRule::new("/admin", [SchoolAdmin]).needs_onboarding());
        table.add_rule(RouteRule::new("/admin/staff", [SchoolAdmin]).needs_onboarding());
        table.add_rule(
            RouteRule::new("/admin/settings", [SchoolAdmin])
                .needs_onboarding()
                .needs_permission("school.settings.manage"),
        );
        table.add_rule(
            RouteRule::new("/admin/reports/:report_id", [SchoolAdmin])
                .needs_onboarding()
                .needs_permission("reports.view"),
        );

        // Teaching staff.
        table.add_rule(RouteRule::new("/teacher", [Teacher]).needs_onboarding());
        table.add_rule(RouteRule::new("/teacher/classes", [Teacher]).needs_onboarding());
        table.add_rule(
            RouteRule::new("/teacher/classes/:class_id/attendance", [Teacher]).needs_onboarding(),
        );

        // Students.
        table.add_rule(RouteRule::new("/dashboard", [Student]));
        table.add_rule(RouteRule::new("/dashboard/assignments", [Student]));

        // Guardians; child-scoped pages demand a selected dependent.
        table.add_rule(RouteRule::new("/guardian", [Guardian]));
        table.add_rule(RouteRule::new("/guardian/children", [Guardian]));
        table.add_rule(
            RouteRule::new("/guardian/child/:child_id/grades", [Guardian]).needs_dependent(),
        );
        table.add_rule(
            RouteRule::new("/guardian/child/:child_id/attendance", [Guardian]).needs_dependent(),
        );

        // Own profile works for every role, selected tenant or not.
        table.add_rule(
            RouteRule::new("/profile", [SuperAdmin, SchoolAdmin, Teacher, Student, Guardian])
                .tenant_free(),
        );

        table
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_segments_match_any_value() {
        let pattern = RoutePattern::new("/admin/reports/:report_id");

        assert!(pattern.matches("/admin/reports/42"));
        assert!(pattern.matches("/admin/reports/enrollment-2026"));
        assert!(!pattern.matches("/admin/reports"));
        assert!(!pattern.matches("/admin/reports/42/export"));
    }

    #[test]
    fn literal_segments_must_match_exactly() {
        let pattern = RoutePattern::new("/teacher/classes");

        assert!(pattern.matches("/teacher/classes"));
        assert!(pattern.matches("/teacher/classes/"));
        assert!(!pattern.matches("/teacher/class"));
        assert!(!pattern.matches("/guardian/classes"));
    }

    #[test]
    fn query_and_fragment_are_not_route_identity() {
        let table = RouteTable::default_platform();

        assert_eq!(table.classify("/login?next=%2Fdashboard"), RouteClass::Public);
        assert_eq!(table.classify("/login#form"), RouteClass::Public);
    }

    #[test]
    fn root_path_is_public() {
        let table = RouteTable::default_platform();
        assert_eq!(table.classify("/"), RouteClass::Public);
    }

    #[test]
    fn classification_covers_all_route_kinds() {
        let table = RouteTable::default_platform();

        assert_eq!(table.classify("/login"), RouteClass::Public);
        assert_eq!(
            table.classify(TENANT_SELECTION_ROUTE),
            RouteClass::Selection(SelectionStep::School)
        );
        assert!(matches!(
            table.classify("/guardian/child/abc123/grades"),
            RouteClass::Protected(rule) if rule.requires_dependent
        ));
        assert_eq!(table.classify("/no-such-page"), RouteClass::Unknown);
    }

    #[test]
    fn protected_rules_carry_their_requirements() {
        let table = RouteTable::default_platform();

        let RouteClass::Protected(rule) = table.classify("/admin/settings") else {
            panic!("expected a protected rule");
        };
        assert_eq!(rule.allowed_roles, vec![Role::SchoolAdmin]);
        assert!(rule.requires_onboarding);
        assert_eq!(
            rule.required_permission,
            Some(Permission::new("school.settings.manage"))
        );
    }
}
