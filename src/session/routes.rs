//! Route admission
//!
//! The one place role policy decides which views a session may reach.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::state::Session;
use crate::identity::Role;

/// Navigable views across the public site, admin console and field app
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewId {
    // public site
    Home,
    About,
    Activities,
    Announcements,
    Contact,
    Login,
    // admin console
    Dashboard,
    IncidentReport,
    Scheduling,
    PatrolLogs,
    Accounts,
    GisMapping,
    AdminActivities,
    AdminAnnouncements,
    // field users
    FieldHome,
}

const PUBLIC_VIEWS: &[ViewId] = &[
    ViewId::Home,
    ViewId::About,
    ViewId::Activities,
    ViewId::Announcements,
    ViewId::Contact,
    ViewId::Login,
];

const ADMIN_VIEWS: &[ViewId] = &[
    ViewId::Dashboard,
    ViewId::IncidentReport,
    ViewId::Scheduling,
    ViewId::PatrolLogs,
    ViewId::Accounts,
    ViewId::GisMapping,
    ViewId::AdminActivities,
    ViewId::AdminAnnouncements,
];

const ALL_VIEWS: &[ViewId] = &[
    ViewId::Home,
    ViewId::About,
    ViewId::Activities,
    ViewId::Announcements,
    ViewId::Contact,
    ViewId::Login,
    ViewId::Dashboard,
    ViewId::IncidentReport,
    ViewId::Scheduling,
    ViewId::PatrolLogs,
    ViewId::Accounts,
    ViewId::GisMapping,
    ViewId::AdminActivities,
    ViewId::AdminAnnouncements,
    ViewId::FieldHome,
];

impl ViewId {
    pub fn path(&self) -> &'static str {
        match self {
            ViewId::Home => "/",
            ViewId::About => "/about",
            ViewId::Activities => "/activities",
            ViewId::Announcements => "/announcements",
            ViewId::Contact => "/contact",
            ViewId::Login => "/login",
            ViewId::Dashboard => "/dashboard",
            ViewId::IncidentReport => "/incident-report",
            ViewId::Scheduling => "/scheduling",
            ViewId::PatrolLogs => "/patrol-logs",
            ViewId::Accounts => "/accounts",
            ViewId::GisMapping => "/gis-mapping",
            ViewId::AdminActivities => "/admin-activities",
            ViewId::AdminAnnouncements => "/admin-announcements",
            ViewId::FieldHome => "/user",
        }
    }

    /// Paths compare case-insensitively and ignore a trailing slash
    pub fn from_path(path: &str) -> Option<ViewId> {
        let trimmed = path.trim();
        let normalized = match trimmed.trim_end_matches('/') {
            "" => "/".to_string(),
            p => p.to_ascii_lowercase(),
        };
        ALL_VIEWS.iter().copied().find(|v| v.path() == normalized)
    }
}

/// Views a session may navigate to, plus where it lands by default
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteAdmission {
    views: BTreeSet<ViewId>,
    landing: ViewId,
}

impl RouteAdmission {
    fn new(views: &[ViewId], landing: ViewId) -> Self {
        Self { views: views.iter().copied().collect(), landing }
    }

    pub fn views(&self) -> &BTreeSet<ViewId> {
        &self.views
    }

    pub fn landing(&self) -> ViewId {
        self.landing
    }

    pub fn permits(&self, view: ViewId) -> bool {
        self.views.contains(&view)
    }

    /// The view actually shown for a request: the request itself when
    /// admitted, otherwise a redirect to the landing view.
    pub fn resolve(&self, requested: ViewId) -> ViewId {
        if self.permits(requested) {
            requested
        } else {
            self.landing
        }
    }

    /// Like [`resolve`](Self::resolve) for raw paths; unknown paths land too
    pub fn resolve_path(&self, path: &str) -> ViewId {
        ViewId::from_path(path)
            .map(|v| self.resolve(v))
            .unwrap_or(self.landing)
    }
}

/// Pure derivation from session state and role
pub fn admitted_routes(session: &Session) -> RouteAdmission {
    match (session.is_authenticated(), session.principal()) {
        (true, Some(principal)) => match principal.role {
            Role::Admin => RouteAdmission::new(ADMIN_VIEWS, ViewId::Dashboard),
            Role::Tanod | Role::Resident => RouteAdmission::new(&[ViewId::FieldHome], ViewId::FieldHome),
        },
        _ => RouteAdmission::new(PUBLIC_VIEWS, ViewId::Home),
    }
}
