//! Runtime settings and the CPI category catalog.
//!
//! Settings come from the environment (optionally via a `.env` file) and are
//! overridden per-command by CLI flags.
//!
//! Environment variables:
//! - `FRED_API_KEY`: required for `--source fred`
//! - `CPI_AI_HOST`: OpenAI-compatible server for narrative analysis (optional)
//! - `CPI_AI_API_KEY`: bearer key for that server (optional)
//! - `CPI_AI_MODEL`: default model (default: claude-3-5-sonnet)
//! - `CPI_CACHE_TTL_SECS`: series cache TTL (default: 3600)
//! - `CPI_RECONCILE_TOLERANCE`: contribution tolerance in pp (default: 0.5)

use std::collections::HashMap;
use std::time::Duration;

use crate::domain::{AiModel, CategoryWeight};
use crate::error::AppError;
use crate::metrics::DEFAULT_TOLERANCE;

/// Parent aggregate for the built-in contribution breakdown.
pub const HEADLINE_CATEGORY: &str = "all_items";

/// A CPI category known to the tool.
#[derive(Debug, Clone, Copy)]
pub struct CategoryInfo {
    pub id: &'static str,
    pub label: &'static str,
    /// Parent aggregate and relative importance, for categories in the built-in breakdown.
    pub parent: Option<(&'static str, f64)>,
    /// FRED series id, seasonally adjusted.
    pub fred_sa: &'static str,
    /// FRED series id, not seasonally adjusted.
    pub fred_nsa: &'static str,
}

impl CategoryInfo {
    pub fn fred_series(&self, seasonally_adjusted: bool) -> &'static str {
        if seasonally_adjusted { self.fred_sa } else { self.fred_nsa }
    }
}

/// U.S. city average CPI-U categories and their FRED series.
///
/// Weights approximate the BLS relative importance of the four top-level
/// components of All items.
pub const CATEGORIES: &[CategoryInfo] = &[
    CategoryInfo {
        id: "all_items",
        label: "All items",
        parent: None,
        fred_sa: "CPIAUCSL",
        fred_nsa: "CPIAUCNS",
    },
    CategoryInfo {
        id: "core",
        label: "All items less food and energy",
        parent: None,
        fred_sa: "CPILFESL",
        fred_nsa: "CPILFENS",
    },
    CategoryInfo {
        id: "core_services",
        label: "Services less energy services",
        parent: Some((HEADLINE_CATEGORY, 0.58)),
        fred_sa: "CUSR0000SASLE",
        fred_nsa: "CUUR0000SASLE",
    },
    CategoryInfo {
        id: "core_goods",
        label: "Commodities less food and energy commodities",
        parent: Some((HEADLINE_CATEGORY, 0.20)),
        fred_sa: "CUSR0000SACL1E",
        fred_nsa: "CUUR0000SACL1E",
    },
    CategoryInfo {
        id: "food",
        label: "Food",
        parent: Some((HEADLINE_CATEGORY, 0.14)),
        fred_sa: "CPIUFDSL",
        fred_nsa: "CPIUFDNS",
    },
    CategoryInfo {
        id: "energy",
        label: "Energy",
        parent: Some((HEADLINE_CATEGORY, 0.08)),
        fred_sa: "CPIENGSL",
        fred_nsa: "CPIENGNS",
    },
    CategoryInfo {
        id: "core_less_shelter",
        label: "All items less food, shelter, and energy",
        parent: None,
        fred_sa: "CUSR0000SA0L12E",
        fred_nsa: "CUUR0000SA0L12E",
    },
    CategoryInfo {
        id: "shelter",
        label: "Shelter",
        parent: None,
        fred_sa: "CUSR0000SAH1",
        fred_nsa: "CUUR0000SAH1",
    },
    CategoryInfo {
        id: "food_at_home",
        label: "Food at home",
        parent: None,
        fred_sa: "CUSR0000SAF11",
        fred_nsa: "CUUR0000SAF11",
    },
    CategoryInfo {
        id: "food_away",
        label: "Food away from home",
        parent: None,
        fred_sa: "CUSR0000SEFV",
        fred_nsa: "CUUR0000SEFV",
    },
    CategoryInfo {
        id: "energy_commodities",
        label: "Energy commodities",
        parent: None,
        fred_sa: "CUSR0000SACE",
        fred_nsa: "CUUR0000SACE",
    },
    CategoryInfo {
        id: "energy_services",
        label: "Energy services",
        parent: None,
        fred_sa: "CUSR0000SEHF",
        fred_nsa: "CUUR0000SEHF",
    },
    CategoryInfo {
        id: "transportation_services",
        label: "Transportation services",
        parent: None,
        fred_sa: "CUSR0000SAS4",
        fred_nsa: "CUUR0000SAS4",
    },
    CategoryInfo {
        id: "gasoline",
        label: "Gasoline (all types)",
        parent: None,
        fred_sa: "CUSR0000SETB01",
        fred_nsa: "CUUR0000SETB01",
    },
    CategoryInfo {
        id: "new_vehicles",
        label: "New vehicles",
        parent: None,
        fred_sa: "CUSR0000SETA01",
        fred_nsa: "CUUR0000SETA01",
    },
    CategoryInfo {
        id: "used_vehicles",
        label: "Used cars and trucks",
        parent: None,
        fred_sa: "CUSR0000SETA02",
        fred_nsa: "CUUR0000SETA02",
    },
];

/// Named set of categories reported and narrated together.
#[derive(Debug, Clone, Copy)]
pub struct CategoryGroup {
    pub id: &'static str,
    pub label: &'static str,
    pub members: &'static [&'static str],
}

pub const GROUPS: &[CategoryGroup] = &[
    CategoryGroup {
        id: "headline",
        label: "All items",
        members: &["all_items"],
    },
    CategoryGroup {
        id: "core",
        label: "Core CPI",
        members: &["core", "core_less_shelter"],
    },
    CategoryGroup {
        id: "food",
        label: "Food",
        members: &["food", "food_at_home", "food_away"],
    },
    CategoryGroup {
        id: "energy",
        label: "Energy",
        members: &["energy", "energy_commodities", "energy_services", "gasoline"],
    },
    CategoryGroup {
        id: "core_goods",
        label: "Core goods",
        members: &["core_goods", "new_vehicles", "used_vehicles"],
    },
    CategoryGroup {
        id: "core_services",
        label: "Core services",
        members: &["core_services", "shelter", "transportation_services"],
    },
];

pub fn group(id: &str) -> Option<&'static CategoryGroup> {
    GROUPS.iter().find(|g| g.id == id)
}

/// Resolve group ids, rejecting unknown ones.
pub fn resolve_groups(ids: &[String]) -> Result<Vec<&'static CategoryGroup>, AppError> {
    ids.iter()
        .map(|id| {
            group(id.trim()).ok_or_else(|| {
                let known: Vec<&str> = GROUPS.iter().map(|g| g.id).collect();
                AppError::new(2, format!("Unknown category group '{id}' (known: {}).", known.join(", ")))
            })
        })
        .collect()
}

pub fn category(id: &str) -> Option<&'static CategoryInfo> {
    CATEGORIES.iter().find(|c| c.id == id)
}

/// Display label for a category id, falling back to the id itself.
pub fn category_label(id: &str) -> &str {
    category(id).map(|c| c.label).unwrap_or(id)
}

/// Ids of the categories that make up `parent` in the built-in breakdown.
pub fn child_categories(parent: &str) -> Vec<&'static str> {
    CATEGORIES
        .iter()
        .filter(|c| c.parent.is_some_and(|(p, _)| p == parent))
        .map(|c| c.id)
        .collect()
}

/// Built-in weights for the children of `parent`.
pub fn builtin_weights(parent: &str) -> HashMap<String, CategoryWeight> {
    CATEGORIES
        .iter()
        .filter_map(|c| {
            let (p, w) = c.parent?;
            (p == parent).then(|| {
                (
                    c.id.to_string(),
                    CategoryWeight {
                        category_id: c.id.to_string(),
                        parent_id: Some(p.to_string()),
                        weight: w,
                    },
                )
            })
        })
        .collect()
}

/// Narrative service settings.
#[derive(Debug, Clone)]
pub struct AiSettings {
    pub host: Option<String>,
    pub api_key: Option<String>,
    pub model: AiModel,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            host: None,
            api_key: None,
            model: AiModel::default(),
            max_tokens: 1000,
            temperature: 0.1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub fred_api_key: Option<String>,
    pub tolerance: f64,
    /// Months averaged by the rolling average column.
    pub average_window: usize,
    /// Distinct dates a contribution history must cover to be shown as a trend.
    pub min_contribution_periods: usize,
    pub cache_ttl: Duration,
    pub ai: AiSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fred_api_key: None,
            tolerance: DEFAULT_TOLERANCE,
            average_window: 12,
            min_contribution_periods: 12,
            cache_ttl: Duration::from_secs(3600),
            ai: AiSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from the process environment (and `.env`, if present).
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut settings = Settings::default();

        settings.fred_api_key = get("FRED_API_KEY");

        if let Some(raw) = get("CPI_RECONCILE_TOLERANCE") {
            let tol: f64 = raw
                .parse()
                .map_err(|_| AppError::new(2, format!("Invalid CPI_RECONCILE_TOLERANCE '{raw}'.")))?;
            if !(tol.is_finite() && tol >= 0.0) {
                return Err(AppError::new(2, "CPI_RECONCILE_TOLERANCE must be >= 0."));
            }
            settings.tolerance = tol;
        }

        if let Some(raw) = get("CPI_CACHE_TTL_SECS") {
            let secs: u64 = raw
                .parse()
                .map_err(|_| AppError::new(2, format!("Invalid CPI_CACHE_TTL_SECS '{raw}'.")))?;
            settings.cache_ttl = Duration::from_secs(secs);
        }

        settings.ai.host = get("CPI_AI_HOST");
        settings.ai.api_key = get("CPI_AI_API_KEY");
        if let Some(raw) = get("CPI_AI_MODEL") {
            settings.ai.model = raw
                .parse()
                .map_err(|e: String| AppError::new(2, format!("Invalid CPI_AI_MODEL: {e}")))?;
        }

        Ok(settings)
    }
}
