use std::collections::BTreeSet;
use std::sync::Arc;

use solar_client::domain::DailySummary;

use crate::store::{GrantStore, StoreError};

/// What a principal is allowed to see, before any request narrowing.
#[derive(Debug, Clone, PartialEq)]
pub enum AccessGrant {
    All,
    Plants(BTreeSet<i64>),
}

#[derive(thiserror::Error, Debug)]
pub enum ScopeError {
    #[error("principal has no plant grants")]
    NoGrants,
    #[error("requested plants outside of grant")]
    Denied,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The resolved visibility of one query: the grant intersected with any
/// explicit request filter. `plants: None` means the all-plants scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Scope {
    pub plants: Option<BTreeSet<i64>>,
    pub devices: Option<BTreeSet<String>>,
}

impl Scope {
    pub fn all() -> Self {
        Self {
            plants: None,
            devices: None,
        }
    }

    pub fn for_plant(plant_id: i64) -> Self {
        Self {
            plants: Some(BTreeSet::from([plant_id])),
            devices: None,
        }
    }

    /// Stable signature for cache keys: `all`, or sorted plant/device filters.
    /// Device ids are length-prefixed so an id containing the join separator
    /// cannot alias another device set onto the same key.
    pub fn signature(&self) -> String {
        let mut sig = match &self.plants {
            None => "all".to_string(),
            Some(plants) => {
                let joined: Vec<String> = plants.iter().map(i64::to_string).collect();
                format!("p{}", joined.join("-"))
            }
        };
        if let Some(devices) = &self.devices {
            sig.push_str("_d");
            let tagged: Vec<String> = devices
                .iter()
                .map(|d| format!("{}:{d}", d.len()))
                .collect();
            sig.push_str(&tagged.join("-"));
        }
        sig
    }

    /// Whether a summary row is visible in this scope. Rows without a plant
    /// attribution only show up in the all-plants scope.
    pub fn allows(&self, summary: &DailySummary) -> bool {
        if let Some(plants) = &self.plants {
            match summary.plant_id {
                Some(pid) if plants.contains(&pid) => {}
                _ => return false,
            }
        }
        if let Some(devices) = &self.devices {
            if !devices.contains(&summary.device_id) {
                return false;
            }
        }
        true
    }
}

/// Maps a principal plus an optional request filter to a `Scope`, denying
/// hard when the filter reaches outside the grant.
pub struct ScopeResolver {
    grants: Arc<dyn GrantStore>,
}

impl ScopeResolver {
    pub fn new(grants: Arc<dyn GrantStore>) -> Self {
        Self { grants }
    }

    pub async fn resolve(
        &self,
        principal: &str,
        requested_plants: &[i64],
        requested_devices: &[String],
    ) -> Result<Scope, ScopeError> {
        let rows = self.grants.grant_rows(principal).await?;

        let grant = if rows.iter().any(|r| r.is_admin) {
            AccessGrant::All
        } else {
            let plants: BTreeSet<i64> = rows.iter().filter_map(|r| r.plant_id).collect();
            if plants.is_empty() {
                return Err(ScopeError::NoGrants);
            }
            AccessGrant::Plants(plants)
        };

        let plants = match (&grant, requested_plants.is_empty()) {
            (AccessGrant::All, true) => None,
            (AccessGrant::All, false) => Some(requested_plants.iter().copied().collect()),
            (AccessGrant::Plants(allowed), true) => Some(allowed.clone()),
            (AccessGrant::Plants(allowed), false) => {
                let requested: BTreeSet<i64> = requested_plants.iter().copied().collect();
                if !requested.is_subset(allowed) {
                    return Err(ScopeError::Denied);
                }
                Some(requested)
            }
        };

        let devices = if requested_devices.is_empty() {
            None
        } else {
            Some(requested_devices.iter().cloned().collect())
        };

        Ok(Scope { plants, devices })
    }
}
