/// One plant in the directory. The device list is stored as a comma-joined
/// string by the upstream source; `device_ids` splits and trims it.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PlantDirectoryEntry {
    pub plant_id: i64,
    pub plant_name: String,
    pub devices: String,
}

impl PlantDirectoryEntry {
    pub fn device_ids(&self) -> Vec<String> {
        self.devices
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// One access-grant row for a principal: either a plant grant or the
/// administrator marker (which grants every plant).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GrantRow {
    pub plant_id: Option<i64>,
    pub is_admin: bool,
}
