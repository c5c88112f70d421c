use std::collections::HashMap;
use std::sync::Arc;

use crate::store::{DirectoryStore, StoreError};

/// A plant as seen by the aggregation core.
#[derive(Debug, Clone)]
pub struct PlantRef {
    pub plant_id: i64,
    pub plant_name: String,
}

/// Resolved device->plant mapping, built fresh from the directory store at the
/// start of each scheduled pass. A device the directory does not know maps to
/// `None` and is excluded from plant-scoped aggregates.
pub struct DeviceDirectory {
    device_to_plant: HashMap<String, i64>,
    plants: Vec<PlantRef>,
}

impl DeviceDirectory {
    pub async fn load(store: &Arc<dyn DirectoryStore>) -> Result<Self, StoreError> {
        let entries = store.plant_directory().await?;

        let mut device_to_plant = HashMap::new();
        let mut plants = Vec::with_capacity(entries.len());
        for entry in entries {
            for device in entry.device_ids() {
                device_to_plant.insert(device, entry.plant_id);
            }
            plants.push(PlantRef {
                plant_id: entry.plant_id,
                plant_name: entry.plant_name,
            });
        }

        tracing::debug!(
            plants = plants.len(),
            devices = device_to_plant.len(),
            "plant directory loaded"
        );

        Ok(Self {
            device_to_plant,
            plants,
        })
    }

    pub fn plant_of(&self, device_id: &str) -> Option<i64> {
        self.device_to_plant.get(device_id).copied()
    }

    pub fn plants(&self) -> &[PlantRef] {
        &self.plants
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryDirectoryStore;
    use solar_client::domain::PlantDirectoryEntry;

    fn directory_store() -> Arc<dyn DirectoryStore> {
        Arc::new(MemoryDirectoryStore::new(vec![
            PlantDirectoryEntry {
                plant_id: 7,
                plant_name: "ESIC Kalaburagi Hospital".to_string(),
                devices: "Inverter_16,Inverter_17".to_string(),
            },
            PlantDirectoryEntry {
                plant_id: 9,
                plant_name: "Sivara".to_string(),
                devices: "Inverter_21".to_string(),
            },
        ]))
    }

    #[tokio::test]
    async fn maps_devices_to_their_plant() {
        let store = directory_store();
        let dir = DeviceDirectory::load(&store).await.expect("load");

        assert_eq!(dir.plant_of("Inverter_16"), Some(7));
        assert_eq!(dir.plant_of("Inverter_21"), Some(9));
        assert_eq!(dir.plant_of("Inverter_99"), None);
        assert_eq!(dir.plants().len(), 2);
    }
}
