use super::*;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct ColonyConfigs {
    pub interest_configs: InterestConfigs,
    pub spawn_configs: SpawnConfigs,
    pub sweep_configs: SweepConfigs,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct InterestConfigs {
    /// Base working radius of a colony. Distances are planar.
    pub working_radius: i32,
    /// Observers join when within `working_radius + subscribe_margin`.
    pub subscribe_margin: i32,
}
impl InterestConfigs {
    /// An observer this close or closer becomes a subscriber.
    pub fn join_radius_squared(&self) -> i64 {
        square(self.working_radius + self.subscribe_margin)
    }

    /// An already subscribed observer stays one up to this distance.
    /// Larger than the join radius so observers near the boundary
    /// do not flap in and out every tick.
    pub fn retain_radius_squared(&self) -> i64 {
        square(self.working_radius * 2)
    }
}
impl Default for InterestConfigs {
    fn default() -> Self {
        Self {
            working_radius: 64,
            subscribe_margin: 16,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpawnConfigs {
    /// World ticks between citizen spawns at town hall level 0.
    pub base_interval: u32,
    /// Interval reduction per town hall level.
    pub level_discount: u32,
    /// Interval never shrinks below this.
    pub min_interval: u32,
    /// Population capacity for a fresh colony.
    pub default_max_citizens: u32,
}
impl SpawnConfigs {
    pub fn interval_for_level(&self, town_hall_level: u32) -> u32 {
        self.base_interval
            .saturating_sub(self.level_discount.saturating_mul(town_hall_level))
            .max(self.min_interval)
    }
}
impl Default for SpawnConfigs {
    fn default() -> Self {
        Self {
            base_interval: 600,
            level_discount: 60,
            min_interval: 60,
            default_max_citizens: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SweepConfigs {
    /// The liveness sweep only runs while some observer is within this
    /// distance of the anchor.
    pub proximity: i32,
}
impl SweepConfigs {
    /// How far out every region cell must be loaded before the sweep may
    /// evict anyone: the working radius plus 3 regions, rounded up a region.
    pub fn load_range(&self, interest: &InterestConfigs) -> i32 {
        interest.working_radius + 3 * REGION_SIZE + (REGION_SIZE - 1)
    }
}
impl Default for SweepConfigs {
    fn default() -> Self {
        Self { proximity: 16 }
    }
}

#[test]
fn test_spawn_interval_floor() {
    let configs = SpawnConfigs::default();

    assert_eq!(configs.interval_for_level(0), 600);
    assert_eq!(configs.interval_for_level(5), 300);
    // Far past the floor.
    assert_eq!(configs.interval_for_level(100), configs.min_interval);
}
