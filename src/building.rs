use super::*;

/// What kind of structure is expected to sit at a building's position.
/// This is the closed set of categories the substrate can be asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StructureCategory {
    TownHall,
    Home,
    Builder,
    Farm,
    Warehouse,
}

/// Per-category sub-state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BuildingKind {
    TownHall,
    Home {
        residents: SmallVec<[CitizenId; 4]>,
    },
    Builder {
        /// Position of the upgrade site this builder is assigned to.
        active_site: Option<BlockPos>,
    },
    Farm {
        growth: u8,
        worker: Option<CitizenId>,
    },
    Warehouse {
        stock: u32,
    },
}
impl BuildingKind {
    pub fn for_category(category: StructureCategory) -> Self {
        match category {
            StructureCategory::TownHall => BuildingKind::TownHall,
            StructureCategory::Home => BuildingKind::Home {
                residents: SmallVec::new(),
            },
            StructureCategory::Builder => BuildingKind::Builder { active_site: None },
            StructureCategory::Farm => BuildingKind::Farm {
                growth: 0,
                worker: None,
            },
            StructureCategory::Warehouse => BuildingKind::Warehouse { stock: 0 },
        }
    }

    pub fn category(&self) -> StructureCategory {
        match self {
            BuildingKind::TownHall => StructureCategory::TownHall,
            BuildingKind::Home { .. } => StructureCategory::Home,
            BuildingKind::Builder { .. } => StructureCategory::Builder,
            BuildingKind::Farm { .. } => StructureCategory::Farm,
            BuildingKind::Warehouse { .. } => StructureCategory::Warehouse,
        }
    }
}

/// Something a building asks its colony to do after its slow tick.
pub enum BuildingEvent {
    /// A farm finished a growth cycle. The colony routes the crop to a
    /// warehouse if it has one.
    Harvest,
}

/// Growth value at which a farm harvests and starts over.
const FARM_GROWTH_CYCLE: u8 = 100;

/// How many citizens a home can house.
const HOME_CAPACITY_PER_LEVEL: usize = 2;

/// A sub-entity of the colony, keyed by its position.
#[derive(Debug, Clone)]
pub struct Building {
    position: BlockPos,
    level: u32,
    kind: BuildingKind,
    dirty: bool,
}
impl Building {
    pub fn new(position: BlockPos, category: StructureCategory) -> Self {
        Self {
            position,
            level: 0,
            kind: BuildingKind::for_category(category),
            // Fresh buildings broadcast on the next pass.
            dirty: true,
        }
    }

    pub fn from_save(save: BuildingSave) -> Self {
        Self {
            position: save.position,
            level: save.level,
            kind: save.kind,
            dirty: true,
        }
    }

    pub fn save(&self) -> BuildingSave {
        BuildingSave {
            position: self.position,
            level: self.level,
            kind: self.kind.clone(),
        }
    }

    pub fn position(&self) -> BlockPos {
        self.position
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn kind(&self) -> &BuildingKind {
        &self.kind
    }

    pub fn category(&self) -> StructureCategory {
        self.kind.category()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    pub fn set_level(&mut self, level: u32) {
        self.level = level;
        self.dirty = true;
    }

    /// Fast cadence tick. Buildings currently do all their work on the slow
    /// cadence, this stage exists so they can react every simulation tick.
    pub fn tick(&mut self) {}

    /// Slow cadence tick.
    pub fn world_tick(&mut self) -> Option<BuildingEvent> {
        match &mut self.kind {
            BuildingKind::Farm { growth, .. } => {
                *growth += 1;
                if *growth >= FARM_GROWTH_CYCLE {
                    *growth = 0;
                    self.dirty = true;
                    return Some(BuildingEvent::Harvest);
                }
                None
            }
            _ => None,
        }
    }

    /// Try to house a citizen. Only homes with a free spot accept.
    pub fn house_citizen(&mut self, citizen_id: CitizenId) -> bool {
        if let BuildingKind::Home { residents } = &mut self.kind {
            let capacity = HOME_CAPACITY_PER_LEVEL * (self.level as usize + 1);
            if residents.len() < capacity && !residents.contains(&citizen_id) {
                residents.push(citizen_id);
                self.dirty = true;
                return true;
            }
        }
        false
    }

    /// Accept a harvest into storage.
    pub fn store_harvest(&mut self) -> bool {
        if let BuildingKind::Warehouse { stock } = &mut self.kind {
            *stock += 1;
            self.dirty = true;
            return true;
        }
        false
    }

    /// Assign this builder to an upgrade site.
    pub fn assign_site(&mut self, site: Option<BlockPos>) -> bool {
        if let BuildingKind::Builder { active_site } = &mut self.kind {
            *active_site = site;
            self.dirty = true;
            return true;
        }
        false
    }

    pub fn active_site(&self) -> Option<BlockPos> {
        match self.kind {
            BuildingKind::Builder { active_site } => active_site,
            _ => None,
        }
    }

    /// Forget a citizen that left the colony, was evicted or died.
    pub fn remove_citizen(&mut self, citizen_id: CitizenId) {
        match &mut self.kind {
            BuildingKind::Home { residents } => {
                if let Some(i) = residents.iter().position(|id| *id == citizen_id) {
                    residents.swap_remove(i);
                    self.dirty = true;
                }
            }
            BuildingKind::Farm { worker, .. } => {
                if *worker == Some(citizen_id) {
                    *worker = None;
                    self.dirty = true;
                }
            }
            _ => {}
        }
    }

    pub fn view(&self) -> BuildingViewData {
        BuildingViewData {
            level: self.level,
            kind: self.kind.clone(),
        }
    }
}

/// Self-describing structural blob for one building.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingSave {
    pub position: BlockPos,
    pub level: u32,
    pub kind: BuildingKind,
}

/// What observers see of one building.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingViewData {
    pub level: u32,
    pub kind: BuildingKind,
}

#[test]
fn test_home_capacity_scales_with_level() {
    let mut home = Building::new(BlockPos::default(), StructureCategory::Home);

    assert!(home.house_citizen(CitizenId(1)));
    assert!(home.house_citizen(CitizenId(2)));
    assert!(!home.house_citizen(CitizenId(3)));

    home.set_level(1);
    assert!(home.house_citizen(CitizenId(3)));
}

#[test]
fn test_remove_citizen_only_touches_their_building() {
    let mut home = Building::new(BlockPos::default(), StructureCategory::Home);
    home.house_citizen(CitizenId(1));
    home.clear_dirty();

    home.remove_citizen(CitizenId(2));
    assert!(!home.is_dirty());

    home.remove_citizen(CitizenId(1));
    assert!(home.is_dirty());
    assert_eq!(
        home.kind(),
        &BuildingKind::Home {
            residents: SmallVec::new()
        }
    );
}

#[test]
fn test_farm_harvest_cycle() {
    let mut farm = Building::new(BlockPos::default(), StructureCategory::Farm);
    farm.clear_dirty();

    for _ in 0..99 {
        assert!(farm.world_tick().is_none());
    }
    assert!(!farm.is_dirty());
    assert!(matches!(farm.world_tick(), Some(BuildingEvent::Harvest)));
    assert!(farm.is_dirty());
}
