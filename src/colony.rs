use super::*;
use std::cell::RefCell;
use std::rc::Rc;

/// Kept by building position while an upgrade is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeTarget {
    pub category: StructureCategory,
    pub level: u32,
}

/// Authoritative state of one settlement and its replication bookkeeping.
///
/// Owned by an external scheduler which steps [Colony::settlement_tick] and
/// [Colony::world_tick] from a single thread.
pub struct Colony {
    pub(crate) colony_id: ColonyId,
    pub(crate) dimension: u32,
    pub(crate) name: String,
    /// Never moves after creation. All interest ranges are measured from here.
    anchor: BlockPos,
    pub(crate) max_citizens: u32,

    pub(crate) owners: AHashSet<ObserverId>,

    /// Position of the first town hall ever placed. Never replaced while the
    /// colony is alive, even if that building is later destroyed.
    pub(crate) town_hall: Option<BlockPos>,
    pub(crate) buildings: IndexMap<BlockPos, Building, RandomState>,
    pub(crate) upgrades: AHashMap<BlockPos, UpgradeTarget>,
    /// Positions removed since the last replication pass. Consumed by one
    /// pass, then cleared.
    pub(crate) removed_buildings: SmallVec<[BlockPos; 4]>,

    pub(crate) citizens: IndexMap<CitizenId, CitizenSlot, RandomState>,

    /// Changed-since-last-broadcast flags. Aggregate and citizen scope live
    /// here, each building owns its own.
    pub(crate) dirty: bool,
    pub(crate) citizens_dirty: bool,

    /// Tick state, never persisted.
    pub(crate) subscribers: AHashSet<ObserverId>,
    pub(crate) previous_subscribers: AHashSet<ObserverId>,

    /// World ticks until the next citizen may spawn.
    spawn_countdown: u32,

    configs: ColonyConfigs,
}
impl Colony {
    pub fn new(anchor: BlockPos, dimension: u32, configs: ColonyConfigs) -> Self {
        Self {
            colony_id: ColonyId::random(),
            dimension,
            name: String::new(),
            anchor,
            max_citizens: configs.spawn_configs.default_max_citizens,
            owners: Default::default(),
            town_hall: None,
            buildings: Default::default(),
            upgrades: Default::default(),
            removed_buildings: Default::default(),
            citizens: Default::default(),
            dirty: false,
            citizens_dirty: false,
            subscribers: Default::default(),
            previous_subscribers: Default::default(),
            spawn_countdown: configs.spawn_configs.base_interval,
            configs,
        }
    }

    pub fn colony_id(&self) -> ColonyId {
        self.colony_id
    }

    pub fn dimension(&self) -> u32 {
        self.dimension
    }

    pub fn anchor(&self) -> BlockPos {
        self.anchor
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: String) {
        self.name = name;
        self.dirty = true;
    }

    pub fn max_citizens(&self) -> u32 {
        self.max_citizens
    }

    pub fn subscribers(&self) -> &AHashSet<ObserverId> {
        &self.subscribers
    }

    /// Is this position within the colony's working range?
    pub fn is_within_working_range(&self, position: BlockPos) -> bool {
        self.anchor.planar_distance_squared(position)
            <= square(self.configs.interest_configs.working_radius)
    }

    // ################################################################
    // ############## OWNERS ##########################################
    // ################################################################

    pub fn owners(&self) -> &AHashSet<ObserverId> {
        &self.owners
    }

    pub fn is_owner(&self, observer_id: ObserverId) -> bool {
        self.owners.contains(&observer_id)
    }

    pub fn add_owner(&mut self, observer_id: ObserverId) {
        self.owners.insert(observer_id);
        self.dirty = true;
    }

    pub fn remove_owner(&mut self, observer_id: ObserverId) {
        self.owners.remove(&observer_id);
        self.dirty = true;
    }

    // ################################################################
    // ############## BUILDINGS #######################################
    // ################################################################

    pub fn buildings(&self) -> &IndexMap<BlockPos, Building, RandomState> {
        &self.buildings
    }

    pub fn building(&self, position: BlockPos) -> Option<&Building> {
        self.buildings.get(&position)
    }

    pub fn town_hall(&self) -> Option<&Building> {
        self.town_hall
            .and_then(|position| self.buildings.get(&position))
    }

    pub fn removed_buildings(&self) -> &[BlockPos] {
        &self.removed_buildings
    }

    /// A structure of the given category was placed at this position.
    /// Refused if the position is already tracked.
    pub fn place_building(&mut self, position: BlockPos, category: StructureCategory) -> bool {
        if self.buildings.contains_key(&position) {
            return false;
        }

        // New buildings are created dirty and broadcast on the next pass.
        self.buildings
            .insert(position, Building::new(position, category));

        // Limit 1 town hall.
        if category == StructureCategory::TownHall && self.town_hall.is_none() {
            self.town_hall = Some(position);
        }

        self.dirty = true;
        true
    }

    /// The building at this position is gone (destroyed externally or
    /// evicted by the sanity scan). Its position stays visible in
    /// [Self::removed_buildings] for one replication pass.
    pub fn remove_building(&mut self, position: BlockPos) -> bool {
        if self.buildings.swap_remove(&position).is_none() {
            return false;
        }

        self.removed_buildings.push(position);
        self.upgrades.remove(&position);
        self.release_builders(position);

        self.dirty = true;
        true
    }

    // ################################################################
    // ############## UPGRADES ########################################
    // ################################################################

    pub fn upgrades(&self) -> &AHashMap<BlockPos, UpgradeTarget> {
        &self.upgrades
    }

    /// Queue an upgrade of the building at `position` to `level` and put an
    /// idle builder on it. Refused for untracked positions.
    pub fn request_upgrade(&mut self, position: BlockPos, level: u32) -> bool {
        let Some(building) = self.buildings.get(&position) else {
            return false;
        };

        self.upgrades.insert(
            position,
            UpgradeTarget {
                category: building.category(),
                level,
            },
        );

        if let Some(builder) = self
            .buildings
            .values_mut()
            .find(|b| b.category() == StructureCategory::Builder && b.active_site().is_none())
        {
            builder.assign_site(Some(position));
        }

        true
    }

    pub fn cancel_upgrade(&mut self, position: BlockPos) {
        self.upgrades.remove(&position);
        self.release_builders(position);
    }

    /// The upgrade work at `position` finished.
    pub fn complete_upgrade(&mut self, position: BlockPos) -> bool {
        let Some(target) = self.upgrades.remove(&position) else {
            return false;
        };
        self.release_builders(position);

        if let Some(building) = self.buildings.get_mut(&position) {
            building.set_level(target.level);
            true
        } else {
            false
        }
    }

    fn release_builders(&mut self, site: BlockPos) {
        for building in self.buildings.values_mut() {
            if building.active_site() == Some(site) {
                building.assign_site(None);
            }
        }
    }

    // ################################################################
    // ############## CITIZENS ########################################
    // ################################################################

    pub fn citizens(&self) -> &IndexMap<CitizenId, CitizenSlot, RandomState> {
        &self.citizens
    }

    pub fn is_citizen(&self, citizen_id: CitizenId) -> bool {
        self.citizens.contains_key(&citizen_id)
    }

    /// The live citizen, if its soft reference currently resolves.
    pub fn citizen(&self, citizen_id: CitizenId) -> Option<Rc<RefCell<Citizen>>> {
        self.citizens.get(&citizen_id)?.resolve()
    }

    /// Link a live object to an already known roster entry, e.g. a citizen
    /// materialized by the world after a load. Reports failure for ids the
    /// roster does not know, without mutating anything.
    pub fn register_citizen(&mut self, citizen: &Rc<RefCell<Citizen>>) -> bool {
        let citizen_id = citizen.borrow().citizen_id;
        let Some(slot) = self.citizens.get_mut(&citizen_id) else {
            return false;
        };

        *slot = CitizenSlot::Linked(CitizenHandle::new(citizen));
        self.citizens_dirty = true;
        true
    }

    pub fn remove_citizen(&mut self, citizen_id: CitizenId) {
        if self.citizens.swap_remove(&citizen_id).is_none() {
            return;
        }

        for building in self.buildings.values_mut() {
            building.remove_citizen(citizen_id);
        }
        self.citizens_dirty = true;
    }

    // ################################################################
    // ############## TICKS ###########################################
    // ################################################################

    /// Fast cadence. Stage order is fixed: building ticks, then subscriber
    /// recomputation, then the replication pass which also clears the dirty
    /// flags. Reordering these causes stale broadcasts or missed deltas.
    pub fn settlement_tick(&mut self, observers: &[Observer], sink: &mut dyn MessageSink) {
        for building in self.buildings.values_mut() {
            building.tick();
        }

        let subscribers = compute_subscribers(
            self.anchor,
            &self.owners,
            observers,
            &self.subscribers,
            &self.configs.interest_configs,
        );
        self.previous_subscribers = std::mem::replace(&mut self.subscribers, subscribers);

        self.replication_pass(sink);
    }

    /// Slow cadence: liveness sweep, citizen spawning, building sanity scan
    /// and slow building ticks.
    pub fn world_tick(
        &mut self,
        substrate: &mut dyn Substrate,
        observers: &[Observer],
        sink: &mut dyn MessageSink,
    ) {
        self.sweep_citizens(substrate, observers);
        self.spawn_step(substrate, sink);
        self.building_scan(substrate);
    }

    /// Evict citizens whose backing object is confirmed gone.
    ///
    /// Citizens can disappear without dying, so their soft references must be
    /// reconciled against the world. Only safe while the colony's whole
    /// surroundings are loaded; with chunks missing, a live citizen could
    /// look absent and be evicted wrongly. The observer proximity check
    /// keeps the load probe from running for abandoned corners of the world.
    fn sweep_citizens(&mut self, substrate: &dyn Substrate, observers: &[Observer]) {
        let observer_close_enough = observers.iter().any(|observer| {
            observer.position.distance_squared(self.anchor)
                <= square(self.configs.sweep_configs.proximity)
        });
        if !observer_close_enough {
            return;
        }

        let range = self
            .configs
            .sweep_configs
            .load_range(&self.configs.interest_configs);
        let mut x = self.anchor.x - range;
        while x <= self.anchor.x + range {
            let mut z = self.anchor.z - range;
            while z <= self.anchor.z + range {
                if !substrate.is_loaded(BlockPos::new(x, self.anchor.y, z)) {
                    return;
                }
                z += REGION_SIZE;
            }
            x += REGION_SIZE;
        }

        let absent: Vec<CitizenId> = self
            .citizens
            .iter()
            .filter(|(_, slot)| slot.resolve().is_none())
            .map(|(citizen_id, _)| *citizen_id)
            .collect();

        for citizen_id in absent {
            log::warn!(
                "Citizen {} of colony {} has gone missing, evicting them",
                citizen_id,
                self.colony_id
            );
            self.remove_citizen(citizen_id);
        }
    }

    /// Materialize one new citizen near the anchor when there is room, a
    /// town hall stands and the spawn countdown has run out. Higher town
    /// hall levels shorten the countdown.
    fn spawn_step(&mut self, substrate: &mut dyn Substrate, sink: &mut dyn MessageSink) {
        let Some(town_hall_level) = self.town_hall().map(|building| building.level()) else {
            return;
        };
        // At capacity, spawning silently does not fire.
        if self.citizens.len() as u32 >= self.max_citizens {
            return;
        }
        if !substrate.is_loaded(self.anchor) {
            return;
        }

        if self.spawn_countdown > 0 {
            self.spawn_countdown -= 1;
            return;
        }

        // No open spot right now. Try again next world tick.
        let Some(spawn_point) = substrate.find_spawn_point(self.anchor) else {
            return;
        };
        self.spawn_countdown = self
            .configs
            .spawn_configs
            .interval_for_level(town_hall_level);

        let citizen_id = CitizenId::random();
        let citizen =
            substrate.materialize_citizen(Citizen::new(citizen_id, spawn_point, self.colony_id));
        self.citizens
            .insert(citizen_id, CitizenSlot::Linked(CitizenHandle::new(&citizen)));
        self.citizens_dirty = true;

        for building in self.buildings.values_mut() {
            if building.house_citizen(citizen_id) {
                break;
            }
        }

        if self.citizens.len() as u32 == self.max_citizens {
            for &owner in self.owners.iter() {
                sink.send(
                    owner,
                    ColonyOutbound::Notification {
                        colony_id: self.colony_id,
                        notification: Notification::PopulationCapacityReached,
                    },
                );
            }
        }
    }

    /// Slow per-building pass: destroy buildings whose block no longer
    /// matches their category, run slow ticks for the rest. Destruction is
    /// queued so the map is never mutated while iterated.
    fn building_scan(&mut self, substrate: &dyn Substrate) {
        let mut condemned: Vec<BlockPos> = Vec::new();
        let mut harvests = 0u32;

        for building in self.buildings.values_mut() {
            let position = building.position();
            if substrate.is_loaded(position)
                && !substrate.structure_matches(position, building.category())
            {
                condemned.push(position);
                continue;
            }

            if let Some(BuildingEvent::Harvest) = building.world_tick() {
                harvests += 1;
            }
        }

        for position in condemned {
            log::warn!(
                "Building at {} of colony {} no longer matches its structure, destroying it",
                position,
                self.colony_id
            );
            self.remove_building(position);
        }

        for _ in 0..harvests {
            let Some(warehouse) = self
                .buildings
                .values_mut()
                .find(|b| b.category() == StructureCategory::Warehouse)
            else {
                break;
            };
            warehouse.store_harvest();
        }
    }

    // ################################################################
    // ############## LIFECYCLE #######################################
    // ################################################################

    /// Tear the colony down, severing every live citizen's back-reference
    /// first. The citizens themselves are left to their owner.
    pub fn dissolve(self) {
        for slot in self.citizens.values() {
            if let Some(citizen) = slot.resolve() {
                citizen.borrow_mut().colony_id = None;
            }
        }
    }

    pub fn load(buf: &[u8], configs: ColonyConfigs) -> anyhow::Result<Self> {
        use anyhow::Context;

        let save: ColonySave = serde_json::from_slice(buf).context("malformed colony save")?;
        Ok(Self::from_save(save, configs))
    }

    pub fn from_save(save: ColonySave, configs: ColonyConfigs) -> Self {
        let mut colony = Self::new(save.anchor, save.dimension, configs);
        colony.colony_id = save.colony_id;
        colony.name = save.name;
        colony.max_citizens = save.max_citizens;
        colony.owners = save.owners.into_iter().collect();

        for building_save in save.buildings {
            let position = building_save.position;
            let category = building_save.kind.category();
            colony
                .buildings
                .insert(position, Building::from_save(building_save));
            if category == StructureCategory::TownHall && colony.town_hall.is_none() {
                colony.town_hall = Some(position);
            }
        }

        // Soft references are never persisted. Every citizen starts pending
        // until the world materializes them again.
        for citizen_id in save.citizens {
            colony.citizens.insert(citizen_id, CitizenSlot::Pending);
        }

        for (position, target) in save.upgrades {
            if colony.buildings.contains_key(&position) {
                colony.upgrades.insert(position, target);
            } else {
                log::debug!(
                    "Dropping upgrade entry for untracked position {} of colony {}",
                    position,
                    colony.colony_id
                );
            }
        }

        colony
    }

    pub fn to_save(&self) -> ColonySave {
        ColonySave {
            colony_id: self.colony_id,
            dimension: self.dimension,
            name: self.name.clone(),
            anchor: self.anchor,
            max_citizens: self.max_citizens,
            owners: {
                let mut owners: Vec<ObserverId> = self.owners.iter().copied().collect();
                owners.sort_unstable();
                owners
            },
            buildings: self.buildings.values().map(Building::save).collect(),
            citizens: self.citizens.keys().copied().collect(),
            upgrades: {
                let mut upgrades: Vec<(BlockPos, UpgradeTarget)> =
                    self.upgrades.iter().map(|(p, t)| (*p, *t)).collect();
                upgrades.sort_unstable_by_key(|(p, _)| *p);
                upgrades
            },
        }
    }

    pub fn save(&self) -> Vec<u8> {
        serde_json::to_vec(&self.to_save()).expect("colony save should serialize")
    }
}

/// Persisted structural schema. Soft references and subscriber sets are
/// in-memory only and never written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColonySave {
    pub colony_id: ColonyId,
    pub dimension: u32,
    pub name: String,
    pub anchor: BlockPos,
    pub max_citizens: u32,
    pub owners: Vec<ObserverId>,
    /// Old saves carry this list under a misspelled key. Read both, always
    /// write the canonical one.
    #[serde(alias = "buidings")]
    pub buildings: Vec<BuildingSave>,
    pub citizens: Vec<CitizenId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub upgrades: Vec<(BlockPos, UpgradeTarget)>,
}
