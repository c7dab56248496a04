use colony_server::*;
use std::cell::RefCell;
use std::rc::Rc;

const ANCHOR: BlockPos = BlockPos::new(0, 64, 0);

struct TestWorld {
    all_loaded: bool,
    has_spawn_point: bool,
    structures: AHashMap<BlockPos, StructureCategory>,
    citizens: Vec<Rc<RefCell<Citizen>>>,
}
impl TestWorld {
    fn new() -> Self {
        Self {
            all_loaded: true,
            has_spawn_point: true,
            structures: Default::default(),
            citizens: Vec::new(),
        }
    }

    fn place(&mut self, colony: &mut Colony, position: BlockPos, category: StructureCategory) {
        self.structures.insert(position, category);
        assert!(colony.place_building(position, category));
    }
}
impl Substrate for TestWorld {
    fn is_loaded(&self, _position: BlockPos) -> bool {
        self.all_loaded
    }

    fn structure_matches(&self, position: BlockPos, category: StructureCategory) -> bool {
        self.structures.get(&position) == Some(&category)
    }

    fn find_spawn_point(&self, near: BlockPos) -> Option<BlockPos> {
        self.has_spawn_point
            .then(|| BlockPos::new(near.x + 1, near.y, near.z))
    }

    fn materialize_citizen(&mut self, citizen: Citizen) -> Rc<RefCell<Citizen>> {
        let citizen = Rc::new(RefCell::new(citizen));
        self.citizens.push(citizen.clone());
        citizen
    }
}

/// Spawning enabled every world tick, capacity 2.
fn test_configs() -> ColonyConfigs {
    let mut configs = ColonyConfigs::default();
    configs.spawn_configs.base_interval = 0;
    configs.spawn_configs.min_interval = 0;
    configs.spawn_configs.default_max_citizens = 2;
    configs
}

fn new_colony(world: &mut TestWorld) -> Colony {
    let mut colony = Colony::new(ANCHOR, 0, test_configs());
    colony.set_name("Test colony".to_string());
    world.place(&mut colony, ANCHOR, StructureCategory::TownHall);
    colony
}

type Sink = Vec<(ObserverId, ColonyOutbound)>;

fn count_views(sink: &Sink) -> (usize, usize, usize) {
    let mut colony_views = 0;
    let mut citizen_lists = 0;
    let mut building_views = 0;
    for (_, message) in sink {
        match message {
            ColonyOutbound::ColonyView { .. } => colony_views += 1,
            ColonyOutbound::ColonyCitizens { .. } => citizen_lists += 1,
            ColonyOutbound::BuildingView { .. } => building_views += 1,
            ColonyOutbound::Notification { .. } => {}
        }
    }
    (colony_views, citizen_lists, building_views)
}

#[test]
fn test_new_subscriber_full_sync() {
    let mut world = TestWorld::new();
    let mut colony = new_colony(&mut world);
    world.place(&mut colony, BlockPos::new(8, 64, 0), StructureCategory::Home);
    world.place(&mut colony, BlockPos::new(0, 64, 8), StructureCategory::Farm);

    // Flush creation dirt with nobody listening.
    let mut sink: Sink = Vec::new();
    colony.settlement_tick(&[], &mut sink);
    assert!(sink.is_empty());

    // A clean colony still fully syncs a fresh subscriber.
    let observer = Observer::new(ObserverId(1), BlockPos::new(5, 64, 5));
    colony.settlement_tick(&[observer], &mut sink);

    assert_eq!(count_views(&sink), (1, 1, 3));
    assert!(sink.iter().all(|(to, _)| *to == observer.id));
    match &sink[0].1 {
        ColonyOutbound::ColonyView {
            view,
            new_subscriber,
            ..
        } => {
            assert!(new_subscriber);
            assert_eq!(view.name, "Test colony");
            assert_eq!(view.town_hall, Some(ANCHOR));
        }
        other => panic!("expected colony view first, got {:?}", other),
    }

    // Nothing changed and nobody joined: silence.
    sink.clear();
    colony.settlement_tick(&[observer], &mut sink);
    assert!(sink.is_empty());
}

#[test]
fn test_dirty_then_clear() {
    let mut world = TestWorld::new();
    let mut colony = new_colony(&mut world);
    let observer = Observer::new(ObserverId(1), BlockPos::new(5, 64, 5));

    let mut sink: Sink = Vec::new();
    colony.settlement_tick(&[observer], &mut sink);
    sink.clear();

    colony.set_name("Renamed".to_string());
    colony.settlement_tick(&[observer], &mut sink);
    let (colony_views, citizen_lists, building_views) = count_views(&sink);
    assert_eq!(colony_views, 1);
    // Only the aggregate scope was dirty.
    assert_eq!(citizen_lists, 0);
    assert_eq!(building_views, 0);
    match &sink[0].1 {
        ColonyOutbound::ColonyView { new_subscriber, .. } => assert!(!new_subscriber),
        other => panic!("expected colony view, got {:?}", other),
    }

    sink.clear();
    colony.settlement_tick(&[observer], &mut sink);
    assert!(sink.is_empty());
}

#[test]
fn test_subscription_hysteresis_over_ticks() {
    let mut world = TestWorld::new();
    let mut colony = new_colony(&mut world);
    let mut sink: Sink = Vec::new();
    let id = ObserverId(1);

    // Just outside the join radius: not subscribed.
    colony.settlement_tick(&[Observer::new(id, BlockPos::new(81, 64, 0))], &mut sink);
    assert!(!colony.subscribers().contains(&id));

    // At the join radius: subscribed.
    colony.settlement_tick(&[Observer::new(id, BlockPos::new(80, 64, 0))], &mut sink);
    assert!(colony.subscribers().contains(&id));

    // Wandering out to the retention radius: still subscribed.
    colony.settlement_tick(&[Observer::new(id, BlockPos::new(128, 64, 0))], &mut sink);
    assert!(colony.subscribers().contains(&id));

    // One block past it: dropped.
    colony.settlement_tick(&[Observer::new(id, BlockPos::new(129, 64, 0))], &mut sink);
    assert!(!colony.subscribers().contains(&id));

    // And returning at retention range is not enough to rejoin.
    colony.settlement_tick(&[Observer::new(id, BlockPos::new(128, 64, 0))], &mut sink);
    assert!(!colony.subscribers().contains(&id));
}

#[test]
fn test_removed_building_visible_for_one_pass() {
    let mut world = TestWorld::new();
    let mut colony = new_colony(&mut world);
    let farm = BlockPos::new(0, 64, 8);
    world.place(&mut colony, farm, StructureCategory::Farm);

    let observer = Observer::new(ObserverId(1), BlockPos::new(5, 64, 5));
    let mut sink: Sink = Vec::new();
    colony.settlement_tick(&[observer], &mut sink);
    sink.clear();

    assert!(colony.remove_building(farm));
    colony.settlement_tick(&[observer], &mut sink);
    match &sink[0].1 {
        ColonyOutbound::ColonyView { view, .. } => {
            assert_eq!(view.removed_buildings, vec![farm]);
        }
        other => panic!("expected colony view, got {:?}", other),
    }

    sink.clear();
    colony.set_name("Again".to_string());
    colony.settlement_tick(&[observer], &mut sink);
    match &sink[0].1 {
        ColonyOutbound::ColonyView { view, .. } => assert!(view.removed_buildings.is_empty()),
        other => panic!("expected colony view, got {:?}", other),
    }
}

#[test]
fn test_removed_building_list_clears_without_subscribers() {
    let mut world = TestWorld::new();
    let mut colony = new_colony(&mut world);
    let farm = BlockPos::new(0, 64, 8);
    world.place(&mut colony, farm, StructureCategory::Farm);

    let mut sink: Sink = Vec::new();
    colony.settlement_tick(&[], &mut sink);

    colony.remove_building(farm);
    assert_eq!(colony.removed_buildings(), &[farm]);
    colony.settlement_tick(&[], &mut sink);
    assert!(sink.is_empty());
    assert!(colony.removed_buildings().is_empty());
}

#[test]
fn test_capacity_boundary_and_notification() {
    let mut world = TestWorld::new();
    let mut colony = new_colony(&mut world);
    let owner = ObserverId(9);
    colony.add_owner(owner);

    let observers = [Observer::new(owner, BlockPos::new(2, 64, 2))];
    let mut sink: Sink = Vec::new();

    // Capacity is 2: one citizen per world tick until full.
    colony.world_tick(&mut world, &observers, &mut sink);
    assert_eq!(colony.citizens().len(), 1);
    assert!(sink.is_empty());

    colony.world_tick(&mut world, &observers, &mut sink);
    assert_eq!(colony.citizens().len(), 2);
    assert_eq!(
        sink,
        vec![(
            owner,
            ColonyOutbound::Notification {
                colony_id: colony.colony_id(),
                notification: Notification::PopulationCapacityReached,
            }
        )]
    );

    // At capacity the spawn step silently does not fire.
    sink.clear();
    colony.world_tick(&mut world, &observers, &mut sink);
    assert_eq!(colony.citizens().len(), 2);
    assert!(sink.is_empty());
}

#[test]
fn test_liveness_sweep_idempotent() {
    let mut world = TestWorld::new();
    let mut colony = new_colony(&mut world);
    let observers = [Observer::new(ObserverId(1), BlockPos::new(2, 64, 2))];
    let mut sink: Sink = Vec::new();

    colony.world_tick(&mut world, &observers, &mut sink);
    colony.world_tick(&mut world, &observers, &mut sink);
    assert_eq!(colony.citizens().len(), 2);
    // Keep the spawn step from refilling evicted slots below.
    world.has_spawn_point = false;

    // One citizen's owner drops it without any removal signal.
    let gone = world.citizens.remove(0);
    let gone_id = gone.borrow().citizen_id;
    drop(gone);

    colony.world_tick(&mut world, &observers, &mut sink);
    assert!(!colony.is_citizen(gone_id));
    assert_eq!(colony.citizens().len(), 1);

    // Re-running with no substrate changes evicts nothing further.
    let survivors = colony.citizens().keys().copied().collect::<Vec<_>>();
    colony.world_tick(&mut world, &observers, &mut sink);
    assert_eq!(colony.citizens().len(), 1);
    for citizen_id in survivors {
        assert!(colony.is_citizen(citizen_id));
    }
}

#[test]
fn test_sweep_gated_by_load_state_and_proximity() {
    let mut world = TestWorld::new();
    let mut colony = new_colony(&mut world);
    let near = [Observer::new(ObserverId(1), BlockPos::new(2, 64, 2))];
    let mut sink: Sink = Vec::new();

    colony.world_tick(&mut world, &near, &mut sink);
    assert_eq!(colony.citizens().len(), 1);
    world.citizens.clear();

    // Chunks missing: partially loaded surroundings must not cause
    // false evictions.
    world.all_loaded = false;
    world.has_spawn_point = false;
    colony.world_tick(&mut world, &near, &mut sink);
    assert_eq!(colony.citizens().len(), 1);

    // Loaded again, but nobody close enough to vouch for the area.
    world.all_loaded = true;
    let far = [Observer::new(ObserverId(1), BlockPos::new(40, 64, 0))];
    colony.world_tick(&mut world, &far, &mut sink);
    assert_eq!(colony.citizens().len(), 1);

    // Both gates open: the orphaned record goes.
    colony.world_tick(&mut world, &near, &mut sink);
    assert!(colony.citizens().is_empty());
}

#[test]
fn test_building_sanity_eviction() {
    let mut world = TestWorld::new();
    let mut colony = new_colony(&mut world);
    let farm = BlockPos::new(0, 64, 8);
    world.place(&mut colony, farm, StructureCategory::Farm);
    assert!(colony.request_upgrade(farm, 1));

    // The block under the farm changes into something else.
    world.structures.insert(farm, StructureCategory::Home);

    let mut sink: Sink = Vec::new();
    colony.world_tick(&mut world, &[], &mut sink);

    assert!(colony.building(farm).is_none());
    assert_eq!(colony.removed_buildings(), &[farm]);
    // Its pending upgrade went with it.
    assert!(colony.upgrades().is_empty());
}

#[test]
fn test_register_unknown_citizen_fails_without_mutation() {
    let mut world = TestWorld::new();
    let mut colony = new_colony(&mut world);

    let stranger = Rc::new(RefCell::new(Citizen::new(
        CitizenId(404),
        ANCHOR,
        colony.colony_id(),
    )));
    assert!(!colony.register_citizen(&stranger));
    assert!(colony.citizens().is_empty());

    let mut sink: Sink = Vec::new();
    let observer = Observer::new(ObserverId(1), BlockPos::new(5, 64, 5));
    colony.settlement_tick(&[observer], &mut sink);
    sink.clear();
    // No citizen scope change leaked out of the failed registration.
    colony.settlement_tick(&[observer], &mut sink);
    assert!(sink.is_empty());
}

#[test]
fn test_save_round_trip() {
    let mut world = TestWorld::new();
    let mut colony = new_colony(&mut world);
    colony.add_owner(ObserverId(7));
    world.place(&mut colony, BlockPos::new(8, 64, 0), StructureCategory::Home);
    world.place(&mut colony, BlockPos::new(0, 64, 8), StructureCategory::Farm);
    colony.request_upgrade(BlockPos::new(8, 64, 0), 2);

    let observers = [Observer::new(ObserverId(7), BlockPos::new(2, 64, 2))];
    let mut sink: Sink = Vec::new();
    colony.world_tick(&mut world, &observers, &mut sink);
    assert!(!colony.citizens().is_empty());

    let buf = colony.save();
    let loaded = Colony::load(&buf, test_configs()).unwrap();

    assert_eq!(loaded.to_save(), colony.to_save());
    assert_eq!(loaded.colony_id(), colony.colony_id());
    assert_eq!(loaded.anchor(), colony.anchor());
    assert_eq!(loaded.town_hall().map(|b| b.position()), Some(ANCHOR));
    // Handles are never persisted: everyone is pending until re-registered.
    assert!(loaded.citizens().values().all(|slot| slot.resolve().is_none()));

    // Re-link one citizen with the still-live object.
    let citizen = world.citizens[0].clone();
    let mut loaded = loaded;
    assert!(colony.is_citizen(citizen.borrow().citizen_id));
    assert!(loaded.register_citizen(&citizen));
    assert!(loaded.citizen(citizen.borrow().citizen_id).is_some());
}

#[test]
fn test_legacy_building_key_fallback() {
    let mut world = TestWorld::new();
    let mut colony = new_colony(&mut world);
    world.place(&mut colony, BlockPos::new(8, 64, 0), StructureCategory::Home);

    let canonical = String::from_utf8(colony.save()).unwrap();
    // Canonical writes never use the misspelled key.
    assert!(canonical.contains("\"buildings\""));
    assert!(!canonical.contains("\"buidings\""));

    let legacy = canonical.replace("\"buildings\"", "\"buidings\"");
    let loaded = Colony::load(legacy.as_bytes(), test_configs()).unwrap();

    assert_eq!(loaded.to_save(), colony.to_save());
}

#[test]
fn test_malformed_save_is_an_error() {
    // A save missing a required field aborts reconstruction of that colony.
    assert!(Colony::load(b"{\"name\":\"broken\"}", ColonyConfigs::default()).is_err());
    assert!(Colony::load(b"not json at all", ColonyConfigs::default()).is_err());
}

#[test]
fn test_town_hall_never_replaced() {
    let mut world = TestWorld::new();
    let mut colony = new_colony(&mut world);
    let second = BlockPos::new(16, 64, 16);
    world.place(&mut colony, second, StructureCategory::TownHall);

    assert_eq!(colony.town_hall().map(|b| b.position()), Some(ANCHOR));

    // Same position can not be claimed twice either.
    assert!(!colony.place_building(ANCHOR, StructureCategory::Home));
}

#[test]
fn test_dissolve_severs_back_references() {
    let mut world = TestWorld::new();
    let mut colony = new_colony(&mut world);
    let observers = [Observer::new(ObserverId(1), BlockPos::new(2, 64, 2))];
    let mut sink: Sink = Vec::new();
    colony.world_tick(&mut world, &observers, &mut sink);
    assert_eq!(colony.citizens().len(), 1);

    colony.dissolve();
    assert!(world
        .citizens
        .iter()
        .all(|citizen| citizen.borrow().colony_id.is_none()));
}
