use colony_server::*;
use std::cell::RefCell;
use std::rc::Rc;

const SETTLEMENT_TICK_MS: u64 = 50;
/// World ticks happen once per this many settlement ticks.
const WORLD_TICK_STRIDE: u64 = 20;

/// Everything-loaded in-memory world for the demo loop.
struct DemoWorld {
    structures: AHashMap<BlockPos, StructureCategory>,
    citizens: Vec<Rc<RefCell<Citizen>>>,
}
impl DemoWorld {
    fn place(&mut self, colony: &mut Colony, position: BlockPos, category: StructureCategory) {
        self.structures.insert(position, category);
        colony.place_building(position, category);
    }
}
impl Substrate for DemoWorld {
    fn is_loaded(&self, _position: BlockPos) -> bool {
        true
    }

    fn structure_matches(&self, position: BlockPos, category: StructureCategory) -> bool {
        self.structures.get(&position) == Some(&category)
    }

    fn find_spawn_point(&self, near: BlockPos) -> Option<BlockPos> {
        Some(BlockPos::new(near.x + 1, near.y, near.z + 1))
    }

    fn materialize_citizen(&mut self, citizen: Citizen) -> Rc<RefCell<Citizen>> {
        log::info!("Citizen {} materialized at {}", citizen.citizen_id, citizen.position);
        let citizen = Rc::new(RefCell::new(citizen));
        self.citizens.push(citizen.clone());
        citizen
    }
}

struct LogSink;
impl MessageSink for LogSink {
    fn send(&mut self, to: ObserverId, message: ColonyOutbound) {
        log::info!("-> observer {}: {:?}", to, message);
    }
}

fn main() {
    logger::Logger::init();

    let anchor = BlockPos::new(0, 64, 0);
    let mut world = DemoWorld {
        structures: Default::default(),
        citizens: Vec::new(),
    };
    let mut sink = LogSink;

    let mut configs = ColonyConfigs::default();
    configs.spawn_configs.base_interval = 10;
    configs.spawn_configs.min_interval = 5;

    let mut colony = Colony::new(anchor, 0, configs);
    colony.set_name("Demo settlement".to_string());
    let owner = ObserverId::random();
    colony.add_owner(owner);

    world.place(&mut colony, anchor, StructureCategory::TownHall);
    world.place(&mut colony, BlockPos::new(8, 64, 0), StructureCategory::Home);
    world.place(&mut colony, BlockPos::new(0, 64, 8), StructureCategory::Farm);
    world.place(&mut colony, BlockPos::new(8, 64, 8), StructureCategory::Warehouse);

    log::info!("Colony {} running", colony.colony_id());

    // A visitor walking straight through the settlement.
    let mut visitor_x = -200i32;

    let mut interval = interval::Interval::new(SETTLEMENT_TICK_MS, SETTLEMENT_TICK_MS * 20);
    let mut tick = 0u64;
    loop {
        interval.step();
        tick += 1;
        visitor_x = (visitor_x + 1).min(400);

        let observers = [
            Observer::new(owner, BlockPos::new(2, 64, 2)),
            Observer::new(ObserverId(1), BlockPos::new(visitor_x, 64, 0)),
        ];

        colony.settlement_tick(&observers, &mut sink);
        if tick % WORLD_TICK_STRIDE == 0 {
            colony.world_tick(&mut world, &observers, &mut sink);
        }
    }
}
