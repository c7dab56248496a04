use super::*;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// A live citizen. Owned by the world substrate, never by the colony.
#[derive(Debug)]
pub struct Citizen {
    pub citizen_id: CitizenId,
    pub position: BlockPos,
    /// Back-reference severed when the colony is dissolved.
    pub colony_id: Option<ColonyId>,
}
impl Citizen {
    pub fn new(citizen_id: CitizenId, position: BlockPos, colony_id: ColonyId) -> Self {
        Self {
            citizen_id,
            position,
            colony_id: Some(colony_id),
        }
    }
}

/// Non-owning handle to an externally owned citizen.
///
/// The owner may drop the citizen at any time without telling anyone;
/// `resolve` then starts returning None and the liveness sweep will
/// eventually notice.
#[derive(Debug, Clone)]
pub struct CitizenHandle {
    weak: Weak<RefCell<Citizen>>,
}
impl CitizenHandle {
    pub fn new(citizen: &Rc<RefCell<Citizen>>) -> Self {
        Self {
            weak: Rc::downgrade(citizen),
        }
    }

    pub fn resolve(&self) -> Option<Rc<RefCell<Citizen>>> {
        self.weak.upgrade()
    }
}

/// One roster entry.
///
/// `Pending` is a citizen known only by id (loaded from a save, live object
/// not yet materialized). It is distinct from a `Linked` handle that no
/// longer resolves, which means the citizen was seen alive and is now gone.
#[derive(Debug, Clone)]
pub enum CitizenSlot {
    Pending,
    Linked(CitizenHandle),
}
impl CitizenSlot {
    pub fn resolve(&self) -> Option<Rc<RefCell<Citizen>>> {
        match self {
            CitizenSlot::Pending => None,
            CitizenSlot::Linked(handle) => handle.resolve(),
        }
    }
}

#[test]
fn test_handle_resolves_to_absent_after_owner_drop() {
    let citizen = Rc::new(RefCell::new(Citizen::new(
        CitizenId(1),
        BlockPos::default(),
        ColonyId(1),
    )));
    let handle = CitizenHandle::new(&citizen);

    assert!(handle.resolve().is_some());
    drop(citizen);
    assert!(handle.resolve().is_none());
}
