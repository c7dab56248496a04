use super::*;

/// A connected actor eligible to receive colony updates.
#[derive(Debug, Clone, Copy)]
pub struct Observer {
    pub id: ObserverId,
    pub position: BlockPos,
}
impl Observer {
    pub fn new(id: ObserverId, position: BlockPos) -> Self {
        Self { id, position }
    }
}

/// Recompute which connected observers are subscribed to a colony.
///
/// Owners are always subscribed. Everyone else joins within the margin past
/// the working radius and, once subscribed, is retained out to double the
/// working radius. The gap between the two radii keeps an observer
/// loitering at the boundary from subscribing and unsubscribing every tick.
pub fn compute_subscribers(
    anchor: BlockPos,
    owners: &AHashSet<ObserverId>,
    observers: &[Observer],
    previous: &AHashSet<ObserverId>,
    configs: &InterestConfigs,
) -> AHashSet<ObserverId> {
    let mut subscribers = AHashSet::new();

    for observer in observers {
        if owners.contains(&observer.id) {
            subscribers.insert(observer.id);
            continue;
        }

        let distance_squared = anchor.planar_distance_squared(observer.position);
        let in_range = if previous.contains(&observer.id) {
            distance_squared <= configs.retain_radius_squared()
        } else {
            distance_squared <= configs.join_radius_squared()
        };

        if in_range {
            subscribers.insert(observer.id);
        }
    }

    subscribers
}

/// Did this pass gain at least one subscriber that was not there before?
pub fn has_new_subscribers(
    subscribers: &AHashSet<ObserverId>,
    previous: &AHashSet<ObserverId>,
) -> bool {
    subscribers.iter().any(|id| !previous.contains(id))
}

// ####################################################################################
// ############## TEST ################################################################
// ####################################################################################

#[cfg(test)]
fn compute(
    observer_x: i32,
    owner: bool,
    previously_subscribed: bool,
) -> AHashSet<ObserverId> {
    let id = ObserverId(1);
    let anchor = BlockPos::default();
    let mut owners = AHashSet::new();
    if owner {
        owners.insert(id);
    }
    let mut previous = AHashSet::new();
    if previously_subscribed {
        previous.insert(id);
    }
    let observers = [Observer::new(id, BlockPos::new(observer_x, 0, 0))];

    compute_subscribers(
        anchor,
        &owners,
        &observers,
        &previous,
        &InterestConfigs::default(),
    )
}

#[test]
fn test_join_boundary() {
    let configs = InterestConfigs::default();
    let join = configs.working_radius + configs.subscribe_margin;

    assert!(!compute(join, false, false).is_empty());
    assert!(compute(join + 1, false, false).is_empty());
}

#[test]
fn test_retention_boundary() {
    let configs = InterestConfigs::default();
    let retain = configs.working_radius * 2;

    // Past the join radius but still retained.
    assert!(!compute(retain, false, true).is_empty());
    assert!(compute(retain + 1, false, true).is_empty());
}

#[test]
fn test_owners_ignore_distance() {
    assert!(!compute(1_000_000, true, false).is_empty());
}

#[test]
fn test_new_subscriber_detection() {
    let mut previous = AHashSet::new();
    let mut subscribers = AHashSet::new();
    subscribers.insert(ObserverId(1));

    assert!(has_new_subscribers(&subscribers, &previous));
    previous.insert(ObserverId(1));
    assert!(!has_new_subscribers(&subscribers, &previous));
    // Losing one is not gaining one.
    subscribers.clear();
    assert!(!has_new_subscribers(&subscribers, &previous));
}
