use super::*;

pub trait Packet: Sized {
    fn serialize(self) -> Vec<u8>;
    fn parse(buf: &[u8]) -> anyhow::Result<Self>;
}

pub fn bin_encode<T: Serialize>(value: &T) -> Vec<u8> {
    postcard::to_stdvec(value).expect("packet should serialize")
}

pub fn bin_decode<'a, T: Deserialize<'a>>(buf: &'a [u8]) -> anyhow::Result<T> {
    Ok(postcard::from_bytes(buf)?)
}

/// Content of the messages sent to subscribed observers.
///
/// All payloads are snapshots of their scope, so applying the same message
/// twice leaves the receiver's state unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColonyOutbound {
    /// Aggregate snapshot. `new_subscriber` tells the receiver to treat it
    /// as a full sync instead of an incremental refresh. Same payload
    /// either way.
    ColonyView {
        colony_id: ColonyId,
        view: ColonyViewData,
        new_subscriber: bool,
    },
    /// Full citizen roster.
    ColonyCitizens {
        colony_id: ColonyId,
        roster: Vec<CitizenViewData>,
    },
    /// One building's view.
    BuildingView {
        colony_id: ColonyId,
        position: BlockPos,
        view: BuildingViewData,
    },
    /// In-world notification text, addressed to owners.
    Notification {
        colony_id: ColonyId,
        notification: Notification,
    },
}
impl Packet for ColonyOutbound {
    fn serialize(self) -> Vec<u8> {
        bin_encode(&self)
    }

    fn parse(buf: &[u8]) -> anyhow::Result<Self> {
        bin_decode(buf)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notification {
    PopulationCapacityReached,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColonyViewData {
    pub name: String,
    pub dimension: u32,
    pub anchor: BlockPos,
    pub max_citizens: u32,
    pub owners: Vec<ObserverId>,
    pub town_hall: Option<BlockPos>,
    /// Buildings removed since the last pass. Receivers drop their local
    /// views for these positions.
    pub removed_buildings: Vec<BlockPos>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitizenViewData {
    pub citizen_id: CitizenId,
    /// None while the live object has not been seen by this server yet.
    pub position: Option<BlockPos>,
}

/// Where outbound messages go. The transport behind it is not this crate's
/// concern; tests collect into a Vec.
pub trait MessageSink {
    fn send(&mut self, to: ObserverId, message: ColonyOutbound);
}
impl MessageSink for Vec<(ObserverId, ColonyOutbound)> {
    fn send(&mut self, to: ObserverId, message: ColonyOutbound) {
        self.push((to, message));
    }
}

impl Colony {
    /// Send each scope to the observers that need it:
    /// - to subscribers, when the scope changed,
    /// - to new subscribers, even when it did not.
    ///
    /// Payloads are captured before any dirty flag is cleared. Flags and the
    /// removed-building list clear only at the end, once every scope has
    /// been handed out.
    pub(crate) fn replication_pass(&mut self, sink: &mut dyn MessageSink) {
        let gained_new = has_new_subscribers(&self.subscribers, &self.previous_subscribers);

        // Colony view.
        if self.dirty || gained_new {
            let view = self.view_data();
            for &observer_id in self.subscribers.iter() {
                let new_subscriber = !self.previous_subscribers.contains(&observer_id);
                if self.dirty || new_subscriber {
                    sink.send(
                        observer_id,
                        ColonyOutbound::ColonyView {
                            colony_id: self.colony_id,
                            view: view.clone(),
                            new_subscriber,
                        },
                    );
                }
            }
        }

        // Citizens.
        if self.citizens_dirty || gained_new {
            let roster = self.citizen_roster();
            for &observer_id in self.subscribers.iter() {
                if self.citizens_dirty || !self.previous_subscribers.contains(&observer_id) {
                    sink.send(
                        observer_id,
                        ColonyOutbound::ColonyCitizens {
                            colony_id: self.colony_id,
                            roster: roster.clone(),
                        },
                    );
                }
            }
        }

        // Buildings.
        for building in self.buildings.values() {
            if !building.is_dirty() && !gained_new {
                continue;
            }

            let view = building.view();
            for &observer_id in self.subscribers.iter() {
                if building.is_dirty() || !self.previous_subscribers.contains(&observer_id) {
                    sink.send(
                        observer_id,
                        ColonyOutbound::BuildingView {
                            colony_id: self.colony_id,
                            position: building.position(),
                            view: view.clone(),
                        },
                    );
                }
            }
        }

        // Removed positions were visible for exactly this pass, whether or
        // not anyone was subscribed to hear about them.
        self.removed_buildings.clear();

        self.dirty = false;
        self.citizens_dirty = false;
        for building in self.buildings.values_mut() {
            building.clear_dirty();
        }
    }

    pub(crate) fn view_data(&self) -> ColonyViewData {
        let mut owners: Vec<ObserverId> = self.owners.iter().copied().collect();
        owners.sort_unstable();

        ColonyViewData {
            name: self.name.clone(),
            dimension: self.dimension,
            anchor: self.anchor(),
            max_citizens: self.max_citizens,
            owners,
            town_hall: self.town_hall,
            removed_buildings: self.removed_buildings.to_vec(),
        }
    }

    pub(crate) fn citizen_roster(&self) -> Vec<CitizenViewData> {
        self.citizens
            .iter()
            .map(|(citizen_id, slot)| CitizenViewData {
                citizen_id: *citizen_id,
                position: slot.resolve().map(|citizen| citizen.borrow().position),
            })
            .collect()
    }
}

// ####################################################################################
// ############## TEST ################################################################
// ####################################################################################

#[test]
fn test_outbound_round_trip() {
    let message = ColonyOutbound::BuildingView {
        colony_id: ColonyId(7),
        position: BlockPos::new(1, 2, 3),
        view: BuildingViewData {
            level: 2,
            kind: BuildingKind::Warehouse { stock: 9 },
        },
    };

    let parsed = ColonyOutbound::parse(&message.clone().serialize()).unwrap();
    assert_eq!(parsed, message);
}

#[test]
fn test_outbound_json_stability() {
    // Pattern check: renaming a payload field stays readable with an alias,
    // new fields default.
    #[derive(Serialize, Deserialize)]
    enum Old {
        View { name: String },
    }

    #[derive(Serialize, Deserialize)]
    enum New {
        View {
            #[serde(alias = "name")]
            display_name: String,
            #[serde(default)]
            dimension: u32,
        },
    }

    serde_json::from_slice::<New>(
        &serde_json::to_vec(&Old::View {
            name: "name".to_string(),
        })
        .unwrap(),
    )
    .unwrap();
}
