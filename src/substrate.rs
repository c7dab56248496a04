use super::*;
use std::cell::RefCell;
use std::rc::Rc;

/// The colony's window onto the world it sits in.
///
/// Everything behind this trait is externally owned and externally mutated.
/// The colony only reads load state and block categories, and hands over
/// freshly created citizens for the world to own.
pub trait Substrate {
    /// Is the supporting data for this position currently loaded?
    fn is_loaded(&self, position: BlockPos) -> bool;

    /// Does the block at this position still match the given category?
    fn structure_matches(&self, position: BlockPos, category: StructureCategory) -> bool;

    /// An open location near `near` suitable for a citizen to stand on.
    fn find_spawn_point(&self, near: BlockPos) -> Option<BlockPos>;

    /// Take ownership of a newly materialized citizen and return the strong
    /// reference. The colony keeps only a weak handle to it.
    fn materialize_citizen(&mut self, citizen: Citizen) -> Rc<RefCell<Citizen>>;
}
