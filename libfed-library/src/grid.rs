//! Grid-neighbor arithmetic for the library overlay. Grounded on
//! `server.c`'s `check_and_set_neighbors`, but derived purely from `l_id` and
//! the grid side rather than stored per-process state: no `CONNECT` message
//! is needed to wire up the library grid, unlike the borrower tree.
use libfed_election::Neighbors4;
use libfed_proto::LibraryId;

/// Builds the up/down/left/right neighbor set of `l_id` on a `grid_side` x
/// `grid_side` square grid.
pub fn grid_neighbors(l_id: LibraryId, grid_side: u32) -> Neighbors4 {
    let id = l_id.get();
    let row = id / grid_side;
    let col = id % grid_side;

    let up = (row > 0).then(|| LibraryId::new(id - grid_side).rank());
    let down = (row + 1 < grid_side).then(|| LibraryId::new(id + grid_side).rank());
    let left = (col > 0).then(|| LibraryId::new(id - 1).rank());
    let right = (col + 1 < grid_side).then(|| LibraryId::new(id + 1).rank());

    Neighbors4::new(up, down, left, right)
}
