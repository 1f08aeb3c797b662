//! Built-in movement modes.

use super::{BlockProvider, Mode, ModeOption};
use crate::domain::{Cell, ModeType};

/// Cost of digging through one solid cell.
pub const DIG_COST: f64 = 5.0;

/// Cost of opening and passing a door.
const DOOR_COST: f64 = 1.0;

const HORIZONTAL: [(i32, i32); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

const AXES: [(i32, i32, i32); 6] = [
    (1, 0, 0),
    (-1, 0, 0),
    (0, 1, 0),
    (0, -1, 0),
    (0, 0, 1),
    (0, 0, -1),
];

fn move_cost(dx: i32, dy: i32, dz: i32) -> f64 {
    f64::from(dx * dx + dy * dy + dz * dz).sqrt()
}

/// Walking on surfaces, with single-cell step ups and drops.
///
/// Diagonal moves require both adjacent orthogonal cells to be open, so
/// walkers never squeeze between two corners.
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkMode;

impl Mode for WalkMode {
    fn mode_type(&self) -> ModeType {
        ModeType::Walk
    }

    fn destinations(&self, from: Cell, blocks: &dyn BlockProvider) -> Vec<ModeOption> {
        let mut options = Vec::new();
        let headroom = blocks.is_passable(&from.offset(0, 1, 0));

        for (dx, dz) in HORIZONTAL {
            if dx != 0
                && dz != 0
                && !(blocks.is_passable(&from.offset(dx, 0, 0)) && blocks.is_passable(&from.offset(0, 0, dz)))
            {
                continue;
            }

            let level = from.offset(dx, 0, dz);
            if blocks.is_surface(&level) {
                options.push(ModeOption::new(level, move_cost(dx, 0, dz)));
                continue;
            }

            let up = from.offset(dx, 1, dz);
            if headroom && !blocks.is_passable(&level) && blocks.is_surface(&up) {
                options.push(ModeOption::new(up, move_cost(dx, 1, dz)));
                continue;
            }

            let down = from.offset(dx, -1, dz);
            if blocks.is_passable(&level) && blocks.is_surface(&down) {
                options.push(ModeOption::new(down, move_cost(dx, -1, dz)));
            }
        }
        options
    }
}

/// Free movement through open space in any of the 26 directions.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlyMode;

impl Mode for FlyMode {
    fn mode_type(&self) -> ModeType {
        ModeType::Fly
    }

    fn destinations(&self, from: Cell, blocks: &dyn BlockProvider) -> Vec<ModeOption> {
        let mut options = Vec::new();
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    if dx == 0 && dy == 0 && dz == 0 {
                        continue;
                    }
                    let next = from.offset(dx, dy, dz);
                    if !blocks.is_passable(&next) {
                        continue;
                    }
                    // every single-axis component of a diagonal must be open
                    let clear = (dx == 0 || blocks.is_passable(&from.offset(dx, 0, 0)))
                        && (dy == 0 || blocks.is_passable(&from.offset(0, dy, 0)))
                        && (dz == 0 || blocks.is_passable(&from.offset(0, 0, dz)));
                    if clear {
                        options.push(ModeOption::new(next, move_cost(dx, dy, dz)));
                    }
                }
            }
        }
        options
    }
}

/// Opening closed doors next to the traveler.
#[derive(Debug, Clone, Copy, Default)]
pub struct DoorMode;

impl Mode for DoorMode {
    fn mode_type(&self) -> ModeType {
        ModeType::Door
    }

    fn destinations(&self, from: Cell, blocks: &dyn BlockProvider) -> Vec<ModeOption> {
        HORIZONTAL[..4]
            .iter()
            .map(|&(dx, dz)| from.offset(dx, 0, dz))
            .filter(|next| blocks.is_door(next))
            .map(|next| ModeOption::new(next, DOOR_COST))
            .collect()
    }
}

/// Digging through adjacent solid cells.
#[derive(Debug, Clone, Copy, Default)]
pub struct DigMode;

impl Mode for DigMode {
    fn mode_type(&self) -> ModeType {
        ModeType::Dig
    }

    fn destinations(&self, from: Cell, blocks: &dyn BlockProvider) -> Vec<ModeOption> {
        AXES.iter()
            .map(|&(dx, dy, dz)| from.offset(dx, dy, dz))
            .filter(|next| blocks.is_diggable(next))
            .map(|next| ModeOption::new(next, DIG_COST))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CellBox, Domain};
    use crate::navigation::GridWorld;

    const D: Domain = Domain(0);

    fn region() -> CellBox {
        CellBox::new(Cell::new(-5, -1, -5, D), Cell::new(5, 5, 5, D)).unwrap()
    }

    fn flat() -> GridWorld {
        GridWorld::builder().bounds(region()).floor(region(), -1).build()
    }

    fn cells(options: &[ModeOption]) -> Vec<Cell> {
        options.iter().map(|o| o.cell).collect()
    }

    #[test]
    fn walk_on_flat_ground() {
        let options = WalkMode.destinations(Cell::new(0, 0, 0, D), &flat());
        assert_eq!(options.len(), 8);

        let east = options.iter().find(|o| o.cell == Cell::new(1, 0, 0, D)).unwrap();
        assert_eq!(east.cost, 1.0);
        let diagonal = options.iter().find(|o| o.cell == Cell::new(1, 0, 1, D)).unwrap();
        assert!((diagonal.cost - 2f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn walk_steps_up_onto_block() {
        let world = GridWorld::builder()
            .bounds(region())
            .floor(region(), -1)
            .solid(Cell::new(1, 0, 0, D))
            .build();
        let options = WalkMode.destinations(Cell::new(0, 0, 0, D), &world);
        assert!(cells(&options).contains(&Cell::new(1, 1, 0, D)));
        assert!(!cells(&options).contains(&Cell::new(1, 0, 0, D)));
    }

    #[test]
    fn walk_drops_down_one() {
        let world = GridWorld::builder()
            .bounds(region())
            .floor(region(), -1)
            .solid(Cell::new(0, 0, 0, D))
            .build();
        let options = WalkMode.destinations(Cell::new(0, 1, 0, D), &world);
        assert!(cells(&options).contains(&Cell::new(1, 0, 0, D)));
    }

    #[test]
    fn walk_does_not_cut_corners() {
        let world = GridWorld::builder()
            .bounds(region())
            .floor(region(), -1)
            .solid(Cell::new(1, 0, 0, D))
            .solid(Cell::new(1, 1, 0, D))
            .build();
        let options = WalkMode.destinations(Cell::new(0, 0, 0, D), &world);
        assert!(!cells(&options).contains(&Cell::new(1, 0, 1, D)));
        assert!(!cells(&options).contains(&Cell::new(1, 0, -1, D)));
        assert!(cells(&options).contains(&Cell::new(0, 0, 1, D)));
    }

    #[test]
    fn walk_needs_ground() {
        let world = GridWorld::builder().bounds(region()).build();
        assert!(WalkMode.destinations(Cell::new(0, 2, 0, D), &world).is_empty());
    }

    #[test]
    fn fly_moves_in_open_air() {
        let world = GridWorld::builder().bounds(region()).build();
        let options = FlyMode.destinations(Cell::new(0, 2, 0, D), &world);
        assert_eq!(options.len(), 26);
        assert!(options.iter().all(|o| o.cost >= 1.0));
    }

    #[test]
    fn door_opens_adjacent_door() {
        let door = Cell::new(1, 0, 0, D);
        let world = GridWorld::builder().bounds(region()).floor(region(), -1).door(door).build();

        assert_eq!(cells(&DoorMode.destinations(Cell::new(0, 0, 0, D), &world)), vec![door]);
        assert!(!cells(&WalkMode.destinations(Cell::new(0, 0, 0, D), &world)).contains(&door));
        // once inside the doorway, walking continues
        assert!(cells(&WalkMode.destinations(door, &world)).contains(&Cell::new(2, 0, 0, D)));
    }

    #[test]
    fn dig_through_rock() {
        let world = GridWorld::builder()
            .bounds(region())
            .floor(region(), -1)
            .solid(Cell::new(1, 0, 0, D))
            .unbreakable(Cell::new(-1, 0, 0, D))
            .build();
        let options = DigMode.destinations(Cell::new(0, 0, 0, D), &world);
        let dug = cells(&options);
        assert!(dug.contains(&Cell::new(1, 0, 0, D)));
        assert!(dug.contains(&Cell::new(0, -1, 0, D)));
        assert!(!dug.contains(&Cell::new(-1, 0, 0, D)));
        assert!(options.iter().all(|o| o.cost == DIG_COST));
    }
}
