pub const WORLD_SIZE: i32 = 10;

/// Square grid of small integers. 0 is empty/walkable; a value v >= 1 names
/// the 1-based texture atlas index v. Shares the surface indexing contract:
/// out-of-bounds reads return 0, out-of-bounds writes are dropped.
#[derive(Clone)]
pub struct TileGrid {
    width: i32,
    height: i32,
    cells: Vec<u8>,
}

impl TileGrid {
    pub fn new(width: i32, height: i32) -> Self {
        assert!(width > 0 && height > 0, "grid must have positive size");
        Self {
            width,
            height,
            cells: vec![0; (width * height) as usize],
        }
    }

    #[inline]
    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    #[inline]
    pub fn get(&self, x: i32, y: i32) -> u8 {
        if !self.in_bounds(x, y) {
            return 0;
        }
        self.cells[(x + y * self.width) as usize]
    }

    #[inline]
    pub fn set(&mut self, x: i32, y: i32, value: u8) {
        if !self.in_bounds(x, y) {
            return;
        }
        self.cells[(x + y * self.width) as usize] = value;
    }

    pub fn clear(&mut self, value: u8) {
        self.cells.fill(value);
    }
}

/// The three map layers. The wall layer doubles as the collision map.
/// Populated once at construction; read-only during rendering.
#[derive(Clone)]
pub struct World {
    pub walls: TileGrid,
    pub floor: TileGrid,
    pub ceiling: TileGrid,
}

impl World {
    /// Hardcoded 10x10 arena: a solid perimeter ring, two interior wall
    /// segments, a pillar, and a diagonal floor region with its own texture.
    pub fn new() -> Self {
        let mut walls = TileGrid::new(WORLD_SIZE, WORLD_SIZE);
        let mut floor = TileGrid::new(WORLD_SIZE, WORLD_SIZE);
        let mut ceiling = TileGrid::new(WORLD_SIZE, WORLD_SIZE);

        floor.clear(1);
        ceiling.clear(1);

        for i in 0..WORLD_SIZE {
            for j in 0..WORLD_SIZE {
                if i + j < 8 {
                    floor.set(i, j, 3);
                }
            }
        }

        for i in 0..WORLD_SIZE {
            walls.set(i, 0, 2);
            walls.set(0, i, 2);
            walls.set(i, WORLD_SIZE - 1, 2);
            walls.set(WORLD_SIZE - 1, i, 2);
        }

        walls.set(1, 1, 2);

        walls.set(5, 5, 2);
        walls.set(5, 6, 2);

        Self {
            walls,
            floor,
            ceiling,
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_reads_outside_bounds_are_empty() {
        let mut grid = TileGrid::new(4, 4);
        grid.clear(7);
        assert_eq!(grid.get(-1, 2), 0);
        assert_eq!(grid.get(2, 4), 0);
        assert_eq!(grid.get(2, 2), 7);
    }

    #[test]
    fn grid_writes_outside_bounds_are_dropped() {
        let mut grid = TileGrid::new(2, 2);
        grid.set(5, 5, 9);
        assert_eq!(grid.get(5, 5), 0);
        grid.set(1, 0, 9);
        assert_eq!(grid.get(1, 0), 9);
    }

    #[test]
    fn arena_has_a_solid_perimeter() {
        let world = World::new();
        for i in 0..WORLD_SIZE {
            assert_eq!(world.walls.get(i, 0), 2);
            assert_eq!(world.walls.get(0, i), 2);
            assert_eq!(world.walls.get(i, WORLD_SIZE - 1), 2);
            assert_eq!(world.walls.get(WORLD_SIZE - 1, i), 2);
        }
    }

    #[test]
    fn arena_interior_layout() {
        let world = World::new();
        assert_eq!(world.walls.get(5, 5), 2);
        assert_eq!(world.walls.get(5, 6), 2);
        assert_eq!(world.walls.get(1, 1), 2);
        assert_eq!(world.walls.get(4, 4), 0);

        // diagonal floor region, plain floor elsewhere, uniform ceiling
        assert_eq!(world.floor.get(2, 2), 3);
        assert_eq!(world.floor.get(8, 8), 1);
        assert_eq!(world.ceiling.get(4, 7), 1);
    }
}
