use rayon::iter::{IndexedParallelIterator, ParallelIterator};
use rayon::slice::ParallelSliceMut;
use thiserror::Error;

use crate::camera::Camera;
use crate::surface::PixelSurface;
use crate::vec2::Vec2;
use crate::world::{TileGrid, World};

/// Eye height relative to the floor/ceiling planes, in world units.
const FLOOR_HEIGHT: f32 = -0.5;

/// Start-coordinate nudge for negative-direction grid stepping, so a
/// crossing sitting exactly on an integer line truncates into the cell on
/// the negative side. A float-grid-alignment heuristic, not a robust fix.
const GRID_EPSILON: f32 = 0.01;

/// "No finite crossing" sentinel, far outside any map.
const DISTANT: Vec2 = Vec2::new(10000.0, 10000.0);

const BACKGROUND: u32 = 0x000000;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to build the render worker pool")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

/// Nearest wall crossing for one column. Transient, consumed within that
/// column's processing.
pub struct WallHit {
    pub position: Vec2,
    /// true when the crossing lies on a vertical grid line (integer x)
    pub x_intersection: bool,
    pub texture_index: i32,
}

/// The ray-casting engine. Owns the camera, the map layers, the texture
/// atlas and the output surface; one `process_screen` call renders a frame.
pub struct RayCaster {
    pub camera: Camera,
    world: World,
    textures: PixelSurface,
    screen: PixelSurface,
    // Column-major staging buffer: each column task owns a contiguous
    // &mut slice during the parallel pass, transposed into `screen` after
    // the join.
    columns: Vec<u32>,
    pool: rayon::ThreadPool,
    width: i32,
    height: i32,
}

impl RayCaster {
    /// `workers` selects the render pool size; `None` leaves it to rayon.
    /// One worker gives a sequential pass with bit-identical output.
    pub fn new(
        world: World,
        textures: PixelSurface,
        width: i32,
        height: i32,
        workers: Option<usize>,
    ) -> Result<Self, RenderError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.unwrap_or(0))
            .build()?;

        Ok(Self {
            camera: Camera::new(Vec2::ZERO, 0.0),
            world,
            textures,
            screen: PixelSurface::new(width, height),
            columns: vec![0; (width * height) as usize],
            pool,
            width,
            height,
        })
    }

    pub fn screen(&self) -> &PixelSurface {
        &self.screen
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Render one frame. Columns are fully independent: no shared mutable
    /// state beyond the read-only camera/map/atlas data, so the pass is a
    /// fork-join parallel loop with nothing to synchronize but the join.
    pub fn process_screen(&mut self) {
        self.camera.refresh_direction();

        let height = self.height as usize;
        let mut columns = std::mem::take(&mut self.columns);
        self.pool.install(|| {
            columns
                .par_chunks_mut(height)
                .enumerate()
                .for_each(|(x, column)| self.render_column(x as i32, column));
        });

        let width = self.width as usize;
        let pool = &self.pool;
        let screen = &mut self.screen;
        pool.install(|| {
            screen
                .pixels_mut()
                .par_chunks_mut(width)
                .enumerate()
                .for_each(|(y, row)| {
                    for (x, out) in row.iter_mut().enumerate() {
                        *out = columns[x * height + y];
                    }
                });
        });

        self.columns = columns;
    }

    fn render_column(&self, x: i32, column: &mut [u32]) {
        column.fill(BACKGROUND);

        let hit = self.find_closest_wall(x);

        let mut height = 0;
        if hit.position != DISTANT {
            // Euclidean distance to the hit would bow the walls (fisheye);
            // project onto the camera's forward direction instead.
            let distance = (hit.position - self.camera.position).dot(self.camera.direction);
            height = self.slice_height(distance);
        }

        let half = self.height / 2;
        self.draw_wall(column, half - height / 2, half + height / 2, &hit);
        self.draw_plane(column, x, half + height / 2, self.height, &self.world.floor);
        self.draw_plane(column, x, 0, half - height / 2, &self.world.ceiling);
    }

    /// Wall slice pixel height, inversely proportional to the perspective
    /// distance. Screen width over two keeps the texture aspect right at
    /// the default FOV.
    fn slice_height(&self, distance: f32) -> i32 {
        if distance <= 0.0 {
            return 0;
        }
        (self.width as f32 / distance / 2.0) as i32
    }

    fn find_closest_wall(&self, column: i32) -> WallHit {
        let direction = self.camera.column_ray(column, self.width);

        let hit_x = self.find_closest_wall_x(direction);
        let hit_y = self.find_closest_wall_y(direction);

        let distance_sqr_x = (hit_x - self.camera.position).length_sqr();
        let distance_sqr_y = (hit_y - self.camera.position).length_sqr();

        // exact ties fall through to the horizontal-crossing candidate
        let (position, x_intersection) = if distance_sqr_x < distance_sqr_y {
            (hit_x, true)
        } else {
            (hit_y, false)
        };

        let texture_index = self.world.walls.get(position.x as i32, position.y as i32) as i32 - 1;

        WallHit {
            position,
            x_intersection,
            texture_index,
        }
    }

    /// Nearest crossing with a vertical grid line (integer x). A ray with
    /// no x component never crosses one and reports the distant sentinel.
    fn find_closest_wall_x(&self, direction: Vec2) -> Vec2 {
        if direction.x == 0.0 {
            return DISTANT;
        }

        let mut start = self.camera.position;

        // The camera sits mid-cell, so the first boundary crossing has its
        // own partial step; after that the delta is fixed per cell.
        let first_x = if direction.x > 0.0 {
            (start.x + 1.0).floor() - start.x
        } else {
            start.x.floor() - start.x
        };
        start += Vec2::new(first_x, direction.y / direction.x * first_x);

        self.march(start, direction / direction.x.abs())
    }

    /// Nearest crossing with a horizontal grid line (integer y).
    fn find_closest_wall_y(&self, direction: Vec2) -> Vec2 {
        if direction.y == 0.0 {
            return DISTANT;
        }

        let mut start = self.camera.position;

        let first_y = if direction.y > 0.0 {
            (start.y + 1.0).floor() - start.y
        } else {
            start.y.floor() - start.y
        };
        start += Vec2::new(direction.x / direction.y * first_y, first_y);

        self.march(start, direction / direction.y.abs())
    }

    /// Walk a fixed per-cell delta from a grid-line crossing until the wall
    /// layer has a non-zero cell or the ray leaves the map.
    fn march(&self, mut position: Vec2, delta: Vec2) -> Vec2 {
        if delta.x < 0.0 {
            position.x -= GRID_EPSILON;
        }
        if delta.y < 0.0 {
            position.y -= GRID_EPSILON;
        }

        loop {
            let (cell_x, cell_y) = (position.x as i32, position.y as i32);

            if !self.world.walls.in_bounds(cell_x, cell_y) {
                return DISTANT;
            }

            if self.world.walls.get(cell_x, cell_y) != 0 {
                return position;
            }

            position += delta;
        }
    }

    fn draw_wall(&self, column: &mut [u32], start_y: i32, end_y: i32, hit: &WallHit) {
        if end_y <= start_y {
            return;
        }

        let atlas_width = self.textures.width();

        // The intersection axis alone decides the sampling axis: a crossing
        // on a vertical grid line varies along y, and vice versa.
        let mut y_image = if hit.x_intersection {
            ((hit.position.y - hit.position.y.floor()) * atlas_width as f32) as i32
        } else {
            ((hit.position.x - hit.position.x.floor()) * atlas_width as f32) as i32
        };
        y_image += hit.texture_index * atlas_width;

        let span = end_y - start_y;
        for i in start_y.max(0)..end_y.min(self.height) {
            // The texel row interpolates along the atlas's fast horizontal
            // axis; assets are pre-rotated -90 degrees to compensate.
            let x_image = atlas_width * (i - start_y) / span;
            column[i as usize] = self.textures.get_pixel(x_image, y_image);
        }
    }

    fn draw_plane(&self, column: &mut [u32], x: i32, start_y: i32, end_y: i32, map: &TileGrid) {
        let atlas_width = self.textures.width();

        // Every pixel back-projects to its own world coordinate; there is
        // no locality to exploit here.
        for i in start_y.max(0)..end_y.min(self.height) {
            let plane = self.floor_coordinates(x, i);
            let texture_index = map.get(plane.x as i32, plane.y as i32) as i32 - 1;

            let x_image = ((plane.x - plane.x.floor()) * atlas_width as f32) as i32;
            let y_image =
                ((plane.y - plane.y.floor() + texture_index as f32) * atlas_width as f32) as i32;

            column[i as usize] = self.textures.get_pixel(x_image, y_image);
        }
    }

    /// Back-project a screen pixel to the world point where the floor or
    /// ceiling plane shows through it. With x_norm = x/z and y_norm = y/z,
    /// a known plane height fixes z = height / y_norm, then x = z * x_norm.
    fn floor_coordinates(&self, x_screen: i32, y_screen: i32) -> Vec2 {
        let x_norm = (x_screen - self.width / 2) as f32 / self.width as f32 * 2.0;
        let y_norm = (y_screen - self.height / 2) as f32 / self.width as f32 * 2.0;

        let mut depth = FLOOR_HEIGHT / y_norm;

        // One formula serves both half-screens: below the horizon the
        // normalized coordinate flips sign, so the depth flips with it.
        if y_norm > 0.0 {
            depth = -depth;
        }

        Vec2::new(depth, x_norm * depth).rotate(self.camera.direction) + self.camera.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn checker_atlas(width: i32, count: i32) -> PixelSurface {
        let mut atlas = PixelSurface::new(width, width * count);
        for t in 0..count {
            for y in 0..width {
                for x in 0..width {
                    let shade = (t + 1) as u32 * 0x202020 + ((x ^ y) as u32 & 1) * 0x0f0f0f;
                    atlas.set_pixel(x, t * width + y, shade);
                }
            }
        }
        atlas
    }

    fn arena_caster(width: i32, height: i32) -> RayCaster {
        RayCaster::new(World::new(), checker_atlas(8, 3), width, height, Some(1)).unwrap()
    }

    #[test]
    fn vertical_search_reports_no_crossing_for_axis_aligned_rays() {
        let caster = arena_caster(64, 48);
        assert_eq!(caster.find_closest_wall_x(Vec2::new(0.0, 1.0)), DISTANT);
        assert_eq!(caster.find_closest_wall_x(Vec2::new(0.0, -1.0)), DISTANT);
        assert_eq!(caster.find_closest_wall_y(Vec2::new(1.0, 0.0)), DISTANT);
    }

    #[test]
    fn straight_ray_into_the_interior_wall() {
        let mut caster = arena_caster(64, 48);
        // facing +y from (5, 3): the central ray runs straight at the
        // interior wall segment
        caster.camera.position = Vec2::new(5.0, 3.0);
        caster.camera.direction = Vec2::new(0.0, 1.0);

        let hit = caster.find_closest_wall(32);
        assert_eq!(hit.position, Vec2::new(5.0, 5.0));
        assert_eq!(hit.texture_index, 1);
        assert!(!hit.x_intersection);
    }

    #[test]
    fn boundary_hits_attribute_to_the_stepping_side() {
        let mut walls = TileGrid::new(10, 10);
        walls.set(6, 3, 1);
        walls.set(4, 3, 1);
        let world = World {
            walls,
            floor: TileGrid::new(10, 10),
            ceiling: TileGrid::new(10, 10),
        };
        let mut caster = RayCaster::new(world, checker_atlas(8, 1), 64, 48, Some(1)).unwrap();
        caster.camera.position = Vec2::new(5.0, 3.0);

        // due +x: the crossing at x = 6.0 belongs to cell (6, 3)
        caster.camera.direction = Vec2::new(1.0, 0.0);
        let hit = caster.find_closest_wall(32);
        assert!(hit.x_intersection);
        assert_eq!(hit.position, Vec2::new(6.0, 3.0));
        assert_eq!(hit.texture_index, 0);

        // due -x: the nudge lands the x = 5.0 crossing in cell (4, 3)
        caster.camera.direction = Vec2::new(-1.0, 0.0);
        let hit = caster.find_closest_wall(32);
        assert!(hit.x_intersection);
        assert_eq!(hit.position.x as i32, 4);
        assert_eq!(hit.position.y as i32, 3);
        assert_eq!(hit.texture_index, 0);
    }

    #[test]
    fn every_ray_hits_inside_the_walled_arena() {
        let mut caster = arena_caster(64, 48);
        for &angle in &[0.0, 0.7, 2.1, -1.3, 3.9] {
            caster.camera.set(Vec2::new(4.3, 3.6), angle);
            for column in 0..64 {
                let hit = caster.find_closest_wall(column);
                assert_ne!(hit.position, DISTANT, "column {column} angle {angle}");
                assert!(hit.texture_index >= 0);
            }
        }
    }

    #[test]
    fn slice_height_never_increases_with_distance() {
        let caster = arena_caster(640, 480);
        let mut previous = i32::MAX;
        for step in 1..100 {
            let height = caster.slice_height(step as f32 * 0.1);
            assert!(height <= previous);
            previous = height;
        }
        assert_eq!(caster.slice_height(0.0), 0);
        assert_eq!(caster.slice_height(-1.0), 0);
    }

    #[test]
    fn floor_coordinates_round_trip_through_forward_projection() {
        let mut caster = arena_caster(640, 480);
        caster.camera.set(Vec2::new(4.2, 3.7), 0.6);
        let basis = caster.camera.direction;

        for &(x, y) in &[(100, 300), (320, 400), (500, 250), (40, 460), (320, 100), (77, 30)] {
            let world = caster.floor_coordinates(x, y);

            // forward pinhole projection: undo the translation and the
            // rotation, then divide by depth
            let local = (world - caster.camera.position).rotate(Vec2::new(basis.x, -basis.y));
            let x_norm = local.y / local.x;
            let y_norm = if y >= 240 {
                -FLOOR_HEIGHT / local.x
            } else {
                FLOOR_HEIGHT / local.x
            };

            let x_back = x_norm * 320.0 + 320.0;
            let y_back = y_norm * 320.0 + 240.0;
            assert!((x_back - x as f32).abs() <= 1.0, "pixel ({x}, {y})");
            assert!((y_back - y as f32).abs() <= 1.0, "pixel ({x}, {y})");
        }
    }

    #[test]
    fn process_screen_is_idempotent() {
        let mut caster = arena_caster(64, 48);
        caster.camera.set(Vec2::new(4.5, 3.5), 0.4);

        caster.process_screen();
        let first = caster.screen().pixels().to_vec();
        caster.process_screen();
        assert_eq!(first, caster.screen().pixels());
    }

    #[test]
    fn worker_count_does_not_change_the_frame() {
        let atlas = checker_atlas(8, 3);
        let mut single = RayCaster::new(World::new(), atlas.clone(), 64, 48, Some(1)).unwrap();
        let mut pooled = RayCaster::new(World::new(), atlas, 64, 48, Some(4)).unwrap();

        single.camera.set(Vec2::new(2.5, 7.5), -0.9);
        pooled.camera.set(Vec2::new(2.5, 7.5), -0.9);
        single.process_screen();
        pooled.process_screen();

        assert_eq!(single.screen().pixels(), pooled.screen().pixels());
    }

    #[test]
    fn open_world_still_renders_floor_and_ceiling() {
        let mut floor = TileGrid::new(10, 10);
        let mut ceiling = TileGrid::new(10, 10);
        floor.clear(1);
        ceiling.clear(1);
        let world = World {
            walls: TileGrid::new(10, 10),
            floor,
            ceiling,
        };
        let mut caster = RayCaster::new(world, checker_atlas(8, 1), 64, 48, Some(1)).unwrap();
        caster.camera.set(Vec2::new(5.0, 5.0), 0.3);

        let hit = caster.find_closest_wall(32);
        assert_eq!(hit.position, DISTANT);

        // no wall slice, but both planes still cover their half-screens
        caster.process_screen();
        let screen = caster.screen();
        assert_ne!(screen.get_pixel(32, 5), 0);
        assert_ne!(screen.get_pixel(32, 42), 0);
    }

    #[test]
    fn perpendicular_facings_agree_on_wall_distance() {
        // the same wall ring seen along +x and +y should project the same
        // central-column distance from a symmetric spot
        let mut caster = arena_caster(64, 48);

        caster.camera.set(Vec2::new(4.5, 4.5), 0.0);
        let along_x = caster.find_closest_wall(32);

        caster.camera.set(Vec2::new(4.5, 4.5), FRAC_PI_2);
        caster.camera.direction = Vec2::new(0.0, 1.0);
        let along_y = caster.find_closest_wall(32);

        let dx = (along_x.position - caster.camera.position).length();
        let dy = (along_y.position - caster.camera.position).length();
        assert!((dx - dy).abs() < 1e-4);
    }
}
