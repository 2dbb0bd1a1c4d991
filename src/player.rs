use crate::vec2::Vec2;
use crate::world::TileGrid;

const PLAYER_SPEED: f32 = 4.0; // world units per second
const TURN_SPEED: f32 = 4.0; // rad/s
const MOUSE_SENSITIVITY: f32 = 0.002;

/// One frame of raw input, already reduced to camera-local axes by the
/// frontend. `turn` is the keyboard turn axis, `look` the relative mouse
/// motion in pixels.
#[derive(Debug, Clone, Copy, Default)]
pub struct MoveIntent {
    pub forward: f32,
    pub strafe: f32,
    pub turn: f32,
    pub look: f32,
}

/// Movement and collision only; nothing fancy. The camera copies its pose
/// from here once per frame.
pub struct Player {
    pub position: Vec2,
    pub velocity: Vec2,
    pub size: Vec2, // AABB extent pair
    pub direction: Vec2,
    pub angle: f32,
}

impl Player {
    pub fn new() -> Self {
        Self {
            position: Vec2::new(3.0, 3.0),
            velocity: Vec2::ZERO,
            size: Vec2::new(0.5, 0.5),
            direction: Vec2::new(1.0, 0.0),
            angle: 0.0,
        }
    }

    pub fn update(&mut self, intent: &MoveIntent, walls: &TileGrid, dt: f32) {
        self.angle += intent.look * MOUSE_SENSITIVITY * dt + intent.turn * TURN_SPEED * dt;
        self.direction = Vec2::new(self.angle.cos(), self.angle.sin());

        let wish = Vec2::new(intent.forward, intent.strafe);
        self.velocity = if wish.length_sqr() > 0.8 {
            wish.normalized().rotate(self.direction) * PLAYER_SPEED
        } else {
            Vec2::ZERO
        };

        self.apply_movement(walls, dt);
    }

    /// Move one axis at a time and back out of any overlap, so a blocked
    /// axis still lets the other slide along the wall.
    fn apply_movement(&mut self, walls: &TileGrid, dt: f32) {
        let delta = self.velocity * dt;

        self.position.x += delta.x;
        if self.collides(walls) {
            self.position.x -= delta.x;
        }

        self.position.y += delta.y;
        if self.collides(walls) {
            self.position.y -= delta.y;
        }
    }

    /// AABB overlap against every wall cell the box can touch.
    fn collides(&self, walls: &TileGrid) -> bool {
        let span_x = self.size.x.ceil() as i32 + 1;
        let span_y = self.size.y.ceil() as i32 + 1;

        for i in 0..span_x {
            for j in 0..span_y {
                let cell_x = self.position.x.floor() + i as f32;
                let cell_y = self.position.y.floor() + j as f32;

                if walls.get(cell_x as i32, cell_y as i32) == 0 {
                    continue;
                }

                if self.position.x + self.size.x < cell_x {
                    continue;
                }
                if self.position.y + self.size.y < cell_y {
                    continue;
                }
                if self.position.x > cell_x + 1.0 {
                    continue;
                }
                if self.position.y > cell_y + 1.0 {
                    continue;
                }

                return true;
            }
        }

        false
    }

    /// Camera anchor: the center of the collision box.
    pub fn center(&self) -> Vec2 {
        self.position + self.size / 2.0
    }
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}
