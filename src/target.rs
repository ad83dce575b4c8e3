use std::time::{Duration, Instant};

use rand::Rng;

use crate::tracking::Joints;

/// The fruit sprites the board cycles through. The engine never interprets
/// these; they ride along in the descriptor for the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum FruitKind {
    Apple,
    Cherry,
    Orange,
    Tomato,
    Watermelon,
}

impl FruitKind {
    pub const ALL: [FruitKind; 5] = [
        FruitKind::Apple,
        FruitKind::Cherry,
        FruitKind::Orange,
        FruitKind::Tomato,
        FruitKind::Watermelon,
    ];
}

/// Visual description of the current target: where it is and what it looks
/// like. Opaque to the session engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetDescriptor {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub kind: FruitKind,
}

impl TargetDescriptor {
    /// Axis-aligned box test between this target and a joint coordinate.
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }
}

/// Supplies a fresh target on every spawn. Implemented by the board below
/// in production and by fixed stubs in tests.
pub trait TargetProvider {
    fn next_target(&mut self) -> TargetDescriptor;
}

/// The current target plus its timing. `spawn_time` resets on every hit or
/// expiry; `pause_debt` carries the duration of the last pause so a paused
/// target does not expire the instant play resumes.
#[derive(Debug, Clone, Copy)]
pub struct TargetLifecycle {
    descriptor: TargetDescriptor,
    spawn_time: Instant,
    time_budget: Duration,
    pause_debt: Duration,
}

impl TargetLifecycle {
    pub fn spawn(provider: &mut dyn TargetProvider, now: Instant, time_budget: Duration) -> Self {
        Self {
            descriptor: provider.next_target(),
            spawn_time: now,
            time_budget,
            pause_debt: Duration::ZERO,
        }
    }

    pub fn descriptor(&self) -> TargetDescriptor {
        self.descriptor
    }

    pub fn time_budget(&self) -> Duration {
        self.time_budget
    }

    /// How long this target has been live, excluding the carried pause
    /// debt. Never negative.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.spawn_time)
            .saturating_sub(self.pause_debt)
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.age(now) >= self.time_budget
    }

    /// Fraction of the budget consumed, clamped to [0, 1]. Drives the
    /// countdown indicator.
    pub fn progress(&self, now: Instant) -> f64 {
        if self.time_budget.is_zero() {
            return 1.0;
        }
        (self.age(now).as_secs_f64() / self.time_budget.as_secs_f64()).min(1.0)
    }

    /// Replaces the target and restarts its clock. Calling twice in the
    /// same tick is a no-op; the second call returns the state of the
    /// first.
    pub fn respawn(&mut self, provider: &mut dyn TargetProvider, now: Instant) {
        if self.spawn_time == now && self.pause_debt.is_zero() {
            return;
        }
        self.descriptor = provider.next_target();
        self.spawn_time = now;
        self.pause_debt = Duration::ZERO;
    }

    /// Credits a closed pause window against this target's age, so time
    /// spent paused does not count toward expiry.
    pub fn credit_pause(&mut self, duration: Duration) {
        self.pause_debt += duration;
    }
}

/// The playfield. Spawns targets at uniformly random in-bounds positions,
/// never re-using the previous screen quadrant (the player has to move) nor
/// the previous fruit image. A strip at the bottom is reserved for the
/// status bar.
#[derive(Debug, Clone)]
pub struct Board {
    pub width: f32,
    pub height: f32,
    pub reserved_bottom: f32,
    pub fruit_width: f32,
    pub fruit_height: f32,
    last_quadrant: Option<u8>,
    last_kind: Option<FruitKind>,
}

impl Board {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            reserved_bottom: 76.0,
            fruit_width: 80.0,
            fruit_height: 80.0,
            last_quadrant: None,
            last_kind: None,
        }
    }

    /// Which quarter of the screen a point falls in (1..=4).
    fn quadrant(&self, x: f32, y: f32) -> u8 {
        match (x >= self.width / 2.0, y >= self.height / 2.0) {
            (true, true) => 3,
            (true, false) => 2,
            (false, true) => 4,
            (false, false) => 1,
        }
    }

    /// True if any resolvable hand touches the target.
    pub fn hand_hits(&self, joints: &Joints, target: &TargetDescriptor) -> bool {
        joints.hands().any(|hand| target.contains(hand.x, hand.y))
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new(640.0, 480.0)
    }
}

impl TargetProvider for Board {
    fn next_target(&mut self) -> TargetDescriptor {
        let mut rng = rand::thread_rng();

        let max_x = (self.width - self.fruit_width).max(0.0);
        let max_y = (self.height - self.fruit_height - self.reserved_bottom).max(0.0);

        let mut x = rng.gen_range(0.0..=max_x);
        let mut y = rng.gen_range(0.0..=max_y);
        // Re-roll until the quadrant changes; bounded in case the board is
        // too small to have more than one quadrant.
        for _ in 0..64 {
            if Some(self.quadrant(x, y)) != self.last_quadrant {
                break;
            }
            x = rng.gen_range(0.0..=max_x);
            y = rng.gen_range(0.0..=max_y);
        }
        self.last_quadrant = Some(self.quadrant(x, y));

        let kind = loop {
            let kind = FruitKind::ALL[rng.gen_range(0..FruitKind::ALL.len())];
            if Some(kind) != self.last_kind {
                break kind;
            }
        };
        self.last_kind = Some(kind);

        TargetDescriptor {
            x,
            y,
            width: self.fruit_width,
            height: self.fruit_height,
            kind,
        }
    }
}
