use crate::color::ColorMapper;
use crate::config::EngineConfig;
use crate::types::*;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::f32::consts::PI;

const AMBIENT_SIZE: std::ops::Range<f32> = 0.3..0.8;
const AMBIENT_SPEED: std::ops::Range<f32> = 1.0..3.0;
const STAR_POINTS: usize = 5;
const STAR_INNER_RATIO: f32 = 0.45;
const STAR_ALPHA: f32 = 0.9;
const CIRCLE_ALPHA: f32 = 0.8;

/// Counts from one [`NotePopulation::cull`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CullReport {
    /// Notes that reached the keyboard surface
    pub landed: usize,
    /// Oldest notes dropped to respect the cap
    pub evicted: usize,
}

/// Owns every live [`VisualNote`].
///
/// Notes are kept in spawn order, so the front of the deque is always the
/// oldest note and cap eviction is a `pop_front`. Spawning never refuses a
/// note; the cap is enforced by [`cull`](Self::cull).
///
/// The population also carries the spawn-side bookkeeping that has to
/// survive between ticks: the ambient RNG and the last beat that produced
/// a note. Everything here is mutated from the tick handler only.
pub struct NotePopulation {
    notes: VecDeque<VisualNote>,
    cap: usize,
    ambient_every: u64,
    seed: u64,
    rng: StdRng,
    last_beat: Option<usize>,
    total_spawned: u64,
}

impl NotePopulation {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            notes: VecDeque::with_capacity(config.note_cap + 16),
            cap: config.note_cap,
            ambient_every: config.ambient_every_n_ticks,
            seed: config.seed,
            rng: StdRng::seed_from_u64(config.seed),
            last_beat: None,
            total_spawned: 0,
        }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Live notes, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &VisualNote> + '_ {
        self.notes.iter()
    }

    pub fn total_spawned(&self) -> u64 {
        self.total_spawned
    }

    pub fn spawn(&mut self, note: VisualNote) {
        self.notes.push_back(note);
        self.total_spawned += 1;
    }

    /// Index of the beat that most recently produced a note.
    pub fn last_beat(&self) -> Option<usize> {
        self.last_beat
    }

    /// Spawn a note for beat `beat_index` unless that beat already has one.
    pub fn spawn_for_beat(&mut self, beat_index: usize, note: VisualNote) -> bool {
        if self.last_beat == Some(beat_index) {
            return false;
        }
        self.last_beat = Some(beat_index);
        self.spawn(note);
        true
    }

    /// On every Nth tick, spawn an ambient note at a random key with random
    /// size and fall speed. Returns whether a note was spawned.
    pub fn spawn_ambient(
        &mut self,
        tick: u64,
        current_time: f64,
        colors: &ColorMapper<'_>,
        scheme: ColorScheme,
    ) -> bool {
        if self.ambient_every == 0 || tick % self.ambient_every != 0 {
            return false;
        }
        let key = self.rng.random_range(0..KEY_COUNT);
        let size = self.rng.random_range(AMBIENT_SIZE);
        let fall_speed = self.rng.random_range(AMBIENT_SPEED);
        self.spawn(VisualNote {
            x: key as f32,
            y: SPAWN_Y,
            color: colors.map_color(key, current_time, scheme),
            size,
            fall_speed,
            kind: NoteKind::Ambient,
            time: current_time,
        });
        true
    }

    /// Move every note down by its fall speed.
    pub fn advance(&mut self) {
        for note in self.notes.iter_mut() {
            note.y -= note.fall_speed;
        }
    }

    /// Drop notes that reached the keyboard, then evict the oldest notes
    /// until the population fits the cap.
    pub fn cull(&mut self) -> CullReport {
        let before = self.notes.len();
        self.notes.retain(|n| !n.reached_keyboard());
        let landed = before - self.notes.len();

        let evicted = self.notes.len().saturating_sub(self.cap);
        self.notes.drain(..evicted);

        if evicted > 0 {
            debug!("Population over cap: evicted {} oldest notes", evicted);
        }
        CullReport { landed, evicted }
    }

    /// One shape per live note: stars for beat notes, circles for ambient
    /// notes. Recomputed on every call.
    pub fn draw_list(&self) -> impl Iterator<Item = Shape> + '_ {
        self.notes.iter().map(note_shape)
    }

    /// Forget all notes and beat bookkeeping (mode switch).
    pub fn clear(&mut self) {
        self.notes.clear();
        self.last_beat = None;
    }

    /// Back to the freshly constructed state, RNG included (playback stop).
    pub fn reset(&mut self) {
        self.clear();
        self.rng = StdRng::seed_from_u64(self.seed);
        self.total_spawned = 0;
    }
}

pub fn note_shape(note: &VisualNote) -> Shape {
    let center = Point::new(note.x, note.y);
    match note.kind {
        NoteKind::Beat => Shape::Star {
            center,
            vertices: star_vertices(center, note.size, STAR_POINTS),
            color: note.color,
            alpha: STAR_ALPHA,
        },
        NoteKind::Ambient => Shape::Circle {
            center,
            radius: note.size,
            color: note.color,
            alpha: CIRCLE_ALPHA,
        },
    }
}

/// Vertices of a `points`-pointed star, alternating outer radius `radius`
/// and inner radius, first point straight up.
pub fn star_vertices(center: Point, radius: f32, points: usize) -> Vec<Point> {
    let n = points * 2;
    (0..n)
        .map(|i| {
            let r = if i % 2 == 0 { radius } else { radius * STAR_INNER_RATIO };
            let angle = PI / 2.0 + i as f32 * PI / points as f32;
            Point::new(center.x + r * angle.cos(), center.y + r * angle.sin())
        })
        .collect()
}
