use std::collections::BTreeMap;

use super::physics::EntityId;

/// Handle to a registered periodic timer. Ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Which phase callback a timer drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseKind {
    Lift,
    Reach,
}

/// A timer that came due this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueTimer {
    pub id: TimerId,
    pub owner: EntityId,
    pub phase: PhaseKind,
}

#[derive(Debug, Clone)]
struct PeriodicTimer {
    owner: EntityId,
    phase: PhaseKind,
    interval: f64,
    next_fire: f64,
}

/// Single-threaded registry of looping phase timers.
///
/// A timer first fires one interval after it was registered and then every
/// interval, at most once per `collect_due` call. Timers are reported in
/// registration order.
#[derive(Debug, Default)]
pub struct PhaseScheduler {
    next_id: u64,
    timers: BTreeMap<TimerId, PeriodicTimer>,
}

const FIRE_EPSILON: f64 = 1e-9;

impl PhaseScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a looping timer for `owner`
    pub fn set_timer(&mut self, owner: EntityId, phase: PhaseKind, interval: f64, now: f64) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.timers.insert(
            id,
            PeriodicTimer {
                owner,
                phase,
                interval,
                next_fire: now + interval,
            },
        );
        id
    }

    /// Cancels a timer. Cancelling an unknown or already cancelled timer is a no-op.
    pub fn clear_timer(&mut self, id: TimerId) -> bool {
        self.timers.remove(&id).is_some()
    }

    /// Cancels every timer owned by `owner` (despawn)
    pub fn clear_owner(&mut self, owner: EntityId) {
        self.timers.retain(|_, timer| timer.owner != owner);
    }

    pub fn is_active(&self, id: TimerId) -> bool {
        self.timers.contains_key(&id)
    }

    pub fn active_count(&self) -> usize {
        self.timers.len()
    }

    /// Number of live timers of `phase` owned by `owner`
    pub fn count_for(&self, owner: EntityId, phase: PhaseKind) -> usize {
        self.timers
            .values()
            .filter(|t| t.owner == owner && t.phase == phase)
            .count()
    }

    /// Returns the timers due at `now` and schedules their next firing.
    /// A timer that fell behind fires once and resumes one interval from `now`.
    pub fn collect_due(&mut self, now: f64) -> Vec<DueTimer> {
        let mut due = Vec::new();
        for (&id, timer) in self.timers.iter_mut() {
            if now + FIRE_EPSILON < timer.next_fire {
                continue;
            }
            timer.next_fire += timer.interval;
            if timer.next_fire <= now {
                timer.next_fire = now + timer.interval;
            }
            due.push(DueTimer {
                id,
                owner: timer.owner,
                phase: timer.phase,
            });
        }
        due
    }
}
