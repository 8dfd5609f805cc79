use core::{
    cmp::Ordering,
    ops::{Add, AddAssign, Sub},
    time::Duration,
};

use log::trace;
use serde::{Deserialize, Serialize};

/// Per-peer counter that orders outbound sync packets.
///
/// All operations on it are wrapping.
///
/// Sync packets are sent over an unreliable channel, so the receiver uses
/// this tick to drop packets that arrived out of order.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct SyncTick(u16);

impl SyncTick {
    /// Creates a new instance wrapping the given value.
    #[inline]
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    /// Gets the value of this tick.
    #[inline]
    pub const fn get(self) -> u16 {
        self.0
    }
}

impl PartialOrd for SyncTick {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        let difference = self.0.wrapping_sub(other.0);
        if difference == 0 {
            Some(Ordering::Equal)
        } else if difference > u16::MAX / 2 {
            Some(Ordering::Less)
        } else {
            Some(Ordering::Greater)
        }
    }
}

impl Add<u16> for SyncTick {
    type Output = Self;

    fn add(self, rhs: u16) -> Self::Output {
        Self(self.0.wrapping_add(rhs))
    }
}

impl AddAssign<u16> for SyncTick {
    fn add_assign(&mut self, rhs: u16) {
        self.0 = self.0.wrapping_add(rhs)
    }
}

impl Sub for SyncTick {
    type Output = u16;

    fn sub(self, rhs: Self) -> Self::Output {
        self.0.wrapping_sub(rhs.0)
    }
}

/// Outbound and inbound cadence state for a sync component.
///
/// Implementors of [`Synchronizer`](super::scene::Synchronizer) can embed it to
/// provide [`Synchronizer::update_outbound_sync_time`](super::scene::Synchronizer::update_outbound_sync_time)
/// and [`Synchronizer::update_inbound_sync_time`](super::scene::Synchronizer::update_inbound_sync_time).
#[derive(Clone, Copy, Debug, Default)]
pub struct SyncTimer {
    /// Minimum time between two outbound updates.
    pub interval: Duration,
    last_outbound: Option<Duration>,
    last_inbound: Option<SyncTick>,
}

impl SyncTimer {
    /// Creates a timer that emits updates not more often than `interval`.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    /// Returns `true` if the component should emit its state at `now`.
    ///
    /// Calls with the same `now` as the last emission also return `true`,
    /// so every peer receives the update of the same sync pass.
    pub fn update_outbound(&mut self, now: Duration) -> bool {
        match self.last_outbound {
            Some(last) if last == now => true,
            Some(last) if now < last + self.interval => false,
            _ => {
                self.last_outbound = Some(now);
                true
            }
        }
    }

    /// Returns `true` and remembers the tick if it's newer than the last accepted one.
    pub fn update_inbound(&mut self, tick: SyncTick) -> bool {
        if let Some(last) = self.last_inbound {
            if tick <= last {
                trace!("rejecting `{tick:?}` since `{last:?}` was already accepted");
                return false;
            }
        }

        self.last_inbound = Some(tick);
        true
    }

    /// Forgets all emitted and accepted times.
    pub fn reset(&mut self) {
        self.last_outbound = None;
        self.last_inbound = None;
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn tick_comparsion() {
        assert_eq!(SyncTick::new(0), SyncTick::new(0));
        assert!(SyncTick::new(0) < SyncTick::new(1));
        assert!(SyncTick::new(0) > SyncTick::new(u16::MAX));
        assert_eq!(SyncTick::new(u16::MAX) + 1, SyncTick::new(0));
    }

    #[test]
    fn out_of_order() {
        let mut timer = SyncTimer::default();
        let accepted: Vec<_> = [5, 3, 7, 6]
            .into_iter()
            .filter(|&tick| timer.update_inbound(SyncTick::new(tick)))
            .collect();
        assert_eq!(accepted, [5, 7]);
    }

    #[test]
    fn inbound_wrapping() {
        let mut timer = SyncTimer::default();
        assert!(timer.update_inbound(SyncTick::new(u16::MAX)));
        assert!(timer.update_inbound(SyncTick::new(1)));
        assert!(!timer.update_inbound(SyncTick::new(u16::MAX - 1)));
    }

    #[test]
    fn outbound_interval() {
        let mut timer = SyncTimer::new(Duration::from_millis(100));
        assert!(timer.update_outbound(Duration::from_millis(10)));
        assert!(
            timer.update_outbound(Duration::from_millis(10)),
            "same pass should be allowed for other peers"
        );
        assert!(!timer.update_outbound(Duration::from_millis(50)));
        assert!(timer.update_outbound(Duration::from_millis(110)));

        timer.reset();
        assert!(timer.update_outbound(Duration::from_millis(111)));
    }
}
