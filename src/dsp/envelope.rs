//! Breakpoint automation for gain and pitch envelopes.
//!
//! Mirrors the Web Audio `AudioParam` scheduling model: a value can be set at
//! a time, ramped linearly or exponentially toward a value ending at a time,
//! and all future events can be cancelled while holding the value the curve
//! had at the cancel time. Times are in seconds on the owner's clock.

use crate::math::finite_or;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Ramp {
    Set,
    Linear,
    Exponential,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Breakpoint {
    time: f64,
    value: f64,
    ramp: Ramp,
}

/// A piecewise automation curve.
#[derive(Debug, Clone)]
pub struct Automation {
    /// Value before the first event (and after pruning).
    base: f64,
    base_time: f64,
    events: Vec<Breakpoint>,
}

impl Automation {
    pub fn new(value: f64) -> Self {
        Automation {
            base: finite_or(value, 0.0),
            base_time: 0.0,
            events: Vec::new(),
        }
    }

    fn insert(&mut self, bp: Breakpoint) {
        // Events stay sorted by time; equal times keep insertion order.
        let idx = self.events.partition_point(|e| e.time <= bp.time);
        self.events.insert(idx, bp);
    }

    pub fn set_value_at(&mut self, value: f64, time: f64) {
        self.insert(Breakpoint {
            time,
            value: finite_or(value, 0.0),
            ramp: Ramp::Set,
        });
    }

    pub fn linear_ramp_to(&mut self, value: f64, end_time: f64) {
        self.insert(Breakpoint {
            time: end_time,
            value: finite_or(value, 0.0),
            ramp: Ramp::Linear,
        });
    }

    /// Exponential ramps need both endpoints strictly positive; values are
    /// floored at a tiny positive number.
    pub fn exponential_ramp_to(&mut self, value: f64, end_time: f64) {
        let value = finite_or(value, 0.0).max(1e-6);
        self.insert(Breakpoint {
            time: end_time,
            value,
            ramp: Ramp::Exponential,
        });
    }

    /// Drop every event after `time` and pin the curve to the value it had
    /// at `time`.
    pub fn cancel_and_hold(&mut self, time: f64) {
        let held = self.value_at(time);
        self.events.retain(|e| e.time <= time);
        self.set_value_at(held, time);
    }

    /// Whether any event lies after `time`.
    pub fn is_active(&self, time: f64) -> bool {
        self.events.last().is_some_and(|e| e.time > time)
    }

    /// Evaluate the curve at `time`, forgetting events that are fully in the
    /// past.
    pub fn value_at(&mut self, time: f64) -> f64 {
        // Prune breakpoints wholly before `time`, keeping the last one as the
        // segment start.
        let passed = self.events.partition_point(|e| e.time <= time);
        if passed > 0 {
            let last = self.events[passed - 1];
            self.base = last.value;
            self.base_time = last.time;
            self.events.drain(..passed);
        }

        let Some(next) = self.events.first() else {
            return self.base;
        };
        let (v0, t0) = (self.base, self.base_time);
        match next.ramp {
            Ramp::Set => v0,
            Ramp::Linear => {
                let span = next.time - t0;
                if span <= 0.0 {
                    return next.value;
                }
                let x = ((time - t0) / span).clamp(0.0, 1.0);
                v0 + (next.value - v0) * x
            }
            Ramp::Exponential => {
                let span = next.time - t0;
                if span <= 0.0 || v0 <= 0.0 {
                    return if time >= next.time { next.value } else { v0 };
                }
                let x = ((time - t0) / span).clamp(0.0, 1.0);
                v0 * (next.value / v0).powf(x)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_ramp_interpolates() {
        let mut a = Automation::new(1.0);
        a.set_value_at(1.0, 0.0);
        a.linear_ramp_to(0.0, 1.0);
        assert!((a.value_at(0.25) - 0.75).abs() < 1e-12);
        assert!((a.value_at(0.5) - 0.5).abs() < 1e-12);
        assert_eq!(a.value_at(2.0), 0.0);
    }

    #[test]
    fn dip_and_recover() {
        let mut a = Automation::new(1.0);
        a.set_value_at(1.0, 0.0);
        a.linear_ramp_to(0.2, 0.03);
        a.linear_ramp_to(1.0, 0.15);
        assert!((a.value_at(0.03) - 0.2).abs() < 1e-9);
        assert!((a.value_at(0.09) - 0.6).abs() < 1e-9);
        assert_eq!(a.value_at(0.2), 1.0);
        assert!(!a.is_active(0.2));
    }

    #[test]
    fn exponential_ramp_is_geometric() {
        let mut a = Automation::new(0.0001);
        a.set_value_at(0.0001, 0.0);
        a.exponential_ramp_to(0.01, 1.0);
        assert!((a.value_at(0.5) - 0.001).abs() < 1e-9);
    }

    #[test]
    fn cancel_and_hold_freezes_mid_ramp() {
        let mut a = Automation::new(1.0);
        a.set_value_at(1.0, 0.0);
        a.linear_ramp_to(0.0, 1.0);
        a.cancel_and_hold(0.4);
        assert!((a.value_at(0.4) - 0.6).abs() < 1e-9);
        assert!((a.value_at(5.0) - 0.6).abs() < 1e-9);
    }

    #[test]
    fn restart_from_held_value() {
        let mut a = Automation::new(1.0);
        a.set_value_at(1.0, 0.0);
        a.linear_ramp_to(0.1, 0.1);
        a.linear_ramp_to(1.0, 0.3);
        a.value_at(0.05);
        a.cancel_and_hold(0.05);
        let held = a.value_at(0.05);
        a.set_value_at(held, 0.05);
        a.linear_ramp_to(0.5, 0.15);
        assert!((a.value_at(0.15) - 0.5).abs() < 1e-9);
        assert!((a.value_at(1.0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn nan_values_become_zero() {
        let mut a = Automation::new(f64::NAN);
        assert_eq!(a.value_at(0.0), 0.0);
        a.linear_ramp_to(f64::INFINITY, 1.0);
        assert_eq!(a.value_at(1.0), 0.0);
    }
}
