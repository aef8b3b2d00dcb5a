//! Sample-accurate parameter automation.
//!
//! An `AudioParam` holds a time-ordered list of automation events and can be
//! evaluated at any audio-clock time. Exponential ramps start from the time and
//! value of the preceding event; a ramp whose endpoints are not both positive
//! holds its start value until it ends.

#[derive(Debug, Clone, Copy, PartialEq)]
enum Automation {
    SetValue { time: f64, value: f32 },
    ExponentialRamp { time: f64, value: f32 },
    SetTarget { time: f64, target: f32, time_constant: f64 },
}

impl Automation {
    fn time(&self) -> f64 {
        match *self {
            Self::SetValue { time, .. } | Self::ExponentialRamp { time, .. } | Self::SetTarget { time, .. } => time,
        }
    }
}

/// Automatable parameter (gain, frequency)
#[derive(Debug, Clone)]
pub struct AudioParam {
    default_value: f32,
    events: Vec<Automation>,
}

impl AudioParam {
    pub fn new(default_value: f32) -> Self {
        Self {
            default_value,
            events: Vec::new(),
        }
    }

    /// Jump to `value` at `time`
    pub fn set_value_at_time(&mut self, value: f32, time: f64) {
        self.insert(Automation::SetValue { time, value });
    }

    /// Ramp exponentially from the previous event to `value`, arriving at `time`
    pub fn exponential_ramp_to_value_at_time(&mut self, value: f32, time: f64) {
        self.insert(Automation::ExponentialRamp { time, value });
    }

    /// Approach `target` from `time` on with the given time constant
    pub fn set_target_at_time(&mut self, target: f32, time: f64, time_constant: f64) {
        self.insert(Automation::SetTarget { time, target, time_constant });
    }

    /// Remove every event scheduled at or after `time`
    pub fn cancel_scheduled_values(&mut self, time: f64) {
        self.events.retain(|e| e.time() < time);
    }

    /// Number of pending automation events
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Value of the parameter at audio time `t`
    pub fn value_at(&self, t: f64) -> f32 {
        let mut value = self.default_value;
        let mut anchor = 0.0;
        let mut target: Option<(f32, f64)> = None;

        for event in &self.events {
            let time = event.time();
            if time > t {
                if let Automation::ExponentialRamp { time, value: end } = *event {
                    return exponential_between(value, anchor, end, time, t);
                }
                break;
            }

            if let Some((goal, time_constant)) = target {
                value = approach(value, goal, time_constant, time - anchor);
            }
            match *event {
                Automation::SetValue { value: v, .. } | Automation::ExponentialRamp { value: v, .. } => {
                    value = v;
                    target = None;
                }
                Automation::SetTarget { target: goal, time_constant, .. } => {
                    target = Some((goal, time_constant));
                }
            }
            anchor = time;
        }

        match target {
            Some((goal, time_constant)) => approach(value, goal, time_constant, t - anchor),
            None => value,
        }
    }

    /// Collapse events that are entirely in the past into a single anchor.
    ///
    /// The last past event's time and value are kept so a pending ramp still
    /// starts from the same point; an active set-target curve is kept as is.
    pub fn prune_before(&mut self, t: f64) {
        let passed = self.events.partition_point(|e| e.time() <= t);
        if passed < 2 {
            return;
        }

        let last = self.events[passed - 1];
        let anchor = Automation::SetValue {
            time: last.time(),
            value: self.value_at(last.time()),
        };

        let pending = self.events.split_off(passed);
        self.events.clear();
        self.events.push(anchor);
        if matches!(last, Automation::SetTarget { .. }) {
            self.events.push(last);
        }
        self.events.extend(pending);
    }

    fn insert(&mut self, event: Automation) {
        let time = event.time();
        let idx = self.events.partition_point(|e| e.time() <= time);
        self.events.insert(idx, event);
    }
}

fn exponential_between(v0: f32, t0: f64, v1: f32, t1: f64, t: f64) -> f32 {
    if v0 == 0.0 || (v0 > 0.0) != (v1 > 0.0) {
        return v0;
    }
    if t1 <= t0 {
        return v1;
    }
    let progress = ((t - t0) / (t1 - t0)).clamp(0.0, 1.0);
    (v0 as f64 * (v1 as f64 / v0 as f64).powf(progress)) as f32
}

fn approach(from: f32, goal: f32, time_constant: f64, elapsed: f64) -> f32 {
    if time_constant <= 0.0 {
        return goal;
    }
    let decay = (-elapsed.max(0.0) / time_constant).exp();
    (goal as f64 + (from as f64 - goal as f64) * decay) as f32
}
