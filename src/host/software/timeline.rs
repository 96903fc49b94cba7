//! Parameter automation timeline

use crate::host::ParamDescriptor;

#[derive(Clone, Copy, Debug, PartialEq)]
enum AutomationEvent {
    SetValue { value: f32, time: f64 },
    LinearRamp { value: f32, time: f64 },
}

impl AutomationEvent {
    #[inline]
    fn time(&self) -> f64 {
        match *self {
            AutomationEvent::SetValue { time, .. } | AutomationEvent::LinearRamp { time, .. } => time,
        }
    }

    #[inline]
    fn same_type(&self, other: &Self) -> bool {
        core::mem::discriminant(self) == core::mem::discriminant(other)
    }
}

/// The intrinsic value of one parameter over time.
///
/// Events are kept sorted by time. An event inserted at the time of an
/// existing event of the same type replaces it.
#[derive(Clone, Debug)]
pub(crate) struct Timeline {
    descriptor: ParamDescriptor,
    /// Value before the first event (or always, when there are none)
    value: f32,
    events: Vec<AutomationEvent>,
}

impl Timeline {
    pub fn new(descriptor: ParamDescriptor) -> Self {
        Self {
            descriptor,
            value: descriptor.default_value,
            events: Vec::new(),
        }
    }

    #[inline]
    pub fn descriptor(&self) -> ParamDescriptor {
        self.descriptor
    }

    #[inline]
    pub fn has_automation(&self) -> bool {
        !self.events.is_empty()
    }

    /// Assigning `value` is `set_value_at_time(value, now)` once automation exists.
    pub fn set_value(&mut self, value: f32, now: f64) {
        if self.events.is_empty() {
            self.value = value;
        } else {
            self.set_value_at_time(value, now);
        }
    }

    pub fn set_value_at_time(&mut self, value: f32, time: f64) {
        self.insert(AutomationEvent::SetValue { value, time });
    }

    pub fn linear_ramp_to_value_at_time(&mut self, value: f32, time: f64) {
        self.insert(AutomationEvent::LinearRamp { value, time });
    }

    pub fn cancel_scheduled_values(&mut self, cancel_time: f64) {
        self.events.retain(|e| e.time() < cancel_time);
    }

    fn insert(&mut self, event: AutomationEvent) {
        let time = event.time();
        if let Some(existing) = self
            .events
            .iter_mut()
            .find(|e| e.time() == time && e.same_type(&event))
        {
            *existing = event;
            return;
        }
        let at = self.events.partition_point(|e| e.time() <= time);
        self.events.insert(at, event);
    }

    /// Intrinsic value at `t`, clamped to the nominal range.
    pub fn value_at(&self, t: f64) -> f32 {
        self.clamp(self.intrinsic_at(t))
    }

    #[inline]
    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.descriptor.min_value, self.descriptor.max_value)
    }

    /// Intrinsic value at `t`, before clamping and before audio-rate input is added.
    pub fn intrinsic_at(&self, t: f64) -> f32 {
        let mut value = self.value;
        let mut since = 0.0;

        for event in &self.events {
            match *event {
                AutomationEvent::SetValue { value: v, time } => {
                    if time > t {
                        break;
                    }
                    value = v;
                    since = time;
                }
                AutomationEvent::LinearRamp { value: v, time } => {
                    if time <= t {
                        value = v;
                        since = time;
                        continue;
                    }
                    // inside the ramp
                    let span = time - since;
                    if span <= 0.0 {
                        return v;
                    }
                    let progress = ((t - since) / span) as f32;
                    return value + (v - value) * progress;
                }
            }
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeline() -> Timeline {
        Timeline::new(ParamDescriptor::unbounded(1.0))
    }

    #[test]
    fn starts_at_default() {
        let tl = timeline();
        assert_eq!(tl.value_at(0.0), 1.0);
        assert_eq!(tl.value_at(10.0), 1.0);
    }

    #[test]
    fn set_value_at_time_steps() {
        let mut tl = timeline();
        tl.set_value_at_time(0.0, 2.0);
        assert_eq!(tl.value_at(1.999), 1.0);
        assert_eq!(tl.value_at(2.0), 0.0);
        assert_eq!(tl.value_at(5.0), 0.0);
    }

    #[test]
    fn linear_ramp_interpolates_from_previous_event() {
        let mut tl = timeline();
        tl.set_value_at_time(0.0, 1.0);
        tl.linear_ramp_to_value_at_time(1.0, 2.0);
        assert!((tl.value_at(1.5) - 0.5).abs() < 1e-6);
        assert_eq!(tl.value_at(3.0), 1.0);
    }

    #[test]
    fn cancel_drops_later_events() {
        let mut tl = timeline();
        tl.set_value_at_time(0.25, 1.0);
        tl.set_value_at_time(0.5, 2.0);
        tl.cancel_scheduled_values(1.5);
        assert_eq!(tl.value_at(3.0), 0.25);
    }

    #[test]
    fn same_time_same_type_replaces() {
        let mut tl = timeline();
        tl.set_value_at_time(0.25, 1.0);
        tl.set_value_at_time(0.75, 1.0);
        assert_eq!(tl.value_at(1.0), 0.75);
    }

    #[test]
    fn values_are_clamped_to_nominal_range() {
        let mut tl = Timeline::new(ParamDescriptor {
            default_value: 0.0,
            min_value: -1.0,
            max_value: 1.0,
        });
        tl.set_value(4.0, 0.0);
        assert_eq!(tl.value_at(0.0), 1.0);
    }
}
