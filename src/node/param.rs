use std::fmt;
use std::rc::Rc;

use crate::error::HostError;
use crate::host::{HostContext, ParamDescriptor, ParamId, ParamName};

use super::core::NodeCore;

/// A control parameter of a node.
///
/// Holding a parameter keeps its node alive. Automation methods return the
/// parameter again so calls can be chained:
///
/// ```
/// use gleichklang::host::{HostContext, SoftwareHost};
/// use gleichklang::options::GainOptions;
/// use gleichklang::primitive::create_native_gain_node;
///
/// let context = HostContext::new(SoftwareHost::new(48000.0));
/// let gain = create_native_gain_node(&context, &GainOptions::default()).unwrap();
///
/// gain.gain()
///     .set_value_at_time(0.0, 0.0).unwrap()
///     .linear_ramp_to_value_at_time(1.0, 1.0).unwrap();
/// assert_eq!(gain.gain().value(), 0.0);
/// ```
#[derive(Clone)]
pub struct AudioParam {
    core: Rc<NodeCore>,
    /// The host parameter behind this handle.
    target: ParamName,
    /// The name consumers see. Differs from `target` when a facade exposes
    /// an internal parameter under its own name.
    name: ParamName,
}

impl AudioParam {
    pub(crate) fn new(core: Rc<NodeCore>, name: ParamName) -> Self {
        Self {
            core,
            target: name,
            name,
        }
    }

    /// The same host parameter, presented as `name`.
    pub(crate) fn exposed_as(self, name: ParamName) -> Self {
        Self { name, ..self }
    }

    #[inline]
    pub(crate) fn id(&self) -> ParamId {
        ParamId {
            node: self.core.id(),
            name: self.target,
        }
    }

    #[inline]
    pub(crate) fn context(&self) -> &HostContext {
        self.core.context()
    }

    #[inline]
    pub fn name(&self) -> ParamName {
        self.name
    }

    fn descriptor(&self) -> ParamDescriptor {
        self.context().backend(|b| b.param_descriptor(self.id()))
    }

    /// The value at the current context time.
    pub fn value(&self) -> f32 {
        self.context().backend(|b| b.param_value(self.id()))
    }

    pub fn set_value(&self, value: f32) -> Result<(), HostError> {
        self.context().backend_mut(|b| b.set_param_value(self.id(), value))
    }

    pub fn default_value(&self) -> f32 {
        self.descriptor().default_value
    }

    pub fn min_value(&self) -> f32 {
        self.descriptor().min_value
    }

    pub fn max_value(&self) -> f32 {
        self.descriptor().max_value
    }

    pub fn set_value_at_time(&self, value: f32, start_time: f64) -> Result<&Self, HostError> {
        self.context()
            .backend_mut(|b| b.set_param_value_at_time(self.id(), value, start_time))?;
        Ok(self)
    }

    pub fn linear_ramp_to_value_at_time(&self, value: f32, end_time: f64) -> Result<&Self, HostError> {
        self.context()
            .backend_mut(|b| b.linear_ramp_param_to_value_at_time(self.id(), value, end_time))?;
        Ok(self)
    }

    pub fn cancel_scheduled_values(&self, cancel_time: f64) -> Result<&Self, HostError> {
        self.context()
            .backend_mut(|b| b.cancel_scheduled_param_values(self.id(), cancel_time))?;
        Ok(self)
    }
}

impl PartialEq for AudioParam {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.core, &other.core) && self.target == other.target
    }
}

impl fmt::Debug for AudioParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioParam")
            .field("name", &self.name)
            .field("value", &self.value())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::SoftwareHost;
    use crate::options::GainOptions;
    use crate::primitive::create_native_gain_node;

    #[test]
    fn exposed_name_keeps_the_host_parameter() {
        let context = HostContext::new(SoftwareHost::new(48000.0));
        let gain = create_native_gain_node(&context, &GainOptions::default()).unwrap();
        let offset = gain.gain().exposed_as(ParamName::Offset);

        assert_eq!(offset.name(), ParamName::Offset);
        assert_eq!(offset, gain.gain());

        offset.set_value(0.25).unwrap();
        assert_eq!(gain.gain().value(), 0.25);
        assert_eq!(format!("{offset:?}"), "AudioParam { name: Offset, value: 0.25 }");
    }
}
