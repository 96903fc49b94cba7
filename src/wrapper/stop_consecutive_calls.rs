use std::cell::Cell;
use std::rc::Rc;

use crate::error::HostError;
use crate::host::{DisconnectSelector, DisconnectTarget, Endpoint, HostContext};
use crate::node::core::{ConnectFn, DisconnectFn, Link, StopFn, Unlink};
use crate::node::sealed::Sealed;
use crate::node::NativeScheduledSourceNode;
use crate::options::GainOptions;
use crate::primitive::create_native_gain_node;

/// Make repeated `stop()` calls on `node` behave like on a conformant host.
///
/// Some hosts raise `InvalidStateError` when `stop()` is called a second
/// time. After wrapping, the node's output runs through an extra gain stage,
/// and a repeated `stop()` that the host rejects steps that gain to zero at
/// the requested time instead. The first `stop()` is untouched and its
/// errors propagate.
///
/// The node is patched in place: every existing handle sees the change.
/// Wrap a node at most once, before connecting it anywhere.
pub fn wrap_stop_method_consecutive_calls<N>(node: &N, context: &HostContext) -> Result<(), HostError>
where
    N: NativeScheduledSourceNode,
{
    let core = node.core();
    let aux = create_native_gain_node(context, &GainOptions::default())?;
    let original = core.methods();

    // splice the gain stage behind the node's native output
    let aux_target = Sealed::input_target(&aux);
    (original.connect)(
        0,
        Link {
            context: aux_target.context,
            endpoint: Endpoint::Input {
                node: aux_target.node,
                input: 0,
            },
        },
    )?;

    // only a host-reported end detaches; a synthetic "ended" event must not
    let detach = Rc::clone(&original.disconnect);
    core.on_host_ended(Box::new(move || {
        let unlink = Unlink {
            context: Some(aux_target.context),
            selector: DisconnectSelector {
                output: None,
                target: Some(DisconnectTarget::Node {
                    node: aux_target.node,
                    input: None,
                }),
            },
        };
        if let Err(err) = detach(unlink) {
            tracing::debug!(%err, "splice already detached");
        }
    }));

    let via = aux.clone();
    let connect: ConnectFn = Rc::new(move |output, link| via.core.connect_link(output, link));
    let via = aux.clone();
    let disconnect: DisconnectFn = Rc::new(move |unlink| via.core.disconnect_unlink(unlink));
    core.install_routing(connect, disconnect);

    let native_stop = original.stop;
    let gain = aux.gain();
    let is_stopped = Cell::new(false);
    let stop: StopFn = Rc::new(move |when| {
        if !is_stopped.get() {
            native_stop(when)?;
            is_stopped.set(true);
            return Ok(());
        }

        match native_stop(when) {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::warn!(%err, when, "host rejected a repeated stop, silencing instead");
                gain.set_value_at_time(0.0, when).map(|_| ())
            }
        }
    });
    core.install_stop(stop);

    tracing::debug!(context = %context.id(), node = %core.id(), "wrapped stop for consecutive calls");
    Ok(())
}
