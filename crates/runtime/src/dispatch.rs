use std::collections::BTreeMap;

use foundation::ids::ElementId;
use foundation::value::Value;
use serde::Serialize;
use tracing::{debug, warn};

use crate::callback::{CallbackId, CallbackRecord, CallbackRegistry, OutputTarget};
use crate::function::Inputs;

/// Live values of one view: current inputs and last-known outputs.
///
/// A view's state must be mutated by one event at a time; callers hold it
/// behind a lock so updates apply in the order input events arrive.
#[derive(Debug, Default, Clone)]
pub struct LiveState {
    inputs: Inputs,
    outputs: BTreeMap<OutputTarget, Value>,
}

impl LiveState {
    pub fn new(inputs: Inputs) -> Self {
        Self {
            inputs,
            outputs: BTreeMap::new(),
        }
    }

    pub fn inputs(&self) -> &Inputs {
        &self.inputs
    }

    pub fn output(&self, target: &OutputTarget) -> Option<&Value> {
        self.outputs.get(target)
    }

    pub fn outputs(&self) -> impl Iterator<Item = (&OutputTarget, &Value)> {
        self.outputs.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputUpdate {
    pub target: OutputTarget,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallbackFailure {
    pub callback: CallbackId,
    pub target: OutputTarget,
    pub error: String,
}

/// Result of one input event: outputs written and callbacks that failed.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct Dispatch {
    pub updates: Vec<OutputUpdate>,
    pub failures: Vec<CallbackFailure>,
}

impl Dispatch {
    pub fn invocations(&self) -> usize {
        self.updates.len() + self.failures.len()
    }
}

impl CallbackRegistry {
    /// Invokes every callback once against the current inputs.
    pub fn fire_all(&self, state: &mut LiveState) -> Dispatch {
        let mut dispatch = Dispatch::default();
        for record in self.records() {
            fire(record, state, &mut dispatch);
        }
        dispatch
    }

    /// Stores the new value of `id` and re-invokes every callback reading it.
    ///
    /// A failing callback leaves its output at the last-known value; the other
    /// callbacks still run.
    pub fn apply_input(&self, state: &mut LiveState, id: impl Into<ElementId>, value: Value) -> Dispatch {
        let id = id.into();
        state.inputs.insert(id.clone(), value);

        let mut dispatch = Dispatch::default();
        for record in self.dependents(id.as_str()) {
            fire(record, state, &mut dispatch);
        }
        debug!(input = %id, invocations = dispatch.invocations(), "input applied");
        dispatch
    }
}

fn fire(record: &CallbackRecord, state: &mut LiveState, dispatch: &mut Dispatch) {
    match record.invoke(&state.inputs) {
        Ok(value) => {
            state.outputs.insert(record.target().clone(), value.clone());
            dispatch.updates.push(OutputUpdate {
                target: record.target().clone(),
                value,
            });
        }
        Err(err) => {
            warn!(callback = record.id().0, output = %record.target(), error = %err, "callback failed");
            dispatch.failures.push(CallbackFailure {
                callback: record.id(),
                target: record.target().clone(),
                error: err.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::LiveState;
    use crate::callback::{CallbackRegistry, OutputTarget};
    use crate::function::{ComputeError, ComputeFunction, Inputs};
    use foundation::ids::{IdKind, IdRegistry};
    use foundation::value::Value;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ids() -> IdRegistry {
        let mut ids = IdRegistry::new();
        ids.register("num0", IdKind::Control).unwrap();
        ids.register("s0", IdKind::Control).unwrap();
        ids.register("out1", IdKind::PlotOutput).unwrap();
        ids.register("out2", IdKind::PlotOutput).unwrap();
        ids.register("group3", IdKind::Block).unwrap();
        ids
    }

    #[test]
    fn change_reinvokes_with_new_value() {
        let ids = ids();
        let mut callbacks = CallbackRegistry::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_in = seen.clone();
        callbacks
            .bind(
                &ids,
                ComputeFunction::new(["num0"], move |inputs| {
                    let n = inputs.number("num0")?;
                    seen_in.store(n as usize, Ordering::SeqCst);
                    Ok(Value::Number(n))
                }),
                "out1",
                "children",
            )
            .unwrap();

        let mut state = LiveState::new(Inputs::new().with("num0", 50.0).with("s0", "ABC"));
        let initial = callbacks.fire_all(&mut state);
        assert_eq!(initial.updates.len(), 1);
        assert_eq!(seen.load(Ordering::SeqCst), 50);

        let d = callbacks.apply_input(&mut state, "num0", Value::Number(75.0));
        assert_eq!(seen.load(Ordering::SeqCst), 75);
        assert_eq!(d.updates.len(), 1);
        assert_eq!(
            state.output(&OutputTarget::new("out1", "children")),
            Some(&Value::Number(75.0))
        );
    }

    #[test]
    fn unrelated_input_fires_nothing() {
        let ids = ids();
        let mut callbacks = CallbackRegistry::new();
        callbacks
            .bind(&ids, ComputeFunction::new(["num0"], |_| Ok(Value::Null)), "out1", "children")
            .unwrap();
        let mut state = LiveState::new(Inputs::new().with("num0", 1.0).with("s0", "ABC"));
        let d = callbacks.apply_input(&mut state, "s0", Value::from("XYZ"));
        assert_eq!(d.invocations(), 0);
        assert_eq!(state.inputs().text("s0").unwrap(), "XYZ");
    }

    #[test]
    fn failure_keeps_last_value_and_others_still_run() {
        let ids = ids();
        let mut callbacks = CallbackRegistry::new();
        callbacks
            .bind(
                &ids,
                ComputeFunction::new(["num0"], |inputs| {
                    let n = inputs.number("num0")?;
                    if n > 90.0 {
                        return Err(ComputeError::failed("too large"));
                    }
                    Ok(Value::Number(n))
                }),
                "out1",
                "children",
            )
            .unwrap();
        callbacks
            .bind(
                &ids,
                ComputeFunction::new(["num0"], |inputs| Ok(Value::Number(inputs.number("num0")? * 2.0))),
                "out2",
                "children",
            )
            .unwrap();

        let mut state = LiveState::new(Inputs::new().with("num0", 10.0));
        callbacks.fire_all(&mut state);

        let d = callbacks.apply_input(&mut state, "num0", Value::Number(95.0));
        assert_eq!(d.failures.len(), 1);
        assert_eq!(d.failures[0].error, "too large");
        assert_eq!(d.updates.len(), 1);
        assert_eq!(
            state.output(&OutputTarget::new("out1", "children")),
            Some(&Value::Number(10.0))
        );
        assert_eq!(
            state.output(&OutputTarget::new("out2", "children")),
            Some(&Value::Number(190.0))
        );
    }

    #[test]
    fn group_shown_iff_function_true() {
        let ids = ids();
        let mut callbacks = CallbackRegistry::new();
        callbacks
            .bind(
                &ids,
                ComputeFunction::new(["num0"], |inputs| Ok(Value::Bool(inputs.number("num0")? >= 50.0))),
                "group3",
                "hidden",
            )
            .unwrap();
        let hidden = OutputTarget::new("group3", "hidden");

        let mut state = LiveState::new(Inputs::new().with("num0", 50.0));
        callbacks.fire_all(&mut state);
        assert_eq!(state.output(&hidden), Some(&Value::Bool(false)));

        callbacks.apply_input(&mut state, "num0", Value::Number(49.0));
        assert_eq!(state.output(&hidden), Some(&Value::Bool(true)));
    }
}
