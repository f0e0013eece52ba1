//! The serialized step queue behind every promise lineage.
//!
//! All bookkeeping (queued steps, the running flag, the last settlement and
//! the default context) lives behind one mutex, so "is anything running?" and
//! "queue this step" are decided together. Steps themselves never run under
//! the lock; they are handed to their context and report back through a
//! [`Completion`].
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{error, trace};

use crate::context::Context;
use crate::pool::panic_message;
use crate::settlement::Settlement;
use crate::{fatal, Violation};

/// Called exactly once by a step with the settlement it produced.
pub(crate) type Completion = Box<dyn FnOnce(Settlement) + Send + 'static>;

type Action = Box<dyn FnOnce(Settlement, Completion) + Send + 'static>;

struct Step {
    context: Context,
    action: Action,
}

struct State {
    /// Context of the most recently appended step.
    context: Context,
    /// Appended steps that have not started yet, oldest first.
    pending: VecDeque<Step>,
    running: bool,
    /// Output of the last completed step while the chain is idle.
    last: Option<Settlement>,
}

pub(crate) struct Chain {
    state: Mutex<State>,
}

impl Chain {
    pub(crate) fn new(context: Context) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                context,
                pending: VecDeque::new(),
                running: false,
                last: None,
            }),
        })
    }

    /// Queues `action` behind everything already appended. Without an
    /// explicit `context` the step runs on the context of the step before it.
    /// An idle chain starts it right away, fed with the last settlement.
    pub(crate) fn append<F>(self: &Arc<Self>, context: Option<Context>, action: F)
    where
        F: FnOnce(Settlement, Completion) + Send + 'static,
    {
        let mut state = self.state.lock();
        let context = match context {
            Some(context) => {
                state.context = context.clone();
                context
            }
            None => state.context.clone(),
        };
        let step = Step {
            context,
            action: Box::new(action),
        };
        if state.running {
            state.pending.push_back(step);
            trace!(pending = state.pending.len(), "step queued");
            return;
        }
        state.running = true;
        let input = state.last.take().unwrap_or_else(Settlement::empty);
        drop(state);
        self.dispatch(step, input);
    }

    fn advance(self: &Arc<Self>, settlement: Settlement) {
        let mut state = self.state.lock();
        match state.pending.pop_front() {
            Some(step) => {
                drop(state);
                self.dispatch(step, settlement);
            }
            None => {
                state.last = Some(settlement);
                state.running = false;
                trace!("chain idle");
            }
        }
    }

    /// A step that panics can never complete, so the whole process goes down
    /// with it.
    fn dispatch(self: &Arc<Self>, step: Step, input: Settlement) {
        let chain = Arc::clone(self);
        let Step { context, action } = step;
        context.enqueue(move || {
            trace!("step started");
            let done: Completion = Box::new(move |settlement: Settlement| chain.advance(settlement));
            if let Err(panic) = catch_unwind(AssertUnwindSafe(move || action(input, done))) {
                error!(message = panic_message(&*panic), "promise step panicked");
                fatal(Violation::StepPanicked)
            }
        });
    }
}
