//! Component-level events.
//!
//! Events travel through the component tree, not the host tree. Dispatching
//! from a component makes it the target: capture listeners run from the
//! outermost ancestor down, then the target's own listeners, then bubble
//! listeners from the parent back up to the root.

use alloc::{rc::Rc, vec::Vec};
use core::{cell::Cell, fmt};

use crate::props::{Str, Value};

/// Phases of event propagation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Phase {
    /// Root-to-target traversal.
    Capture,
    /// The dispatching component.
    Target,
    /// Target-to-root traversal.
    Bubble,
}

/// Handle returned when registering a listener.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ListenerId(pub(crate) u64);

/// An event flowing through the component tree.
pub struct Event {
    kind: Str,
    detail: Value,
    bubbles: bool,
    phase: Cell<Phase>,
    stopped: Cell<bool>,
    stopped_immediately: Cell<bool>,
    default_prevented: Cell<bool>,
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("kind", &self.kind)
            .field("detail", &self.detail)
            .field("bubbles", &self.bubbles)
            .field("phase", &self.phase.get())
            .finish_non_exhaustive()
    }
}

impl Event {
    /// Creates a bubbling event with no detail.
    pub fn new(kind: impl Into<Str>) -> Self {
        Self {
            kind: kind.into(),
            detail: Value::Null,
            bubbles: true,
            phase: Cell::new(Phase::Target),
            stopped: Cell::new(false),
            stopped_immediately: Cell::new(false),
            default_prevented: Cell::new(false),
        }
    }

    /// Attaches a payload.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<Value>) -> Self {
        self.detail = detail.into();
        self
    }

    /// Controls whether the event bubbles past its target.
    #[must_use]
    pub const fn with_bubbles(mut self, bubbles: bool) -> Self {
        self.bubbles = bubbles;
        self
    }

    /// The event type.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The event payload.
    #[must_use]
    pub const fn detail(&self) -> &Value {
        &self.detail
    }

    /// Whether the event bubbles.
    #[must_use]
    pub const fn bubbles(&self) -> bool {
        self.bubbles
    }

    /// The phase currently being dispatched.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase.get()
    }

    /// Stops the event after the current component's listeners.
    pub fn stop_propagation(&self) {
        self.stopped.set(true);
    }

    /// Stops the event right after the current listener.
    pub fn stop_immediate_propagation(&self) {
        self.stopped.set(true);
        self.stopped_immediately.set(true);
    }

    /// Marks the event as handled; `dispatch_event` then returns `false`.
    pub fn prevent_default(&self) {
        self.default_prevented.set(true);
    }

    /// Whether [`Event::prevent_default`] was called.
    #[must_use]
    pub fn default_prevented(&self) -> bool {
        self.default_prevented.get()
    }
}

#[derive(Clone)]
pub(crate) struct Listener {
    pub(crate) id: ListenerId,
    pub(crate) kind: Str,
    pub(crate) capture: bool,
    pub(crate) callback: Rc<dyn Fn(&Event)>,
}

fn run(event: &Event, listeners: &[Listener], include: impl Fn(&Listener) -> bool) -> bool {
    for listener in listeners
        .iter()
        .filter(|listener| listener.kind == event.kind && include(listener))
    {
        (listener.callback)(event);
        if event.stopped_immediately.get() {
            break;
        }
    }
    event.stopped.get()
}

/// Runs `event` through `path`, which holds the target's listeners first and
/// then each ancestor's, innermost first. Returns `false` if any listener
/// prevented the default.
pub(crate) fn dispatch(event: &Event, path: &[Vec<Listener>]) -> bool {
    let Some((target, ancestors)) = path.split_first() else {
        return true;
    };

    event.phase.set(Phase::Capture);
    for listeners in ancestors.iter().rev() {
        if run(event, listeners, |listener| listener.capture) {
            return !event.default_prevented();
        }
    }

    event.phase.set(Phase::Target);
    if run(event, target, |_| true) || !event.bubbles {
        return !event.default_prevented();
    }

    event.phase.set(Phase::Bubble);
    for listeners in ancestors {
        if run(event, listeners, |listener| !listener.capture) {
            break;
        }
    }
    !event.default_prevented()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::{string::String, vec};
    use core::cell::RefCell;

    fn recorder(log: &Rc<RefCell<Vec<String>>>, name: &'static str) -> Rc<dyn Fn(&Event)> {
        let log = log.clone();
        Rc::new(move |event: &Event| {
            log.borrow_mut().push(format!("{name}:{:?}", event.phase()));
        })
    }

    fn listener(id: u64, capture: bool, callback: Rc<dyn Fn(&Event)>) -> Listener {
        Listener {
            id: ListenerId(id),
            kind: "ping".into(),
            capture,
            callback,
        }
    }

    #[test]
    fn capture_then_target_then_bubble() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let path = vec![
            vec![listener(0, false, recorder(&log, "target"))],
            vec![
                listener(1, true, recorder(&log, "parent")),
                listener(2, false, recorder(&log, "parent")),
            ],
            vec![
                listener(3, true, recorder(&log, "root")),
                listener(4, false, recorder(&log, "root")),
            ],
        ];
        assert!(dispatch(&Event::new("ping"), &path));
        assert_eq!(
            *log.borrow(),
            [
                "root:Capture",
                "parent:Capture",
                "target:Target",
                "parent:Bubble",
                "root:Bubble"
            ]
        );
    }

    #[test]
    fn stop_propagation_finishes_the_current_component() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let stop: Rc<dyn Fn(&Event)> = Rc::new(Event::stop_propagation);
        let path = vec![
            vec![
                listener(0, false, stop),
                listener(1, false, recorder(&log, "target")),
            ],
            vec![listener(2, false, recorder(&log, "parent"))],
        ];
        dispatch(&Event::new("ping"), &path);
        assert_eq!(*log.borrow(), ["target:Target"]);
    }

    #[test]
    fn prevent_default_is_reported() {
        let prevent: Rc<dyn Fn(&Event)> = Rc::new(Event::prevent_default);
        let path = vec![Vec::new(), vec![listener(0, false, prevent)]];
        assert!(!dispatch(&Event::new("ping"), &path));
        assert!(dispatch(&Event::new("ping").with_bubbles(false), &path));
    }

    #[test]
    fn other_event_kinds_are_ignored() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let path = vec![vec![listener(0, false, recorder(&log, "target"))]];
        dispatch(&Event::new("pong"), &path);
        assert!(log.borrow().is_empty());
    }
}
