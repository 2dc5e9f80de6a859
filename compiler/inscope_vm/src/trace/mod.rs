//! Frame observation.
//!
//! One observer slot per thread. The interpreter reports every frame
//! transition to whoever occupies the slot; installing an observer
//! displaces the previous occupant until the returned [`ObserverGuard`]
//! drops. Observers that want to coexist forward each event to the
//! occupant they displaced, which they can read with [`current_observer`]
//! before installing themselves.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::trace;

use crate::frame::Frame;

/// A frame transition.
pub enum FrameEvent<'a> {
    /// The frame starts running, or resumes after a yield.
    Enter(&'a Frame),
    /// A generator frame yielded and is suspended.
    Suspend(&'a Frame),
    /// The frame is returning; its locals are still intact.
    Exit(&'a Frame),
    /// The frame is being left by an error.
    Unwind(&'a Frame),
}

impl<'a> FrameEvent<'a> {
    pub fn frame(&self) -> &'a Frame {
        match self {
            FrameEvent::Enter(frame)
            | FrameEvent::Suspend(frame)
            | FrameEvent::Exit(frame)
            | FrameEvent::Unwind(frame) => frame,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            FrameEvent::Enter(_) => "enter",
            FrameEvent::Suspend(_) => "suspend",
            FrameEvent::Exit(_) => "exit",
            FrameEvent::Unwind(_) => "unwind",
        }
    }
}

/// Receives frame transitions while installed.
pub trait FrameObserver {
    fn on_event(&self, event: &FrameEvent<'_>);
}

thread_local! {
    static SLOT: RefCell<Option<Rc<dyn FrameObserver>>> = const { RefCell::new(None) };
}

/// The observer currently occupying the slot.
pub fn current_observer() -> Option<Rc<dyn FrameObserver>> {
    SLOT.with(|slot| slot.borrow().clone())
}

/// Install `observer`, displacing the current occupant until the guard drops.
#[must_use = "the observer is removed as soon as the guard is dropped"]
pub fn install_observer(observer: Rc<dyn FrameObserver>) -> ObserverGuard {
    let previous = SLOT.with(|slot| slot.borrow_mut().replace(observer));
    trace!(chained = previous.is_some(), "frame observer installed");
    ObserverGuard { previous }
}

/// Restores the displaced observer on drop, on every exit path.
pub struct ObserverGuard {
    previous: Option<Rc<dyn FrameObserver>>,
}

impl Drop for ObserverGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        SLOT.with(|slot| *slot.borrow_mut() = previous);
        trace!("frame observer restored");
    }
}

/// Report `event` to the installed observer, if any.
pub(crate) fn notify(event: &FrameEvent<'_>) {
    // Clone out of the slot so the observer may install or remove observers.
    let Some(observer) = current_observer() else {
        return;
    };
    trace!(
        event = event.label(),
        code = %event.frame().code.qualname,
        "frame event"
    );
    observer.on_event(event);
}

#[cfg(test)]
mod tests;
