#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::cell::RefCell;
use std::rc::Rc;

use super::*;
use crate::print_handler::silent_handler;
use crate::runtime::Runtime;
use crate::value::Value;
use pretty_assertions::assert_eq;

#[derive(Default)]
struct Recorder {
    events: RefCell<Vec<(String, String)>>,
    exit_locals: RefCell<Vec<String>>,
}

impl FrameObserver for Recorder {
    fn on_event(&self, event: &FrameEvent<'_>) {
        let frame = event.frame();
        self.events
            .borrow_mut()
            .push((event.label().to_string(), frame.code.qualname.to_string()));
        if let FrameEvent::Exit(frame) = event {
            let mut names: Vec<String> = frame
                .locals()
                .iter()
                .map(|(name, value)| format!("{name}={}", value.repr()))
                .collect();
            names.sort();
            self.exit_locals.borrow_mut().push(names.join(","));
        }
    }
}

fn runtime() -> Runtime {
    Runtime::builder().print_handler(silent_handler()).build()
}

#[test]
fn test_observer_sees_enter_and_exit_with_live_locals() {
    let rt = runtime();
    let module = rt.load("def f(x) {\n  y = x * 2\n  return y\n}", "m").unwrap();
    let f = module.get("f").unwrap();

    let recorder = Rc::new(Recorder::default());
    {
        let _guard = install_observer(recorder.clone());
        rt.call(&f, &[Value::Int(4)], &[]).unwrap();
    }

    assert_eq!(
        *recorder.events.borrow(),
        vec![
            ("enter".to_string(), "f".to_string()),
            ("exit".to_string(), "f".to_string()),
        ]
    );
    assert_eq!(*recorder.exit_locals.borrow(), vec!["x=4,y=8".to_string()]);
    assert!(current_observer().is_none());
}

#[test]
fn test_unwind_reported_for_failing_frame() {
    let rt = runtime();
    let module = rt.load("def f() {\n  return 1 // 0\n}", "m").unwrap();
    let f = module.get("f").unwrap();

    let recorder = Rc::new(Recorder::default());
    let _guard = install_observer(recorder.clone());
    assert!(rt.call(&f, &[], &[]).is_err());
    let labels: Vec<String> = recorder.events.borrow().iter().map(|e| e.0.clone()).collect();
    assert_eq!(labels, vec!["enter", "unwind"]);
}

#[test]
fn test_generator_frames_suspend_between_resumes() {
    let rt = runtime();
    let module = rt
        .load("def g() {\n  yield 1\n  yield 2\n}", "m")
        .unwrap();
    let generator = rt.call(&module.get("g").unwrap(), &[], &[]).unwrap();
    let Value::Generator(generator) = generator else {
        panic!("expected generator");
    };

    let recorder = Rc::new(Recorder::default());
    let _guard = install_observer(recorder.clone());
    while generator.next_value().unwrap().is_some() {}
    let labels: Vec<String> = recorder.events.borrow().iter().map(|e| e.0.clone()).collect();
    assert_eq!(
        labels,
        vec!["enter", "suspend", "enter", "suspend", "enter", "exit"]
    );
}

#[test]
fn test_guard_restores_previous_observer() {
    let outer = Rc::new(Recorder::default());
    let inner = Rc::new(Recorder::default());
    let _outer_guard = install_observer(outer.clone());
    {
        let _inner_guard = install_observer(inner.clone());
        let current = current_observer().unwrap();
        assert!(Rc::ptr_eq(
            &current,
            &(inner.clone() as Rc<dyn FrameObserver>)
        ));
    }
    let current = current_observer().unwrap();
    assert!(Rc::ptr_eq(&current, &(outer as Rc<dyn FrameObserver>)));
}
