//! Tests for triggers, listeners, and event dispatch.

extern crate helix;

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use helix::error::{PostError, RunError, ScriptError};
use helix::runner::ds::conversion::Kind;
use helix::runner::plugin::args::Args;
use helix::runner::plugin::binding::{BindingTarget, Param};
use helix::runner::trigger::{FaultKind, ListenerFault};
use helix::{Dictionary, EngineConfig, Helix, Namespace, StringSource, Trigger, Value};

use common::{engine, module, register_print, Output};

struct Save {
    slot: String,
}

struct Entity {
    id: i64,
}

struct Npc {
    entity: Entity,
}

/// `game` module with `print` and an `on_save` trigger exposing `slot`.
fn game(helix: &Helix) -> (Namespace, Output) {
    let root = module(helix, "game");
    let output = register_print(&root);
    root.trigger("on_save", |save: &Save, dict: &mut Dictionary| {
        dict.put("slot", save.slot.as_str()).is_ok()
    })
    .unwrap();
    (root, output)
}

fn attach(helix: &Helix, source: &str) -> helix::Script {
    let (script, _) = helix
        .load_script(&StringSource::named("listeners.hx", source))
        .unwrap_or_else(|e| panic!("{}", e));
    script
}

fn collect_faults(helix: &Helix) -> Arc<Mutex<Vec<ListenerFault>>> {
    let faults = Arc::new(Mutex::new(vec![]));
    let sink = faults.clone();
    helix
        .event_bus()
        .set_error_sink(move |fault| sink.lock().unwrap().push(fault.clone()));
    faults
}

// ============================================================================
// Dispatch
// ============================================================================

mod dispatch {
    use super::*;

    #[test]
    fn test_posted_event_runs_listener() {
        let helix = engine();
        let (_, output) = game(&helix);
        attach(&helix, "on on_save {\n    print(\"saved \" + slot)\n}");

        let bus = helix.event_bus();
        bus.post(Save {
            slot: "alpha".to_string(),
        });
        assert!(output.lines().is_empty());
        assert_eq!(bus.process_pending(), 1);
        assert_eq!(output.lines(), vec!["saved alpha".to_string()]);
    }

    #[test]
    fn test_unmatched_events_are_dropped() {
        let helix = engine();
        let (_, output) = game(&helix);
        attach(&helix, "on on_save {\n    print(slot)\n}");
        helix.event_bus().post(Entity { id: 1 });
        assert_eq!(helix.event_bus().process_pending(), 1);
        assert!(output.lines().is_empty());
    }

    #[test]
    fn test_listeners_run_in_attach_order() {
        let helix = engine();
        let (_, output) = game(&helix);
        attach(
            &helix,
            "on on_save {\n    print(\"first\")\n}\non on_save {\n    print(\"second\")\n}",
        );
        attach(&helix, "on on_save {\n    print(\"third\")\n}");
        helix.event_bus().post(Save {
            slot: String::new(),
        });
        helix.event_bus().process_pending();
        assert_eq!(output.lines(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_handler_can_veto() {
        let helix = engine();
        let root = module(&helix, "game");
        let output = register_print(&root);
        root.trigger("on_save", |save: &Save, _: &mut Dictionary| save.slot != "locked")
            .unwrap();
        attach(&helix, "on on_save {\n    print(\"ran\")\n}");

        let bus = helix.event_bus();
        bus.post(Save {
            slot: "locked".to_string(),
        });
        bus.post(Save {
            slot: "open".to_string(),
        });
        assert_eq!(bus.process_pending(), 2);
        assert_eq!(output.lines(), vec!["ran"]);
    }

    #[test]
    fn test_each_listener_gets_a_fresh_dictionary() {
        let helix = engine();
        let (_, output) = game(&helix);
        let faults = collect_faults(&helix);
        attach(
            &helix,
            "on on_save {\n    leftover = 1\n    print(slot)\n}\non on_save {\n    print(\"\" + leftover)\n}",
        );
        helix.event_bus().post(Save {
            slot: "s".to_string(),
        });
        helix.event_bus().process_pending();
        assert_eq!(output.lines(), vec!["s"]);
        let faults = faults.lock().unwrap();
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].kind, FaultKind::Script);
        assert_eq!(faults[0].message, "variable 'leftover' is not defined");
        assert_eq!(faults[0].trigger, "game:on_save");
        assert_eq!(faults[0].script, "listeners.hx");
    }

    #[test]
    fn test_supertype_trigger_accepts_subtypes() {
        let helix = engine();
        let root = module(&helix, "game");
        let output = register_print(&root);
        root.trigger("on_spawn", |entity: &Entity, dict: &mut Dictionary| {
            dict.put("id", entity.id).is_ok()
        })
        .unwrap();
        helix
            .registry()
            .declare_supertype::<Npc, Entity>(|npc| &npc.entity);
        attach(&helix, "on on_spawn {\n    print(\"spawned \" + id)\n}");

        let bus = helix.event_bus();
        bus.post(Entity { id: 1 });
        bus.post(Npc {
            entity: Entity { id: 2 },
        });
        bus.process_pending();
        assert_eq!(output.lines(), vec!["spawned 1", "spawned 2"]);
    }

    #[test]
    fn test_listener_may_call_script_functions() {
        let helix = engine();
        let (_, output) = game(&helix);
        attach(
            &helix,
            "func label(s) {\n    return \"[\" + s + \"]\"\n}\non on_save {\n    print(label(slot))\n}",
        );
        helix.event_bus().post(Save {
            slot: "x".to_string(),
        });
        helix.event_bus().process_pending();
        assert_eq!(output.lines(), vec!["[x]"]);
    }

    #[test]
    fn test_panicking_handler_is_reported() {
        let helix = engine();
        let root = module(&helix, "game");
        let output = register_print(&root);
        root.trigger("on_save", |_: &Save, _: &mut Dictionary| -> bool {
            panic!("handler bug")
        })
        .unwrap();
        let faults = collect_faults(&helix);
        attach(&helix, "on on_save {\n    print(\"ran\")\n}");
        helix.event_bus().post(Save {
            slot: String::new(),
        });
        helix.event_bus().process_pending();
        assert!(output.lines().is_empty());
        let faults = faults.lock().unwrap();
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].kind, FaultKind::Panic);
        assert_eq!(faults[0].message, "trigger handler panicked");
    }

    #[test]
    fn test_run_timeout_cancels_listener() {
        let mut config = EngineConfig::default();
        config.engine.run_timeout_ms = Some(20);
        let helix = Helix::new(config).unwrap();
        let root = module(&helix, "game");
        let tick = root.simple_trigger("tick", |_| true).unwrap();
        let faults = collect_faults(&helix);
        attach(&helix, "on tick {\n    while true {\n    }\n}");

        helix.event_bus().post_to(&tick, Value::Null).unwrap();
        helix.event_bus().process_pending();
        let faults = faults.lock().unwrap();
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].kind, FaultKind::Cancelled);
    }
}

// ============================================================================
// Direct posts
// ============================================================================

mod direct {
    use super::*;

    #[test]
    fn test_simple_trigger() {
        let helix = engine();
        let root = module(&helix, "game");
        let output = register_print(&root);
        let reload = root
            .simple_trigger("on_reload", |dict| dict.put("reason", "manual").is_ok())
            .unwrap();
        assert_eq!(reload.path(), "game:on_reload");
        attach(&helix, "on on_reload {\n    print(reason)\n}");

        helix.event_bus().post_to(&reload, Value::Null).unwrap();
        helix.event_bus().process_pending();
        assert_eq!(output.lines(), vec!["manual"]);
    }

    #[test]
    fn test_direct_post_with_object() {
        let helix = engine();
        let (root, output) = game(&helix);
        let autosave = root
            .trigger("on_autosave", |save: &Save, dict: &mut Dictionary| {
                dict.put("slot", save.slot.as_str()).is_ok()
            })
            .unwrap();
        attach(
            &helix,
            "on on_save {\n    print(\"save\")\n}\non on_autosave {\n    print(\"auto \" + slot)\n}",
        );
        helix
            .event_bus()
            .post_to(
                &autosave,
                Value::object(Save {
                    slot: "b".to_string(),
                }),
            )
            .unwrap();
        helix.event_bus().process_pending();
        assert_eq!(output.lines(), vec!["auto b"]);
    }

    #[test]
    fn test_post_errors() {
        let helix = engine();
        let root = module(&helix, "game");
        let on_save = root
            .trigger("on_save", |_: &Save, _: &mut Dictionary| true)
            .unwrap();
        let tick = root.namespace("clock").unwrap().simple_trigger("tick", |_| true).unwrap();
        assert_eq!(tick.path(), "game:clock.tick");

        let bus = helix.event_bus();
        assert_eq!(
            bus.post_to(&on_save, Value::Null).unwrap_err(),
            PostError::NullValue("game:on_save".to_string())
        );
        assert_eq!(
            bus.post_to(&on_save, Value::object(Entity { id: 1 })).unwrap_err(),
            PostError::TypeMismatch {
                trigger: "game:on_save".to_string(),
                expected: "Save".to_string(),
                actual: "Entity".to_string(),
            }
        );
        let err = bus.post_to(&tick, Value::Int(3)).unwrap_err();
        assert_eq!(err.to_string(), "trigger 'game:clock.tick' expects no value, got int");
        assert_eq!(bus.process_pending(), 0);
    }
}

// ============================================================================
// Trigger types
// ============================================================================

mod trigger_types {
    use super::*;

    static REGISTERED: AtomicUsize = AtomicUsize::new(0);
    static UNREGISTERED: AtomicUsize = AtomicUsize::new(0);

    /// Fires every `seconds`; exposes the interval to the listener.
    struct Every {
        seconds: i64,
    }

    impl Trigger for Every {
        type Value = ();

        fn params() -> Vec<Param> {
            vec![Param::new("seconds", Kind::Int).not_null()]
        }

        fn new(args: &Args<'_>) -> Result<Self, ScriptError> {
            let seconds: i64 = args.get(0)?;
            if seconds <= 0 {
                return Err(ScriptError::new("interval must be positive"));
            }
            Ok(Every { seconds })
        }

        fn on_listener_register(&self) {
            REGISTERED.fetch_add(1, Ordering::SeqCst);
        }

        fn handle(&self, _: &(), dict: &mut Dictionary) -> bool {
            dict.put("interval", self.seconds).is_ok()
        }

        fn on_listener_unregister(&self) {
            UNREGISTERED.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_trigger_instances_and_hooks() {
        let helix = engine();
        let root = module(&helix, "game");
        let output = register_print(&root);
        let every = root.trigger_type::<Every>("every").unwrap();

        let script = attach(
            &helix,
            "on every(5) {\n    print(\"a\" + interval)\n}\non every(2 * 3) {\n    print(\"b\" + interval)\n}",
        );
        assert_eq!(REGISTERED.load(Ordering::SeqCst), 2);
        assert_eq!(helix.event_bus().listeners_of(&every).len(), 2);

        helix.event_bus().post_to(&every, Value::Null).unwrap();
        helix.event_bus().process_pending();
        assert_eq!(output.lines(), vec!["a5", "b6"]);

        assert_eq!(helix.event_bus().detach_script(&script), 2);
        assert_eq!(UNREGISTERED.load(Ordering::SeqCst), 2);
        assert!(helix.event_bus().listeners_of(&every).is_empty());
    }

    #[test]
    fn test_trigger_arguments_are_checked() {
        let helix = engine();
        let root = module(&helix, "game");
        root.trigger_type::<Every>("every").unwrap();
        root.simple_trigger("tick", |_| true).unwrap();

        let error = helix.parser().parse_str("on every() {\n}").unwrap_err();
        assert_eq!(error.line_nr(), 1);
        let error = helix.parser().parse_str("on tick(1) {\n}").unwrap_err();
        assert_eq!(error.reason(), "trigger 'game:tick' takes no arguments");
        let error = helix.parser().parse_str("x = 1\non x {\n}").unwrap_err();
        assert_eq!(error.reason(), "'x' is not a trigger");
    }

    #[test]
    fn test_failed_construction_attaches_nothing() {
        let helix = engine();
        let root = module(&helix, "game");
        root.trigger_type::<Every>("every").unwrap();
        root.simple_trigger("tick", |_| true).unwrap();
        let script = helix
            .parser()
            .parse_str("on tick {\n}\non every(0) {\n}")
            .unwrap();
        let err = helix.event_bus().attach(&script).unwrap_err();
        assert_eq!(
            err.as_script_error().unwrap().message(),
            "interval must be positive"
        );
        assert_eq!(helix.event_bus().listener_count(), 0);
    }
}

// ============================================================================
// Attachment
// ============================================================================

mod attachment {
    use super::*;

    #[test]
    fn test_detach_single_listener() {
        let helix = engine();
        let (_, output) = game(&helix);
        let (_, ids) = helix
            .load_script(&StringSource::new(
                "on on_save {\n    print(\"one\")\n}\non on_save {\n    print(\"two\")\n}",
            ))
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(helix.event_bus().listener_count(), 2);

        assert!(helix.event_bus().detach(ids[0]));
        assert!(!helix.event_bus().detach(ids[0]));
        helix.event_bus().post(Save {
            slot: String::new(),
        });
        helix.event_bus().process_pending();
        assert_eq!(output.lines(), vec!["two"]);
    }

    #[test]
    fn test_top_level_runs_separately() {
        let helix = engine();
        let (_, output) = game(&helix);
        let script = attach(&helix, "print(\"top\")\non on_save {\n    print(\"listener\")\n}");
        assert!(output.lines().is_empty());
        script.run().unwrap();
        assert_eq!(output.lines(), vec!["top"]);
    }

    #[test]
    fn test_attach_checks_the_registry() {
        let helix = engine();
        game(&helix);
        let other = engine();
        game(&other);
        let script = other.parser().parse_str("on on_save {\n}").unwrap();
        let err = helix.event_bus().attach(&script).unwrap_err();
        assert!(matches!(err, RunError::Internal(_)));
        assert_eq!(helix.event_bus().listener_count(), 0);
    }

    #[test]
    fn test_failed_module_triggers_are_unreachable() {
        struct Failing;

        impl helix::Module for Failing {
            fn id(&self) -> &str {
                "failing"
            }

            fn load(&self, root: &Namespace) -> Result<(), helix::RegistrationError> {
                root.simple_trigger("never", |_| true)?;
                root.namespace("bad name")?;
                Ok(())
            }
        }

        let helix = engine();
        assert!(helix.load_module(&Failing).is_err());
        let error = helix.parser().parse_str("on never {\n}").unwrap_err();
        assert!(error.reason().contains("never"));
    }
}

// ============================================================================
// Asynchronous listeners
// ============================================================================

mod asynchronous {
    use super::*;

    struct Probe;

    /// `game` module with `mark()`, recording the calling thread, and a
    /// main-thread-only `main_only()`.
    fn threads(helix: &Helix) -> (Namespace, Arc<Mutex<Vec<thread::ThreadId>>>) {
        let root = module(helix, "game");
        let seen = Arc::new(Mutex::new(vec![]));
        let sink = seen.clone();
        root.method(BindingTarget::new("mark").returns(Kind::Void), move |_| {
            sink.lock().unwrap().push(thread::current().id());
            Ok(())
        })
        .unwrap();
        root.method(
            BindingTarget::new("main_only").returns(Kind::Void).not_async(),
            |_| Ok(()),
        )
        .unwrap();
        (root, seen)
    }

    fn fire(helix: &Helix, trigger: &helix::TriggerRef) {
        let bus = helix.event_bus();
        bus.post_to(trigger, Value::Null).unwrap();
        bus.process_pending();
        assert!(bus.wait_idle(Duration::from_secs(5)));
    }

    #[test]
    fn test_async_listener_runs_on_a_worker() {
        let helix = engine();
        let (root, seen) = threads(&helix);
        let tick = root.simple_trigger("tick", |_| true).unwrap();
        tick.allow_async();
        attach(&helix, "on tick {\n    mark()\n}");

        fire(&helix, &tick);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_ne!(seen[0], thread::current().id());
    }

    #[test]
    fn test_listeners_are_synchronous_by_default() {
        let helix = engine();
        let (root, seen) = threads(&helix);
        let tick = root.simple_trigger("tick", |_| true).unwrap();
        attach(&helix, "on tick {\n    mark()\n}");

        fire(&helix, &tick);
        assert_eq!(*seen.lock().unwrap(), vec![thread::current().id()]);
    }

    #[test]
    fn test_not_async_call_keeps_listener_on_main_thread() {
        let helix = engine();
        let (root, seen) = threads(&helix);
        let tick = root.simple_trigger("tick", |_| true).unwrap();
        tick.allow_async();
        attach(
            &helix,
            "func guarded() {\n    main_only()\n}\nfunc outer() {\n    guarded()\n}\non tick {\n    mark()\n}\non tick {\n    outer()\n    mark()\n}",
        );

        fire(&helix, &tick);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen.contains(&thread::current().id()));
        assert!(seen.iter().any(|id| *id != thread::current().id()));
    }

    #[test]
    fn test_not_async_instance_method_fails_on_worker() {
        let helix = engine();
        let root = module(&helix, "game");
        root.register_type::<Probe>()
            .unwrap()
            .method(
                BindingTarget::new("touch").returns(Kind::Void).not_async(),
                |_: &Probe, _| Ok(()),
            )
            .unwrap();
        let tick = root
            .simple_trigger("tick", |dict| dict.put("probe", Value::object(Probe)).is_ok())
            .unwrap();
        tick.allow_async();
        let faults = collect_faults(&helix);
        attach(&helix, "on tick {\n    probe.touch()\n}");

        fire(&helix, &tick);
        let faults = faults.lock().unwrap();
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].kind, FaultKind::Script);
        assert_eq!(faults[0].message, "'touch' cannot be called asynchronously");
    }

    #[test]
    fn test_async_flag_is_read_when_parsing() {
        let helix = engine();
        let (root, seen) = threads(&helix);
        let tick = root.simple_trigger("tick", |_| true).unwrap();
        attach(&helix, "on tick {\n    mark()\n}");
        tick.allow_async();

        fire(&helix, &tick);
        assert_eq!(*seen.lock().unwrap(), vec![thread::current().id()]);
    }
}
