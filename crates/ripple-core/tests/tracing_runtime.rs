//! Log events emitted by the runtime's guard and reaction loop.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use ripple_core::{Atom, Computed, Reaction, Runtime, RuntimeConfig};
use tracing::Subscriber;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};

struct LevelCapture {
    seen: Arc<Mutex<Vec<(tracing::Level, String)>>>,
}

impl<S> Layer<S> for LevelCapture
where
    S: Subscriber + for<'lookup> tracing_subscriber::registry::LookupSpan<'lookup>,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        struct Msg(Option<String>);
        impl tracing::field::Visit for Msg {
            fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
                if field.name() == "message" {
                    self.0 = Some(value.to_string());
                }
            }

            fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
                if field.name() == "message" {
                    self.0 = Some(format!("{value:?}").trim_matches('"').to_string());
                }
            }
        }
        let mut msg = Msg(None);
        event.record(&mut msg);
        if let Some(message) = msg.0 {
            self.seen
                .lock()
                .expect("capture lock")
                .push((*event.metadata().level(), message));
        }
    }
}

fn with_capture(f: impl FnOnce()) -> Vec<(tracing::Level, String)> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry().with(LevelCapture {
        seen: Arc::clone(&seen),
    });
    tracing::subscriber::with_default(subscriber, f);
    let out = seen.lock().expect("capture lock").clone();
    out
}

#[test]
fn divergent_reactions_log_an_error() {
    let events = with_capture(|| {
        let rt = Runtime::with_config(RuntimeConfig::default().with_max_reaction_iterations(3));
        let atom = Atom::new(&rt, "loop");
        let a = atom.clone();
        let _reaction = Reaction::new(&rt, "self-feeding", move || {
            a.report_observed();
            a.report_changed();
        });
        atom.report_changed();
    });
    assert!(
        events
            .iter()
            .any(|(level, m)| *level == tracing::Level::ERROR && m == "runtime.reactions_diverged"),
        "expected runtime.reactions_diverged error"
    );
}

#[test]
fn guard_rejection_logs_a_warning() {
    let events = with_capture(|| {
        let rt = Runtime::new();
        let rejected = Rc::new(Cell::new(false));
        let flag = Rc::clone(&rejected);
        let inner = rt.clone();
        let checker = Computed::new(&rt, "checker", move || {
            flag.set(inner.check_modification_allowed("state").is_err());
        });
        let () = checker.get();
        assert!(rejected.get());
    });
    assert!(
        events
            .iter()
            .any(|(level, m)| *level == tracing::Level::WARN && m == "runtime.modification_rejected")
    );
}
