//! Tracks a handful of objects in a toy object model and prints what is still alive.
//!
//! Try it with different settings, for example:
//!
//! ```text
//! LOG_FLAGS=all cargo run --example ref_tracker_basic
//! LOG_TYPE=Gadget cargo run --example ref_tracker_basic
//! ```
//!
//! While the example waits at the end, `kill -USR1 <pid>` prints another report.

#![expect(
    clippy::arithmetic_side_effects,
    reason = "this is example code that does not need production-level safety"
)]

use std::collections::HashMap;
use std::process;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use tracing::Level;

use ref_tracker::{
    FinalizationCallback, Interceptor, ObjectId, ObjectModel, Result, Tracker, TrackerBuilder,
    TrackerConfig,
};

struct Toy {
    type_name: &'static str,
    ref_count: u32,
    watchers: Vec<FinalizationCallback>,
}

/// A toy object model: objects live in a map and are finalized when their count hits zero.
#[derive(Default)]
struct Toys {
    state: Mutex<(usize, HashMap<ObjectId, Toy>)>,
}

impl ObjectModel for Toys {
    type CreateArgs = &'static str;

    fn create(&self, type_name: &'static str) -> ObjectId {
        let mut state = self.state.lock().unwrap();
        state.0 += 0x40;

        let object = ObjectId::new(0x10_0000 + state.0);
        state.1.insert(
            object,
            Toy {
                type_name,
                ref_count: 1,
                watchers: Vec::new(),
            },
        );
        object
    }

    fn increment(&self, object: ObjectId) -> ObjectId {
        if let Some(toy) = self.state.lock().unwrap().1.get_mut(&object) {
            toy.ref_count += 1;
        }
        object
    }

    fn decrement(&self, object: ObjectId) {
        let finalized = {
            let mut state = self.state.lock().unwrap();
            let Some(toy) = state.1.get_mut(&object) else {
                return;
            };

            toy.ref_count -= 1;
            if toy.ref_count == 0 {
                state.1.remove(&object)
            } else {
                None
            }
        };

        for watcher in finalized.into_iter().flat_map(|toy| toy.watchers) {
            watcher(object);
        }
    }

    fn ref_count(&self, object: ObjectId) -> u32 {
        self.state
            .lock()
            .unwrap()
            .1
            .get(&object)
            .map_or(0, |toy| toy.ref_count)
    }

    fn type_name(&self, object: ObjectId) -> String {
        self.state
            .lock()
            .unwrap()
            .1
            .get(&object)
            .map_or_else(String::new, |toy| toy.type_name.to_string())
    }

    fn watch_finalization(&self, object: ObjectId, callback: FinalizationCallback) {
        if let Some(toy) = self.state.lock().unwrap().1.get_mut(&object) {
            toy.watchers.push(callback);
        }
    }
}

fn bootstrap() -> Result<TrackerBuilder<Toys>> {
    Ok(Tracker::builder(Toys::default()).config(TrackerConfig::from_env()))
}

static TOYS: Interceptor<Toys> = Interceptor::new(bootstrap);

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .init();

    println!("=== Reference Tracking Example ===\n");

    // A widget that is released properly.
    let widget = TOYS.create("Widget");
    TOYS.increment(widget);
    TOYS.decrement(widget);
    TOYS.decrement(widget);

    // A gadget that leaks one reference.
    let gadget = TOYS.create("Gadget");
    TOYS.increment(gadget);
    TOYS.decrement(gadget);
    TOYS.increment(gadget);

    // A few widgets shared with another thread, which forgets to release one of them.
    let shared: Vec<ObjectId> = (0..3).map(|_| TOYS.create("Widget")).collect();
    thread::scope(|scope| {
        scope.spawn(|| {
            for &object in &shared {
                TOYS.increment(object);
            }
            for &object in shared.iter().skip(1) {
                TOYS.decrement(object);
            }
        });
    });

    TOYS.dump();

    println!();
    println!("Waiting 10 seconds for SIGUSR1 (pid {})...", process::id());
    for _ in 0..10 {
        thread::sleep(Duration::from_secs(1));

        // Any lifecycle operation services a pending report request.
        let heartbeat = TOYS.create("Heartbeat");
        TOYS.decrement(heartbeat);
    }
}
