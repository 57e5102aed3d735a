//! An in-memory object model for unit tests.

use std::collections::HashMap;
use std::mem;
use std::sync::Mutex;

use crate::{FinalizationCallback, ObjectId, ObjectModel};

struct FakeObject {
    type_name: String,
    ref_count: u32,
    watchers: Vec<FinalizationCallback>,
}

#[derive(Default)]
struct FakeState {
    objects: HashMap<ObjectId, FakeObject>,
    next_address: usize,
    create_calls: usize,
}

/// What to create: the type name and, optionally, the address to place the object at.
pub(crate) struct FakeCreate {
    pub(crate) type_name: &'static str,
    pub(crate) address: Option<usize>,
}

impl FakeCreate {
    pub(crate) fn of(type_name: &'static str) -> Self {
        Self {
            type_name,
            address: None,
        }
    }

    pub(crate) fn at(type_name: &'static str, address: usize) -> Self {
        Self {
            type_name,
            address: Some(address),
        }
    }
}

/// Objects start with a reference count of one and are finalized synchronously, on the
/// decrementing thread, when the count drops to zero.
#[derive(Default)]
pub(crate) struct FakeObjectModel {
    state: Mutex<FakeState>,
}

impl FakeObjectModel {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                next_address: 0x1000,
                ..FakeState::default()
            }),
        }
    }

    pub(crate) fn create_calls(&self) -> usize {
        self.state.lock().unwrap().create_calls
    }
}

impl ObjectModel for FakeObjectModel {
    type CreateArgs = FakeCreate;

    fn create(&self, args: FakeCreate) -> ObjectId {
        let mut state = self.state.lock().unwrap();
        state.create_calls += 1;

        let address = args.address.unwrap_or_else(|| {
            let address = state.next_address;
            state.next_address += 0x10;
            address
        });

        let object = ObjectId::new(address);
        let previous = state.objects.insert(
            object,
            FakeObject {
                type_name: args.type_name.to_string(),
                ref_count: 1,
                watchers: Vec::new(),
            },
        );
        assert!(previous.is_none(), "address {object} is still in use");

        object
    }

    fn increment(&self, object: ObjectId) -> ObjectId {
        let mut state = self.state.lock().unwrap();
        let target = state.objects.get_mut(&object).expect("increment of dead object");
        target.ref_count += 1;
        object
    }

    fn decrement(&self, object: ObjectId) {
        let watchers = {
            let mut state = self.state.lock().unwrap();
            let target = state.objects.get_mut(&object).expect("decrement of dead object");
            target.ref_count -= 1;

            if target.ref_count > 0 {
                return;
            }

            let watchers = mem::take(&mut target.watchers);
            state.objects.remove(&object);
            watchers
        };

        for watcher in watchers {
            watcher(object);
        }
    }

    fn ref_count(&self, object: ObjectId) -> u32 {
        self.state
            .lock()
            .unwrap()
            .objects
            .get(&object)
            .map_or(0, |o| o.ref_count)
    }

    fn type_name(&self, object: ObjectId) -> String {
        self.state
            .lock()
            .unwrap()
            .objects
            .get(&object)
            .map_or_else(String::new, |o| o.type_name.clone())
    }

    fn watch_finalization(&self, object: ObjectId, callback: FinalizationCallback) {
        self.state
            .lock()
            .unwrap()
            .objects
            .get_mut(&object)
            .expect("watching dead object")
            .watchers
            .push(callback);
    }
}
