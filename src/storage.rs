// Settings persistence backend.
//
// The settings proxy talks to a flat key-value document through this trait
// so it can run against an in-memory map in tests. Production wraps the
// tauri-plugin-store file (`settings.json`), saving after every write.

use serde_json::Value;
use std::sync::Arc;

use crate::error::Error;

pub trait SettingsBackend: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: &str, value: Value) -> Result<(), Error>;
    fn has(&self, key: &str) -> bool;
}

/// Backend over the tauri-plugin-store settings file.
pub struct TauriStoreBackend {
    store: Arc<tauri_plugin_store::Store<tauri::Wry>>,
}

impl TauriStoreBackend {
    pub fn new(store: Arc<tauri_plugin_store::Store<tauri::Wry>>) -> Self {
        Self { store }
    }
}

impl SettingsBackend for TauriStoreBackend {
    fn get(&self, key: &str) -> Option<Value> {
        self.store.get(key)
    }

    fn set(&self, key: &str, value: Value) -> Result<(), Error> {
        self.store.set(key, value);
        self.store
            .save()
            .map_err(|e| Error::Storage(format!("failed to save {}: {}", key, e)))
    }

    fn has(&self, key: &str) -> bool {
        self.store.has(key)
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory backend; can be switched to fail every write.
    #[derive(Default)]
    pub struct MemoryBackend {
        values: Mutex<HashMap<String, Value>>,
        pub fail_writes: Mutex<bool>,
    }

    impl MemoryBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert(&self, key: &str, value: Value) {
            self.values.lock().unwrap().insert(key.to_string(), value);
        }

        pub fn stored(&self, key: &str) -> Option<Value> {
            self.values.lock().unwrap().get(key).cloned()
        }

        pub fn len(&self) -> usize {
            self.values.lock().unwrap().len()
        }
    }

    impl SettingsBackend for MemoryBackend {
        fn get(&self, key: &str) -> Option<Value> {
            self.values.lock().unwrap().get(key).cloned()
        }

        fn set(&self, key: &str, value: Value) -> Result<(), Error> {
            if *self.fail_writes.lock().unwrap() {
                return Err(Error::Storage(format!("write rejected for {}", key)));
            }
            self.values.lock().unwrap().insert(key.to_string(), value);
            Ok(())
        }

        fn has(&self, key: &str) -> bool {
            self.values.lock().unwrap().contains_key(key)
        }
    }
}
