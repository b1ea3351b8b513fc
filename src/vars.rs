// ABOUTME: Hierarchically scoped variable bag shared between tasks
// ABOUTME: Child scopes read through to ancestors but only write into their own layer

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A handle to one scope of the variable bag.
///
/// Cloning the handle shares the scope. Lookups resolve nearest scope first;
/// writes only ever touch the local layer. A parent never sees a child's
/// bindings until [`Variables::merge`] copies them upward.
#[derive(Clone)]
pub struct Variables {
    scope: Arc<Scope>,
}

struct Scope {
    parent: Option<Variables>,
    layer: RwLock<HashMap<String, Value>>,
}

impl Variables {
    /// Create an empty root scope.
    pub fn new() -> Self {
        Self::with_parent(None)
    }

    /// Create a root scope pre-populated with bindings.
    pub fn from_map(bindings: HashMap<String, Value>) -> Self {
        let vars = Self::new();
        vars.scope.layer.write().extend(bindings);
        vars
    }

    fn with_parent(parent: Option<Variables>) -> Self {
        Self {
            scope: Arc::new(Scope {
                parent,
                layer: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn parent(&self) -> Option<&Variables> {
        self.scope.parent.as_ref()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let mut current = Some(self);
        while let Some(vars) = current {
            if let Some(value) = vars.scope.layer.read().get(key) {
                return Some(value.clone());
            }
            current = vars.parent();
        }
        None
    }

    /// Look up a binding and decode it into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, serde_json::Error> {
        self.get(key).map(serde_json::from_value).transpose()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.scope.layer.write().insert(key.into(), value.into());
    }

    pub fn set_serialized<T: Serialize>(
        &self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(value)?;
        self.set(key, value);
        Ok(())
    }

    pub fn new_child_scope(&self) -> Variables {
        Self::with_parent(Some(self.clone()))
    }

    /// Copy the child's local bindings into this scope; child values win.
    pub fn merge(&self, child: &Variables) {
        if Arc::ptr_eq(&self.scope, &child.scope) {
            return;
        }
        let bindings = child.local_bindings();
        self.scope.layer.write().extend(bindings);
    }

    /// Bindings written directly into this scope.
    pub fn local_bindings(&self) -> HashMap<String, Value> {
        self.scope.layer.read().clone()
    }

    /// Every visible binding, with nearer scopes shadowing ancestors.
    pub fn flatten(&self) -> HashMap<String, Value> {
        let mut chain = Vec::new();
        let mut current = Some(self);
        while let Some(vars) = current {
            chain.push(vars);
            current = vars.parent();
        }

        let mut bindings = HashMap::new();
        for vars in chain.into_iter().rev() {
            bindings.extend(vars.local_bindings());
        }
        bindings
    }
}

impl Default for Variables {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Variables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variables")
            .field("local", &*self.scope.layer.read())
            .field("has_parent", &self.scope.parent.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_is_nearest_scope_first() {
        let root = Variables::new();
        root.set("network", "devnet");
        root.set("height", 1);

        let child = root.new_child_scope();
        child.set("height", 2);

        let grandchild = child.new_child_scope();
        assert_eq!(grandchild.get("height"), Some(json!(2)));
        assert_eq!(grandchild.get("network"), Some(json!("devnet")));
        assert_eq!(grandchild.get("missing"), None);
        assert_eq!(root.get("height"), Some(json!(1)));
    }

    #[test]
    fn test_child_writes_invisible_until_merged() {
        let root = Variables::new();
        let first = root.new_child_scope();
        let second = root.new_child_scope();

        first.set("height", 100);
        assert!(!root.contains("height"));
        assert!(!second.contains("height"));

        root.merge(&first);
        assert_eq!(root.get_as::<u64>("height").unwrap(), Some(100));
        assert_eq!(second.get("height"), Some(json!(100)));
    }

    #[test]
    fn test_merge_is_last_writer_wins() {
        let root = Variables::from_map(HashMap::from([
            ("a".to_string(), json!(1)),
            ("b".to_string(), json!(1)),
        ]));
        let child = root.new_child_scope();
        child.set("b", 2);
        child.set("c", 3);

        root.merge(&child);
        assert_eq!(root.get("a"), Some(json!(1)));
        assert_eq!(root.get("b"), Some(json!(2)));
        assert_eq!(root.get("c"), Some(json!(3)));

        root.merge(&root.clone());
        assert_eq!(root.local_bindings().len(), 3);
    }

    #[test]
    fn test_flatten_and_typed_values() {
        #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
        struct Checkpoint {
            epoch: u64,
            root: String,
        }

        let root = Variables::new();
        root.set("x", "root");
        let child = root.new_child_scope();
        child.set("x", "child");
        child
            .set_serialized(
                "checkpoint",
                &Checkpoint {
                    epoch: 4,
                    root: "0xabc".to_string(),
                },
            )
            .unwrap();

        let flat = child.flatten();
        assert_eq!(flat.get("x"), Some(&json!("child")));

        let checkpoint: Checkpoint = child.get_as("checkpoint").unwrap().unwrap();
        assert_eq!(checkpoint.epoch, 4);
        assert!(child.get_as::<u64>("x").is_err());
    }

    #[test]
    fn test_concurrent_writers_to_one_scope() {
        let vars = Variables::new();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let vars = vars.clone();
                std::thread::spawn(move || {
                    for j in 0..100 {
                        vars.set(format!("k{}_{}", i, j), j);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(vars.local_bindings().len(), 800);
    }
}
