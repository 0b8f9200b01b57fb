//! In-memory [`Namespace`] used by command tests.
//!
//! Association traversal is derived from the stored association instances:
//! an association is any instance carrying reference properties, and its
//! other references are the associators of each referenced object.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

use serde_json::{Map, Value, json};

use super::{Instance, MethodResult, Namespace, ObjectPath};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct Call {
    pub path: ObjectPath,
    pub method: String,
    pub params: Map<String, Value>,
}

#[derive(Default)]
pub struct MemoryNamespace {
    store: RefCell<Vec<Instance>>,
    parents: HashMap<String, String>,
    calls: RefCell<Vec<Call>>,
    results: RefCell<HashMap<String, VecDeque<MethodResult>>>,
    deleted: RefCell<Vec<ObjectPath>>,
    created: RefCell<Vec<(String, Map<String, Value>)>>,
    modified: RefCell<Vec<(ObjectPath, Map<String, Value>)>>,
}

pub fn path(class_name: &str, key: &str, value: impl Into<Value>) -> ObjectPath {
    ObjectPath::new("root/cimv2", class_name).with_key(key, value)
}

fn same_object(a: &ObjectPath, b: &ObjectPath) -> bool {
    a.class_name == b.class_name && a.keybindings == b.keybindings
}

impl MemoryNamespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, inst: Instance) -> &Self {
        self.store.borrow_mut().push(inst);
        self
    }

    /// Store an association instance linking `left` and `right`.
    pub fn link(&self, assoc_class: &str, left: (&str, &ObjectPath), right: (&str, &ObjectPath)) {
        let key = format!("{}|{}", left.1, right.1);
        let inst = Instance::new(path(assoc_class, "InstanceID", key))
            .with(left.0, left.1.to_value())
            .with(right.0, right.1.to_value());
        self.add(inst);
    }

    /// Register `child` as a subclass of `parent` for enumeration and filtering.
    pub fn subclass(mut self, child: &str, parent: &str) -> Self {
        self.parents.insert(child.to_string(), parent.to_string());
        self
    }

    /// Queue the result of the next call of `method`; unqueued calls return 0.
    pub fn reply(&self, method: &str, result: MethodResult) {
        self.results
            .borrow_mut()
            .entry(method.to_string())
            .or_default()
            .push_back(result);
    }

    pub fn reply_code(&self, method: &str, code: i64) {
        self.reply(
            method,
            MethodResult {
                return_value: json!(code),
                out: Map::new(),
            },
        );
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn calls_of(&self, method: &str) -> Vec<Call> {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    pub fn deleted(&self) -> Vec<ObjectPath> {
        self.deleted.borrow().clone()
    }

    pub fn created(&self) -> Vec<(String, Map<String, Value>)> {
        self.created.borrow().clone()
    }

    pub fn modified(&self) -> Vec<(ObjectPath, Map<String, Value>)> {
        self.modified.borrow().clone()
    }

    fn is_a(&self, class_name: &str, wanted: &str) -> bool {
        let mut current = Some(class_name);
        while let Some(c) = current {
            if c == wanted {
                return true;
            }
            current = self.parents.get(c).map(String::as_str);
        }
        false
    }

    fn lookup(&self, p: &ObjectPath) -> Option<Instance> {
        self.store
            .borrow()
            .iter()
            .find(|i| same_object(&i.path, p))
            .cloned()
    }

    fn refs_of(inst: &Instance) -> Vec<(String, ObjectPath)> {
        inst.properties
            .iter()
            .filter_map(|(k, v)| ObjectPath::from_value(v).map(|p| (k.clone(), p)))
            .collect()
    }
}

impl Namespace for MemoryNamespace {
    fn name(&self) -> &str {
        "root/cimv2"
    }

    fn instances(&self, class_name: &str) -> Result<Vec<Instance>> {
        Ok(self
            .store
            .borrow()
            .iter()
            .filter(|i| self.is_a(i.class_name(), class_name))
            .cloned()
            .collect())
    }

    fn get_instance(&self, p: &ObjectPath) -> Result<Instance> {
        self.lookup(p)
            .ok_or_else(|| Error::failed(format!("GetInstance: CIM_ERR_NOT_FOUND: {p}")))
    }

    fn associators(
        &self,
        p: &ObjectPath,
        assoc_class: Option<&str>,
        result_class: Option<&str>,
    ) -> Result<Vec<Instance>> {
        let assocs: Vec<Instance> = self
            .store
            .borrow()
            .iter()
            .filter(|a| assoc_class.is_none_or(|c| self.is_a(a.class_name(), c)))
            .cloned()
            .collect();
        let mut out = Vec::new();
        for assoc in assocs {
            let refs = Self::refs_of(&assoc);
            if !refs.iter().any(|(_, r)| same_object(r, p)) {
                continue;
            }
            for (_, other) in refs.iter().filter(|(_, r)| !same_object(r, p)) {
                if let Some(inst) = self.lookup(other)
                    && result_class.is_none_or(|c| self.is_a(inst.class_name(), c))
                {
                    out.push(inst);
                }
            }
        }
        Ok(out)
    }

    fn references(&self, p: &ObjectPath, result_class: Option<&str>) -> Result<Vec<Instance>> {
        Ok(self
            .store
            .borrow()
            .iter()
            .filter(|a| result_class.is_none_or(|c| self.is_a(a.class_name(), c)))
            .filter(|a| Self::refs_of(a).iter().any(|(_, r)| same_object(r, p)))
            .cloned()
            .collect())
    }

    fn invoke_method(
        &self,
        p: &ObjectPath,
        method: &str,
        params: Map<String, Value>,
    ) -> Result<MethodResult> {
        self.calls.borrow_mut().push(Call {
            path: p.clone(),
            method: method.to_string(),
            params,
        });
        Ok(self
            .results
            .borrow_mut()
            .get_mut(method)
            .and_then(VecDeque::pop_front)
            .unwrap_or(MethodResult {
                return_value: json!(0),
                out: Map::new(),
            }))
    }

    fn create_instance(
        &self,
        class_name: &str,
        properties: Map<String, Value>,
    ) -> Result<ObjectPath> {
        let created = ObjectPath::new("root/cimv2", class_name)
            .with_key("InstanceID", format!("created-{}", self.created.borrow().len()));
        let mut inst = Instance::new(created.clone());
        inst.properties = properties.clone();
        self.store.borrow_mut().push(inst);
        self.created
            .borrow_mut()
            .push((class_name.to_string(), properties));
        Ok(created)
    }

    fn modify_instance(&self, p: &ObjectPath, properties: Map<String, Value>) -> Result<()> {
        let mut store = self.store.borrow_mut();
        let inst = store
            .iter_mut()
            .find(|i| same_object(&i.path, p))
            .ok_or_else(|| Error::failed(format!("ModifyInstance: CIM_ERR_NOT_FOUND: {p}")))?;
        for (k, v) in &properties {
            inst.properties.insert(k.clone(), v.clone());
        }
        self.modified.borrow_mut().push((p.clone(), properties));
        Ok(())
    }

    fn delete_instance(&self, p: &ObjectPath) -> Result<()> {
        let mut store = self.store.borrow_mut();
        let before = store.len();
        store.retain(|i| !same_object(&i.path, p));
        if store.len() == before {
            return Err(Error::failed(format!(
                "DeleteInstance: CIM_ERR_NOT_FOUND: {p}"
            )));
        }
        self.deleted.borrow_mut().push(p.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn associators_follow_association_instances() {
        let ns = MemoryNamespace::new();
        let group = path("LMI_Group", "Name", "wheel");
        let ident = path("LMI_Identity", "InstanceID", "LMI:UID:1000");
        ns.add(Instance::new(group.clone()).with("Name", "wheel"));
        ns.add(Instance::new(ident.clone()).with("InstanceID", "LMI:UID:1000"));
        ns.link("LMI_MemberOfGroup", ("Member", &ident), ("Collection", &group));

        let members = ns
            .associators(&group, Some("LMI_MemberOfGroup"), Some("LMI_Identity"))
            .unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].path, ident);

        let refs = ns.references(&ident, Some("LMI_MemberOfGroup")).unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].reference("Collection"), Some(group));
    }

    #[test]
    fn enumeration_includes_subclasses() {
        let ns = MemoryNamespace::new().subclass("LMI_DiskPartition", "CIM_GenericDiskPartition");
        ns.add(Instance::new(path("LMI_DiskPartition", "DeviceID", "sda1")));
        assert_eq!(ns.instances("CIM_GenericDiskPartition").unwrap().len(), 1);
        assert!(ns.instances("LMI_Account").unwrap().is_empty());
    }

    #[test]
    fn queued_results_are_consumed_in_order() {
        let ns = MemoryNamespace::new();
        ns.reply_code("DeleteUser", 2);
        let p = path("LMI_Account", "Name", "x");
        assert_eq!(ns.invoke_method(&p, "DeleteUser", Map::new()).unwrap().code(), 2);
        assert_eq!(ns.invoke_method(&p, "DeleteUser", Map::new()).unwrap().code(), 0);
        assert_eq!(ns.calls_of("DeleteUser").len(), 2);
    }
}
