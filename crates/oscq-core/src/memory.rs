//! A self-contained target graph backed by plain in-process storage.
//!
//! Useful for hosts that do not have an object model of their own, for the
//! demo server, and for tests.

use crate::binding::{BindableTarget, BindingError, BindingProvider, MemberAccess, MemberInfo};
use crate::value::{Value, ValueType};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Storage for one member.
pub struct MemoryMember {
    value: Mutex<Option<Value>>,
    invocations: AtomicU64,
}

impl MemoryMember {
    fn new(initial: Option<Value>) -> Self {
        Self {
            value: Mutex::new(initial),
            invocations: AtomicU64::new(0),
        }
    }

    pub fn value(&self) -> Option<Value> {
        self.value.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn store(&self, value: Value) {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
    }

    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::Acquire)
    }
}

impl MemberAccess for MemoryMember {
    fn get(&self) -> Option<Value> {
        self.value()
    }

    fn set(&self, value: Value) -> Result<(), BindingError> {
        self.store(value);
        Ok(())
    }

    fn invoke(&self) -> Result<(), BindingError> {
        self.invocations.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}

struct Slot {
    info: MemberInfo,
    member: Arc<MemoryMember>,
}

/// A component with a fixed, ordered member list.
pub struct MemoryComponent {
    type_name: String,
    slots: Vec<Slot>,
}

impl MemoryComponent {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            slots: Vec::new(),
        }
    }

    fn with_slot(mut self, info: MemberInfo, initial: Option<Value>) -> Self {
        self.slots.push(Slot {
            info,
            member: Arc::new(MemoryMember::new(initial)),
        });
        self
    }

    /// Read-write member.
    pub fn field(self, name: &str, ty: ValueType, initial: Value) -> Self {
        self.with_slot(MemberInfo::field(name, ty), Some(initial))
    }

    /// Read-write float with a declared range.
    pub fn ranged(self, name: &str, initial: f32, min: f32, max: f32) -> Self {
        let info = MemberInfo::field(name, ValueType::Float).with_range(min, max);
        self.with_slot(info, Some(Value::Float(initial)))
    }

    pub fn read_only(self, name: &str, ty: ValueType, initial: Value) -> Self {
        self.with_slot(MemberInfo::property(name, ty, true, false), Some(initial))
    }

    pub fn write_only(self, name: &str, ty: ValueType) -> Self {
        self.with_slot(MemberInfo::property(name, ty, false, true), None)
    }

    pub fn enum_field(self, name: &str, names: &[&str], initial: &str) -> Self {
        let ty = ValueType::enumeration(names.iter().copied());
        self.with_slot(MemberInfo::field(name, ty), Some(Value::Enum(initial.to_string())))
    }

    /// Zero-argument action; each invoke bumps a counter.
    pub fn action(self, name: &str) -> Self {
        self.with_slot(MemberInfo::action(name), None)
    }

    /// A member the engine has no mapping for.
    pub fn unsupported(self, name: &str, type_name: &str) -> Self {
        self.with_slot(MemberInfo::unsupported(name, type_name), None)
    }

    pub fn member(&self, name: &str) -> Option<&Arc<MemoryMember>> {
        self.slots.iter().find(|s| s.info.name == name).map(|s| &s.member)
    }

    pub fn value(&self, name: &str) -> Option<Value> {
        self.member(name).and_then(|m| m.value())
    }

    /// Host-side write, bypassing the binding's access rules.
    pub fn set_value(&self, name: &str, value: Value) -> bool {
        match self.member(name) {
            Some(member) => {
                member.store(value);
                true
            }
            None => false,
        }
    }

    pub fn invocations(&self, name: &str) -> u64 {
        self.member(name).map_or(0, |m| m.invocations())
    }
}

impl BindingProvider for MemoryComponent {
    fn type_name(&self) -> String {
        self.type_name.clone()
    }

    fn enumerate(&self) -> Vec<MemberInfo> {
        self.slots.iter().map(|s| s.info.clone()).collect()
    }

    fn bind(&self, member: &str) -> Option<Arc<dyn MemberAccess>> {
        let member = self.member(member)?;
        Some(Arc::clone(member) as Arc<dyn MemberAccess>)
    }
}

/// A named object holding child objects and components.
pub struct MemoryObject {
    name: String,
    children: RwLock<Vec<Arc<MemoryObject>>>,
    components: RwLock<Vec<Arc<MemoryComponent>>>,
    alive: AtomicBool,
}

impl MemoryObject {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            children: RwLock::new(Vec::new()),
            components: RwLock::new(Vec::new()),
            alive: AtomicBool::new(true),
        })
    }

    pub fn add_child(&self, child: Arc<MemoryObject>) -> &Self {
        self.children.write().unwrap_or_else(PoisonError::into_inner).push(child);
        self
    }

    pub fn add_component(&self, component: MemoryComponent) -> Arc<MemoryComponent> {
        let component = Arc::new(component);
        self.components
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&component));
        component
    }

    /// Drops the child with this name. Returns whether one was found.
    pub fn remove_child(&self, name: &str) -> bool {
        let mut children = self.children.write().unwrap_or_else(PoisonError::into_inner);
        let before = children.len();
        children.retain(|c| c.name != name);
        children.len() != before
    }

    /// Marks the object destroyed. Snapshots built afterwards leave it out.
    pub fn destroy(&self) {
        self.alive.store(false, Ordering::Release);
    }
}

impl BindableTarget for MemoryObject {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn children(&self) -> Vec<Arc<dyn BindableTarget>> {
        self.children
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|c| Arc::clone(c) as Arc<dyn BindableTarget>)
            .collect()
    }

    fn components(&self) -> Vec<Arc<dyn BindingProvider>> {
        self.components
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|c| Arc::clone(c) as Arc<dyn BindingProvider>)
            .collect()
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }
}
