use crate::binding::{BindableTarget, Binding, BindingProvider, MemberType};
use crate::config::FilterPolicy;
use crate::node::Node;
use crate::snapshot::Snapshot;
use crate::value::ValueType;
use std::collections::HashMap;

/// Guards against cyclic host graphs.
const MAX_DEPTH: usize = 64;

/// Spaces become hyphens, parentheses are dropped.
pub fn sanitize_name(raw: &str) -> String {
    raw.replace(' ', "-").replace(['(', ')'], "")
}

/// Normalises a configured prefix to `""` or `/a/b` form.
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

/// Walks a target graph into a [`Snapshot`].
///
/// Layout is `<object>/<child object>.../<component type>/<member>`. The root
/// target contributes no segment of its own. The walk only reads the graph.
#[derive(Debug, Clone, Default)]
pub struct AddressSpaceBuilder {
    filter: FilterPolicy,
}

impl AddressSpaceBuilder {
    pub fn new(filter: FilterPolicy) -> Self {
        Self { filter }
    }

    pub fn filter(&self) -> &FilterPolicy {
        &self.filter
    }

    pub fn build(&self, target: &dyn BindableTarget, path_prefix: &str) -> Snapshot {
        let prefix = normalize_prefix(path_prefix);
        let mut root = Node::root(prefix.clone());
        let mut bindings = HashMap::new();

        if !target.is_alive() {
            tracing::warn!("Builder: root target is gone, publishing an empty address space");
            return Snapshot::new(root, bindings);
        }

        self.visit_object(target, &mut root, &mut bindings, 0);
        tracing::debug!("Builder: {} bindings under '{}'", bindings.len(), prefix);
        Snapshot::new(root, bindings)
    }

    fn visit_object(
        &self,
        target: &dyn BindableTarget,
        node: &mut Node,
        bindings: &mut HashMap<String, Binding>,
        depth: usize,
    ) {
        if depth >= MAX_DEPTH {
            tracing::warn!("Builder: depth limit reached at {}, not descending", node.path());
            return;
        }

        for child in target.children() {
            let raw = child.name();
            if !child.is_alive() || !self.filter.objects.allows(&raw) {
                continue;
            }
            let name = sanitize_name(&raw);
            if node.child(&name).is_some() {
                tracing::warn!("Builder: duplicate name '{}' under '{}', keeping the first", name, node.path());
                continue;
            }

            let mut child_node = Node::container(name.clone(), format!("{}/{}", node.path(), name));
            self.visit_object(child.as_ref(), &mut child_node, bindings, depth + 1);
            node.push_child(child_node);
        }

        for component in target.components() {
            let raw = component.type_name();
            if !self.filter.components.allows(&raw) {
                continue;
            }
            let name = sanitize_name(&raw);
            if node.child(&name).is_some() {
                tracing::warn!("Builder: duplicate name '{}' under '{}', keeping the first", name, node.path());
                continue;
            }

            let mut component_node = Node::container(name.clone(), format!("{}/{}", node.path(), name));
            self.visit_members(component.as_ref(), &mut component_node, bindings);
            node.push_child(component_node);
        }
    }

    fn visit_members(
        &self,
        component: &dyn BindingProvider,
        node: &mut Node,
        bindings: &mut HashMap<String, Binding>,
    ) {
        for member in component.enumerate() {
            if !self.filter.members.allows(&member.name) {
                continue;
            }
            let Some(kind) = member.kind() else {
                if let MemberType::Unsupported(type_name) = &member.ty {
                    tracing::trace!("Builder: skipping {} of unsupported type {}", member.name, type_name);
                }
                continue;
            };
            let value_type = match member.ty {
                MemberType::Value(ty) => ty,
                MemberType::Action => ValueType::Invoke,
                MemberType::Unsupported(_) => continue,
            };

            let name = sanitize_name(&member.name);
            if node.child(&name).is_some() {
                tracing::warn!("Builder: duplicate member '{}' under '{}', keeping the first", name, node.path());
                continue;
            }
            let Some(access) = component.bind(&member.name) else {
                tracing::debug!("Builder: provider refused to bind {}", member.name);
                continue;
            };

            let path = format!("{}/{}", node.path(), name);
            let binding = Binding::new(path.as_str(), kind, value_type, member.range, access);
            let initial = binding.get();
            bindings.insert(path, binding.clone());
            node.push_child(Node::leaf(name, binding, initial));
        }
    }
}
