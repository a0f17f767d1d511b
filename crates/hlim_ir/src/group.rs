//! Hierarchical node groups.
//!
//! Groups form a single-rooted tree per circuit. Each group lists the nodes
//! it owns and its child groups; the parent link is a plain ID.

use crate::circuit::Circuit;
use crate::error::IrError;
use crate::ids::{GroupId, NodeId};
use serde::{Deserialize, Serialize};

/// The role of a group in the design hierarchy.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum GroupKind {
    /// The top of the tree.
    Root,
    /// A design entity, exported as its own module.
    Entity,
    /// A named area inside an entity.
    Area,
    /// An inferred functional unit such as a memory or arithmetic block.
    FunctionalUnit,
}

/// A node in the group tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeGroup {
    pub(crate) id: GroupId,
    pub(crate) name: String,
    pub(crate) instance_name: String,
    pub(crate) comment: String,
    pub(crate) kind: GroupKind,
    pub(crate) parent: Option<GroupId>,
    pub(crate) children: Vec<GroupId>,
    pub(crate) nodes: Vec<NodeId>,
}

impl NodeGroup {
    /// This group's ID.
    pub fn id(&self) -> GroupId {
        self.id
    }

    /// The group name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The instance name, defaulting to the group name.
    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    /// The group comment.
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// The group kind.
    pub fn kind(&self) -> GroupKind {
        self.kind
    }

    /// The parent group, `None` for the root.
    pub fn parent(&self) -> Option<GroupId> {
        self.parent
    }

    /// Child groups in creation order.
    pub fn children(&self) -> &[GroupId] {
        &self.children
    }

    /// Nodes owned directly by this group.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }
}

impl Circuit {
    pub(crate) fn new_group(
        &mut self,
        parent: Option<GroupId>,
        kind: GroupKind,
        name: &str,
    ) -> GroupId {
        self.groups.alloc_with(|id| NodeGroup {
            id,
            name: name.to_string(),
            instance_name: name.to_string(),
            comment: String::new(),
            kind,
            parent,
            children: Vec::new(),
            nodes: Vec::new(),
        })
    }

    /// The root group.
    pub fn root_group(&self) -> GroupId {
        self.root
    }

    /// Returns the group, or an error for an unknown ID.
    pub fn try_group(&self, id: GroupId) -> Result<&NodeGroup, IrError> {
        self.groups.try_get(id).ok_or(IrError::UnknownGroup(id))
    }

    /// Returns the group.
    ///
    /// # Panics
    ///
    /// Panics for an unknown ID.
    pub fn group(&self, id: GroupId) -> &NodeGroup {
        &self.groups[id]
    }

    /// Creates a child group below `parent`.
    pub fn add_child_group(
        &mut self,
        parent: GroupId,
        kind: GroupKind,
        name: &str,
    ) -> Result<GroupId, IrError> {
        self.try_group(parent)?;
        let id = self.new_group(Some(parent), kind, name);
        self.groups[parent].children.push(id);
        Ok(id)
    }

    /// Sets the instance name of a group.
    pub fn set_instance_name(&mut self, id: GroupId, name: &str) -> Result<(), IrError> {
        self.groups
            .try_get_mut(id)
            .ok_or(IrError::UnknownGroup(id))?
            .instance_name = name.to_string();
        Ok(())
    }

    /// Sets the comment of a group.
    pub fn set_group_comment(&mut self, id: GroupId, comment: &str) -> Result<(), IrError> {
        self.groups
            .try_get_mut(id)
            .ok_or(IrError::UnknownGroup(id))?
            .comment = comment.to_string();
        Ok(())
    }

    /// Finds a direct child by name.
    pub fn find_child(&self, parent: GroupId, name: &str) -> Option<GroupId> {
        self.groups
            .try_get(parent)?
            .children
            .iter()
            .copied()
            .find(|c| self.groups[*c].name == name)
    }

    /// Returns `true` if `group` lies strictly below `ancestor`.
    pub fn is_child_of(&self, group: GroupId, ancestor: GroupId) -> bool {
        let mut current = self.groups.try_get(group).and_then(|g| g.parent);
        while let Some(g) = current {
            if g == ancestor {
                return true;
            }
            current = self.groups[g].parent;
        }
        false
    }

    /// Dot-joined instance names from below the root down to `group`.
    pub fn instance_path(&self, group: GroupId) -> String {
        let mut parts = Vec::new();
        let mut current = Some(group);
        while let Some(g) = current {
            let entry = &self.groups[g];
            if entry.parent.is_some() {
                parts.push(entry.instance_name.as_str());
            }
            current = entry.parent;
        }
        parts.reverse();
        parts.join(".")
    }

    /// Returns `true` if the group owns no nodes, optionally counting descendants.
    pub fn group_is_empty(&self, group: GroupId, recursive: bool) -> bool {
        let entry = &self.groups[group];
        if !entry.nodes.is_empty() {
            return false;
        }
        !recursive || entry.children.iter().all(|c| self.group_is_empty(*c, true))
    }

    /// Moves a group below a new parent.
    pub fn reparent_group(&mut self, group: GroupId, new_parent: GroupId) -> Result<(), IrError> {
        self.try_group(group)?;
        self.try_group(new_parent)?;
        if group == new_parent || self.is_child_of(new_parent, group) || group == self.root {
            return Err(IrError::GroupCycle {
                group,
                target: new_parent,
            });
        }
        if let Some(old) = self.groups[group].parent {
            self.groups[old].children.retain(|c| *c != group);
        }
        self.groups[group].parent = Some(new_parent);
        self.groups[new_parent].children.push(group);
        Ok(())
    }

    /// Moves a node into another group.
    pub fn move_to_group(&mut self, node: NodeId, group: GroupId) -> Result<(), IrError> {
        self.try_group(group)?;
        let old = self.try_node(node)?.group;
        self.groups[old].nodes.retain(|n| *n != node);
        self.groups[group].nodes.push(node);
        self.nodes[node].group = group;
        Ok(())
    }
}
