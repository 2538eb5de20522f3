//! Group child sets and the dependency closure
//!
//! Every sequence/choice/all particle visited by the resolver gets one
//! [`GroupChildSet`]. Elements found directly in the group are recorded as
//! children immediately; nested groups are recorded as placeholders plus a
//! dependency edge, because the nested group may (transitively) contain the
//! group being built. Once all elements are visited, [`GroupCache::close`]
//! splices resolved sets into their dependents until nothing is left.

use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, debug_span, trace};

use super::SchemaResolver;
use crate::error::{Error, Result};
use crate::namespaces::QName;
use crate::schema::{GroupId, Particle};

/// Entry of a group's member list
#[derive(Debug, Clone, PartialEq, Eq)]
enum Member {
    /// A resolved child element
    Element(QName),
    /// Placeholder for the children of a group not yet resolved
    Group(GroupId),
}

/// Children contributed by one group particle
#[derive(Debug, Clone)]
pub struct GroupChildSet {
    group: GroupId,
    members: Vec<Member>,
    dependencies: IndexSet<GroupId>,
}

impl GroupChildSet {
    /// Create an empty set for a group particle
    pub fn new(group: GroupId) -> Self {
        Self {
            group,
            members: Vec::new(),
            dependencies: IndexSet::new(),
        }
    }

    /// Append a child element unless it is already present
    pub fn push_element(&mut self, name: QName) {
        let member = Member::Element(name);
        if !self.members.contains(&member) {
            self.members.push(member);
        }
    }

    /// Record a dependency on another group at the current position
    pub fn push_dependency(&mut self, group: GroupId) {
        self.members.push(Member::Group(group));
        self.dependencies.insert(group);
    }

    /// Whether all dependencies have been absorbed
    pub fn is_resolved(&self) -> bool {
        self.dependencies.is_empty()
    }

    /// Groups this set still waits for
    pub fn dependencies(&self) -> impl Iterator<Item = GroupId> + '_ {
        self.dependencies.iter().copied()
    }

    /// Child elements resolved so far, in order
    pub fn children(&self) -> impl Iterator<Item = &QName> {
        self.members.iter().filter_map(|m| match m {
            Member::Element(name) => Some(name),
            Member::Group(_) => None,
        })
    }

    /// Replace the placeholders of `dependency` with its children and drop
    /// the edge. Duplicates are removed afterwards, keeping first occurrences.
    pub fn absorb(&mut self, dependency: GroupId, children: &[QName]) {
        let mut seen: IndexSet<QName> = IndexSet::new();
        let mut members = Vec::with_capacity(self.members.len() + children.len());
        for member in self.members.drain(..) {
            match member {
                Member::Group(group) if group == dependency => {
                    for child in children {
                        if seen.insert(child.clone()) {
                            members.push(Member::Element(child.clone()));
                        }
                    }
                }
                Member::Element(name) => {
                    if seen.insert(name.clone()) {
                        members.push(Member::Element(name));
                    }
                }
                placeholder @ Member::Group(_) => members.push(placeholder),
            }
        }
        self.members = members;
        self.dependencies.shift_remove(&dependency);
    }
}

/// Group child sets of one resolution pass, keyed by group particle
#[derive(Debug, Clone, Default)]
pub struct GroupCache {
    sets: IndexMap<GroupId, GroupChildSet>,
}

impl GroupCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a set exists for the group
    pub fn contains(&self, group: GroupId) -> bool {
        self.sets.contains_key(&group)
    }

    /// Register a set
    pub fn insert(&mut self, set: GroupChildSet) {
        self.sets.insert(set.group, set);
    }

    /// Get the set of a group
    pub fn get(&self, group: GroupId) -> Option<&GroupChildSet> {
        self.sets.get(&group)
    }

    /// Get the set of a group mutably
    pub fn get_mut(&mut self, group: GroupId) -> Option<&mut GroupChildSet> {
        self.sets.get_mut(&group)
    }

    /// Number of registered sets
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// Whether no set is registered
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Groups whose sets still have dependencies
    pub fn unresolved(&self) -> impl Iterator<Item = GroupId> + '_ {
        self.sets.values().filter(|s| !s.is_resolved()).map(|s| s.group)
    }

    /// Absorb resolved sets into their dependents until every set is
    /// resolved.
    ///
    /// Works in waves: the frontier starts as the sets that are already
    /// resolved; each round visits the dependents of the frontier, fewest
    /// dependencies first, and absorbs every dependency that is resolved by
    /// then. Sets resolved in a round form the next frontier. Sets still
    /// waiting when the frontier runs dry are part of a cycle; sets still
    /// waiting after `max_rounds` are reported as hitting the round limit.
    /// Both are reported through `describe`.
    pub fn close(
        &mut self,
        max_rounds: usize,
        describe: impl Fn(GroupId) -> String,
    ) -> Result<()> {
        let mut dependents: HashMap<GroupId, Vec<GroupId>> = HashMap::new();
        for set in self.sets.values() {
            for dependency in set.dependencies() {
                dependents.entry(dependency).or_default().push(set.group);
            }
        }

        let mut frontier: Vec<GroupId> = self
            .sets
            .values()
            .filter(|s| s.is_resolved())
            .map(|s| s.group)
            .collect();
        let mut rounds = 0;
        let mut limit_reached = false;

        while !frontier.is_empty() && self.unresolved().next().is_some() {
            if rounds == max_rounds {
                debug!(rounds, "closure round limit reached");
                limit_reached = true;
                break;
            }
            rounds += 1;

            let candidates: IndexSet<GroupId> = frontier
                .iter()
                .filter_map(|group| dependents.get(group))
                .flatten()
                .copied()
                .filter(|group| self.get(*group).is_some_and(|s| !s.is_resolved()))
                .collect();
            let mut candidates: Vec<GroupId> = candidates.into_iter().collect();
            candidates
                .sort_by_key(|group| self.get(*group).map_or(0, |s| s.dependencies.len()));
            trace!(round = rounds, candidates = candidates.len(), "closure round");

            let mut next = Vec::new();
            for group in candidates {
                let ready: Vec<GroupId> = match self.get(group) {
                    Some(set) => set
                        .dependencies()
                        .filter(|d| self.get(*d).is_some_and(|s| s.is_resolved()))
                        .collect(),
                    None => continue,
                };
                for dependency in ready {
                    let children: Vec<QName> = match self.get(dependency) {
                        Some(set) => set.children().cloned().collect(),
                        None => continue,
                    };
                    if let Some(set) = self.get_mut(group) {
                        set.absorb(dependency, &children);
                    }
                }
                if self.get(group).is_some_and(|s| s.is_resolved()) {
                    next.push(group);
                }
            }
            frontier = next;
        }

        let unresolved: Vec<String> = self.unresolved().map(describe).collect();
        if unresolved.is_empty() {
            debug!(sets = self.sets.len(), rounds, "group dependencies closed");
            Ok(())
        } else if limit_reached {
            Err(Error::ClosureLimit {
                rounds,
                groups: unresolved,
            })
        } else {
            Err(Error::Cycle { groups: unresolved })
        }
    }
}

impl<'s> SchemaResolver<'s> {
    /// Dereference a named group reference and resolve the group body
    pub(crate) fn resolve_group_ref(
        &mut self,
        name: &QName,
        group: GroupId,
    ) -> Result<GroupId> {
        trace!(group = %name, "following group reference");
        self.resolve_group(group)
    }

    /// Build (or fetch) the child set of a sequence/choice/all particle
    pub(crate) fn resolve_group(&mut self, group: GroupId) -> Result<GroupId> {
        if self.groups.contains(group) {
            trace!(group = %group, "group already visited");
            return Ok(group);
        }

        let schema = self.schema;
        let _span = debug_span!("group", group = %schema.describe_group(group)).entered();
        debug!("resolving group");
        self.groups.insert(GroupChildSet::new(group));

        for particle in &schema.group(group).particles {
            match particle {
                Particle::Element(element) => {
                    let name = self.resolve_element(*element, false)?;
                    if let Some(set) = self.groups.get_mut(group) {
                        set.push_element(name);
                    }
                }
                Particle::Group(sub) => {
                    let sub = self.resolve_group(*sub)?;
                    if let Some(set) = self.groups.get_mut(group) {
                        set.push_dependency(sub);
                    }
                }
                Particle::GroupRef { name, group: sub } => {
                    let sub = self.resolve_group_ref(name, *sub)?;
                    if let Some(set) = self.groups.get_mut(group) {
                        set.push_dependency(sub);
                    }
                }
                Particle::Any | Particle::Empty => {}
                Particle::Unsupported { .. } => return Err(self.unsupported(particle)),
            }
        }

        Ok(group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn q(name: &str) -> QName {
        QName::local(name)
    }

    fn names(set: &GroupChildSet) -> Vec<String> {
        set.children().map(|n| n.local_name.clone()).collect()
    }

    fn describe(group: GroupId) -> String {
        format!("Sequence:{}", group)
    }

    #[test]
    fn test_push_element_dedupes() {
        let mut set = GroupChildSet::new(GroupId(0));
        set.push_element(q("a"));
        set.push_element(q("b"));
        set.push_element(q("a"));
        assert_eq!(names(&set), vec!["a", "b"]);
        assert!(set.is_resolved());
    }

    #[test]
    fn test_absorb_splices_at_placeholder() {
        let mut set = GroupChildSet::new(GroupId(0));
        set.push_element(q("a"));
        set.push_dependency(GroupId(1));
        set.push_element(q("d"));
        assert!(!set.is_resolved());

        set.absorb(GroupId(1), &[q("b"), q("c"), q("a")]);
        assert_eq!(names(&set), vec!["a", "b", "c", "d"]);
        assert!(set.is_resolved());
    }

    #[test]
    fn test_absorb_keeps_first_occurrence() {
        let mut set = GroupChildSet::new(GroupId(0));
        set.push_dependency(GroupId(1));
        set.push_element(q("x"));
        set.absorb(GroupId(1), &[q("x"), q("y")]);
        assert_eq!(names(&set), vec!["x", "y"]);
    }

    #[test]
    fn test_close_transitive_chain() {
        let mut cache = GroupCache::new();
        let mut top = GroupChildSet::new(GroupId(0));
        top.push_element(q("a"));
        top.push_dependency(GroupId(1));
        let mut middle = GroupChildSet::new(GroupId(1));
        middle.push_dependency(GroupId(2));
        middle.push_element(q("b"));
        let mut leaf = GroupChildSet::new(GroupId(2));
        leaf.push_element(q("c"));
        cache.insert(top);
        cache.insert(middle);
        cache.insert(leaf);

        cache.close(100, describe).unwrap();
        assert_eq!(names(cache.get(GroupId(0)).unwrap()), vec!["a", "c", "b"]);
        assert_eq!(names(cache.get(GroupId(1)).unwrap()), vec!["c", "b"]);
    }

    #[test]
    fn test_close_diamond() {
        let mut cache = GroupCache::new();
        let mut top = GroupChildSet::new(GroupId(0));
        top.push_dependency(GroupId(1));
        top.push_dependency(GroupId(2));
        let mut left = GroupChildSet::new(GroupId(1));
        left.push_element(q("l"));
        left.push_dependency(GroupId(3));
        let mut right = GroupChildSet::new(GroupId(2));
        right.push_dependency(GroupId(3));
        right.push_element(q("r"));
        let mut shared = GroupChildSet::new(GroupId(3));
        shared.push_element(q("s"));
        for set in [top, left, right, shared] {
            cache.insert(set);
        }

        cache.close(100, describe).unwrap();
        assert_eq!(names(cache.get(GroupId(0)).unwrap()), vec!["l", "s", "r"]);
    }

    #[test]
    fn test_close_reports_cycle() {
        let mut cache = GroupCache::new();
        let mut a = GroupChildSet::new(GroupId(0));
        a.push_element(q("x"));
        a.push_dependency(GroupId(1));
        let mut b = GroupChildSet::new(GroupId(1));
        b.push_dependency(GroupId(0));
        let mut free = GroupChildSet::new(GroupId(2));
        free.push_element(q("y"));
        cache.insert(a);
        cache.insert(b);
        cache.insert(free);

        let err = cache.close(100, describe).unwrap_err();
        match err {
            Error::Cycle { groups } => {
                assert_eq!(groups, vec!["Sequence:#0", "Sequence:#1"])
            }
            other => panic!("expected a cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_close_self_dependency_is_cycle() {
        let mut cache = GroupCache::new();
        let mut a = GroupChildSet::new(GroupId(7));
        a.push_element(q("x"));
        a.push_dependency(GroupId(7));
        cache.insert(a);

        assert!(matches!(cache.close(100, describe), Err(Error::Cycle { .. })));
    }

    #[test]
    fn test_close_round_limit() {
        // chain of four: needs three rounds
        let mut cache = GroupCache::new();
        for i in 0..4 {
            let mut set = GroupChildSet::new(GroupId(i));
            set.push_element(q(&format!("e{}", i)));
            if i < 3 {
                set.push_dependency(GroupId(i + 1));
            }
            cache.insert(set);
        }
        let mut limited = cache.clone();

        match limited.close(1, describe).unwrap_err() {
            Error::ClosureLimit { rounds, groups } => {
                assert_eq!(rounds, 1);
                assert_eq!(groups, vec!["Sequence:#0", "Sequence:#1"]);
            }
            other => panic!("expected the round limit, got {:?}", other),
        }
        cache.close(3, describe).unwrap();
        assert_eq!(names(cache.get(GroupId(0)).unwrap()), vec!["e0", "e1", "e2", "e3"]);
    }

    #[test]
    fn test_close_empty_cache() {
        let mut cache = GroupCache::new();
        assert!(cache.is_empty());
        cache.close(100, describe).unwrap();
    }

    /// Member of a generated group layout
    #[derive(Debug, Clone)]
    enum Item {
        Element(usize),
        Group(usize),
    }

    /// Expand a nested list the naive way: flatten, then keep first occurrences
    fn flatten(groups: &[Vec<Item>], index: usize, out: &mut Vec<String>) {
        for item in &groups[index] {
            match item {
                Item::Element(element) => out.push(format!("e{}", element)),
                Item::Group(sub) => flatten(groups, *sub, out),
            }
        }
    }

    fn dedup_first(items: Vec<String>) -> Vec<String> {
        let mut seen = IndexSet::new();
        items.into_iter().filter(|i| seen.insert(i.clone())).collect()
    }

    /// Acyclic group layouts: group `i` may only refer to groups with a
    /// larger index
    fn acyclic_groups() -> impl Strategy<Value = Vec<Vec<Item>>> {
        (1usize..6).prop_flat_map(|count| {
            (0..count)
                .map(move |i| {
                    let element = (0usize..5).prop_map(Item::Element);
                    let item: BoxedStrategy<Item> = if i + 1 < count {
                        prop_oneof![element, ((i + 1)..count).prop_map(Item::Group)].boxed()
                    } else {
                        element.boxed()
                    };
                    prop::collection::vec(item, 0..6)
                })
                .collect::<Vec<_>>()
        })
    }

    proptest! {
        #[test]
        fn prop_closure_matches_flattening(groups in acyclic_groups()) {
            let mut cache = GroupCache::new();
            for (i, items) in groups.iter().enumerate() {
                let mut set = GroupChildSet::new(GroupId(i));
                for item in items {
                    match item {
                        Item::Element(element) => set.push_element(q(&format!("e{}", element))),
                        Item::Group(sub) => set.push_dependency(GroupId(*sub)),
                    }
                }
                cache.insert(set);
            }

            cache.close(100, describe).unwrap();

            for i in 0..groups.len() {
                let mut expected = Vec::new();
                flatten(&groups, i, &mut expected);
                prop_assert_eq!(names(cache.get(GroupId(i)).unwrap()), dedup_first(expected));
            }
        }
    }
}
