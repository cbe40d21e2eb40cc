//! Specialist Registry: catalog of specialists keyed by (domain, tier)
//!
//! The registry is built once, validated once, and then only read. Wiring
//! mistakes (missing prerequisite tiers, dangling handoff targets, cycles)
//! surface as [`ConfigError`] from [`SpecialistRegistryBuilder::build`] so
//! they can never show up mid-request.
//!
//! Each entry also carries availability metadata. A withdrawn specialist stays
//! in the catalog (so wiring stays valid) but resolves as unavailable at
//! request time, which the engine reports as `escalation-unavailable`.

use crate::error::ConfigError;
use crate::escalation::tier::Tier;
use crate::specialist::{Domain, Specialist, SpecialistDescriptor, SpecialistId};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Availability metadata for a registered specialist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialistHealth {
    /// Whether the specialist may be consulted
    pub available: bool,
    /// Last change (Unix timestamp seconds)
    pub last_changed_secs: u64,
    /// Why the specialist was withdrawn, if it was
    pub status_message: Option<String>,
}

impl SpecialistHealth {
    pub fn healthy() -> Self {
        Self {
            available: true,
            last_changed_secs: unix_now(),
            status_message: None,
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            available: false,
            last_changed_secs: unix_now(),
            status_message: Some(reason.into()),
        }
    }
}

/// Why a specialist could not be resolved at request time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unavailable {
    NotRegistered(SpecialistId),
    Withdrawn { id: SpecialistId, reason: String },
}

impl std::fmt::Display for Unavailable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotRegistered(id) => write!(f, "specialist '{}' is not registered", id),
            Self::Withdrawn { id, reason } => {
                write!(f, "specialist '{}' is unavailable: {}", id, reason)
            }
        }
    }
}

/// A registered specialist with its availability
#[derive(Clone)]
pub struct RegistryEntry {
    pub specialist: Arc<dyn Specialist>,
    pub health: SpecialistHealth,
}

impl RegistryEntry {
    pub fn descriptor(&self) -> &SpecialistDescriptor {
        self.specialist.descriptor()
    }
}

impl std::fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("id", &self.descriptor().id)
            .field("tier", &self.descriptor().tier)
            .field("health", &self.health)
            .finish()
    }
}

/// Collects specialists and validates their wiring on [`build`](Self::build).
#[derive(Default)]
pub struct SpecialistRegistryBuilder {
    specialists: Vec<Arc<dyn Specialist>>,
}

impl SpecialistRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<S: Specialist + 'static>(self, specialist: S) -> Self {
        self.register_arc(Arc::new(specialist))
    }

    pub fn register_arc(mut self, specialist: Arc<dyn Specialist>) -> Self {
        self.specialists.push(specialist);
        self
    }

    /// Validate the wiring and produce an immutable registry.
    pub fn build(self) -> Result<SpecialistRegistry, ConfigError> {
        if self.specialists.is_empty() {
            return Err(ConfigError::EmptyRegistry);
        }

        let mut entries: HashMap<SpecialistId, RegistryEntry> = HashMap::new();
        let mut slots: BTreeMap<(Domain, Tier), SpecialistId> = BTreeMap::new();

        for specialist in self.specialists {
            let d = specialist.descriptor().clone();
            if entries.contains_key(&d.id) {
                return Err(ConfigError::DuplicateSpecialist(d.id));
            }
            if let Some(existing) = slots.get(&(d.domain.clone(), d.tier)) {
                return Err(ConfigError::DuplicateSlot {
                    domain: d.domain,
                    tier: d.tier,
                    existing: existing.clone(),
                    rejected: d.id,
                });
            }
            slots.insert((d.domain.clone(), d.tier), d.id.clone());
            entries.insert(
                d.id.clone(),
                RegistryEntry {
                    specialist,
                    health: SpecialistHealth::healthy(),
                },
            );
        }

        let registry = SpecialistRegistry { entries, slots };
        registry.check_cycles()?;
        for descriptor in registry.descriptors() {
            registry.check_prerequisites(descriptor)?;
            registry.check_handoffs(descriptor)?;
        }

        info!(
            specialists = registry.len(),
            domains = registry.domains().len(),
            tiers = registry.tier_count(),
            "Specialist registry validated"
        );
        Ok(registry)
    }
}

/// Validated catalog of specialists.
pub struct SpecialistRegistry {
    entries: HashMap<SpecialistId, RegistryEntry>,
    slots: BTreeMap<(Domain, Tier), SpecialistId>,
}

impl SpecialistRegistry {
    pub fn builder() -> SpecialistRegistryBuilder {
        SpecialistRegistryBuilder::new()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get a registry entry by specialist ID, regardless of availability
    pub fn get(&self, id: &SpecialistId) -> Option<&RegistryEntry> {
        self.entries.get(id)
    }

    /// The specialist occupying a (domain, tier) slot, regardless of availability
    pub fn resolve(&self, domain: &Domain, tier: Tier) -> Option<&RegistryEntry> {
        self.slots
            .get(&(domain.clone(), tier))
            .and_then(|id| self.entries.get(id))
    }

    /// The entry-tier specialist for a domain
    pub fn entry_for(&self, domain: &Domain) -> Option<&RegistryEntry> {
        self.resolve(domain, Tier::Tier1)
    }

    /// Resolve a specialist for consultation: it must be registered and available
    pub fn available(&self, id: &SpecialistId) -> Result<Arc<dyn Specialist>, Unavailable> {
        let entry = self
            .entries
            .get(id)
            .ok_or_else(|| Unavailable::NotRegistered(id.clone()))?;
        if entry.health.available {
            Ok(Arc::clone(&entry.specialist))
        } else {
            Err(Unavailable::Withdrawn {
                id: id.clone(),
                reason: entry
                    .health
                    .status_message
                    .clone()
                    .unwrap_or_else(|| "withdrawn".to_string()),
            })
        }
    }

    /// Same as [`available`](Self::available), addressed by slot
    pub fn available_at(
        &self,
        domain: &Domain,
        tier: Tier,
    ) -> Result<Arc<dyn Specialist>, Unavailable> {
        match self.slots.get(&(domain.clone(), tier)) {
            Some(id) => self.available(id),
            None => Err(Unavailable::NotRegistered(SpecialistId::new(format!(
                "{}/{}",
                domain, tier
            )))),
        }
    }

    /// Number of distinct tiers present; bounds how many consultations a
    /// single chain may contain.
    pub fn tier_count(&self) -> usize {
        self.slots
            .keys()
            .map(|(_, tier)| *tier)
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Registered domains in sorted order
    pub fn domains(&self) -> Vec<Domain> {
        self.slots
            .keys()
            .map(|(domain, _)| domain.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// All descriptors ordered by (domain, tier)
    pub fn descriptors(&self) -> Vec<&SpecialistDescriptor> {
        self.slots
            .values()
            .filter_map(|id| self.entries.get(id))
            .map(RegistryEntry::descriptor)
            .collect()
    }

    /// Withdraw a specialist. Must happen before the registry is shared.
    pub fn mark_unavailable(&mut self, id: &SpecialistId, reason: impl Into<String>) -> bool {
        match self.entries.get_mut(id) {
            Some(entry) => {
                let reason = reason.into();
                warn!(specialist = %id, %reason, "Specialist marked unavailable");
                entry.health = SpecialistHealth::unavailable(reason);
                true
            }
            None => false,
        }
    }

    /// Restore a withdrawn specialist
    pub fn mark_available(&mut self, id: &SpecialistId) -> bool {
        match self.entries.get_mut(id) {
            Some(entry) => {
                entry.health = SpecialistHealth::healthy();
                true
            }
            None => false,
        }
    }

    fn check_prerequisites(&self, d: &SpecialistDescriptor) -> Result<(), ConfigError> {
        for &prerequisite in &d.prerequisites {
            if prerequisite >= d.tier {
                return Err(ConfigError::PrerequisiteNotLower {
                    specialist: d.id.clone(),
                    tier: d.tier,
                    prerequisite,
                });
            }
            if !self.slots.contains_key(&(d.domain.clone(), prerequisite)) {
                return Err(ConfigError::MissingPrerequisite {
                    specialist: d.id.clone(),
                    domain: d.domain.clone(),
                    prerequisite,
                });
            }
        }
        Ok(())
    }

    fn check_handoffs(&self, d: &SpecialistDescriptor) -> Result<(), ConfigError> {
        for criterion in &d.handoff_criteria {
            let target = self.entries.get(&criterion.target_specialist_id).ok_or_else(|| {
                ConfigError::UnresolvedHandoffTarget {
                    specialist: d.id.clone(),
                    condition: criterion.condition.clone(),
                    target: criterion.target_specialist_id.clone(),
                }
            })?;
            let actual = target.descriptor().tier;
            if actual != criterion.target_tier {
                return Err(ConfigError::HandoffTierMismatch {
                    specialist: d.id.clone(),
                    condition: criterion.condition.clone(),
                    target: criterion.target_specialist_id.clone(),
                    declared: criterion.target_tier,
                    actual,
                });
            }
            if actual <= d.tier {
                return Err(ConfigError::HandoffNotUpward {
                    specialist: d.id.clone(),
                    condition: criterion.condition.clone(),
                    from: d.tier,
                    to: actual,
                });
            }
            let target = target.descriptor();
            if target.domain != d.domain {
                // The chain already holds a record at the source tier, so
                // target-domain prerequisites at or below it cannot be inserted.
                if let Some(&prerequisite) = target.prerequisites.iter().find(|&&p| p <= d.tier) {
                    return Err(ConfigError::UnreachablePrerequisite {
                        specialist: d.id.clone(),
                        condition: criterion.condition.clone(),
                        target: target.id.clone(),
                        domain: target.domain.clone(),
                        from: d.tier,
                        prerequisite,
                    });
                }
            }
        }
        Ok(())
    }

    /// Reject cycles in the combined "must run before" graph: prerequisite
    /// specialist → dependent, and handoff source → target.
    fn check_cycles(&self) -> Result<(), ConfigError> {
        let mut graph: DiGraph<SpecialistId, ()> = DiGraph::new();
        let mut nodes: BTreeMap<SpecialistId, NodeIndex> = BTreeMap::new();
        for id in self.slots.values() {
            nodes.insert(id.clone(), graph.add_node(id.clone()));
        }

        for d in self.descriptors() {
            let to = nodes[&d.id];
            for &prerequisite in &d.prerequisites {
                if let Some(pre_id) = self.slots.get(&(d.domain.clone(), prerequisite)) {
                    graph.add_edge(nodes[pre_id], to, ());
                }
            }
            for criterion in &d.handoff_criteria {
                if let Some(&target) = nodes.get(&criterion.target_specialist_id) {
                    graph.add_edge(to, target, ());
                }
            }
        }

        match toposort(&graph, None) {
            Ok(_) => Ok(()),
            Err(cycle) => {
                let start = cycle.node_id();
                let path = cycle_path(&graph, start)
                    .into_iter()
                    .map(|idx| graph[idx].clone())
                    .collect::<Vec<_>>();
                debug!(?path, "Cycle detected in escalation wiring");
                Err(ConfigError::Cycle { path })
            }
        }
    }
}

/// Walk from `start` until it is reached again; returns the closed path.
fn cycle_path(graph: &DiGraph<SpecialistId, ()>, start: NodeIndex) -> Vec<NodeIndex> {
    fn walk(
        graph: &DiGraph<SpecialistId, ()>,
        node: NodeIndex,
        start: NodeIndex,
        path: &mut Vec<NodeIndex>,
    ) -> bool {
        for next in graph.neighbors(node) {
            if next == start {
                path.push(next);
                return true;
            }
            if path.contains(&next) {
                continue;
            }
            path.push(next);
            if walk(graph, next, start, path) {
                return true;
            }
            path.pop();
        }
        false
    }

    let mut path = vec![start];
    if walk(graph, start, start, &mut path) {
        path
    } else {
        vec![start]
    }
}

impl std::fmt::Debug for SpecialistRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpecialistRegistry")
            .field("slots", &self.slots)
            .finish()
    }
}
