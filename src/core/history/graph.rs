//! core::history::graph
//!
//! Arena of states keyed by fingerprint.
//!
//! Parent links are fingerprints, never references, so a graph with merge
//! points needs no shared ownership. Two side tables adjust the stored
//! links without touching any stored state:
//!
//! - **grafts** add parents to a state after the fact (`GR::>>child::>>parent`)
//! - **replacements** redirect every link to a state onto a newer state
//!   (`RE::>>old::>>new`)
//!
//! The effective parents of a state are its own `previous` list followed by
//! its grafts, each resolved through the replacement table.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use crate::core::codec::{MemberLine, Token};
use crate::core::element::ElementError;
use crate::core::store::ObjectStore;
use crate::core::types::Fingerprint;

use super::State;

#[derive(Debug, Clone, Default)]
pub struct StateGraph {
    states: HashMap<Fingerprint, State>,
    grafts: BTreeMap<Fingerprint, Vec<Fingerprint>>,
    replacements: BTreeMap<Fingerprint, Fingerprint>,
}

impl StateGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Add a state, returning its fingerprint.
    pub fn insert(&mut self, state: State) -> Fingerprint {
        let hash = state.fingerprint().clone();
        self.states.insert(hash.clone(), state);
        hash
    }

    /// Follow the replacement table to the newest state for `hash`.
    pub fn resolve(&self, hash: &Fingerprint) -> Fingerprint {
        let mut current = hash;
        for _ in 0..=self.replacements.len() {
            match self.replacements.get(current) {
                Some(next) => current = next,
                None => break,
            }
        }
        current.clone()
    }

    /// The state for `hash`, after replacement.
    pub fn get(&self, hash: &Fingerprint) -> Option<&State> {
        self.states.get(&self.resolve(hash))
    }

    pub fn contains(&self, hash: &Fingerprint) -> bool {
        self.get(hash).is_some()
    }

    /// Effective parents of `hash` in branch order.
    pub fn parents(&self, hash: &Fingerprint) -> Vec<Fingerprint> {
        let resolved = self.resolve(hash);
        let own = self
            .states
            .get(&resolved)
            .map(|s| s.previous())
            .unwrap_or_default();
        let grafted = self.grafts.get(&resolved).map(Vec::as_slice).unwrap_or_default();

        let mut seen = HashSet::new();
        own.iter()
            .chain(grafted)
            .map(|p| self.resolve(p))
            .filter(|p| seen.insert(p.clone()))
            .collect()
    }

    /// Mainline parent of `hash`, after replacement.
    pub fn valid_previous(&self, hash: &Fingerprint) -> Option<Fingerprint> {
        self.get(hash)
            .and_then(State::valid_previous)
            .map(|p| self.resolve(p))
    }

    /// Record `parent` as an extra parent of `child`. Returns `false` when
    /// it already is one.
    pub fn add_graft(&mut self, child: &Fingerprint, parent: &Fingerprint) -> bool {
        let child = self.resolve(child);
        let parent = self.resolve(parent);
        if child == parent || self.parents(&child).contains(&parent) {
            return false;
        }
        self.grafts.entry(child).or_default().push(parent);
        true
    }

    /// Redirect every link to `old` onto `new`. Grafts on `old` move over.
    pub fn add_replacement(&mut self, old: &Fingerprint, new: &Fingerprint) {
        if old == new {
            return;
        }
        self.replacements.insert(old.clone(), new.clone());
        if let Some(moved) = self.grafts.remove(old) {
            let target = self.grafts.entry(new.clone()).or_default();
            for parent in moved {
                if !target.contains(&parent) {
                    target.push(parent);
                }
            }
        }
    }

    /// States whose effective parents include `hash`.
    pub fn children_of(&self, hash: &Fingerprint) -> Vec<Fingerprint> {
        let target = self.resolve(hash);
        let mut children: Vec<_> = self
            .states
            .keys()
            .filter(|k| !self.replacements.contains_key(*k))
            .filter(|k| self.parents(k).contains(&target))
            .cloned()
            .collect();
        children.sort();
        children
    }

    /// Fetch every state reachable from `heads` that is not loaded yet.
    pub fn load<S, I>(&mut self, store: &S, heads: I) -> Result<(), ElementError>
    where
        S: ObjectStore + ?Sized,
        I: IntoIterator<Item = Fingerprint>,
    {
        let mut queue: VecDeque<Fingerprint> = heads.into_iter().collect();
        let mut fetched = 0usize;
        while let Some(hash) = queue.pop_front() {
            let hash = self.resolve(&hash);
            if self.states.contains_key(&hash) {
                continue;
            }
            let state = State::load(store, &hash)?;
            self.states.insert(hash.clone(), state);
            fetched += 1;
            queue.extend(self.parents(&hash));
        }
        tracing::debug!(fetched, total = self.states.len(), "loaded history");
        Ok(())
    }

    /// Graft and replacement records for storage.
    pub fn table_lines(&self) -> Vec<MemberLine> {
        let grafts = self.grafts.iter().flat_map(|(child, parents)| {
            parents
                .iter()
                .map(move |p| MemberLine::new(Token::Graft, [child.as_str(), p.as_str()]))
        });
        let replacements = self
            .replacements
            .iter()
            .map(|(old, new)| MemberLine::new(Token::Replacement, [old.as_str(), new.as_str()]));
        grafts.chain(replacements).collect()
    }

    /// Apply a stored `GR` or `RE` line. Other tokens are left to the
    /// caller and reported as not consumed.
    pub fn apply_table_line(&mut self, line: &MemberLine) -> Result<bool, ElementError> {
        match line.token {
            Token::Graft => {
                line.expect_fields("GR", 2)?;
                let child = Fingerprint::new(line.fields[0].as_str())?;
                let parent = Fingerprint::new(line.fields[1].as_str())?;
                self.grafts.entry(child).or_default().push(parent);
                Ok(true)
            }
            Token::Replacement => {
                line.expect_fields("RE", 2)?;
                let old = Fingerprint::new(line.fields[0].as_str())?;
                let new = Fingerprint::new(line.fields[1].as_str())?;
                self.replacements.insert(old, new);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::history::StateDraft;
    use crate::core::store::MemoryStore;
    use crate::core::types::{StateId, UtcTimestamp};

    fn state(previous: &[&Fingerprint], message: &str) -> State {
        let mut draft = StateDraft::new("t", message);
        draft.previous = previous.iter().map(|p| (*p).clone()).collect();
        draft.valid_previous = previous.first().map(|p| (*p).clone());
        State::mint(draft, StateId::generate(), UtcTimestamp::now())
    }

    #[test]
    fn grafts_extend_parents_without_rehashing() {
        let mut graph = StateGraph::new();
        let a = graph.insert(state(&[], "a"));
        let b = graph.insert(state(&[], "b"));
        let c = graph.insert(state(&[&a], "c"));

        assert!(graph.add_graft(&c, &b));
        assert!(!graph.add_graft(&c, &b));
        assert!(!graph.add_graft(&c, &a));
        assert_eq!(graph.parents(&c), vec![a, b.clone()]);
        assert_eq!(graph.get(&c).unwrap().fingerprint(), &c);
        assert_eq!(graph.children_of(&b), vec![c]);
    }

    #[test]
    fn replacements_redirect_links() {
        let mut graph = StateGraph::new();
        let a = graph.insert(state(&[], "a"));
        let b = graph.insert(state(&[&a], "b"));
        let a2 = graph.insert(state(&[], "a2"));

        graph.add_replacement(&a, &a2);
        assert_eq!(graph.resolve(&a), a2);
        assert_eq!(graph.parents(&b), vec![a2.clone()]);
        assert_eq!(graph.valid_previous(&b), Some(a2.clone()));
        assert_eq!(graph.get(&a).unwrap().fingerprint(), &a2);
    }

    #[test]
    fn table_lines_roundtrip() {
        let mut graph = StateGraph::new();
        let a = graph.insert(state(&[], "a"));
        let b = graph.insert(state(&[], "b"));
        let c = graph.insert(state(&[&a], "c"));
        graph.add_graft(&c, &b);
        let d = graph.insert(state(&[], "d"));
        graph.add_replacement(&a, &d);

        let mut restored = StateGraph::new();
        for line in graph.table_lines() {
            assert!(restored.apply_table_line(&line).unwrap());
        }
        assert_eq!(restored.resolve(&a), d);
        assert_eq!(restored.table_lines(), graph.table_lines());
    }

    #[test]
    fn load_follows_effective_parents() {
        let store = MemoryStore::new();
        let root = state(&[], "root");
        let side = state(&[], "side");
        let tip = state(&[root.fingerprint()], "tip");
        for s in [&root, &side, &tip] {
            s.persist(&store).unwrap();
        }

        let mut graph = StateGraph::new();
        graph.grafts.insert(tip.fingerprint().clone(), vec![side.fingerprint().clone()]);
        graph.load(&store, [tip.fingerprint().clone()]).unwrap();
        assert_eq!(graph.len(), 3);
    }

    #[test]
    fn load_reports_missing_state() {
        let store = MemoryStore::new();
        let root = state(&[], "root");
        let tip = state(&[root.fingerprint()], "tip");
        tip.persist(&store).unwrap();

        let mut graph = StateGraph::new();
        assert!(matches!(
            graph.load(&store, [tip.fingerprint().clone()]),
            Err(ElementError::MissingContent(_))
        ));
    }
}
