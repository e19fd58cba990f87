//! core::history::crawler
//!
//! Read-only searches over a [`StateGraph`] from a head.
//!
//! Every state handed back carries the route by which it was reached, so a
//! later relative move can be re-derived from the head.
//!
//! # Search order
//!
//! Hash search keeps a deque of frontier states. Depth-first pushes
//! parents to the front in reverse branch order, breadth-first pushes them
//! to the back in branch order. Either way the first parent is explored
//! first on a tie.

use std::collections::{HashSet, VecDeque};

use crate::core::types::Fingerprint;

use super::{Path, State, StateGraph, Step};

/// Searches relative to one head.
#[derive(Debug, Clone, Copy)]
pub struct HistoryCrawler<'a> {
    graph: &'a StateGraph,
    head: Option<&'a Fingerprint>,
}

impl<'a> HistoryCrawler<'a> {
    pub fn new(graph: &'a StateGraph, head: Option<&'a Fingerprint>) -> Self {
        Self { graph, head }
    }

    /// The head state with an empty route.
    pub fn head_state(&self) -> Option<State> {
        self.head
            .and_then(|h| self.graph.get(h))
            .map(|s| s.clone().with_route(Path::default()))
    }

    fn reached(&self, hash: &Fingerprint, route: Path) -> Option<State> {
        self.graph.get(hash).map(|s| s.clone().with_route(route))
    }

    /// Walk one step toward ancestors from `start`.
    ///
    /// The first hop takes parent `branch`, later hops take the first
    /// parent. Moving onto a blacklisted state fails. A negative distance
    /// shortens the route of `start` and replays it from the head.
    pub fn find_commit_relative(
        &self,
        start: &State,
        step: Step,
        blacklist: &HashSet<Fingerprint>,
    ) -> Option<State> {
        if step.distance() < 0 {
            let route = start.route().retreat(step.distance().unsigned_abs())?;
            let head = self.head_state()?;
            return self.find_commit_path(&head, &route, blacklist);
        }

        let mut current = start.clone();
        let mut branch = step.branch();
        for _ in 0..step.distance() {
            let parents = self.graph.parents(current.fingerprint());
            let Some(next) = parents.get(branch - 1) else {
                tracing::trace!(
                    state = %current.fingerprint().short(10),
                    branch,
                    parents = parents.len(),
                    "no such branch"
                );
                return None;
            };
            if blacklist.contains(next) {
                return None;
            }
            let route = current.route().extended(branch);
            current = self.reached(next, route)?;
            branch = 1;
        }
        Some(current)
    }

    /// Apply every step of `path` in turn.
    pub fn find_commit_path(
        &self,
        start: &State,
        path: &Path,
        blacklist: &HashSet<Fingerprint>,
    ) -> Option<State> {
        path.steps()
            .iter()
            .try_fold(start.clone(), |state, step| {
                self.find_commit_relative(&state, *step, blacklist)
            })
    }

    /// Search ancestors of `start` for `target`.
    pub fn find_commit_hash(
        &self,
        start: &State,
        target: &Fingerprint,
        blacklist: &HashSet<Fingerprint>,
        depth_first: bool,
    ) -> Option<State> {
        let target = self.graph.resolve(target);
        let mut frontier = VecDeque::from([start.clone()]);
        let mut visited = HashSet::new();
        let mut expanded = 0usize;

        while let Some(state) = frontier.pop_front() {
            let hash = self.graph.resolve(state.fingerprint());
            if blacklist.contains(&hash) || !visited.insert(hash.clone()) {
                continue;
            }
            if hash == target {
                tracing::trace!(expanded, route = %state.route(), "found state");
                return Some(state);
            }
            expanded += 1;

            let next: Vec<State> = self
                .graph
                .parents(&hash)
                .iter()
                .enumerate()
                .filter(|(_, p)| !blacklist.contains(*p) && !visited.contains(*p))
                .filter_map(|(i, p)| self.reached(p, state.route().extended(i + 1)))
                .collect();
            if depth_first {
                for s in next.into_iter().rev() {
                    frontier.push_front(s);
                }
            } else {
                frontier.extend(next);
            }
        }
        tracing::trace!(expanded, target = %target.short(10), "state not found");
        None
    }

    /// Every state reachable from the head, breadth first, each with the
    /// first route found to it.
    pub fn all_reachable(&self) -> Vec<State> {
        let Some(head) = self.head_state() else {
            return Vec::new();
        };
        let mut seen = HashSet::from([head.fingerprint().clone()]);
        let mut queue = VecDeque::from([head]);
        let mut out = Vec::new();
        while let Some(state) = queue.pop_front() {
            for (i, parent) in self.graph.parents(state.fingerprint()).iter().enumerate() {
                if seen.insert(parent.clone()) {
                    if let Some(s) = self.reached(parent, state.route().extended(i + 1)) {
                        queue.push_back(s);
                    }
                }
            }
            out.push(state);
        }
        out
    }

    /// Reachable states that have `hash` as a parent.
    pub fn list_following_commits(&self, hash: &Fingerprint) -> Vec<State> {
        let target = self.graph.resolve(hash);
        self.all_reachable()
            .into_iter()
            .filter(|s| self.graph.parents(s.fingerprint()).contains(&target))
            .collect()
    }

    /// Immediate parents of the state at `hash`, routed through it.
    pub fn list_previous_commits(&self, hash: &Fingerprint) -> Vec<State> {
        let Some(found) = self
            .head_state()
            .and_then(|head| self.find_commit_hash(&head, hash, &HashSet::new(), true))
        else {
            return Vec::new();
        };
        self.graph
            .parents(found.fingerprint())
            .iter()
            .enumerate()
            .filter_map(|(i, p)| self.reached(p, found.route().extended(i + 1)))
            .collect()
    }

    /// The mainline from the head, following valid previous links.
    pub fn log(&self) -> Vec<State> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut next = self.head_state();
        while let Some(state) = next.take() {
            if !seen.insert(state.fingerprint().clone()) {
                break;
            }
            if let Some(vp) = self.graph.valid_previous(state.fingerprint()) {
                let branch = self
                    .graph
                    .parents(state.fingerprint())
                    .iter()
                    .position(|p| *p == vp)
                    .map_or(1, |i| i + 1);
                next = self.reached(&vp, state.route().extended(branch));
            }
            out.push(state);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::history::StateDraft;
    use crate::core::types::{StateId, UtcTimestamp};

    fn add(graph: &mut StateGraph, previous: &[&Fingerprint], message: &str) -> Fingerprint {
        let mut draft = StateDraft::new("t", message);
        draft.previous = previous.iter().map(|p| (*p).clone()).collect();
        draft.valid_previous = previous.first().map(|p| (*p).clone());
        graph.insert(State::mint(draft, StateId::generate(), UtcTimestamp::now()))
    }

    fn step(branch: usize, distance: i64) -> Step {
        Step::new(branch, distance).unwrap()
    }

    /// ```text
    /// root <- a <- b <- c (head)
    /// ```
    fn linear() -> (StateGraph, Vec<Fingerprint>) {
        let mut g = StateGraph::new();
        let root = add(&mut g, &[], "root");
        let a = add(&mut g, &[&root], "a");
        let b = add(&mut g, &[&a], "b");
        let c = add(&mut g, &[&b], "c");
        (g, vec![root, a, b, c])
    }

    /// ```text
    /// root <- left  <- merge (head)
    ///      <- right <-/
    /// ```
    fn diamond() -> (StateGraph, [Fingerprint; 4]) {
        let mut g = StateGraph::new();
        let root = add(&mut g, &[], "root");
        let left = add(&mut g, &[&root], "left");
        let right = add(&mut g, &[&root], "right");
        let merge = add(&mut g, &[&left, &right], "merge");
        (g, [root, left, right, merge])
    }

    #[test]
    fn relative_walks_mainline() {
        let (g, h) = linear();
        let crawler = HistoryCrawler::new(&g, Some(&h[3]));
        let head = crawler.head_state().unwrap();
        let found = crawler
            .find_commit_relative(&head, step(1, 2), &HashSet::new())
            .unwrap();
        assert_eq!(found.fingerprint(), &h[1]);
        assert_eq!(found.route().to_string(), "*1+2");
    }

    #[test]
    fn zero_distance_returns_start_even_if_blacklisted() {
        let (g, h) = linear();
        let crawler = HistoryCrawler::new(&g, Some(&h[3]));
        let head = crawler.head_state().unwrap();
        let blacklist = HashSet::from([h[3].clone()]);
        let found = crawler
            .find_commit_relative(&head, step(1, 0), &blacklist)
            .unwrap();
        assert_eq!(found.fingerprint(), &h[3]);
    }

    #[test]
    fn relative_fails_on_blacklist_and_missing_branch() {
        let (g, h) = linear();
        let crawler = HistoryCrawler::new(&g, Some(&h[3]));
        let head = crawler.head_state().unwrap();
        let blacklist = HashSet::from([h[1].clone()]);
        assert!(crawler
            .find_commit_relative(&head, step(1, 2), &blacklist)
            .is_none());
        assert!(crawler
            .find_commit_relative(&head, step(2, 1), &HashSet::new())
            .is_none());
        assert!(crawler
            .find_commit_relative(&head, step(1, 4), &HashSet::new())
            .is_none());
    }

    #[test]
    fn negative_distance_rederives_from_head() {
        let (g, h) = linear();
        let crawler = HistoryCrawler::new(&g, Some(&h[3]));
        let head = crawler.head_state().unwrap();
        let none = HashSet::new();
        let deep = crawler.find_commit_relative(&head, step(1, 3), &none).unwrap();
        assert_eq!(deep.fingerprint(), &h[0]);

        let back = crawler.find_commit_relative(&deep, step(1, -2), &none).unwrap();
        assert_eq!(back.fingerprint(), &h[2]);
        assert_eq!(back.route().to_string(), "*1+1");
        assert!(crawler.find_commit_relative(&deep, step(1, -4), &none).is_none());
    }

    #[test]
    fn second_branch_then_mainline() {
        let (g, [root, _, right, merge]) = diamond();
        let crawler = HistoryCrawler::new(&g, Some(&merge));
        let head = crawler.head_state().unwrap();
        let none = HashSet::new();
        let found = crawler.find_commit_relative(&head, step(2, 1), &none).unwrap();
        assert_eq!(found.fingerprint(), &right);
        let found = crawler.find_commit_relative(&head, step(2, 2), &none).unwrap();
        assert_eq!(found.fingerprint(), &root);
        assert_eq!(found.route().to_string(), "*2+2");
    }

    #[test]
    fn path_replays_steps() {
        let (g, [root, left, _, merge]) = diamond();
        let crawler = HistoryCrawler::new(&g, Some(&merge));
        let head = crawler.head_state().unwrap();
        let none = HashSet::new();
        let path: Path = "*1+1*1+1".parse().unwrap();
        assert_eq!(
            crawler.find_commit_path(&head, &path, &none).unwrap().fingerprint(),
            &root
        );
        let path: Path = "*1+1".parse().unwrap();
        assert_eq!(
            crawler.find_commit_path(&head, &path, &none).unwrap().fingerprint(),
            &left
        );
        let path: Path = "*3+1".parse().unwrap();
        assert!(crawler.find_commit_path(&head, &path, &none).is_none());
    }

    #[test]
    fn dfs_and_bfs_agree_on_unique_target() {
        let (g, [root, _, right, merge]) = diamond();
        let crawler = HistoryCrawler::new(&g, Some(&merge));
        let head = crawler.head_state().unwrap();
        let none = HashSet::new();
        for target in [&root, &right] {
            let dfs = crawler.find_commit_hash(&head, target, &none, true).unwrap();
            let bfs = crawler.find_commit_hash(&head, target, &none, false).unwrap();
            assert_eq!(dfs.fingerprint(), bfs.fingerprint());
        }
        let dfs = crawler.find_commit_hash(&head, &root, &none, true).unwrap();
        assert_eq!(dfs.route().to_string(), "*1+2");
    }

    #[test]
    fn hash_search_prunes_blacklist() {
        let (g, [root, left, right, merge]) = diamond();
        let crawler = HistoryCrawler::new(&g, Some(&merge));
        let head = crawler.head_state().unwrap();
        let blacklist = HashSet::from([left]);
        let found = crawler
            .find_commit_hash(&head, &root, &blacklist, true)
            .unwrap();
        assert_eq!(found.route().to_string(), "*2+2");

        let blacklist = HashSet::from([right.clone(), root.clone()]);
        assert!(crawler
            .find_commit_hash(&head, &root, &blacklist, false)
            .is_none());
    }

    #[test]
    fn following_and_previous_commits() {
        let (g, [root, left, right, merge]) = diamond();
        let crawler = HistoryCrawler::new(&g, Some(&merge));

        let mut following: Vec<_> = crawler
            .list_following_commits(&root)
            .into_iter()
            .map(|s| s.fingerprint().clone())
            .collect();
        following.sort();
        let mut expected = vec![left.clone(), right.clone()];
        expected.sort();
        assert_eq!(following, expected);

        let previous: Vec<_> = crawler
            .list_previous_commits(&merge)
            .into_iter()
            .map(|s| s.fingerprint().clone())
            .collect();
        assert_eq!(previous, vec![left, right]);
        assert!(crawler.list_previous_commits(&root).is_empty());
    }

    #[test]
    fn reachable_and_log() {
        let (g, [root, left, _, merge]) = diamond();
        let crawler = HistoryCrawler::new(&g, Some(&merge));
        assert_eq!(crawler.all_reachable().len(), 4);
        let log: Vec<_> = crawler
            .log()
            .into_iter()
            .map(|s| s.fingerprint().clone())
            .collect();
        assert_eq!(log, vec![merge, left, root]);
    }

    #[test]
    fn empty_history() {
        let g = StateGraph::new();
        let crawler = HistoryCrawler::new(&g, None);
        assert!(crawler.head_state().is_none());
        assert!(crawler.all_reachable().is_empty());
        assert!(crawler.log().is_empty());
    }
}
