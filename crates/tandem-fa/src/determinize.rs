use std::collections::{BTreeSet, HashMap};

use bit_set::BitSet;
use log::{debug, trace, warn};
use petgraph::{
    graph::{DiGraph, NodeIndex},
    visit::{Bfs, Reversed},
};

use crate::rules::{Production, Rule, RuleSpec, StateId};

/// A (state, symbol) pair with more than one way forward. `accepting` is set
/// when a terminal literal for the symbol sits next to the transitions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Indetermination {
    pub parent: StateId,
    pub symbol: char,
    pub targets: BitSet,
    pub accepting: bool,
}

impl Indetermination {
    pub fn is_indeterminate(&self) -> bool {
        self.targets.len() + usize::from(self.accepting) > 1
    }

    pub fn targets(&self) -> impl Iterator<Item = StateId> + '_ {
        self.targets.iter().map(StateId::new)
    }
}

impl RuleSpec {
    pub fn indeterminations(&self) -> Vec<Indetermination> {
        let mut found = Vec::new();
        for (parent, rule) in self.rules() {
            for &symbol in self.alphabet() {
                let mut indetermination = Indetermination {
                    parent,
                    symbol,
                    targets: BitSet::new(),
                    accepting: false,
                };

                for production in rule.with_symbol(symbol) {
                    match production {
                        Production::Transition(_, target) => {
                            indetermination.targets.insert(target.index());
                        }
                        Production::Literal(_) => indetermination.accepting = true,
                        Production::Epsilon => (),
                    }
                }

                if indetermination.is_indeterminate() {
                    found.push(indetermination);
                }
            }
        }
        found
    }
}

/// Output of [`determinize`]: the rewritten spec plus the states excluded from
/// compilation. Excluded states keep their ids.
#[derive(Clone, Debug)]
pub struct DeterminizedSpec {
    spec: RuleSpec,
    unreachable: BitSet,
    dead: BitSet,
    passes: usize,
    merged_states: usize,
}

impl DeterminizedSpec {
    pub fn spec(&self) -> &RuleSpec {
        &self.spec
    }

    pub fn into_spec(self) -> RuleSpec {
        self.spec
    }

    pub fn is_unreachable(&self, state: StateId) -> bool {
        self.unreachable.contains(state.index())
    }

    // reachable, but no terminal state can be reached from it
    pub fn is_dead(&self, state: StateId) -> bool {
        self.dead.contains(state.index())
    }

    pub fn is_live(&self, state: StateId) -> bool {
        !self.is_unreachable(state) && !self.is_dead(state)
    }

    /// Ascending id order.
    pub fn live_states(&self) -> impl Iterator<Item = StateId> + '_ {
        (0..self.spec.n_states())
            .map(StateId::new)
            .filter(|state| self.is_live(*state))
    }

    pub fn passes(&self) -> usize {
        self.passes
    }

    pub fn merged_states(&self) -> usize {
        self.merged_states
    }
}

// original states covered by a state, plus whether a terminal literal was
// folded into it
type Subset = (BitSet, bool);

struct Determinizer {
    spec: RuleSpec,
    subsets: Vec<Subset>,
    states_by_subset: HashMap<Subset, StateId>,
    original_keywords: Vec<(StateId, String)>,
}

impl Determinizer {
    fn new(spec: RuleSpec) -> Determinizer {
        let mut subsets = Vec::with_capacity(spec.n_states());
        let mut states_by_subset = HashMap::new();
        for (state, _) in spec.rules() {
            let mut covered = BitSet::new();
            covered.insert(state.index());
            subsets.push((covered.clone(), false));
            states_by_subset.insert((covered, false), state);
        }

        let original_keywords = spec
            .keywords()
            .map(|(state, word)| (state, word.to_string()))
            .collect();

        Determinizer {
            spec,
            subsets,
            states_by_subset,
            original_keywords,
        }
    }

    fn run(mut self) -> (RuleSpec, usize) {
        let mut passes = 0;
        loop {
            let indeterminations = self.spec.indeterminations();
            if indeterminations.is_empty() {
                break;
            }

            passes += 1;
            debug!(
                "determinization pass {passes}: {} indeterminations over {} states",
                indeterminations.len(),
                self.spec.n_states()
            );

            // resolved as a batch, rules are only rescanned on the next pass
            for indetermination in &indeterminations {
                self.resolve(indetermination);
            }
        }
        (self.spec, passes)
    }

    fn resolve(&mut self, indetermination: &Indetermination) {
        let mut covered = BitSet::new();
        let mut accepting = indetermination.accepting;
        for target in indetermination.targets() {
            let (target_covered, target_accepting) = &self.subsets[target.index()];
            covered.union_with(target_covered);
            accepting |= *target_accepting;
        }

        let subset = (covered, accepting);
        let merged = match self.states_by_subset.get(&subset) {
            Some(&existing) => existing,
            None => self.merge(indetermination, subset),
        };

        let parent = self.spec.rule_mut(indetermination.parent);
        parent.remove_symbol(indetermination.symbol);
        parent.insert(Production::Transition(indetermination.symbol, merged));
    }

    fn merge(&mut self, indetermination: &Indetermination, subset: Subset) -> StateId {
        let mut rule = Rule::default();
        let mut terminal = subset.1;
        for target in indetermination.targets() {
            rule.union_with(self.spec.rule(target));
            terminal |= self.spec.is_terminal(target);
        }

        let keyword = self.keyword_of(&subset.0);
        let state = self.spec.push_state(rule, terminal, keyword);
        trace!(
            "<{}> on `{}`: merged {:?} into <{state}>",
            indetermination.parent,
            indetermination.symbol,
            subset.0
        );

        self.subsets.push(subset.clone());
        self.states_by_subset.insert(subset, state);
        state
    }

    // a rule looping back to the start state can land two reserved words in
    // one subset (`x<S>` with `if` and `xif`). lowest state wins
    fn keyword_of(&self, covered: &BitSet) -> Option<String> {
        let words: Vec<(StateId, &str)> = self
            .original_keywords
            .iter()
            .filter(|(state, _)| covered.contains(state.index()))
            .map(|(state, word)| (*state, word.as_str()))
            .collect();

        let distinct: BTreeSet<&str> = words.iter().map(|(_, word)| *word).collect();
        let kept = words.first().map(|(_, word)| word.to_string());
        if distinct.len() > 1 {
            warn!("reserved words {:?} share a state, keeping {:?}", distinct, kept);
        }
        kept
    }
}

/// Subset construction to a fixed point, followed by reachability and
/// dead-state analysis.
pub fn determinize(spec: RuleSpec) -> DeterminizedSpec {
    let originals = spec.n_states();
    let (spec, passes) = Determinizer::new(spec).run();
    let merged_states = spec.n_states() - originals;
    debug!("determinized in {passes} passes, {merged_states} merged states");
    with_pruning(spec, passes, merged_states)
}

/// Reachability and dead-state analysis only, no merging. Compiling the result
/// fails if the rules were not deterministic to begin with.
pub fn prune(spec: RuleSpec) -> DeterminizedSpec {
    with_pruning(spec, 0, 0)
}

fn with_pruning(spec: RuleSpec, passes: usize, merged_states: usize) -> DeterminizedSpec {
    let (unreachable, dead) = unreachable_and_dead(&spec);
    debug!(
        "pruned {} unreachable and {} dead states",
        unreachable.len(),
        dead.len()
    );

    DeterminizedSpec {
        spec,
        unreachable,
        dead,
        passes,
        merged_states,
    }
}

fn unreachable_and_dead(spec: &RuleSpec) -> (BitSet, BitSet) {
    let n = spec.n_states();

    // one node per state, plus a sink every terminal state points at
    let mut graph: DiGraph<Option<StateId>, Option<char>> = DiGraph::with_capacity(n + 1, n);
    for (state, _) in spec.rules() {
        graph.add_node(Some(state));
    }
    let accept = graph.add_node(None);

    for (state, rule) in spec.rules() {
        let from = NodeIndex::new(state.index());
        for production in rule.productions() {
            if let Production::Transition(symbol, target) = production {
                graph.add_edge(from, NodeIndex::new(target.index()), Some(*symbol));
            }
        }
        if spec.is_terminal(state) {
            graph.add_edge(from, accept, None);
        }
    }

    let mut reachable = BitSet::with_capacity(n);
    let mut bfs = Bfs::new(&graph, NodeIndex::new(spec.start().index()));
    while let Some(node) = bfs.next(&graph) {
        if let Some(state) = graph[node] {
            reachable.insert(state.index());
        }
    }

    let mut productive = BitSet::with_capacity(n);
    let reversed = Reversed(&graph);
    let mut bfs = Bfs::new(reversed, accept);
    while let Some(node) = bfs.next(reversed) {
        if let Some(state) = graph[node] {
            productive.insert(state.index());
        }
    }

    let unreachable: BitSet = (0..n).filter(|i| !reachable.contains(*i)).collect();
    let dead: BitSet = (0..n)
        .filter(|i| reachable.contains(*i) && !productive.contains(*i))
        .collect();
    (unreachable, dead)
}
