//! Compact transducers for long lists of string pairs.
//!
//! Inputs are stored in one trie; every input node that ends an entry
//! owns a private trie of the outputs paired with that input. Identical
//! pairs share a path, and their weights are summed in the semiring.

use std::collections::BTreeMap;

use grm_fst::{Arc, EPSILON, Label, Semiring, StateId, VectorFst};

#[derive(Debug, Default)]
struct InputNode {
    children: BTreeMap<Label, usize>,
    output: Option<usize>,
    state: StateId,
}

#[derive(Debug)]
struct OutputNode<W> {
    children: BTreeMap<Label, usize>,
    weight: W,
    state: StateId,
}

#[derive(Debug)]
pub struct PrefixTree<W> {
    inputs: Vec<InputNode>,
    outputs: Vec<OutputNode<W>>,
    num_states: StateId,
}

impl<W: Semiring> Default for PrefixTree<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Semiring> PrefixTree<W> {
    pub fn new() -> Self {
        PrefixTree {
            inputs: Vec::new(),
            outputs: Vec::new(),
            num_states: 0,
        }
    }

    pub fn num_states(&self) -> usize {
        self.num_states as usize
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    fn next_state(&mut self) -> StateId {
        let state = self.num_states;
        self.num_states += 1;
        state
    }

    /// Adds one entry. Epsilon labels in either sequence are skipped.
    pub fn add(&mut self, input: &[Label], output: &[Label], weight: W) {
        if self.inputs.is_empty() {
            let state = self.next_state();
            self.inputs.push(InputNode {
                state,
                ..InputNode::default()
            });
        }
        let mut node = 0;
        for &label in input.iter().filter(|&&l| l != EPSILON) {
            node = match self.inputs[node].children.get(&label) {
                Some(&child) => child,
                None => {
                    let state = self.next_state();
                    self.inputs.push(InputNode {
                        state,
                        ..InputNode::default()
                    });
                    let child = self.inputs.len() - 1;
                    self.inputs[node].children.insert(label, child);
                    child
                }
            };
        }

        let mut out = match self.inputs[node].output {
            Some(root) => root,
            None => {
                let root = self.new_output_node();
                self.inputs[node].output = Some(root);
                root
            }
        };
        for &label in output.iter().filter(|&&l| l != EPSILON) {
            out = match self.outputs[out].children.get(&label) {
                Some(&child) => child,
                None => {
                    let child = self.new_output_node();
                    self.outputs[out].children.insert(label, child);
                    child
                }
            };
        }
        let node = &mut self.outputs[out];
        node.weight = node.weight.plus(&weight);
    }

    fn new_output_node(&mut self) -> usize {
        let state = self.next_state();
        self.outputs.push(OutputNode {
            children: BTreeMap::new(),
            weight: W::zero(),
            state,
        });
        self.outputs.len() - 1
    }

    pub fn clear(&mut self) {
        self.inputs.clear();
        self.outputs.clear();
        self.num_states = 0;
    }

    /// One state per trie node, the input root as start. Input edges read
    /// their label and write nothing, output edges do the reverse, and an
    /// epsilon arc joins each input node to its output trie.
    pub fn to_fst(&self) -> VectorFst<W> {
        let mut fst = VectorFst::new();
        if self.inputs.is_empty() {
            return fst;
        }
        for _ in 0..self.num_states {
            fst.add_state();
        }
        fst.set_start(self.inputs[0].state);
        for node in &self.inputs {
            if let Some(out) = node.output {
                let target = self.outputs[out].state;
                fst.add_arc(node.state, Arc::new(EPSILON, EPSILON, W::one(), target));
            }
            for (&label, &child) in &node.children {
                let target = self.inputs[child].state;
                fst.add_arc(node.state, Arc::new(label, EPSILON, W::one(), target));
            }
        }
        for node in &self.outputs {
            for (&label, &child) in &node.children {
                let target = self.outputs[child].state;
                fst.add_arc(node.state, Arc::new(EPSILON, label, W::one(), target));
            }
            fst.set_final(node.state, node.weight);
        }
        fst
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grm_fst::TropicalWeight;
    use grm_fst::ops::paths::{paths, transduce};

    type W = TropicalWeight;

    fn labels(text: &str) -> Vec<Label> {
        text.bytes().map(Label::from).collect()
    }

    #[test]
    fn repeated_pairs_accumulate_weight() {
        let mut tree = PrefixTree::<W>::new();
        tree.add(&labels("ab"), &labels("x"), TropicalWeight(1.0));
        tree.add(&labels("ab"), &labels("x"), TropicalWeight(2.0));
        let fst = tree.to_fst();
        let found = paths(&fst, 10);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].ilabels, labels("ab"));
        assert_eq!(found[0].olabels, labels("x"));
        assert_eq!(found[0].weight, TropicalWeight(1.0).plus(&TropicalWeight(2.0)));
    }

    #[test]
    fn shares_prefixes_and_output_tries() {
        let mut tree = PrefixTree::<W>::new();
        tree.add(&labels("ab"), &labels("x"), W::one());
        tree.add(&labels("ab"), &labels("y"), W::one());
        tree.add(&labels("ac"), &labels("x"), W::one());
        // Inputs: root, a, ab, ac. Outputs: ab -> {root, x, y}, ac -> {root, x}.
        assert_eq!(tree.num_states(), 9);
        let fst = tree.to_fst();
        assert!(fst.num_states() < 3 * 5);
        assert_eq!(
            transduce(&fst, &labels("ab")),
            vec![labels("x"), labels("y")]
        );
        assert_eq!(transduce(&fst, &labels("ac")), vec![labels("x")]);
        assert!(transduce(&fst, &labels("a")).is_empty());
    }

    #[test]
    fn skips_epsilons_and_allows_empty_sides() {
        let mut tree = PrefixTree::<W>::new();
        tree.add(&[EPSILON, 97], &[], W::one());
        let fst = tree.to_fst();
        assert_eq!(transduce(&fst, &[97]), vec![Vec::<Label>::new()]);
    }

    #[test]
    fn empty_tree_has_no_states() {
        let mut tree = PrefixTree::<W>::new();
        assert_eq!(tree.to_fst().num_states(), 0);
        tree.add(&[1], &[2], W::one());
        tree.clear();
        assert!(tree.is_empty());
        assert_eq!(tree.num_states(), 0);
    }
}
