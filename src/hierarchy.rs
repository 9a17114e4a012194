// Deck hierarchy assembly: folds `::`-delimited deck names into a tree,
// attaches extracted cards to terminal nodes and rolls up card counts.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::models::{CardRecord, EnrichedCard, NoteRecord};

pub const HIERARCHY_SEPARATOR: &str = "::";

/// Anki's built-in default deck, excluded from the tree.
pub const DEFAULT_DECK_NAME: &str = "Default";

/// How a node participates in the hierarchy. A node carrying both children
/// and cards classifies as a deck.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Folder,
    Deck,
}

#[derive(Debug, Clone)]
pub struct DeckNode {
    /// Source deck id of the terminal deck row, 0 for pure folder nodes.
    pub id: i64,
    /// Leaf segment of the hierarchy path.
    pub name: String,
    pub full_path: String,
    pub level: usize,
    pub children: BTreeMap<String, DeckNode>,
    pub cards: Vec<EnrichedCard>,
    /// Own direct cards plus the totals of all children; filled by the
    /// roll-up pass after assembly.
    pub total_cards: usize,
}

impl DeckNode {
    fn new(name: &str, full_path: &str, level: usize) -> Self {
        DeckNode {
            id: 0,
            name: name.to_string(),
            full_path: full_path.to_string(),
            level,
            children: BTreeMap::new(),
            cards: Vec::new(),
            total_cards: 0,
        }
    }

    pub fn kind(&self) -> NodeKind {
        if self.cards.is_empty() && !self.children.is_empty() {
            NodeKind::Folder
        } else {
            NodeKind::Deck
        }
    }
}

/// Assembled deck tree. Root names are the candidate collection names.
#[derive(Debug, Default)]
pub struct DeckTree {
    pub roots: BTreeMap<String, DeckNode>,
}

impl DeckTree {
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Full paths of every node that carries cards, in tree order.
    pub fn deck_paths(&self) -> Vec<String> {
        self.decks_with_cards()
            .into_iter()
            .map(|node| node.full_path.clone())
            .collect()
    }

    /// Nodes that carry cards directly (the persistable decks).
    pub fn decks_with_cards(&self) -> Vec<&DeckNode> {
        let mut decks = Vec::new();
        for root in self.roots.values() {
            collect_decks(root, &mut decks);
        }
        decks
    }

    pub fn total_cards(&self) -> usize {
        self.roots.values().map(|root| root.total_cards).sum()
    }
}

fn collect_decks<'a>(node: &'a DeckNode, out: &mut Vec<&'a DeckNode>) {
    if !node.cards.is_empty() {
        out.push(node);
    }
    for child in node.children.values() {
        collect_decks(child, out);
    }
}

/// Build the deck tree from extracted deck names, cards and notes. The
/// default deck is excluded; a deck row's cards attach to its terminal node
/// only when that row itself carries cards.
pub fn build(
    deck_names: &HashMap<i64, String>,
    cards: &[CardRecord],
    notes: &[NoteRecord],
) -> DeckTree {
    let notes_by_id: HashMap<i64, &NoteRecord> = notes.iter().map(|n| (n.id, n)).collect();

    let mut cards_by_deck: HashMap<i64, Vec<EnrichedCard>> = HashMap::new();
    for card in cards {
        if let Some(note) = notes_by_id.get(&card.note_id) {
            cards_by_deck.entry(card.deck_id).or_default().push(EnrichedCard {
                card: card.clone(),
                note: (*note).clone(),
            });
        } else {
            debug!("card {} references missing note {}", card.card_id, card.note_id);
        }
    }

    let mut decks: Vec<(&i64, &String)> = deck_names.iter().collect();
    decks.sort_by(|a, b| a.1.cmp(b.1));

    let mut tree = DeckTree::default();
    for (deck_id, name) in decks {
        if name == DEFAULT_DECK_NAME || name.trim().is_empty() {
            continue;
        }

        let segments: Vec<&str> = name.split(HIERARCHY_SEPARATOR).collect();
        let mut node = tree
            .roots
            .entry(segments[0].to_string())
            .or_insert_with(|| DeckNode::new(segments[0], segments[0], 0));

        for (level, segment) in segments.iter().enumerate().skip(1) {
            let path = format!("{}{}{}", node.full_path, HIERARCHY_SEPARATOR, segment);
            node = node
                .children
                .entry(segment.to_string())
                .or_insert_with(|| DeckNode::new(segment, &path, level));
        }

        if let Some(enriched) = cards_by_deck.remove(deck_id) {
            node.id = *deck_id;
            node.cards.extend(enriched);
        } else if node.id == 0 {
            node.id = *deck_id;
        }
    }

    for root in tree.roots.values_mut() {
        roll_up(root);
    }
    tree
}

fn roll_up(node: &mut DeckNode) -> usize {
    let mut total = node.cards.len();
    for child in node.children.values_mut() {
        total += roll_up(child);
    }
    node.total_cards = total;
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(id: i64) -> NoteRecord {
        NoteRecord {
            id,
            guid: format!("g{}", id),
            model_id: 0,
            tags: vec![],
            raw_fields: String::new(),
            front: format!("front {}", id),
            back: format!("back {}", id),
        }
    }

    fn card(card_id: i64, note_id: i64, deck_id: i64) -> CardRecord {
        CardRecord {
            card_id,
            note_id,
            deck_id,
            ordinal: 0,
            card_type: 0,
            queue: 0,
        }
    }

    fn names(entries: &[(i64, &str)]) -> HashMap<i64, String> {
        entries.iter().map(|(id, name)| (*id, name.to_string())).collect()
    }

    #[test]
    fn builds_nested_tree_and_attaches_cards_to_terminals() {
        let deck_names = names(&[(1, "Default"), (10, "Cardio::Arrhythmia"), (11, "Cardio::Valves"), (12, "Neuro")]);
        let notes = vec![note(1), note(2), note(3)];
        let cards = vec![card(100, 1, 10), card(101, 2, 10), card(102, 3, 12)];

        let tree = build(&deck_names, &cards, &notes);

        assert_eq!(tree.roots.len(), 2);
        let cardio = &tree.roots["Cardio"];
        assert_eq!(cardio.kind(), NodeKind::Folder);
        assert_eq!(cardio.children["Arrhythmia"].cards.len(), 2);
        assert_eq!(cardio.children["Arrhythmia"].full_path, "Cardio::Arrhythmia");
        assert_eq!(cardio.children["Arrhythmia"].level, 1);
        assert!(cardio.children["Valves"].cards.is_empty());

        let neuro = &tree.roots["Neuro"];
        assert_eq!(neuro.kind(), NodeKind::Deck);
        assert_eq!(neuro.cards.len(), 1);
    }

    #[test]
    fn roll_up_invariant_holds_for_every_node() {
        let deck_names = names(&[
            (10, "A"),
            (11, "A::B"),
            (12, "A::B::C"),
            (13, "A::D"),
        ]);
        let notes: Vec<NoteRecord> = (1..=6).map(note).collect();
        let cards = vec![
            card(100, 1, 10),
            card(101, 2, 11),
            card(102, 3, 12),
            card(103, 4, 12),
            card(104, 5, 13),
            card(105, 6, 13),
        ];

        let tree = build(&deck_names, &cards, &notes);
        let a = &tree.roots["A"];

        fn check(node: &DeckNode) {
            let children_total: usize = node.children.values().map(|c| c.total_cards).sum();
            assert_eq!(node.total_cards, node.cards.len() + children_total);
            for child in node.children.values() {
                check(child);
            }
        }
        check(a);

        assert_eq!(a.total_cards, 6);
        assert_eq!(a.children["B"].total_cards, 3);
        assert_eq!(a.children["B"].children["C"].total_cards, 2);
        assert_eq!(tree.total_cards(), 6);
    }

    #[test]
    fn default_deck_is_excluded() {
        let deck_names = names(&[(1, "Default")]);
        let notes = vec![note(1)];
        let cards = vec![card(100, 1, 1)];

        let tree = build(&deck_names, &cards, &notes);
        assert!(tree.is_empty());
    }

    #[test]
    fn node_with_children_and_own_cards_classifies_as_deck() {
        let deck_names = names(&[(10, "A"), (11, "A::B")]);
        let notes = vec![note(1), note(2)];
        let cards = vec![card(100, 1, 10), card(101, 2, 11)];

        let tree = build(&deck_names, &cards, &notes);
        let a = &tree.roots["A"];
        assert!(!a.children.is_empty());
        assert!(!a.cards.is_empty());
        assert_eq!(a.kind(), NodeKind::Deck);
        assert_eq!(tree.deck_paths(), vec!["A", "A::B"]);
    }
}
