//! Lookup tables shipped to the game client so it can map dialogue text it
//! displays back to a pre-rendered sound file.

use log::warn;
use std::collections::BTreeMap;

use crate::core::dataset::SpeakerKind;
use crate::services::normalizer::NormalizedVariant;

pub mod lua;

const EXCERPT_WORDS: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Key {
    Int(i64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Scalar {
    Int(i64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Leaf(Scalar),
    Branch(BTreeMap<Key, Node>),
}

/// Replaces single-key chains by their only value until a leaf or a
/// branch with more than one key is reached.
pub fn collapse(node: Node) -> Node {
    match node {
        Node::Branch(mut map) if map.len() == 1 => match map.pop_first() {
            Some((_, child)) => collapse(child),
            None => Node::Branch(map),
        },
        other => other,
    }
}

/// Collapses every entry below the root, top-down. The root keeps its keys.
pub fn prune(node: Node) -> Node {
    match node {
        Node::Branch(map) => Node::Branch(
            map.into_iter()
                .map(|(key, child)| (key, prune(collapse(child))))
                .collect(),
        ),
        leaf => leaf,
    }
}

/// Nested map built path by path. On a key collision the smaller value is
/// kept so the result does not depend on row order.
#[derive(Debug, Default)]
pub struct TableBuilder {
    root: BTreeMap<Key, Node>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: &[Key], value: Scalar) {
        let Some((last, parents)) = path.split_last() else {
            return;
        };

        let mut map = &mut self.root;
        for key in parents {
            let entry = map
                .entry(key.clone())
                .or_insert_with(|| Node::Branch(BTreeMap::new()));
            map = match entry {
                Node::Branch(child) => child,
                Node::Leaf(_) => {
                    warn!("Lookup path {:?} runs through a leaf, dropping", path);
                    return;
                }
            };
        }

        match map.get_mut(last) {
            Some(Node::Leaf(existing)) => {
                if value < *existing {
                    *existing = value;
                }
            }
            Some(Node::Branch(_)) => warn!("Lookup path {:?} ends on a branch, dropping", path),
            None => {
                map.insert(last.clone(), Node::Leaf(value));
            }
        }
    }

    pub fn build(self) -> Node {
        Node::Branch(self.root)
    }
}

/// Makes text safe to embed as a table key or value.
pub fn escape(text: &str) -> String {
    text.replace('"', "'").replace(['\r', '\n'], " ")
}

/// First and last fifteen words of a dialogue, used to recognise it at
/// runtime without storing the full text.
pub fn excerpt(text: &str) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    let head = &words[..words.len().min(EXCERPT_WORDS)];
    let tail = &words[words.len().saturating_sub(EXCERPT_WORDS)..];
    let joined = format!("{} {}", head.join(" "), tail.join(" "));
    escape(&joined).replace("$b", " ").replace("$B", " ")
}

fn gossip_rows(variants: &[NormalizedVariant], kind: SpeakerKind) -> impl Iterator<Item = &NormalizedVariant> {
    variants
        .iter()
        .filter(move |v| v.record.quest_key().is_none() && v.record.kind == kind)
}

/// speakerID -> text -> content hash, gossip only.
pub fn gossip_by_id(variants: &[NormalizedVariant], kind: SpeakerKind) -> Node {
    let mut table = TableBuilder::new();
    for v in gossip_rows(variants, kind) {
        table.insert(
            &[Key::Int(v.record.id), Key::Str(escape(&v.record.text))],
            Scalar::Str(v.content_hash.clone()),
        );
    }
    table.build()
}

/// speakerName -> text -> content hash, gossip only.
pub fn gossip_by_name(variants: &[NormalizedVariant], kind: SpeakerKind) -> Node {
    let mut table = TableBuilder::new();
    for v in gossip_rows(variants, kind) {
        table.insert(
            &[Key::Str(escape(&v.record.name)), Key::Str(escape(&v.record.text))],
            Scalar::Str(v.content_hash.clone()),
        );
    }
    table.build()
}

/// questID -> ID of the speaker who gives the quest.
pub fn quest_givers(variants: &[NormalizedVariant], kind: SpeakerKind) -> Node {
    let mut table = TableBuilder::new();
    for v in variants
        .iter()
        .filter(|v| v.record.source == "accept" && v.record.kind == kind)
    {
        if let Some(quest_id) = v.record.quest_id() {
            table.insert(&[Key::Int(quest_id)], Scalar::Int(v.record.id));
        }
    }
    table.build()
}

/// speakerID -> speakerName.
pub fn names(variants: &[NormalizedVariant], kind: SpeakerKind) -> Node {
    let mut table = TableBuilder::new();
    for v in variants.iter().filter(|v| v.record.kind == kind) {
        table.insert(&[Key::Int(v.record.id)], Scalar::Str(escape(&v.record.name)));
    }
    table.build()
}

/// sourceKind -> questTitle -> speakerName -> excerpt -> questID, pruned.
pub fn quest_ids(variants: &[NormalizedVariant]) -> Node {
    let mut table = TableBuilder::new();
    for v in variants.iter().filter(|v| !v.record.is_progress()) {
        let Some(quest_key) = v.record.quest_key() else {
            continue;
        };
        let Some(quest_id) = v.record.quest_id() else {
            warn!("Skipping non-numeric quest id {:?}", quest_key);
            continue;
        };
        table.insert(
            &[
                Key::Str(v.record.source.clone()),
                Key::Str(escape(&v.record.quest_title)),
                Key::Str(escape(&v.record.name)),
                Key::Str(excerpt(&v.record.text)),
            ],
            Scalar::Int(quest_id),
        );
    }
    prune(table.build())
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledTable {
    pub file_name: &'static str,
    pub field: &'static str,
    pub tree: Node,
}

pub fn compile(variants: &[NormalizedVariant]) -> Vec<CompiledTable> {
    use SpeakerKind::*;

    let table = |file_name, field, tree| CompiledTable {
        file_name,
        field,
        tree,
    };

    vec![
        table("npc_gossip_file_lookups", "GossipLookupByNPCID", gossip_by_id(variants, Creature)),
        table("object_gossip_file_lookups", "GossipLookupByObjectID", gossip_by_id(variants, Gameobject)),
        table("quest_id_lookups", "QuestIDLookup", quest_ids(variants)),
        table("npc_name_gossip_file_lookups", "GossipLookupByNPCName", gossip_by_name(variants, Creature)),
        table("object_name_gossip_file_lookups", "GossipLookupByObjectName", gossip_by_name(variants, Gameobject)),
        table("questlog_npc_lookups", "NPCIDLookupByQuestID", quest_givers(variants, Creature)),
        table("questlog_object_lookups", "ObjectIDLookupByQuestID", quest_givers(variants, Gameobject)),
        table("questlog_item_lookups", "ItemIDLookupByQuestID", quest_givers(variants, Item)),
        table("npc_name_lookups", "NPCNameLookupByNPCID", names(variants, Creature)),
        table("object_name_lookups", "ObjectNameLookupByObjectID", names(variants, Gameobject)),
        table("item_name_lookups", "ItemNameLookupByItemID", names(variants, Item)),
    ]
}
