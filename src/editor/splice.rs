use serde::{Deserialize, Serialize};
use tracing::trace;

use super::clipboard::from_plain_text;
use super::error::{EditorError, Result};
use super::fragment::{Fragment, FragmentNode};
use super::node::{Direction, NodeData, NodeId, NodeKind};
use super::selection::BlockOffset;
use super::store::Document;

/// How two runs of different formats meet at a paste boundary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMergePolicy {
    /// Both runs keep their own format.
    #[default]
    KeepSeparate,
    /// The inserted edge run takes the format of the host run it touches.
    HostWins,
    /// The host run takes the format of the inserted run it touches.
    InsertedWins,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AtomKind {
    Paragraph,
    /// One item of the source list with the given ordinal in the fragment.
    Item { list: usize, ordered: bool },
}

/// A block-shaped unit of a pasted fragment.
#[derive(Clone, Debug)]
struct Atom {
    kind: AtomKind,
    direction: Option<Direction>,
    runs: Vec<FragmentNode>,
}

impl Atom {
    fn paragraph(direction: Option<Direction>, runs: Vec<FragmentNode>) -> Self {
        Self {
            kind: AtomKind::Paragraph,
            direction,
            runs,
        }
    }
}

fn atomize(fragment: &Fragment) -> Vec<Atom> {
    let mut atoms = Vec::new();
    let mut inline: Vec<FragmentNode> = Vec::new();
    for (ordinal, node) in fragment.nodes.iter().enumerate() {
        if node.kind().is_leaf() {
            inline.push(node.clone());
            continue;
        }
        if !inline.is_empty() {
            atoms.push(Atom::paragraph(None, std::mem::take(&mut inline)));
        }
        match &node.data {
            NodeData::Paragraph { direction } => {
                atoms.push(Atom::paragraph(*direction, node.children.clone()));
            }
            NodeData::List { ordered } => {
                for item in &node.children {
                    atoms.push(Atom {
                        kind: AtomKind::Item {
                            list: ordinal,
                            ordered: *ordered,
                        },
                        direction: item.data.direction(),
                        runs: item.children.clone(),
                    });
                }
            }
            NodeData::ListItem { direction } => atoms.push(Atom {
                kind: AtomKind::Item {
                    list: ordinal,
                    ordered: false,
                },
                direction: *direction,
                runs: node.children.clone(),
            }),
            NodeData::Root | NodeData::Text { .. } | NodeData::Decorator { .. } => {
                for line in from_plain_text(&node.text_content()).nodes {
                    atoms.push(Atom::paragraph(None, line.children));
                }
            }
        }
    }
    if !inline.is_empty() {
        atoms.push(Atom::paragraph(None, inline));
    }
    atoms
}

/// Where the next inserted block goes while a paste is in progress.
struct Placement {
    container: NodeId,
    next_index: usize,
    /// Host list and the index of the next item, while no paragraph has
    /// broken it yet.
    host_list: Option<(NodeId, usize)>,
    /// List created by this paste that item atoms of the same source list
    /// keep joining.
    open_list: Option<(usize, NodeId)>,
    /// Host list items after the caret, set aside once the list is split.
    tail: Vec<NodeId>,
    tail_ordered: bool,
    last_block: NodeId,
}

impl Document {
    /// Splices a fragment into the document at a collapsed caret and
    /// returns the caret after the inserted content.
    pub fn insert_fragment(
        &mut self,
        at: BlockOffset,
        fragment: &Fragment,
        policy: RunMergePolicy,
    ) -> Result<BlockOffset> {
        let atoms = atomize(fragment);
        let Some((first, rest)) = atoms.split_first() else {
            return Ok(at);
        };

        let host = at.block;
        let host_kind = self.kind(host)?;
        if !host_kind.is_block() {
            return Err(EditorError::InvalidSelection(format!(
                "{host_kind} {host} cannot host inline content"
            )));
        }
        let (host_parent, host_index) = self.position(host)?.ok_or_else(|| {
            EditorError::InvalidSelection(format!("{host} is not attached to the document"))
        })?;

        let boundary = self.split_inline(host, at.offset)?;
        let suffix = self.take_children(host, boundary)?;
        let host_was_empty = self.child_count(host)? == 0 && suffix.is_empty();
        let host_direction = self.data(host)?.direction();
        trace!(%host, atoms = atoms.len(), suffix = suffix.len(), "splice: inserting fragment");

        let mut placement = if host_kind == NodeKind::ListItem {
            let (container, list_index) = self.position(host_parent)?.ok_or_else(|| {
                EditorError::InvalidSelection(format!("{host_parent} is not attached"))
            })?;
            let tail_ordered = matches!(self.data(host_parent)?, NodeData::List { ordered: true });
            Placement {
                container,
                next_index: list_index + 1,
                host_list: Some((host_parent, host_index + 1)),
                open_list: None,
                tail: Vec::new(),
                tail_ordered,
                last_block: host,
            }
        } else {
            Placement {
                container: host_parent,
                next_index: host_index + 1,
                host_list: None,
                open_list: None,
                tail: Vec::new(),
                tail_ordered: false,
                last_block: host,
            }
        };

        let merge_first = host_kind == NodeKind::ListItem || first.kind == AtomKind::Paragraph;
        let consume_host = !merge_first && host_was_empty;
        let placed_atoms = if merge_first {
            self.merge_into_host(host, first, policy)?;
            rest
        } else {
            atoms.as_slice()
        };
        for atom in placed_atoms {
            self.place_atom(&mut placement, atom)?;
        }

        let last = placement.last_block;
        let caret = BlockOffset::new(last, self.caret_len(last)?);
        let last_is_item = self.kind(last)? == NodeKind::ListItem;
        if last_is_item && host_kind == NodeKind::Paragraph {
            if !(suffix.is_empty() && consume_host) {
                let paragraph = self.create_node(NodeData::Paragraph {
                    direction: host_direction,
                });
                self.append_children(paragraph, suffix)?;
                self.insert_child(placement.container, placement.next_index, paragraph)?;
                placement.next_index += 1;
            }
        } else {
            self.append_suffix(last, suffix, policy)?;
        }

        if !placement.tail.is_empty() {
            let tail = std::mem::take(&mut placement.tail);
            let joinable = match placement.open_list {
                Some((_, list)) => matches!(
                    self.data(list)?,
                    NodeData::List { ordered } if *ordered == placement.tail_ordered
                )
                .then_some(list),
                None => None,
            };
            match joinable {
                Some(list) => self.append_children(list, tail)?,
                None => {
                    let list = self.create_node(NodeData::list(placement.tail_ordered));
                    self.append_children(list, tail)?;
                    self.insert_child(placement.container, placement.next_index, list)?;
                }
            }
        }

        if consume_host {
            self.remove_node(host)?;
        }
        let root = self.root();
        self.normalize(root)?;
        Ok(caret)
    }

    fn merge_into_host(&mut self, host: NodeId, atom: &Atom, policy: RunMergePolicy) -> Result<()> {
        let edge = self.children(host)?.last().copied();
        let runs = self.instantiate_runs(&atom.runs)?;
        if let (Some(host_run), Some(&inserted)) = (edge, runs.first()) {
            self.apply_merge_policy(host_run, inserted, policy)?;
        }
        self.append_children(host, runs)?;
        if self.data(host)?.direction().is_none() {
            self.set_direction(host, atom.direction)?;
        }
        Ok(())
    }

    fn append_suffix(&mut self, block: NodeId, suffix: Vec<NodeId>, policy: RunMergePolicy) -> Result<()> {
        let edge = self.children(block)?.last().copied();
        if let (Some(inserted), Some(&host_run)) = (edge, suffix.first()) {
            self.apply_merge_policy(host_run, inserted, policy)?;
        }
        self.append_children(block, suffix)
    }

    fn place_atom(&mut self, placement: &mut Placement, atom: &Atom) -> Result<()> {
        match atom.kind {
            AtomKind::Item { list, ordered } => {
                let item = self.build_block(NodeData::ListItem {
                    direction: atom.direction,
                }, &atom.runs)?;
                if let Some((host_list, index)) = placement.host_list {
                    self.insert_child(host_list, index, item)?;
                    placement.host_list = Some((host_list, index + 1));
                } else {
                    let target = match placement.open_list {
                        Some((ordinal, existing)) if ordinal == list => existing,
                        _ => {
                            let created = self.create_node(NodeData::list(ordered));
                            self.insert_child(placement.container, placement.next_index, created)?;
                            placement.next_index += 1;
                            placement.open_list = Some((list, created));
                            created
                        }
                    };
                    self.append_child(target, item)?;
                }
                placement.last_block = item;
            }
            AtomKind::Paragraph => {
                if let Some((host_list, index)) = placement.host_list.take() {
                    placement.tail = self.take_children(host_list, index)?;
                    trace!(list = %host_list, moved = placement.tail.len(), "splice: splitting host list");
                }
                placement.open_list = None;
                let paragraph = self.build_block(NodeData::Paragraph {
                    direction: atom.direction,
                }, &atom.runs)?;
                self.insert_child(placement.container, placement.next_index, paragraph)?;
                placement.next_index += 1;
                placement.last_block = paragraph;
            }
        }
        Ok(())
    }

    fn build_block(&mut self, data: NodeData, runs: &[FragmentNode]) -> Result<NodeId> {
        let block = self.create_node(data);
        let runs = self.instantiate_runs(runs)?;
        self.append_children(block, runs)?;
        Ok(block)
    }

    fn instantiate_runs(&mut self, runs: &[FragmentNode]) -> Result<Vec<NodeId>> {
        let mut ids = Vec::with_capacity(runs.len());
        for run in runs {
            ids.push(self.instantiate(run)?);
        }
        Ok(ids)
    }

    fn apply_merge_policy(&mut self, host_run: NodeId, inserted: NodeId, policy: RunMergePolicy) -> Result<()> {
        let (NodeData::Text { format: host_format, .. }, NodeData::Text { format: inserted_format, .. }) =
            (self.data(host_run)?, self.data(inserted)?)
        else {
            return Ok(());
        };
        let (host_format, inserted_format) = (*host_format, *inserted_format);
        if host_format == inserted_format {
            return Ok(());
        }
        match policy {
            RunMergePolicy::KeepSeparate => Ok(()),
            RunMergePolicy::HostWins => self.set_format(inserted, host_format),
            RunMergePolicy::InsertedWins => self.set_format(host_run, inserted_format),
        }
    }
}
