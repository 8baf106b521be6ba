use automata_core::prelude::*;

use crate::{
    adt::{Adt, NodeId},
    Result,
};

/// Decides how a leaf that is not the root is split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LeafSplitters {
    /// Inserts a reset node at the position of the leaf, followed by the complete splitter.
    #[default]
    DefaultSplitter,
    /// If the splitter starts with the trace that leads to the leaf inside its ADS, the ADS is
    /// extended with the remainder of the splitter. Otherwise behaves like
    /// [`LeafSplitters::DefaultSplitter`].
    ExtendParent,
}

impl LeafSplitters {
    pub(crate) fn split<S: Symbol, O: Color>(
        self,
        adt: &mut Adt<S, O>,
        leaf: NodeId,
        splitter: &Word<S>,
        old_output: &Word<O>,
        new_output: &Word<O>,
    ) -> Result<NodeId> {
        match self {
            LeafSplitters::DefaultSplitter => {
                adt.split_with_reset(leaf, splitter, old_output, new_output)
            }
            LeafSplitters::ExtendParent => {
                let (trace, _) = adt.build_trace_for_node(leaf);
                let length = trace.len();
                let extendable = !trace.is_empty()
                    && splitter.starts_with(&trace)
                    && old_output.len() >= length
                    && old_output.prefix(length) == new_output.prefix(length);
                if extendable {
                    adt.extend_in_place(leaf, splitter, old_output, new_output)
                } else {
                    adt.split_with_reset(leaf, splitter, old_output, new_output)
                }
            }
        }
    }
}
