use thiserror::Error;

use crate::tree::NodeId;

/// Failures of control-context edits.
///
/// Every variant means "the edit had no effect": nothing was mutated.
#[derive(Debug, Error)]
pub enum Error {
    #[error("node {0} is not part of this tree")]
    UnknownNode(NodeId),
    #[error("the root node of a tree cannot be removed")]
    RootRemoval,
    #[error("effect chain already holds the maximum of {max} effects")]
    EffectChainFull { max: usize },
    #[error("audio graph has no free slot for another node (max {max})")]
    GraphFull { max: usize },
    #[error("effect {0} is not in the chain")]
    UnknownEffect(crate::tree::EffectId),
    #[error("lfo {0} does not exist")]
    UnknownLfo(crate::modulation::LfoId),
    #[cfg(feature = "serde")]
    #[error("project document could not be encoded or decoded")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
