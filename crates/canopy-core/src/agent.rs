use crate::TreeSelector;

/// The external entity a tree drives.
///
/// The engine never interprets an agent beyond this trait:
/// - `stable_id` seeds the agent's RNG stream and keys logs
/// - `kind` is matched against a tree's optional agent restriction
/// - `default_tree` is consulted by setup when no tree is given
pub trait Agent: 'static {
    fn stable_id(&self) -> u64;

    fn kind(&self) -> &str {
        "agent"
    }

    fn default_tree(&self) -> Option<TreeSelector> {
        None
    }
}

impl Agent for u64 {
    fn stable_id(&self) -> u64 {
        *self
    }
}

impl Agent for u32 {
    fn stable_id(&self) -> u64 {
        *self as u64
    }
}

impl Agent for usize {
    fn stable_id(&self) -> u64 {
        *self as u64
    }
}
