//! Enumeration types shared across the hazard boundary.

use serde::{Deserialize, Serialize};

/// Capability being asked of the region protection layer.
///
/// Region plugins can allow or deny each kind of cave mechanic per zone.
/// The hypoxia hazard only ever asks for [`CheckType::Effect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CheckType {
    /// Applying a status effect to a player.
    Effect,
    /// Spawning or altering a cave entity.
    Entity,
    /// Changing blocks in the world.
    Block,
}

/// Kind of status effect applied to a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectKind {
    /// Movement slowness.
    Slow,
    /// Mining fatigue.
    SlowDigging,
}

/// Where a hazard message is shown to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageChannel {
    /// Regular chat line.
    Chat,
    /// Ephemeral overlay above the hotbar.
    ActionBar,
}

impl MessageChannel {
    /// Pick the channel from the `actionbar` configuration flag.
    pub const fn from_actionbar(actionbar: bool) -> Self {
        if actionbar { Self::ActionBar } else { Self::Chat }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actionbar_flag_selects_channel() {
        assert_eq!(MessageChannel::from_actionbar(true), MessageChannel::ActionBar);
        assert_eq!(MessageChannel::from_actionbar(false), MessageChannel::Chat);
    }
}
