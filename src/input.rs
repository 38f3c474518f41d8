//! Player input as seen by the judgment engine.
//!
//! The host polls its devices once per tick and hands an [`InputSnapshot`] to the engine. A
//! host that only knows which keys are down can bind them to [`InputAction`]s with an
//! [`InputProfile`] and let an [`InputTracker`] derive the press and release edges.

use crate::timeline::{FRET_COUNT, Fret};

/// Something the player can do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InputAction {
    /// Press the green fret.
    Green,
    /// Press the red fret.
    Red,
    /// Press the yellow fret.
    Yellow,
    /// Press the blue fret.
    Blue,
    /// Press the orange fret.
    Orange,
    /// Strum upwards.
    StrumUp,
    /// Strum downwards.
    StrumDown,
    /// Nothing bound.
    #[default]
    None,
}

const BOUND_ACTIONS: usize = 7;

impl InputAction {
    /// Actions that can be bound to a key.
    pub const BOUND: [Self; BOUND_ACTIONS] = [
        Self::Green,
        Self::Red,
        Self::Yellow,
        Self::Blue,
        Self::Orange,
        Self::StrumUp,
        Self::StrumDown,
    ];

    /// The fret this action presses, if it is a fret action.
    #[must_use]
    pub const fn fret(self) -> Option<Fret> {
        match self {
            Self::Green => Some(Fret::Green),
            Self::Red => Some(Fret::Red),
            Self::Yellow => Some(Fret::Yellow),
            Self::Blue => Some(Fret::Blue),
            Self::Orange => Some(Fret::Orange),
            Self::StrumUp | Self::StrumDown | Self::None => None,
        }
    }

    /// Whether this is one of the global strum actions.
    #[must_use]
    pub const fn is_strum(self) -> bool {
        matches!(self, Self::StrumUp | Self::StrumDown)
    }

    const fn slot(self) -> Option<usize> {
        match self {
            Self::None => None,
            other => Some(other as usize),
        }
    }
}

impl Fret {
    /// The action that presses this fret.
    #[must_use]
    pub const fn action(self) -> InputAction {
        match self {
            Self::Green => InputAction::Green,
            Self::Red => InputAction::Red,
            Self::Yellow => InputAction::Yellow,
            Self::Blue => InputAction::Blue,
            Self::Orange => InputAction::Orange,
        }
    }
}

/// State of one fret in a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LaneInput {
    /// The fret is down.
    pub held: bool,
    /// The fret went down in this tick.
    pub just_pressed: bool,
    /// The fret went up in this tick.
    pub just_released: bool,
}

/// Everything the player did in one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InputSnapshot {
    /// Per fret state, indexed by [`Fret::index`].
    pub lanes: [LaneInput; FRET_COUNT],
    /// Either strum direction went down in this tick.
    pub strum_just_pressed: bool,
}

impl InputSnapshot {
    /// A tick where nothing is held and nothing happens.
    #[must_use]
    pub fn idle() -> Self {
        Self::default()
    }

    /// State of the lane at `index`. Lanes the instrument doesn't have are never held.
    #[must_use]
    pub fn lane(&self, index: usize) -> LaneInput {
        self.lanes.get(index).copied().unwrap_or_default()
    }

    /// Marks the fret as held.
    #[must_use]
    pub fn hold(mut self, fret: Fret) -> Self {
        if let Some(lane) = self.lanes.get_mut(fret.index()) {
            lane.held = true;
        }
        self
    }

    /// Marks the fret as pressed in this tick, which also holds it.
    #[must_use]
    pub fn press(mut self, fret: Fret) -> Self {
        if let Some(lane) = self.lanes.get_mut(fret.index()) {
            lane.held = true;
            lane.just_pressed = true;
        }
        self
    }

    /// Marks the fret as released in this tick.
    #[must_use]
    pub fn release(mut self, fret: Fret) -> Self {
        if let Some(lane) = self.lanes.get_mut(fret.index()) {
            lane.held = false;
            lane.just_released = true;
        }
        self
    }

    /// Strums in this tick.
    #[must_use]
    pub const fn strum(mut self) -> Self {
        self.strum_just_pressed = true;
        self
    }
}

/// Key bindings of one input device. `K` is whatever the host uses to name keys or buttons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputProfile<K> {
    bindings: [Option<K>; BOUND_ACTIONS],
}

impl<K> Default for InputProfile<K> {
    fn default() -> Self {
        Self {
            bindings: std::array::from_fn(|_| None),
        }
    }
}

impl<K> InputProfile<K> {
    /// A profile with nothing bound.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A profile binding every action of [`InputAction::BOUND`] to the key at the same
    /// position, such as the five number keys followed by the two strum keys.
    #[must_use]
    pub fn from_keys(keys: [K; BOUND_ACTIONS]) -> Self {
        Self {
            bindings: keys.map(Some),
        }
    }

    /// Binds `key` to `action`, replacing the previous binding.
    #[must_use]
    pub fn with_binding(mut self, action: InputAction, key: K) -> Self {
        self.set_binding(action, key);
        self
    }

    /// Binds `key` to `action`. Binding [`InputAction::None`] does nothing.
    pub fn set_binding(&mut self, action: InputAction, key: K) {
        if let Some(slot) = action.slot().and_then(|slot| self.bindings.get_mut(slot)) {
            *slot = Some(key);
        }
    }

    /// The key bound to `action`.
    #[must_use]
    pub fn binding(&self, action: InputAction) -> Option<&K> {
        action
            .slot()
            .and_then(|slot| self.bindings.get(slot))
            .and_then(Option::as_ref)
    }
}

/// Remembers which actions were down in the previous poll to find press and release edges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputTracker {
    down: [bool; BOUND_ACTIONS],
}

impl InputTracker {
    /// A tracker that assumes nothing was down before.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Polls every bound key with `is_down` and returns this tick's snapshot.
    ///
    /// Unbound actions are never down.
    pub fn poll<K>(
        &mut self,
        profile: &InputProfile<K>,
        mut is_down: impl FnMut(&K) -> bool,
    ) -> InputSnapshot {
        let mut snapshot = InputSnapshot::idle();
        for (action, was_down) in InputAction::BOUND.into_iter().zip(self.down.iter_mut()) {
            let down = profile.binding(action).is_some_and(&mut is_down);
            let pressed = down && !*was_down;
            let released = !down && *was_down;
            *was_down = down;

            if let Some(lane) = action.fret().and_then(|fret| snapshot.lanes.get_mut(fret.index())) {
                *lane = LaneInput {
                    held: down,
                    just_pressed: pressed,
                    just_released: released,
                };
            } else if action.is_strum() && pressed {
                snapshot.strum_just_pressed = true;
            }
        }
        snapshot
    }
}
