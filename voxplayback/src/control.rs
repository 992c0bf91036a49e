//! The fixed set of transport controls

/// Interactive controls attached to every "now playing" notice.
///
/// A closed set on purpose: control dispatch is a match over this enum, not
/// a string-keyed lookup into arbitrary handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    Skip,
    PlayPause,
    Mute,
    VolumeUp,
    VolumeDown,
    Loop,
    Shuffle,
    Stop,
}

impl Control {
    pub const ALL: [Control; 8] = [
        Control::Skip,
        Control::PlayPause,
        Control::Mute,
        Control::VolumeUp,
        Control::VolumeDown,
        Control::Loop,
        Control::Shuffle,
        Control::Stop,
    ];

    /// Stable identifier for wiring to interactive components.
    pub fn id(&self) -> &'static str {
        match self {
            Control::Skip => "skip",
            Control::PlayPause => "play_pause",
            Control::Mute => "mute",
            Control::VolumeUp => "volume_up",
            Control::VolumeDown => "volume_down",
            Control::Loop => "loop",
            Control::Shuffle => "shuffle",
            Control::Stop => "stop",
        }
    }

    /// Reverse of [`Control::id`], for incoming component interactions.
    pub fn from_id(id: &str) -> Option<Control> {
        Control::ALL.into_iter().find(|c| c.id() == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip() {
        for control in Control::ALL {
            assert_eq!(Control::from_id(control.id()), Some(control));
        }
        assert_eq!(Control::from_id("definitely_not_a_control"), None);
    }
}
