//! Ordered track queue; index 0 is "now playing"

use rand::seq::SliceRandom;

use crate::config::ShufflePolicy;
use crate::track::Track;

/// Per-room pending tracks. Pure data; all locking and state transitions
/// live in [`crate::Session`].
#[derive(Debug, Default)]
pub struct PlaybackQueue {
    tracks: Vec<Track>,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Append to the tail.
    pub fn push(&mut self, track: Track) {
        self.tracks.push(track);
    }

    pub fn push_many<I: IntoIterator<Item = Track>>(&mut self, tracks: I) {
        self.tracks.extend(tracks);
    }

    /// Insert right behind the playing head ("play next").
    pub fn push_front_of_pending(&mut self, track: Track) {
        let at = 1.min(self.tracks.len());
        self.tracks.insert(at, track);
    }

    /// Current head, the now-playing track.
    pub fn head(&self) -> Option<&Track> {
        self.tracks.first()
    }

    /// Remove and return the head.
    pub fn pop_head(&mut self) -> Option<Track> {
        if self.tracks.is_empty() {
            None
        } else {
            Some(self.tracks.remove(0))
        }
    }

    /// Move the head to the tail (loop mode advancement).
    pub fn rotate_head_to_tail(&mut self) {
        if self.tracks.len() > 1 {
            self.tracks.rotate_left(1);
        }
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    /// Randomize order according to the configured policy.
    ///
    /// `playing` tells whether index 0 is currently being played; with
    /// [`ShufflePolicy::KeepHead`] the head then stays in place and only the
    /// pending tail is shuffled.
    pub fn shuffle(&mut self, policy: ShufflePolicy, playing: bool) {
        let mut rng = rand::rng();
        match policy {
            ShufflePolicy::WholeQueue => self.tracks.shuffle(&mut rng),
            ShufflePolicy::KeepHead => {
                if playing && !self.tracks.is_empty() {
                    self.tracks[1..].shuffle(&mut rng);
                } else {
                    self.tracks.shuffle(&mut rng);
                }
            }
        }
    }

    /// Clone of the queue in order, head first.
    pub fn snapshot(&self) -> Vec<Track> {
        self.tracks.clone()
    }
}
