//! Sponsor announcement scheduling
//!
//! Announcements are injected between tracks without ever appearing in the
//! visible queue: the session plays one *instead of* advancing, then resumes
//! normal advancement when it finishes. Announcements never count toward the
//! interval themselves.

use async_trait::async_trait;
use rand::Rng;

/// One announcement from the catalog: a visual notice plus zero or more
/// audio files (the engine plays at most one per insertion).
#[derive(Debug, Clone)]
pub struct Announcement {
    pub notice: String,
    pub audio_urls: Vec<String>,
}

impl Announcement {
    /// Pick one audio file uniformly, if any.
    pub fn choose_audio(&self) -> Option<&str> {
        if self.audio_urls.is_empty() {
            return None;
        }
        let idx = rand::rng().random_range(0..self.audio_urls.len());
        Some(&self.audio_urls[idx])
    }
}

/// Advertisement content catalog; the weighted-random pick is its business.
/// `None` means the catalog is empty and the slot is silently skipped.
#[async_trait]
pub trait AdCatalog: Send + Sync {
    async fn pick(&self) -> Option<Announcement>;
}

/// An always-empty catalog.
pub struct NoAds;

#[async_trait]
impl AdCatalog for NoAds {
    async fn pick(&self) -> Option<Announcement> {
        None
    }
}

/// Counts tracks played since the last announcement.
#[derive(Debug)]
pub struct AdvertisementScheduler {
    interval: u32,
    since_last: u32,
}

impl AdvertisementScheduler {
    pub fn new(interval: u32) -> Self {
        Self {
            interval,
            since_last: 0,
        }
    }

    /// Register a completed (non-announcement) track. Returns true when an
    /// announcement is due; the counter resets on that call.
    ///
    /// An interval of 0 disables announcements entirely.
    pub fn on_track_completed(&mut self) -> bool {
        if self.interval == 0 {
            return false;
        }
        self.since_last += 1;
        if self.since_last >= self.interval {
            self.since_last = 0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn announcement_due_every_interval() {
        let mut scheduler = AdvertisementScheduler::new(3);
        let due: Vec<bool> = (0..9).map(|_| scheduler.on_track_completed()).collect();
        assert_eq!(
            due,
            [false, false, true, false, false, true, false, false, true]
        );
    }

    #[test]
    fn zero_interval_never_fires() {
        let mut scheduler = AdvertisementScheduler::new(0);
        assert!((0..50).all(|_| !scheduler.on_track_completed()));
    }

    #[test]
    fn choose_audio_on_empty_list_is_none() {
        let a = Announcement {
            notice: "visit our sponsor".into(),
            audio_urls: vec![],
        };
        assert!(a.choose_audio().is_none());
    }

    #[test]
    fn choose_audio_picks_from_the_list() {
        let a = Announcement {
            notice: "visit our sponsor".into(),
            audio_urls: vec!["u1".into(), "u2".into()],
        };
        for _ in 0..10 {
            let chosen = a.choose_audio().unwrap();
            assert!(a.audio_urls.iter().any(|u| u == chosen));
        }
    }
}
