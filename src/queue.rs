use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use rand::seq::SliceRandom;
use rand::thread_rng;

use crate::model::track::Track;

/// Tracks of a player: the pending ones, the one being played and the ones already played.
#[derive(Debug, Default, Clone)]
pub struct Queue {
    tracks: VecDeque<Track>,
    history: Vec<Track>,
    current: Option<Track>
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a track at the end of the queue.
    pub fn add(&mut self, track: Track) {
        self.tracks.push_back(track);
    }

    /// Appends all the tracks keeping their order.
    pub fn extend(&mut self, tracks: impl IntoIterator<Item = Track>) {
        self.tracks.extend(tracks);
    }

    /// Moves the current track into the history and takes the next pending one.
    pub fn next(&mut self) -> Option<&Track> {
        if let Some(current) = self.current.take() {
            self.history.push(current);
        }

        self.current = self.tracks.pop_front();
        self.current.as_ref()
    }

    /// Goes back to the last played track, the current one is put back at
    /// the front of the queue.
    pub fn previous(&mut self) -> Option<&Track> {
        let previous = self.history.pop()?;

        if let Some(current) = self.current.take() {
            self.tracks.push_front(current);
        }

        self.current = Some(previous);
        self.current.as_ref()
    }

    /// Sets the current track, the replaced one goes into the history.
    pub fn set_current(&mut self, track: Track) {
        match self.current.take() {
            Some(current) if current != track => self.history.push(current),
            _ => {}
        }

        self.current = Some(track);
    }

    pub fn remove(&mut self, index: usize) -> Option<Track> {
        self.tracks.remove(index)
    }

    /// Moves a pending track to another position, returns false if any index is out of bounds.
    pub fn move_track(&mut self, from: usize, to: usize) -> bool {
        if from >= self.tracks.len() || to >= self.tracks.len() {
            return false;
        }

        if let Some(track) = self.tracks.remove(from) {
            self.tracks.insert(to, track);
        }

        true
    }

    /// Drops the tracks before `index` into the history, leaving the track at `index`
    /// as the next one.
    pub fn skip_to(&mut self, index: usize) -> bool {
        if index >= self.tracks.len() {
            return false;
        }

        self.history.extend(self.tracks.drain(..index));
        true
    }

    pub fn shuffle(&mut self) {
        self.tracks.make_contiguous().shuffle(&mut thread_rng());
    }

    /// Removes pending tracks already present earlier in the queue.
    pub fn remove_duplicates(&mut self) {
        let mut seen = HashSet::new();
        self.tracks.retain(|track| seen.insert(track.encoded.clone()));
    }

    /// Empties the pending tracks, the history and the current track.
    pub fn clear(&mut self) {
        self.tracks.clear();
        self.history.clear();
        self.current = None;
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    pub fn tracks(&self) -> &VecDeque<Track> {
        &self.tracks
    }

    pub fn history(&self) -> &[Track] {
        &self.history
    }

    /// Whether if the track was played or is pending.
    pub fn contains(&self, track: &Track) -> bool {
        self.tracks.contains(track) || self.history.contains(track)
    }

    /// Number of pending tracks.
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Number of pending tracks plus the current one.
    pub fn total_len(&self) -> usize {
        self.tracks.len() + usize::from(self.current.is_some())
    }

    /// Duration of the pending tracks and the current one.
    pub fn duration(&self) -> Duration {
        self.tracks.iter()
            .chain(self.current.iter())
            .map(|t| t.info.length)
            .sum()
    }
}
