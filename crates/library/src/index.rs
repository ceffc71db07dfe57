use std::collections::{HashMap, HashSet};
use std::path::Path;

use common::{Song, SongRecord};

/// Songs in chart order, plus the lookups used by the cleanup sweep.
///
/// Every song in the ordered sequence is registered in the id map and its
/// album in the album set. The id map may hold entries the sequence does not.
#[derive(Clone, Debug, Default)]
pub struct SongIndex {
    songs: Vec<Song>,
    positions: HashMap<i64, usize>,
    by_id: HashMap<i64, Song>,
    album_ids: HashSet<i64>,
}

impl SongIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_songs<I>(songs: I) -> Self
    where
        I: IntoIterator<Item = Song>,
    {
        let mut index = Self::new();
        for song in songs {
            index.push(song);
        }
        index
    }

    /// Hydrates archived records against `documents` and indexes them.
    pub fn from_records<I>(records: I, documents: &Path) -> Self
    where
        I: IntoIterator<Item = SongRecord>,
    {
        Self::from_songs(records.into_iter().map(|record| record.hydrate(documents)))
    }

    /// Copies the id and album lookups into a new index with an empty
    /// sequence. Songs that leave the chart stay known to the cleanup sweep.
    pub fn carry_over(&self) -> Self {
        Self {
            songs: Vec::new(),
            positions: HashMap::new(),
            by_id: self.by_id.clone(),
            album_ids: self.album_ids.clone(),
        }
    }

    /// Adds or overwrites the id and album lookups. The ordered sequence is
    /// left alone.
    pub fn register(&mut self, song: Song) {
        self.album_ids.insert(song.album_id());
        self.by_id.insert(song.id(), song);
    }

    /// Registers `song` and appends it to the ordered sequence. A repeated id
    /// keeps its first position and takes the latest fields.
    pub fn push(&mut self, song: Song) {
        self.register(song.clone());
        match self.positions.get(&song.id()).copied() {
            Some(position) => self.songs[position] = song,
            None => {
                self.positions.insert(song.id(), self.songs.len());
                self.songs.push(song);
            }
        }
    }

    pub fn count(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    pub fn get(&self, ordinal: usize) -> Option<&Song> {
        self.songs.get(ordinal)
    }

    pub fn get_by_id(&self, song_id: i64) -> Option<&Song> {
        self.by_id.get(&song_id)
    }

    pub fn contains_song(&self, song_id: i64) -> bool {
        self.by_id.contains_key(&song_id)
    }

    pub fn contains_album(&self, album_id: i64) -> bool {
        self.album_ids.contains(&album_id)
    }

    pub fn songs(&self) -> &[Song] {
        &self.songs
    }

    pub fn records(&self) -> Vec<SongRecord> {
        self.songs.iter().map(|song| song.record.clone()).collect()
    }
}
