// Read-only lookup tables joined from the reference datasets.

use std::collections::HashMap;

use super::records::{
    Card, CardEpisode, Character2d, CharacterProfile, GameCharacter, Music, MusicVocal,
};

/// Decoded datasets, in their original listing order.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSets {
    pub characters: Vec<GameCharacter>,
    pub musics: Vec<Music>,
    pub music_vocals: Vec<MusicVocal>,
    pub profiles: Vec<CharacterProfile>,
    pub character_2ds: Vec<Character2d>,
    pub cards: Vec<Card>,
    pub card_episodes: Vec<CardEpisode>,
}

#[derive(Debug, Default)]
pub struct ReferenceIndex {
    characters: Vec<GameCharacter>,
    characters_by_id: HashMap<i64, usize>,
    musics_by_id: HashMap<i64, Music>,
    music_vocals: Vec<MusicVocal>,
    profiles_by_character: HashMap<i64, CharacterProfile>,
    identities_by_character: HashMap<i64, Vec<i64>>,
    cards_by_character: HashMap<i64, Vec<Card>>,
    scenarios_by_bundle: HashMap<String, Vec<String>>,
}

impl ReferenceIndex {
    pub fn build(sets: ReferenceSets) -> Self {
        let characters_by_id = sets
            .characters
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id, i))
            .collect();

        let musics_by_id = sets.musics.into_iter().map(|m| (m.id, m)).collect();

        // First profile wins when a character is listed twice.
        let mut profiles_by_character = HashMap::new();
        for profile in sets.profiles {
            profiles_by_character
                .entry(profile.character_id)
                .or_insert(profile);
        }

        let mut identities_by_character: HashMap<i64, Vec<i64>> = HashMap::new();
        for c2d in &sets.character_2ds {
            identities_by_character
                .entry(c2d.character_id)
                .or_default()
                .push(c2d.id);
        }

        let mut cards_by_character: HashMap<i64, Vec<Card>> = HashMap::new();
        for card in sets.cards {
            cards_by_character
                .entry(card.character_id)
                .or_default()
                .push(card);
        }

        let mut scenarios_by_bundle: HashMap<String, Vec<String>> = HashMap::new();
        for episode in sets.card_episodes {
            if let (Some(bundle), Some(scenario)) = (episode.assetbundle_name, episode.scenario_id) {
                scenarios_by_bundle.entry(bundle).or_default().push(scenario);
            }
        }

        Self {
            characters: sets.characters,
            characters_by_id,
            musics_by_id,
            music_vocals: sets.music_vocals,
            profiles_by_character,
            identities_by_character,
            cards_by_character,
            scenarios_by_bundle,
        }
    }

    /// All characters in dataset order.
    pub fn characters(&self) -> &[GameCharacter] {
        &self.characters
    }

    pub fn character(&self, character_id: i64) -> Option<&GameCharacter> {
        self.characters_by_id
            .get(&character_id)
            .map(|&i| &self.characters[i])
    }

    pub fn music(&self, music_id: i64) -> Option<&Music> {
        self.musics_by_id.get(&music_id)
    }

    pub fn music_vocals(&self) -> &[MusicVocal] {
        &self.music_vocals
    }

    pub fn profile(&self, character_id: i64) -> Option<&CharacterProfile> {
        self.profiles_by_character.get(&character_id)
    }

    /// 2D identity ids of a character, in dataset order. Empty if unmapped.
    pub fn identities(&self, character_id: i64) -> &[i64] {
        self.identities_by_character
            .get(&character_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn cards(&self, character_id: i64) -> &[Card] {
        self.cards_by_character
            .get(&character_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Episode scenario ids attached to a card asset bundle.
    pub fn episode_scenarios(&self, bundle: &str) -> &[String] {
        self.scenarios_by_bundle
            .get(bundle)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
