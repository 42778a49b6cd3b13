use serde::Deserialize;

/// Singer type that marks a playable character in a vocal record.
pub const GAME_CHARACTER_TYPE: &str = "game_character";

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameCharacter {
    pub id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub given_name: String,
}

impl GameCharacter {
    /// Family name (when the character has one) followed by given name.
    pub fn display_name(&self) -> String {
        format!("{}{}", self.first_name.as_deref().unwrap_or(""), self.given_name)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Music {
    pub id: i64,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VocalSinger {
    pub character_type: String,
    pub character_id: i64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MusicVocal {
    pub id: i64,
    pub music_id: i64,
    #[serde(default)]
    pub characters: Vec<VocalSinger>,
    pub assetbundle_name: String,
}

impl MusicVocal {
    /// Ids of the singers that are game characters, in listed order.
    pub fn game_character_singers(&self) -> Vec<i64> {
        self.characters
            .iter()
            .filter(|s| s.character_type == GAME_CHARACTER_TYPE)
            .map(|s| s.character_id)
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CharacterProfile {
    pub character_id: i64,
    pub scenario_id: String,
}

/// A 2D visual/voice variant of a character.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Character2d {
    pub id: i64,
    pub character_id: i64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: i64,
    pub character_id: i64,
    #[serde(default)]
    pub prefix: String,
    pub assetbundle_name: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CardEpisode {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub card_id: i64,
    #[serde(default)]
    pub scenario_id: Option<String>,
    #[serde(default)]
    pub assetbundle_name: Option<String>,
}
