use serde::Deserialize;

/// A scenario asset document: a named list of dialogue entries.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScenarioAsset {
    #[serde(rename = "m_Name", default)]
    pub name: String,
    #[serde(rename = "TalkData", default)]
    pub talk_data: Vec<TalkEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TalkEntry {
    #[serde(rename = "TalkCharacters", default)]
    pub talk_characters: Vec<TalkCharacter>,
    #[serde(rename = "Voices", default)]
    pub voices: Vec<VoiceRef>,
    #[serde(rename = "Body", default)]
    pub body: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TalkCharacter {
    #[serde(rename = "Character2dId")]
    pub character_2d_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoiceRef {
    #[serde(rename = "Character2dId")]
    pub character_2d_id: i64,
    #[serde(rename = "VoiceId")]
    pub voice_id: String,
}

impl TalkEntry {
    /// The body on a single line.
    pub fn single_line_body(&self) -> String {
        self.body.chars().filter(|c| *c != '\n' && *c != '\r').collect()
    }
}
