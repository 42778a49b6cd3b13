//! Task selection: joins the reference indexes into ordered download task lists.
//!
//! Everything here is pure over a [`ReferenceIndex`]. Scenario documents are
//! fetched by the caller and handed to [`talk_voice_tasks`].

pub mod scenario;

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use thiserror::Error;
use tracing::warn;

use crate::engine::downloader::DownloadTask;
use crate::reference::index::ReferenceIndex;
use scenario::ScenarioAsset;

/// Reference data needed by an operation is missing for the character.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionGap {
    #[error("no profile record for character {0}")]
    NoProfile(i64),
    #[error("no 2D identities for character {0}")]
    NoIdentities(i64),
}

/// Sequential file naming with an optional global cap, e.g. `C0001`, `C0002`, ...
#[derive(Debug, Clone)]
pub struct VoiceNumbering {
    prefix: char,
    width: usize,
    next: usize,
    cap: Option<usize>,
    emitted: usize,
}

impl VoiceNumbering {
    pub fn new(prefix: char, width: usize, cap: Option<usize>) -> Self {
        Self {
            prefix,
            width,
            next: 1,
            cap,
            emitted: 0,
        }
    }

    /// `P001`.. with no cap.
    pub fn profile() -> Self {
        Self::new('P', 3, None)
    }

    /// `C0001`.. stopping after `cap` names.
    pub fn cards(cap: usize) -> Self {
        Self::new('C', 4, Some(cap))
    }

    pub fn is_full(&self) -> bool {
        self.cap.is_some_and(|cap| self.emitted >= cap)
    }

    pub fn emitted(&self) -> usize {
        self.emitted
    }

    fn next_file_name(&mut self, ext: &str) -> String {
        let name = format!(
            "{}{:0width$}.{}",
            self.prefix,
            self.next,
            ext,
            width = self.width
        );
        self.next += 1;
        self.emitted += 1;
        name
    }
}

/// Solo songs of a character: vocal records whose only game-character singer
/// is `character_id`, numbered `S001`, `S002`, ... in dataset order.
pub fn solo_song_tasks(
    index: &ReferenceIndex,
    character_id: i64,
    song_url: impl Fn(&str) -> String,
    out_dir: &Path,
    ext: &str,
) -> Vec<DownloadTask> {
    let mut numbering = VoiceNumbering::new('S', 3, None);
    let mut tasks = Vec::new();

    for vocal in index.music_vocals() {
        let singers = vocal.game_character_singers();
        if singers.len() != 1 || singers[0] != character_id {
            continue;
        }

        let label = match index.music(vocal.music_id) {
            Some(music) => music.title.clone(),
            None => {
                warn!(
                    "vocal {} references unknown music {}",
                    vocal.id, vocal.music_id
                );
                vocal.assetbundle_name.clone()
            }
        };

        let file_name = numbering.next_file_name(ext);
        tasks.push(DownloadTask {
            url: song_url(&vocal.assetbundle_name),
            dest: out_dir.join(file_name),
            transcript: None,
            label,
        });
    }

    tasks
}

/// Scenario id and identity set needed for profile voices.
#[derive(Debug, Clone)]
pub struct ProfilePlan {
    pub scenario_id: String,
    pub identities: HashSet<i64>,
}

pub fn profile_plan(index: &ReferenceIndex, character_id: i64) -> Result<ProfilePlan, SelectionGap> {
    let profile = index
        .profile(character_id)
        .ok_or(SelectionGap::NoProfile(character_id))?;
    let identities = identity_set(index, character_id)?;
    Ok(ProfilePlan {
        scenario_id: profile.scenario_id.clone(),
        identities,
    })
}

/// The character's 2D identity ids as a set.
pub fn identity_set(index: &ReferenceIndex, character_id: i64) -> Result<HashSet<i64>, SelectionGap> {
    let ids: HashSet<i64> = index.identities(character_id).iter().copied().collect();
    if ids.is_empty() {
        return Err(SelectionGap::NoIdentities(character_id));
    }
    Ok(ids)
}

/// One card episode scenario to visit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardScenario {
    pub card_id: i64,
    pub card_prefix: String,
    pub bundle: String,
    pub scenario_id: String,
}

/// Card episode scenarios of a character: cards in dataset order, then each
/// card's episodes in dataset order.
pub fn card_scenarios(index: &ReferenceIndex, character_id: i64) -> Vec<CardScenario> {
    index
        .cards(character_id)
        .iter()
        .flat_map(|card| {
            index
                .episode_scenarios(&card.assetbundle_name)
                .iter()
                .map(move |scenario_id| CardScenario {
                    card_id: card.id,
                    card_prefix: card.prefix.clone(),
                    bundle: card.assetbundle_name.clone(),
                    scenario_id: scenario_id.clone(),
                })
        })
        .collect()
}

/// Where the voices of one scenario document live and where they go.
#[derive(Debug, Clone, Copy)]
pub struct VoiceSource<'a> {
    /// Voice directory URL; files are `{voice_dir}/{scenario_id}/{voice_id}.{ext}`.
    pub voice_dir: &'a str,
    pub scenario_id: &'a str,
    pub out_dir: &'a Path,
    pub ext: &'a str,
    pub with_transcripts: bool,
}

/// Emit tasks for the single-speaker lines of the character in `asset`.
///
/// An entry qualifies when exactly one distinct speaker is listed and that
/// speaker is one of `identities`. Each of its voices whose 2D id is in
/// `identities` becomes a task. Stops as soon as `numbering` is full.
pub fn talk_voice_tasks(
    asset: &ScenarioAsset,
    identities: &HashSet<i64>,
    source: VoiceSource<'_>,
    numbering: &mut VoiceNumbering,
) -> Vec<DownloadTask> {
    let mut tasks = Vec::new();

    for entry in &asset.talk_data {
        let speakers: BTreeSet<i64> = entry
            .talk_characters
            .iter()
            .map(|c| c.character_2d_id)
            .collect();
        if speakers.len() != 1 || !speakers.iter().all(|id| identities.contains(id)) {
            continue;
        }

        let body = entry.single_line_body();
        for voice in &entry.voices {
            if !identities.contains(&voice.character_2d_id) {
                continue;
            }
            if numbering.is_full() {
                return tasks;
            }
            let file_name = numbering.next_file_name(source.ext);
            tasks.push(DownloadTask {
                url: format!(
                    "{}/{}/{}.{}",
                    source.voice_dir, source.scenario_id, voice.voice_id, source.ext
                ),
                dest: source.out_dir.join(file_name),
                transcript: source.with_transcripts.then(|| body.clone()),
                label: body.clone(),
            });
        }
    }

    tasks
}
