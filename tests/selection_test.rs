use std::collections::HashSet;
use std::path::Path;

use serde_json::json;

use sekai_voice_harvest::reference::index::{ReferenceIndex, ReferenceSets};
use sekai_voice_harvest::reference::records::{
    Card, CardEpisode, Character2d, CharacterProfile, Music, MusicVocal, VocalSinger,
};
use sekai_voice_harvest::select::scenario::ScenarioAsset;
use sekai_voice_harvest::select::{
    card_scenarios, identity_set, profile_plan, solo_song_tasks, talk_voice_tasks, SelectionGap,
    VoiceNumbering, VoiceSource,
};

fn singer(kind: &str, id: i64) -> VocalSinger {
    VocalSinger {
        character_type: kind.to_string(),
        character_id: id,
    }
}

fn vocal(id: i64, music_id: i64, bundle: &str, singers: Vec<VocalSinger>) -> MusicVocal {
    MusicVocal {
        id,
        music_id,
        characters: singers,
        assetbundle_name: bundle.to_string(),
    }
}

fn music(id: i64, title: &str) -> Music {
    Music {
        id,
        title: title.to_string(),
    }
}

fn song_url(bundle: &str) -> String {
    format!("http://assets/music/long/{bundle}/{bundle}.wav")
}

fn scenario(talk: serde_json::Value) -> ScenarioAsset {
    serde_json::from_value(json!({"m_Name": "test", "TalkData": talk})).unwrap()
}

fn talk(speakers: &[i64], voices: &[(i64, &str)], body: &str) -> serde_json::Value {
    json!({
        "TalkCharacters": speakers.iter().map(|id| json!({"Character2dId": id})).collect::<Vec<_>>(),
        "Voices": voices.iter().map(|(id, v)| json!({"Character2dId": id, "VoiceId": v})).collect::<Vec<_>>(),
        "Body": body,
    })
}

fn voice_source<'a>(scenario_id: &'a str, out: &'a Path, with_transcripts: bool) -> VoiceSource<'a> {
    VoiceSource {
        voice_dir: "http://assets/voice",
        scenario_id,
        out_dir: out,
        ext: "wav",
        with_transcripts,
    }
}

#[test]
fn test_solo_songs_exclude_ensembles() {
    let index = ReferenceIndex::build(ReferenceSets {
        musics: vec![music(1, "Solo A"), music(2, "Duet"), music(3, "Other"), music(4, "Solo B")],
        music_vocals: vec![
            // Non-game singers do not break exclusivity.
            vocal(10, 1, "se_0001_01", vec![singer("game_character", 21), singer("outside_character", 2)]),
            vocal(11, 2, "se_0002_01", vec![singer("game_character", 21), singer("game_character", 22)]),
            vocal(12, 3, "se_0003_01", vec![singer("game_character", 22)]),
            vocal(13, 4, "se_0004_01", vec![singer("game_character", 21)]),
            vocal(14, 2, "se_0002_02", vec![]),
        ],
        ..ReferenceSets::default()
    });

    let out = Path::new("/out/dataset_21");
    let tasks = solo_song_tasks(&index, 21, song_url, out, "wav");

    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].dest, out.join("S001.wav"));
    assert_eq!(tasks[0].url, "http://assets/music/long/se_0001_01/se_0001_01.wav");
    assert_eq!(tasks[0].label, "Solo A");
    assert_eq!(tasks[1].dest, out.join("S002.wav"));
    assert_eq!(tasks[1].label, "Solo B");
    assert!(tasks.iter().all(|t| t.transcript.is_none()));
}

#[test]
fn test_multi_singer_vocal_never_selected_for_any_member() {
    let index = ReferenceIndex::build(ReferenceSets {
        musics: vec![music(1, "Group")],
        music_vocals: vec![vocal(
            10,
            1,
            "se_0001_01",
            vec![
                singer("game_character", 1),
                singer("game_character", 2),
                singer("game_character", 3),
            ],
        )],
        ..ReferenceSets::default()
    });

    for id in 1..=3 {
        assert!(solo_song_tasks(&index, id, song_url, Path::new("/out"), "wav").is_empty());
    }
}

#[test]
fn test_character_without_solos_yields_nothing() {
    let index = ReferenceIndex::build(ReferenceSets::default());
    assert!(solo_song_tasks(&index, 5, song_url, Path::new("/out"), "wav").is_empty());
}

#[test]
fn test_talk_filter_keeps_only_own_single_speaker_lines() {
    let identities: HashSet<i64> = [101, 102].into_iter().collect();
    let asset = scenario(json!([
        talk(&[101], &[(101, "v_a"), (999, "v_foreign")], "first\nline"),
        talk(&[101, 999], &[(101, "v_group")], "group"),
        talk(&[999], &[(999, "v_other")], "not us"),
        talk(&[], &[(101, "v_narration")], "nobody"),
        talk(&[102, 102], &[(102, "v_b")], "costume"),
    ]));

    let out = Path::new("/out/dataset_1");
    let mut numbering = VoiceNumbering::profile();
    let tasks = talk_voice_tasks(&asset, &identities, voice_source("self_01", out, true), &mut numbering);

    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].url, "http://assets/voice/self_01/v_a.wav");
    assert_eq!(tasks[0].dest, out.join("P001.wav"));
    assert_eq!(tasks[0].transcript.as_deref(), Some("firstline"));
    assert_eq!(tasks[1].url, "http://assets/voice/self_01/v_b.wav");
    assert_eq!(tasks[1].dest, out.join("P002.wav"));
    assert_eq!(tasks[1].transcript.as_deref(), Some("costume"));

    for task in &tasks {
        assert!(!task.url.contains("foreign") && !task.url.contains("other"));
    }
}

#[test]
fn test_talk_filter_without_transcripts() {
    let identities: HashSet<i64> = [7].into_iter().collect();
    let asset = scenario(json!([talk(&[7], &[(7, "v1")], "hello")]));
    let mut numbering = VoiceNumbering::profile();
    let tasks = talk_voice_tasks(
        &asset,
        &identities,
        voice_source("s", Path::new("/out"), false),
        &mut numbering,
    );
    assert_eq!(tasks.len(), 1);
    assert!(tasks[0].transcript.is_none());
    assert_eq!(tasks[0].label, "hello");
}

#[test]
fn test_card_cap_is_exact_across_scenarios() {
    let identities: HashSet<i64> = [5].into_iter().collect();
    let first = scenario(json!([
        talk(&[5], &[(5, "a1")], "a1"),
        talk(&[5], &[(5, "a2")], "a2"),
        talk(&[5], &[(5, "a3")], "a3"),
    ]));
    let second = scenario(json!([
        talk(&[5], &[(5, "b1")], "b1"),
        talk(&[5], &[(5, "b2")], "b2"),
    ]));

    let out = Path::new("/out");
    let mut numbering = VoiceNumbering::cards(4);
    let mut tasks = Vec::new();
    for (scenario_id, asset) in [("s1", &first), ("s2", &second)] {
        if numbering.is_full() {
            break;
        }
        tasks.extend(talk_voice_tasks(asset, &identities, voice_source(scenario_id, out, true), &mut numbering));
    }

    assert_eq!(tasks.len(), 4);
    assert!(numbering.is_full());
    assert_eq!(tasks[3].url, "http://assets/voice/s2/b1.wav");
    assert_eq!(tasks[3].dest, out.join("C0004.wav"));
    assert_eq!(tasks[0].dest, out.join("C0001.wav"));
}

#[test]
fn test_card_scenarios_follow_dataset_order() {
    let card = |id: i64, character_id: i64, bundle: &str| Card {
        id,
        character_id,
        prefix: format!("card {id}"),
        assetbundle_name: bundle.to_string(),
    };
    let episode = |id: i64, bundle: &str, scenario: &str| CardEpisode {
        id,
        card_id: 0,
        scenario_id: Some(scenario.to_string()),
        assetbundle_name: Some(bundle.to_string()),
    };

    let index = ReferenceIndex::build(ReferenceSets {
        cards: vec![card(1, 3, "res003_no001"), card(2, 4, "res004_no001"), card(3, 3, "res003_no002")],
        card_episodes: vec![
            episode(1, "res003_no002", "003002_01"),
            episode(2, "res003_no001", "003001_01"),
            episode(3, "res003_no001", "003001_02"),
            episode(4, "res004_no001", "004001_01"),
        ],
        ..ReferenceSets::default()
    });

    let ids: Vec<String> = card_scenarios(&index, 3)
        .into_iter()
        .map(|s| s.scenario_id)
        .collect();
    assert_eq!(ids, vec!["003001_01", "003001_02", "003002_01"]);
}

#[test]
fn test_missing_reference_data_is_reported() {
    let index = ReferenceIndex::build(ReferenceSets {
        profiles: vec![CharacterProfile {
            character_id: 1,
            scenario_id: "self_1".into(),
        }],
        character_2ds: vec![Character2d { id: 50, character_id: 2 }],
        ..ReferenceSets::default()
    });

    assert_eq!(profile_plan(&index, 1).unwrap_err(), SelectionGap::NoIdentities(1));
    assert_eq!(profile_plan(&index, 2).unwrap_err(), SelectionGap::NoProfile(2));
    assert_eq!(identity_set(&index, 2).unwrap(), HashSet::from([50]));
}
