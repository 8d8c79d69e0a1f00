//! Test configuration, records and page scripts

use super::fake_page::FakePage;
use songgen_runner::config::{IdentityProfile, ProxyProfile, RunnerConfig, RunnerToml, TimingsConfig};
use songgen_runner::models::GenerationRecord;
use songgen_runner::page::Selectors;
use songgen_runner::store::IdentityStatus;
use songgen_runner::utils::Pacing;
use songgen_runner::verification::Provider;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const IDENTITY: &str = "5550001111";
pub const GENERATION_ID: &str = "gen-0001";
pub const DETAIL_PAGE: &str = "https://suno.com/song/3f1c-example";
pub const LYRICS: &str = "[Verse]\nNeon lights are humming low\nWe keep driving nowhere to go\n";

pub fn profile() -> IdentityProfile {
    IdentityProfile {
        phone: IDENTITY.to_string(),
        country: "United States".to_string(),
        country_code: "+1".to_string(),
        provider: Provider::Twilio,
        workspace_id: None,
        channel_id: None,
        proxy: Some(proxy_profile()),
    }
}

pub fn proxy_profile() -> ProxyProfile {
    ProxyProfile {
        address: "proxy.example.net".to_string(),
        port: 8080,
        username: "proxy-user".to_string(),
        password: "proxy-pass".to_string(),
        scheme: "http".to_string(),
    }
}

/// Default configuration with zero pacing and the test identity registered
pub fn test_config(root: &Path) -> RunnerConfig {
    let mut toml = RunnerToml::default();
    toml.timings = TimingsConfig::immediate();
    toml.identities.insert(IDENTITY.to_string(), profile());
    RunnerConfig::from_toml(toml, root.to_path_buf())
}

pub fn pacing() -> Pacing {
    Pacing::immediate()
}

pub fn selectors() -> Selectors {
    Selectors::default()
}

fn routed(generation_id: &str) -> GenerationRecord {
    GenerationRecord {
        generation_id: generation_id.to_string(),
        user_id: Some("user-1".to_string()),
        replies_guild: Some("guild-1".to_string()),
        initial_reply_id: Some("reply-1".to_string()),
        output_reply_id: Some("reply-2".to_string()),
        ..GenerationRecord::default()
    }
}

/// Plain-mode vocal request
pub fn plain_record(generation_id: &str) -> GenerationRecord {
    GenerationRecord {
        song_prompt: Some("an upbeat synthwave song about night driving".to_string()),
        ..routed(generation_id)
    }
}

/// Custom-mode request; vocal requests carry [`LYRICS`]
pub fn custom_record(generation_id: &str, instrumental: bool) -> GenerationRecord {
    GenerationRecord {
        use_custom_mode: true,
        use_instrumental_only: instrumental,
        song_input_genre: Some("synthwave".to_string()),
        song_input_vibe: Some("dreamy".to_string()),
        song_input_custom_title: Some("Night Drive".to_string()),
        song_input_custom_lyrics: (!instrumental).then(|| LYRICS.to_string()),
        ..routed(generation_id)
    }
}

pub fn healthy_identity() -> IdentityStatus {
    IdentityStatus {
        identity: IDENTITY.to_string(),
        remaining_credits: Some(1200),
        latest_error: None,
    }
}

/// Where the orchestrator points the browser's downloads
pub fn downloads_dir(root: &Path) -> PathBuf {
    root.join("downloads").join(IDENTITY)
}

/// Row durations after submission: (row id, seconds until finished, final text)
pub type RowScript = Vec<(&'static str, Duration, &'static str)>;

/// Two candidates finishing at 60s and 80s with 2:30 and 3:05
pub fn two_good_rows() -> RowScript {
    vec![
        ("new-1", Duration::from_secs(60), "2:30"),
        ("new-2", Duration::from_secs(80), "3:05"),
    ]
}

/// Script the signed-in creation surface for a plain-mode vocal job
///
/// One finished row from an earlier job is listed before submission. Clicking
/// create adds `rows`; the longest one can be downloaded into `downloads` and
/// opened on [`DETAIL_PAGE`].
pub fn script_create_page(page: &FakePage, s: &Selectors, rows: RowScript, downloads: PathBuf) {
    page.show(&s.instrumental_disabled, &["instrumental-off"]);
    page.show(&s.custom_disabled, &["custom-off"]);
    page.show(&s.model_version_label, &["model"]);
    page.set_text("model", "v3.5");
    page.show(&s.create_button, &["create"]);
    page.show(&s.song_description_field, &["description"]);
    page.show(&s.song_list, &["grid"]);
    page.show(&s.credits_balance, &["credits"]);
    page.set_text("credits", "1,200 Credits");
    page.show(&s.lyrics_area, &["lyrics"]);
    page.set_text("lyrics", LYRICS);

    page.show(&s.song_row, &["old-1"]);
    page.child("old-1", &s.row_duration, &["old-1-duration"]);
    page.set_text("old-1-duration", "2:10");

    let row_ids: Vec<&'static str> = rows.iter().map(|(id, _, _)| *id).collect();
    let selectors = s.clone();
    page.on_click("create", move |state| {
        let mut ids: Vec<&str> = rows.iter().map(|(id, _, _)| *id).collect();
        ids.push("old-1");
        state.show(&selectors.song_row, &ids);

        let now = state.elapsed();
        for (id, finish_after, text) in &rows {
            let duration = format!("{}-duration", id);
            state.child(id, &selectors.row_duration, &[duration.as_str()]);
            state.set_text(&duration, "--:--");
            state.set_text_after(&duration, now + *finish_after, text);

            let title = format!("{}-title", id);
            let genre = format!("{}-genre", id);
            let menu = format!("{}-menu", id);
            state.child(id, &selectors.row_title, &[title.as_str()]);
            state.child(id, &selectors.row_genre, &[genre.as_str()]);
            state.child(id, &selectors.row_menu_toggle, &[menu.as_str()]);
            state.set_text(&title, "Neon Café");
            state.set_text(&genre, "synthwave, dreamy");
        }
    });

    for id in &row_ids {
        let menu_selectors = s.clone();
        page.on_click(&format!("{}-menu", id), move |state| {
            state.show(&menu_selectors.download_menu_item, &["download-item"]);
        });
        page.on_click(&format!("{}-title", id), |state| {
            state.location = DETAIL_PAGE.to_string();
        });
    }

    let audio_selectors = s.clone();
    page.on_click("download-item", move |state| {
        state.show(&audio_selectors.audio_download_option, &["download-audio"]);
    });

    page.on_click("download-audio", move |_| {
        std::fs::write(downloads.join("Neon Cafe.mp3"), b"ID3 audio").unwrap();
    });
}
