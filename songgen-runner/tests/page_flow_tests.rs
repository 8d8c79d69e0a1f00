//! Reaper, creation mode, sign-in and submission against the scripted page

mod helpers;

use helpers::*;
use songgen_runner::config::{LimitsConfig, UrlConfig, VerificationConfig};
use songgen_runner::models::CreationMode;
use songgen_runner::page::{ElementHandle, Selectors};
use songgen_runner::services::{
    locate_form, negotiate_mode, reap_pending, select_model, NegotiationError, ReapError,
    SignInError, SignInFlow, SignInState, SubmissionError,
};

fn preferred() -> Vec<String> {
    vec!["v3.5".to_string(), "v3".to_string(), "v2".to_string()]
}

// =============================================================================
// Reaper
// =============================================================================

/// Rows `ids`; the ones in `pending` have no duration yet
fn script_rows(page: &FakePage, s: &Selectors, ids: &[&str], pending: &[&str]) {
    page.show(&s.song_row, ids);
    for id in ids {
        let duration = format!("{}-duration", id);
        page.child(id, &s.row_duration, &[duration.as_str()]);
        page.set_text(&duration, if pending.contains(id) { "--:--" } else { "1:45" });
        let menu = format!("{}-menu", id);
        page.child(id, &s.row_menu_toggle, &[menu.as_str()]);

        let menu_selectors = s.clone();
        page.on_click(&menu, move |state| {
            state.show(&menu_selectors.options_menu, &["menu"]);
        });
    }
    page.child("menu", &s.menu_item_label, &["menu-download", "menu-delete"]);
    page.set_text("menu-download", "Download");
    page.set_text("menu-delete", "Move to Trash");
}

#[tokio::test(start_paused = true)]
async fn test_reaper_deletes_only_pending_rows() {
    let page = FakePage::new();
    let s = selectors();
    script_rows(&page, &s, &["done", "stuck-1", "stuck-2"], &["stuck-1", "stuck-2"]);

    let input = ElementHandle::new("input");
    let deleted = reap_pending(&page, &s, &pacing(), &input, 4).await.unwrap();

    assert_eq!(deleted, 2);
    assert_eq!(
        page.clicks(),
        vec![
            "stuck-1-menu", "menu-delete", "input", "stuck-2-menu", "menu-delete", "input"
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_reaper_with_nothing_pending_clicks_nothing() {
    let page = FakePage::new();
    let s = selectors();
    script_rows(&page, &s, &["done-1", "done-2"], &[]);

    let deleted = reap_pending(&page, &s, &pacing(), &ElementHandle::new("input"), 4)
        .await
        .unwrap();

    assert_eq!(deleted, 0);
    assert!(page.clicks().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_reaper_over_limit_touches_nothing() {
    let page = FakePage::new();
    let s = selectors();
    script_rows(&page, &s, &["a", "b", "c"], &["a", "b", "c"]);

    let err = reap_pending(&page, &s, &pacing(), &ElementHandle::new("input"), 2)
        .await
        .unwrap_err();

    assert!(matches!(err, ReapError::TooManyPending { count: 3, max: 2 }));
    assert!(page.clicks().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_reaper_default_limit_refuses_five_pending() {
    let page = FakePage::new();
    let s = selectors();
    let limit = LimitsConfig::default().max_songs_to_delete;
    let ids = ["p1", "p2", "p3", "p4", "p5"];
    script_rows(&page, &s, &ids, &ids);

    let err = reap_pending(&page, &s, &pacing(), &ElementHandle::new("input"), limit)
        .await
        .unwrap_err();

    assert!(matches!(err, ReapError::TooManyPending { count: 5, max: 4 }));
    assert!(page.clicks().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_reaper_default_limit_deletes_three_pending() {
    let page = FakePage::new();
    let s = selectors();
    let limit = LimitsConfig::default().max_songs_to_delete;
    script_rows(&page, &s, &["p1", "done", "p2", "p3"], &["p1", "p2", "p3"]);

    let deleted = reap_pending(&page, &s, &pacing(), &ElementHandle::new("input"), limit)
        .await
        .unwrap();

    assert_eq!(deleted, 3);
    assert_eq!(page.click_count("menu-delete"), 3);
    assert_eq!(page.click_count("done-menu"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_reaper_missing_toggle_fails_before_clicking() {
    let page = FakePage::new();
    let s = selectors();
    script_rows(&page, &s, &["a", "b"], &["a", "b"]);
    page.with(|state| state.remove_child("b", &s.row_menu_toggle));

    let err = reap_pending(&page, &s, &pacing(), &ElementHandle::new("input"), 4)
        .await
        .unwrap_err();

    assert!(matches!(err, ReapError::MenuToggleMissing));
    assert!(page.clicks().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_reaper_ambiguous_delete_action_fails() {
    let page = FakePage::new();
    let s = selectors();
    script_rows(&page, &s, &["a"], &["a"]);
    page.child("menu", &s.menu_item_label, &["menu-delete", "menu-trash"]);
    page.set_text("menu-trash", "Trash");

    let err = reap_pending(&page, &s, &pacing(), &ElementHandle::new("input"), 4)
        .await
        .unwrap_err();

    assert!(matches!(err, ReapError::DeleteActionMissing));
}

// =============================================================================
// Creation mode
// =============================================================================

fn script_toggles(page: &FakePage, s: &Selectors, instrumental: bool, custom: bool) {
    if instrumental {
        page.show(&s.instrumental_enabled, &["instrumental-on"]);
    } else {
        page.show(&s.instrumental_disabled, &["instrumental-off"]);
    }
    if custom {
        page.show(&s.custom_enabled, &["custom-on"]);
    } else {
        page.show(&s.custom_disabled, &["custom-off"]);
    }
}

#[tokio::test(start_paused = true)]
async fn test_negotiator_clicks_each_mismatched_toggle_once() {
    let page = FakePage::new();
    let s = selectors();
    script_toggles(&page, &s, false, false);
    page.show(&s.custom_get_started_button, &["get-started"]);

    let desired = CreationMode { instrumental: true, custom: true };
    let clicks = negotiate_mode(&page, &s, &pacing(), desired).await.unwrap();

    assert_eq!(clicks, 2);
    assert_eq!(page.clicks(), vec!["instrumental-off", "custom-off", "get-started"]);
}

#[tokio::test(start_paused = true)]
async fn test_negotiator_leaves_matching_state_alone() {
    let page = FakePage::new();
    let s = selectors();
    script_toggles(&page, &s, true, false);

    let desired = CreationMode { instrumental: true, custom: false };
    assert_eq!(negotiate_mode(&page, &s, &pacing(), desired).await.unwrap(), 0);
    assert!(page.clicks().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_negotiator_turns_custom_off_without_onboarding() {
    let page = FakePage::new();
    let s = selectors();
    script_toggles(&page, &s, false, true);
    page.show(&s.custom_get_started_button, &["get-started"]);

    let desired = CreationMode { instrumental: false, custom: false };
    assert_eq!(negotiate_mode(&page, &s, &pacing(), desired).await.unwrap(), 1);
    assert_eq!(page.clicks(), vec!["custom-on"]);
}

#[tokio::test(start_paused = true)]
async fn test_negotiator_ambiguous_state_clicks_nothing() {
    let page = FakePage::new();
    let s = selectors();
    script_toggles(&page, &s, false, false);
    page.show(&s.instrumental_enabled, &["instrumental-on"]);

    let desired = CreationMode { instrumental: true, custom: false };
    let err = negotiate_mode(&page, &s, &pacing(), desired).await.unwrap_err();

    assert!(matches!(err, NegotiationError::AmbiguousState("instrumental")));
    assert!(page.clicks().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_negotiator_missing_pair_is_ambiguous() {
    let page = FakePage::new();
    let s = selectors();
    page.show(&s.instrumental_disabled, &["instrumental-off"]);

    let desired = CreationMode { instrumental: false, custom: false };
    let err = negotiate_mode(&page, &s, &pacing(), desired).await.unwrap_err();
    assert!(matches!(err, NegotiationError::AmbiguousState("custom")));
}

// =============================================================================
// Sign-in
// =============================================================================

struct SignInPage {
    page: FakePage,
    s: Selectors,
    urls: UrlConfig,
    verification: VerificationConfig,
    channel: ScriptedChannel,
}

impl SignInPage {
    fn new() -> Self {
        let page = FakePage::new();
        let s = selectors();
        let urls = UrlConfig::default();
        page.set_location(&urls.sign_in_url);
        page.show(&s.country_code_button, &["country-button"]);
        page.show(&s.country_code_search_field, &["country-search"]);
        page.show(&s.country_code_row, &["row-us"]);
        page.child("row-us", &s.country_code_label, &["row-us-code"]);
        page.set_text("row-us-code", "+1");
        page.show(&s.phone_input, &["phone"]);
        page.show(&s.continue_button, &["continue"]);
        page.show(&s.resend_code_button, &["resend"]);
        page.show(&s.code_first_digit, &["code"]);
        page.on_click("continue", |state| state.body = "Check your phone".to_string());
        let create = urls.create_url.clone();
        page.on_type("code", move |state| state.location = create.clone());

        Self {
            page,
            s,
            urls,
            verification: VerificationConfig::default(),
            channel: ScriptedChannel::new(),
        }
    }

    async fn sign_in(&self) -> (Result<(), SignInError>, SignInState) {
        let pacing = pacing();
        let mut flow = SignInFlow::new(
            &self.page,
            &self.s,
            &self.urls,
            &pacing,
            &self.channel,
            &self.verification,
        );
        let result = flow.sign_in(&profile()).await;
        (result, flow.state())
    }
}

#[tokio::test(start_paused = true)]
async fn test_sign_in_with_first_code() {
    let fixture = SignInPage::new();
    fixture.channel.answer(Some("654321"));

    let (result, state) = fixture.sign_in().await;

    result.unwrap();
    assert_eq!(state, SignInState::SignedIn);
    assert_eq!(fixture.page.typed_into("country-search"), vec!["United States".to_string()]);
    assert_eq!(fixture.page.typed_into("code"), vec!["654321".to_string()]);
    assert_eq!(fixture.page.click_count("resend"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_sign_in_gives_up_after_three_fetches() {
    let fixture = SignInPage::new();

    let (result, state) = fixture.sign_in().await;

    assert!(matches!(result, Err(SignInError::CodeNotReceived { attempts: 3 })));
    assert_eq!(state, SignInState::Failed);
    assert_eq!(fixture.channel.fetch_count(), 3);
    assert_eq!(fixture.page.click_count("resend"), 2);
    assert!(fixture.page.typed_into("code").is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_sign_in_code_on_third_fetch_resends_twice() {
    let fixture = SignInPage::new();
    fixture.channel.answer(None).answer(None).answer(Some("246810"));

    let (result, state) = fixture.sign_in().await;

    result.unwrap();
    assert_eq!(state, SignInState::SignedIn);
    assert_eq!(fixture.channel.fetch_count(), 3);
    assert_eq!(fixture.page.click_count("resend"), 2);
    assert_eq!(fixture.page.typed_into("code"), vec!["246810".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_sign_in_code_on_second_fetch_resends_once() {
    let fixture = SignInPage::new();
    fixture.channel.answer(None).answer(Some("135790"));

    let (result, state) = fixture.sign_in().await;

    result.unwrap();
    assert_eq!(state, SignInState::SignedIn);
    assert_eq!(fixture.channel.fetch_count(), 2);
    assert_eq!(fixture.page.click_count("resend"), 1);
    assert_eq!(fixture.page.typed_into("code"), vec!["135790".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_sign_in_provider_errors_count_as_no_code() {
    let fixture = SignInPage::new();
    fixture
        .channel
        .fail("connection reset")
        .fail("connection reset")
        .answer(Some("111222"));

    let (result, _) = fixture.sign_in().await;

    result.unwrap();
    assert_eq!(fixture.page.click_count("resend"), 2);
    assert_eq!(fixture.page.typed_into("code"), vec!["111222".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_sign_in_requires_sign_in_page() {
    let fixture = SignInPage::new();
    fixture.page.set_location("https://suno.com/home");

    let (result, _) = fixture.sign_in().await;

    assert!(matches!(result, Err(SignInError::NotOnSignInPage(_))));
    assert!(fixture.page.clicks().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_sign_in_ambiguous_country_code() {
    let fixture = SignInPage::new();
    let s = &fixture.s;
    fixture.page.show(&s.country_code_row, &["row-us", "row-ca"]);
    fixture.page.child("row-ca", &s.country_code_label, &["row-ca-code"]);
    fixture.page.set_text("row-ca-code", "+1");

    let (result, _) = fixture.sign_in().await;

    assert!(matches!(
        result,
        Err(SignInError::CountryAmbiguous { matches: 2, .. })
    ));
    assert_eq!(fixture.page.click_count("row-us"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_sign_in_without_verification_screen() {
    let fixture = SignInPage::new();
    fixture.page.with(|state| state.body = "Something went wrong".to_string());
    fixture.page.on_click("continue", |state| state.body = "Too many attempts".to_string());

    let (result, _) = fixture.sign_in().await;

    assert!(matches!(result, Err(SignInError::VerificationScreenMissing)));
    assert_eq!(fixture.channel.fetch_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_sign_in_fails_when_code_does_not_land_on_create() {
    let fixture = SignInPage::new();
    fixture.channel.answer(Some("654321"));
    fixture
        .page
        .on_type("code", |state| state.location = "https://accounts.suno.com/error".to_string());

    let (result, _) = fixture.sign_in().await;

    assert!(matches!(result, Err(SignInError::NotSignedIn(_))));
}

// =============================================================================
// Submission form
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_select_model_keeps_first_preference() {
    let page = FakePage::new();
    let s = selectors();
    page.set_text("model", "v3.5");

    let model = select_model(&page, &s, &pacing(), &ElementHandle::new("model"), &preferred(), 3)
        .await
        .unwrap();

    assert_eq!(model, "v3.5");
    assert!(page.clicks().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_select_model_picks_best_available() {
    let page = FakePage::new();
    let s = selectors();
    page.set_text("model", "v4");
    page.show(&s.model_list_option, &["option-v4", "option-v2", "option-v3"]);
    page.set_text("option-v4", "v4");
    page.set_text("option-v2", "v2");
    page.set_text("option-v3", "v3");

    let model = select_model(&page, &s, &pacing(), &ElementHandle::new("model"), &preferred(), 3)
        .await
        .unwrap();

    assert_eq!(model, "v3");
    assert_eq!(page.clicks(), vec!["model", "option-v3"]);
}

#[tokio::test(start_paused = true)]
async fn test_select_model_gives_up_after_attempts() {
    let page = FakePage::new();
    let s = selectors();
    page.set_text("model", "v4");

    let err = select_model(&page, &s, &pacing(), &ElementHandle::new("model"), &preferred(), 3)
        .await
        .unwrap_err();

    assert!(matches!(err, SubmissionError::ModelNotSelected { attempts: 3 }));
    assert_eq!(page.click_count("model"), 3);
}

#[tokio::test(start_paused = true)]
async fn test_locate_form_requires_lyrics_for_custom_vocals() {
    let page = FakePage::new();
    let s = selectors();
    page.show(&s.model_version_label, &["model"]);
    page.show(&s.create_button, &["create"]);
    page.show(&s.custom_style_field, &["style"]);
    page.show(&s.custom_title_field, &["title"]);

    let vocal = CreationMode { instrumental: false, custom: true };
    let err = locate_form(&page, &s, vocal).await.unwrap_err();
    assert!(matches!(err, SubmissionError::ControlMissing("lyrics field")));

    let instrumental = CreationMode { instrumental: true, custom: true };
    let controls = locate_form(&page, &s, instrumental).await.unwrap();
    assert_eq!(controls.shared_input(), Some(&ElementHandle::new("style")));
}
