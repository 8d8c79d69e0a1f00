//! Locator catalogue
//!
//! Every locator can be overridden from the `[selectors]` TOML section; fields
//! left out keep their defaults. Selectors used with
//! [`PageClient::find_all_within`](super::PageClient::find_all_within) are
//! relative (they start with `.`).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Selectors {
    // Sign-in surface
    pub country_code_button: String,
    pub country_code_search_field: String,
    pub country_code_row: String,
    /// Relative to a country row
    pub country_code_label: String,
    pub phone_input: String,
    pub continue_button: String,
    pub code_first_digit: String,
    pub resend_code_button: String,

    // Creation surface
    pub credits_balance: String,
    pub tutorial_overlay: String,
    pub song_description_field: String,
    pub custom_style_field: String,
    pub custom_title_field: String,
    pub custom_lyrics_field: String,
    pub create_button: String,
    pub model_version_label: String,
    pub model_list_option: String,
    pub instrumental_enabled: String,
    pub instrumental_disabled: String,
    pub custom_enabled: String,
    pub custom_disabled: String,
    pub custom_get_started_button: String,
    pub custom_terms_button: String,

    // Result list
    pub song_list: String,
    pub song_row: String,
    /// Relative to a song row
    pub row_duration: String,
    /// Relative to a song row
    pub row_menu_toggle: String,
    /// Relative to a song row
    pub row_title: String,
    /// Relative to a song row
    pub row_genre: String,
    pub options_menu: String,
    /// Relative to the open options menu
    pub menu_item_label: String,
    /// Lowercase fragments identifying the delete action
    pub delete_action_keywords: Vec<String>,
    pub download_menu_item: String,
    pub audio_download_option: String,

    // Detail surface
    pub lyrics_area: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            country_code_button: "//button[contains(@class, 'cl-selectButton')]".to_string(),
            country_code_search_field: "//input[@placeholder='Search country or code']".to_string(),
            country_code_row: "//div[contains(@class, 'cl-selectOption__countryCode')]".to_string(),
            country_code_label: ".//p".to_string(),
            phone_input: "//input[@maxlength='25' and @type='tel']".to_string(),
            continue_button: "//button[text()='Continue']".to_string(),
            code_first_digit: "//input[@aria-label='Enter verification code.  Digit 1']".to_string(),
            resend_code_button: "//button[contains(text(), 'Resend')]".to_string(),

            credits_balance: "//a[@href='/account']//div//div//div[contains(translate(., 'CREDITS', 'credits'), 'credits')]".to_string(),
            tutorial_overlay: "//div[@data-test-id='overlay' and @role='presentation']".to_string(),
            song_description_field: "//textarea[@maxlength and number(@maxlength) >= 180]".to_string(),
            custom_style_field: "//textarea[@maxlength > 100 and @maxlength < 1000 and contains(translate(@placeholder, 'STYLE', 'style'), 'style')]".to_string(),
            custom_title_field: "//textarea[@maxlength > 10 and @maxlength < 100 and contains(translate(@placeholder, 'TITLE', 'title'), 'title')]".to_string(),
            custom_lyrics_field: "//textarea[@maxlength > 1000 and contains(translate(@placeholder, 'LYRICS', 'lyrics'), 'lyrics')]".to_string(),
            create_button: "//button/div/span[text()='Create']".to_string(),
            model_version_label: "//div[@aria-label='Model Select Dropdown']//span".to_string(),
            model_list_option: "//div[contains(@aria-label, 'Model Selection:')]//div/div[1]".to_string(),
            instrumental_enabled: "//div[@aria-label='Instrumental' and contains(@class, 'bg-primary')][.//span[contains(@class, 'translate-x-4')]]".to_string(),
            instrumental_disabled: "//div[@aria-label='Instrumental' and contains(@class, 'bg-tertiary')][.//span[not(contains(@class, 'translate-x-4'))]]".to_string(),
            custom_enabled: "//div[@aria-label='Custom' and contains(@class, 'bg-primary')][.//span[contains(@class, 'translate-x-4')]]".to_string(),
            custom_disabled: "//div[@aria-label='Custom' and contains(@class, 'bg-tertiary')][.//span[not(contains(@class, 'translate-x-4'))]]".to_string(),
            custom_get_started_button: "//button[contains(translate(text(), 'GETSTARTED', 'getstarted'), 'get started')]".to_string(),
            custom_terms_button: "//button[@aria-label='' and contains(translate(span, 'IACCEPT', 'iaccept'), 'i accept')]".to_string(),

            song_list: "//div[@role='grid']".to_string(),
            song_row: "//div[@data-testid='song-row']".to_string(),
            row_duration: ".//div[@data-testid='song-row-play-button']//div//span".to_string(),
            row_menu_toggle: ".//button[@type='button' and @data-state='closed']".to_string(),
            row_title: ".//span[@title and normalize-space(@title) != '']//a//span".to_string(),
            row_genre: ".//span[@title and normalize-space(@title) != '']//a[contains(@class, 'hover:underline')]".to_string(),
            options_menu: "//div[@role='menu' and @data-state='open']".to_string(),
            menu_item_label: ".//div[@role='menuitem']//div//span".to_string(),
            delete_action_keywords: vec!["trash".to_string(), "delete".to_string()],
            download_menu_item: "//div[@role='menuitem' and text()='Download']".to_string(),
            audio_download_option: "//div[@data-testid='download-audio-menu-item' and @role='menuitem']".to_string(),

            lyrics_area: "//section//div//textarea".to_string(),
        }
    }
}

impl Selectors {
    /// Whether a menu label names the delete action (case-insensitive)
    pub fn is_delete_label(&self, label: &str) -> bool {
        let label = label.to_lowercase();
        self.delete_action_keywords
            .iter()
            .any(|keyword| label.contains(&keyword.to_lowercase()))
    }
}
