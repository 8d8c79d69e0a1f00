//! Generation requests
//!
//! A [`GenerationRecord`] is the raw row read from the record store. It is
//! turned into an immutable [`GenerationRequest`] only after every validation
//! rule passes; nothing touches the external application before that.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MIN_PROMPT_LENGTH: usize = 5;
pub const MAX_PROMPT_LENGTH: usize = 190;
pub const MIN_GENRE_LENGTH: usize = 3;
pub const MAX_CUSTOM_TITLE_LENGTH: usize = 60;
pub const MIN_CUSTOM_LYRICS_LENGTH: usize = 30;
pub const MAX_CUSTOM_LYRICS_LENGTH: usize = 1000;

/// Words that must never reach the external application
pub const FORBIDDEN_WORDS: &[&str] = &["suno"];

/// Allowed character set for author-supplied custom fields
static CUSTOM_TEXT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^[a-zA-Z0-9!?=.$;'"\-\t\s\[\]()]+$"#).expect("custom text pattern is valid")
});

/// Validation failures; never retried
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Generation record not found")]
    NotFound,

    #[error("Generation already carries an error message")]
    AlreadyFailed,

    #[error("Generation already has output data")]
    AlreadyHasOutput,

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("{field} is shorter than {min} characters")]
    TooShort { field: &'static str, min: usize },

    #[error("{field} is longer than {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("Forbidden word '{word}' found in {field}")]
    ForbiddenWord { field: &'static str, word: &'static str },

    #[error("{0} contains characters outside the allowed set")]
    InvalidCharacters(&'static str),
}

/// Raw generation row as stored by the record store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct GenerationRecord {
    pub generation_id: String,
    pub song_prompt: Option<String>,
    pub use_custom_mode: bool,
    pub use_instrumental_only: bool,
    pub song_input_genre: Option<String>,
    pub second_song_input_genre: Option<String>,
    pub song_input_vibe: Option<String>,
    pub song_input_custom_title: Option<String>,
    pub song_input_custom_lyrics: Option<String>,
    pub error_message: Option<String>,
    pub user_id: Option<String>,
    pub replies_guild: Option<String>,
    pub initial_reply_id: Option<String>,
    pub output_reply_id: Option<String>,
    pub output_song: Option<String>,
    pub song_output_genre: Option<String>,
    pub song_output_title: Option<String>,
    pub song_output_lyrics: Option<String>,
    pub song_output_cover: Option<String>,
}

impl GenerationRecord {
    /// Whether any output column is already populated
    pub fn has_output(&self) -> bool {
        [
            &self.output_song,
            &self.song_output_genre,
            &self.song_output_title,
            &self.song_output_lyrics,
            &self.song_output_cover,
        ]
        .iter()
        .any(|field| field.is_some())
    }
}

/// Desired (or observed) creation toggles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreationMode {
    pub instrumental: bool,
    pub custom: bool,
}

/// What gets typed into the creation form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SongInput {
    /// Free-text description
    Plain { prompt: String },
    /// Author-supplied style, title and (for vocal songs) lyrics
    Custom {
        style: String,
        title: String,
        lyrics: Option<String>,
    },
}

/// Immutable, validated request for one generation job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub generation_id: String,
    pub instrumental: bool,
    pub input: SongInput,
}

impl GenerationRequest {
    /// Validate a stored record and build the request
    pub fn from_record(record: &GenerationRecord) -> Result<Self, ValidationError> {
        if record.error_message.is_some() {
            return Err(ValidationError::AlreadyFailed);
        }

        if record.has_output() {
            return Err(ValidationError::AlreadyHasOutput);
        }

        require(&record.output_reply_id, "output_reply_id")?;
        require(&record.user_id, "user_id")?;
        require(&record.replies_guild, "replies_guild")?;
        require(&record.initial_reply_id, "initial_reply_id")?;

        let input = if record.use_custom_mode {
            Self::custom_input(record)?
        } else {
            let prompt = require(&record.song_prompt, "song_prompt")?;
            check_length("song_prompt", prompt, MIN_PROMPT_LENGTH, MAX_PROMPT_LENGTH)?;
            check_forbidden_words("song_prompt", prompt)?;
            SongInput::Plain {
                prompt: prompt.to_string(),
            }
        };

        Ok(Self {
            generation_id: record.generation_id.clone(),
            instrumental: record.use_instrumental_only,
            input,
        })
    }

    fn custom_input(record: &GenerationRecord) -> Result<SongInput, ValidationError> {
        let genre = require(&record.song_input_genre, "song_input_genre")?;
        if genre.chars().count() < MIN_GENRE_LENGTH {
            return Err(ValidationError::TooShort {
                field: "song_input_genre",
                min: MIN_GENRE_LENGTH,
            });
        }

        let title = require(&record.song_input_custom_title, "song_input_custom_title")?;
        check_length("song_input_custom_title", title, 1, MAX_CUSTOM_TITLE_LENGTH)?;
        check_forbidden_words("song_input_custom_title", title)?;
        if !CUSTOM_TEXT_PATTERN.is_match(title) || !title.chars().any(|c| c.is_ascii_alphanumeric()) {
            return Err(ValidationError::InvalidCharacters("song_input_custom_title"));
        }

        let lyrics = if record.use_instrumental_only {
            None
        } else {
            let lyrics = require(&record.song_input_custom_lyrics, "song_input_custom_lyrics")?;
            check_length(
                "song_input_custom_lyrics",
                lyrics,
                MIN_CUSTOM_LYRICS_LENGTH,
                MAX_CUSTOM_LYRICS_LENGTH,
            )?;
            check_forbidden_words("song_input_custom_lyrics", lyrics)?;
            if !CUSTOM_TEXT_PATTERN.is_match(lyrics) {
                return Err(ValidationError::InvalidCharacters("song_input_custom_lyrics"));
            }
            Some(lyrics.to_string())
        };

        let style = compose_style_prompt(
            Some(genre),
            record.second_song_input_genre.as_deref(),
            record.song_input_vibe.as_deref(),
        )
        .ok_or(ValidationError::MissingField("song_input_genre"))?;

        Ok(SongInput::Custom {
            style,
            title: title.to_string(),
            lyrics,
        })
    }

    /// Creation toggles this request needs
    pub fn mode(&self) -> CreationMode {
        CreationMode {
            instrumental: self.instrumental,
            custom: matches!(self.input, SongInput::Custom { .. }),
        }
    }

    pub fn is_custom(&self) -> bool {
        self.mode().custom
    }

    /// Lyrics submitted by the author, if any
    pub fn submitted_lyrics(&self) -> Option<&str> {
        match &self.input {
            SongInput::Custom { lyrics, .. } => lyrics.as_deref(),
            SongInput::Plain { .. } => None,
        }
    }
}

/// Build the style text typed in custom mode: `vibe genre second_genre`
///
/// Empty parts and the literal "none" are skipped, as is a second genre equal
/// (case-insensitively) to the first. Returns `None` when nothing remains.
pub fn compose_style_prompt(
    genre: Option<&str>,
    second_genre: Option<&str>,
    vibe: Option<&str>,
) -> Option<String> {
    fn usable(part: Option<&str>) -> Option<&str> {
        part.map(str::trim)
            .filter(|p| !p.is_empty() && !p.eq_ignore_ascii_case("none"))
    }

    let genre = usable(genre);
    let second = usable(second_genre).filter(|second| match genre {
        Some(first) => !second.eq_ignore_ascii_case(first),
        None => true,
    });

    let parts: Vec<&str> = [usable(vibe), genre, second].into_iter().flatten().collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

fn require<'a>(value: &'a Option<String>, field: &'static str) -> Result<&'a str, ValidationError> {
    match value.as_deref() {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ValidationError::MissingField(field)),
    }
}

fn check_length(field: &'static str, value: &str, min: usize, max: usize) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len < min {
        return Err(ValidationError::TooShort { field, min });
    }
    if len > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(())
}

fn check_forbidden_words(field: &'static str, value: &str) -> Result<(), ValidationError> {
    let lowered = value.to_lowercase();
    match FORBIDDEN_WORDS.iter().find(|word| lowered.contains(*word)) {
        Some(word) => Err(ValidationError::ForbiddenWord { field, word }),
        None => Ok(()),
    }
}
