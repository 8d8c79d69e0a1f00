//! Creation form: controls, model choice and submission

use super::creation_mode::dismiss_custom_onboarding;
use crate::models::{CreationMode, GenerationRequest, SongInput};
use crate::page::{find_many, locate, ElementHandle, PageClient, PageError, Selectors};
use crate::utils::{sleep_for, Pacing};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("Could not find the {0} control")]
    ControlMissing(&'static str),

    #[error("Could not pick a preferred model after {attempts} attempts")]
    ModelNotSelected { attempts: u32 },

    #[error(transparent)]
    Page(#[from] PageError),
}

impl SubmissionError {
    pub fn kind(&self) -> crate::error::ErrorKind {
        crate::error::ErrorKind::Interaction
    }
}

/// Form controls required by one creation mode
#[derive(Debug, Clone)]
pub struct FormControls {
    pub model_label: ElementHandle,
    pub create_button: ElementHandle,
    pub description: Option<ElementHandle>,
    pub style: Option<ElementHandle>,
    pub title: Option<ElementHandle>,
    pub lyrics: Option<ElementHandle>,
}

impl FormControls {
    /// The text input clicked to dismiss stray menus
    ///
    /// Description field in plain mode, lyrics field for custom vocal songs,
    /// style field for custom instrumentals.
    pub fn shared_input(&self) -> Option<&ElementHandle> {
        self.description
            .as_ref()
            .or(self.lyrics.as_ref())
            .or(self.style.as_ref())
    }
}

/// Close the intro tutorial overlay if it is showing
pub async fn dismiss_tutorial<P: PageClient + ?Sized>(
    page: &P,
    selectors: &Selectors,
    pacing: &Pacing,
) -> Result<bool, PageError> {
    match locate(page, &selectors.tutorial_overlay).await? {
        Some(overlay) => {
            page.click(&overlay).await?;
            pacing.micro().await;
            info!("Dismissed the intro tutorial");
            Ok(true)
        }
        None => Ok(false),
    }
}

async fn required<P: PageClient + ?Sized>(
    page: &P,
    selector: &str,
    name: &'static str,
) -> Result<ElementHandle, SubmissionError> {
    locate(page, selector)
        .await?
        .ok_or(SubmissionError::ControlMissing(name))
}

/// Locate every control `mode` needs; any missing control fails
pub async fn locate_form<P: PageClient + ?Sized>(
    page: &P,
    selectors: &Selectors,
    mode: CreationMode,
) -> Result<FormControls, SubmissionError> {
    let model_label = required(page, &selectors.model_version_label, "model selector").await?;
    let create_button = required(page, &selectors.create_button, "create button").await?;

    let mut controls = FormControls {
        model_label,
        create_button,
        description: None,
        style: None,
        title: None,
        lyrics: None,
    };

    if mode.custom {
        controls.style = Some(required(page, &selectors.custom_style_field, "style field").await?);
        controls.title = Some(required(page, &selectors.custom_title_field, "title field").await?);
        if !mode.instrumental {
            controls.lyrics = Some(required(page, &selectors.custom_lyrics_field, "lyrics field").await?);
        }
    } else {
        controls.description =
            Some(required(page, &selectors.song_description_field, "description field").await?);
    }

    Ok(controls)
}

/// Make sure a preferred model is active; returns its label
pub async fn select_model<P: PageClient + ?Sized>(
    page: &P,
    selectors: &Selectors,
    pacing: &Pacing,
    model_label: &ElementHandle,
    preferred: &[String],
    attempts: u32,
) -> Result<String, SubmissionError> {
    for attempt in 1..=attempts {
        match try_select_model(page, selectors, pacing, model_label, preferred).await? {
            Some(model) => {
                info!(model = %model, attempt, "Model selected");
                return Ok(model);
            }
            None => {
                warn!(attempt, "Could not pick a preferred model");
                pacing.short().await;
            }
        }
    }

    Err(SubmissionError::ModelNotSelected { attempts })
}

async fn try_select_model<P: PageClient + ?Sized>(
    page: &P,
    selectors: &Selectors,
    pacing: &Pacing,
    model_label: &ElementHandle,
    preferred: &[String],
) -> Result<Option<String>, SubmissionError> {
    let current = page.read_text(model_label).await?;
    if let Some(first) = preferred.first() {
        if current.trim() == first {
            return Ok(Some(first.clone()));
        }
    }

    dismiss_custom_onboarding(page, selectors, pacing).await?;
    page.click(model_label).await?;
    pacing.short().await;

    let Some(options) = find_many(page, &selectors.model_list_option).await? else {
        return Ok(None);
    };

    let mut labels = Vec::with_capacity(options.len());
    for option in options {
        let text = page.read_text(&option).await?;
        labels.push((option, text.trim().to_string()));
    }

    for model in preferred {
        if let Some((option, _)) = labels.iter().find(|(_, text)| text == model) {
            page.click(option).await?;
            pacing.micro().await;
            return Ok(Some(model.clone()));
        }
    }

    Ok(None)
}

async fn fill<P: PageClient + ?Sized>(
    page: &P,
    field: &ElementHandle,
    text: &str,
    pacing: &Pacing,
) -> Result<(), PageError> {
    page.click(field).await?;
    pacing.micro().await;
    page.clear(field).await?;
    page.type_text(field, text).await?;
    pacing.micro().await;
    Ok(())
}

/// Type the request into the form
pub async fn fill_form<P: PageClient + ?Sized>(
    page: &P,
    pacing: &Pacing,
    controls: &FormControls,
    request: &GenerationRequest,
) -> Result<(), SubmissionError> {
    match &request.input {
        SongInput::Plain { prompt } => {
            let field = controls
                .description
                .as_ref()
                .ok_or(SubmissionError::ControlMissing("description field"))?;
            fill(page, field, prompt, pacing).await?;
        }
        SongInput::Custom { style, title, lyrics } => {
            if let Some(lyrics) = lyrics {
                let field = controls
                    .lyrics
                    .as_ref()
                    .ok_or(SubmissionError::ControlMissing("lyrics field"))?;
                fill(page, field, lyrics, pacing).await?;
                pacing.short().await;
            }

            let field = controls
                .style
                .as_ref()
                .ok_or(SubmissionError::ControlMissing("style field"))?;
            fill(page, field, style, pacing).await?;
            pacing.short().await;

            let field = controls
                .title
                .as_ref()
                .ok_or(SubmissionError::ControlMissing("title field"))?;
            fill(page, field, title, pacing).await?;
        }
    }

    info!(generation_id = %request.generation_id, "Filled the creation form");
    Ok(())
}

/// Click create and give the new rows time to appear
pub async fn submit<P: PageClient + ?Sized>(
    page: &P,
    controls: &FormControls,
    initialize_wait: Duration,
) -> Result<(), SubmissionError> {
    page.click(&controls.create_button).await?;
    info!(wait_secs = initialize_wait.as_secs(), "Submitted, waiting for songs to initialize");
    sleep_for(initialize_wait).await;
    Ok(())
}
