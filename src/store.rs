//! Project/slide document store.
//!
//! Persistence here is deliberately plain: a project row plus its ordered
//! slide rows, each slide stored as an opaque JSON-serialisable document with
//! an explicit ordinal. Mutations go through an explicit command/result
//! pattern — [`apply`] returns a [`MutationResult`] holding the undo data,
//! and [`rollback`] is a pure function of `(project, result)` — so callers
//! that write optimistically can restore the prior state without any
//! framework-specific cache surgery.
//!
//! Invariants maintained here:
//! * slide ordinals are contiguous `0..n` and unique after every structural
//!   mutation;
//! * the review gate ([`check_review_gate`]) holds before audio or export
//!   work starts.
//!
//! No locking discipline beyond the store mutex is required: a single
//! session drives one generation at a time for one project.

use crate::error::VslError;
use crate::model::{Project, ProjectSettings, Slide, SlideAudio};
use std::collections::HashMap;
use std::sync::Mutex;

// ── Commands ─────────────────────────────────────────────────────────────

/// A mutation command against one project.
#[derive(Debug, Clone)]
pub enum Mutation {
    SetScript { text: String },
    Rename { name: String },
    UpdateSettings { settings: ProjectSettings },
    /// Replace the whole slide set (project regeneration).
    ReplaceSlides { slides: Vec<Slide> },
    /// Replace one slide row wholesale (user edit).
    UpdateSlide { slide: Slide },
    /// Attach generated audio to one slide.
    SetAudio {
        slide_id: String,
        audio: SlideAudio,
    },
    MarkReviewed { slide_id: String },
}

/// The result of a successful [`apply`]: what happened plus the data needed
/// to undo it.
#[derive(Debug, Clone)]
pub struct MutationResult {
    undo: Undo,
}

#[derive(Debug, Clone)]
enum Undo {
    Script(Option<String>),
    Name(String),
    Settings(ProjectSettings),
    Slides(Vec<Slide>),
    Slide(Slide),
    Audio {
        slide_id: String,
        previous: Option<SlideAudio>,
    },
    Reviewed {
        slide_id: String,
        previous: bool,
    },
}

/// True when ordinals are exactly `0..n` in order.
pub fn ordinals_contiguous(slides: &[Slide]) -> bool {
    slides.iter().enumerate().all(|(i, s)| s.ordinal == i)
}

fn renumber(slides: &mut [Slide]) {
    for (i, slide) in slides.iter_mut().enumerate() {
        slide.ordinal = i;
    }
}

/// Apply one mutation, returning the undo-carrying result.
pub fn apply(
    project: &mut Project,
    mutation: Mutation,
    now_ms: u64,
) -> Result<MutationResult, VslError> {
    let undo = match mutation {
        Mutation::SetScript { text } => {
            let previous = project.original_script.replace(text);
            Undo::Script(previous)
        }
        Mutation::Rename { name } => {
            let previous = std::mem::replace(&mut project.name, name);
            Undo::Name(previous)
        }
        Mutation::UpdateSettings { settings } => {
            let previous = std::mem::replace(&mut project.settings, settings);
            Undo::Settings(previous)
        }
        Mutation::ReplaceSlides { mut slides } => {
            renumber(&mut slides);
            let previous = std::mem::replace(&mut project.slides, slides);
            Undo::Slides(previous)
        }
        Mutation::UpdateSlide { slide } => {
            let position = project
                .slides
                .iter()
                .position(|s| s.id == slide.id)
                .ok_or_else(|| VslError::SlideNotFound {
                    project_id: project.id.clone(),
                    slide_id: slide.id.clone(),
                })?;
            let mut incoming = slide;
            // A row update never moves the slide.
            incoming.ordinal = position;
            let previous = std::mem::replace(&mut project.slides[position], incoming);
            Undo::Slide(previous)
        }
        Mutation::SetAudio { slide_id, audio } => {
            let slide = find_slide(project, &slide_id)?;
            let previous = slide.audio.replace(audio);
            Undo::Audio { slide_id, previous }
        }
        Mutation::MarkReviewed { slide_id } => {
            let slide = find_slide(project, &slide_id)?;
            let previous = std::mem::replace(&mut slide.reviewed, true);
            Undo::Reviewed { slide_id, previous }
        }
    };

    project.updated_at = now_ms;
    debug_assert!(ordinals_contiguous(&project.slides));
    Ok(MutationResult { undo })
}

/// Undo one applied mutation. Pure: consumes the project and the result,
/// returns the restored project.
pub fn rollback(mut project: Project, result: MutationResult) -> Project {
    match result.undo {
        Undo::Script(previous) => project.original_script = previous,
        Undo::Name(previous) => project.name = previous,
        Undo::Settings(previous) => project.settings = previous,
        Undo::Slides(previous) => project.slides = previous,
        Undo::Slide(previous) => {
            if let Some(slot) = project.slides.iter_mut().find(|s| s.id == previous.id) {
                *slot = previous;
            }
        }
        Undo::Audio { slide_id, previous } => {
            if let Some(slide) = project.slides.iter_mut().find(|s| s.id == slide_id) {
                slide.audio = previous;
            }
        }
        Undo::Reviewed { slide_id, previous } => {
            if let Some(slide) = project.slides.iter_mut().find(|s| s.id == slide_id) {
                slide.reviewed = previous;
            }
        }
    }
    project
}

fn find_slide<'a>(project: &'a mut Project, slide_id: &str) -> Result<&'a mut Slide, VslError> {
    let project_id = project.id.clone();
    project
        .slides
        .iter_mut()
        .find(|s| s.id == slide_id)
        .ok_or(VslError::SlideNotFound {
            project_id,
            slide_id: slide_id.to_string(),
        })
}

/// The review gate: every slide must be reviewed before audio/export.
pub fn check_review_gate(project: &Project) -> Result<(), VslError> {
    let unreviewed = project.slides.iter().filter(|s| !s.reviewed).count();
    if unreviewed > 0 {
        return Err(VslError::ReviewIncomplete {
            unreviewed,
            total: project.slides.len(),
        });
    }
    Ok(())
}

// ── In-memory store ──────────────────────────────────────────────────────

/// In-memory project store keyed by project id.
#[derive(Default)]
pub struct ProjectStore {
    projects: Mutex<HashMap<String, Project>>,
}

impl ProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a project, returning its id.
    pub fn insert(&self, project: Project) -> Result<String, VslError> {
        let id = project.id.clone();
        self.lock()?.insert(id.clone(), project);
        Ok(id)
    }

    pub fn get(&self, id: &str) -> Result<Project, VslError> {
        self.lock()?
            .get(id)
            .cloned()
            .ok_or_else(|| VslError::ProjectNotFound { id: id.to_string() })
    }

    pub fn delete(&self, id: &str) -> Result<(), VslError> {
        self.lock()?
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| VslError::ProjectNotFound { id: id.to_string() })
    }

    /// Apply a mutation to a stored project.
    pub fn apply(
        &self,
        id: &str,
        mutation: Mutation,
        now_ms: u64,
    ) -> Result<MutationResult, VslError> {
        let mut projects = self.lock()?;
        let project = projects
            .get_mut(id)
            .ok_or_else(|| VslError::ProjectNotFound { id: id.to_string() })?;
        apply(project, mutation, now_ms)
    }

    /// Roll a stored project back using an earlier [`MutationResult`].
    pub fn rollback(&self, id: &str, result: MutationResult) -> Result<(), VslError> {
        let mut projects = self.lock()?;
        let project = projects
            .remove(id)
            .ok_or_else(|| VslError::ProjectNotFound { id: id.to_string() })?;
        projects.insert(id.to_string(), rollback(project, result));
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Project>>, VslError> {
        self.projects
            .lock()
            .map_err(|_| VslError::Internal("project store mutex poisoned".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project_with_slides(n: usize) -> Project {
        let mut p = Project::new("owner", "Test", 1_000);
        p.slides = (0..n)
            .map(|i| {
                let mut s = Slide::from_text(format!("slide {i}"), None, None, None, None);
                s.ordinal = i;
                s.id = format!("s-{i}");
                s
            })
            .collect();
        p
    }

    #[test]
    fn replace_slides_renumbers_ordinals() {
        let mut p = project_with_slides(2);
        let mut new_slides: Vec<Slide> = (0..3)
            .map(|i| Slide::from_text(format!("new {i}"), None, None, None, None))
            .collect();
        // Scramble incoming ordinals; the store must fix them.
        new_slides[0].ordinal = 7;
        new_slides[2].ordinal = 7;

        apply(&mut p, Mutation::ReplaceSlides { slides: new_slides }, 2_000).unwrap();
        assert!(ordinals_contiguous(&p.slides));
        assert_eq!(p.updated_at, 2_000);
    }

    #[test]
    fn rollback_restores_prior_slide_set() {
        let mut p = project_with_slides(3);
        let before = p.slides.clone();

        let result = apply(
            &mut p,
            Mutation::ReplaceSlides { slides: Vec::new() },
            2_000,
        )
        .unwrap();
        assert!(p.slides.is_empty());

        let restored = rollback(p, result);
        assert_eq!(restored.slides, before);
    }

    #[test]
    fn update_slide_keeps_position() {
        let mut p = project_with_slides(3);
        let mut edited = p.slides[1].clone();
        edited.full_script_text = "edited".into();
        edited.ordinal = 99;

        apply(&mut p, Mutation::UpdateSlide { slide: edited }, 2_000).unwrap();
        assert_eq!(p.slides[1].full_script_text, "edited");
        assert_eq!(p.slides[1].ordinal, 1);
    }

    #[test]
    fn update_missing_slide_errors() {
        let mut p = project_with_slides(1);
        let ghost = Slide::from_text("ghost", None, None, None, None);
        let err = apply(&mut p, Mutation::UpdateSlide { slide: ghost }, 2_000).unwrap_err();
        assert!(matches!(err, VslError::SlideNotFound { .. }));
    }

    #[test]
    fn audio_rollback_restores_none() {
        let mut p = project_with_slides(1);
        let result = apply(
            &mut p,
            Mutation::SetAudio {
                slide_id: "s-0".into(),
                audio: SlideAudio {
                    url: "data:audio/mpeg;base64,QUJD".into(),
                    duration: 2.0,
                    generated: true,
                },
            },
            2_000,
        )
        .unwrap();
        assert!(p.slides[0].audio.is_some());

        let restored = rollback(p, result);
        assert!(restored.slides[0].audio.is_none());
    }

    #[test]
    fn review_gate() {
        let mut p = project_with_slides(2);
        let err = check_review_gate(&p).unwrap_err();
        assert!(matches!(
            err,
            VslError::ReviewIncomplete {
                unreviewed: 2,
                total: 2
            }
        ));

        apply(
            &mut p,
            Mutation::MarkReviewed {
                slide_id: "s-0".into(),
            },
            2_000,
        )
        .unwrap();
        apply(
            &mut p,
            Mutation::MarkReviewed {
                slide_id: "s-1".into(),
            },
            2_000,
        )
        .unwrap();
        assert!(check_review_gate(&p).is_ok());
        assert!(p.all_reviewed());
    }

    #[test]
    fn slide_row_survives_json_blob_round_trip() {
        let mut p = project_with_slides(1);
        p.slides[0].bold_words = vec!["slide".into()];
        p.slides[0].reviewed = true;

        let blob = serde_json::to_string(&p.slides[0]).unwrap();
        let back: Slide = serde_json::from_str(&blob).unwrap();
        assert_eq!(back, p.slides[0]);
        assert!(blob.contains("\"fullScriptText\""));
        assert!(blob.contains("\"ordinal\":0"));
    }

    #[test]
    fn store_round_trip() {
        let store = ProjectStore::new();
        let id = store.insert(project_with_slides(1)).unwrap();

        store
            .apply(
                &id,
                Mutation::Rename {
                    name: "Renamed".into(),
                },
                2_000,
            )
            .map(|result| store.rollback(&id, result).unwrap())
            .unwrap();

        let p = store.get(&id).unwrap();
        assert_eq!(p.name, "Test");

        store.delete(&id).unwrap();
        assert!(matches!(
            store.get(&id),
            Err(VslError::ProjectNotFound { .. })
        ));
    }
}
