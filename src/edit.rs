// ✏️ Edit State - Viewing / Editing / Saving
//
// Every detail screen is in exactly one of three states. A draft only exists
// while editing or saving, and the original is kept so Cancel can restore it.

use crate::entities::{Entity, Repository};
use crate::error::{ConsoleResult, ValidationErrors};
use crate::validation::RuleTable;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EditState<T> {
    Viewing { record: T },
    Editing { original: T, draft: T },
    Saving { original: T, draft: T },
}

impl<T: Clone> EditState<T> {
    pub fn viewing(record: T) -> Self {
        EditState::Viewing { record }
    }

    /// The record as the screen should show it.
    pub fn current(&self) -> &T {
        match self {
            EditState::Viewing { record } => record,
            EditState::Editing { draft, .. } | EditState::Saving { draft, .. } => draft,
        }
    }

    pub fn is_dirty(&self) -> bool
    where
        T: PartialEq,
    {
        match self {
            EditState::Viewing { .. } => false,
            EditState::Editing { original, draft } | EditState::Saving { original, draft } => original != draft,
        }
    }

    /// Viewing -> Editing with a draft copy. Other states are unchanged.
    pub fn begin_edit(self) -> Self {
        match self {
            EditState::Viewing { record } => EditState::Editing {
                draft: record.clone(),
                original: record,
            },
            other => other,
        }
    }

    /// Change the draft. Only possible while editing.
    pub fn update_draft(&mut self, change: impl FnOnce(&mut T)) -> bool {
        match self {
            EditState::Editing { draft, .. } => {
                change(draft);
                true
            }
            _ => false,
        }
    }

    /// Editing -> Viewing with the original record.
    pub fn cancel(self) -> Self {
        match self {
            EditState::Editing { original, .. } => EditState::Viewing { record: original },
            other => other,
        }
    }

    /// Editing -> Saving. Returns the draft to write.
    pub fn begin_save(self) -> (Self, Option<T>) {
        match self {
            EditState::Editing { original, draft } => {
                let to_write = draft.clone();
                (EditState::Saving { original, draft }, Some(to_write))
            }
            other => (other, None),
        }
    }

    /// Saving -> Viewing with the re-fetched record.
    pub fn save_succeeded(self, stored: T) -> Self {
        match self {
            EditState::Saving { .. } => EditState::Viewing { record: stored },
            other => other,
        }
    }

    /// Saving -> Editing; the draft is kept so the user can fix it.
    pub fn save_failed(self) -> Self {
        match self {
            EditState::Saving { original, draft } => EditState::Editing { original, draft },
            other => other,
        }
    }
}

impl<T: Entity> EditState<T> {
    /// Validate the draft without leaving the editing state.
    pub fn check_draft(&self, rules: &RuleTable) -> Result<(), ValidationErrors> {
        match self {
            EditState::Editing { draft, .. } => draft.validate(rules),
            _ => Ok(()),
        }
    }

    /// Write the draft of record `id`. Success shows the re-fetched record;
    /// failure goes back to editing with the draft kept.
    pub fn save(self, repo: &Repository<'_>, id: i64) -> (Self, ConsoleResult<()>) {
        let (saving, draft) = self.begin_save();
        let Some(draft) = draft else {
            return (saving, Ok(()));
        };
        match repo.update(id, &draft) {
            Ok(stored) => (saving.save_succeeded(stored), Ok(())),
            Err(err) => {
                tracing::debug!(entity_type = T::ENTITY_TYPE, id, error = %err, "save failed; draft kept");
                (saving.save_failed(), Err(err))
            }
        }
    }
}
