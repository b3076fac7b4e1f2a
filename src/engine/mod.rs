pub mod analysis;
pub mod apply;
pub mod deps;
pub mod imports;
pub mod parser;
pub mod patch;
pub mod resolver;
pub mod similarity;
pub mod symbols;

use crate::editor::Editor;
use crate::prompt::Prompter;
use crate::vcs::Vcs;

/// Collaborators the engines drive: the repository, the user, and an editor.
pub struct Runtime<'a> {
    pub vcs: &'a dyn Vcs,
    pub ui: &'a mut dyn Prompter,
    pub editor: &'a dyn Editor,
}

impl<'a> Runtime<'a> {
    pub fn new(vcs: &'a dyn Vcs, ui: &'a mut dyn Prompter, editor: &'a dyn Editor) -> Self {
        Self { vcs, ui, editor }
    }
}
