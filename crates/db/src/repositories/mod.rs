//! Query repositories, one per table.

mod letter_repo;

pub use letter_repo::{LetterRepo, IMAGE_STATUS_COMPLETE};
