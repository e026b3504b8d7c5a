//! Storage key naming for generated artifacts.

/// Prefix under which all letter images are stored.
pub const ARTIFACT_PREFIX: &str = "letters";

/// Deterministic storage key for the `index`-th artifact of a job.
///
/// Re-running a job produces the same keys, so uploads overwrite rather
/// than accumulate.
///
/// ```
/// use letterpress_core::naming::artifact_key;
///
/// assert_eq!(artifact_key("L42", 0), "letters/L42_0.jpg");
/// ```
pub fn artifact_key(job_id: &str, index: usize) -> String {
    format!("{ARTIFACT_PREFIX}/{job_id}_{index}.jpg")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_includes_job_and_index() {
        assert_eq!(artifact_key("L42", 3), "letters/L42_3.jpg");
    }

    #[test]
    fn key_is_stable_across_calls() {
        assert_eq!(artifact_key("abc", 1), artifact_key("abc", 1));
        assert_ne!(artifact_key("abc", 1), artifact_key("abc", 2));
    }
}
