//! Repository for the `tbl_letter` table.

use crate::DbPool;

/// `letter_image_status` value for a letter whose images are stored.
pub const IMAGE_STATUS_COMPLETE: i32 = 1;

/// Provides status updates for letters.
pub struct LetterRepo;

impl LetterRepo {
    /// Set the image status of a letter, returning the number of rows
    /// MySQL reports as changed.
    ///
    /// Re-applying the current value changes no rows; callers should not
    /// treat `0` as failure.
    pub async fn set_image_status(
        pool: &DbPool,
        letter_id: &str,
        status: i32,
    ) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("UPDATE tbl_letter SET letter_image_status = ? WHERE letter_id = ?")
                .bind(status)
                .bind(letter_id)
                .execute(pool)
                .await?;
        Ok(result.rows_affected())
    }
}
