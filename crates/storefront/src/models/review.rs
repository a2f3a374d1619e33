//! Product reviews.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fournil_core::{ProductId, ReviewId, UserId};

use super::ValidationError;

/// A customer review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub user_id: UserId,
    /// Display name of the author.
    pub author: String,
    pub rating: u8,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

/// Review form.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewInput {
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
}

/// Data needed to insert a review.
#[derive(Debug, Clone)]
pub struct NewReview {
    pub product_id: ProductId,
    pub user_id: UserId,
    pub author: String,
    pub rating: u8,
    pub comment: String,
}

impl ReviewInput {
    /// Validate the form into a review by `user_id` on `product_id`.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` if the rating is outside 1..=5 or the
    /// comment is longer than 2000 characters.
    pub fn validate(
        &self,
        product_id: ProductId,
        user_id: UserId,
        author: &str,
    ) -> Result<NewReview, ValidationError> {
        if !(1..=5).contains(&self.rating) {
            return Err(ValidationError::new("rating", "must be between 1 and 5"));
        }
        let comment = self.comment.trim();
        if comment.chars().count() > 2000 {
            return Err(ValidationError::new(
                "comment",
                "must be at most 2000 characters",
            ));
        }
        Ok(NewReview {
            product_id,
            user_id,
            author: author.to_owned(),
            rating: self.rating,
            comment: comment.to_owned(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_bounds() {
        let ok = ReviewInput {
            rating: 5,
            comment: " Excellent ".to_owned(),
        };
        let review = ok.validate(ProductId::new(1), UserId::new(2), "Léa").unwrap();
        assert_eq!(review.comment, "Excellent");

        for rating in [0, 6] {
            let bad = ReviewInput {
                rating,
                comment: String::new(),
            };
            assert_eq!(
                bad.validate(ProductId::new(1), UserId::new(2), "Léa")
                    .unwrap_err()
                    .field,
                "rating"
            );
        }
    }
}
